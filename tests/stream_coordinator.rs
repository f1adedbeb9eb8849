//! End-to-end exercise of the coordinator against the catalog-backed backends: multi-collector
//! merge ordering, RIB position annotation, RIB-period dedup, and per-reader failure isolation.

use bgpstream::stream::coordinator::{NextStatus, StreamCoordinator};
use bgpstream::stream::filter_set::FOREVER;
use bgpstream::stream::record::{DumpPosition, DumpType};
use std::io::Write;
use tempfile::NamedTempFile;

/// Builds one on-the-wire MRT `BGP4MP` `MESSAGE` record carrying a single UPDATE announcing
/// `prefix_octets[..byte_len]/prefix_bits` with a trivial two-AS path.
fn bgp4mp_update_record(timestamp: u32, peer_asn: u16, prefix_bits: u8, prefix_octets: [u8; 4]) -> Vec<u8> {
    let byte_len = prefix_bits.div_ceil(8) as usize;

    let mut bgp_body = Vec::new();
    bgp_body.extend_from_slice(&0u16.to_be_bytes()); // withdrawn routes length
    bgp_body.extend_from_slice(&0u16.to_be_bytes()); // path attribute length
    bgp_body.push(prefix_bits);
    bgp_body.extend_from_slice(&prefix_octets[..byte_len]);

    let total_len = 19 + bgp_body.len();
    let mut bgp_message = Vec::new();
    bgp_message.extend_from_slice(&[0xFFu8; 16]); // marker
    bgp_message.extend_from_slice(&(total_len as u16).to_be_bytes());
    bgp_message.push(2); // UPDATE
    bgp_message.extend_from_slice(&bgp_body);

    let mut mrt_body = Vec::new();
    mrt_body.extend_from_slice(&peer_asn.to_be_bytes());
    mrt_body.extend_from_slice(&65000u16.to_be_bytes()); // local_asn
    mrt_body.extend_from_slice(&0u16.to_be_bytes()); // interface_index
    mrt_body.extend_from_slice(&1u16.to_be_bytes()); // address_family = ipv4
    mrt_body.extend_from_slice(&[10, 0, 0, 1]); // peer_ip
    mrt_body.extend_from_slice(&[10, 0, 0, 2]); // local_ip
    mrt_body.extend_from_slice(&bgp_message);

    let mut record = Vec::new();
    record.extend_from_slice(&timestamp.to_be_bytes());
    record.extend_from_slice(&16u16.to_be_bytes()); // entry_type = BGP4MP
    record.extend_from_slice(&1u16.to_be_bytes()); // entry_subtype = MESSAGE
    record.extend_from_slice(&(mrt_body.len() as u32).to_be_bytes());
    record.extend_from_slice(&mrt_body);
    record
}

fn write_fixture(records: &[Vec<u8>]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    for r in records {
        file.write_all(r).unwrap();
    }
    file.flush().unwrap();
    file
}

fn drain(coordinator: &mut StreamCoordinator) -> Vec<bgpstream::stream::record::BgpRecord> {
    let mut records = Vec::new();
    let mut out = None;
    loop {
        match coordinator.next_record(&mut out).unwrap() {
            NextStatus::Ok => records.push(out.take().unwrap()),
            NextStatus::EndOfStream => break,
        }
    }
    records
}

#[test]
fn rib_position_marks_first_middle_last_within_a_file() {
    let file = write_fixture(&[
        bgp4mp_update_record(100, 100, 24, [10, 0, 0, 0]),
        bgp4mp_update_record(200, 100, 24, [10, 1, 0, 0]),
        bgp4mp_update_record(300, 100, 24, [10, 2, 0, 0]),
    ]);

    let mut coordinator = StreamCoordinator::new();
    coordinator.add_interval(0, FOREVER).unwrap();
    coordinator.set_data_interface("single-file").unwrap();
    coordinator
        .set_data_interface_option("path", file.path().to_str().unwrap())
        .unwrap();
    coordinator.set_data_interface_option("collector", "rrc00").unwrap();
    coordinator.set_data_interface_option("type", "rib").unwrap();
    coordinator.start().unwrap();

    let records = drain(&mut coordinator);
    coordinator.destroy();

    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r.dump_type == DumpType::Rib));
    assert_eq!(records[0].position, DumpPosition::First);
    assert_eq!(records[1].position, DumpPosition::Middle);
    assert_eq!(records[2].position, DumpPosition::Last);
}

#[test]
fn csv_catalog_merges_two_collectors_in_timestamp_order() {
    let file_a = write_fixture(&[bgp4mp_update_record(100, 100, 24, [10, 0, 0, 0])]);
    let file_b = write_fixture(&[bgp4mp_update_record(150, 200, 24, [10, 1, 0, 0])]);

    let mut csv = NamedTempFile::new().unwrap();
    writeln!(
        csv,
        "{},updates,rrc00,riperis,100,100",
        file_a.path().to_str().unwrap()
    )
    .unwrap();
    writeln!(
        csv,
        "{},updates,rrc01,riperis,150,150",
        file_b.path().to_str().unwrap()
    )
    .unwrap();
    csv.flush().unwrap();

    let mut coordinator = StreamCoordinator::new();
    coordinator.add_interval(0, FOREVER).unwrap();
    coordinator.set_data_interface("csv").unwrap();
    coordinator
        .set_data_interface_option("csv-file", csv.path().to_str().unwrap())
        .unwrap();
    coordinator.start().unwrap();

    let records = drain(&mut coordinator);
    coordinator.destroy();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].collector, "rrc00");
    assert_eq!(records[0].timestamp, 100);
    assert_eq!(records[1].collector, "rrc01");
    assert_eq!(records[1].timestamp, 150);
}

#[test]
fn rib_period_dedup_drops_the_second_rib_within_the_window() {
    let file_a = write_fixture(&[bgp4mp_update_record(1000, 100, 24, [10, 0, 0, 0])]);
    let file_b = write_fixture(&[bgp4mp_update_record(1800, 200, 24, [10, 1, 0, 0])]);

    let mut csv = NamedTempFile::new().unwrap();
    writeln!(
        csv,
        "{},ribs,rrc00,riperis,1000,1000",
        file_a.path().to_str().unwrap()
    )
    .unwrap();
    writeln!(
        csv,
        "{},ribs,rrc00,riperis,1800,1800",
        file_b.path().to_str().unwrap()
    )
    .unwrap();
    csv.flush().unwrap();

    let mut coordinator = StreamCoordinator::new();
    coordinator.add_interval(0, FOREVER).unwrap();
    coordinator.add_rib_period(3600).unwrap();
    coordinator.set_data_interface("csv").unwrap();
    coordinator
        .set_data_interface_option("csv-file", csv.path().to_str().unwrap())
        .unwrap();
    coordinator.start().unwrap();

    let records = drain(&mut coordinator);
    coordinator.destroy();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].timestamp, 1000);
}

#[test]
fn a_reader_that_fails_to_open_does_not_block_the_other_readers_records() {
    let good_file = write_fixture(&[bgp4mp_update_record(100, 100, 24, [10, 0, 0, 0])]);

    let mut csv = NamedTempFile::new().unwrap();
    writeln!(csv, "/no/such/archive.gz,updates,rrc00,riperis,50,50").unwrap();
    writeln!(
        csv,
        "{},updates,rrc01,riperis,100,100",
        good_file.path().to_str().unwrap()
    )
    .unwrap();
    csv.flush().unwrap();

    let mut coordinator = StreamCoordinator::new();
    coordinator.add_interval(0, FOREVER).unwrap();
    coordinator.set_data_interface("csv").unwrap();
    coordinator
        .set_data_interface_option("csv-file", csv.path().to_str().unwrap())
        .unwrap();
    coordinator.start().unwrap();

    let records = drain(&mut coordinator);
    coordinator.destroy();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].collector, "rrc01");
}
