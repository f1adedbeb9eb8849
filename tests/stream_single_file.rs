//! End-to-end exercise of the stream pipeline against a hand-built MRT fixture: single-file
//! backend, no catalog, a couple of BGP4MP UPDATE records decoded and merged in file order.

use bgpstream::stream::coordinator::{NextStatus, StreamCoordinator};
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

#[test]
fn emits_updates_in_file_order_with_default_position() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(&bgp4mp_update_record(100, 100, 24, [10, 0, 0, 0]))
        .unwrap();
    file.write_all(&bgp4mp_update_record(200, 200, 24, [10, 1, 0, 0]))
        .unwrap();
    file.flush().unwrap();

    let mut coordinator = StreamCoordinator::new();
    coordinator
        .add_interval(0, bgpstream::stream::filter_set::FOREVER)
        .unwrap();
    coordinator.set_data_interface("single-file").unwrap();
    coordinator
        .set_data_interface_option("path", file.path().to_str().unwrap())
        .unwrap();
    coordinator.set_data_interface_option("collector", "rrc00").unwrap();
    coordinator.set_data_interface_option("type", "updates").unwrap();
    coordinator.start().unwrap();

    let mut records = Vec::new();
    let mut out = None;
    loop {
        match coordinator.next_record(&mut out).unwrap() {
            NextStatus::Ok => records.push(out.take().unwrap()),
            NextStatus::EndOfStream => break,
        }
    }
    coordinator.destroy();

    assert_eq!(records.len(), 2);
    assert!(records.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    for record in &records {
        assert_eq!(record.dump_type, DumpType::Updates);
        assert_eq!(record.position, DumpPosition::Default);
        assert_eq!(record.collector, "rrc00");
        assert!(!record.raw_bytes.is_empty());
    }

    assert_eq!(records[0].timestamp, 100);
    assert_eq!(records[0].elements.len(), 1);
    assert_eq!(records[0].elements[0].peer_asn.to_u32(), 100);
    assert_eq!(records[0].elements[0].prefix.prefix.to_string(), "10.0.0.0/24");

    assert_eq!(records[1].timestamp, 200);
    assert_eq!(records[1].elements[0].prefix.prefix.to_string(), "10.1.0.0/24");
}

#[test]
fn prefix_filter_excludes_non_matching_records() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(&bgp4mp_update_record(100, 100, 24, [10, 0, 0, 0]))
        .unwrap();
    file.write_all(&bgp4mp_update_record(200, 200, 24, [192, 168, 0, 0]))
        .unwrap();
    file.flush().unwrap();

    let mut coordinator = StreamCoordinator::new();
    coordinator
        .add_interval(0, bgpstream::stream::filter_set::FOREVER)
        .unwrap();
    coordinator
        .add_prefix("10.0.0.0/8", bgpstream::stream::filter_set::PrefixMatchType::IncludeSub)
        .unwrap();
    coordinator.set_data_interface("single-file").unwrap();
    coordinator
        .set_data_interface_option("path", file.path().to_str().unwrap())
        .unwrap();
    coordinator.set_data_interface_option("collector", "rrc00").unwrap();
    coordinator.set_data_interface_option("type", "updates").unwrap();
    coordinator.start().unwrap();

    let mut records = Vec::new();
    let mut out = None;
    loop {
        match coordinator.next_record(&mut out).unwrap() {
            NextStatus::Ok => records.push(out.take().unwrap()),
            NextStatus::EndOfStream => break,
        }
    }
    coordinator.destroy();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].elements[0].prefix.prefix.to_string(), "10.0.0.0/24");
}
