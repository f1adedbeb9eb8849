/*!
BGPStream is a pull-based library for ingesting BGP routing data out of MRT archives, merging
many RIB dumps and UPDATES streams into one time-ordered, filtered sequence of records.

BGPStream has the following features:
- **ergonomic pull API**: configure a filter set and a data source, then call `next_record` in a
  loop until `EndOfStream`.
- **archive-agnostic**: point it at a single local/remote file, a CSV catalog, or a SQLite
  catalog, and it merges however many inputs are behind it into one ordered stream.
- **live-aware**: the same coordinator that drains a bounded archive can also tail a growing one,
  backing off exponentially between empty polls.

# Examples

## Reading a single MRT file

```no_run
use bgpstream::stream::coordinator::{StreamCoordinator, NextStatus};

env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

let mut coordinator = StreamCoordinator::new();
coordinator.add_interval(1_600_000_000, 1_600_003_600).unwrap();
coordinator.set_data_interface("single-file").unwrap();
coordinator
    .set_data_interface_option("path", "http://archive.routeviews.org/bgpdata/2021.10/UPDATES/updates.20211001.0000.bz2")
    .unwrap();
coordinator.set_data_interface_option("collector", "route-views2").unwrap();
coordinator.start().unwrap();

log::info!("streaming updates file");

let mut record = None;
loop {
    match coordinator.next_record(&mut record).unwrap() {
        NextStatus::Ok => {
            for elem in &record.as_ref().unwrap().elements {
                println!("{elem}");
            }
        }
        NextStatus::EndOfStream => break,
    }
}
coordinator.destroy();
```

## Filtering by prefix and origin AS

```no_run
use bgpstream::models::ElemType;
use bgpstream::stream::coordinator::StreamCoordinator;
use bgpstream::stream::filter_set::PrefixMatchType;

let mut coordinator = StreamCoordinator::new();
coordinator.add_interval(1_600_000_000, bgpstream::stream::filter_set::FOREVER).unwrap();
coordinator.add_prefix("211.98.251.0/24", PrefixMatchType::Exact).unwrap();
coordinator.add_elem_type(ElemType::ANNOUNCE).unwrap();
```

## Following a live catalog

```no_run
use bgpstream::stream::coordinator::StreamCoordinator;

let mut coordinator = StreamCoordinator::new();
coordinator.add_recent("1h").unwrap();
coordinator.set_live_mode(true).unwrap();
coordinator.set_data_interface("csv").unwrap();
coordinator.set_data_interface_option("csv-file", "catalog.csv").unwrap();
coordinator.start().unwrap();
```

# Data Representation

There are two key data structures to understand: [MrtRecord] holds the unmodified, on-the-wire
MRT structure as decoded by [decoder]; [BgpElem] is the per-prefix, format-agnostic view the
[stream] pipeline actually delivers, produced from an [MrtRecord] by
[decoder::elementor::Elementor]. A RIB entry or an UPDATE message that bundles several prefixes
behind one set of attributes becomes one [BgpElem] per prefix.

```ignore
pub struct MrtRecord {
    pub common_header: CommonHeader,
    pub message: MrtMessage,
}

pub struct BgpElem {
    pub timestamp: u32,
    pub elem_type: ElemType,
    pub collector: String,
    pub peer_ip: IpAddr,
    pub peer_asn: Asn,
    pub prefix: NetworkPrefix,
    pub next_hop: Option<IpAddr>,
    pub as_path: Option<AsPath>,
    pub origin_asns: Option<Vec<Asn>>,
    pub origin: Option<Origin>,
    pub local_pref: Option<u32>,
    pub med: Option<u32>,
    pub communities: Option<Vec<MetaCommunity>>,
    pub atomic: bool,
    pub aggr_asn: Option<Asn>,
    pub aggr_ip: Option<BgpIdentifier>,
    pub only_to_customer: Option<Asn>,
}
```

# RFCs Support

- [RFC 6396](https://datatracker.ietf.org/doc/html/rfc6396): Multi-Threaded Routing Toolkit (MRT) Routing Information Export Format
- [RFC 6397](https://datatracker.ietf.org/doc/html/rfc6397): MRT Routing Information Export Format with Geo-Location Extensions
- [RFC 8050](https://datatracker.ietf.org/doc/html/rfc8050): MRT Routing Information Export Format with BGP Additional Path Extensions
- [RFC 4271](https://datatracker.ietf.org/doc/html/rfc4271): A Border Gateway Protocol 4 (BGP-4)
- [RFC 6793](https://datatracker.ietf.org/doc/html/rfc6793): BGP Support for Four-Octet Autonomous System (AS) Number Space
- [RFC 1997](https://datatracker.ietf.org/doc/html/rfc1997): BGP Communities Attribute
- [RFC 4360](https://datatracker.ietf.org/doc/html/rfc4360): BGP Extended Communities Attribute
- [RFC 8092](https://datatracker.ietf.org/doc/html/rfc8092): BGP Large Communities
*/

pub mod decoder;
pub mod error;
pub mod models;
pub mod stream;

pub use models::BgpElem;
pub use models::MrtRecord;
