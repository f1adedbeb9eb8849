//! Converts decoded [`MrtRecord`]s into per-prefix [`BgpElem`]s.
//!
//! A single MRT record — a RIB dump entry or a BGP4MP UPDATE — can carry reachability
//! information for many prefixes at once. This module fans a record out into one `BgpElem` per
//! (prefix, peer) pair, which is the unit the stream pipeline and its filters operate on.

use crate::models::*;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};

/// Holds the running peer table learned from `PeerIndexTable` records so that subsequent
/// `RibAfi` records (which only reference peers by index) can be resolved to full [`Peer`]s.
#[derive(Default)]
pub struct Elementor {
    peer_table: Option<HashMap<u16, Peer>>,
}

struct ExtractedAttrs {
    as_path: Option<AsPath>,
    as4_path: Option<AsPath>,
    origin: Option<Origin>,
    next_hop: Option<IpAddr>,
    local_pref: Option<u32>,
    med: Option<u32>,
    communities: Option<Vec<MetaCommunity>>,
    atomic: bool,
    aggr_asn: Option<Asn>,
    aggr_ip: Option<Ipv4Addr>,
    only_to_customer: Option<Asn>,
    mp_reach: Option<Nlri>,
    mp_unreach: Option<Nlri>,
}

fn extract_attrs(attributes: &Attributes) -> ExtractedAttrs {
    let mut out = ExtractedAttrs {
        as_path: None,
        as4_path: None,
        origin: None,
        next_hop: None,
        local_pref: None,
        med: None,
        communities: None,
        atomic: false,
        aggr_asn: None,
        aggr_ip: None,
        only_to_customer: None,
        mp_reach: None,
        mp_unreach: None,
    };

    for attr in attributes.iter() {
        match &attr.value {
            AttributeValue::Origin(o) => out.origin = Some(*o),
            AttributeValue::AsPath(p) => out.as_path = Some(p.clone()),
            AttributeValue::As4Path(p) => out.as4_path = Some(p.clone()),
            AttributeValue::NextHop(ip) => out.next_hop = Some(*ip),
            AttributeValue::MultiExitDiscriminator(v) => out.med = Some(*v),
            AttributeValue::LocalPreference(v) => out.local_pref = Some(*v),
            AttributeValue::OnlyToCustomer(v) => out.only_to_customer = Some(Asn::new_32bit(*v)),
            AttributeValue::AtomicAggregate(a) => out.atomic = matches!(a, AtomicAggregate::AG),
            AttributeValue::Aggregator(asn, ip) => {
                out.aggr_asn = Some(*asn);
                out.aggr_ip = match ip {
                    IpAddr::V4(v4) => Some(*v4),
                    IpAddr::V6(_) => None,
                };
            }
            AttributeValue::Communities(cs) => {
                out.communities
                    .get_or_insert_with(Vec::new)
                    .extend(cs.iter().copied().map(MetaCommunity::Plain));
            }
            AttributeValue::LargeCommunities(cs) => {
                out.communities
                    .get_or_insert_with(Vec::new)
                    .extend(cs.iter().copied().map(MetaCommunity::Large));
            }
            AttributeValue::MpReachNlri(nlri) => out.mp_reach = Some(nlri.clone()),
            AttributeValue::MpUnreachNlri(nlri) => out.mp_unreach = Some(nlri.clone()),
            _ => {}
        }
    }

    out
}

fn merged_path(as_path: Option<AsPath>, as4_path: Option<AsPath>) -> Option<AsPath> {
    match (as_path, as4_path) {
        (None, None) => None,
        (Some(v), None) => Some(v),
        (None, Some(v)) => Some(v),
        (Some(v1), Some(v2)) => AsPath::merge_aspath_as4path(&v1, &v2),
    }
}

fn origin_asns(path: &Option<AsPath>) -> Option<Vec<Asn>> {
    let path = path.as_ref()?;
    let origins: Vec<Asn> = path.iter_origins().collect();
    (!origins.is_empty()).then_some(origins)
}

struct CommonFields {
    timestamp: u32,
    as_path: Option<AsPath>,
    origin_asns: Option<Vec<Asn>>,
    origin: Option<Origin>,
    next_hop: Option<IpAddr>,
    local_pref: Option<u32>,
    med: Option<u32>,
    communities: Option<Vec<MetaCommunity>>,
    atomic: bool,
    aggr_asn: Option<Asn>,
    aggr_ip: Option<Ipv4Addr>,
    only_to_customer: Option<Asn>,
}

fn make_elem(
    common: &CommonFields,
    collector: &str,
    elem_type: ElemType,
    peer_ip: IpAddr,
    peer_asn: Asn,
    prefix: NetworkPrefix,
) -> BgpElem {
    let announce = matches!(elem_type, ElemType::ANNOUNCE);
    BgpElem {
        timestamp: common.timestamp,
        elem_type,
        collector: collector.to_string(),
        peer_ip,
        peer_asn,
        prefix,
        next_hop: announce.then(|| common.next_hop).flatten(),
        as_path: announce.then(|| common.as_path.clone()).flatten(),
        origin_asns: announce.then(|| common.origin_asns.clone()).flatten(),
        origin: announce.then(|| common.origin).flatten(),
        local_pref: announce.then(|| common.local_pref).flatten(),
        med: announce.then(|| common.med).flatten(),
        communities: announce.then(|| common.communities.clone()).flatten(),
        atomic: announce && common.atomic,
        aggr_asn: announce.then(|| common.aggr_asn).flatten(),
        aggr_ip: announce.then(|| common.aggr_ip).flatten(),
        only_to_customer: announce.then(|| common.only_to_customer).flatten(),
    }
}

impl Elementor {
    pub fn new() -> Elementor {
        Elementor::default()
    }

    /// Converts a single MRT record into its constituent `BgpElem`s.
    ///
    /// `collector` names the collector/project the record was read from (e.g. `rrc00`); it is
    /// stamped onto every produced element.
    pub fn record_to_elems(&mut self, collector: &str, record: MrtRecord) -> Vec<BgpElem> {
        let mut elems = Vec::new();
        let timestamp = record.common_header.timestamp;

        match record.message {
            MrtMessage::TableDumpMessage(msg) => {
                let attrs = extract_attrs(&msg.attributes);
                let as_path = attrs.as_path;
                let common = CommonFields {
                    timestamp,
                    origin_asns: origin_asns(&as_path),
                    as_path,
                    origin: attrs.origin,
                    next_hop: attrs.next_hop,
                    local_pref: attrs.local_pref,
                    med: attrs.med,
                    communities: attrs.communities,
                    atomic: attrs.atomic,
                    aggr_asn: attrs.aggr_asn,
                    aggr_ip: attrs.aggr_ip,
                    only_to_customer: attrs.only_to_customer,
                };
                elems.push(make_elem(
                    &common,
                    collector,
                    ElemType::ANNOUNCE,
                    msg.peer_address,
                    msg.peer_asn,
                    msg.prefix,
                ));
            }

            MrtMessage::TableDumpV2Message(msg) => match msg {
                TableDumpV2Message::PeerIndexTable(table) => {
                    self.peer_table = Some(table.id_peer_map);
                }
                TableDumpV2Message::GeoPeerTable(_) => {
                    // supplementary geo-location metadata; no reachability information to emit
                }
                TableDumpV2Message::RibGeneric(_) => {
                    log::warn!("RIB_GENERIC table dump entries are not converted to elements");
                }
                TableDumpV2Message::RibAfi(t) => {
                    let Some(peer_table) = self.peer_table.as_ref() else {
                        log::warn!("RIB entry seen before its PEER_INDEX_TABLE; skipping");
                        return elems;
                    };
                    for entry in t.rib_entries {
                        let Some(peer) = peer_table.get(&entry.peer_index) else {
                            log::warn!("unknown peer index {} in RIB entry", entry.peer_index);
                            continue;
                        };
                        let attrs = extract_attrs(&entry.attributes);
                        let as_path = merged_path(attrs.as_path, attrs.as4_path);
                        let next_hop = attrs
                            .next_hop
                            .or_else(|| attrs.mp_reach.as_ref().and_then(|n| n.next_hop.as_ref()).map(NextHopAddress::addr));
                        let common = CommonFields {
                            timestamp,
                            origin_asns: origin_asns(&as_path),
                            as_path,
                            origin: attrs.origin,
                            next_hop,
                            local_pref: attrs.local_pref,
                            med: attrs.med,
                            communities: attrs.communities,
                            atomic: attrs.atomic,
                            aggr_asn: attrs.aggr_asn,
                            aggr_ip: attrs.aggr_ip,
                            only_to_customer: attrs.only_to_customer,
                        };
                        elems.push(make_elem(
                            &common,
                            collector,
                            ElemType::ANNOUNCE,
                            peer.peer_ip,
                            peer.peer_asn,
                            t.prefix,
                        ));
                    }
                }
            },

            MrtMessage::Bgp4Mp(msg) => match msg {
                Bgp4MpEnum::StateChange(_) => {}
                Bgp4MpEnum::Message(m) => {
                    let peer_ip = m.peer_ip;
                    let peer_asn = m.peer_asn;
                    if let BgpMessage::Update(update) = m.bgp_message {
                        let attrs = extract_attrs(&update.attributes);
                        let as_path = merged_path(attrs.as_path, attrs.as4_path);
                        let next_hop = attrs
                            .next_hop
                            .or_else(|| attrs.mp_reach.as_ref().and_then(|n| n.next_hop.as_ref()).map(NextHopAddress::addr));
                        let common = CommonFields {
                            timestamp,
                            origin_asns: origin_asns(&as_path),
                            as_path,
                            origin: attrs.origin,
                            next_hop,
                            local_pref: attrs.local_pref,
                            med: attrs.med,
                            communities: attrs.communities,
                            atomic: attrs.atomic,
                            aggr_asn: attrs.aggr_asn,
                            aggr_ip: attrs.aggr_ip,
                            only_to_customer: attrs.only_to_customer,
                        };

                        elems.extend(update.announced_prefixes.into_iter().map(|p| {
                            make_elem(&common, collector, ElemType::ANNOUNCE, peer_ip, peer_asn, p)
                        }));
                        if let Some(nlri) = attrs.mp_reach {
                            elems.extend(nlri.prefixes.into_iter().map(|p| {
                                make_elem(&common, collector, ElemType::ANNOUNCE, peer_ip, peer_asn, p)
                            }));
                        }

                        elems.extend(update.withdrawn_prefixes.into_iter().map(|p| {
                            make_elem(&common, collector, ElemType::WITHDRAW, peer_ip, peer_asn, p)
                        }));
                        if let Some(nlri) = attrs.mp_unreach {
                            elems.extend(nlri.prefixes.into_iter().map(|p| {
                                make_elem(&common, collector, ElemType::WITHDRAW, peer_ip, peer_asn, p)
                            }));
                        }
                    }
                }
            },
        }

        elems
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn update_record(prefix: &str, peer_asn: u32) -> MrtRecord {
        MrtRecord {
            common_header: CommonHeader {
                timestamp: 100,
                microsecond_timestamp: None,
                entry_type: EntryType::BGP4MP,
                entry_subtype: 1,
                length: 0,
            },
            message: MrtMessage::Bgp4Mp(Bgp4MpEnum::Message(Bgp4MpMessage {
                msg_type: Bgp4MpType::Message,
                peer_asn: Asn::new_32bit(peer_asn),
                local_asn: Asn::new_32bit(65000),
                interface_index: 0,
                peer_ip: IpAddr::from_str("10.0.0.1").unwrap(),
                local_ip: IpAddr::from_str("10.0.0.2").unwrap(),
                bgp_message: BgpMessage::Update(BgpUpdateMessage {
                    withdrawn_prefixes: vec![],
                    attributes: Attributes::from(vec![Attribute {
                        attr_type: AttrType::AS_PATH,
                        value: AttributeValue::AsPath(AsPath::from_sequence([peer_asn, 200])),
                        flag: AttrFlags::TRANSITIVE,
                    }]),
                    announced_prefixes: vec![NetworkPrefix::from_str(prefix).unwrap()],
                }),
            })),
        }
    }

    #[test]
    fn test_update_to_elem() {
        let mut elementor = Elementor::new();
        let elems = elementor.record_to_elems("rrc00", update_record("10.0.0.0/24", 100));
        assert_eq!(elems.len(), 1);
        let elem = &elems[0];
        assert_eq!(elem.elem_type, ElemType::ANNOUNCE);
        assert_eq!(elem.collector, "rrc00");
        assert_eq!(elem.origin_asns, Some(vec![Asn::new_32bit(200)]));
    }

    #[test]
    fn test_withdraw_has_no_attributes() {
        let mut elementor = Elementor::new();
        let mut record = update_record("10.0.0.0/24", 100);
        if let MrtMessage::Bgp4Mp(Bgp4MpEnum::Message(m)) = &mut record.message {
            if let BgpMessage::Update(u) = &mut m.bgp_message {
                u.announced_prefixes.clear();
                u.withdrawn_prefixes.push(NetworkPrefix::from_str("10.0.0.0/24").unwrap());
            }
        }
        let elems = elementor.record_to_elems("rrc00", record);
        assert_eq!(elems.len(), 1);
        assert_eq!(elems[0].elem_type, ElemType::WITHDRAW);
        assert!(elems[0].as_path.is_none());
    }
}
