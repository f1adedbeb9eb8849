//! Decoding of on-wire MRT records into the typed model tree under [`crate::models`].
//!
//! This module is purely byte-in, struct-out: it knows nothing about files, archives, or byte
//! sources. Callers hand it exactly one record's worth of bytes at a time (see
//! [`crate::stream::reader`]), which keeps it trivial to unit test and reuse across every
//! [`crate::stream::data_interface`] backend.

pub mod attributes;
pub mod elementor;

use crate::error::ParserError;
use crate::models::*;
use attributes::{parse_attributes, read_asn, read_ipv4, read_ipv6, read_nlri_prefixes};
use bytes::{Buf, Bytes};
use std::collections::HashMap;
use std::net::IpAddr;

/// Decodes a single MRT common header from the front of `buf`, advancing past it.
///
/// `_ET` entry types carry a 4-byte microsecond timestamp inside the header; the on-wire
/// `length` field for those types includes those 4 bytes, so it is adjusted back down to the
/// length of the message body alone to match [`CommonHeader::length`]'s documented meaning.
pub fn decode_common_header(buf: &mut Bytes) -> Result<CommonHeader, ParserError> {
    if buf.remaining() < 12 {
        return Err(ParserError::TruncatedMsg(
            "truncated MRT common header".to_string(),
        ));
    }
    let timestamp = buf.get_u32();
    let entry_type = EntryType::try_from(buf.get_u16())?;
    let entry_subtype = buf.get_u16();
    let mut length = buf.get_u32();

    let microsecond_timestamp = match entry_type {
        EntryType::BGP4MP_ET | EntryType::ISIS_ET | EntryType::OSPFv3_ET => {
            if length < 4 {
                return Err(ParserError::ParseError(
                    "invalid MRT header length for ET record: length < 4".to_string(),
                ));
            }
            if buf.remaining() < 4 {
                return Err(ParserError::TruncatedMsg(
                    "truncated ET microsecond timestamp".to_string(),
                ));
            }
            length -= 4;
            Some(buf.get_u32())
        }
        _ => None,
    };

    Ok(CommonHeader {
        timestamp,
        microsecond_timestamp,
        entry_type,
        entry_subtype,
        length,
    })
}

/// Decodes a complete MRT record (header + message body) from the front of `buf`.
pub fn decode_mrt_record(buf: &mut Bytes) -> Result<MrtRecord, ParserError> {
    let common_header = decode_common_header(buf)?;
    let body_len = common_header.length as usize;
    if buf.remaining() < body_len {
        return Err(ParserError::TruncatedMsg(format!(
            "record declares {body_len} bytes of body but only {} remain",
            buf.remaining()
        )));
    }
    let mut body = buf.copy_to_bytes(body_len);
    let message = decode_message(&common_header, &mut body)?;
    Ok(MrtRecord {
        common_header,
        message,
    })
}

fn decode_message(header: &CommonHeader, body: &mut Bytes) -> Result<MrtMessage, ParserError> {
    match header.entry_type {
        EntryType::TABLE_DUMP => Ok(MrtMessage::TableDumpMessage(decode_table_dump_v1(
            header.entry_subtype,
            body,
        )?)),
        EntryType::TABLE_DUMP_V2 => Ok(MrtMessage::TableDumpV2Message(decode_table_dump_v2(
            header.entry_subtype,
            body,
        )?)),
        EntryType::BGP4MP | EntryType::BGP4MP_ET => {
            Ok(MrtMessage::Bgp4Mp(decode_bgp4mp(header.entry_subtype, body)?))
        }
        other => Err(ParserError::Unsupported(format!(
            "unsupported MRT entry type: {other:?}"
        ))),
    }
}

fn read_prefix(body: &mut Bytes, afi: Afi) -> Result<NetworkPrefix, ParserError> {
    if body.remaining() < 1 {
        return Err(ParserError::TruncatedMsg("truncated prefix length".to_string()));
    }
    let bit_len = body.get_u8();
    let byte_len = (bit_len as usize).div_ceil(8);
    if body.remaining() < byte_len {
        return Err(ParserError::TruncatedMsg("truncated prefix".to_string()));
    }
    let max_len = if matches!(afi, Afi::Ipv6) { 16 } else { 4 };
    if byte_len > max_len {
        return Err(ParserError::ParseError(format!(
            "prefix length {bit_len} too long for {afi:?}"
        )));
    }
    let mut octets = vec![0u8; max_len];
    for slot in octets.iter_mut().take(byte_len) {
        *slot = body.get_u8();
    }
    let addr: IpAddr = match afi {
        Afi::Ipv4 => std::net::Ipv4Addr::new(octets[0], octets[1], octets[2], octets[3]).into(),
        Afi::Ipv6 => {
            let arr: [u8; 16] = octets.as_slice().try_into().unwrap();
            std::net::Ipv6Addr::from(arr).into()
        }
    };
    let net = match addr {
        IpAddr::V4(a) => {
            ipnet::IpNet::V4(ipnet::Ipv4Net::new(a, bit_len).map_err(|e| ParserError::ParseError(e.to_string()))?)
        }
        IpAddr::V6(a) => {
            ipnet::IpNet::V6(ipnet::Ipv6Net::new(a, bit_len).map_err(|e| ParserError::ParseError(e.to_string()))?)
        }
    };
    Ok(NetworkPrefix::new(net, None))
}

fn decode_table_dump_v1(entry_subtype: u16, body: &mut Bytes) -> Result<TableDumpMessage, ParserError> {
    let afi = match entry_subtype {
        1 => Afi::Ipv4,
        2 => Afi::Ipv6,
        other => return Err(ParserError::Unsupported(format!("unknown TABLE_DUMP AFI subtype {other}"))),
    };
    if body.remaining() < 4 {
        return Err(ParserError::TruncatedMsg("truncated TABLE_DUMP header".to_string()));
    }
    let view_number = body.get_u16();
    let sequence_number = body.get_u16();
    let prefix = read_prefix(body, afi)?;
    if body.remaining() < 6 {
        return Err(ParserError::TruncatedMsg("truncated TABLE_DUMP entry".to_string()));
    }
    let status = body.get_u8();
    let originated_time = body.get_u32() as u64;
    let peer_address = match afi {
        Afi::Ipv4 => read_ipv4(body)?,
        Afi::Ipv6 => read_ipv6(body)?,
    };
    let peer_asn = read_asn(body, AsnLength::Bits16)?;
    if body.remaining() < 2 {
        return Err(ParserError::TruncatedMsg("truncated TABLE_DUMP attribute length".to_string()));
    }
    let attr_len = body.get_u16() as usize;
    if body.remaining() < attr_len {
        return Err(ParserError::TruncatedMsg("truncated TABLE_DUMP attributes".to_string()));
    }
    let attr_bytes = body.copy_to_bytes(attr_len);
    let attributes = parse_attributes(attr_bytes, AsnLength::Bits16, false)?;
    Ok(TableDumpMessage {
        view_number,
        sequence_number,
        prefix,
        status,
        originated_time,
        peer_address,
        peer_asn,
        attributes,
    })
}

fn decode_peer(body: &mut Bytes) -> Result<Peer, ParserError> {
    if body.remaining() < 1 {
        return Err(ParserError::TruncatedMsg("truncated peer entry".to_string()));
    }
    let peer_type = PeerType::from_bits_truncate(body.get_u8());
    let peer_bgp_id = match read_ipv4(body)? {
        IpAddr::V4(v) => v,
        _ => unreachable!(),
    };
    let peer_ip = if peer_type.contains(PeerType::ADDRESS_FAMILY_IPV6) {
        read_ipv6(body)?
    } else {
        read_ipv4(body)?
    };
    let asn_len = if peer_type.contains(PeerType::AS_SIZE_32BIT) {
        AsnLength::Bits32
    } else {
        AsnLength::Bits16
    };
    let peer_asn = read_asn(body, asn_len)?;
    Ok(Peer {
        peer_type,
        peer_bgp_id,
        peer_ip,
        peer_asn,
    })
}

fn decode_peer_index_table(body: &mut Bytes) -> Result<PeerIndexTable, ParserError> {
    let collector_bgp_id = match read_ipv4(body)? {
        IpAddr::V4(v) => v,
        _ => unreachable!(),
    };
    if body.remaining() < 2 {
        return Err(ParserError::TruncatedMsg("truncated view name length".to_string()));
    }
    let view_name_len = body.get_u16() as usize;
    if body.remaining() < view_name_len {
        return Err(ParserError::TruncatedMsg("truncated view name".to_string()));
    }
    let view_name = String::from_utf8_lossy(&body.copy_to_bytes(view_name_len)).into_owned();
    if body.remaining() < 2 {
        return Err(ParserError::TruncatedMsg("truncated peer count".to_string()));
    }
    let peer_count = body.get_u16();
    let mut id_peer_map = HashMap::with_capacity(peer_count as usize);
    let mut peer_ip_id_map = HashMap::with_capacity(peer_count as usize);
    for index in 0..peer_count {
        let peer = decode_peer(body)?;
        peer_ip_id_map.insert(peer.peer_ip, index);
        id_peer_map.insert(index, peer);
    }
    Ok(PeerIndexTable {
        collector_bgp_id,
        view_name,
        id_peer_map,
        peer_ip_id_map,
    })
}

fn read_f32(body: &mut Bytes) -> Result<f32, ParserError> {
    if body.remaining() < 4 {
        return Err(ParserError::TruncatedMsg("truncated float".to_string()));
    }
    Ok(f32::from_bits(body.get_u32()))
}

/// Decodes an RFC 6397 geo-location peer table.
///
/// Same layout as [`PeerIndexTable`] with a collector latitude/longitude pair following the view
/// name, and a per-peer latitude/longitude pair following each peer entry.
fn decode_geo_peer_table(body: &mut Bytes) -> Result<GeoPeerTable, ParserError> {
    let collector_bgp_id = match read_ipv4(body)? {
        IpAddr::V4(v) => v,
        _ => unreachable!(),
    };
    if body.remaining() < 2 {
        return Err(ParserError::TruncatedMsg("truncated view name length".to_string()));
    }
    let view_name_len = body.get_u16() as usize;
    if body.remaining() < view_name_len {
        return Err(ParserError::TruncatedMsg("truncated view name".to_string()));
    }
    let view_name = String::from_utf8_lossy(&body.copy_to_bytes(view_name_len)).into_owned();
    let collector_latitude = read_f32(body)?;
    let collector_longitude = read_f32(body)?;
    if body.remaining() < 2 {
        return Err(ParserError::TruncatedMsg("truncated peer count".to_string()));
    }
    let peer_count = body.get_u16();
    let mut table = GeoPeerTable::new(collector_bgp_id, view_name, collector_latitude, collector_longitude);
    for _ in 0..peer_count {
        let peer = decode_peer(body)?;
        let peer_latitude = read_f32(body)?;
        let peer_longitude = read_f32(body)?;
        table.add_geo_peer(GeoPeer::new(peer, peer_latitude, peer_longitude));
    }
    Ok(table)
}

fn decode_rib_entry(body: &mut Bytes, with_path_id: bool) -> Result<RibEntry, ParserError> {
    if body.remaining() < 6 {
        return Err(ParserError::TruncatedMsg("truncated RIB entry header".to_string()));
    }
    let peer_index = body.get_u16();
    let originated_time = body.get_u32();
    let path_id = if with_path_id {
        if body.remaining() < 4 {
            return Err(ParserError::TruncatedMsg("truncated RIB entry path id".to_string()));
        }
        Some(body.get_u32())
    } else {
        None
    };
    if body.remaining() < 2 {
        return Err(ParserError::TruncatedMsg("truncated RIB entry attribute length".to_string()));
    }
    let attr_len = body.get_u16() as usize;
    if body.remaining() < attr_len {
        return Err(ParserError::TruncatedMsg("truncated RIB entry attributes".to_string()));
    }
    let attr_bytes = body.copy_to_bytes(attr_len);
    // RFC 6396 4.3.4: all ASNs in TABLE_DUMP_V2 RIB entry attributes are 4-byte.
    let attributes = parse_attributes(attr_bytes, AsnLength::Bits32, false)?;
    Ok(RibEntry {
        peer_index,
        originated_time,
        path_id,
        attributes,
    })
}

fn decode_table_dump_v2(entry_subtype: u16, body: &mut Bytes) -> Result<TableDumpV2Message, ParserError> {
    let dump_type = TableDumpV2Type::try_from(entry_subtype)?;
    match dump_type {
        TableDumpV2Type::PeerIndexTable => Ok(TableDumpV2Message::PeerIndexTable(decode_peer_index_table(body)?)),
        TableDumpV2Type::GeoPeerTable => Ok(TableDumpV2Message::GeoPeerTable(decode_geo_peer_table(body)?)),
        TableDumpV2Type::RibIpv4Unicast
        | TableDumpV2Type::RibIpv4Multicast
        | TableDumpV2Type::RibIpv6Unicast
        | TableDumpV2Type::RibIpv6Multicast
        | TableDumpV2Type::RibIpv4UnicastAddPath
        | TableDumpV2Type::RibIpv4MulticastAddPath
        | TableDumpV2Type::RibIpv6UnicastAddPath
        | TableDumpV2Type::RibIpv6MulticastAddPath => {
            let afi = match dump_type {
                TableDumpV2Type::RibIpv4Unicast
                | TableDumpV2Type::RibIpv4Multicast
                | TableDumpV2Type::RibIpv4UnicastAddPath
                | TableDumpV2Type::RibIpv4MulticastAddPath => Afi::Ipv4,
                _ => Afi::Ipv6,
            };
            let with_path_id = matches!(
                dump_type,
                TableDumpV2Type::RibIpv4UnicastAddPath
                    | TableDumpV2Type::RibIpv4MulticastAddPath
                    | TableDumpV2Type::RibIpv6UnicastAddPath
                    | TableDumpV2Type::RibIpv6MulticastAddPath
            );
            if body.remaining() < 4 {
                return Err(ParserError::TruncatedMsg("truncated RIB_AFI header".to_string()));
            }
            let sequence_number = body.get_u32();
            let prefix = read_prefix(body, afi)?;
            if body.remaining() < 2 {
                return Err(ParserError::TruncatedMsg("truncated RIB_AFI entry count".to_string()));
            }
            let entry_count = body.get_u16();
            let mut rib_entries = Vec::with_capacity(entry_count as usize);
            for _ in 0..entry_count {
                rib_entries.push(decode_rib_entry(body, with_path_id)?);
            }
            Ok(TableDumpV2Message::RibAfi(RibAfiEntries {
                rib_type: dump_type,
                sequence_number,
                prefix,
                rib_entries,
            }))
        }
        TableDumpV2Type::RibGeneric | TableDumpV2Type::RibGenericAddPath => Err(ParserError::Unsupported(
            "RIB_GENERIC table dump entries are not supported".to_string(),
        )),
    }
}

fn decode_bgp4mp(entry_subtype: u16, body: &mut Bytes) -> Result<Bgp4MpEnum, ParserError> {
    let msg_type = Bgp4MpType::try_from(entry_subtype)?;
    match msg_type {
        Bgp4MpType::StateChange | Bgp4MpType::StateChangeAs4 => {
            Ok(Bgp4MpEnum::StateChange(decode_bgp4mp_state_change(msg_type, body)?))
        }
        Bgp4MpType::Message | Bgp4MpType::MessageAs4 | Bgp4MpType::MessageLocal | Bgp4MpType::MessageAs4Local => {
            Ok(Bgp4MpEnum::Message(decode_bgp4mp_message(msg_type, body, false)?))
        }
        Bgp4MpType::MessageAddpath
        | Bgp4MpType::MessageAs4Addpath
        | Bgp4MpType::MessageLocalAddpath
        | Bgp4MpType::MessageLocalAs4Addpath => {
            Ok(Bgp4MpEnum::Message(decode_bgp4mp_message(msg_type, body, true)?))
        }
    }
}

fn bgp4mp_asn_len(msg_type: Bgp4MpType) -> AsnLength {
    match msg_type {
        Bgp4MpType::StateChangeAs4 | Bgp4MpType::MessageAs4 | Bgp4MpType::MessageAs4Local => AsnLength::Bits32,
        _ => AsnLength::Bits16,
    }
}

fn decode_bgp4mp_state_change(msg_type: Bgp4MpType, body: &mut Bytes) -> Result<Bgp4MpStateChange, ParserError> {
    let asn_len = bgp4mp_asn_len(msg_type);
    let peer_asn = read_asn(body, asn_len)?;
    let local_asn = read_asn(body, asn_len)?;
    if body.remaining() < 4 {
        return Err(ParserError::TruncatedMsg("truncated BGP4MP state change".to_string()));
    }
    let interface_index = body.get_u16();
    let address_family = body.get_u16();
    let (peer_addr, local_addr) = match address_family {
        1 => (read_ipv4(body)?, read_ipv4(body)?),
        2 => (read_ipv6(body)?, read_ipv6(body)?),
        other => return Err(ParserError::ParseError(format!("unknown BGP4MP address family {other}"))),
    };
    if body.remaining() < 4 {
        return Err(ParserError::TruncatedMsg("truncated BGP4MP state values".to_string()));
    }
    let old_state = BgpState::try_from(body.get_u16())?;
    let new_state = BgpState::try_from(body.get_u16())?;
    Ok(Bgp4MpStateChange {
        msg_type,
        peer_asn,
        local_asn,
        interface_index,
        peer_addr,
        local_addr,
        old_state,
        new_state,
    })
}

fn decode_bgp4mp_message(msg_type: Bgp4MpType, body: &mut Bytes, add_path: bool) -> Result<Bgp4MpMessage, ParserError> {
    let asn_len = bgp4mp_asn_len(msg_type);
    let peer_asn = read_asn(body, asn_len)?;
    let local_asn = read_asn(body, asn_len)?;
    if body.remaining() < 4 {
        return Err(ParserError::TruncatedMsg("truncated BGP4MP message header".to_string()));
    }
    let interface_index = body.get_u16();
    let address_family = body.get_u16();
    let (peer_ip, local_ip) = match address_family {
        1 => (read_ipv4(body)?, read_ipv4(body)?),
        2 => (read_ipv6(body)?, read_ipv6(body)?),
        other => return Err(ParserError::ParseError(format!("unknown BGP4MP address family {other}"))),
    };
    let bgp_message = decode_bgp_message(body, add_path)?;
    Ok(Bgp4MpMessage {
        msg_type,
        peer_asn,
        local_asn,
        interface_index,
        peer_ip,
        local_ip,
        bgp_message,
    })
}

/// Decodes a single BGP message (marker + length + type + body), per RFC 4271 section 4.1.
fn decode_bgp_message(buf: &mut Bytes, add_path: bool) -> Result<BgpMessage, ParserError> {
    if buf.remaining() < 19 {
        return Err(ParserError::TruncatedMsg("truncated BGP message header".to_string()));
    }
    buf.advance(16); // marker: ignored, required to be all-ones outside of OPEN negotiation
    let total_len = buf.get_u16() as usize;
    let msg_type = buf.get_u8();
    if total_len < 19 {
        return Err(ParserError::ParseError(format!("invalid BGP message length {total_len}")));
    }
    let body_len = total_len - 19;
    if buf.remaining() < body_len {
        return Err(ParserError::TruncatedMsg("truncated BGP message body".to_string()));
    }
    let mut body = buf.copy_to_bytes(body_len);
    match msg_type {
        1 => Ok(BgpMessage::Open),
        2 => Ok(BgpMessage::Update(decode_bgp_update(&mut body, add_path)?)),
        3 => Ok(BgpMessage::Notification),
        4 => Ok(BgpMessage::KeepAlive),
        other => Err(ParserError::ParseError(format!("unknown BGP message type {other}"))),
    }
}

fn decode_bgp_update(body: &mut Bytes, add_path: bool) -> Result<BgpUpdateMessage, ParserError> {
    if body.remaining() < 2 {
        return Err(ParserError::TruncatedMsg("truncated withdrawn routes length".to_string()));
    }
    let withdrawn_len = body.get_u16() as usize;
    if body.remaining() < withdrawn_len {
        return Err(ParserError::TruncatedMsg("truncated withdrawn routes".to_string()));
    }
    let withdrawn_bytes = body.copy_to_bytes(withdrawn_len);
    let withdrawn_prefixes = read_nlri_prefixes(withdrawn_bytes, Afi::Ipv4, add_path)?;

    if body.remaining() < 2 {
        return Err(ParserError::TruncatedMsg("truncated path attribute length".to_string()));
    }
    let attr_len = body.get_u16() as usize;
    if body.remaining() < attr_len {
        return Err(ParserError::TruncatedMsg("truncated path attributes".to_string()));
    }
    let attr_bytes = body.copy_to_bytes(attr_len);
    let attributes = parse_attributes(attr_bytes, AsnLength::Bits32, add_path)?;

    let announced_prefixes = read_nlri_prefixes(body.copy_to_bytes(body.remaining()), Afi::Ipv4, add_path)?;

    Ok(BgpUpdateMessage {
        withdrawn_prefixes,
        attributes,
        announced_prefixes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_common_header() {
        let mut buf = Bytes::from_static(&[
            0, 0, 0, 1, // timestamp
            0, 16, // entry type = BGP4MP
            0, 4, // entry subtype
            0, 0, 0, 5, // length
        ]);
        let header = decode_common_header(&mut buf).unwrap();
        assert_eq!(header.timestamp, 1);
        assert_eq!(header.entry_type, EntryType::BGP4MP);
        assert_eq!(header.entry_subtype, 4);
        assert_eq!(header.length, 5);
        assert_eq!(header.microsecond_timestamp, None);
    }

    #[test]
    fn test_decode_common_header_et() {
        let mut buf = Bytes::from_static(&[
            0, 0, 0, 1, // timestamp
            0, 17, // entry type = BGP4MP_ET
            0, 4, // entry subtype
            0, 0, 0, 9, // length (includes 4 bytes for microsecond)
            0, 3, 130, 112, // microsecond timestamp
        ]);
        let header = decode_common_header(&mut buf).unwrap();
        assert_eq!(header.length, 5);
        assert_eq!(header.microsecond_timestamp, Some(230_000));
    }

    #[test]
    fn test_decode_keepalive() {
        let mut buf = Bytes::from_static(&[
            255, 255, 255, 255, 255, 255, 255, 255, 255, 255, 255, 255, 255, 255, 255, 255, // marker
            0, 19, // length
            4, // type = KEEPALIVE
        ]);
        let msg = decode_bgp_message(&mut buf, false).unwrap();
        assert_eq!(msg, BgpMessage::KeepAlive);
    }

    #[test]
    fn test_decode_bgp4mp_message_addpath() {
        let mut update_body = Vec::new();
        update_body.extend_from_slice(&0u16.to_be_bytes()); // withdrawn routes length
        update_body.extend_from_slice(&0u16.to_be_bytes()); // path attribute length
        update_body.extend_from_slice(&7u32.to_be_bytes()); // add-path path id
        update_body.push(24); // prefix length in bits
        update_body.extend_from_slice(&[10, 0, 0]); // 10.0.0.0/24

        let total_len = 19 + update_body.len();
        let mut bgp_message = Vec::new();
        bgp_message.extend_from_slice(&[0xFFu8; 16]);
        bgp_message.extend_from_slice(&(total_len as u16).to_be_bytes());
        bgp_message.push(2); // UPDATE
        bgp_message.extend_from_slice(&update_body);

        let mut body = Vec::new();
        body.extend_from_slice(&100u16.to_be_bytes()); // peer_asn
        body.extend_from_slice(&200u16.to_be_bytes()); // local_asn
        body.extend_from_slice(&0u16.to_be_bytes()); // interface_index
        body.extend_from_slice(&1u16.to_be_bytes()); // address family = ipv4
        body.extend_from_slice(&[10, 0, 0, 1]); // peer_ip
        body.extend_from_slice(&[10, 0, 0, 2]); // local_ip
        body.extend_from_slice(&bgp_message);

        let mut buf = Bytes::from(body);
        let decoded = decode_bgp4mp(Bgp4MpType::MessageAddpath as u16, &mut buf).unwrap();
        let Bgp4MpEnum::Message(msg) = decoded else {
            panic!("expected a BGP4MP message");
        };
        let BgpMessage::Update(update) = msg.bgp_message else {
            panic!("expected an UPDATE message");
        };
        assert_eq!(update.announced_prefixes.len(), 1);
        assert_eq!(update.announced_prefixes[0].path_id, Some(7));
        assert_eq!(update.announced_prefixes[0].prefix.to_string(), "10.0.0.0/24");
    }
}
