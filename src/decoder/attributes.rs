//! Decoding of BGP path attribute TLVs into [`AttributeValue`]s.
//!
//! Only the attributes the stream pipeline actually surfaces on a [`crate::models::BgpElem`]
//! are decoded into typed values; anything else is kept as a raw, unparsed [`AttrRaw`] so the
//! caller can still see that the attribute was present.

use crate::error::ParserError;
use crate::models::*;
use bytes::{Buf, Bytes};
use log::warn;
use std::net::IpAddr;

pub(crate) fn asn_byte_len(asn_len: AsnLength) -> usize {
    match asn_len {
        AsnLength::Bits16 => 2,
        AsnLength::Bits32 => 4,
    }
}

pub(crate) fn read_asn(buf: &mut Bytes, asn_len: AsnLength) -> Result<Asn, ParserError> {
    if buf.remaining() < asn_byte_len(asn_len) {
        return Err(ParserError::TruncatedMsg("truncated ASN".to_string()));
    }
    Ok(match asn_len {
        AsnLength::Bits16 => Asn::new_16bit(buf.get_u16()),
        AsnLength::Bits32 => Asn::new_32bit(buf.get_u32()),
    })
}

pub(crate) fn read_ipv4(buf: &mut Bytes) -> Result<IpAddr, ParserError> {
    if buf.remaining() < 4 {
        return Err(ParserError::TruncatedMsg("truncated IPv4 address".to_string()));
    }
    Ok(IpAddr::from(std::net::Ipv4Addr::from(buf.get_u32())))
}

pub(crate) fn read_ipv6(buf: &mut Bytes) -> Result<IpAddr, ParserError> {
    if buf.remaining() < 16 {
        return Err(ParserError::TruncatedMsg("truncated IPv6 address".to_string()));
    }
    Ok(IpAddr::from(std::net::Ipv6Addr::from(buf.get_u128())))
}

fn parse_as_path(mut input: Bytes, asn_len: AsnLength) -> Result<AsPath, ParserError> {
    let mut segments = Vec::new();
    while input.remaining() > 0 {
        if input.remaining() < 2 {
            return Err(ParserError::TruncatedMsg("truncated AS_PATH segment".to_string()));
        }
        let segment_type = input.get_u8();
        let count = input.get_u8() as usize;
        let mut asns = Vec::with_capacity(count);
        for _ in 0..count {
            asns.push(read_asn(&mut input, asn_len)?);
        }
        let segment = match segment_type {
            1 => AsPathSegment::set(asns.iter().map(|a| a.to_u32()).collect::<Vec<_>>()),
            2 => AsPathSegment::sequence(asns.iter().map(|a| a.to_u32()).collect::<Vec<_>>()),
            3 => AsPathSegment::ConfedSequence(std::borrow::Cow::Owned(asns)),
            4 => AsPathSegment::ConfedSet(std::borrow::Cow::Owned(asns)),
            other => {
                return Err(ParserError::ParseError(format!(
                    "unknown AS_PATH segment type {other}"
                )))
            }
        };
        segments.push(segment);
    }
    Ok(AsPath::from_segments(segments))
}

fn parse_communities(mut input: Bytes) -> Vec<Community> {
    const NO_EXPORT: u32 = 0xFFFF_FF01;
    const NO_ADVERTISE: u32 = 0xFFFF_FF02;
    const NO_EXPORT_SUBCONFED: u32 = 0xFFFF_FF03;
    let mut out = Vec::new();
    while input.remaining() >= 4 {
        let value = input.get_u32();
        out.push(match value {
            NO_EXPORT => Community::NoExport,
            NO_ADVERTISE => Community::NoAdvertise,
            NO_EXPORT_SUBCONFED => Community::NoExportSubConfed,
            v => Community::Custom(Asn::new_16bit((v >> 16) as u16), (v & 0xffff) as u16),
        });
    }
    out
}

fn parse_large_communities(mut input: Bytes) -> Vec<LargeCommunity> {
    let mut out = Vec::new();
    while input.remaining() >= 12 {
        let global_admin = input.get_u32();
        let local_data = [input.get_u32(), input.get_u32()];
        out.push(LargeCommunity::new(global_admin, local_data));
    }
    out
}

fn parse_mp_next_hop(mut input: Bytes) -> Result<Option<NextHopAddress>, ParserError> {
    Ok(match input.remaining() {
        0 => None,
        4 => Some(NextHopAddress::Ipv4(match read_ipv4(&mut input)? {
            IpAddr::V4(v) => v,
            _ => unreachable!(),
        })),
        16 => Some(NextHopAddress::Ipv6(match read_ipv6(&mut input)? {
            IpAddr::V6(v) => v,
            _ => unreachable!(),
        })),
        32 => {
            let a = match read_ipv6(&mut input)? {
                IpAddr::V6(v) => v,
                _ => unreachable!(),
            };
            let b = match read_ipv6(&mut input)? {
                IpAddr::V6(v) => v,
                _ => unreachable!(),
            };
            Some(NextHopAddress::Ipv6LinkLocal(a, b))
        }
        other => {
            return Err(ParserError::ParseError(format!(
                "invalid MP next-hop length: {other}"
            )))
        }
    })
}

/// Parses a run of encoded NLRI prefixes (see RFC 4271 section 4.3). If `add_path` is set, each
/// prefix is preceded by a 4-byte path identifier (RFC 8050).
pub(crate) fn read_nlri_prefixes(mut input: Bytes, afi: Afi, add_path: bool) -> Result<Vec<NetworkPrefix>, ParserError> {
    let mut prefixes = Vec::new();
    while input.remaining() > 0 {
        let path_id = if add_path {
            if input.remaining() < 4 {
                return Err(ParserError::TruncatedMsg("truncated NLRI path identifier".to_string()));
            }
            Some(input.get_u32())
        } else {
            None
        };
        let bit_len = input.get_u8();
        let byte_len = (bit_len as usize).div_ceil(8);
        if input.remaining() < byte_len {
            return Err(ParserError::TruncatedMsg("truncated NLRI prefix".to_string()));
        }
        let mut octets = vec![0u8; if matches!(afi, Afi::Ipv6) { 16 } else { 4 }];
        for slot in octets.iter_mut().take(byte_len) {
            *slot = input.get_u8();
        }
        let addr: IpAddr = match afi {
            Afi::Ipv4 => std::net::Ipv4Addr::new(octets[0], octets[1], octets[2], octets[3]).into(),
            Afi::Ipv6 => {
                let arr: [u8; 16] = octets.as_slice().try_into().unwrap();
                std::net::Ipv6Addr::from(arr).into()
            }
        };
        let net = match addr {
            IpAddr::V4(a) => ipnet::IpNet::V4(
                ipnet::Ipv4Net::new(a, bit_len)
                    .map_err(|e| ParserError::ParseError(e.to_string()))?,
            ),
            IpAddr::V6(a) => ipnet::IpNet::V6(
                ipnet::Ipv6Net::new(a, bit_len)
                    .map_err(|e| ParserError::ParseError(e.to_string()))?,
            ),
        };
        prefixes.push(NetworkPrefix::new(net, path_id));
    }
    Ok(prefixes)
}

/// Parses the BGP path attribute section of an UPDATE message or TABLE_DUMP_V2 RIB entry.
/// `add_path` governs whether MP_REACH/MP_UNREACH NLRI carried inside path attributes are
/// add-path encoded; TABLE_DUMP_V2 RIB entries never are (they track path IDs separately), so
/// callers outside BGP4MP UPDATE decoding always pass `false`.
pub fn parse_attributes(mut input: Bytes, asn_len: AsnLength, add_path: bool) -> Result<Attributes, ParserError> {
    let mut attrs = Vec::new();
    while input.remaining() > 0 {
        if input.remaining() < 2 {
            return Err(ParserError::TruncatedMsg("truncated attribute header".to_string()));
        }
        let flags_byte = input.get_u8();
        let flags = AttrFlags::from_bits_truncate(flags_byte);
        let attr_type_byte = input.get_u8();
        let attr_type = AttrType::from(attr_type_byte);
        let len = if flags.contains(AttrFlags::EXTENDED) {
            if input.remaining() < 2 {
                return Err(ParserError::TruncatedMsg("truncated extended attribute length".to_string()));
            }
            input.get_u16() as usize
        } else {
            if input.remaining() < 1 {
                return Err(ParserError::TruncatedMsg("truncated attribute length".to_string()));
            }
            input.get_u8() as usize
        };
        if input.remaining() < len {
            return Err(ParserError::TruncatedMsg(format!(
                "attribute {attr_type:?} declares {len} bytes but only {} remain",
                input.remaining()
            )));
        }
        let value_bytes = input.copy_to_bytes(len);
        let value = match decode_attribute_value(attr_type, value_bytes.clone(), asn_len, add_path) {
            Ok(Some(v)) => v,
            Ok(None) => AttributeValue::Unknown(AttrRaw {
                attr_type,
                bytes: value_bytes.to_vec(),
            }),
            Err(e) => {
                warn!("failed to decode attribute {attr_type:?}: {e}");
                AttributeValue::Unknown(AttrRaw {
                    attr_type,
                    bytes: value_bytes.to_vec(),
                })
            }
        };
        attrs.push(Attribute {
            attr_type,
            value,
            flag: flags,
        });
    }
    Ok(Attributes::from(attrs))
}

fn decode_attribute_value(
    attr_type: AttrType,
    mut bytes: Bytes,
    asn_len: AsnLength,
    add_path: bool,
) -> Result<Option<AttributeValue>, ParserError> {
    Ok(Some(match attr_type {
        AttrType::ORIGIN => {
            if bytes.len() != 1 {
                return Err(ParserError::ParseError("ORIGIN must be 1 byte".to_string()));
            }
            AttributeValue::Origin(Origin::try_from(bytes[0])?)
        }
        AttrType::AS_PATH => AttributeValue::AsPath(parse_as_path(bytes, asn_len)?),
        AttrType::AS4_PATH => AttributeValue::As4Path(parse_as_path(bytes, AsnLength::Bits32)?),
        AttrType::NEXT_HOP => {
            AttributeValue::NextHop(read_ipv4(&mut bytes)?)
        }
        AttrType::MULTI_EXIT_DISCRIMINATOR => {
            if bytes.len() != 4 {
                return Err(ParserError::ParseError("MED must be 4 bytes".to_string()));
            }
            AttributeValue::MultiExitDiscriminator(u32::from_be_bytes(bytes[..4].try_into().unwrap()))
        }
        AttrType::LOCAL_PREFERENCE => {
            if bytes.len() != 4 {
                return Err(ParserError::ParseError(
                    "LOCAL_PREF must be 4 bytes".to_string(),
                ));
            }
            AttributeValue::LocalPreference(u32::from_be_bytes(bytes[..4].try_into().unwrap()))
        }
        AttrType::ATOMIC_AGGREGATE => AttributeValue::AtomicAggregate(AtomicAggregate::AG),
        AttrType::AGGREGATOR | AttrType::AS4_AGGREGATOR => {
            let mut b = bytes;
            let len = if attr_type == AttrType::AS4_AGGREGATOR {
                AsnLength::Bits32
            } else {
                asn_len
            };
            let asn = read_asn(&mut b, len)?;
            let ip = read_ipv4(&mut b)?;
            AttributeValue::Aggregator(asn, ip)
        }
        AttrType::COMMUNITIES => AttributeValue::Communities(parse_communities(bytes)),
        AttrType::LARGE_COMMUNITIES => {
            AttributeValue::LargeCommunities(parse_large_communities(bytes))
        }
        AttrType::ONLY_TO_CUSTOMER => {
            if bytes.len() != 4 {
                return Err(ParserError::ParseError("OTC must be 4 bytes".to_string()));
            }
            AttributeValue::OnlyToCustomer(u32::from_be_bytes(bytes[..4].try_into().unwrap()))
        }
        AttrType::ORIGINATOR_ID => AttributeValue::OriginatorId(read_ipv4(&mut bytes)?),
        AttrType::MP_REACHABLE_NLRI => {
            let mut b = bytes;
            if b.remaining() < 3 {
                return Err(ParserError::TruncatedMsg("truncated MP_REACH_NLRI".to_string()));
            }
            let afi = Afi::try_from(b.get_u16())?;
            let safi = Safi::try_from(b.get_u8())?;
            let next_hop_len = b.get_u8() as usize;
            if b.remaining() < next_hop_len {
                return Err(ParserError::TruncatedMsg("truncated MP_REACH next-hop".to_string()));
            }
            let next_hop_bytes = b.copy_to_bytes(next_hop_len);
            let next_hop = parse_mp_next_hop(next_hop_bytes)?;
            if b.remaining() < 1 {
                return Err(ParserError::TruncatedMsg("truncated MP_REACH reserved byte".to_string()));
            }
            let _reserved = b.get_u8();
            let prefixes = read_nlri_prefixes(b, afi, add_path)?;
            AttributeValue::MpReachNlri(Nlri {
                afi,
                safi,
                next_hop,
                prefixes,
            })
        }
        AttrType::MP_UNREACHABLE_NLRI => {
            let mut b = bytes;
            if b.remaining() < 3 {
                return Err(ParserError::TruncatedMsg("truncated MP_UNREACH_NLRI".to_string()));
            }
            let afi = Afi::try_from(b.get_u16())?;
            let safi = Safi::try_from(b.get_u8())?;
            let prefixes = read_nlri_prefixes(b, afi, add_path)?;
            AttributeValue::MpUnreachNlri(Nlri {
                afi,
                safi,
                next_hop: None,
                prefixes,
            })
        }
        _ => return Ok(None),
    }))
}
