//! The value delivered to callers of the stream pipeline.

use crate::models::BgpElem;
use bytes::Bytes;

/// Which half of a RIB/UPDATES pair an input belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DumpType {
    Rib,
    Updates,
}

impl DumpType {
    /// RIB sorts before UPDATES when both share a close timestamp.
    pub(crate) fn tiebreak_rank(&self) -> u8 {
        match self {
            DumpType::Rib => 0,
            DumpType::Updates => 1,
        }
    }
}

/// Where a record sits within a RIB dump file; always [`DumpPosition::Default`] for UPDATES.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DumpPosition {
    First,
    Middle,
    Last,
    Default,
}

/// One decoded MRT record, annotated with the stream metadata a caller needs
/// to make sense of it without tracking which file it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct BgpRecord {
    pub timestamp: u32,
    pub collector: String,
    pub project: String,
    pub dump_type: DumpType,
    pub position: DumpPosition,
    pub elements: Vec<BgpElem>,
    /// The untouched on-the-wire MRT bytes this record was decoded from, kept around for
    /// callers that want to re-encode or archive verbatim without re-fetching the source file.
    pub raw_bytes: Bytes,
}
