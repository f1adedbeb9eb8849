//! Description of one archive file surfaced by a data interface backend.

use crate::stream::record::DumpType;
use std::cmp::Ordering;

/// Identity is `(collector, dump_type, file_timestamp)`; two descriptors that agree on all
/// three describe the same file and are deduplicated by the input queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputDescriptor {
    pub url: String,
    pub dump_type: DumpType,
    pub collector: String,
    pub project: String,
    pub file_timestamp: u32,
    pub initial_scan_time: u32,
}

impl InputDescriptor {
    pub fn new(
        url: impl Into<String>,
        dump_type: DumpType,
        collector: impl Into<String>,
        project: impl Into<String>,
        file_timestamp: u32,
        initial_scan_time: u32,
    ) -> Self {
        InputDescriptor {
            url: url.into(),
            dump_type,
            collector: collector.into(),
            project: project.into(),
            file_timestamp,
            initial_scan_time,
        }
    }

    pub(crate) fn identity(&self) -> (&str, DumpType, u32) {
        (self.collector.as_str(), self.dump_type, self.file_timestamp)
    }

    /// `(file_timestamp, RIB-before-UPDATES)`, the ordering key used by the input queue.
    fn sort_key(&self) -> (u32, u8) {
        (self.file_timestamp, self.dump_type.tiebreak_rank())
    }
}

impl PartialOrd for InputDescriptor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for InputDescriptor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}
