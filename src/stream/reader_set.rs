//! Merges the head records of every open [`Reader`] into one non-decreasing timestamp order.
//!
//! Backed by a binary min-heap keyed on `(head timestamp, collector, RIB-before-UPDATES,
//! insertion sequence)`, matching the ordering contract documented on [`BgpRecord`].

use crate::error::ParserError;
use crate::stream::filter_set::FilterSet;
use crate::stream::reader::{Reader, ReaderState};
use crate::stream::record::BgpRecord;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

struct HeapItem {
    key: (u32, String, u8, u64),
    reader: Reader,
}

impl PartialEq for HeapItem {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}
impl Eq for HeapItem {}

impl PartialOrd for HeapItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapItem {
    // BinaryHeap is a max-heap; reverse the key comparison to get min-heap behaviour.
    fn cmp(&self, other: &Self) -> Ordering {
        other.key.cmp(&self.key)
    }
}

#[derive(Default)]
pub struct ReaderSet {
    heap: BinaryHeap<HeapItem>,
}

impl ReaderSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn key_for(reader: &Reader) -> (u32, String, u8, u64) {
        let head = reader.head().expect("reader pushed without a primed head");
        (head.timestamp, head.collector.clone(), head.dump_type.tiebreak_rank(), reader.sequence)
    }

    /// Inserts an already-primed reader (one whose `head()` is `Some`).
    pub fn push(&mut self, reader: Reader) {
        if reader.state() != ReaderState::Ready {
            return;
        }
        let key = Self::key_for(&reader);
        self.heap.push(HeapItem { key, reader });
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Emits the globally-earliest head record, advancing its reader and either reinserting it
    /// (more records remain) or dropping it (EOF or a decode failure, which is logged and
    /// treated as non-fatal per the per-reader failure isolation contract).
    pub fn pop_next(&mut self, filters: &FilterSet) -> Result<Option<BgpRecord>, ParserError> {
        let Some(HeapItem { reader: mut reader, .. }) = self.heap.pop() else {
            return Ok(None);
        };
        let record = reader
            .head()
            .cloned()
            .expect("heap entries always carry a primed head");
        match reader.prime(filters) {
            Ok(()) => {
                if reader.state() == ReaderState::Ready {
                    self.push(reader);
                }
            }
            Err(e) => {
                log::warn!(
                    "reader for {} failed decoding and was dropped: {e}",
                    reader.descriptor.url
                );
            }
        }
        Ok(Some(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::input_descriptor::InputDescriptor;
    use crate::stream::record::{BgpRecord, DumpPosition, DumpType};
    use bytes::Bytes;

    fn fake_reader(sequence: u64, ts: u32, collector: &str) -> Reader {
        fake_reader_with_project(sequence, ts, collector, "test")
    }

    fn fake_reader_with_project(sequence: u64, ts: u32, collector: &str, project: &str) -> Reader {
        // Readers normally come from `Reader::open`; tests exercise the heap ordering directly
        // via a constructor that skips I/O.
        Reader::from_parts(
            InputDescriptor::new("mem", DumpType::Updates, collector, project, ts, ts),
            sequence,
            BgpRecord {
                timestamp: ts,
                collector: collector.to_string(),
                project: project.to_string(),
                dump_type: DumpType::Updates,
                position: DumpPosition::Default,
                elements: vec![],
                raw_bytes: Bytes::new(),
            },
        )
    }

    #[test]
    fn emits_in_non_decreasing_timestamp_order() {
        let mut set = ReaderSet::new();
        set.push(fake_reader(0, 300, "rrc00"));
        set.push(fake_reader(1, 100, "rrc01"));
        set.push(fake_reader(2, 200, "rrc02"));
        let filters = FilterSet::new();
        let mut out = vec![];
        while let Some(r) = set.pop_next(&filters).unwrap() {
            out.push(r.timestamp);
        }
        assert_eq!(out, vec![100, 200, 300]);
    }

    #[test]
    fn ties_break_by_collector_then_insertion_order() {
        let mut set = ReaderSet::new();
        set.push(fake_reader(0, 100, "rrc01"));
        set.push(fake_reader(1, 100, "rrc00"));
        let filters = FilterSet::new();
        let first = set.pop_next(&filters).unwrap().unwrap();
        assert_eq!(first.collector, "rrc00");
    }

    #[test]
    fn sequence_tiebreak_uses_the_readers_stable_sequence_not_push_order() {
        // Same collector and timestamp on both: the only thing left to break the tie is
        // `reader.sequence`. The reader opened later (sequence 5) is pushed first, so this
        // would wrongly come out ahead of a push-order-based tiebreak.
        let mut set = ReaderSet::new();
        set.push(fake_reader_with_project(5, 100, "a", "opened-later"));
        set.push(fake_reader_with_project(1, 100, "a", "opened-earlier"));
        let filters = FilterSet::new();
        let first = set.pop_next(&filters).unwrap().unwrap();
        assert_eq!(first.project, "opened-earlier");
        let second = set.pop_next(&filters).unwrap().unwrap();
        assert_eq!(second.project, "opened-later");
    }
}
