//! FIFO of pending [`InputDescriptor`]s, ordered by file timestamp with RIB preceding
//! UPDATES on a tie.

use crate::stream::input_descriptor::InputDescriptor;
use std::collections::{HashSet, VecDeque};

#[derive(Default)]
pub struct InputQueue {
    items: VecDeque<InputDescriptor>,
    seen: HashSet<(String, crate::stream::record::DumpType, u32)>,
}

impl InputQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges newly polled descriptors in, dropping ones already seen and keeping the
    /// queue sorted by ordering key.
    pub fn extend(&mut self, descriptors: Vec<InputDescriptor>) {
        for d in descriptors {
            let key = (d.collector.clone(), d.dump_type, d.file_timestamp);
            if self.seen.insert(key) {
                self.items.push_back(d);
            }
        }
        self.items.make_contiguous().sort();
    }

    pub fn pop_front(&mut self) -> Option<InputDescriptor> {
        self.items.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::record::DumpType;

    fn d(ts: u32, ty: DumpType) -> InputDescriptor {
        InputDescriptor::new("u", ty, "rrc00", "riperis", ts, ts)
    }

    #[test]
    fn rib_sorts_before_updates_on_tie() {
        let mut q = InputQueue::new();
        q.extend(vec![d(100, DumpType::Updates), d(100, DumpType::Rib)]);
        assert_eq!(q.pop_front().unwrap().dump_type, DumpType::Rib);
        assert_eq!(q.pop_front().unwrap().dump_type, DumpType::Updates);
    }

    #[test]
    fn duplicate_descriptors_are_dropped() {
        let mut q = InputQueue::new();
        q.extend(vec![d(100, DumpType::Rib)]);
        q.extend(vec![d(100, DumpType::Rib)]);
        assert_eq!(q.len(), 1);
    }
}
