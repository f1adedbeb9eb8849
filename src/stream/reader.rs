//! Decodes one input file into a sequence of [`BgpRecord`]s, tracking RIB dump position with
//! a one-record lookahead.

use crate::decoder::decode_mrt_record;
use crate::decoder::elementor::Elementor;
use crate::error::ParserError;
use crate::stream::filter_set::FilterSet;
use crate::stream::input_descriptor::InputDescriptor;
use crate::stream::record::{BgpRecord, DumpPosition, DumpType};
use bytes::Bytes;
use std::io::Read;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    Opening,
    Ready,
    Eof,
    Failed,
}

pub struct Reader {
    pub descriptor: InputDescriptor,
    pub sequence: u64,
    state: ReaderState,
    io_reader: Option<Box<dyn Read>>,
    elementor: Elementor,
    head: Option<BgpRecord>,
    lookahead: Option<BgpRecord>,
    produced_any: bool,
}

impl Reader {
    pub fn open(descriptor: InputDescriptor, sequence: u64, filters: &FilterSet) -> Result<Reader, ParserError> {
        let io_reader = oneio::get_reader(&descriptor.url)
            .map_err(|e| ParserError::BackendStart(format!("{}: {e}", descriptor.url)))?;
        let mut reader = Reader {
            descriptor,
            sequence,
            state: ReaderState::Opening,
            io_reader: Some(io_reader),
            elementor: Elementor::new(),
            head: None,
            lookahead: None,
            produced_any: false,
        };
        reader.lookahead = reader.decode_admitted(filters)?;
        reader.state = if reader.lookahead.is_some() {
            ReaderState::Ready
        } else {
            ReaderState::Eof
        };
        Ok(reader)
    }

    pub fn state(&self) -> ReaderState {
        self.state
    }

    pub fn head(&self) -> Option<&BgpRecord> {
        self.head.as_ref()
    }

    pub fn head_timestamp(&self) -> Option<u32> {
        self.head.as_ref().map(|r| r.timestamp)
    }

    /// Pulls the next record past the current lookahead, decoding (and fine-filtering) until one
    /// is admitted or the underlying stream is exhausted.
    pub fn prime(&mut self, filters: &FilterSet) -> Result<(), ParserError> {
        debug_assert_ne!(self.state, ReaderState::Failed);
        self.head = self.lookahead.take();
        match self.decode_admitted(filters) {
            Ok(next) => {
                self.lookahead = next;
                self.state = if self.head.is_some() {
                    ReaderState::Ready
                } else {
                    ReaderState::Eof
                };
            }
            Err(e) => {
                self.state = ReaderState::Failed;
                return Err(e);
            }
        }
        if let Some(head) = self.head.as_mut() {
            head.position = self.position_for(head.dump_type, self.lookahead.is_none());
            self.produced_any = true;
        }
        Ok(())
    }

    fn position_for(&self, dump_type: DumpType, is_last: bool) -> DumpPosition {
        if dump_type == DumpType::Updates {
            return DumpPosition::Default;
        }
        let is_first = !self.produced_any;
        match (is_first, is_last) {
            (true, true) => DumpPosition::Last,
            (true, false) => DumpPosition::First,
            (false, true) => DumpPosition::Last,
            (false, false) => DumpPosition::Middle,
        }
    }

    /// Decodes successive MRT records from the byte stream until one survives `filters.fine_match`
    /// on at least one of its elements, or the stream ends.
    fn decode_admitted(&mut self, filters: &FilterSet) -> Result<Option<BgpRecord>, ParserError> {
        loop {
            let Some(raw_bytes) = self.read_one_record_bytes()? else {
                return Ok(None);
            };
            let mut buf = raw_bytes.clone();
            let mrt_record = decode_mrt_record(&mut buf)?;
            let timestamp = mrt_record.common_header.timestamp;
            let dump_type = match &mrt_record.message {
                crate::models::MrtMessage::Bgp4Mp(_) => DumpType::Updates,
                _ => DumpType::Rib,
            };
            let elements: Vec<_> = self
                .elementor
                .record_to_elems(&self.descriptor.collector, mrt_record)
                .into_iter()
                .filter(|e| filters.fine_match(e))
                .collect();
            if elements.is_empty() {
                continue;
            }
            return Ok(Some(BgpRecord {
                timestamp,
                collector: self.descriptor.collector.clone(),
                project: self.descriptor.project.clone(),
                dump_type,
                position: DumpPosition::Default,
                elements,
                raw_bytes,
            }));
        }
    }

    /// Reads exactly one MRT record's worth of bytes (base header, optional ET timestamp, and
    /// body) off the underlying stream.
    fn read_one_record_bytes(&mut self) -> Result<Option<Bytes>, ParserError> {
        let io_reader = self
            .io_reader
            .as_mut()
            .ok_or_else(|| ParserError::InvalidState("reader already closed".to_string()))?;
        let mut header = [0u8; 12];
        if !read_exact_or_eof(io_reader.as_mut(), &mut header)? {
            return Ok(None);
        }
        let length = u32::from_be_bytes([header[8], header[9], header[10], header[11]]) as usize;
        let mut rest = vec![0u8; length];
        io_reader
            .read_exact(&mut rest)
            .map_err(|e| ParserError::TruncatedMsg(format!("truncated MRT record body: {e}")))?;
        let mut buf = Vec::with_capacity(12 + length);
        buf.extend_from_slice(&header);
        buf.extend_from_slice(&rest);
        Ok(Some(Bytes::from(buf)))
    }

    pub fn close(&mut self) {
        self.io_reader = None;
        self.state = ReaderState::Eof;
    }

    /// Builds a reader already sitting on a given head record, with no underlying byte stream.
    /// Used by [`crate::stream::reader_set`] tests to exercise merge ordering without real I/O.
    #[cfg(test)]
    pub(crate) fn from_parts(descriptor: InputDescriptor, sequence: u64, head: BgpRecord) -> Reader {
        Reader {
            descriptor,
            sequence,
            state: ReaderState::Ready,
            io_reader: None,
            elementor: Elementor::new(),
            head: Some(head),
            lookahead: None,
            produced_any: true,
        }
    }
}

/// Like [`Read::read_exact`], but returns `Ok(false)` instead of an error when the stream is
/// exhausted before any byte of `buf` is read, and errors on a partial read (truncated file).
fn read_exact_or_eof(reader: &mut dyn Read, buf: &mut [u8]) -> Result<bool, ParserError> {
    let mut read = 0;
    while read < buf.len() {
        match reader.read(&mut buf[read..]) {
            Ok(0) => {
                if read == 0 {
                    return Ok(false);
                }
                return Err(ParserError::TruncatedMsg(
                    "truncated MRT common header".to_string(),
                ));
            }
            Ok(n) => read += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(ParserError::IoError(e)),
        }
    }
    Ok(true)
}
