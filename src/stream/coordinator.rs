//! The top-level pull API: wires a [`FilterSet`], a [`DataInterface`] backend, an
//! [`InputQueue`], and a [`ReaderSet`] together behind a small lifecycle state machine.
//!
//! ```text
//! ALLOCATED --start()--> ON --destroy()--> OFF
//!     ^                    |
//!     +---- error ---------+
//! ```

use crate::error::ParserError;
use crate::stream::clock::{Clock, SystemClock};
use crate::stream::data_interface::csv_catalog::CsvCatalogBackend;
use crate::stream::data_interface::single_file::SingleFileBackend;
use crate::stream::data_interface::sqlite_catalog::SqliteCatalogBackend;
use crate::stream::data_interface::{DataInterface, PollOutcome};
use crate::stream::filter_set::FilterSet;
use crate::stream::input_queue::InputQueue;
use crate::stream::reader::Reader;
use crate::stream::reader_set::ReaderSet;
use crate::stream::record::BgpRecord;
use std::time::Duration;

const INITIAL_BACKOFF: Duration = Duration::from_secs(30);
const MAX_BACKOFF: Duration = Duration::from_secs(3600);
const MAX_CONSECUTIVE_BACKEND_ERRORS: u32 = 3;
const DEFAULT_WINDOW_HINT: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Allocated,
    On,
    Off,
}

/// Outcome of one [`StreamCoordinator::next_record`] call; errors are reported separately as
/// `Err(ParserError)`, so end-of-stream is never confused with failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextStatus {
    Ok,
    EndOfStream,
}

pub struct StreamCoordinator<C: Clock = SystemClock> {
    state: CoordinatorState,
    filters: FilterSet,
    backend: Option<Box<dyn DataInterface>>,
    queue: InputQueue,
    readers: ReaderSet,
    live_mode: bool,
    backoff: Duration,
    window_hint: Duration,
    consecutive_backend_errors: u32,
    interrupted: bool,
    next_reader_seq: u64,
    clock: C,
}

impl StreamCoordinator<SystemClock> {
    pub fn new() -> Self {
        StreamCoordinator::with_clock(SystemClock)
    }
}

impl Default for StreamCoordinator<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> StreamCoordinator<C> {
    pub fn with_clock(clock: C) -> Self {
        StreamCoordinator {
            state: CoordinatorState::Allocated,
            filters: FilterSet::new(),
            backend: None,
            queue: InputQueue::new(),
            readers: ReaderSet::new(),
            live_mode: false,
            backoff: INITIAL_BACKOFF,
            window_hint: DEFAULT_WINDOW_HINT,
            consecutive_backend_errors: 0,
            interrupted: false,
            next_reader_seq: 0,
            clock,
        }
    }

    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    fn require_allocated(&self) -> Result<(), ParserError> {
        if self.state != CoordinatorState::Allocated {
            return Err(ParserError::InvalidState(
                "filters and data interface can only be configured before start()".to_string(),
            ));
        }
        Ok(())
    }

    pub fn add_interval(&mut self, begin: u32, end: u32) -> Result<(), ParserError> {
        self.require_allocated()?;
        self.filters.add_interval(begin, end)
    }

    pub fn add_recent(&mut self, spec: &str) -> Result<(), ParserError> {
        self.require_allocated()?;
        self.filters.add_recent(spec)
    }

    pub fn add_rib_period(&mut self, seconds: u32) -> Result<(), ParserError> {
        self.require_allocated()?;
        self.filters.add_rib_period(seconds)
    }

    pub fn add_collector(&mut self, name: &str) -> Result<(), ParserError> {
        self.require_allocated()?;
        self.filters.add_collector(name)
    }

    pub fn add_project(&mut self, name: &str) -> Result<(), ParserError> {
        self.require_allocated()?;
        self.filters.add_project(name)
    }

    pub fn add_peer_asn(&mut self, asn: u32) -> Result<(), ParserError> {
        self.require_allocated()?;
        self.filters.add_peer_asn(asn)
    }

    pub fn add_prefix(
        &mut self,
        prefix: &str,
        match_type: crate::stream::filter_set::PrefixMatchType,
    ) -> Result<(), ParserError> {
        self.require_allocated()?;
        self.filters.add_prefix(prefix, match_type)
    }

    pub fn add_elem_type(&mut self, elem_type: crate::models::ElemType) -> Result<(), ParserError> {
        self.require_allocated()?;
        self.filters.add_elem_type(elem_type)
    }

    pub fn set_live_mode(&mut self, live: bool) -> Result<(), ParserError> {
        self.require_allocated()?;
        self.live_mode = live;
        Ok(())
    }

    pub fn set_data_interface(&mut self, name: &str) -> Result<(), ParserError> {
        self.require_allocated()?;
        let backend: Box<dyn DataInterface> = match name {
            "single-file" | "singlefile" => Box::new(SingleFileBackend::new()),
            "csv" => Box::new(CsvCatalogBackend::new()),
            "sqlite" | "sqlite3" => Box::new(SqliteCatalogBackend::new()),
            other => return Err(ParserError::UnknownBackend(other.to_string())),
        };
        self.backend = Some(backend);
        Ok(())
    }

    pub fn set_data_interface_option(&mut self, option: &str, value: &str) -> Result<(), ParserError> {
        self.require_allocated()?;
        let backend = self
            .backend
            .as_mut()
            .ok_or_else(|| ParserError::InvalidState("call set_data_interface before setting options".to_string()))?;
        backend.configure(option, value)
    }

    /// Cooperative cancellation: observed the next time `next_record` polls the backend or
    /// advances a reader.
    pub fn interrupt(&mut self) {
        self.interrupted = true;
    }

    pub fn start(&mut self) -> Result<(), ParserError> {
        if self.state != CoordinatorState::Allocated {
            return Err(ParserError::InvalidState("start() called outside ALLOCATED state".to_string()));
        }
        self.filters.validate()?;
        let backend = self
            .backend
            .as_mut()
            .ok_or_else(|| ParserError::InvalidState("no data interface configured".to_string()))?;
        backend.start()?;
        self.filters.freeze();
        self.refill()?;
        self.state = CoordinatorState::On;
        Ok(())
    }

    /// Opens every descriptor currently in the queue into the reader set.
    fn drain_queue_into_readers(&mut self) {
        while let Some(descriptor) = self.queue.pop_front() {
            let seq = self.next_reader_seq;
            self.next_reader_seq += 1;
            match Reader::open(descriptor, seq, &self.filters) {
                Ok(reader) => self.readers.push(reader),
                Err(e) => log::warn!("failed to open reader: {e}"),
            }
        }
    }

    /// Polls the backend once, queues admitted descriptors, and opens them as readers. Returns
    /// `true` if new readers became available.
    fn refill(&mut self) -> Result<bool, ParserError> {
        let backend = self
            .backend
            .as_mut()
            .ok_or_else(|| ParserError::InvalidState("no data interface configured".to_string()))?;
        match backend.poll(&mut self.filters, self.window_hint) {
            Ok(PollOutcome::Ready(descriptors)) => {
                self.consecutive_backend_errors = 0;
                self.backoff = INITIAL_BACKOFF;
                let admitted: Vec<_> = descriptors
                    .into_iter()
                    .filter(|d| self.filters.coarse_match(d))
                    .collect();
                let any = !admitted.is_empty();
                self.queue.extend(admitted);
                self.drain_queue_into_readers();
                Ok(any)
            }
            Ok(PollOutcome::Empty) => {
                self.consecutive_backend_errors = 0;
                Ok(false)
            }
            Err(e) => {
                self.consecutive_backend_errors += 1;
                if self.consecutive_backend_errors >= MAX_CONSECUTIVE_BACKEND_ERRORS {
                    return Err(e);
                }
                log::warn!("data interface poll failed ({}/{MAX_CONSECUTIVE_BACKEND_ERRORS}): {e}", self.consecutive_backend_errors);
                Ok(false)
            }
        }
    }

    /// Blocks (in live mode) or returns end-of-stream (bounded mode) until a record is
    /// available, emitting it into `out`.
    pub fn next_record(&mut self, out: &mut Option<BgpRecord>) -> Result<NextStatus, ParserError> {
        *out = None;
        if self.state != CoordinatorState::On {
            return Err(ParserError::InvalidState("next_record() called outside ON state".to_string()));
        }
        loop {
            if self.interrupted {
                self.interrupted = false;
                return Err(ParserError::Interrupted);
            }
            if let Some(record) = self.readers.pop_next(&self.filters)? {
                *out = Some(record);
                return Ok(NextStatus::Ok);
            }
            let got_more = self.refill()?;
            if got_more {
                continue;
            }
            if !self.live_mode {
                return Ok(NextStatus::EndOfStream);
            }
            self.sleep_backoff();
        }
    }

    /// Sleeps the current backoff duration, then doubles it (capped at [`MAX_BACKOFF`]). Reset
    /// to [`INITIAL_BACKOFF`] by [`Self::refill`] whenever a poll finds something.
    fn sleep_backoff(&mut self) {
        self.clock.sleep(self.backoff);
        self.backoff = (self.backoff * 2).min(MAX_BACKOFF);
    }

    pub fn destroy(&mut self) {
        if let Some(backend) = self.backend.as_mut() {
            backend.close();
        }
        self.state = CoordinatorState::Off;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::clock::FakeClock;

    #[test]
    fn start_without_interval_is_no_interval_error() {
        let mut c = StreamCoordinator::new();
        c.set_data_interface("single-file").unwrap();
        c.set_data_interface_option("path", "x").unwrap();
        assert!(matches!(c.start(), Err(ParserError::NoInterval)));
    }

    #[test]
    fn start_without_backend_is_invalid_state() {
        let mut c = StreamCoordinator::new();
        c.add_interval(0, crate::stream::filter_set::FOREVER).unwrap();
        assert!(matches!(c.start(), Err(ParserError::InvalidState(_))));
    }

    #[test]
    fn configuration_after_start_is_rejected() {
        let mut c = StreamCoordinator::new();
        c.add_interval(0, crate::stream::filter_set::FOREVER).unwrap();
        c.set_data_interface("single-file").unwrap();
        c.set_data_interface_option("path", "nonexistent-file-for-test").unwrap();
        // A nonexistent path doesn't fail start(): drain_queue_into_readers() only logs and
        // skips descriptors whose Reader::open fails, so the coordinator still reaches ON.
        c.start().unwrap();
        assert!(matches!(c.add_collector("rrc00"), Err(ParserError::InvalidState(_))));
    }

    #[test]
    fn unknown_backend_name_is_rejected() {
        let mut c = StreamCoordinator::new();
        assert!(matches!(
            c.set_data_interface("not-a-backend"),
            Err(ParserError::UnknownBackend(_))
        ));
    }

    #[test]
    fn backoff_doubles_up_to_cap() {
        let mut c = StreamCoordinator::with_clock(FakeClock::default());
        for _ in 0..4 {
            c.sleep_backoff();
        }
        assert_eq!(
            c.clock.sleeps,
            vec![
                Duration::from_secs(30),
                Duration::from_secs(60),
                Duration::from_secs(120),
                Duration::from_secs(240),
            ]
        );
        for _ in 0..10 {
            c.sleep_backoff();
        }
        assert_eq!(c.backoff, MAX_BACKOFF);
    }

    #[test]
    fn interrupt_is_observed_before_any_work() {
        let mut c = StreamCoordinator::new();
        c.add_interval(0, crate::stream::filter_set::FOREVER).unwrap();
        c.set_data_interface("single-file").unwrap();
        c.set_data_interface_option("path", "nonexistent-file-for-test").unwrap();
        c.state = CoordinatorState::On;
        c.filters.freeze();
        c.interrupt();
        let mut out = None;
        assert!(matches!(c.next_record(&mut out), Err(ParserError::Interrupted)));
    }
}
