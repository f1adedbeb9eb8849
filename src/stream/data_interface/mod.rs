//! The contract a data source implements to feed [`InputDescriptor`]s into the pipeline, plus
//! the reference backends named in the external interface: a single fixed file, a CSV catalog,
//! and a SQLite catalog.

pub mod csv_catalog;
pub mod single_file;
pub mod sqlite_catalog;

use crate::error::ParserError;
use crate::stream::filter_set::FilterSet;
use crate::stream::input_descriptor::InputDescriptor;
use std::time::Duration;

/// Result of one [`DataInterface::poll`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Newly discovered inputs, already known to pass the filter set's coarse predicates.
    Ready(Vec<InputDescriptor>),
    /// Nothing new since the last poll.
    Empty,
}

/// A source of [`InputDescriptor`]s. Implementations are free to represent a single file, a
/// static catalog, or a live-growing one; the coordinator drives them uniformly through
/// `configure` -> `start` -> repeated `poll` -> `close`.
pub trait DataInterface {
    /// Sets one backend-specific option. Unrecognized names are [`ParserError::UnknownOption`];
    /// recognized names with an unparsable value are [`ParserError::InvalidOptionValue`].
    fn configure(&mut self, option: &str, value: &str) -> Result<(), ParserError>;

    /// Validates configuration and opens any resources the backend needs before polling.
    fn start(&mut self) -> Result<(), ParserError>;

    /// Looks for new inputs. `window_hint` is advisory: backends that can cheaply bound their
    /// search (a catalog query, a directory scan) may use it, but must still return every input
    /// they know about sooner or later.
    fn poll(&mut self, filters: &mut FilterSet, window_hint: Duration) -> Result<PollOutcome, ParserError>;

    /// Releases backend resources. Idempotent.
    fn close(&mut self);
}
