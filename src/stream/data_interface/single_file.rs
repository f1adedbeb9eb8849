//! Backend that serves exactly one pre-known file, for parsing a single MRT archive without a
//! catalog, through the same streaming data interface contract the catalog-backed backends use.

use crate::error::ParserError;
use crate::stream::data_interface::{DataInterface, PollOutcome};
use crate::stream::filter_set::FilterSet;
use crate::stream::input_descriptor::InputDescriptor;
use crate::stream::record::DumpType;
use std::time::Duration;

#[derive(Default)]
pub struct SingleFileBackend {
    url: Option<String>,
    collector: String,
    project: String,
    dump_type: Option<DumpType>,
    timestamp: u32,
    delivered: bool,
}

impl SingleFileBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DataInterface for SingleFileBackend {
    fn configure(&mut self, option: &str, value: &str) -> Result<(), ParserError> {
        match option {
            "path" | "url" | "rib-file" | "upd-file" => self.url = Some(value.to_string()),
            "collector" => self.collector = value.to_string(),
            "project" => self.project = value.to_string(),
            "type" => {
                self.dump_type = Some(match value {
                    "rib" | "ribs" => DumpType::Rib,
                    "updates" => DumpType::Updates,
                    other => {
                        return Err(ParserError::InvalidOptionValue(format!(
                            "unknown dump type '{other}', expected 'rib' or 'updates'"
                        )))
                    }
                });
            }
            "timestamp" => {
                self.timestamp = value
                    .parse()
                    .map_err(|_| ParserError::InvalidOptionValue(format!("invalid timestamp '{value}'")))?;
            }
            other => return Err(ParserError::UnknownOption(other.to_string())),
        }
        Ok(())
    }

    fn start(&mut self) -> Result<(), ParserError> {
        if self.url.is_none() {
            return Err(ParserError::BackendStart(
                "single-file backend requires a 'path' option".to_string(),
            ));
        }
        Ok(())
    }

    fn poll(&mut self, _filters: &mut FilterSet, _window_hint: Duration) -> Result<PollOutcome, ParserError> {
        if self.delivered {
            return Ok(PollOutcome::Empty);
        }
        let url = self
            .url
            .clone()
            .ok_or_else(|| ParserError::InvalidState("backend not started".to_string()))?;
        self.delivered = true;
        let dump_type = self.dump_type.unwrap_or(DumpType::Updates);
        let descriptor = InputDescriptor::new(
            url,
            dump_type,
            self.collector.clone(),
            self.project.clone(),
            self.timestamp,
            self.timestamp,
        );
        Ok(PollOutcome::Ready(vec![descriptor]))
    }

    fn close(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivers_once_then_empty() {
        let mut backend = SingleFileBackend::new();
        backend.configure("path", "updates.20220101.0000.bz2").unwrap();
        backend.configure("collector", "rrc00").unwrap();
        backend.configure("type", "updates").unwrap();
        backend.start().unwrap();
        let mut filters = FilterSet::new();
        let window = Duration::from_secs(60);
        match backend.poll(&mut filters, window).unwrap() {
            PollOutcome::Ready(v) => assert_eq!(v.len(), 1),
            PollOutcome::Empty => panic!("expected one descriptor"),
        }
        assert_eq!(backend.poll(&mut filters, window).unwrap(), PollOutcome::Empty);
    }

    #[test]
    fn rejects_start_without_path() {
        let mut backend = SingleFileBackend::new();
        assert!(backend.start().is_err());
    }
}
