//! Backend that reads a flat CSV catalog of the form
//! `path,type,collector,project,filetime,runtime` (POSIX seconds), re-scanning the file on
//! every poll so rows appended after the coordinator starts are picked up in live mode.

use crate::error::ParserError;
use crate::stream::data_interface::{DataInterface, PollOutcome};
use crate::stream::filter_set::FilterSet;
use crate::stream::input_descriptor::InputDescriptor;
use crate::stream::record::DumpType;
use std::collections::HashSet;
use std::time::Duration;

#[derive(Default)]
pub struct CsvCatalogBackend {
    csv_file: Option<String>,
    seen: HashSet<(String, DumpType, u32)>,
}

impl CsvCatalogBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn parse_row(record: &csv::StringRecord) -> Result<InputDescriptor, ParserError> {
        let field = |i: usize, name: &str| -> Result<&str, ParserError> {
            record
                .get(i)
                .ok_or_else(|| ParserError::ParseError(format!("csv catalog row missing column '{name}'")))
        };
        let path = field(0, "path")?.to_string();
        let dump_type = match field(1, "type")? {
            "ribs" | "rib" => DumpType::Rib,
            "updates" => DumpType::Updates,
            other => {
                return Err(ParserError::ParseError(format!(
                    "csv catalog row has unknown type '{other}'"
                )))
            }
        };
        let collector = field(2, "collector")?.to_string();
        let project = field(3, "project")?.to_string();
        let filetime: u32 = field(4, "filetime")?
            .parse()
            .map_err(|_| ParserError::ParseError("csv catalog row has non-numeric filetime".to_string()))?;
        let runtime: u32 = field(5, "runtime")?
            .parse()
            .map_err(|_| ParserError::ParseError("csv catalog row has non-numeric runtime".to_string()))?;
        Ok(InputDescriptor::new(path, dump_type, collector, project, filetime, runtime))
    }
}

impl DataInterface for CsvCatalogBackend {
    fn configure(&mut self, option: &str, value: &str) -> Result<(), ParserError> {
        match option {
            "csv-file" => {
                self.csv_file = Some(value.to_string());
                Ok(())
            }
            other => Err(ParserError::UnknownOption(other.to_string())),
        }
    }

    fn start(&mut self) -> Result<(), ParserError> {
        if self.csv_file.is_none() {
            return Err(ParserError::BackendStart(
                "csv catalog backend requires a 'csv-file' option".to_string(),
            ));
        }
        Ok(())
    }

    fn poll(&mut self, _filters: &mut FilterSet, _window_hint: Duration) -> Result<PollOutcome, ParserError> {
        let path = self
            .csv_file
            .as_ref()
            .ok_or_else(|| ParserError::InvalidState("backend not started".to_string()))?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_path(path)
            .map_err(|e| ParserError::BackendQuery(format!("cannot open csv catalog {path}: {e}")))?;

        let mut fresh = Vec::new();
        for result in reader.records() {
            let record = result.map_err(|e| ParserError::BackendQuery(format!("malformed csv row: {e}")))?;
            let descriptor = Self::parse_row(&record)?;
            let key = descriptor.identity();
            let key = (key.0.to_string(), key.1, key.2);
            if self.seen.insert(key) {
                fresh.push(descriptor);
            }
        }
        if fresh.is_empty() {
            Ok(PollOutcome::Empty)
        } else {
            Ok(PollOutcome::Ready(fresh))
        }
    }

    fn close(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn second_poll_only_returns_new_rows() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "/data/rib.20220101.0000.gz,ribs,rrc00,riperis,1640995200,1640995200").unwrap();
        file.flush().unwrap();

        let mut backend = CsvCatalogBackend::new();
        backend.configure("csv-file", file.path().to_str().unwrap()).unwrap();
        backend.start().unwrap();
        let mut filters = FilterSet::new();
        let window = Duration::from_secs(60);

        match backend.poll(&mut filters, window).unwrap() {
            PollOutcome::Ready(v) => assert_eq!(v.len(), 1),
            PollOutcome::Empty => panic!("expected one descriptor"),
        }
        assert_eq!(backend.poll(&mut filters, window).unwrap(), PollOutcome::Empty);

        writeln!(file, "/data/upd.20220101.0005.gz,updates,rrc00,riperis,1640995500,1640995500").unwrap();
        file.flush().unwrap();
        match backend.poll(&mut filters, window).unwrap() {
            PollOutcome::Ready(v) => assert_eq!(v.len(), 1),
            PollOutcome::Empty => panic!("expected the newly appended row"),
        }
    }
}
