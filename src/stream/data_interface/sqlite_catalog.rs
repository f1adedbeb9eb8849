//! Backend that queries a SQLite catalog database for input descriptors, incrementally polling
//! for rows newer than the last one seen. Column and table names are configurable since catalog
//! schemas vary between deployments.

use crate::error::ParserError;
use crate::stream::data_interface::{DataInterface, PollOutcome};
use crate::stream::filter_set::FilterSet;
use crate::stream::input_descriptor::InputDescriptor;
use crate::stream::record::DumpType;
use rusqlite::Connection;
use std::time::Duration;

pub struct SqliteCatalogBackend {
    db_file: Option<String>,
    table: String,
    col_path: String,
    col_type: String,
    col_collector: String,
    col_project: String,
    col_filetime: String,
    conn: Option<Connection>,
    last_filetime: u32,
}

impl Default for SqliteCatalogBackend {
    fn default() -> Self {
        SqliteCatalogBackend {
            db_file: None,
            table: "catalog".to_string(),
            col_path: "path".to_string(),
            col_type: "type".to_string(),
            col_collector: "collector".to_string(),
            col_project: "project".to_string(),
            col_filetime: "filetime".to_string(),
            conn: None,
            last_filetime: 0,
        }
    }
}

impl SqliteCatalogBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DataInterface for SqliteCatalogBackend {
    fn configure(&mut self, option: &str, value: &str) -> Result<(), ParserError> {
        match option {
            "db-file" => self.db_file = Some(value.to_string()),
            "table" => self.table = value.to_string(),
            "col-path" => self.col_path = value.to_string(),
            "col-type" => self.col_type = value.to_string(),
            "col-collector" => self.col_collector = value.to_string(),
            "col-project" => self.col_project = value.to_string(),
            "col-filetime" => self.col_filetime = value.to_string(),
            other => return Err(ParserError::UnknownOption(other.to_string())),
        }
        Ok(())
    }

    fn start(&mut self) -> Result<(), ParserError> {
        let path = self
            .db_file
            .as_ref()
            .ok_or_else(|| ParserError::BackendStart("sqlite catalog backend requires a 'db-file' option".to_string()))?;
        let conn = Connection::open(path)
            .map_err(|e| ParserError::BackendStart(format!("cannot open sqlite catalog {path}: {e}")))?;
        self.conn = Some(conn);
        Ok(())
    }

    fn poll(&mut self, _filters: &mut FilterSet, _window_hint: Duration) -> Result<PollOutcome, ParserError> {
        let conn = self
            .conn
            .as_ref()
            .ok_or_else(|| ParserError::InvalidState("backend not started".to_string()))?;
        let query = format!(
            "SELECT {}, {}, {}, {}, {} FROM {} WHERE {} > ?1 ORDER BY {} ASC",
            self.col_path,
            self.col_type,
            self.col_collector,
            self.col_project,
            self.col_filetime,
            self.table,
            self.col_filetime,
            self.col_filetime,
        );
        let mut stmt = conn
            .prepare(&query)
            .map_err(|e| ParserError::BackendQuery(format!("cannot prepare catalog query: {e}")))?;
        let rows = stmt
            .query_map([self.last_filetime], |row| {
                let path: String = row.get(0)?;
                let type_str: String = row.get(1)?;
                let collector: String = row.get(2)?;
                let project: String = row.get(3)?;
                let filetime: u32 = row.get(4)?;
                Ok((path, type_str, collector, project, filetime))
            })
            .map_err(|e| ParserError::BackendQuery(format!("catalog query failed: {e}")))?;

        let mut fresh = Vec::new();
        for row in rows {
            let (path, type_str, collector, project, filetime) =
                row.map_err(|e| ParserError::BackendQuery(format!("catalog row decode failed: {e}")))?;
            let dump_type = match type_str.as_str() {
                "ribs" | "rib" => DumpType::Rib,
                "updates" => DumpType::Updates,
                other => {
                    return Err(ParserError::BackendQuery(format!(
                        "catalog row has unknown type '{other}'"
                    )))
                }
            };
            self.last_filetime = self.last_filetime.max(filetime);
            fresh.push(InputDescriptor::new(path, dump_type, collector, project, filetime, filetime));
        }
        if fresh.is_empty() {
            Ok(PollOutcome::Empty)
        } else {
            Ok(PollOutcome::Ready(fresh))
        }
    }

    fn close(&mut self) {
        self.conn = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incremental_poll_only_returns_rows_past_last_filetime() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap().to_string();
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE catalog (path TEXT, type TEXT, collector TEXT, project TEXT, filetime INTEGER);
                 INSERT INTO catalog VALUES ('/data/rib.gz', 'ribs', 'rrc00', 'riperis', 1000);",
            )
            .unwrap();
        }

        let mut backend = SqliteCatalogBackend::new();
        backend.configure("db-file", &path).unwrap();
        backend.start().unwrap();
        let mut filters = FilterSet::new();
        let window = Duration::from_secs(60);

        match backend.poll(&mut filters, window).unwrap() {
            PollOutcome::Ready(v) => assert_eq!(v.len(), 1),
            PollOutcome::Empty => panic!("expected one descriptor"),
        }
        assert_eq!(backend.poll(&mut filters, window).unwrap(), PollOutcome::Empty);

        {
            let conn = Connection::open(&path).unwrap();
            conn.execute(
                "INSERT INTO catalog VALUES ('/data/upd.gz', 'updates', 'rrc00', 'riperis', 2000)",
                [],
            )
            .unwrap();
        }
        match backend.poll(&mut filters, window).unwrap() {
            PollOutcome::Ready(v) => assert_eq!(v.len(), 1),
            PollOutcome::Empty => panic!("expected the newly inserted row"),
        }
    }
}
