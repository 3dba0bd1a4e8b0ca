//! Append-only JSON-lines report writer.
//!
//! A small concrete sink kept at the edge of the core engine so the NDT
//! runner and integration tests have somewhere to write — the same
//! structured-record style as the logging facade, applied to a file instead
//! of the process log.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{Error, Kind};
use crate::report::entry::Entry;

#[derive(Debug, PartialEq, Eq)]
enum State {
    Unopened,
    Open,
    Closed,
}

/// Writes one JSON object per line to `report-<test_name>-<timestamp>-<idx>.json`.
/// Enforces `open` precedes all `write_entry`, which precede `close`.
pub struct FileReporter {
    test_name: String,
    dir: PathBuf,
    path: Option<PathBuf>,
    file: Option<File>,
    state: State,
}

impl FileReporter {
    pub fn new(test_name: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            test_name: test_name.into(),
            dir: dir.into(),
            path: None,
            file: None,
            state: State::Unopened,
        }
    }

    /// Pick the first non-existent `report-<test_name>-<timestamp>-<idx>.json`
    /// name in `dir` and open it for appending.
    pub fn open(&mut self) -> Result<(), Error> {
        if self.state != State::Unopened {
            return Err(Error::new(Kind::ValueError).with_context("reporter already opened"));
        }
        let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
        let mut idx = 0u32;
        loop {
            let name = format!("report-{}-{timestamp}-{idx}.json", self.test_name);
            let path = self.dir.join(name);
            if !path.exists() {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .map_err(Error::from)?;
                self.path = Some(path);
                self.file = Some(file);
                self.state = State::Open;
                return Ok(());
            }
            idx += 1;
        }
    }

    /// Append one JSON object, followed by a newline.
    pub fn write_entry(&mut self, entry: &Entry) -> Result<(), Error> {
        if self.state != State::Open {
            return Err(Error::new(Kind::ValueError).with_context("reporter not open"));
        }
        let file = self.file.as_mut().expect("state == Open implies file is set");
        let line = serde_json::to_string(entry).map_err(|_| Error::new(Kind::JsonParseError))?;
        writeln!(file, "{line}").map_err(Error::from)?;
        Ok(())
    }

    pub fn close(&mut self) {
        self.file = None;
        self.state = State::Closed;
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn open_write_close_lifecycle() {
        let dir = std::env::temp_dir().join(format!("ndt-report-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let mut reporter = FileReporter::new("ndt", &dir);
        reporter.open().unwrap();
        let entry = Entry::new("ndt", "3.7.0", json!({"download_kbps": 1234.5}));
        reporter.write_entry(&entry).unwrap();
        reporter.close();

        let contents = std::fs::read_to_string(reporter.path().unwrap()).unwrap();
        assert_eq!(contents.lines().count(), 1);
        let parsed: serde_json::Value = serde_json::from_str(contents.lines().next().unwrap()).unwrap();
        assert_eq!(parsed["software_name"], "measurement_kit");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn write_before_open_fails() {
        let dir = std::env::temp_dir();
        let mut reporter = FileReporter::new("ndt", &dir);
        let entry = Entry::new("ndt", "3.7.0", json!({}));
        assert!(reporter.write_entry(&entry).is_err());
    }
}
