//! Optional per-node diagnostic files.
//!
//! Deployments on headless gateways want delivered payloads and protocol
//! anomalies on disk (`data_<addr>.txt`, `errors_<addr>.txt`). These are
//! pluggable writers owned by the MAC instance, not process-wide stream
//! redirection; when a file is not enabled the line goes to the `log`
//! facade instead.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use llsr_mgmt::UtcStamp;

pub struct DiagSinks {
    data: Option<BufWriter<File>>,
    errors: Option<BufWriter<File>>,
}

impl DiagSinks {
    /// Open the enabled sinks in the current directory.
    pub fn open(addr: u8, data_to_file: bool, errors_to_file: bool) -> Self {
        Self::open_at(Path::new("."), addr, data_to_file, errors_to_file)
    }

    /// Open the enabled sinks under `dir`. Failure to create a file is
    /// logged and that sink disabled; diagnostics are never fatal.
    pub fn open_at(dir: &Path, addr: u8, data_to_file: bool, errors_to_file: bool) -> Self {
        let data = if data_to_file {
            Self::create(&dir.join(format!("data_{addr}.txt")))
        } else {
            None
        };
        let errors = if errors_to_file {
            Self::create(&dir.join(format!("errors_{addr}.txt")))
        } else {
            None
        };
        Self { data, errors }
    }

    fn create(path: &Path) -> Option<BufWriter<File>> {
        match File::create(path) {
            Ok(file) => {
                let mut writer = BufWriter::new(file);
                let _ = writeln!(writer, "*** START: {}", UtcStamp::now());
                let _ = writer.flush();
                Some(writer)
            }
            Err(err) => {
                log::warn!("diag: cannot create {}: {err}", path.display());
                None
            }
        }
    }

    /// Record a delivered-data line.
    pub fn data(&mut self, line: &str) {
        match &mut self.data {
            Some(writer) => {
                let _ = writeln!(writer, "{} : {line}", UtcStamp::now());
                let _ = writer.flush();
            }
            None => log::info!("data: {line}"),
        }
    }

    /// Record a protocol anomaly.
    pub fn error(&mut self, line: &str) {
        match &mut self.errors {
            Some(writer) => {
                let _ = writeln!(writer, "{} : {line}", UtcStamp::now());
                let _ = writer.flush();
            }
            None => log::debug!("{line}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_sinks_write_nothing() {
        let mut diag = DiagSinks::open(250, false, false);
        diag.data("1 2 3");
        diag.error("oops");
    }

    #[test]
    fn enabled_sinks_append_lines() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut diag = DiagSinks::open_at(dir.path(), 251, true, true);
        diag.data("1 1 0 0 1 170");
        diag.error("bad frame");
        drop(diag);
        let data =
            std::fs::read_to_string(dir.path().join("data_251.txt")).expect("data file");
        let errors =
            std::fs::read_to_string(dir.path().join("errors_251.txt")).expect("errors file");
        assert!(data.starts_with("*** START:"));
        assert!(data.contains("1 1 0 0 1 170"));
        assert!(errors.contains("bad frame"));
    }
}
