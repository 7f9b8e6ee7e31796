use crate::error::Result;
use log::{error, info, warn};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditLevel {
    Info,
    Warning,
    Error,
}

impl fmt::Display for AuditLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AuditLevel::Info => write!(f, "INFO"),
            AuditLevel::Warning => write!(f, "WARNING"),
            AuditLevel::Error => write!(f, "ERROR"),
        }
    }
}

/// Append-only audit trail of a run, one line per event:
///
/// ```text
/// 2026-10-17 09:30:00 - ERROR - row 2: skipped: invalid identifier 'Bad Name!' ...
/// ```
///
/// Every line is mirrored to the `log` facade. A failing write is reported there and
/// does not stop provisioning.
pub struct AuditLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl AuditLog {
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    pub fn info(&self, message: &str) {
        self.record(AuditLevel::Info, message)
    }

    pub fn warning(&self, message: &str) {
        self.record(AuditLevel::Warning, message)
    }

    pub fn error(&self, message: &str) {
        self.record(AuditLevel::Error, message)
    }

    pub fn record(&self, level: AuditLevel, message: &str) {
        match level {
            AuditLevel::Info => info!("{}", message),
            AuditLevel::Warning => warn!("{}", message),
            AuditLevel::Error => error!("{}", message),
        }

        let line = format!(
            "{} - {} - {}\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            level,
            message
        );

        let written = match self.file.lock() {
            Ok(mut file) => file.write_all(line.as_bytes()).and_then(|_| file.flush()),
            Err(_) => Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                "audit log lock poisoned",
            )),
        };

        if let Err(e) = written {
            error!("could not write audit log {}: {}", self.path.display(), e);
        }
    }
}
