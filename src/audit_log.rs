use crate::error::AppError;
use chrono::{DateTime, SecondsFormat, Utc};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// One completed compression: when it finished and what it wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub output: PathBuf,
}

impl LogEntry {
    pub fn now(output: impl Into<PathBuf>) -> Self {
        Self {
            timestamp: Utc::now(),
            output: output.into(),
        }
    }

    /// `<ISO-8601 timestamp> <output path>`. Backslashes and line breaks in
    /// the path are escaped so every entry stays on one line.
    pub fn to_line(&self) -> String {
        format!(
            "{} {}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            escape_path(&self.output)
        )
    }
}

fn escape_path(path: &Path) -> String {
    let raw = path.display().to_string();
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Append-only record of written files.
///
/// Every [`append`](AuditLog::append) opens, writes and closes the file, so
/// an interrupted batch leaves every earlier line intact.
#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, entry: &LogEntry) -> Result<(), AppError> {
        let line = entry.to_line();
        log::trace!("Appending to audit log {:?}: {}", self.path, line);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| AppError::LogWrite(format!("{:?}: {}", self.path, e)))?;
        writeln!(file, "{}", line)
            .map_err(|e| AppError::LogWrite(format!("{:?}: {}", self.path, e)))?;
        Ok(())
    }
}
