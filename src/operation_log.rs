//! Append-only journal of every file operation tidydown attempts.
//!
//! One [`OperationLog`] instance is one session. Records accumulate in memory
//! and are flushed by [`OperationLog::save`], which appends a [`Session`]
//! snapshot to the JSON array stored in the log file. The whole file is read,
//! extended and rewritten on each save, so two processes saving at the same
//! time can lose one of the sessions; tidydown assumes a single writer.

use crate::error::{Error, Result};
use crate::output::OutputFormatter;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// What kind of operation a record describes.
///
/// Serialized as a plain string; unknown strings read back as [`OperationKind::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OperationKind {
    /// A file moved into a category directory.
    Move,
    /// A duplicate removed in favour of a retained copy.
    DeleteDuplicate,
    /// A file deliberately left alone.
    Skip,
    /// A file that could not be hashed during a duplicate scan.
    Hash,
    /// Any other free-form kind.
    Other(String),
}

impl OperationKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Move => "move",
            Self::DeleteDuplicate => "delete_duplicate",
            Self::Skip => "skip",
            Self::Hash => "hash",
            Self::Other(kind) => kind,
        }
    }
}

impl From<String> for OperationKind {
    fn from(kind: String) -> Self {
        match kind.as_str() {
            "move" => Self::Move,
            "delete_duplicate" => Self::DeleteDuplicate,
            "skip" => Self::Skip,
            "hash" => Self::Hash,
            _ => Self::Other(kind),
        }
    }
}

impl From<&str> for OperationKind {
    fn from(kind: &str) -> Self {
        Self::from(kind.to_string())
    }
}

impl From<OperationKind> for String {
    fn from(kind: OperationKind) -> Self {
        match kind {
            OperationKind::Other(kind) => kind,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of an attempted operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Success,
    Error,
    DryRun,
    Skipped,
}

impl OperationStatus {
    /// `Success` normally, `DryRun` when simulating.
    pub fn completed(dry_run: bool) -> Self {
        if dry_run { Self::DryRun } else { Self::Success }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::DryRun => "dry_run",
            Self::Skipped => "skipped",
        }
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single attempted operation. Never modified after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationRecord {
    /// ISO 8601 time the operation was attempted.
    pub timestamp: String,
    #[serde(rename = "type")]
    pub kind: OperationKind,
    pub source: String,
    pub destination: Option<String>,
    pub status: OperationStatus,
    #[serde(rename = "details")]
    pub detail: Option<String>,
}

impl OperationRecord {
    pub fn source_path(&self) -> PathBuf {
        PathBuf::from(&self.source)
    }

    pub fn destination_path(&self) -> Option<PathBuf> {
        self.destination.as_ref().map(PathBuf::from)
    }
}

/// Summary of one log instance's records, as persisted in the log file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub session_start: String,
    /// Time the summary was taken, not the time of the last operation.
    pub session_end: String,
    pub total_operations: usize,
    #[serde(default)]
    pub by_type: BTreeMap<String, usize>,
    #[serde(default)]
    pub by_status: BTreeMap<String, usize>,
    #[serde(default)]
    pub operations: Vec<OperationRecord>,
}

/// In-memory session journal backed by a JSON log file.
#[derive(Debug)]
pub struct OperationLog {
    log_file: PathBuf,
    session_start: String,
    operations: Vec<OperationRecord>,
}

impl OperationLog {
    /// Starts a new session that will be saved to `log_file`.
    pub fn new(log_file: impl Into<PathBuf>) -> Self {
        Self {
            log_file: log_file.into(),
            session_start: now(),
            operations: Vec::new(),
        }
    }

    /// Path of the backing log file.
    pub fn log_file(&self) -> &Path {
        &self.log_file
    }

    /// Records in the order they were attempted.
    pub fn operations(&self) -> &[OperationRecord] {
        &self.operations
    }

    /// Appends a record stamped with the current time.
    pub fn record(
        &mut self,
        kind: impl Into<OperationKind>,
        source: &Path,
        destination: Option<&Path>,
        status: OperationStatus,
        detail: Option<String>,
    ) {
        let record = OperationRecord {
            timestamp: now(),
            kind: kind.into(),
            source: source.to_string_lossy().to_string(),
            destination: destination.map(|d| d.to_string_lossy().to_string()),
            status,
            detail,
        };
        log::debug!(
            "{} {} [{}] {}",
            record.kind,
            record.source,
            record.status,
            record.detail.as_deref().unwrap_or("")
        );
        self.operations.push(record);
    }

    /// Summarizes everything recorded so far.
    pub fn summarize(&self) -> Session {
        let mut by_type = BTreeMap::new();
        let mut by_status = BTreeMap::new();
        for op in &self.operations {
            *by_type.entry(op.kind.to_string()).or_insert(0) += 1;
            *by_status.entry(op.status.to_string()).or_insert(0) += 1;
        }

        Session {
            session_start: self.session_start.clone(),
            session_end: now(),
            total_operations: self.operations.len(),
            by_type,
            by_status,
            operations: self.operations.clone(),
        }
    }

    /// Appends the current session to the log file.
    ///
    /// Existing content that is not a JSON array is discarded rather than
    /// blocking the write. Each call appends a new snapshot, so calling this
    /// twice in one session stores the session twice.
    pub fn save(&self) -> Result<()> {
        let mut sessions = self.read_existing()?;
        sessions.push(serde_json::to_value(self.summarize())?);

        if let Some(parent) = self.log_file.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(&sessions)?;
        fs::write(&self.log_file, json)?;
        log::info!(
            "Saved {} operations to {}",
            self.operations.len(),
            self.log_file.display()
        );
        Ok(())
    }

    fn read_existing(&self) -> Result<Vec<Value>> {
        if !self.log_file.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read(&self.log_file)?;
        match serde_json::from_slice::<Value>(&content) {
            Ok(Value::Array(sessions)) => Ok(sessions),
            Ok(_) => {
                log::warn!(
                    "Log file {} does not hold a session list; starting a new history",
                    self.log_file.display()
                );
                Ok(Vec::new())
            }
            Err(e) => {
                log::warn!(
                    "Log file {} is corrupted ({}); starting a new history",
                    self.log_file.display(),
                    e
                );
                Ok(Vec::new())
            }
        }
    }

    /// Reads every persisted session, oldest first.
    ///
    /// Returns `Ok(None)` when the log file does not exist.
    pub fn load_sessions(log_file: &Path) -> Result<Option<Vec<Session>>> {
        if !log_file.exists() {
            return Ok(None);
        }

        let content = fs::read(log_file)?;
        let sessions = serde_json::from_slice(&content)
            .map_err(|e| Error::InvalidHistoryFormat(format!("JSON parse error: {}", e)))?;
        Ok(Some(sessions))
    }

    /// Prints a human-readable summary of this session.
    pub fn print_summary(&self) {
        OutputFormatter::session_summary(&self.summarize());
    }

    /// Returns true if `path` is this log's own backing file.
    pub fn is_backing_file(&self, path: &Path) -> bool {
        match (canonical_log_path(&self.log_file), fs::canonicalize(path)) {
            (Some(log_path), Ok(path)) => log_path == path,
            _ => false,
        }
    }
}

/// Canonical form of a log path that may not exist yet.
fn canonical_log_path(log_file: &Path) -> Option<PathBuf> {
    if let Ok(path) = fs::canonicalize(log_file) {
        return Some(path);
    }
    let parent = match log_file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    Some(fs::canonicalize(parent).ok()?.join(log_file.file_name()?))
}

fn now() -> String {
    chrono::Local::now().to_rfc3339()
}
