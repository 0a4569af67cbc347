/// Undo functionality for reverting file organization operations.
///
/// Replays the most recent session in the operation log backwards, moving
/// every successfully organized file from its destination back to where it
/// came from. Records of any other kind or status are left alone.
use crate::error::Result;
use crate::operation_log::{OperationKind, OperationLog, OperationRecord, OperationStatus};
use std::fs;
use std::path::{Path, PathBuf};

/// What an undo run found to do.
#[derive(Debug)]
pub enum UndoOutcome {
    /// There is no log file to read.
    NoLogFile,
    /// The log file holds no sessions.
    NoSessions,
    /// The last session was replayed.
    Completed(UndoReport),
}

/// Represents the result of replaying one session.
#[derive(Debug, Default)]
pub struct UndoReport {
    /// Number of files successfully restored.
    pub restored_files: usize,
    /// Files that could not be moved back, with the reason.
    pub failed_restores: Vec<(PathBuf, String)>,
    /// Files no longer at their recorded destination.
    pub skipped_files: Vec<(PathBuf, String)>,
    /// Records that were not successful moves.
    pub ignored_records: usize,
}

impl UndoReport {
    /// Returns the number of moves that were attempted.
    pub fn total_processed(&self) -> usize {
        self.restored_files + self.failed_restores.len() + self.skipped_files.len()
    }

    /// Returns true if every move in the session was reverted.
    pub fn is_complete_success(&self) -> bool {
        self.failed_restores.is_empty() && self.skipped_files.is_empty()
    }
}

enum RestoreFailure {
    Missing(PathBuf, String),
    Failed(PathBuf, String),
}

/// Manages undo operations for file organization.
pub struct UndoManager;

impl UndoManager {
    /// Undoes the moves recorded in the last session of `log_file`.
    ///
    /// A missing log or one without sessions is not an error; it is reported
    /// through [`UndoOutcome`]. The log itself is not modified.
    ///
    /// # Edge Cases Handled
    ///
    /// * **File not found**: Skipped with a note that the file couldn't be found
    /// * **File name conflict**: The conflicting file is backed up with a timestamp suffix
    /// * **Permission denied**: Recorded as a failure with the error reason
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use tidydown::undo::{UndoManager, UndoOutcome};
    /// use std::path::Path;
    ///
    /// match UndoManager::undo_last_session(Path::new("organizer_log.json"))? {
    ///     UndoOutcome::Completed(report) => println!("Restored {} files", report.restored_files),
    ///     _ => println!("Nothing to undo"),
    /// }
    /// # Ok::<(), tidydown::Error>(())
    /// ```
    pub fn undo_last_session(log_file: &Path) -> Result<UndoOutcome> {
        let Some(sessions) = OperationLog::load_sessions(log_file)? else {
            log::info!("No log file at {}", log_file.display());
            return Ok(UndoOutcome::NoLogFile);
        };
        let Some(last_session) = sessions.last() else {
            return Ok(UndoOutcome::NoSessions);
        };

        log::info!(
            "Undoing {} operations from session started {}",
            last_session.operations.len(),
            last_session.session_start
        );

        let mut report = UndoReport::default();
        for record in last_session.operations.iter().rev() {
            let Some((from, to)) = Self::reversible_move(record) else {
                report.ignored_records += 1;
                continue;
            };

            match Self::restore_file(&from, &to) {
                Ok(()) => {
                    log::info!("Restored {} -> {}", from.display(), to.display());
                    report.restored_files += 1;
                }
                Err(RestoreFailure::Missing(path, reason)) => {
                    log::warn!("{}: {}", path.display(), reason);
                    report.skipped_files.push((path, reason));
                }
                Err(RestoreFailure::Failed(path, reason)) => {
                    log::warn!("{}: {}", path.display(), reason);
                    report.failed_restores.push((path, reason));
                }
            }
        }

        Ok(UndoOutcome::Completed(report))
    }

    /// (current location, original location) for a successful move record.
    fn reversible_move(record: &OperationRecord) -> Option<(PathBuf, PathBuf)> {
        if record.kind != OperationKind::Move || record.status != OperationStatus::Success {
            return None;
        }
        Some((record.destination_path()?, record.source_path()))
    }

    /// Moves `from` back to `to`, backing up anything already at `to`.
    fn restore_file(from: &Path, to: &Path) -> std::result::Result<(), RestoreFailure> {
        if !from.exists() {
            return Err(RestoreFailure::Missing(
                from.to_path_buf(),
                "File not found at expected location".to_string(),
            ));
        }

        if to.exists() {
            let backup_path = Self::generate_backup_path(to);
            fs::rename(to, &backup_path).map_err(|e| {
                RestoreFailure::Failed(
                    to.to_path_buf(),
                    format!("Could not backup conflicting file: {}", e),
                )
            })?;
        }

        if let Some(parent) = to.parent()
            && !parent.exists()
        {
            fs::create_dir_all(parent).map_err(|e| {
                RestoreFailure::Failed(
                    parent.to_path_buf(),
                    format!("Could not recreate directory: {}", e),
                )
            })?;
        }

        fs::rename(from, to).map_err(|e| {
            RestoreFailure::Failed(from.to_path_buf(), format!("Failed to restore file: {}", e))
        })
    }

    /// Generates a backup path for a file by appending a timestamp.
    ///
    /// Example: `file.txt` becomes `file.txt.bak.20251109-143052`
    fn generate_backup_path(original_path: &Path) -> PathBuf {
        let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
        let filename = original_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "file".to_string());

        let backup_name = format!("{}.bak.{}", filename, timestamp);

        match original_path.parent() {
            Some(parent) => parent.join(backup_name),
            None => PathBuf::from(backup_name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record_move(log: &mut OperationLog, from: &Path, to: &Path, status: OperationStatus) {
        log.record(OperationKind::Move, from, Some(to), status, None);
    }

    fn completed(outcome: UndoOutcome) -> UndoReport {
        match outcome {
            UndoOutcome::Completed(report) => report,
            other => panic!("Expected a completed undo, got {:?}", other),
        }
    }

    #[test]
    fn test_undo_no_log_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let outcome = UndoManager::undo_last_session(&temp_dir.path().join("log.json")).unwrap();
        assert!(matches!(outcome, UndoOutcome::NoLogFile));
    }

    #[test]
    fn test_undo_empty_log() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let log_path = temp_dir.path().join("log.json");
        fs::write(&log_path, "[]").unwrap();

        let outcome = UndoManager::undo_last_session(&log_path).unwrap();
        assert!(matches!(outcome, UndoOutcome::NoSessions));
    }

    #[test]
    fn test_undo_single_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        let original = base.join("test.txt");
        let moved = base.join("Documents").join("test.txt");
        fs::create_dir(base.join("Documents")).unwrap();
        fs::write(&moved, "test content").unwrap();

        let log_path = base.join("log.json");
        let mut log = OperationLog::new(&log_path);
        record_move(&mut log, &original, &moved, OperationStatus::Success);
        log.save().unwrap();

        let report = completed(UndoManager::undo_last_session(&log_path).unwrap());

        assert_eq!(report.restored_files, 1);
        assert!(report.is_complete_success());
        assert!(original.exists());
        assert!(!moved.exists());
    }

    #[test]
    fn test_undo_only_last_session() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        let log_path = base.join("log.json");
        fs::create_dir(base.join("Images")).unwrap();
        fs::write(base.join("Images").join("old.png"), "old").unwrap();
        fs::write(base.join("Images").join("new.png"), "new").unwrap();

        let mut first = OperationLog::new(&log_path);
        record_move(
            &mut first,
            &base.join("old.png"),
            &base.join("Images").join("old.png"),
            OperationStatus::Success,
        );
        first.save().unwrap();

        let mut second = OperationLog::new(&log_path);
        record_move(
            &mut second,
            &base.join("new.png"),
            &base.join("Images").join("new.png"),
            OperationStatus::Success,
        );
        second.save().unwrap();

        let report = completed(UndoManager::undo_last_session(&log_path).unwrap());

        assert_eq!(report.restored_files, 1);
        assert!(base.join("new.png").exists());
        assert!(base.join("Images").join("old.png").exists());
    }

    #[test]
    fn test_undo_ignores_non_success_and_other_kinds() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        let log_path = base.join("log.json");
        fs::create_dir(base.join("Documents")).unwrap();
        let simulated = base.join("Documents").join("sim.pdf");
        fs::write(&simulated, "sim").unwrap();

        let mut log = OperationLog::new(&log_path);
        record_move(&mut log, &base.join("sim.pdf"), &simulated, OperationStatus::DryRun);
        record_move(&mut log, &base.join("bad.pdf"), &simulated, OperationStatus::Error);
        log.record(
            OperationKind::DeleteDuplicate,
            &base.join("dup.pdf"),
            Some(&simulated),
            OperationStatus::Success,
            None,
        );
        log.save().unwrap();

        let report = completed(UndoManager::undo_last_session(&log_path).unwrap());

        assert_eq!(report.restored_files, 0);
        assert_eq!(report.ignored_records, 3);
        assert!(simulated.exists());
    }

    #[test]
    fn test_undo_restores_in_reverse_order() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        let log_path = base.join("log.json");
        fs::create_dir(base.join("Documents")).unwrap();

        let first_home = base.join("a.txt");
        let second_home = base.join("b.txt");
        let dest = base.join("Documents").join("a.txt");
        let dest_renamed = base.join("Documents").join("a_1.txt");
        fs::write(&dest, "first").unwrap();
        fs::write(&dest_renamed, "second").unwrap();

        let mut log = OperationLog::new(&log_path);
        record_move(&mut log, &first_home, &dest, OperationStatus::Success);
        record_move(&mut log, &second_home, &dest_renamed, OperationStatus::Success);
        log.save().unwrap();

        let report = completed(UndoManager::undo_last_session(&log_path).unwrap());

        assert_eq!(report.restored_files, 2);
        assert_eq!(fs::read_to_string(&first_home).unwrap(), "first");
        assert_eq!(fs::read_to_string(&second_home).unwrap(), "second");
    }

    #[test]
    fn test_undo_with_file_name_conflict() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        let log_path = base.join("log.json");
        let original = base.join("test.txt");
        let moved = base.join("Documents").join("test.txt");
        fs::create_dir(base.join("Documents")).unwrap();
        fs::write(&moved, "original content").unwrap();
        fs::write(&original, "new content").unwrap();

        let mut log = OperationLog::new(&log_path);
        record_move(&mut log, &original, &moved, OperationStatus::Success);
        log.save().unwrap();

        let report = completed(UndoManager::undo_last_session(&log_path).unwrap());

        assert_eq!(report.restored_files, 1);
        assert_eq!(fs::read_to_string(&original).unwrap(), "original content");

        let backups = fs::read_dir(base)
            .unwrap()
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().contains(".bak."))
            .count();
        assert_eq!(backups, 1);
    }

    #[test]
    fn test_undo_with_missing_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        let log_path = base.join("log.json");

        let mut log = OperationLog::new(&log_path);
        record_move(
            &mut log,
            &base.join("nonexistent.txt"),
            &base.join("Documents").join("nonexistent.txt"),
            OperationStatus::Success,
        );
        log.save().unwrap();

        let report = completed(UndoManager::undo_last_session(&log_path).unwrap());

        assert_eq!(report.restored_files, 0);
        assert_eq!(report.skipped_files.len(), 1);
        assert_eq!(report.total_processed(), 1);
        assert!(!report.is_complete_success());
    }
}
