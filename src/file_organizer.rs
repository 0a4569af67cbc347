/// File organization system for moving files into category directories.
///
/// This module provides functionality to organize files by moving them into
/// category-specific subdirectories within a given base directory, optionally
/// nested under a `YYYY-MM` folder taken from each file's modification time.
/// Every attempt, successful or not, is recorded in the operation log.
use crate::config::{CompiledFilters, OrganizerConfig};
use crate::error::{Error, Result};
use crate::file_category::{extension_of, sniff_extension};
use crate::operation_log::{OperationKind, OperationLog, OperationStatus};
use crate::undo::{UndoManager, UndoOutcome};
use chrono::{DateTime, Local};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while organizing a single file.
///
/// These never abort a batch; they end up as `error` records in the log.
#[derive(Debug, Error)]
pub enum OrganizeError {
    /// Failed to create a category directory.
    #[error("Failed to create directory {}: {source}", path.display())]
    DirectoryCreationFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to move a file to its category directory.
    #[error("Failed to move {} to {}: {error}", from.display(), to.display())]
    FileMoveFailure {
        from: PathBuf,
        to: PathBuf,
        error: std::io::Error,
    },
    /// Failed to read the file's modification time.
    #[error("Failed to read metadata of {}: {source}", path.display())]
    MetadataUnavailable {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The path has no file name component.
    #[error("File has no name component: {}", .0.display())]
    MissingFileName(PathBuf),
}

/// Counts produced by one [`FileOrganizer::organize`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrganizeReport {
    /// Files moved (or that would be moved, when simulating).
    pub moved: usize,
    /// Files that could not be organized.
    pub failed: usize,
    /// Files excluded by filters, including the log file itself.
    pub skipped: usize,
    /// Moved files per category.
    pub by_category: HashMap<String, usize>,
}

/// Organizes files by moving them into category subdirectories.
pub struct FileOrganizer {
    source_dir: PathBuf,
    config: OrganizerConfig,
    filters: CompiledFilters,
    dry_run: bool,
}

impl FileOrganizer {
    /// Creates an organizer for `source_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SourceNotFound`] if the directory does not exist, or a
    /// configuration error if the filter rules do not compile.
    pub fn new(
        source_dir: impl Into<PathBuf>,
        config: OrganizerConfig,
        dry_run: bool,
    ) -> Result<Self> {
        let source_dir = source_dir.into();
        if !source_dir.is_dir() {
            return Err(Error::SourceNotFound(source_dir));
        }
        let source_dir = fs::canonicalize(&source_dir)?;
        let filters = config.compile_filters()?;

        Ok(Self {
            source_dir,
            config,
            filters,
            dry_run,
        })
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Organizes every regular file directly inside the source directory.
    ///
    /// Subdirectories are never entered, including the category directories
    /// this call creates. A file that cannot be organized is logged with
    /// status `error` and the batch continues. The log is saved before
    /// returning.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use tidydown::config::OrganizerConfig;
    /// use tidydown::file_organizer::FileOrganizer;
    /// use tidydown::operation_log::OperationLog;
    ///
    /// let organizer = FileOrganizer::new("/home/me/Downloads", OrganizerConfig::default(), false)?;
    /// let mut log = OperationLog::new("organizer_log.json");
    /// let report = organizer.organize(&mut log, true)?;
    /// println!("Moved {} files", report.moved);
    /// # Ok::<(), tidydown::Error>(())
    /// ```
    pub fn organize(
        &self,
        log: &mut OperationLog,
        create_date_folders: bool,
    ) -> Result<OrganizeReport> {
        let files: Vec<PathBuf> = fs::read_dir(&self.source_dir)?
            .flatten()
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .map(|entry| entry.path())
            .collect();

        log::info!(
            "Organizing {} files in {}",
            files.len(),
            self.source_dir.display()
        );

        let mut report = OrganizeReport::default();
        for file_path in &files {
            if log.is_backing_file(file_path) {
                log.record(
                    OperationKind::Skip,
                    file_path,
                    None,
                    OperationStatus::Skipped,
                    Some("Operation log file".to_string()),
                );
                report.skipped += 1;
                continue;
            }

            let relative = file_path
                .strip_prefix(&self.source_dir)
                .unwrap_or(file_path.as_path());
            if !self.filters.should_include(relative) {
                log.record(
                    OperationKind::Skip,
                    file_path,
                    None,
                    OperationStatus::Skipped,
                    Some("Excluded by filter rules".to_string()),
                );
                report.skipped += 1;
                continue;
            }

            match self.organize_file(file_path, create_date_folders) {
                Ok((destination, category)) => {
                    log::info!(
                        "{}{} -> {}",
                        if self.dry_run { "[DRY RUN] " } else { "" },
                        file_path.display(),
                        destination.display()
                    );
                    log.record(
                        OperationKind::Move,
                        file_path,
                        Some(&destination),
                        OperationStatus::completed(self.dry_run),
                        Some(format!("Organized to {}", category)),
                    );
                    report.moved += 1;
                    *report.by_category.entry(category).or_insert(0) += 1;
                }
                Err(e) => {
                    log::warn!("{}", e);
                    log.record(
                        OperationKind::Move,
                        file_path,
                        None,
                        OperationStatus::Error,
                        Some(e.to_string()),
                    );
                    report.failed += 1;
                }
            }
        }

        log.save()?;
        Ok(report)
    }

    /// Moves one file into its category directory, returning the final
    /// destination and the category name.
    fn organize_file(
        &self,
        file_path: &Path,
        create_date_folders: bool,
    ) -> std::result::Result<(PathBuf, String), OrganizeError> {
        let category = self.category_for(file_path);
        let mut dest_dir = self.source_dir.join(&category);

        if create_date_folders {
            dest_dir.push(date_folder(file_path)?);
        }

        if !self.dry_run {
            fs::create_dir_all(&dest_dir).map_err(|e| OrganizeError::DirectoryCreationFailed {
                path: dest_dir.clone(),
                source: e,
            })?;
        }

        let file_name = file_path
            .file_name()
            .ok_or_else(|| OrganizeError::MissingFileName(file_path.to_path_buf()))?;
        let destination = unique_path(&dest_dir.join(file_name));

        if !self.dry_run {
            fs::rename(file_path, &destination).map_err(|e| OrganizeError::FileMoveFailure {
                from: file_path.to_path_buf(),
                to: destination.clone(),
                error: e,
            })?;
        }

        Ok((destination, category))
    }

    fn category_for(&self, file_path: &Path) -> String {
        let mut extension = extension_of(file_path);
        if extension.is_empty()
            && self.config.detect_content_type()
            && let Some(sniffed) = sniff_extension(file_path)
        {
            extension = sniffed;
        }
        self.config.resolver().resolve(&extension).to_string()
    }

    /// Reverts the moves of the most recent session stored in `log_file`.
    pub fn undo_last_session(&self, log_file: &Path) -> Result<UndoOutcome> {
        UndoManager::undo_last_session(log_file)
    }
}

/// `YYYY-MM` folder name from the file's modification time.
fn date_folder(file_path: &Path) -> std::result::Result<String, OrganizeError> {
    let modified = fs::metadata(file_path)
        .and_then(|m| m.modified())
        .map_err(|e| OrganizeError::MetadataUnavailable {
            path: file_path.to_path_buf(),
            source: e,
        })?;
    Ok(DateTime::<Local>::from(modified).format("%Y-%m").to_string())
}

/// Returns `path` if it is free, otherwise the first free `stem_N.ext`
/// sibling with N counting up from 1.
///
/// ```
/// use tidydown::file_organizer::unique_path;
/// use std::path::Path;
///
/// let dir = tempfile::tempdir().unwrap();
/// std::fs::write(dir.path().join("report.pdf"), "x").unwrap();
/// assert_eq!(
///     unique_path(&dir.path().join("report.pdf")),
///     dir.path().join("report_1.pdf")
/// );
/// ```
pub fn unique_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let extension = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let parent = path.parent().unwrap_or_else(|| Path::new(""));

    let mut counter: u64 = 1;
    loop {
        let candidate = parent.join(format!("{}_{}{}", stem, counter, extension));
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FilterRules;
    use crate::file_category::{Category, CategoryResolver};
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn organizer(base: &Path, dry_run: bool) -> FileOrganizer {
        FileOrganizer::new(base, OrganizerConfig::default(), dry_run)
            .expect("Failed to create organizer")
    }

    fn new_log(temp_dir: &TempDir) -> OperationLog {
        OperationLog::new(temp_dir.path().join("log.json"))
    }

    #[test]
    fn test_new_rejects_missing_directory() {
        let result = FileOrganizer::new("/non/existent/path", OrganizerConfig::default(), false);
        assert!(matches!(result, Err(Error::SourceNotFound(_))));
    }

    #[test]
    fn test_organize_moves_into_category() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let log_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        fs::write(base.join("test.txt"), "test content").unwrap();

        let mut log = new_log(&log_dir);
        let report = organizer(base, false).organize(&mut log, false).unwrap();

        assert_eq!(report.moved, 1);
        assert!(!base.join("test.txt").exists());
        assert!(base.join("Documents").join("test.txt").exists());
        assert_eq!(report.by_category.get("Documents"), Some(&1));

        let op = &log.operations()[0];
        assert_eq!(op.kind, OperationKind::Move);
        assert_eq!(op.status, OperationStatus::Success);
        assert_eq!(op.detail.as_deref(), Some("Organized to Documents"));
        assert!(op.destination.as_deref().unwrap().ends_with("test.txt"));
    }

    #[test]
    fn test_organize_uses_existing_directory() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let log_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        fs::create_dir(base.join("Images")).unwrap();
        fs::write(base.join("test.png"), "png").unwrap();

        organizer(base, false)
            .organize(&mut new_log(&log_dir), false)
            .unwrap();

        assert!(base.join("Images").join("test.png").exists());
    }

    #[test]
    fn test_organize_dry_run_changes_nothing() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let log_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        fs::write(base.join("a.pdf"), "a").unwrap();
        fs::write(base.join("b.jpg"), "b").unwrap();

        let mut log = new_log(&log_dir);
        let report = organizer(base, true).organize(&mut log, true).unwrap();

        assert_eq!(report.moved, 2);
        assert!(base.join("a.pdf").exists());
        assert!(base.join("b.jpg").exists());
        assert!(!base.join("Documents").exists());
        assert!(!base.join("Images").exists());
        assert!(
            log.operations()
                .iter()
                .all(|op| op.status == OperationStatus::DryRun)
        );
    }

    #[test]
    fn test_organize_date_folders() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let log_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        let file = base.join("song.mp3");
        fs::write(&file, "audio").unwrap();

        // 2021-06-15T12:00:00Z, mid-month so the local timezone cannot shift it
        let mtime = SystemTime::UNIX_EPOCH + Duration::from_secs(1_623_758_400);
        fs::File::options()
            .write(true)
            .open(&file)
            .unwrap()
            .set_modified(mtime)
            .unwrap();

        organizer(base, false)
            .organize(&mut new_log(&log_dir), true)
            .unwrap();

        assert!(base.join("Audio").join("2021-06").join("song.mp3").exists());
    }

    #[test]
    fn test_organize_does_not_recurse() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let log_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        fs::create_dir(base.join("nested")).unwrap();
        fs::write(base.join("nested").join("inner.pdf"), "x").unwrap();

        let mut log = new_log(&log_dir);
        let report = organizer(base, false).organize(&mut log, false).unwrap();

        assert_eq!(report.moved, 0);
        assert!(base.join("nested").join("inner.pdf").exists());
        assert!(log.operations().is_empty());
    }

    #[test]
    fn test_organize_skips_log_file_in_source() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        let log_path = base.join("organizer_log.json");
        fs::write(&log_path, "[]").unwrap();
        fs::write(base.join("a.txt"), "a").unwrap();

        let mut log = OperationLog::new(&log_path);
        let report = organizer(base, false).organize(&mut log, false).unwrap();

        assert_eq!(report.moved, 1);
        assert_eq!(report.skipped, 1);
        assert!(log_path.exists());
        assert!(!base.join("Code").join("organizer_log.json").exists());
    }

    #[test]
    fn test_organize_item_failure_does_not_abort_batch() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let log_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        // A regular file where the fallback category directory belongs
        fs::write(base.join("Others"), "not a directory").unwrap();
        fs::write(base.join("x.unknownext"), "x").unwrap();
        fs::write(base.join("a.pdf"), "a").unwrap();

        let mut log = new_log(&log_dir);
        let report = organizer(base, false).organize(&mut log, false).unwrap();

        assert_eq!(report.moved, 1);
        assert_eq!(report.failed, 2);
        assert!(base.join("Documents").join("a.pdf").exists());
        assert!(base.join("x.unknownext").exists());

        let errors: Vec<_> = log
            .operations()
            .iter()
            .filter(|op| op.status == OperationStatus::Error)
            .collect();
        assert_eq!(errors.len(), 2);
        for op in errors {
            assert_eq!(op.kind, OperationKind::Move);
            assert!(op.destination.is_none());
            assert!(op.detail.as_deref().is_some_and(|d| !d.is_empty()));
        }

        let sessions = OperationLog::load_sessions(log.log_file()).unwrap().unwrap();
        assert_eq!(sessions[0].by_status.get("error"), Some(&2));
    }

    #[test]
    fn test_undo_last_session_restores_moves() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let log_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        fs::write(base.join("a.pdf"), "a").unwrap();

        let organizer = organizer(base, false);
        let mut log = new_log(&log_dir);
        organizer.organize(&mut log, false).unwrap();
        assert!(!base.join("a.pdf").exists());

        let outcome = organizer.undo_last_session(log.log_file()).unwrap();

        match outcome {
            UndoOutcome::Completed(report) => assert_eq!(report.restored_files, 1),
            other => panic!("Expected a completed undo, got {:?}", other),
        }
        assert!(base.join("a.pdf").exists());
    }

    #[test]
    fn test_organize_respects_filters() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let log_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        fs::write(base.join("movie.mp4.part"), "partial").unwrap();
        fs::write(base.join("done.mp4"), "full").unwrap();

        let mut rules = FilterRules::default();
        rules.exclude.extensions.push("part".to_string());
        let config = OrganizerConfig::new(CategoryResolver::default(), toml::Table::new(), rules);

        let mut log = new_log(&log_dir);
        let report = FileOrganizer::new(base, config, false)
            .unwrap()
            .organize(&mut log, false)
            .unwrap();

        assert_eq!(report.moved, 1);
        assert_eq!(report.skipped, 1);
        assert!(base.join("movie.mp4.part").exists());
        assert!(base.join("Videos").join("done.mp4").exists());
        assert!(
            log.operations()
                .iter()
                .any(|op| op.kind == OperationKind::Skip && op.status == OperationStatus::Skipped)
        );
    }

    #[test]
    fn test_organize_sniffs_extensionless_files_when_enabled() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let log_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        fs::write(
            base.join("scan"),
            [0x25, 0x50, 0x44, 0x46, 0x2D, 0x31, 0x2E, 0x34],
        )
        .unwrap();

        let config = OrganizerConfig::from_toml_str(
            r#"
            [settings]
            detect_content_type = true
            "#,
        )
        .unwrap();
        FileOrganizer::new(base, config, false)
            .unwrap()
            .organize(&mut new_log(&log_dir), false)
            .unwrap();

        assert!(base.join("Documents").join("scan").exists());
    }

    #[test]
    fn test_organize_custom_categories() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let log_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        fs::write(base.join("notes.md"), "# notes").unwrap();
        fs::write(base.join("a.pdf"), "pdf").unwrap();

        let resolver = CategoryResolver::new(vec![Category::new("Notes", [".md"])]);
        let config = OrganizerConfig::new(resolver, toml::Table::new(), FilterRules::default());
        FileOrganizer::new(base, config, false)
            .unwrap()
            .organize(&mut new_log(&log_dir), false)
            .unwrap();

        assert!(base.join("Notes").join("notes.md").exists());
        assert!(base.join("Others").join("a.pdf").exists());
    }

    #[test]
    fn test_unique_path_free_slot() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("photo.jpg");
        assert_eq!(unique_path(&path), path);
    }

    #[test]
    fn test_unique_path_counts_up() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let dir = temp_dir.path();
        fs::write(dir.join("photo.JPG"), "1").unwrap();
        fs::write(dir.join("photo_1.JPG"), "2").unwrap();
        fs::write(dir.join("photo_2.JPG"), "3").unwrap();

        assert_eq!(unique_path(&dir.join("photo.JPG")), dir.join("photo_3.JPG"));
    }

    #[test]
    fn test_unique_path_without_extension() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let dir = temp_dir.path();
        fs::write(dir.join("README"), "1").unwrap();

        assert_eq!(unique_path(&dir.join("README")), dir.join("README_1"));
    }

    #[test]
    fn test_unique_path_multiple_dots() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let dir = temp_dir.path();
        fs::write(dir.join("backup.tar.gz"), "1").unwrap();

        assert_eq!(
            unique_path(&dir.join("backup.tar.gz")),
            dir.join("backup.tar_1.gz")
        );
    }
}
