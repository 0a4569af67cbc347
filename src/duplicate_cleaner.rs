//! Content-hash duplicate detection and removal.
//!
//! Files are hashed with SHA-256 in fixed-size blocks and grouped by digest.
//! Every group with more than one member keeps exactly one file, chosen by a
//! [`KeepStrategy`]; the others are deleted (or the deletion is simulated)
//! and each attempt is written to the [`OperationLog`].

use crate::config::CompiledFilters;
use crate::error::{Error, Result};
use crate::operation_log::{OperationKind, OperationLog, OperationStatus};
use crate::output::OutputFormatter;
use clap::ValueEnum;
use indicatif::ProgressBar;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

/// Bytes read per hashing step.
pub const HASH_BLOCK_SIZE: usize = 64 * 1024;

/// Characters of the digest shown in a [`DuplicateReport`].
const REPORT_HASH_LEN: usize = 16;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Hex-encoded SHA-256 digest of a file's content.
pub fn hash_file(path: &Path) -> std::io::Result<String> {
    let file = File::open(path)?;
    let mut reader = BufReader::with_capacity(HASH_BLOCK_SIZE, file);
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; HASH_BLOCK_SIZE];

    loop {
        let count = reader.read(&mut buffer)?;
        if count == 0 {
            break;
        }
        hasher.update(&buffer[..count]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Which member of a duplicate group survives cleaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum KeepStrategy {
    /// Latest modification time.
    #[default]
    Newest,
    /// Earliest modification time.
    Oldest,
    /// Fewest characters in the file name.
    Shortest,
    /// First member in discovery order.
    #[value(skip)]
    First,
}

impl KeepStrategy {
    /// Parses a strategy name. Unrecognized names fall back to [`KeepStrategy::First`].
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "newest" => Self::Newest,
            "oldest" => Self::Oldest,
            "shortest" => Self::Shortest,
            _ => Self::First,
        }
    }
}

impl From<&str> for KeepStrategy {
    fn from(name: &str) -> Self {
        Self::from_name(name)
    }
}

/// Result of one duplicate scan.
#[derive(Debug, Default)]
pub struct DuplicateScan {
    /// Digest to member paths, only for digests shared by two or more files.
    pub groups: BTreeMap<String, Vec<PathBuf>>,
    /// Files considered, including ones that failed to hash.
    pub files_scanned: usize,
    /// Files that could not be hashed, with the reason.
    pub failures: Vec<(PathBuf, String)>,
}

impl DuplicateScan {
    /// Number of files that would be removed.
    pub fn removable(&self) -> usize {
        self.groups.values().map(|paths| paths.len() - 1).sum()
    }
}

/// Aggregate statistics over all duplicate groups.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateReport {
    pub duplicate_sets: usize,
    pub total_files_involved: usize,
    pub total_duplicates: usize,
    pub wasted_space_bytes: u64,
    pub wasted_space_mb: f64,
    pub details: Vec<DuplicateSetDetail>,
}

/// One duplicate group as shown in a [`DuplicateReport`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateSetDetail {
    /// Leading characters of the content digest.
    pub hash: String,
    pub count: usize,
    pub size_bytes: u64,
    pub size_mb: f64,
    pub files: Vec<String>,
}

/// Finds and removes files with identical content.
pub struct DuplicateCleaner {
    directory: PathBuf,
    filters: CompiledFilters,
    dry_run: bool,
    show_progress: bool,
}

impl DuplicateCleaner {
    /// Creates a cleaner for `directory` that processes every regular file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SourceNotFound`] if the directory does not exist.
    pub fn new(directory: impl Into<PathBuf>, dry_run: bool) -> Result<Self> {
        let directory = directory.into();
        if !directory.is_dir() {
            return Err(Error::SourceNotFound(directory));
        }

        Ok(Self {
            directory: fs::canonicalize(&directory)?,
            filters: CompiledFilters::default(),
            dry_run,
            show_progress: false,
        })
    }

    /// Restricts scans to files accepted by `filters`.
    pub fn with_filters(mut self, filters: CompiledFilters) -> Self {
        self.filters = filters;
        self
    }

    /// Shows a progress bar while hashing.
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Hashes every candidate file and groups them by digest.
    ///
    /// With `recursive` unset only files directly inside the directory are
    /// considered. Symbolic links are never followed. A file that cannot be
    /// read is reported in [`DuplicateScan::failures`] and left out of every
    /// group.
    pub fn find_duplicates(&self, recursive: bool) -> Result<DuplicateScan> {
        let files = self.candidate_files(recursive)?;
        log::info!(
            "Scanning {} files for duplicates in {}",
            files.len(),
            self.directory.display()
        );

        let progress = if self.show_progress {
            OutputFormatter::create_progress_bar(files.len() as u64)
        } else {
            ProgressBar::hidden()
        };

        let mut by_hash: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
        let mut scan = DuplicateScan {
            files_scanned: files.len(),
            ..DuplicateScan::default()
        };

        for path in files {
            match hash_file(&path) {
                Ok(digest) => by_hash.entry(digest).or_default().push(path),
                Err(e) => {
                    log::warn!("Could not hash {}: {}", path.display(), e);
                    scan.failures.push((path, e.to_string()));
                }
            }
            progress.inc(1);
        }
        progress.finish_and_clear();

        by_hash.retain(|_, paths| paths.len() > 1);
        scan.groups = by_hash;
        Ok(scan)
    }

    fn candidate_files(&self, recursive: bool) -> Result<Vec<PathBuf>> {
        let files: Vec<PathBuf> = if recursive {
            WalkDir::new(&self.directory)
                .min_depth(1)
                .into_iter()
                .filter_map(|entry| match entry {
                    Ok(entry) => Some(entry),
                    Err(e) => {
                        log::warn!("Skipping unreadable entry: {}", e);
                        None
                    }
                })
                .filter(|entry| entry.file_type().is_file())
                .map(|entry| entry.into_path())
                .collect()
        } else {
            fs::read_dir(&self.directory)?
                .flatten()
                .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
                .map(|entry| entry.path())
                .collect()
        };

        Ok(files
            .into_iter()
            .filter(|path| {
                let relative = path.strip_prefix(&self.directory).unwrap_or(path.as_path());
                self.filters.should_include(relative)
            })
            .collect())
    }

    /// Index of the group member to keep under `strategy`.
    ///
    /// Ties go to the earliest member. Members whose modification time cannot
    /// be read are never chosen by the time-based strategies; if no member's
    /// time can be read the first member is kept.
    pub fn select_keep(paths: &[PathBuf], strategy: KeepStrategy) -> usize {
        match strategy {
            KeepStrategy::Newest => pick(paths, modified_time, |candidate, best| candidate > best),
            KeepStrategy::Oldest => pick(paths, modified_time, |candidate, best| candidate < best),
            KeepStrategy::Shortest => pick(paths, name_length, |candidate, best| candidate < best),
            KeepStrategy::First => 0,
        }
    }

    /// Removes every duplicate except the one kept by `strategy` and returns
    /// how many files were removed (or would be, when simulating).
    ///
    /// The log is saved before returning.
    pub fn clean(
        &self,
        log: &mut OperationLog,
        recursive: bool,
        strategy: KeepStrategy,
    ) -> Result<usize> {
        let scan = self.find_duplicates(recursive)?;
        self.clean_scan(&scan, log, strategy)
    }

    /// Applies `strategy` to an existing scan.
    ///
    /// Hashing failures are recorded as `hash` errors. A failed deletion is
    /// recorded as an error and not counted. The log is saved before
    /// returning.
    pub fn clean_scan(
        &self,
        scan: &DuplicateScan,
        log: &mut OperationLog,
        strategy: KeepStrategy,
    ) -> Result<usize> {
        for (path, reason) in &scan.failures {
            log.record(
                OperationKind::Hash,
                path,
                None,
                OperationStatus::Error,
                Some(reason.clone()),
            );
        }

        log::info!(
            "Found {} duplicate sets ({} files to remove)",
            scan.groups.len(),
            scan.removable()
        );

        let mut removed = 0;
        for (digest, paths) in &scan.groups {
            let keep = &paths[Self::select_keep(paths, strategy)];
            let keep_name = keep
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            log::info!(
                "Duplicate set {}: keeping {}",
                &digest[..8.min(digest.len())],
                keep.display()
            );

            for path in paths.iter().filter(|path| *path != keep) {
                let outcome = if self.dry_run {
                    Ok(())
                } else {
                    fs::remove_file(path)
                };

                match outcome {
                    Ok(()) => {
                        log::info!(
                            "{}Removed {}",
                            if self.dry_run { "[DRY RUN] " } else { "" },
                            path.display()
                        );
                        log.record(
                            OperationKind::DeleteDuplicate,
                            path,
                            Some(keep),
                            OperationStatus::completed(self.dry_run),
                            Some(format!("Duplicate of {}", keep_name)),
                        );
                        removed += 1;
                    }
                    Err(e) => {
                        log::warn!("Failed to remove {}: {}", path.display(), e);
                        log.record(
                            OperationKind::DeleteDuplicate,
                            path,
                            Some(keep),
                            OperationStatus::Error,
                            Some(e.to_string()),
                        );
                    }
                }
            }
        }

        log.save()?;
        Ok(removed)
    }

    /// Duplicate statistics without touching the filesystem or any log.
    pub fn report(&self, recursive: bool) -> Result<DuplicateReport> {
        let scan = self.find_duplicates(recursive)?;

        let mut report = DuplicateReport {
            duplicate_sets: scan.groups.len(),
            total_files_involved: 0,
            total_duplicates: 0,
            wasted_space_bytes: 0,
            wasted_space_mb: 0.0,
            details: Vec::with_capacity(scan.groups.len()),
        };

        for (digest, paths) in &scan.groups {
            // Members share content, so any one of them gives the size
            let size = fs::metadata(&paths[0])?.len();
            let extra_copies = paths.len() - 1;

            report.total_files_involved += paths.len();
            report.total_duplicates += extra_copies;
            report.wasted_space_bytes += size * extra_copies as u64;
            report.details.push(DuplicateSetDetail {
                hash: digest.chars().take(REPORT_HASH_LEN).collect(),
                count: paths.len(),
                size_bytes: size,
                size_mb: to_mb(size),
                files: paths
                    .iter()
                    .map(|p| p.to_string_lossy().to_string())
                    .collect(),
            });
        }
        report.wasted_space_mb = to_mb(report.wasted_space_bytes);

        Ok(report)
    }
}

/// First member whose key beats every earlier key under `better`.
fn pick<K>(
    paths: &[PathBuf],
    key: impl Fn(&Path) -> Option<K>,
    better: impl Fn(&K, &K) -> bool,
) -> usize {
    let mut best: Option<(usize, K)> = None;
    for (index, path) in paths.iter().enumerate() {
        let Some(candidate) = key(path) else {
            continue;
        };
        let replace = match &best {
            Some((_, current)) => better(&candidate, current),
            None => true,
        };
        if replace {
            best = Some((index, candidate));
        }
    }
    best.map(|(index, _)| index).unwrap_or(0)
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

fn name_length(path: &Path) -> Option<usize> {
    path.file_name().map(|n| n.to_string_lossy().chars().count())
}

fn to_mb(bytes: u64) -> f64 {
    (bytes as f64 / BYTES_PER_MB * 100.0).round() / 100.0
}
