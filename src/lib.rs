//! tidydown - A downloads folder organizer and duplicate cleaner
//!
//! This library sorts files into category subdirectories by extension,
//! optionally under `YYYY-MM` date folders, finds and removes files with
//! identical content, and records every operation in an append-only JSON
//! log that backs reporting and undo.

pub mod cli;
pub mod config;
pub mod duplicate_cleaner;
pub mod error;
pub mod file_category;
pub mod file_organizer;
pub mod operation_log;
pub mod output;
pub mod undo;

pub use config::{CompiledFilters, ConfigError, OrganizerConfig};
pub use duplicate_cleaner::{DuplicateCleaner, DuplicateReport, KeepStrategy};
pub use error::{Error, Result};
pub use file_category::{Category, CategoryResolver};
pub use file_organizer::{FileOrganizer, OrganizeReport};
pub use operation_log::{OperationKind, OperationLog, OperationRecord, OperationStatus, Session};
pub use undo::{UndoManager, UndoOutcome, UndoReport};

pub use cli::{Cli, run_cli};
