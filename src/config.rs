//! Configuration: category mapping, settings, and file filters.
//!
//! Configuration is stored in TOML. Every section is optional; anything left
//! out falls back to the built-in defaults.
//!
//! ```toml
//! [categories]
//! Documents = [".pdf", ".txt"]
//! Images = [".jpg", ".png"]
//!
//! [settings]
//! log_file = "organizer_log.json"
//! dry_run = false
//! create_date_folders = false
//! detect_content_type = false
//!
//! [filters]
//! enable_hidden_files = true
//!
//! [filters.exclude]
//! filenames = [".DS_Store", "Thumbs.db"]
//! patterns = ["*.part"]
//! extensions = ["crdownload"]
//! regex = []
//!
//! [filters.include]
//! patterns = []
//! ```
//!
//! Category order in the file is significant: when two categories list the
//! same extension, the one written first wins.

use crate::file_category::{Category, CategoryResolver};
use glob::Pattern;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default name of the operation log file.
pub const DEFAULT_LOG_FILE: &str = "organizer_log.json";

/// Errors that can occur during configuration loading and filtering.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at the specified path.
    #[error("Configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),
    /// Invalid TOML syntax or structure.
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),
    /// Invalid glob pattern provided.
    #[error("Invalid glob pattern '{0}': expected *.ext or dir/**")]
    InvalidGlobPattern(String),
    /// Invalid regex pattern provided with the actual error reason.
    #[error("Invalid regex pattern '{pattern}': {reason}")]
    InvalidRegexPattern {
        /// The regex pattern that failed to compile.
        pattern: String,
        /// The reason why the pattern is invalid.
        reason: String,
    },
    /// IO error while reading or writing configuration.
    #[error("IO error on configuration: {0}")]
    Io(String),
    /// The configuration could not be rendered as TOML.
    #[error("Could not serialize configuration: {0}")]
    Serialize(String),
}

/// Complete tidydown configuration.
///
/// Loaded once at startup and never mutated afterwards; engines get their own
/// clone.
#[derive(Debug, Clone)]
pub struct OrganizerConfig {
    resolver: CategoryResolver,
    settings: toml::Table,
    filters: FilterRules,
}

/// On-disk shape of the configuration file.
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    categories: Option<toml::Table>,
    #[serde(default)]
    settings: toml::Table,
    #[serde(default)]
    filters: FilterRules,
}

/// Root-level filter rules configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterRules {
    /// Whether to include hidden files (starting with "."). Defaults to true.
    pub enable_hidden_files: bool,

    /// Rules for excluding files.
    pub exclude: ExcludeRules,

    /// Rules for including files (whitelist, overrides exclude rules).
    pub include: IncludeRules,
}

impl Default for FilterRules {
    fn default() -> Self {
        Self {
            enable_hidden_files: true,
            exclude: ExcludeRules::default(),
            include: IncludeRules::default(),
        }
    }
}

/// Rules for excluding files from organization and duplicate scans.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExcludeRules {
    /// Exact filenames to exclude (e.g., ".DS_Store", "Thumbs.db").
    #[serde(default)]
    pub filenames: Vec<String>,

    /// Glob patterns to exclude (e.g., "*.part", "torrents/**").
    #[serde(default)]
    pub patterns: Vec<String>,

    /// File extensions to exclude, without the dot (e.g., "crdownload", "tmp").
    #[serde(default)]
    pub extensions: Vec<String>,

    /// Regex patterns matched against the file name.
    #[serde(default)]
    pub regex: Vec<String>,
}

/// Rules for including files, overriding exclude rules (whitelist).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IncludeRules {
    /// Glob patterns that override exclude rules.
    #[serde(default)]
    pub patterns: Vec<String>,
}

impl OrganizerConfig {
    /// Builds a configuration from its parts.
    pub fn new(resolver: CategoryResolver, settings: toml::Table, filters: FilterRules) -> Self {
        Self {
            resolver,
            settings,
            filters,
        }
    }

    /// Load configuration from a file, with fallback to defaults.
    ///
    /// Attempts to load configuration in the following order:
    /// 1. If `config_path` is provided, load from that file
    /// 2. Look for `.tidydownrc.toml` in the current directory
    /// 3. Look for `~/.config/tidydown/config.toml` in home directory
    /// 4. Fall back to default configuration
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file is explicitly provided but cannot be read,
    /// or if any discovered file is malformed.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local_config = PathBuf::from(".tidydownrc.toml");
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Ok(home) = std::env::var("HOME") {
            let home_config = PathBuf::from(home)
                .join(".config")
                .join("tidydown")
                .join("config.toml");
            if home_config.exists() {
                return Self::load_from_file(&home_config);
            }
        }

        log::debug!("No configuration file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ConfigNotFound` if file does not exist.
    /// Returns `ConfigError::ConfigInvalid` if TOML parsing fails.
    /// Returns `ConfigError::Io` if file cannot be read.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        log::debug!("Loaded configuration from {}", path.display());
        Self::from_toml_str(&content)
    }

    /// Parses configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig =
            toml::from_str(content).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))?;

        let resolver = match raw.categories {
            Some(table) => parse_categories(table)?,
            None => CategoryResolver::default(),
        };

        let mut settings = default_settings();
        for (key, value) in raw.settings {
            settings.insert(key, value);
        }

        Ok(Self::new(resolver, settings, raw.filters))
    }

    /// Writes the built-in default configuration to `output_path`.
    pub fn write_default(output_path: &Path) -> Result<(), ConfigError> {
        let content = Self::default().to_toml_string()?;
        fs::write(output_path, content).map_err(|e| ConfigError::Io(e.to_string()))
    }

    /// Renders this configuration as TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        let mut categories = toml::Table::new();
        for category in self.resolver.categories() {
            let extensions = category
                .extensions
                .iter()
                .map(|ext| toml::Value::String(ext.clone()))
                .collect();
            categories.insert(category.name.clone(), toml::Value::Array(extensions));
        }

        let filters = toml::Value::try_from(&self.filters)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;

        let mut document = toml::Table::new();
        document.insert("categories".to_string(), toml::Value::Table(categories));
        document.insert(
            "settings".to_string(),
            toml::Value::Table(self.settings.clone()),
        );
        document.insert("filters".to_string(), filters);

        toml::to_string_pretty(&document).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    /// The category resolver built from `[categories]`.
    pub fn resolver(&self) -> &CategoryResolver {
        &self.resolver
    }

    /// Returns the setting under `key`, or `default` when it is absent or
    /// does not have the requested type.
    pub fn get_setting<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.settings
            .get(key)
            .and_then(|value| value.clone().try_into().ok())
            .unwrap_or(default)
    }

    /// Path of the operation log file.
    pub fn log_file(&self) -> PathBuf {
        PathBuf::from(self.get_setting("log_file", DEFAULT_LOG_FILE.to_string()))
    }

    /// Whether engines should simulate by default.
    pub fn dry_run(&self) -> bool {
        self.get_setting("dry_run", false)
    }

    /// Whether organization should nest files under `YYYY-MM` folders by default.
    pub fn create_date_folders(&self) -> bool {
        self.get_setting("create_date_folders", false)
    }

    /// Whether extension-less files should have their type sniffed from content.
    pub fn detect_content_type(&self) -> bool {
        self.get_setting("detect_content_type", false)
    }

    /// The raw filter rules.
    pub fn filters(&self) -> &FilterRules {
        &self.filters
    }

    /// Compile the filter rules into optimized structures for matching.
    ///
    /// # Errors
    ///
    /// Returns an error if any regex or glob patterns are invalid.
    pub fn compile_filters(&self) -> Result<CompiledFilters, ConfigError> {
        CompiledFilters::new(&self.filters)
    }
}

impl Default for OrganizerConfig {
    fn default() -> Self {
        Self::new(
            CategoryResolver::default(),
            default_settings(),
            FilterRules::default(),
        )
    }
}

fn default_settings() -> toml::Table {
    let mut settings = toml::Table::new();
    settings.insert("create_date_folders".to_string(), toml::Value::Boolean(false));
    settings.insert(
        "log_file".to_string(),
        toml::Value::String(DEFAULT_LOG_FILE.to_string()),
    );
    settings.insert("dry_run".to_string(), toml::Value::Boolean(false));
    settings.insert("detect_content_type".to_string(), toml::Value::Boolean(false));
    settings
}

fn parse_categories(table: toml::Table) -> Result<CategoryResolver, ConfigError> {
    let mut categories = Vec::with_capacity(table.len());
    for (name, value) in table {
        let toml::Value::Array(items) = value else {
            return Err(ConfigError::ConfigInvalid(format!(
                "category '{}' must be a list of extensions",
                name
            )));
        };
        let extensions = items
            .into_iter()
            .map(|item| match item {
                toml::Value::String(ext) => Ok(ext),
                other => Err(ConfigError::ConfigInvalid(format!(
                    "category '{}' contains a non-string extension: {}",
                    name, other
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?;
        categories.push(Category::new(name, extensions));
    }
    Ok(CategoryResolver::new(categories))
}

/// Compiled, optimized filter structures for efficient file matching.
///
/// This struct pre-processes all filter rules (glob patterns, regex patterns, etc.)
/// into efficient data structures so that matching is O(1) or O(n) where n is the
/// number of rules, rather than reparsing patterns on each file.
#[derive(Debug, Clone)]
pub struct CompiledFilters {
    enable_hidden_files: bool,
    exclude_filenames: HashSet<String>,
    exclude_extensions: HashSet<String>,
    exclude_patterns: Vec<Pattern>,
    exclude_regexes: Vec<Regex>,
    include_patterns: Vec<Pattern>,
}

impl CompiledFilters {
    /// Create compiled filters from filter rules.
    ///
    /// # Errors
    ///
    /// Returns an error if any glob or regex patterns are invalid.
    pub fn new(rules: &FilterRules) -> Result<Self, ConfigError> {
        let exclude_patterns = compile_globs(&rules.exclude.patterns)?;
        let include_patterns = compile_globs(&rules.include.patterns)?;

        let exclude_regexes = rules
            .exclude
            .regex
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| ConfigError::InvalidRegexPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            enable_hidden_files: rules.enable_hidden_files,
            exclude_filenames: rules.exclude.filenames.iter().cloned().collect(),
            exclude_extensions: rules
                .exclude
                .extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
            exclude_patterns,
            exclude_regexes,
            include_patterns,
        })
    }

    /// Check if a file should be processed (not excluded).
    ///
    /// `relative_path` is the file's path relative to the scanned root.
    ///
    /// Checks are performed in this order, with early termination:
    /// 1. Include patterns (whitelist) - if matched, always include
    /// 2. Hidden file filter - if hidden and disabled, exclude
    /// 3. Exact filename match - if matched, exclude
    /// 4. File extension match - if matched, exclude
    /// 5. Glob pattern match - if matched, exclude
    /// 6. Regex pattern match - if matched, exclude
    /// 7. Default: include
    pub fn should_include(&self, relative_path: &Path) -> bool {
        let file_name = relative_path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();

        if self.matches_any(&self.include_patterns, relative_path) {
            return true;
        }

        if !self.enable_hidden_files && file_name.starts_with('.') {
            return false;
        }

        if self.exclude_filenames.contains(file_name.as_ref()) {
            return false;
        }

        if let Some(ext) = relative_path.extension() {
            let ext_lower = ext.to_string_lossy().to_lowercase();
            if self.exclude_extensions.contains(&ext_lower) {
                return false;
            }
        }

        if self.matches_any(&self.exclude_patterns, relative_path) {
            return false;
        }

        !self
            .exclude_regexes
            .iter()
            .any(|regex| regex.is_match(&file_name))
    }

    fn matches_any(&self, patterns: &[Pattern], path: &Path) -> bool {
        patterns.iter().any(|pattern| pattern.matches_path(path))
    }
}

impl Default for CompiledFilters {
    fn default() -> Self {
        Self {
            enable_hidden_files: true,
            exclude_filenames: HashSet::new(),
            exclude_extensions: HashSet::new(),
            exclude_patterns: Vec::new(),
            exclude_regexes: Vec::new(),
            include_patterns: Vec::new(),
        }
    }
}

fn compile_globs(patterns: &[String]) -> Result<Vec<Pattern>, ConfigError> {
    patterns
        .iter()
        .map(|pattern| {
            Pattern::new(pattern).map_err(|_| ConfigError::InvalidGlobPattern(pattern.clone()))
        })
        .collect()
}
