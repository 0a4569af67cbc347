/// File categorization by extension.
///
/// Categories are kept as an ordered list of (name, extensions) pairs rather
/// than an extension-keyed map, so that when two categories claim the same
/// extension the one declared first wins.
///
/// # Examples
///
/// ```
/// use tidydown::file_category::{CategoryResolver, FALLBACK_CATEGORY};
///
/// let resolver = CategoryResolver::default();
/// assert_eq!(resolver.resolve(".pdf"), "Documents");
/// assert_eq!(resolver.resolve(".PNG"), "Images");
/// assert_eq!(resolver.resolve(".unknown"), FALLBACK_CATEGORY);
/// ```
use serde::Serialize;
use std::path::Path;

/// Category used when no extension matches.
pub const FALLBACK_CATEGORY: &str = "Others";

/// Built-in category mapping, in precedence order.
pub const DEFAULT_CATEGORIES: &[(&str, &[&str])] = &[
    (
        "Documents",
        &[".pdf", ".doc", ".docx", ".txt", ".odt", ".rtf", ".tex", ".wpd"],
    ),
    (
        "Images",
        &[".jpg", ".jpeg", ".png", ".gif", ".bmp", ".svg", ".webp", ".ico", ".tiff"],
    ),
    (
        "Videos",
        &[".mp4", ".avi", ".mkv", ".mov", ".wmv", ".flv", ".webm", ".m4v"],
    ),
    ("Audio", &[".mp3", ".wav", ".flac", ".aac", ".ogg", ".wma", ".m4a"]),
    ("Archives", &[".zip", ".rar", ".7z", ".tar", ".gz", ".bz2", ".xz"]),
    (
        "Programs",
        &[".exe", ".msi", ".dmg", ".pkg", ".deb", ".rpm", ".appimage"],
    ),
    (
        "Code",
        &[".py", ".js", ".html", ".css", ".java", ".cpp", ".c", ".h", ".json", ".xml"],
    ),
    ("Spreadsheets", &[".xlsx", ".xls", ".csv", ".ods"]),
    ("Presentations", &[".pptx", ".ppt", ".odp"]),
    ("Ebooks", &[".epub", ".mobi", ".azw", ".azw3"]),
];

/// A named bucket of file extensions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Category {
    /// Category name, also used as the destination directory name.
    pub name: String,
    /// Normalized extensions (lowercase, leading dot).
    pub extensions: Vec<String>,
}

impl Category {
    /// Creates a category, normalizing every extension.
    pub fn new<I, S>(name: impl Into<String>, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            name: name.into(),
            extensions: extensions
                .into_iter()
                .map(|ext| normalize_extension(ext.as_ref()))
                .collect(),
        }
    }

    /// Returns true if this category claims the (already normalized) extension.
    fn contains(&self, extension: &str) -> bool {
        self.extensions.iter().any(|ext| ext == extension)
    }
}

/// Maps file extensions to category names.
///
/// Immutable once built; engines hold it for their whole lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryResolver {
    categories: Vec<Category>,
}

impl CategoryResolver {
    /// Builds a resolver from categories in precedence order.
    pub fn new(categories: Vec<Category>) -> Self {
        Self { categories }
    }

    /// Resolves an extension (with leading dot, any case) to a category name.
    ///
    /// Never fails: anything unmatched, including the empty extension,
    /// resolves to [`FALLBACK_CATEGORY`].
    pub fn resolve(&self, extension: &str) -> &str {
        let extension = extension.to_lowercase();
        self.categories
            .iter()
            .find(|category| category.contains(&extension))
            .map(|category| category.name.as_str())
            .unwrap_or(FALLBACK_CATEGORY)
    }

    /// Category names in precedence order.
    pub fn list_categories(&self) -> Vec<&str> {
        self.categories.iter().map(|c| c.name.as_str()).collect()
    }

    /// The categories themselves, in precedence order.
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }
}

impl Default for CategoryResolver {
    fn default() -> Self {
        Self::new(
            DEFAULT_CATEGORIES
                .iter()
                .map(|(name, extensions)| Category::new(*name, extensions.iter()))
                .collect(),
        )
    }
}

/// Lowercases an extension and makes sure it carries a leading dot.
pub fn normalize_extension(extension: &str) -> String {
    let lower = extension.trim().to_lowercase();
    if lower.starts_with('.') {
        lower
    } else {
        format!(".{}", lower)
    }
}

/// Extracts the lowercase extension of a path, including the leading dot.
///
/// Returns an empty string for names without an extension, such as
/// `README` or `.bashrc`.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

/// Guesses an extension from the file's magic bytes.
pub fn sniff_extension(path: &Path) -> Option<String> {
    match infer::get_from_path(path) {
        Ok(Some(kind)) => Some(format!(".{}", kind.extension())),
        Ok(None) => None,
        Err(e) => {
            log::debug!("Could not sniff {}: {}", path.display(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_known_extensions() {
        let resolver = CategoryResolver::default();
        assert_eq!(resolver.resolve(".pdf"), "Documents");
        assert_eq!(resolver.resolve(".jpg"), "Images");
        assert_eq!(resolver.resolve(".mp4"), "Videos");
        assert_eq!(resolver.resolve(".mp3"), "Audio");
        assert_eq!(resolver.resolve(".zip"), "Archives");
        assert_eq!(resolver.resolve(".py"), "Code");
    }

    #[test]
    fn test_resolve_case_insensitive() {
        let resolver = CategoryResolver::default();
        assert_eq!(resolver.resolve(".PDF"), "Documents");
        assert_eq!(resolver.resolve(".Pdf"), "Documents");
        assert_eq!(resolver.resolve(".JPEG"), "Images");
    }

    #[test]
    fn test_resolve_unknown_is_fallback() {
        let resolver = CategoryResolver::default();
        assert_eq!(resolver.resolve(".xyz"), FALLBACK_CATEGORY);
        assert_eq!(resolver.resolve(""), FALLBACK_CATEGORY);
        assert_eq!(resolver.resolve("."), FALLBACK_CATEGORY);
    }

    #[test]
    fn test_first_match_wins() {
        let resolver = CategoryResolver::new(vec![
            Category::new("Web", [".html"]),
            Category::new("Code", [".html", ".rs"]),
        ]);
        assert_eq!(resolver.resolve(".html"), "Web");
        assert_eq!(resolver.resolve(".rs"), "Code");
    }

    #[test]
    fn test_list_categories_keeps_order() {
        let resolver = CategoryResolver::default();
        let names = resolver.list_categories();
        assert_eq!(names.first(), Some(&"Documents"));
        assert_eq!(names.last(), Some(&"Ebooks"));
        assert_eq!(names.len(), DEFAULT_CATEGORIES.len());
    }

    #[test]
    fn test_category_normalizes_extensions() {
        let category = Category::new("Custom", ["TXT", ".Md"]);
        assert_eq!(category.extensions, vec![".txt", ".md"]);
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of(Path::new("report.PDF")), ".pdf");
        assert_eq!(extension_of(Path::new("archive.tar.gz")), ".gz");
        assert_eq!(extension_of(Path::new("README")), "");
        assert_eq!(extension_of(Path::new(".bashrc")), "");
    }

    #[test]
    fn test_sniff_extension_png() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("image");
        fs::write(
            &path,
            [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00],
        )
        .expect("Failed to write file");

        assert_eq!(sniff_extension(&path), Some(".png".to_string()));
    }

    #[test]
    fn test_sniff_extension_plain_text() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("notes");
        fs::write(&path, "just some words").expect("Failed to write file");

        assert_eq!(sniff_extension(&path), None);
    }
}
