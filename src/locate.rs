//! File location and project census
//!
//! Maps bare file names from diagnostics onto paths (production root first,
//! then test root), classifies paths into production vs. test, and counts
//! the files and lines the metrics report against.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;
use walkdir::WalkDir;

use crate::metrics::Partition;

const SOURCE_EXT: &str = "java";

/// Resolves diagnostic file names against the two configured roots.
pub struct SourceLocator {
    production_root: PathBuf,
    test_root: PathBuf,
}

/// File and line totals for one root.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Census {
    pub files: usize,
    pub lines: usize,
}

impl SourceLocator {
    pub fn new(production_root: PathBuf, test_root: PathBuf) -> Self {
        Self {
            production_root,
            test_root,
        }
    }

    /// Finds the file with this bare name, searching the production root
    /// before the test root. When several files share the name, the first
    /// one in walk order wins; the ambiguity is logged. Walk order is
    /// stable on a given platform but not across platforms.
    pub fn resolve(&self, file_name: &str) -> Option<PathBuf> {
        self.resolve_in(file_name, &self.production_root)
            .or_else(|| self.resolve_in(file_name, &self.test_root))
    }

    fn resolve_in(&self, file_name: &str, root: &Path) -> Option<PathBuf> {
        if !root.exists() {
            return None;
        }

        let mut matches: Vec<PathBuf> = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| entry.file_name().to_str() == Some(file_name))
            .map(|entry| entry.into_path())
            .collect();

        if matches.len() > 1 {
            warn!(
                file_name,
                candidates = ?matches,
                "multiple files share this name; picking the first in walk order"
            );
        }

        if matches.is_empty() {
            None
        } else {
            Some(matches.remove(0))
        }
    }

    /// Classifies a path by the root it lives under. Anything under the
    /// test root is test code; everything else is production. A production
    /// directory that happens to be placed under the configured test root
    /// is still classified as test - known edge case, confined to
    /// configuration.
    pub fn classify(&self, path: &Path) -> Partition {
        if path.starts_with(&self.test_root) {
            Partition::Test
        } else {
            Partition::Production
        }
    }

    pub fn production_census(&self) -> Census {
        census_of(&self.production_root)
    }

    pub fn test_census(&self) -> Census {
        census_of(&self.test_root)
    }
}

fn census_of(root: &Path) -> Census {
    if !root.exists() {
        warn!(root = %root.display(), "source root not found; counting zero");
        return Census::default();
    }

    let mut census = Census::default();
    for entry in WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| entry.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(SOURCE_EXT) {
            continue;
        }
        census.files += 1;
        match fs::read_to_string(path) {
            Ok(content) => census.lines += content.lines().count(),
            Err(err) => warn!(path = %path.display(), %err, "failed to read file for census"),
        }
    }
    census
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn fixture() -> (tempfile::TempDir, SourceLocator) {
        let dir = tempfile::tempdir().unwrap();
        let prod = dir.path().join("src/main/java/com/example");
        let test = dir.path().join("src/test/java/com/example");
        fs::create_dir_all(&prod).unwrap();
        fs::create_dir_all(&test).unwrap();

        fs::write(prod.join("Foo.java"), "class Foo {}\n").unwrap();
        fs::write(prod.join("Shared.java"), "class Shared {}\n").unwrap();
        fs::write(test.join("FooTest.java"), "class FooTest {}\nclass X {}\n").unwrap();
        fs::write(test.join("Shared.java"), "class Shared {}\n").unwrap();

        let locator = SourceLocator::new(
            dir.path().join("src/main/java"),
            dir.path().join("src/test/java"),
        );
        (dir, locator)
    }

    #[test]
    fn resolves_production_file() {
        let (_dir, locator) = fixture();
        let path = locator.resolve("Foo.java").unwrap();
        assert!(path.ends_with("src/main/java/com/example/Foo.java"));
    }

    #[test]
    fn resolves_test_file_when_absent_from_production() {
        let (_dir, locator) = fixture();
        let path = locator.resolve("FooTest.java").unwrap();
        assert!(path.ends_with("src/test/java/com/example/FooTest.java"));
    }

    #[test]
    fn production_root_wins_for_duplicate_names() {
        let (_dir, locator) = fixture();
        let path = locator.resolve("Shared.java").unwrap();
        assert!(path.starts_with(locator.production_root.as_path()));
    }

    #[test]
    fn unknown_name_resolves_to_none() {
        let (_dir, locator) = fixture();
        assert!(locator.resolve("Missing.java").is_none());
    }

    #[test]
    fn classifies_by_root() {
        let (_dir, locator) = fixture();
        let prod = locator.resolve("Foo.java").unwrap();
        let test = locator.resolve("FooTest.java").unwrap();
        assert_eq!(locator.classify(&prod), Partition::Production);
        assert_eq!(locator.classify(&test), Partition::Test);
    }

    #[test]
    fn census_counts_files_and_lines() {
        let (_dir, locator) = fixture();
        let prod = locator.production_census();
        assert_eq!(prod.files, 2);
        assert_eq!(prod.lines, 2);

        let test = locator.test_census();
        assert_eq!(test.files, 2);
        assert_eq!(test.lines, 3);
    }

    #[test]
    fn missing_root_counts_zero() {
        let dir = tempfile::tempdir().unwrap();
        let locator = SourceLocator::new(dir.path().join("absent"), dir.path().join("also-absent"));
        assert_eq!(locator.production_census(), Census::default());
        assert!(locator.resolve("Foo.java").is_none());
    }
}
