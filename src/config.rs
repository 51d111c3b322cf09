//! Run configuration
//!
//! Settings come from defaults, then an optional `buildmend.toml` next to
//! the target project, then CLI flags. The merged result is frozen into a
//! [`RepairConfig`] that is handed to the controller at construction - no
//! process-wide mutable state.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::warn;

pub const DEFAULT_MAX_ITERATIONS: usize = 20;
pub const CONFIG_FILE_NAME: &str = "buildmend.toml";

/// Immutable settings for one repair run.
#[derive(Debug, Clone)]
pub struct RepairConfig {
    /// The Maven project being repaired.
    pub project_dir: PathBuf,
    /// Root of production sources.
    pub production_root: PathBuf,
    /// Root of test sources.
    pub test_root: PathBuf,
    /// Build tool executable.
    pub maven_command: String,
    /// Inner-loop cap per phase.
    pub max_iterations: usize,
    /// Where the JSON run report is written.
    pub report_path: PathBuf,
}

/// Optional `buildmend.toml` contents. Every field falls back to a
/// default; relative paths resolve against the project directory.
#[derive(Debug, Clone, Default, Deserialize)]
struct FileConfig {
    maven_command: Option<String>,
    production_root: Option<PathBuf>,
    test_root: Option<PathBuf>,
    max_iterations: Option<usize>,
    report_path: Option<PathBuf>,
}

impl RepairConfig {
    /// Defaults merged with `buildmend.toml` when one exists. A config
    /// file that fails to parse is reported and ignored rather than
    /// aborting the run.
    pub fn load(project_dir: &Path) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .with_context(|| format!("project directory not found: {}", project_dir.display()))?;

        let file = Self::read_file_config(&project_dir);

        let join = |p: PathBuf| {
            if p.is_absolute() {
                p
            } else {
                project_dir.join(p)
            }
        };

        Ok(Self {
            production_root: join(
                file.production_root
                    .clone()
                    .unwrap_or_else(|| PathBuf::from("src/main/java")),
            ),
            test_root: join(
                file.test_root
                    .clone()
                    .unwrap_or_else(|| PathBuf::from("src/test/java")),
            ),
            maven_command: file
                .maven_command
                .clone()
                .unwrap_or_else(|| default_maven_command().to_string()),
            max_iterations: file.max_iterations.unwrap_or(DEFAULT_MAX_ITERATIONS),
            report_path: join(
                file.report_path
                    .unwrap_or_else(|| PathBuf::from("buildmend-report.json")),
            ),
            project_dir,
        })
    }

    fn read_file_config(project_dir: &Path) -> FileConfig {
        let path = project_dir.join(CONFIG_FILE_NAME);
        let Ok(content) = fs::read_to_string(&path) else {
            return FileConfig::default();
        };
        match toml::from_str(&content) {
            Ok(config) => config,
            Err(err) => {
                warn!(path = %path.display(), %err, "config file is invalid; using defaults");
                FileConfig::default()
            }
        }
    }
}

/// The build command this platform expects.
pub fn default_maven_command() -> &'static str {
    if cfg!(windows) {
        "mvn.cmd"
    } else {
        "mvn"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = RepairConfig::load(dir.path()).unwrap();

        assert!(config.production_root.ends_with("src/main/java"));
        assert!(config.test_root.ends_with("src/test/java"));
        assert_eq!(config.max_iterations, DEFAULT_MAX_ITERATIONS);
        assert!(config.report_path.ends_with("buildmend-report.json"));
    }

    #[test]
    fn file_config_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"
maven_command = "mvnw"
production_root = "app/src"
max_iterations = 5
"#,
        )
        .unwrap();

        let config = RepairConfig::load(dir.path()).unwrap();
        assert_eq!(config.maven_command, "mvnw");
        assert!(config.production_root.ends_with("app/src"));
        assert!(config.production_root.is_absolute());
        assert_eq!(config.max_iterations, 5);
        // Untouched fields keep their defaults.
        assert!(config.test_root.ends_with("src/test/java"));
    }

    #[test]
    fn invalid_config_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE_NAME), "max_iterations = \"lots\"").unwrap();

        let config = RepairConfig::load(dir.path()).unwrap();
        assert_eq!(config.max_iterations, DEFAULT_MAX_ITERATIONS);
    }

    #[test]
    fn missing_project_dir_is_an_error() {
        assert!(RepairConfig::load(Path::new("/definitely/not/here")).is_err());
    }
}
