//! Compiler and test output parsing
//!
//! Turns the free-text line stream from the build tool into structured
//! per-file diagnostic records, and a test run's output into a
//! [`TestRunSummary`]. Parsing is best-effort throughout: anything that
//! does not match is skipped, an unresolvable file name is dropped with a
//! warning, and neither ever aborts the run.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use regex::Regex;
use tracing::warn;

use crate::locate::SourceLocator;
use crate::metrics::TestRunSummary;
use crate::repair::DEPENDENCY_REMOVAL_MARKER;

/// Every error line the compiler reported for one file, collected across a
/// single build pass. Duplicate line numbers collapse.
#[derive(Debug, Clone)]
pub struct DiagnosticRecord {
    pub file_name: String,
    pub file_path: PathBuf,
    pub error_lines: BTreeSet<usize>,
}

/// Parses build-tool output with precompiled patterns.
pub struct DiagnosticExtractor {
    /// A bare source file name followed eventually by a bracketed 1-based
    /// line number, the shape javac errors take in Maven output.
    error_pattern: Regex,
    /// Surefire per-suite / aggregate summary line.
    summary_pattern: Regex,
    /// Surefire per-test failure header, `method(qualified.Class)`.
    failure_pattern: Regex,
}

impl DiagnosticExtractor {
    pub fn new() -> Self {
        Self {
            error_pattern: Regex::new(r#"([^\\/:*?"<>|]+\.java).*?\[(\d+),"#).unwrap(),
            summary_pattern: Regex::new(
                r"Tests run: (\d+), Failures: (\d+), Errors: (\d+), Skipped: (\d+)",
            )
            .unwrap(),
            failure_pattern: Regex::new(r"(\w+)\(([\w.$]+)\).*<<< (?:FAILURE|ERROR)!").unwrap(),
        }
    }

    /// Extracts one record per distinct file named in the output, keyed by
    /// bare file name. File names that cannot be resolved to a path are
    /// dropped with a warning.
    pub fn extract(
        &self,
        lines: &[String],
        locator: &SourceLocator,
    ) -> BTreeMap<String, DiagnosticRecord> {
        let mut records: BTreeMap<String, DiagnosticRecord> = BTreeMap::new();

        for line in lines {
            let Some(caps) = self.error_pattern.captures(line) else {
                continue;
            };
            let file_name = caps[1].to_string();
            let Ok(line_number) = caps[2].parse::<usize>() else {
                continue;
            };

            if let Some(record) = records.get_mut(&file_name) {
                record.error_lines.insert(line_number);
                continue;
            }

            match locator.resolve(&file_name) {
                Some(file_path) => {
                    records
                        .entry(file_name.clone())
                        .or_insert_with(|| DiagnosticRecord {
                            file_name,
                            file_path,
                            error_lines: BTreeSet::new(),
                        })
                        .error_lines
                        .insert(line_number);
                }
                None => {
                    warn!(
                        file_name = %file_name,
                        "diagnostic names a file not found under any root; dropped"
                    );
                }
            }
        }

        records
    }

    /// Parses a test run's output. The summary counts come from the last
    /// `Tests run:` line in the stream (Maven prints one per suite and a
    /// final aggregate). Failures whose trailing output carries the
    /// dependency-removal marker are classified separately.
    pub fn parse_test_run(&self, lines: &[String]) -> TestRunSummary {
        let mut summary = TestRunSummary::default();

        for (index, line) in lines.iter().enumerate() {
            if let Some(caps) = self.summary_pattern.captures(line) {
                let total: usize = caps[1].parse().unwrap_or(0);
                let failures: usize = caps[2].parse().unwrap_or(0);
                let errors: usize = caps[3].parse().unwrap_or(0);
                let skipped: usize = caps[4].parse().unwrap_or(0);

                summary.total = total;
                summary.failed = failures;
                summary.errors = errors;
                summary.skipped = skipped;
                summary.passed = total.saturating_sub(failures + errors + skipped);
                continue;
            }

            if let Some(caps) = self.failure_pattern.captures(line) {
                let name = format!("{}.{}", &caps[2], &caps[1]);
                if !summary.failing_tests.contains(&name) {
                    summary.failing_tests.push(name.clone());
                    if self.failure_mentions_marker(&lines[index + 1..]) {
                        summary.removal_failures.push(name);
                    }
                }
            }
        }

        summary
    }

    /// Looks for the stub marker in the lines following a failure header,
    /// stopping at the next test header, summary line, or blank line.
    fn failure_mentions_marker(&self, tail: &[String]) -> bool {
        for line in tail {
            if line.trim().is_empty()
                || self.failure_pattern.is_match(line)
                || self.summary_pattern.is_match(line)
            {
                return false;
            }
            if line.contains(DEPENDENCY_REMOVAL_MARKER) {
                return true;
            }
        }
        false
    }
}

impl Default for DiagnosticExtractor {
    fn default() -> Self {
        Self::new()
    }
}
