//! Run report artifact
//!
//! Serializes what the run did into a JSON file and prints the human
//! summary. The report is the only place the enum-keyed histogram turns
//! back into labels.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::convergence::{PhaseOutcome, RunResult};
use crate::metrics::{PhaseMetrics, TestRunSummary};

#[derive(Debug, Serialize)]
pub struct RunReport {
    pub generated_at: DateTime<Utc>,
    pub success: bool,
    pub production: PhaseReport,
    pub test: PhaseReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tests: Option<TestReport>,
}

#[derive(Debug, Serialize)]
pub struct PhaseReport {
    pub outcome: &'static str,
    pub iterations: usize,
    pub total_files: usize,
    pub total_lines: usize,
    pub modified_files: Vec<String>,
    pub file_modification_rate: f64,
    pub deleted_lines: usize,
    pub line_deletion_rate: f64,
    pub deleted_elements: u64,
    pub deleted_by_kind: BTreeMap<String, u64>,
}

#[derive(Debug, Serialize)]
pub struct TestReport {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub skipped: usize,
    pub pass_rate: f64,
    pub failing_tests: Vec<String>,
    pub removal_failures: Vec<String>,
}

fn outcome_label(outcome: &PhaseOutcome) -> &'static str {
    match outcome {
        PhaseOutcome::Converged { .. } => "converged",
        PhaseOutcome::Stalled { .. } => "stalled",
        PhaseOutcome::Exhausted => "exhausted",
    }
}

fn phase_report(outcome: &PhaseOutcome, metrics: &PhaseMetrics) -> PhaseReport {
    PhaseReport {
        outcome: outcome_label(outcome),
        iterations: metrics.iterations,
        total_files: metrics.total_files,
        total_lines: metrics.total_lines,
        modified_files: metrics.modified_files.iter().cloned().collect(),
        file_modification_rate: metrics.file_modification_rate(),
        deleted_lines: metrics.deleted_lines,
        line_deletion_rate: metrics.line_deletion_rate(),
        deleted_elements: metrics.deleted_elements,
        deleted_by_kind: metrics
            .deleted_by_kind
            .iter()
            .map(|(kind, count)| (kind.label().to_string(), *count))
            .collect(),
    }
}

fn test_report(summary: &TestRunSummary) -> TestReport {
    TestReport {
        total: summary.total,
        passed: summary.passed,
        failed: summary.failed,
        errors: summary.errors,
        skipped: summary.skipped,
        pass_rate: summary.pass_rate(),
        failing_tests: summary.failing_tests.clone(),
        removal_failures: summary.removal_failures.clone(),
    }
}

impl RunReport {
    pub fn from_result(result: &RunResult) -> Self {
        Self {
            generated_at: Utc::now(),
            success: result.success(),
            production: phase_report(&result.production, &result.metrics.production),
            test: phase_report(&result.test, &result.metrics.test),
            tests: result.test_summary.as_ref().map(test_report),
        }
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        fs::write(path, content)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }
}

/// Prints the human summary the way the metrics have always been read:
/// per-phase totals, rates, and the kind histogram sorted by count.
pub fn print_summary(result: &RunResult) {
    println!();
    println!("========== repair summary ==========");
    println!(
        "overall: {}",
        if result.success() {
            "both phases converged"
        } else {
            "unresolved diagnostics remain"
        }
    );

    for (name, outcome, metrics) in [
        ("production", &result.production, &result.metrics.production),
        ("test", &result.test, &result.metrics.test),
    ] {
        println!();
        println!(
            "[{}] {} after {} iteration(s)",
            name,
            outcome_label(outcome),
            metrics.iterations
        );
        println!("  files: {} total, {} modified ({:.1}%)",
            metrics.total_files,
            metrics.modified_files.len(),
            metrics.file_modification_rate()
        );
        println!(
            "  lines: {} total, {} deleted ({:.1}%)",
            metrics.total_lines,
            metrics.deleted_lines,
            metrics.line_deletion_rate()
        );
        println!("  elements removed or synthesized: {}", metrics.deleted_elements);

        let mut kinds: Vec<_> = metrics.deleted_by_kind.iter().collect();
        kinds.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        for (kind, count) in kinds {
            println!("    {}: {}", kind.label(), count);
        }
    }

    if let Some(summary) = &result.test_summary {
        println!();
        println!(
            "[tests] {} run, {} passed ({:.1}%), {} failed, {} errors, {} skipped",
            summary.total,
            summary.passed,
            summary.pass_rate(),
            summary.failed,
            summary.errors,
            summary.skipped
        );
        for name in &summary.failing_tests {
            let cause = if summary.removal_failures.contains(name) {
                " (dependency removal)"
            } else {
                ""
            };
            println!("    failing: {}{}", name, cause);
        }
    }
    println!("====================================");
}
