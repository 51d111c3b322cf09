//! Run bookkeeping
//!
//! Accumulates what the repair loop did, partitioned into production and
//! test code. Pure data: nothing here drives control flow.

use std::collections::{BTreeMap, BTreeSet};

use crate::tree::NodeKind;

/// Which half of the project a file belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Partition {
    Production,
    Test,
}

impl Partition {
    pub fn label(&self) -> &'static str {
        match self {
            Partition::Production => "production",
            Partition::Test => "test",
        }
    }
}

/// Audit trail for one partition, never reset mid-run.
#[derive(Debug, Clone, Default)]
pub struct PhaseMetrics {
    pub total_files: usize,
    pub total_lines: usize,
    pub modified_files: BTreeSet<String>,
    pub deleted_lines: usize,
    pub deleted_elements: u64,
    pub deleted_by_kind: BTreeMap<NodeKind, u64>,
    pub iterations: usize,
}

impl PhaseMetrics {
    pub fn record_element(&mut self, kind: NodeKind) {
        self.deleted_elements += 1;
        *self.deleted_by_kind.entry(kind).or_insert(0) += 1;
    }

    pub fn record_modified_file(&mut self, name: &str) {
        self.modified_files.insert(name.to_string());
    }

    pub fn record_deleted_lines(&mut self, lines: usize) {
        self.deleted_lines += lines;
    }

    /// Share of files that were modified, as a percentage.
    pub fn file_modification_rate(&self) -> f64 {
        if self.total_files == 0 {
            0.0
        } else {
            self.modified_files.len() as f64 / self.total_files as f64 * 100.0
        }
    }

    /// Share of lines that were deleted, as a percentage.
    pub fn line_deletion_rate(&self) -> f64 {
        if self.total_lines == 0 {
            0.0
        } else {
            self.deleted_lines as f64 / self.total_lines as f64 * 100.0
        }
    }
}

/// Both partitions' metrics for a single run.
#[derive(Debug, Clone, Default)]
pub struct MetricsAccumulator {
    pub production: PhaseMetrics,
    pub test: PhaseMetrics,
}

impl MetricsAccumulator {
    pub fn partition_mut(&mut self, partition: Partition) -> &mut PhaseMetrics {
        match partition {
            Partition::Production => &mut self.production,
            Partition::Test => &mut self.test,
        }
    }

    pub fn partition(&self, partition: Partition) -> &PhaseMetrics {
        match partition {
            Partition::Production => &self.production,
            Partition::Test => &self.test,
        }
    }
}

/// Outcome of the single test execution after both phases converge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestRunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub skipped: usize,
    /// Every failing test, `qualified.Class.method`, in encounter order.
    pub failing_tests: Vec<String>,
    /// The subset of failures caused by stubbed-out test bodies.
    pub removal_failures: Vec<String>,
}

impl TestRunSummary {
    /// Failures and errors folded together, the way Maven's summary line is
    /// usually read.
    pub fn unsuccessful(&self) -> usize {
        self.failed + self.errors
    }

    pub fn pass_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.passed as f64 / self.total as f64 * 100.0
        }
    }
}
