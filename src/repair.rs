//! Per-file repair decisions
//!
//! Given one file's parsed tree and the compiler's error lines for it,
//! decides what to cut and what to patch. Production files lose the
//! elements sitting on error lines, get default-value returns where a
//! method was hollowed out, and drop flagged imports. Test files get every
//! flagged method body replaced with an unconditional failure carrying the
//! removal marker, so those failures stay distinguishable from ordinary
//! assertion failures later.
//!
//! Nothing here ever aborts the run: a file that cannot be parsed or
//! printed is reported unmodified and comes back in the next iteration.

use std::fs;

use anyhow::Result;
use tracing::{debug, warn};

use crate::diagnostics::DiagnosticRecord;
use crate::metrics::{MetricsAccumulator, Partition, PhaseMetrics};
use crate::tree::java::JavaTree;
use crate::tree::{NodeKind, SourceTree, Span};

/// Message carried by every synthesized test failure. The test-output
/// parser looks for this exact string to classify a failure as caused by
/// the dependency removal.
pub const DEPENDENCY_REMOVAL_MARKER: &str = "stubbed: removed dependency";

/// Decides and applies per-file repairs.
pub struct RepairPolicy;

impl RepairPolicy {
    pub fn new() -> Self {
        Self
    }

    /// Repairs one file on disk according to its diagnostic record and
    /// partition. Returns whether the file changed; all events are
    /// reported into the matching partition of `metrics`. Errors degrade
    /// to "not modified".
    pub fn process_file(
        &self,
        record: &DiagnosticRecord,
        partition: Partition,
        metrics: &mut MetricsAccumulator,
    ) -> bool {
        match self.try_process(record, partition, metrics) {
            Ok(modified) => modified,
            Err(err) => {
                warn!(
                    file = %record.file_path.display(),
                    %err,
                    "repair failed; file left unmodified this round"
                );
                false
            }
        }
    }

    fn try_process(
        &self,
        record: &DiagnosticRecord,
        partition: Partition,
        metrics: &mut MetricsAccumulator,
    ) -> Result<bool> {
        if record.error_lines.is_empty() {
            return Ok(false);
        }

        let original = fs::read_to_string(&record.file_path)?;
        let mut tree = JavaTree::parse(original.clone())?;
        let phase = metrics.partition_mut(partition);

        match partition {
            Partition::Production => self.repair_production(&mut tree, record, phase),
            Partition::Test => self.repair_test(&mut tree, record, phase),
        }

        if !tree.modified() {
            return Ok(false);
        }

        let printed = tree.print();
        let deleted = original
            .lines()
            .count()
            .saturating_sub(printed.lines().count());
        fs::write(&record.file_path, &printed)?;

        phase.record_modified_file(&record.file_name);
        phase.record_deleted_lines(deleted);
        Ok(true)
    }

    /// Production algorithm: delete by line, fall back to method-level
    /// return synthesis, sweep for broken return paths, drop flagged
    /// imports.
    fn repair_production(
        &self,
        tree: &mut dyn SourceTree,
        record: &DiagnosticRecord,
        phase: &mut PhaseMetrics,
    ) {
        for &line in &record.error_lines {
            let elements = tree.elements_at(line);
            if elements.is_empty() {
                self.method_level_fallback(tree, line, phase);
                continue;
            }
            for element in &elements {
                tree.delete(element);
                phase.record_element(element.kind);
            }
        }

        self.completeness_sweep(tree, phase);
        self.remove_flagged_imports(tree, record, phase);
    }

    /// No element starts on the line - the diagnostic points into a span a
    /// larger deletion already owns, or at a compiler-only position. Patch
    /// the smallest enclosing method with a default return instead.
    fn method_level_fallback(
        &self,
        tree: &mut dyn SourceTree,
        line: usize,
        phase: &mut PhaseMetrics,
    ) {
        let Some(method) = tree.enclosing_method(line) else {
            debug!(line, "no element and no enclosing method; line left alone");
            return;
        };
        let Some(return_type) = method.return_type.clone() else {
            return;
        };
        if !method.has_body() {
            return;
        }

        tree.append_return(&method, default_return_literal(&return_type));
        phase.record_element(NodeKind::SynthesizedReturn);
    }

    /// Ensures every non-void method still ends in a valid return: empty
    /// body, missing return, or statements stranded after a return all get
    /// a default-value return appended. Idempotent - a second run finds
    /// nothing left to fix.
    fn completeness_sweep(&self, tree: &mut dyn SourceTree, phase: &mut PhaseMetrics) {
        for method in tree.methods() {
            let Some(return_type) = method.return_type.clone() else {
                continue;
            };
            if !method.has_body() {
                // Nothing to complete without a body block.
                continue;
            }

            let broken = tree.body_is_empty(&method)
                || !tree.has_return(&method)
                || tree.has_code_after_return(&method);
            if broken {
                tree.append_return(&method, default_return_literal(&return_type));
                phase.record_element(NodeKind::SynthesizedReturn);
            }
        }
    }

    fn remove_flagged_imports(
        &self,
        tree: &mut dyn SourceTree,
        record: &DiagnosticRecord,
        phase: &mut PhaseMetrics,
    ) {
        for import in tree.imports() {
            if record.error_lines.contains(&import.span.start_line) {
                tree.delete(&import);
                phase.record_element(NodeKind::Import);
            }
        }
    }

    /// Test algorithm: every method covering a flagged line gets its body
    /// replaced with a single marked failure, at most once per call no
    /// matter how many of its lines are flagged.
    fn repair_test(
        &self,
        tree: &mut dyn SourceTree,
        record: &DiagnosticRecord,
        phase: &mut PhaseMetrics,
    ) {
        let methods = tree.methods();
        let mut stubbed: Vec<Span> = Vec::new();
        let statement = format!(
            "org.junit.Assert.fail(\"{}\");",
            DEPENDENCY_REMOVAL_MARKER
        );

        for &line in &record.error_lines {
            for method in methods.iter().filter(|m| m.span.covers_line(line)) {
                if stubbed.contains(&method.span) || !method.has_body() {
                    continue;
                }
                tree.replace_body(method, &statement);
                phase.record_element(NodeKind::TestStub);
                stubbed.push(method.span);
            }
        }
    }
}

impl Default for RepairPolicy {
    fn default() -> Self {
        Self::new()
    }
}

/// The stand-in value a hollowed-out method returns. Numeric types all get
/// the integer literal `0` - including float and double, a crude stand-in
/// kept exactly as emitted historically because downstream comparisons
/// depend on the text.
fn default_return_literal(return_type: &str) -> &'static str {
    match unboxed(return_type) {
        "boolean" => "false",
        "char" => "'\\0'",
        "byte" | "short" | "int" | "long" | "float" | "double" => "0",
        _ => "null",
    }
}

fn unboxed(return_type: &str) -> &str {
    match return_type {
        "Boolean" => "boolean",
        "Character" => "char",
        "Byte" => "byte",
        "Short" => "short",
        "Integer" => "int",
        "Long" => "long",
        "Float" => "float",
        "Double" => "double",
        other => other,
    }
}
