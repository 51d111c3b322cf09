//! Compile / diagnose / repair iteration
//!
//! Drives the two-phase state machine: the production sources are repaired
//! to convergence first, then the test sources, each inside an inner loop
//! that stops on a clean build, on a round that changed nothing, or at the
//! iteration cap. Only when both phases converge does the single test
//! execution run.

use anyhow::Result;
use tracing::{info, warn};

use crate::config::RepairConfig;
use crate::diagnostics::DiagnosticExtractor;
use crate::locate::SourceLocator;
use crate::maven::{BuildDriver, BuildGoal};
use crate::metrics::{MetricsAccumulator, Partition, TestRunSummary};
use crate::repair::RepairPolicy;

/// How a phase's inner loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseOutcome {
    /// The build came back clean.
    Converged { iterations: usize },
    /// Diagnostics remained but a whole round changed no file.
    Stalled { iterations: usize },
    /// The iteration cap was hit with diagnostics still outstanding.
    Exhausted,
}

impl PhaseOutcome {
    pub fn converged(&self) -> bool {
        matches!(self, PhaseOutcome::Converged { .. })
    }
}

/// Everything a finished run reports.
#[derive(Debug)]
pub struct RunResult {
    pub production: PhaseOutcome,
    pub test: PhaseOutcome,
    pub metrics: MetricsAccumulator,
    /// Present only when both phases converged and the suite ran.
    pub test_summary: Option<TestRunSummary>,
}

impl RunResult {
    pub fn success(&self) -> bool {
        self.production.converged() && self.test.converged()
    }
}

/// Owns one repair run from first compile to final test execution.
pub struct ConvergenceController<D: BuildDriver> {
    driver: D,
    extractor: DiagnosticExtractor,
    locator: SourceLocator,
    policy: RepairPolicy,
    max_iterations: usize,
}

impl<D: BuildDriver> ConvergenceController<D> {
    pub fn new(config: &RepairConfig, driver: D) -> Self {
        Self {
            driver,
            extractor: DiagnosticExtractor::new(),
            locator: SourceLocator::new(
                config.production_root.clone(),
                config.test_root.clone(),
            ),
            policy: RepairPolicy::new(),
            max_iterations: config.max_iterations,
        }
    }

    pub fn run(&mut self) -> Result<RunResult> {
        let mut metrics = MetricsAccumulator::default();

        let production_census = self.locator.production_census();
        metrics.production.total_files = production_census.files;
        metrics.production.total_lines = production_census.lines;
        let test_census = self.locator.test_census();
        metrics.test.total_files = test_census.files;
        metrics.test.total_lines = test_census.lines;

        info!(
            production_files = production_census.files,
            production_lines = production_census.lines,
            test_files = test_census.files,
            test_lines = test_census.lines,
            "starting repair run"
        );

        // Test repair must see a compilable production tree, so the phases
        // run strictly in order; a failed production phase still lets the
        // test phase have its try.
        let production = self.run_phase(Partition::Production, &mut metrics)?;
        let test = self.run_phase(Partition::Test, &mut metrics)?;

        let test_summary = if production.converged() && test.converged() {
            info!("both phases converged; executing test suite");
            let lines = self.driver.run(BuildGoal::Test)?;
            Some(self.extractor.parse_test_run(&lines))
        } else {
            None
        };

        Ok(RunResult {
            production,
            test,
            metrics,
            test_summary,
        })
    }

    fn run_phase(
        &mut self,
        partition: Partition,
        metrics: &mut MetricsAccumulator,
    ) -> Result<PhaseOutcome> {
        let goal = match partition {
            Partition::Production => BuildGoal::Compile,
            Partition::Test => BuildGoal::TestCompile,
        };

        let mut iteration = 1;
        while iteration <= self.max_iterations {
            info!(phase = partition.label(), iteration, "compiling");
            metrics.partition_mut(partition).iterations = iteration;

            let lines = self.driver.run(goal)?;
            let records = self.extractor.extract(&lines, &self.locator);

            if records.is_empty() {
                info!(phase = partition.label(), iteration, "build clean; phase converged");
                return Ok(PhaseOutcome::Converged {
                    iterations: iteration,
                });
            }

            info!(
                phase = partition.label(),
                files = records.len(),
                "diagnostics reported"
            );

            let mut any_modified = false;
            for record in records.values() {
                if !record.file_path.exists() {
                    warn!(file = %record.file_path.display(), "file missing on disk; skipped");
                    continue;
                }
                let file_partition = self.locator.classify(&record.file_path);
                if self.policy.process_file(record, file_partition, metrics) {
                    any_modified = true;
                    info!(file = record.file_name.as_str(), "repaired");
                } else {
                    info!(file = record.file_name.as_str(), "nothing repairable found");
                }
            }

            if !any_modified {
                warn!(
                    phase = partition.label(),
                    iteration, "diagnostics remain but no file changed; phase stalled"
                );
                return Ok(PhaseOutcome::Stalled {
                    iterations: iteration,
                });
            }

            iteration += 1;
        }

        warn!(
            phase = partition.label(),
            cap = self.max_iterations,
            "iteration cap reached with diagnostics outstanding"
        );
        Ok(PhaseOutcome::Exhausted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::fs;

    /// Replays canned output per goal invocation.
    struct ScriptedDriver {
        responses: VecDeque<Vec<String>>,
        calls: Vec<BuildGoal>,
    }

    impl ScriptedDriver {
        fn new(responses: Vec<Vec<&str>>) -> Self {
            Self {
                responses: responses
                    .into_iter()
                    .map(|lines| lines.into_iter().map(String::from).collect())
                    .collect(),
                calls: Vec::new(),
            }
        }
    }

    impl BuildDriver for ScriptedDriver {
        fn run(&mut self, goal: BuildGoal) -> Result<Vec<String>> {
            self.calls.push(goal);
            Ok(self.responses.pop_front().unwrap_or_default())
        }
    }

    struct Project {
        _dir: tempfile::TempDir,
        config: RepairConfig,
    }

    fn project(files: &[(&str, &str, &str)]) -> Project {
        let dir = tempfile::tempdir().unwrap();
        for (root, name, content) in files {
            let base = dir.path().join(format!("src/{}/java/com/example", root));
            fs::create_dir_all(&base).unwrap();
            fs::write(base.join(name), content).unwrap();
        }
        let config = RepairConfig::load(dir.path()).unwrap();
        Project { _dir: dir, config }
    }

    const BROKEN: &str = r#"package com.example;

public class Foo {
    public int count() {
        widget.observe(1);
        return 1;
    }
}
"#;

    #[test]
    fn clean_first_compile_converges_immediately() {
        let project = project(&[("main", "Foo.java", BROKEN)]);
        let driver = ScriptedDriver::new(vec![
            vec!["[INFO] BUILD SUCCESS"],
            vec!["[INFO] BUILD SUCCESS"],
            vec!["Tests run: 3, Failures: 0, Errors: 0, Skipped: 0"],
        ]);

        let mut controller = ConvergenceController::new(&project.config, driver);
        let result = controller.run().unwrap();

        assert_eq!(result.production, PhaseOutcome::Converged { iterations: 1 });
        assert_eq!(result.test, PhaseOutcome::Converged { iterations: 1 });
        assert!(result.success());
        assert!(result.metrics.production.modified_files.is_empty());

        let summary = result.test_summary.unwrap();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.passed, 3);

        assert_eq!(
            controller.driver.calls,
            vec![BuildGoal::Compile, BuildGoal::TestCompile, BuildGoal::Test]
        );
    }

    #[test]
    fn repairs_until_build_is_clean() {
        let project = project(&[("main", "Foo.java", BROKEN)]);
        let driver = ScriptedDriver::new(vec![
            vec!["[ERROR] /p/Foo.java:[5,9] cannot find symbol"],
            vec!["[INFO] BUILD SUCCESS"],
            vec!["[INFO] BUILD SUCCESS"],
            vec!["Tests run: 0, Failures: 0, Errors: 0, Skipped: 0"],
        ]);

        let mut controller = ConvergenceController::new(&project.config, driver);
        let result = controller.run().unwrap();

        assert_eq!(result.production, PhaseOutcome::Converged { iterations: 2 });
        assert!(result.success());
        assert_eq!(result.metrics.production.modified_files.len(), 1);

        let repaired = fs::read_to_string(
            project
                .config
                .production_root
                .join("com/example/Foo.java"),
        )
        .unwrap();
        assert!(!repaired.contains("widget.observe"));
    }

    #[test]
    fn unmodifiable_diagnostics_stall_the_phase() {
        // Line 2 of this file holds nothing repairable: no element starts
        // there and the enclosing scope is not a non-void method.
        let source = "public class Empty {\n\n}\n";
        let project = project(&[("main", "Empty.java", source)]);
        let driver = ScriptedDriver::new(vec![
            vec!["[ERROR] /p/Empty.java:[2,1] something unrepairable"],
            vec!["[INFO] BUILD SUCCESS"],
        ]);

        let mut controller = ConvergenceController::new(&project.config, driver);
        let result = controller.run().unwrap();

        assert_eq!(result.production, PhaseOutcome::Stalled { iterations: 1 });
        assert!(!result.success());
        // The other phase still ran, but no suite execution happened.
        assert_eq!(result.test, PhaseOutcome::Converged { iterations: 1 });
        assert!(result.test_summary.is_none());
    }

    #[test]
    fn iteration_cap_bounds_oscillation() {
        // A blank line inside a non-void method synthesizes a return every
        // round, so the file always counts as modified and the diagnostic
        // never goes away.
        let source = r#"public class Calc {
    public int answer() {

        return 42;
    }
}
"#;
        let project = project(&[("main", "Calc.java", source)]);
        let mut config = project.config.clone();
        config.max_iterations = 3;

        let driver = ScriptedDriver::new(vec![
            vec!["[ERROR] /p/Calc.java:[3,1] broken"],
            vec!["[ERROR] /p/Calc.java:[3,1] broken"],
            vec!["[ERROR] /p/Calc.java:[3,1] broken"],
            // Test phase compiles clean.
            vec!["[INFO] BUILD SUCCESS"],
        ]);

        let mut controller = ConvergenceController::new(&config, driver);
        let result = controller.run().unwrap();

        assert_eq!(result.production, PhaseOutcome::Exhausted);
        assert_eq!(result.metrics.production.iterations, 3);
        assert!(!result.success());
    }

    #[test]
    fn unresolvable_diagnostics_are_dropped_not_fatal() {
        let project = project(&[("main", "Foo.java", BROKEN)]);
        let driver = ScriptedDriver::new(vec![
            vec!["[ERROR] /p/Foo.java:[5,9] cannot find symbol"],
            vec!["[INFO] BUILD SUCCESS"],
        ]);

        let mut controller = ConvergenceController::new(&project.config, driver);
        // With the file gone the diagnostic cannot be resolved to a path;
        // it is dropped and the round sees a clean slate.
        fs::remove_file(
            project
                .config
                .production_root
                .join("com/example/Foo.java"),
        )
        .unwrap();
        let result = controller.run().unwrap();

        assert_eq!(result.production, PhaseOutcome::Converged { iterations: 1 });
        assert!(result.metrics.production.modified_files.is_empty());
    }

    #[test]
    fn test_phase_diagnostics_stub_test_files() {
        let test_class = r#"package com.example;

public class FooTest {
    public void checksWidget() {
        new Widget().observe(1);
    }
}
"#;
        let project = project(&[
            ("main", "Foo.java", "package com.example;\n\npublic class Foo {\n}\n"),
            ("test", "FooTest.java", test_class),
        ]);
        let driver = ScriptedDriver::new(vec![
            vec!["[INFO] BUILD SUCCESS"],
            vec!["[ERROR] /p/FooTest.java:[5,9] cannot find symbol"],
            vec!["[INFO] BUILD SUCCESS"],
            vec!["Tests run: 1, Failures: 1, Errors: 0, Skipped: 0"],
        ]);

        let mut controller = ConvergenceController::new(&project.config, driver);
        let result = controller.run().unwrap();

        assert!(result.success());
        assert_eq!(result.metrics.test.modified_files.len(), 1);
        assert_eq!(result.metrics.production.modified_files.len(), 0);

        let stubbed = fs::read_to_string(
            project.config.test_root.join("com/example/FooTest.java"),
        )
        .unwrap();
        assert!(stubbed.contains(crate::repair::DEPENDENCY_REMOVAL_MARKER));
    }
}
