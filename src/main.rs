use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use buildmend::config::RepairConfig;
use buildmend::convergence::ConvergenceController;
use buildmend::maven::MavenDriver;
use buildmend::report::{self, RunReport};

#[derive(Parser, Debug)]
#[command(
    name = "buildmend",
    about = "Repairs a Maven project that stopped building after a dependency was removed",
    version
)]
struct Args {
    /// Path to the Maven project (defaults to current directory)
    #[arg(default_value = ".")]
    project: PathBuf,

    /// Build tool executable to invoke (default: mvn, mvn.cmd on Windows)
    #[arg(long)]
    maven_command: Option<String>,

    /// Maximum compile/repair iterations per phase
    #[arg(short = 'n', long)]
    max_iterations: Option<usize>,

    /// Production sources root, relative to the project
    #[arg(long)]
    production_root: Option<PathBuf>,

    /// Test sources root, relative to the project
    #[arg(long)]
    test_root: Option<PathBuf>,

    /// Where to write the JSON run report
    #[arg(long)]
    report: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("buildmend=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Args::parse()) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<bool> {
    let mut config = RepairConfig::load(&args.project)?;

    let project_dir = config.project_dir.clone();
    let join = move |p: PathBuf| {
        if p.is_absolute() {
            p
        } else {
            project_dir.join(p)
        }
    };
    if let Some(root) = args.production_root {
        config.production_root = join(root);
    }
    if let Some(root) = args.test_root {
        config.test_root = join(root);
    }
    if let Some(path) = args.report {
        config.report_path = join(path);
    }
    if let Some(command) = args.maven_command {
        config.maven_command = command;
    }
    if let Some(cap) = args.max_iterations {
        config.max_iterations = cap;
    }

    let driver = MavenDriver::new(config.maven_command.clone(), config.project_dir.clone());
    let mut controller = ConvergenceController::new(&config, driver);
    let result = controller.run()?;

    report::print_summary(&result);
    RunReport::from_result(&result).write(&config.report_path)?;
    println!("report written to {}", config.report_path.display());

    Ok(result.success())
}
