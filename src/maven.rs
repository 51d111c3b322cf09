//! Build-diagnostic collaborator
//!
//! Invokes the build tool as a blocking child process, one goal per call,
//! and drains its complete line output before returning. The exit status is
//! deliberately ignored: a failing build is exactly what the repair loop
//! feeds on, so only a failure to spawn is an error.

use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;

use anyhow::{Context, Result};

/// The build goals the repair loop drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildGoal {
    Compile,
    TestCompile,
    Test,
}

impl BuildGoal {
    fn args(&self) -> &'static [&'static str] {
        match self {
            BuildGoal::Compile => &["clean", "compile"],
            BuildGoal::TestCompile => &["test-compile"],
            BuildGoal::Test => &["test"],
        }
    }
}

/// Anything that can run a build goal and hand back its output lines.
/// The controller is written against this seam so tests can script it.
pub trait BuildDriver {
    fn run(&mut self, goal: BuildGoal) -> Result<Vec<String>>;
}

/// Runs Maven in the project directory.
pub struct MavenDriver {
    command: String,
    project_dir: PathBuf,
    /// Echo each output line to stdout while draining.
    echo: bool,
}

impl MavenDriver {
    pub fn new(command: String, project_dir: PathBuf) -> Self {
        Self {
            command,
            project_dir,
            echo: true,
        }
    }

    #[cfg(test)]
    fn silent(command: String, project_dir: PathBuf) -> Self {
        Self {
            command,
            project_dir,
            echo: false,
        }
    }
}

impl BuildDriver for MavenDriver {
    fn run(&mut self, goal: BuildGoal) -> Result<Vec<String>> {
        let mut child = Command::new(&self.command)
            .args(goal.args())
            .current_dir(&self.project_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to start `{}`", self.command))?;

        let stderr = child.stderr.take().context("failed to capture stderr")?;
        let stderr_handle = thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = BufReader::new(stderr).read_to_end(&mut buf);
            buf
        });

        let stdout = child.stdout.take().context("failed to capture stdout")?;
        let mut lines = Vec::new();
        for line in BufReader::new(stdout).lines() {
            let line = line.unwrap_or_default();
            if self.echo {
                println!("{}", line);
            }
            lines.push(line);
        }

        let _ = child.wait();

        let stderr_bytes = stderr_handle.join().unwrap_or_default();
        for line in String::from_utf8_lossy(&stderr_bytes).lines() {
            if self.echo {
                println!("{}", line);
            }
            lines.push(line.to_string());
        }

        Ok(lines)
    }
}
