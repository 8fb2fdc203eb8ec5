use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use crate::error::{AppError, Result};

/// Heredoc delimiter for multi-line values in a GitHub Actions output file.
const DELIMITER: &str = "__OUT__";

/// Destination for the run's named outputs.
pub trait OutputSink {
    fn set_output(&mut self, name: &str, value: &str) -> Result<()>;
}

/// Appends `name<<__OUT__` blocks to the file named by `GITHUB_OUTPUT`.
pub struct GithubOutputFile {
    path: PathBuf,
}

impl GithubOutputFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl OutputSink for GithubOutputFile {
    fn set_output(&mut self, name: &str, value: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                AppError::Output(format!("Failed to open {}: {e}", self.path.display()))
            })?;

        write!(file, "{name}<<{DELIMITER}\n{value}\n{DELIMITER}\n")
            .map_err(|e| AppError::Output(format!("Failed to write {name}: {e}")))
    }
}

/// `name=value` lines on stdout, for local runs without `GITHUB_OUTPUT`.
pub struct StdoutSink<W: Write = std::io::Stdout> {
    out: W,
}

impl StdoutSink {
    pub fn new() -> Self {
        Self {
            out: std::io::stdout(),
        }
    }
}

impl Default for StdoutSink {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> StdoutSink<W> {
    pub fn with_writer(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> OutputSink for StdoutSink<W> {
    fn set_output(&mut self, name: &str, value: &str) -> Result<()> {
        writeln!(self.out, "{name}={value}")
            .map_err(|e| AppError::Output(format!("Failed to write {name}: {e}")))
    }
}
