//! Launch requests for the external analysis helper and the process seam
//! the scheduler drives them through.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use serde::{Deserialize, Serialize};
use tokio::process::{Child, Command};

use crate::state_machine::ExitInfo;

/// Program plus fixed leading arguments for the analysis helper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandTemplate {
    pub program: String,
    pub args: Vec<String>,
}

impl Default for CommandTemplate {
    fn default() -> Self {
        Self {
            program: "python".to_string(),
            args: vec!["IPRscan.py".to_string()],
        }
    }
}

/// A fully-substituted argv for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    pub program: String,
    pub args: Vec<String>,
    pub output_path: PathBuf,
}

/// Turns (sequence, output path) pairs into launch requests.
#[derive(Debug, Clone)]
pub struct JobFactory {
    template: CommandTemplate,
    email: String,
    output_format: Option<String>,
}

impl JobFactory {
    pub fn new(template: CommandTemplate, email: String, output_format: Option<String>) -> Self {
        Self {
            template,
            email,
            output_format,
        }
    }

    pub fn build(&self, sequence: &str, output_path: &Path) -> LaunchRequest {
        let mut args = self.template.args.clone();
        args.push("--email".into());
        args.push(self.email.clone());
        if let Some(format) = &self.output_format {
            args.push("--outformat".into());
            args.push(format.clone());
        }
        args.push("--sequence".into());
        args.push(sequence.to_string());
        args.push("--outfile".into());
        args.push(output_path.to_string_lossy().into_owned());

        LaunchRequest {
            program: self.template.program.clone(),
            args,
            output_path: output_path.to_path_buf(),
        }
    }
}

/// A running external job that can be polled without blocking.
pub trait JobHandle {
    /// `Ok(None)` while the job is still running.
    fn try_exit(&mut self) -> std::io::Result<Option<ExitInfo>>;

    /// Ask the job to terminate. Completion is still observed via `try_exit`.
    fn kill(&mut self) -> std::io::Result<()>;
}

/// Starts external jobs. The scheduler is the only caller and owns every handle.
pub trait Launcher {
    type Handle: JobHandle;

    fn launch(&mut self, request: &LaunchRequest) -> std::io::Result<Self::Handle>;
}

/// Spawns each request as an independent OS process.
#[derive(Debug, Clone, Default)]
pub struct ProcessLauncher {
    /// Discard the helper's stdout/stderr instead of inheriting the terminal.
    pub quiet: bool,
}

impl ProcessLauncher {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }
}

pub struct ProcessHandle {
    child: Child,
}

impl JobHandle for ProcessHandle {
    fn try_exit(&mut self) -> std::io::Result<Option<ExitInfo>> {
        Ok(self.child.try_wait()?.map(ExitInfo::from))
    }

    fn kill(&mut self) -> std::io::Result<()> {
        self.child.start_kill()
    }
}

impl Launcher for ProcessLauncher {
    type Handle = ProcessHandle;

    fn launch(&mut self, request: &LaunchRequest) -> std::io::Result<ProcessHandle> {
        let output = || {
            if self.quiet {
                Stdio::null()
            } else {
                Stdio::inherit()
            }
        };

        let child = Command::new(&request.program)
            .args(&request.args)
            .stdin(Stdio::null())
            .stdout(output())
            .stderr(output())
            .kill_on_drop(false)
            .spawn()?;

        Ok(ProcessHandle { child })
    }
}
