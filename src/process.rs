use crate::error::{DeployError, Result};
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// One external command invocation, always with an explicit working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<OsString>,
    pub cwd: PathBuf,
    /// Capture stdout/stderr instead of streaming them to the terminal.
    pub capture: bool,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, cwd: &Path) -> Self {
        CommandSpec {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.to_path_buf(),
            capture: false,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.as_os_str())
    }

    pub fn captured(mut self) -> Self {
        self.capture = true;
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for a in &self.args {
            write!(f, " {}", a.to_string_lossy())?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

pub trait ProcessRunner {
    async fn run(&self, cmd: &CommandSpec) -> Result<ProcessOutput>;
}

/// Runs commands as real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    async fn run(&self, cmd: &CommandSpec) -> Result<ProcessOutput> {
        let mut c = Command::new(&cmd.program);
        c.args(&cmd.args).current_dir(&cmd.cwd).stdin(Stdio::inherit());

        let spawn_err = |source| DeployError::Spawn {
            command: cmd.to_string(),
            source,
        };

        if cmd.capture {
            let out = c.output().await.map_err(spawn_err)?;
            Ok(ProcessOutput {
                code: exit_code(out.status),
                stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
            })
        } else {
            let status = c.status().await.map_err(spawn_err)?;
            Ok(ProcessOutput {
                code: exit_code(status),
                ..ProcessOutput::default()
            })
        }
    }
}

fn exit_code(status: std::process::ExitStatus) -> i32 {
    // Killed by a signal: no code, report a generic failure.
    status.code().unwrap_or(if status.success() { 0 } else { 1 })
}

/// Run `cmd` and turn a nonzero exit into [`DeployError::CommandFailed`].
pub async fn run_checked<R: ProcessRunner>(runner: &R, cmd: &CommandSpec) -> Result<ProcessOutput> {
    info!(command = %cmd, cwd = %cmd.cwd.display(), "running");
    let out = runner.run(cmd).await?;
    if !out.success() {
        return Err(DeployError::CommandFailed {
            command: cmd.to_string(),
            cwd: cmd.cwd.clone(),
            code: out.code,
            stderr: out.stderr,
        });
    }
    if !out.stdout.trim().is_empty() {
        debug!(command = %cmd, stdout = %out.stdout.trim_end(), "command output");
    }
    Ok(out)
}
