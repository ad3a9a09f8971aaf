//! External command execution.
//!
//! Every call to `convox`, `aws` and `terraform` goes through [`CommandRunner`]
//! so provisioning logic can be exercised against a scripted runner.

use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;

use tracing::debug;

use crate::error::{InstallerError, Result};

const MASK: &str = "********";

/// A single argument, optionally hidden from logs and error messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    Plain(String),
    /// Rendered as `********`.
    Secret(String),
    /// A `KEY=VALUE` pair rendered as `KEY=********`.
    SecretAssignment { key: String, value: String },
}

impl Arg {
    /// The value passed to the process.
    #[must_use]
    pub fn raw(&self) -> String {
        match self {
            Self::Plain(value) | Self::Secret(value) => value.clone(),
            Self::SecretAssignment { key, value } => format!("{key}={value}"),
        }
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(value) => f.write_str(value),
            Self::Secret(_) => f.write_str(MASK),
            Self::SecretAssignment { key, .. } => write!(f, "{key}={MASK}"),
        }
    }
}

/// A command line with optional environment overrides and working directory.
///
/// `Display` masks secret arguments and omits the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub program: String,
    pub args: Vec<Arg>,
    pub env: Vec<(String, String)>,
    pub cwd: Option<PathBuf>,
}

impl Command {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            cwd: None,
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(Arg::Plain(arg.into()));
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(|a| Arg::Plain(a.into())));
        self
    }

    #[must_use]
    pub fn secret_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(Arg::Secret(arg.into()));
        self
    }

    #[must_use]
    pub fn secret_assignment(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.push(Arg::SecretAssignment {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Arguments as passed to the process, secrets included.
    #[must_use]
    pub fn raw_args(&self) -> Vec<String> {
        self.args.iter().map(Arg::raw).collect()
    }

    /// Environment override value for `key`, if set.
    #[must_use]
    pub fn env_value(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` if the process was killed by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    #[must_use]
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    fn into_error(self, command: &Command) -> InstallerError {
        InstallerError::CommandFailed {
            command: command.to_string(),
            status: self.status,
            stderr: self.stderr.trim().to_string(),
        }
    }
}

/// Runs external commands.
pub trait CommandRunner {
    /// Run to completion and capture output. A non-zero exit is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error only if the process could not be started.
    fn output(&self, command: &Command) -> Result<CommandOutput>;

    /// Run a command whose output the operator should see.
    ///
    /// # Errors
    ///
    /// Returns `CommandFailed` on a non-zero exit.
    fn run(&self, command: &Command) -> Result<()> {
        let output = self.output(command)?;
        if output.success() {
            Ok(())
        } else {
            Err(output.into_error(command))
        }
    }

    /// Run and return stdout.
    ///
    /// # Errors
    ///
    /// Returns `CommandFailed` on a non-zero exit.
    fn capture(&self, command: &Command) -> Result<String> {
        let output = self.output(command)?;
        if output.success() {
            Ok(output.stdout)
        } else {
            Err(output.into_error(command))
        }
    }
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn output(&self, command: &Command) -> Result<CommandOutput> {
        (**self).output(command)
    }

    fn run(&self, command: &Command) -> Result<()> {
        (**self).run(command)
    }

    fn capture(&self, command: &Command) -> Result<String> {
        (**self).capture(command)
    }
}

/// Runs commands as child processes of the installer.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl SystemRunner {
    fn build(command: &Command) -> std::process::Command {
        let mut cmd = std::process::Command::new(&command.program);
        cmd.args(command.raw_args());
        cmd.envs(command.env.iter().map(|(k, v)| (k, v)));
        if let Some(dir) = &command.cwd {
            cmd.current_dir(dir);
        }
        cmd
    }
}

impl CommandRunner for SystemRunner {
    fn output(&self, command: &Command) -> Result<CommandOutput> {
        debug!(command = %command, "Running command");
        let output = Self::build(command).stdin(Stdio::null()).output()?;

        Ok(CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    /// Inherits stdout and stderr so long-running tools show progress.
    fn run(&self, command: &Command) -> Result<()> {
        debug!(command = %command, "Running command (streaming)");
        let status = Self::build(command)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()?;

        if status.success() {
            Ok(())
        } else {
            Err(InstallerError::CommandFailed {
                command: command.to_string(),
                status: status.code(),
                stderr: String::new(),
            })
        }
    }
}
