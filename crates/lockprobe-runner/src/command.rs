use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};
use lockprobe_core::{CliQueryResult, LockDocument};
use thiserror::Error;
use tracing::debug;

/// One external program call: program name plus argv.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    fn push(&mut self, arg: impl Into<String>) {
        self.args.push(arg.into());
    }

    /// The call rendered as a single shell-style command line.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .map(quote_for_display)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn quote_for_display(arg: &str) -> String {
    if arg.is_empty() || arg.chars().any(|ch| ch.is_whitespace() || ch == '"') {
        format!("'{}'", arg.replace('\'', r"'\''"))
    } else {
        arg.to_string()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("command `{command_line}` exited with {}: {stderr}", describe_status(.status))]
pub struct CommandFailedError {
    pub command_line: String,
    pub status: Option<i32>,
    pub stderr: String,
}

impl CommandFailedError {
    pub fn from_output(invocation: &Invocation, output: &CommandOutput) -> Self {
        Self {
            command_line: invocation.command_line(),
            status: output.status,
            stderr: output.stderr.trim().to_string(),
        }
    }
}

fn describe_status(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("status {code}"),
        None => "no status (terminated by signal)".to_string(),
    }
}

/// Executes invocations. Returns the captured output whatever the exit
/// status; only a failure to launch is an error here.
pub trait CommandRunner: Send + Sync {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput>;
}

/// Runs invocations as child processes with a fixed working directory and
/// environment overlay.
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    working_dir: Option<PathBuf>,
    env: Vec<(String, String)>,
}

impl SystemRunner {
    pub fn new(working_dir: Option<PathBuf>, env: Vec<(String, String)>) -> Self {
        Self { working_dir, env }
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
        let mut command = Command::new(&invocation.program);
        command.args(&invocation.args);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }
        command.envs(self.env.iter().cloned());

        let output = command
            .output()
            .with_context(|| format!("failed launching `{}`", invocation.command_line()))?;
        Ok(CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Runs `invocation` and turns a non-zero exit into [`CommandFailedError`].
pub fn run_checked(runner: &dyn CommandRunner, invocation: &Invocation) -> Result<CommandOutput> {
    let command_line = invocation.command_line();
    debug!(command = %command_line, "running");
    let output = runner.run(invocation)?;
    debug!(command = %command_line, status = ?output.status, stdout = %output.stdout, "finished");
    if !output.success() {
        return Err(CommandFailedError::from_output(invocation, &output).into());
    }
    Ok(output)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockRequest {
    pub lockfile: PathBuf,
    pub conanfile_path: Option<PathBuf>,
    pub reference: Option<String>,
    pub revision: Option<String>,
    pub profile: Option<String>,
    pub remote: Option<String>,
    pub update: bool,
    pub options: Vec<String>,
    pub build: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildRequest {
    pub conanfile_path: Option<PathBuf>,
    pub version: Option<String>,
    pub options: Vec<String>,
    pub profile: Option<String>,
    pub lockfile: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryRequest {
    pub reference: String,
    pub revision: Option<String>,
    pub package_id: Option<String>,
    pub remote: Option<String>,
}

/// The package-manager operations the harness needs.
#[derive(Clone, Copy)]
pub struct ConanCommand<'r> {
    runner: &'r dyn CommandRunner,
    program: &'r str,
}

impl<'r> ConanCommand<'r> {
    pub fn new(runner: &'r dyn CommandRunner, program: &'r str) -> Self {
        Self { runner, program }
    }

    pub fn export_invocation(&self, recipe_path: &Path, version: &str) -> Invocation {
        Invocation::new(self.program)
            .arg("export")
            .arg(recipe_path.display().to_string())
            .arg(format!("{version}@"))
    }

    pub fn lock_invocation(&self, request: &LockRequest) -> Invocation {
        let mut invocation = Invocation::new(self.program)
            .arg("lock")
            .arg("create")
            .arg(format!("--lockfile-out={}", request.lockfile.display()));
        if let Some(conanfile_path) = &request.conanfile_path {
            invocation.push(conanfile_path.display().to_string());
        } else if let Some(reference) = non_empty(&request.reference) {
            let mut flag = format!("--reference={reference}@");
            if let Some(revision) = non_empty(&request.revision) {
                flag.push('#');
                flag.push_str(revision);
            }
            invocation.push(flag);
        }
        if let Some(profile) = non_empty(&request.profile) {
            invocation.push(format!("--profile={profile}"));
        }
        if let Some(remote) = non_empty(&request.remote) {
            invocation.push(format!("--remote={remote}"));
        }
        if request.update {
            invocation.push("--update");
        }
        for option in &request.options {
            invocation.push(format!("--options={option}"));
        }
        for build in &request.build {
            invocation.push(format!("--build={build}"));
        }
        invocation
    }

    pub fn build_invocation(&self, request: &BuildRequest) -> Invocation {
        let mut invocation = Invocation::new(self.program).arg("create");
        if let Some(conanfile_path) = &request.conanfile_path {
            invocation.push(conanfile_path.display().to_string());
        }
        if let Some(version) = non_empty(&request.version) {
            invocation.push(format!("{version}@"));
        }
        // A lock file pins the profile and options already.
        if let Some(lockfile) = &request.lockfile {
            invocation.push(format!("--lockfile={}", lockfile.display()));
        } else {
            if let Some(profile) = non_empty(&request.profile) {
                invocation.push(format!("--profile={profile}"));
            }
            for option in &request.options {
                invocation.push(format!("--options={option}"));
            }
        }
        invocation
    }

    pub fn query_invocation(&self, request: &QueryRequest) -> Invocation {
        let mut target = format!("{}@", request.reference);
        if let Some(revision) = non_empty(&request.revision) {
            target.push('#');
            target.push_str(revision);
        }
        if let Some(package_id) = non_empty(&request.package_id) {
            target.push(':');
            target.push_str(package_id);
        }
        let mut invocation = Invocation::new(self.program)
            .arg("get")
            .arg("--raw")
            .arg(target);
        if let Some(remote) = non_empty(&request.remote) {
            invocation.push("--remote");
            invocation.push(remote);
        }
        invocation
    }

    pub fn export(&self, recipe_path: &Path, version: &str) -> Result<()> {
        run_checked(self.runner, &self.export_invocation(recipe_path, version))?;
        Ok(())
    }

    /// Creates a lock file and parses it back.
    pub fn create_lock(&self, request: &LockRequest) -> Result<LockDocument> {
        run_checked(self.runner, &self.lock_invocation(request))?;
        let path = &request.lockfile;
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed reading lock file {}", path.display()))?;
        LockDocument::parse(&content, Some(path))
            .with_context(|| format!("failed parsing lock file {}", path.display()))
    }

    pub fn build(&self, request: &BuildRequest) -> Result<()> {
        run_checked(self.runner, &self.build_invocation(request))?;
        Ok(())
    }

    pub fn query_metadata(&self, request: &QueryRequest) -> Result<CliQueryResult> {
        let output = run_checked(self.runner, &self.query_invocation(request))?;
        CliQueryResult::parse(&request.reference, &output.stdout).with_context(|| {
            format!(
                "failed parsing metadata query response for {}",
                request.reference
            )
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|value| !value.is_empty())
}
