use std::path::Path;

use anyhow::Result;
use tracing::{debug, warn};

use crate::command::{CommandFailedError, CommandRunner, Invocation};

/// Exit status `patch` uses when some hunks could not be applied, which is
/// what a forced re-application onto an already patched tree reports.
const HUNKS_REJECTED_STATUS: i32 = 1;

/// Applies and reverses unified diffs with the `patch` tool.
#[derive(Clone, Copy)]
pub struct Patcher<'r> {
    runner: &'r dyn CommandRunner,
    program: &'r str,
}

impl<'r> Patcher<'r> {
    pub fn new(runner: &'r dyn CommandRunner, program: &'r str) -> Self {
        Self { runner, program }
    }

    pub fn invocation(
        &self,
        patch_file: &Path,
        target_dir: &Path,
        force: bool,
        reverse: bool,
    ) -> Invocation {
        let mut invocation = Invocation::new(self.program)
            .arg("-i")
            .arg(patch_file.display().to_string())
            .arg("-d")
            .arg(target_dir.display().to_string());
        if force {
            invocation = invocation.arg("--force");
        }
        if reverse {
            invocation = invocation.arg("--reverse");
        }
        invocation
    }

    /// Force-applies `patch_file` onto `target_dir`.
    pub fn apply(&self, patch_file: &Path, target_dir: &Path) -> Result<()> {
        self.run(&self.invocation(patch_file, target_dir, true, false), true)
    }

    pub fn reverse(&self, patch_file: &Path, target_dir: &Path) -> Result<()> {
        self.run(&self.invocation(patch_file, target_dir, false, true), false)
    }

    fn run(&self, invocation: &Invocation, forced: bool) -> Result<()> {
        let command_line = invocation.command_line();
        debug!(command = %command_line, "running");
        let output = self.runner.run(invocation)?;
        if output.success() {
            return Ok(());
        }
        if forced && output.status == Some(HUNKS_REJECTED_STATUS) {
            warn!(
                command = %command_line,
                stdout = %output.stdout.trim(),
                "patch left hunks unapplied; tree was already patched"
            );
            return Ok(());
        }
        Err(CommandFailedError::from_output(invocation, &output).into())
    }
}
