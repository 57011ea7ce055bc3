use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::command::SystemRunner;

pub const USER_HOME_VAR: &str = "CONAN_USER_HOME";
pub const STORAGE_PATH_VAR: &str = "CONAN_STORAGE_PATH";

/// Private file-system sandbox of one scenario.
///
/// Layout under `<work_root>/<name>/`: `home/` and `data/` for the package
/// manager, `recipes/` for the recipe copy and `_/lockfiles/` for generated
/// lock files. The directory is removed on drop unless artifacts are kept.
#[derive(Debug)]
pub struct ScenarioEnvironment {
    root: PathBuf,
    keep_artifacts: bool,
}

impl ScenarioEnvironment {
    pub fn create(work_root: &Path, name: &str, keep_artifacts: bool) -> Result<Self> {
        let root = work_root.join(name);
        if root.exists() {
            fs::remove_dir_all(&root).with_context(|| {
                format!("failed clearing scenario directory {}", root.display())
            })?;
        }

        let environment = Self {
            root,
            keep_artifacts,
        };
        for dir in [environment.user_home(), environment.storage_path()] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("failed creating directory {}", dir.display()))?;
        }
        debug!(root = %environment.root.display(), "created scenario environment");
        Ok(environment)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn user_home(&self) -> PathBuf {
        self.root.join("home")
    }

    pub fn storage_path(&self) -> PathBuf {
        self.root.join("data")
    }

    pub fn recipes_dir(&self) -> PathBuf {
        self.root.join("recipes")
    }

    pub fn lockfiles_dir(&self) -> PathBuf {
        self.root.join("_").join("lockfiles")
    }

    pub fn keeps_artifacts(&self) -> bool {
        self.keep_artifacts
    }

    pub fn env_overlay(&self) -> Vec<(String, String)> {
        vec![
            (
                USER_HOME_VAR.to_string(),
                self.user_home().display().to_string(),
            ),
            (
                STORAGE_PATH_VAR.to_string(),
                self.storage_path().display().to_string(),
            ),
        ]
    }

    /// Runner whose commands execute inside this sandbox.
    pub fn runner(&self) -> SystemRunner {
        SystemRunner::new(Some(self.root.clone()), self.env_overlay())
    }

    /// Seeds the sandbox home from a configured package-manager home.
    pub fn provision(&self, template_home: &Path) -> Result<()> {
        if !template_home.is_dir() {
            anyhow::bail!(
                "template home is not a directory: {}",
                template_home.display()
            );
        }
        copy_directory(template_home, &self.user_home()).with_context(|| {
            format!(
                "failed provisioning {} from {}",
                self.user_home().display(),
                template_home.display()
            )
        })
    }

    /// Copies the recipe template tree into `recipes/`.
    pub fn install_recipes(&self, recipes_template: &Path) -> Result<PathBuf> {
        if !recipes_template.is_dir() {
            anyhow::bail!(
                "recipes directory does not exist: {}",
                recipes_template.display()
            );
        }
        let destination = self.recipes_dir();
        copy_directory(recipes_template, &destination)?;
        Ok(destination)
    }
}

impl Drop for ScenarioEnvironment {
    fn drop(&mut self) {
        if self.keep_artifacts {
            debug!(root = %self.root.display(), "keeping scenario artifacts");
            return;
        }
        if let Err(err) = fs::remove_dir_all(&self.root) {
            warn!(root = %self.root.display(), error = %err, "failed removing scenario directory");
        }
    }
}

/// The template home to seed sandboxes from: the configured one, or the
/// `CONAN_USER_HOME` inherited by this process.
pub fn resolve_template_home(configured: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = configured {
        return Ok(path.to_path_buf());
    }
    match std::env::var_os(USER_HOME_VAR) {
        Some(value) if !value.is_empty() => Ok(PathBuf::from(value)),
        _ => anyhow::bail!(
            "no template home configured; set template_home or export {USER_HOME_VAR}"
        ),
    }
}

/// Clones `source_root` into `destination_root`, creating directories as
/// needed and marking every copied regular file executable. A missing source
/// is a no-op.
pub fn copy_directory(source_root: &Path, destination_root: &Path) -> Result<()> {
    if !source_root.exists() {
        return Ok(());
    }

    fs::create_dir_all(destination_root)
        .with_context(|| format!("failed creating directory {}", destination_root.display()))?;

    let mut queue: VecDeque<(PathBuf, PathBuf)> = VecDeque::new();
    queue.push_back((source_root.to_path_buf(), destination_root.to_path_buf()));

    while let Some((from_dir, to_dir)) = queue.pop_front() {
        for entry in fs::read_dir(&from_dir)
            .with_context(|| format!("failed reading directory {}", from_dir.display()))?
        {
            let entry = entry?;
            let from_path = entry.path();
            let to_path = to_dir.join(entry.file_name());
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                fs::create_dir_all(&to_path)
                    .with_context(|| format!("failed creating directory {}", to_path.display()))?;
                queue.push_back((from_path, to_path));
            } else if file_type.is_file() {
                fs::copy(&from_path, &to_path).with_context(|| {
                    format!(
                        "failed copying file from {} to {}",
                        from_path.display(),
                        to_path.display()
                    )
                })?;
                mark_executable(&to_path)?;
            }
        }
    }

    Ok(())
}

#[cfg(unix)]
fn mark_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
        .with_context(|| format!("failed setting permissions on {}", path.display()))
}

#[cfg(not(unix))]
fn mark_executable(_path: &Path) -> Result<()> {
    Ok(())
}
