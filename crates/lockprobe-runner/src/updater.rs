use std::fmt;
use std::fs;
use std::ops::BitOr;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use lockprobe_core::PackageIdentity;
use regex::{Captures, Regex};
use tracing::{debug, info};

use crate::patch::Patcher;
use crate::plan::BuiltPackages;

pub const RECIPE_FILE_NAME: &str = "conanfile.py";

// The hook body runs up to the next method definition or the end of file.
static PACKAGE_ID_HOOK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\s\sdef package_id\b.*?(?:(\s\sdef\b)|\z)")
        .expect("package_id hook regex is valid")
});

/// Recipe rewrites applied before export. Flags combine with `|`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct UpdateMode(u8);

impl UpdateMode {
    pub const NONE: Self = Self(0);
    pub const EXPAND_REVISION: Self = Self(1);
    pub const IGNORE_PACKAGE_ID: Self = Self(2);
    pub const ALL: Self = Self(3);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for UpdateMode {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Display for UpdateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        if self.contains(Self::EXPAND_REVISION) {
            names.push("expand-revision");
        }
        if self.contains(Self::IGNORE_PACKAGE_ID) {
            names.push("ignore-package-id");
        }
        if names.is_empty() {
            names.push("none");
        }
        f.write_str(&names.join("+"))
    }
}

#[derive(Debug)]
struct AppliedRecipe {
    recipe_dir: PathBuf,
    recipe_path: PathBuf,
    original: Option<String>,
    patch_file: Option<PathBuf>,
}

#[derive(Debug, Default)]
enum UpdaterState {
    #[default]
    Idle,
    Applied(AppliedRecipe),
}

/// Checks out one recipe at a time for modification and puts it back.
pub struct RecipeUpdater<'r> {
    mode: UpdateMode,
    patcher: Patcher<'r>,
    state: UpdaterState,
}

impl<'r> RecipeUpdater<'r> {
    pub fn new(mode: UpdateMode, patcher: Patcher<'r>) -> Self {
        Self {
            mode,
            patcher,
            state: UpdaterState::Idle,
        }
    }

    pub fn mode(&self) -> UpdateMode {
        self.mode
    }

    pub fn is_applied(&self) -> bool {
        matches!(self.state, UpdaterState::Applied(_))
    }

    /// Patches and rewrites the recipe in `recipe_dir`. Does nothing when the
    /// directory holds no recipe.
    pub fn apply(
        &mut self,
        recipe_dir: &Path,
        patch_file: Option<&Path>,
        built: &BuiltPackages,
    ) -> Result<()> {
        if let UpdaterState::Applied(applied) = &self.state {
            anyhow::bail!(
                "recipe {} is still applied; revert it before applying another",
                applied.recipe_path.display()
            );
        }

        let recipe_path = recipe_dir.join(RECIPE_FILE_NAME);
        if !recipe_path.is_file() {
            debug!(recipe = %recipe_path.display(), "no recipe to update");
            return Ok(());
        }

        let mode = self.mode;
        if let Some(patch_file) = patch_file {
            info!(patch = %patch_file.display(), "patching recipe");
            self.patcher.apply(patch_file, recipe_dir)?;
        }
        if patch_file.is_none() && mode.is_none() {
            return Ok(());
        }

        // From here on revert() has something to undo, even if a later step fails.
        self.state = UpdaterState::Applied(AppliedRecipe {
            recipe_dir: recipe_dir.to_path_buf(),
            recipe_path: recipe_path.clone(),
            original: None,
            patch_file: patch_file.map(Path::to_path_buf),
        });
        if mode.is_none() {
            return Ok(());
        }

        let original = fs::read_to_string(&recipe_path)
            .with_context(|| format!("failed reading recipe {}", recipe_path.display()))?;
        let mut updated = original.clone();
        if mode.contains(UpdateMode::IGNORE_PACKAGE_ID) {
            updated = strip_package_id_hook(&updated);
        }
        if mode.contains(UpdateMode::EXPAND_REVISION) {
            updated = expand_revisions(&updated, built.records());
        }
        if let UpdaterState::Applied(applied) = &mut self.state {
            applied.original = Some(original);
        }

        debug!(recipe = %recipe_path.display(), mode = %mode, "rewriting recipe");
        fs::write(&recipe_path, updated)
            .with_context(|| format!("failed writing recipe {}", recipe_path.display()))
    }

    /// Restores the captured recipe text and reverses the patch, if any.
    pub fn revert(&mut self) -> Result<()> {
        let UpdaterState::Applied(applied) = std::mem::take(&mut self.state) else {
            return Ok(());
        };

        if let Some(original) = &applied.original {
            fs::write(&applied.recipe_path, original).with_context(|| {
                format!("failed restoring recipe {}", applied.recipe_path.display())
            })?;
        }
        if let Some(patch_file) = &applied.patch_file {
            debug!(patch = %patch_file.display(), "reversing recipe patch");
            self.patcher.reverse(patch_file, &applied.recipe_dir)?;
        }
        Ok(())
    }
}

/// Removes the `package_id` method so the package manager derives the id
/// from options and the dependency graph again.
pub fn strip_package_id_hook(source: &str) -> String {
    PACKAGE_ID_HOOK
        .replace_all(source, |captures: &Captures<'_>| {
            if captures.get(1).is_some() {
                "  def".to_string()
            } else {
                String::new()
            }
        })
        .into_owned()
}

/// Pins every bare `name/version` of an already built record to
/// `name/version#revision`. Newest record wins for repeated references;
/// occurrences already followed by `#` are left alone.
pub fn expand_revisions<'a, I>(source: &str, records: I) -> String
where
    I: DoubleEndedIterator<Item = &'a PackageIdentity>,
{
    let mut expanded = source.to_string();
    let mut visited: Vec<String> = Vec::new();
    for record in records.rev() {
        if record.revision.as_deref().is_none_or(str::is_empty) {
            continue;
        }
        let reference = record.reference();
        if visited.contains(&reference) {
            continue;
        }
        expanded = pin_reference(&expanded, &reference, &record.revisioned_reference());
        visited.push(reference);
    }
    expanded
}

fn pin_reference(source: &str, reference: &str, pinned: &str) -> String {
    let mut result = String::with_capacity(source.len());
    let mut cursor = 0;
    for (start, matched) in source.match_indices(reference) {
        let end = start + matched.len();
        result.push_str(&source[cursor..start]);
        if source[end..].starts_with('#') {
            result.push_str(matched);
        } else {
            result.push_str(pinned);
        }
        cursor = end;
    }
    result.push_str(&source[cursor..]);
    result
}
