use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use lockprobe_core::PackageIdentity;
use tracing::{debug, info, info_span, warn};

use crate::command::{BuildRequest, ConanCommand, LockRequest, QueryRequest};
use crate::driver::StopSignal;
use crate::plan::{BuildPlan, BuildSpec, BuiltPackages};
use crate::updater::RecipeUpdater;

pub const LOCKFILE_NAME: &str = "conan.lock";

static LOCK_DIR_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Everything a build pass needs besides the plan itself.
#[derive(Clone)]
pub struct BuildContext<'r> {
    pub conan: ConanCommand<'r>,
    pub recipes_dir: PathBuf,
    pub lockfiles_dir: PathBuf,
    pub profile: Option<String>,
    pub stop: StopSignal,
}

/// A build pass that stopped at `package`. `built` holds the records that
/// completed before it.
#[derive(Debug)]
pub struct BuildFailure {
    pub package: String,
    pub built: BuiltPackages,
    pub error: anyhow::Error,
}

impl fmt::Display for BuildFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "building '{}' failed", self.package)
    }
}

impl std::error::Error for BuildFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.error.as_ref())
    }
}

/// Builds every plan entry in order and records the identity the package
/// manager assigned to it.
pub fn build_all(
    context: &BuildContext<'_>,
    plan: &BuildPlan,
    updater: &mut RecipeUpdater<'_>,
) -> Result<BuiltPackages, BuildFailure> {
    let mut built = BuiltPackages::default();
    for (name, spec) in plan.iter() {
        if context.stop.is_raised() {
            return Err(BuildFailure {
                package: name.to_string(),
                built,
                error: anyhow::anyhow!("stopped before building '{name}'"),
            });
        }

        let span = info_span!("package", name);
        let _entered = span.enter();

        let outcome = build_one(context, name, spec, &built, updater);
        // The recipe tree must be pristine for the next entry whatever happened.
        let reverted = updater
            .revert()
            .with_context(|| format!("failed reverting recipe changes for '{name}'"));

        let package = match (outcome, reverted) {
            (Ok(package), Ok(())) => package,
            (Err(error), Ok(())) | (Ok(_), Err(error)) => {
                return Err(BuildFailure {
                    package: name.to_string(),
                    built,
                    error,
                })
            }
            (Err(error), Err(revert_error)) => {
                warn!(
                    error = %format!("{revert_error:#}"),
                    "recipe left modified after failed build"
                );
                return Err(BuildFailure {
                    package: name.to_string(),
                    built,
                    error: error.context(format!("{revert_error:#}")),
                });
            }
        };

        let full_reference = package.full_reference();
        for dependency in &spec.dependencies {
            if let Some(record) = built.get_mut(dependency) {
                record.required_by.push(full_reference.clone());
            }
        }
        info!(reference = %package, "built");
        built.insert(name, package);
    }
    Ok(built)
}

fn build_one(
    context: &BuildContext<'_>,
    name: &str,
    spec: &BuildSpec,
    built: &BuiltPackages,
    updater: &mut RecipeUpdater<'_>,
) -> Result<PackageIdentity> {
    let mut package = spec.package.clone();
    let recipe_dir = context.recipes_dir.join(package.name());
    let patch_file = spec
        .patch_file
        .as_ref()
        .map(|patch| context.recipes_dir.join(patch));

    updater.apply(&recipe_dir, patch_file.as_deref(), built)?;

    info!(reference = %package.reference(), "exporting recipe");
    context.conan.export(&recipe_dir, package.version())?;

    package.options = option_closure(name, spec, built)?;

    info!(reference = %package.reference(), options = ?package.options, "building package");
    context.conan.build(&BuildRequest {
        conanfile_path: Some(recipe_dir),
        version: Some(package.version().to_string()),
        options: package.options.clone(),
        profile: context.profile.clone(),
        lockfile: None,
    })?;

    let lockfile = unique_lock_dir(&context.lockfiles_dir, &package)?.join(LOCKFILE_NAME);
    debug!(lockfile = %lockfile.display(), "creating lock file");
    let lock = context.conan.create_lock(&LockRequest {
        lockfile: lockfile.clone(),
        reference: Some(package.reference()),
        profile: context.profile.clone(),
        options: package.options.clone(),
        ..LockRequest::default()
    })?;

    let node = lock.first_node().with_context(|| {
        format!(
            "lock file {} has no node for {}",
            lockfile.display(),
            package.reference()
        )
    })?;
    package.revision = node.revision.clone();
    package.package_id = node.package_id.clone();
    package.package_revision = node.package_revision.clone();
    package.lockfile_path = Some(lockfile);

    let metadata = context.conan.query_metadata(&QueryRequest {
        reference: package.reference(),
        revision: package.revision.clone(),
        package_id: package.package_id.clone(),
        remote: package.remote.clone(),
    })?;
    package.requires = metadata.requires();

    Ok(package)
}

/// Own options followed by the options of each dependency, first occurrence
/// kept.
fn option_closure(name: &str, spec: &BuildSpec, built: &BuiltPackages) -> Result<Vec<String>> {
    let mut options: Vec<String> = Vec::new();
    let mut push = |option: &String| {
        if !options.contains(option) {
            options.push(option.clone());
        }
    };
    spec.package.options.iter().for_each(&mut push);
    for dependency in &spec.dependencies {
        let record = built.get(dependency).with_context(|| {
            format!("'{name}' depends on '{dependency}', which has not been built yet")
        })?;
        record.options.iter().for_each(&mut push);
    }
    Ok(options)
}

fn unique_lock_dir(lockfiles_dir: &Path, package: &PackageIdentity) -> Result<PathBuf> {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let counter = LOCK_DIR_COUNTER.fetch_add(1, Ordering::Relaxed);
    let dir = lockfiles_dir
        .join(package.name())
        .join(package.version())
        .join(format!("lock-{nanos}-{counter}"));
    fs::create_dir_all(&dir)
        .with_context(|| format!("failed creating lock directory {}", dir.display()))?;
    Ok(dir)
}
