mod command;
mod driver;
mod environment;
mod orchestrator;
mod patch;
mod plan;
mod updater;

pub use command::{
    run_checked, BuildRequest, CommandFailedError, CommandOutput, CommandRunner, ConanCommand,
    Invocation, LockRequest, QueryRequest, SystemRunner,
};
pub use driver::{run_all, DriverTask, StopSignal, TaskOutcome};
pub use environment::{
    copy_directory, resolve_template_home, ScenarioEnvironment, STORAGE_PATH_VAR, USER_HOME_VAR,
};
pub use orchestrator::{build_all, BuildContext, BuildFailure, LOCKFILE_NAME};
pub use patch::Patcher;
pub use plan::{BuildPlan, BuildSpec, BuiltPackages};
pub use updater::{
    expand_revisions, strip_package_id_hook, RecipeUpdater, UpdateMode, RECIPE_FILE_NAME,
};
