use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Result;
use lockprobe_runner::{
    build_all, BuildContext, ConanCommand, DriverTask, Patcher, RecipeUpdater,
    ScenarioEnvironment, StopSignal,
};
use tracing::{info, warn};

use crate::config::HarnessConfig;
use crate::scenarios::Scenario;

/// Configuration shared by every scenario of one run, with paths made
/// absolute.
#[derive(Debug, Clone)]
pub struct HarnessSettings {
    pub config: HarnessConfig,
    pub template_home: PathBuf,
    pub fail_fast: bool,
}

#[derive(Debug)]
pub struct ScenarioReport {
    pub name: String,
    pub outcome: Result<usize>,
    pub elapsed: Duration,
    pub artifacts: Option<PathBuf>,
}

impl ScenarioReport {
    pub fn passed(&self) -> bool {
        self.outcome.is_ok()
    }
}

pub struct ScenarioTask<'a> {
    scenario: Scenario,
    settings: &'a HarnessSettings,
}

impl<'a> ScenarioTask<'a> {
    pub fn new(scenario: Scenario, settings: &'a HarnessSettings) -> Self {
        Self { scenario, settings }
    }

    fn execute(&self, stop: &StopSignal) -> Result<usize> {
        let config = &self.settings.config;
        let environment = ScenarioEnvironment::create(
            &config.work_root,
            self.scenario.name,
            config.keep_artifacts,
        )?;
        environment.provision(&self.settings.template_home)?;
        let recipes_dir = environment.install_recipes(&config.recipes_dir)?;

        let runner = environment.runner();
        let context = BuildContext {
            conan: ConanCommand::new(&runner, &config.conan),
            recipes_dir,
            lockfiles_dir: environment.lockfiles_dir(),
            profile: Some(config.profile.clone()),
            stop: stop.clone(),
        };
        let mut updater =
            RecipeUpdater::new(self.scenario.mode, Patcher::new(&runner, &config.patch));

        let plan = self.scenario.plan()?;
        info!(mode = %self.scenario.mode, packages = plan.len(), "building scenario packages");
        let built = build_all(&context, &plan, &mut updater)?;
        self.scenario.verify(&built)
    }
}

impl DriverTask for ScenarioTask<'_> {
    type Output = ScenarioReport;

    fn name(&self) -> &str {
        self.scenario.name
    }

    fn run(&self, stop: &StopSignal) -> ScenarioReport {
        let started = Instant::now();
        let outcome = self.execute(stop);
        if let Err(err) = &outcome {
            warn!(error = %format!("{err:#}"), "scenario failed");
            if self.settings.fail_fast {
                stop.raise();
            }
        }
        let config = &self.settings.config;
        ScenarioReport {
            name: self.scenario.name.to_string(),
            outcome,
            elapsed: started.elapsed(),
            artifacts: config
                .keep_artifacts
                .then(|| config.work_root.join(self.scenario.name)),
        }
    }
}
