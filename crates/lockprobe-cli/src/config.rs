use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "lockprobe.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
    pub conan: String,
    pub patch: String,
    pub profile: String,
    pub recipes_dir: PathBuf,
    pub work_root: PathBuf,
    pub template_home: Option<PathBuf>,
    pub jobs: Option<usize>,
    pub keep_artifacts: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            conan: "conan".to_string(),
            patch: "patch".to_string(),
            profile: "gcc82".to_string(),
            recipes_dir: PathBuf::from("fixtures/recipes"),
            work_root: PathBuf::from("test_cases"),
            template_home: None,
            jobs: None,
            keep_artifacts: false,
        }
    }
}

impl HarnessConfig {
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("failed to parse lockprobe config")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed reading config {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("invalid config {}", path.display()))
    }

    /// An explicit path must exist; otherwise `lockprobe.toml` in the working
    /// directory is used when present.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let default_path = Path::new(DEFAULT_CONFIG_FILE);
        if default_path.is_file() {
            return Self::load(default_path);
        }
        Ok(Self::default())
    }

    /// Worker count for `scenario_count` scenarios: the configured value or
    /// the available parallelism, never more than there are scenarios.
    pub fn effective_jobs(&self, scenario_count: usize) -> usize {
        let requested = self.jobs.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(usize::from)
                .unwrap_or(1)
        });
        requested.clamp(1, scenario_count.max(1))
    }
}
