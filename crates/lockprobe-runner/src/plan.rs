use std::path::PathBuf;

use anyhow::Result;
use lockprobe_core::PackageIdentity;

/// One package to build: the identity template (name, version and declared
/// options), an optional recipe patch and logical names of the plan entries
/// it depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSpec {
    pub package: PackageIdentity,
    pub patch_file: Option<PathBuf>,
    pub dependencies: Vec<String>,
}

impl BuildSpec {
    pub fn new(package: PackageIdentity) -> Self {
        Self {
            package,
            patch_file: None,
            dependencies: Vec::new(),
        }
    }

    /// Patch path, relative to the recipes directory.
    pub fn with_patch(mut self, patch_file: impl Into<PathBuf>) -> Self {
        self.patch_file = Some(patch_file.into());
        self
    }

    pub fn depends_on<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }
}

/// Build order, as given by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildPlan {
    entries: Vec<(String, BuildSpec)>,
}

impl BuildPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, spec: BuildSpec) -> Result<()> {
        let name = name.into();
        if self.entries.iter().any(|(existing, _)| *existing == name) {
            anyhow::bail!("build plan already contains '{name}'");
        }
        self.entries.push((name, spec));
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BuildSpec)> {
        self.entries.iter().map(|(name, spec)| (name.as_str(), spec))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Built records keyed by logical name, in build order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuiltPackages {
    entries: Vec<(String, PackageIdentity)>,
}

impl BuiltPackages {
    pub fn get(&self, name: &str) -> Option<&PackageIdentity> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, package)| package)
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut PackageIdentity> {
        self.entries
            .iter_mut()
            .find(|(existing, _)| existing == name)
            .map(|(_, package)| package)
    }

    pub(crate) fn insert(&mut self, name: &str, package: PackageIdentity) {
        match self.get_mut(name) {
            Some(existing) => *existing = package,
            None => self.entries.push((name.to_string(), package)),
        }
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (&str, &PackageIdentity)> {
        self.entries
            .iter()
            .map(|(name, package)| (name.as_str(), package))
    }

    pub fn records(&self) -> impl DoubleEndedIterator<Item = &PackageIdentity> {
        self.entries.iter().map(|(_, package)| package)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, PackageIdentity)> for BuiltPackages {
    fn from_iter<I: IntoIterator<Item = (String, PackageIdentity)>>(iter: I) -> Self {
        let mut built = Self::default();
        for (name, package) in iter {
            built.insert(&name, package);
        }
        built
    }
}
