use std::fmt;
use std::path::PathBuf;

/// Flattened, comparable identity of one built package.
///
/// `name` and `version` are fixed at construction. Everything else starts
/// empty and is filled in as the package manager reports it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageIdentity {
    name: String,
    version: String,
    pub revision: Option<String>,
    pub package_id: Option<String>,
    pub package_revision: Option<String>,
    pub remote: Option<String>,
    pub options: Vec<String>,
    pub requires: Vec<String>,
    pub required_by: Vec<String>,
    pub lockfile_path: Option<PathBuf>,
}

/// Which optional parts to append when rendering a reference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReferenceParts {
    pub revision: bool,
    pub package_id: bool,
    pub package_revision: bool,
}

impl PackageIdentity {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            ..Self::default()
        }
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// `name/version`
    pub fn reference(&self) -> String {
        self.render(ReferenceParts::default())
    }

    /// `name/version#revision`
    pub fn revisioned_reference(&self) -> String {
        self.render(ReferenceParts {
            revision: true,
            ..ReferenceParts::default()
        })
    }

    /// `name/version#revision:package_id`
    pub fn full_reference(&self) -> String {
        self.render(ReferenceParts {
            revision: true,
            package_id: true,
            package_revision: false,
        })
    }

    /// `name/version#revision:package_id#package_revision`
    pub fn full_package_reference(&self) -> String {
        self.render(ReferenceParts {
            revision: true,
            package_id: true,
            package_revision: true,
        })
    }

    pub fn render(&self, parts: ReferenceParts) -> String {
        let mut rendered = format!("{}/{}", self.name, self.version);
        if let Some(revision) = non_empty(parts.revision, &self.revision) {
            rendered.push('#');
            rendered.push_str(revision);
        }
        if let Some(package_id) = non_empty(parts.package_id, &self.package_id) {
            rendered.push(':');
            rendered.push_str(package_id);
        }
        if let Some(package_revision) = non_empty(parts.package_revision, &self.package_revision)
        {
            rendered.push('#');
            rendered.push_str(package_revision);
        }
        rendered
    }
}

impl fmt::Display for PackageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_package_reference())
    }
}

fn non_empty(selected: bool, value: &Option<String>) -> Option<&str> {
    if !selected {
        return None;
    }
    value.as_deref().filter(|value| !value.is_empty())
}
