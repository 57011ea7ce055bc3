use crate::error::ParseError;
use crate::ini::{IniDocument, IniEntry};

const OPTIONS: &str = "options";
const REQUIRES: &str = "requires";
const FULL_REQUIRES: &str = "full_requires";
const FULL_OPTIONS: &str = "full_options";
const FULL_SETTINGS: &str = "full_settings";

/// Parsed output of a package metadata query (`get --raw`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliQueryResult {
    reference: String,
    package_name: String,
    document: IniDocument,
    full_requires: Vec<(String, String)>,
}

impl CliQueryResult {
    pub fn parse(reference: &str, response: &str) -> Result<Self, ParseError> {
        let document = IniDocument::parse(response)?;

        // `full_requires` lines are bare `reference:package_id` keys; split them
        // so the view reads like the other key/value sections.
        let mut full_requires = Vec::new();
        for (entry, _) in document.entries(FULL_REQUIRES) {
            let (package, package_id) =
                entry
                    .split_once(':')
                    .ok_or_else(|| ParseError::MalformedFullRequire {
                        entry: entry.clone(),
                    })?;
            full_requires.push((package.to_string(), package_id.to_string()));
        }

        let package_name = reference
            .split_once('/')
            .map(|(name, _)| name)
            .unwrap_or(reference)
            .to_string();

        Ok(Self {
            reference: reference.to_string(),
            package_name,
            document,
            full_requires,
        })
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    /// Options the queried package was built with, as `pkgname:key`.
    pub fn build_options(&self) -> Vec<IniEntry> {
        self.document
            .entries(OPTIONS)
            .iter()
            .map(|(key, value)| (self.namespaced(key), value.clone()))
            .collect()
    }

    /// Direct requirements, in reported order.
    pub fn requires(&self) -> Vec<String> {
        self.document
            .entries(REQUIRES)
            .iter()
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Transitive requirements as `(reference, package_id)`.
    pub fn full_requires(&self) -> &[(String, String)] {
        &self.full_requires
    }

    /// Transitive options; bare keys belong to the queried package.
    pub fn full_options(&self) -> Vec<IniEntry> {
        self.document
            .entries(FULL_OPTIONS)
            .iter()
            .map(|(key, value)| (self.namespaced(key), value.clone()))
            .collect()
    }

    pub fn full_settings(&self) -> &[IniEntry] {
        self.document.entries(FULL_SETTINGS)
    }

    fn namespaced(&self, key: &str) -> String {
        if key.contains(':') {
            key.to_string()
        } else {
            format!("{}:{key}", self.package_name)
        }
    }
}
