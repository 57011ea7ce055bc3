use crate::error::ParseError;

/// A key and its optional value. Bare keys carry `None`.
pub type IniEntry = (String, Option<String>);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IniSection {
    name: String,
    entries: Vec<IniEntry>,
}

impl IniSection {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entries(&self) -> &[IniEntry] {
        &self.entries
    }

    pub fn get(&self, key: &str) -> Option<&Option<String>> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }
}

/// Ordered `[section]` / `key=value` document.
///
/// Only `=` delimits a key from its value, keys keep their letter case and a
/// key without `=` is accepted as a bare key. Duplicate sections or keys are
/// rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IniDocument {
    sections: Vec<IniSection>,
}

impl IniDocument {
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let mut sections: Vec<IniSection> = Vec::new();
        // Indentation of the last key line, if its value may still continue.
        let mut continuation_indent: Option<usize> = None;

        for (index, raw_line) in input.lines().enumerate() {
            let line_no = index + 1;
            let trimmed = raw_line.trim();
            if trimmed.is_empty() {
                continuation_indent = None;
                continue;
            }
            if trimmed.starts_with('#') || trimmed.starts_with(';') {
                continue;
            }

            let indent = raw_line.len() - raw_line.trim_start().len();
            if let Some(key_indent) = continuation_indent {
                if indent > key_indent {
                    if let Some(Some(value)) = sections
                        .last_mut()
                        .and_then(|section| section.entries.last_mut())
                        .map(|(_, value)| value.as_mut())
                    {
                        value.push('\n');
                        value.push_str(trimmed);
                    }
                    continue;
                }
            }

            if let Some(header) = trimmed.strip_prefix('[') {
                let Some(name) = header.strip_suffix(']') else {
                    return Err(ParseError::MalformedIni {
                        line_no,
                        line: raw_line.to_string(),
                        reason: "unterminated section header",
                    });
                };
                if sections.iter().any(|section| section.name == name) {
                    return Err(ParseError::DuplicateSection {
                        section: name.to_string(),
                    });
                }
                sections.push(IniSection {
                    name: name.to_string(),
                    entries: Vec::new(),
                });
                continuation_indent = None;
                continue;
            }

            let Some(section) = sections.last_mut() else {
                return Err(ParseError::MalformedIni {
                    line_no,
                    line: raw_line.to_string(),
                    reason: "entry before any section header",
                });
            };

            let (key, value) = match trimmed.split_once('=') {
                Some((key, value)) => (key.trim(), Some(value.trim().to_string())),
                None => (trimmed, None),
            };
            if key.is_empty() {
                return Err(ParseError::MalformedIni {
                    line_no,
                    line: raw_line.to_string(),
                    reason: "empty key",
                });
            }
            if section.entries.iter().any(|(existing, _)| existing == key) {
                return Err(ParseError::DuplicateKey {
                    section: section.name.clone(),
                    key: key.to_string(),
                });
            }

            continuation_indent = value.is_some().then_some(indent);
            section.entries.push((key.to_string(), value));
        }

        Ok(Self { sections })
    }

    pub fn sections(&self) -> &[IniSection] {
        &self.sections
    }

    pub fn section(&self, name: &str) -> Option<&IniSection> {
        self.sections.iter().find(|section| section.name == name)
    }

    /// Entries of `name`, or nothing when the section is absent.
    pub fn entries(&self, name: &str) -> &[IniEntry] {
        self.section(name)
            .map(IniSection::entries)
            .unwrap_or_default()
    }
}
