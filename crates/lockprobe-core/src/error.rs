use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("reference '{reference}' is missing its '#revision' separator")]
    MissingRevisionSeparator { reference: String },
    #[error("option entry '{line}' is missing '='")]
    MalformedOption { line: String },
    #[error("line {line_no}: {reason}: '{line}'")]
    MalformedIni {
        line_no: usize,
        line: String,
        reason: &'static str,
    },
    #[error("duplicate section [{section}]")]
    DuplicateSection { section: String },
    #[error("duplicate key '{key}' in section [{section}]")]
    DuplicateKey { section: String, key: String },
    #[error("full_requires entry '{entry}' is not of the form 'reference:package_id'")]
    MalformedFullRequire { entry: String },
    #[error("lock document is missing '{field}'")]
    MissingField { field: &'static str },
    #[error("lock document is not valid JSON")]
    InvalidJson(#[from] serde_json::Error),
}
