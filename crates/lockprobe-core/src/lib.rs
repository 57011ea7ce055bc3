mod error;
mod identity;
mod ini;
mod lockfile;
mod query;

pub use error::ParseError;
pub use identity::{PackageIdentity, ReferenceParts};
pub use ini::{IniDocument, IniEntry, IniSection};
pub use lockfile::{
    parse_option_lines, LockDocument, LockNode, ProfileSection, FIRST_NODE_ID, ROOT_NODE_ID,
};
pub use query::CliQueryResult;

#[cfg(test)]
mod tests;
