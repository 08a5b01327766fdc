//! Identifier list loading
//!
//! The list is a flat text file with one identifier per line. Line
//! terminators are stripped and blank lines skipped; anything else on the
//! line is kept verbatim, since identifiers are appended to the prefix as-is.

use crate::HarvestError;
use std::path::Path;

/// Reads the identifier list at `path`
pub async fn load_identifiers(path: &Path) -> Result<Vec<String>, HarvestError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| HarvestError::ReadList {
            path: path.to_path_buf(),
            source,
        })?;

    Ok(parse_identifiers(&content))
}

/// Splits list content into identifiers, preserving input order
pub fn parse_identifiers(content: &str) -> Vec<String> {
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect()
}
