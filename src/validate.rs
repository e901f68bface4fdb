//! Strict-mode validation: report document keys that match no record field.
//!
//! The document walk collects unmatched keys as dotted paths; this module
//! turns them into [`LayerfigError::UnknownKey`] errors with a best-effort
//! line number so the user can find the typo.

use crate::error::LayerfigError;

/// Fail with one `UnknownKey` per entry of `unknown`, located in `content`.
pub fn reject_unknown_keys(content: &str, unknown: Vec<String>) -> Result<(), LayerfigError> {
    let errors = unknown
        .into_iter()
        .map(|key| {
            let line = find_key_line(content, &key);
            LayerfigError::UnknownKey { key, line }
        })
        .collect();
    LayerfigError::collect(errors)
}

/// Find the 1-indexed line on which `dotted_key` is assigned in TOML `content`.
///
/// Tracks `[section]` headers so `database.typo` only matches a `typo = ...`
/// line inside `[database]`. Quoted keys and inline tables are not handled.
/// Returns 0 when the key cannot be located (always the case for JSON).
pub fn find_key_line(content: &str, dotted_key: &str) -> usize {
    let (section, leaf) = match dotted_key.rsplit_once('.') {
        Some((section, leaf)) => (section.split('.').collect::<Vec<_>>(), leaf),
        None => (Vec::new(), dotted_key),
    };

    let mut current: Vec<String> = Vec::new();
    for (i, line) in content.lines().enumerate() {
        let trimmed = line.trim();

        if let Some(header) = trimmed.strip_prefix('[')
            && !header.starts_with('[')
        {
            current = header
                .trim_end_matches(']')
                .split('.')
                .map(|s| s.trim().to_string())
                .collect();
            continue;
        }

        let in_section = current.len() == section.len()
            && current.iter().zip(&section).all(|(a, b)| a.as_str() == *b);
        if in_section
            && let Some(rest) = trimmed.strip_prefix(leaf)
            && rest.trim_start().starts_with('=')
        {
            return i + 1;
        }
    }
    0
}
