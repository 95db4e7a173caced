//! Identity field → username derivation.

use crate::config::IdentityScheme;

/// First initial + last name, the key used to match full names on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameKey {
    /// `jdoe` for "Jane Doe"
    pub key: String,
    /// `doe` for "Jane Doe"
    pub last: String,
    /// Lower-cased full name with collapsed whitespace.
    pub full: String,
}

/// Build a [`NameKey`] from a full name.
///
/// Returns `None` for a blank name or a spreadsheet `nan`.
pub fn name_key(name: &str) -> Option<NameKey> {
    let lowered = name.trim().to_lowercase();
    if is_missing(&lowered) {
        return None;
    }
    let parts: Vec<&str> = lowered.split_whitespace().collect();
    let first = parts.first()?.chars().next()?;
    let last = parts.last()?.to_string();
    Some(NameKey {
        key: format!("{}{}", first, last),
        last,
        full: parts.join(" "),
    })
}

/// Derive the username a survey identity field refers to.
pub fn derive_username(identity: &str, scheme: IdentityScheme) -> Option<String> {
    let trimmed = identity.trim();
    if is_missing(&trimmed.to_lowercase()) {
        return None;
    }
    match scheme {
        IdentityScheme::Email => {
            let local = trimmed.split('@').next().unwrap_or(trimmed).trim();
            if local.is_empty() {
                None
            } else {
                Some(local.to_lowercase())
            }
        }
        IdentityScheme::Username => Some(trimmed.to_lowercase()),
        IdentityScheme::FullName => name_key(trimmed).map(|k| k.key),
    }
}

fn is_missing(lowered: &str) -> bool {
    lowered.is_empty() || lowered == "nan"
}
