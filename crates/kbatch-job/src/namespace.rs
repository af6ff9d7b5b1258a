//! Per-user namespace derivation

/// Separator substituted for every character outside `[a-z0-9]`
const SEPARATOR: char = '-';

/// Derive the namespace that isolates a user's jobs.
///
/// The identity is lower-cased and every character outside `[a-z0-9]` is
/// replaced by exactly one `-`, so the output has one character per input
/// character. Consecutive separators are not collapsed and nothing is
/// truncated: callers enforce the 63-character namespace limit.
pub fn namespace_for_identity(identity: &str) -> String {
    identity
        .chars()
        .map(|c| {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_lowercase() || c.is_ascii_digit() {
                c
            } else {
                SEPARATOR
            }
        })
        .collect()
}

/// An authenticated user as supplied by the identity provider
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct User {
    /// Raw identity string, e.g. an email address
    pub name: String,
    /// Groups the user belongs to
    pub groups: Vec<String>,
}

impl User {
    /// Create a user with no groups
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            groups: Vec::new(),
        }
    }

    /// Namespace holding this user's jobs
    pub fn namespace(&self) -> String {
        namespace_for_identity(&self.name)
    }
}
