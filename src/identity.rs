//! Email identity normalization
//!
//! Turns a login email into the stable key used for metering lookups.
//! Plus-aliases collapse onto the base address so `user+1@x.com` and
//! `user+2@x.com` share one free-tier counter.

use serde::{Deserialize, Serialize};

/// Character written in place of anything outside the safe key alphabet
const FILLER: char = '_';

/// Normalized account key derived from an email address
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountKey(String);

impl AccountKey {
    /// Normalize an email into an account key.
    ///
    /// Returns `None` when the input has no `@` after trimming.
    pub fn from_email(email: &str) -> Option<Self> {
        if !email.contains('@') {
            return None;
        }
        Some(Self(normalize(email)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for AccountKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Canonicalize an email address into a storage-safe key.
///
/// 1. Lower-case and trim.
/// 2. Drop a `+tag` from the local part.
/// 3. Replace every character outside `[a-z0-9@._-]` with `_`.
pub fn normalize(email: &str) -> String {
    let lowered = email.trim().to_lowercase();

    let collapsed = match lowered.split_once('@') {
        Some((local, domain)) => {
            let local = local.split_once('+').map_or(local, |(base, _)| base);
            format!("{local}@{domain}")
        }
        None => lowered,
    };

    collapsed
        .chars()
        .map(|c| if is_safe_key_char(c) { c } else { FILLER })
        .collect()
}

fn is_safe_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '@' | '.' | '_' | '-')
}

/// Decides whether an account gets the operator bypass.
///
/// The operator email comes from configuration and is never stored.
#[derive(Debug, Clone, Default)]
pub struct OperatorPolicy {
    operator_key: Option<AccountKey>,
}

impl OperatorPolicy {
    pub fn new(operator_email: Option<&str>) -> Self {
        Self {
            operator_key: operator_email.and_then(AccountKey::from_email),
        }
    }

    /// Policy with no operator configured
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_operator(&self, key: &AccountKey) -> bool {
        self.operator_key.as_ref() == Some(key)
    }
}
