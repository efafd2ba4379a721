//! Fediverse addresses (`@user@host`)

use std::fmt;

/// A validated `@user@host` handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address(String);

impl Address {
    /// Parse `input`, which must be `@`, a non-empty user part, `@`, and a
    /// non-empty host part, with no other `@` anywhere
    pub fn parse(input: &str) -> Option<Self> {
        let rest = input.strip_prefix('@')?;
        let (user, host) = rest.split_once('@')?;
        if user.is_empty() || host.is_empty() || host.contains('@') {
            return None;
        }
        Some(Self(input.to_string()))
    }

    /// Server part (after the last `@`)
    pub fn server(&self) -> &str {
        self.0.rsplit('@').next().unwrap_or_default()
    }

    /// Address without its leading `@` (`user@host`)
    pub fn acct(&self) -> &str {
        &self.0[1..]
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
