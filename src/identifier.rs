use crate::error::{ProvisionError, Result};
use std::fmt;

/// A name that is safe to interpolate into SQL text.
///
/// MySQL has no parameter binding for database or account names, so every project,
/// environment and role that ends up in a statement goes through [`Identifier::parse`].
/// The only characters allowed are `[A-Za-z0-9_]`, at least one of them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier(String);

impl Identifier {
    /// Trim and validate a raw value.
    pub fn parse(raw: &str) -> Result<Self> {
        let name = raw.trim();

        if !is_identifier(name) {
            return Err(ProvisionError::InvalidIdentifier(name.to_string()));
        }

        Ok(Self(name.to_string()))
    }

    /// Join already validated parts with `_`, lower-cased.
    ///
    /// The result only contains characters of the parts plus `_`, so it stays valid.
    pub fn join_lower(parts: &[&Identifier]) -> Self {
        let joined = parts
            .iter()
            .map(|p| p.0.to_lowercase())
            .collect::<Vec<_>>()
            .join("_");

        Self(joined)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn to_uppercase(&self) -> String {
        self.0.to_uppercase()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Validate a raw string, returning the trimmed identifier text.
pub fn validate(raw: &str) -> Result<String> {
    Identifier::parse(raw).map(|id| id.0)
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// A role token, normalized to upper case.
///
/// Only used as a lookup key into the privilege table and as the suffix of
/// `DB_USER_<ROLE>` keys; the username keeps the lower-cased form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Role(Identifier);

impl Role {
    pub fn parse(raw: &str) -> Result<Self> {
        let id = Identifier::parse(raw)?;
        Ok(Self(Identifier(id.to_uppercase())))
    }

    pub fn identifier(&self) -> &Identifier {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
