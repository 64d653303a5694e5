//! Storage key derivation.
//!
//! ## Key Format
//!
//! | Record | Key |
//! |--------|-----|
//! | Grant | `{prefix}{grant_key}` |
//! | Subject index | `{prefix}idx:{subject}` |
//! | Subject+client index | `{prefix}idx:{subject}:{client}` |
//! | Subject+client+type index | `{prefix}idx:{subject}:{client}:{type}` |
//!
//! With the default empty prefix the grant key is used verbatim. Subject and
//! client identifiers must not contain the `:` separator; this is a caller
//! precondition and is not checked here.

use crate::types::GrantType;

const INDEX_NAMESPACE: &str = "idx";
const SEPARATOR: char = ':';

/// Derives primary and index keys for grants.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrantKeys {
    prefix: String,
}

impl GrantKeys {
    /// Creates a key scheme with the given namespace prefix.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Returns the configured namespace prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Primary record key for a grant.
    #[inline]
    pub fn primary(&self, grant_key: &str) -> String {
        format!("{}{grant_key}", self.prefix)
    }

    /// Index of every grant held by a subject.
    #[inline]
    pub fn subject_index(&self, subject_id: &str) -> String {
        format!(
            "{}{INDEX_NAMESPACE}{SEPARATOR}{subject_id}",
            self.prefix
        )
    }

    /// Index of every grant a subject holds for one client.
    #[inline]
    pub fn subject_client_index(&self, subject_id: &str, client_id: &str) -> String {
        format!(
            "{}{INDEX_NAMESPACE}{SEPARATOR}{subject_id}{SEPARATOR}{client_id}",
            self.prefix
        )
    }

    /// Index of every grant of one type a subject holds for one client.
    #[inline]
    pub fn subject_client_type_index(
        &self,
        subject_id: &str,
        client_id: &str,
        grant_type: &GrantType,
    ) -> String {
        format!(
            "{}{INDEX_NAMESPACE}{SEPARATOR}{subject_id}{SEPARATOR}{client_id}{SEPARATOR}{grant_type}",
            self.prefix
        )
    }

    /// Strips the namespace prefix from a primary key.
    pub fn grant_key<'a>(&self, primary: &'a str) -> &'a str {
        primary.strip_prefix(self.prefix.as_str()).unwrap_or(primary)
    }
}
