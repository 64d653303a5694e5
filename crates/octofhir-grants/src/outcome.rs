//! Result of a mutating grant store operation.

use crate::error::KvError;

/// What a mutating operation did.
///
/// Backend failures are reported here instead of as `Err`: the issuance layer
/// must keep going when the store is degraded, and a missing grant simply
/// fails the next validation step upstream. The store logs and counts every
/// outcome before returning it.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// The write was submitted and acknowledged.
    Applied {
        /// Number of grant records written or deleted. Bulk removals count
        /// every index member, including records that had already expired.
        grants: usize,
    },
    /// Nothing matched; no write was issued.
    NotFound,
    /// The backend failed. State may be unchanged or, for non-atomic
    /// backends, partially updated.
    Failed(KvError),
}

impl Outcome {
    pub(crate) fn applied(grants: usize) -> Self {
        Self::Applied { grants }
    }

    #[must_use]
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Number of grants affected, zero unless applied.
    #[must_use]
    pub fn grants(&self) -> usize {
        match self {
            Self::Applied { grants } => *grants,
            _ => 0,
        }
    }

    #[must_use]
    pub fn error(&self) -> Option<&KvError> {
        match self {
            Self::Failed(e) => Some(e),
            _ => None,
        }
    }

    /// Label used for the `outcome` metric dimension.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Applied { .. } => "applied",
            Self::NotFound => "not_found",
            Self::Failed(_) => "failed",
        }
    }
}
