//! Secondary index sets and their fan-out relationships.
//!
//! Every grant with a subject is a member of three index sets, from coarse
//! to fine: subject, subject+client, subject+client+type. Bulk deletion at
//! one level must also remove the deleted keys from every coarser level, but
//! never reaches into finer levels. That relationship lives in
//! [`IndexLevel::coarser`] so the deletion paths share one routine.

use crate::keys::GrantKeys;
use crate::types::{Grant, GrantType};

/// Granularity of an index set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexLevel {
    Subject,
    SubjectClient,
    SubjectClientType,
}

impl IndexLevel {
    /// All levels, coarse to fine.
    pub const ALL: [IndexLevel; 3] = [
        IndexLevel::Subject,
        IndexLevel::SubjectClient,
        IndexLevel::SubjectClientType,
    ];

    /// Levels that must be updated when keys are bulk-deleted at this level.
    #[must_use]
    pub const fn coarser(self) -> &'static [IndexLevel] {
        match self {
            Self::Subject => &[],
            Self::SubjectClient => &[Self::Subject],
            Self::SubjectClientType => &[Self::SubjectClient, Self::Subject],
        }
    }

    /// Only the most specific index is time-bounded; the coarser ones
    /// aggregate grants with unrelated lifetimes and rely on lazy pruning.
    #[must_use]
    pub const fn carries_ttl(self) -> bool {
        matches!(self, Self::SubjectClientType)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Subject => "subject",
            Self::SubjectClient => "subject_client",
            Self::SubjectClientType => "subject_client_type",
        }
    }
}

impl std::fmt::Display for IndexLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A concrete index set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantIndex<'a> {
    Subject {
        subject_id: &'a str,
    },
    SubjectClient {
        subject_id: &'a str,
        client_id: &'a str,
    },
    SubjectClientType {
        subject_id: &'a str,
        client_id: &'a str,
        grant_type: &'a GrantType,
    },
}

impl<'a> GrantIndex<'a> {
    /// The three indexes a grant belongs to, coarse to fine. Empty when the
    /// grant has no subject.
    pub fn for_grant(grant: &'a Grant) -> Vec<GrantIndex<'a>> {
        match grant.subject() {
            Some(subject_id) => {
                let finest = GrantIndex::SubjectClientType {
                    subject_id,
                    client_id: &grant.client_id,
                    grant_type: &grant.grant_type,
                };
                IndexLevel::ALL
                    .iter()
                    .filter_map(|level| finest.at(*level))
                    .collect()
            }
            None => Vec::new(),
        }
    }

    pub fn level(&self) -> IndexLevel {
        match self {
            Self::Subject { .. } => IndexLevel::Subject,
            Self::SubjectClient { .. } => IndexLevel::SubjectClient,
            Self::SubjectClientType { .. } => IndexLevel::SubjectClientType,
        }
    }

    /// Projects this index onto a coarser (or equal) level.
    ///
    /// Returns `None` when `level` is finer than `self`, since the missing
    /// dimensions cannot be invented.
    pub fn at(&self, level: IndexLevel) -> Option<GrantIndex<'a>> {
        match (*self, level) {
            (_, IndexLevel::Subject) => Some(GrantIndex::Subject {
                subject_id: self.subject_id(),
            }),
            (
                GrantIndex::SubjectClient {
                    subject_id,
                    client_id,
                }
                | GrantIndex::SubjectClientType {
                    subject_id,
                    client_id,
                    ..
                },
                IndexLevel::SubjectClient,
            ) => Some(GrantIndex::SubjectClient {
                subject_id,
                client_id,
            }),
            (index @ GrantIndex::SubjectClientType { .. }, IndexLevel::SubjectClientType) => {
                Some(index)
            }
            _ => None,
        }
    }

    /// Indexes that bulk deletion at this index must also update.
    pub fn coarser(&self) -> Vec<GrantIndex<'a>> {
        self.level()
            .coarser()
            .iter()
            .filter_map(|level| self.at(*level))
            .collect()
    }

    pub fn subject_id(&self) -> &'a str {
        match *self {
            Self::Subject { subject_id }
            | Self::SubjectClient { subject_id, .. }
            | Self::SubjectClientType { subject_id, .. } => subject_id,
        }
    }

    /// Storage key of this index set.
    pub fn key(&self, keys: &GrantKeys) -> String {
        match *self {
            Self::Subject { subject_id } => keys.subject_index(subject_id),
            Self::SubjectClient {
                subject_id,
                client_id,
            } => keys.subject_client_index(subject_id, client_id),
            Self::SubjectClientType {
                subject_id,
                client_id,
                grant_type,
            } => keys.subject_client_type_index(subject_id, client_id, grant_type),
        }
    }
}
