//! Key-value store capability consumed by the grant store.
//!
//! The grant store needs a small subset of what Redis offers: byte values
//! with expiry, string sets, and the ability to submit several writes as one
//! atomic unit. [`KeyValueStore`] captures exactly that, so the same
//! orchestration runs against Redis in production and
//! [`InMemoryKvStore`](crate::memory::InMemoryKvStore) in tests.
//!
//! ## Semantics
//!
//! Backends must follow Redis semantics for the operations they expose:
//!
//! - Adding a member to a missing set creates the set without expiry.
//! - Removing the last member of a set deletes the set.
//! - `Expire` on a missing key is a no-op.
//! - Reading a key as the wrong kind fails with [`KvError::WrongType`].

use std::time::Duration;

use async_trait::async_trait;

use crate::error::KvError;

/// Result alias for backend operations.
pub type KvResult<T> = Result<T, KvError>;

/// A single write inside a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    /// Store a value that expires after `ttl`.
    Set {
        key: String,
        value: Vec<u8>,
        ttl: Duration,
    },
    /// Delete keys of any kind.
    Delete { keys: Vec<String> },
    /// Add a member to a set.
    AddMember { key: String, member: String },
    /// Remove members from a set.
    RemoveMembers { key: String, members: Vec<String> },
    /// Set or refresh the expiry of an existing key.
    Expire { key: String, ttl: Duration },
}

/// An ordered group of writes applied atomically.
///
/// All operations in a batch apply or none do, and no reader observes an
/// intermediate state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: Vec<u8>, ttl: Duration) -> &mut Self {
        self.ops.push(BatchOp::Set {
            key: key.into(),
            value,
            ttl,
        });
        self
    }

    pub fn delete(&mut self, keys: Vec<String>) -> &mut Self {
        if !keys.is_empty() {
            self.ops.push(BatchOp::Delete { keys });
        }
        self
    }

    pub fn add_member(&mut self, key: impl Into<String>, member: impl Into<String>) -> &mut Self {
        self.ops.push(BatchOp::AddMember {
            key: key.into(),
            member: member.into(),
        });
        self
    }

    pub fn remove_members(&mut self, key: impl Into<String>, members: Vec<String>) -> &mut Self {
        if !members.is_empty() {
            self.ops.push(BatchOp::RemoveMembers {
                key: key.into(),
                members,
            });
        }
        self
    }

    pub fn expire(&mut self, key: impl Into<String>, ttl: Duration) -> &mut Self {
        self.ops.push(BatchOp::Expire {
            key: key.into(),
            ttl,
        });
        self
    }

    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Backing store for grants and their index sets.
///
/// Implementations must be thread-safe (`Send + Sync`); the grant store
/// performs no client-side locking of its own.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Reads a value. Returns `None` for missing or expired keys.
    async fn get(&self, key: &str) -> KvResult<Option<Vec<u8>>>;

    /// Reads several values in one round trip, in the order of `keys`.
    async fn get_many(&self, keys: &[String]) -> KvResult<Vec<Option<Vec<u8>>>>;

    /// Returns all members of a set. A missing key reads as empty.
    async fn members(&self, key: &str) -> KvResult<Vec<String>>;

    /// Removes members from a set outside of any batch.
    async fn remove_members(&self, key: &str, members: &[String]) -> KvResult<()>;

    /// Applies a batch atomically.
    async fn execute(&self, batch: WriteBatch) -> KvResult<()>;

    /// Checks that the backend is reachable.
    async fn ping(&self) -> KvResult<()>;
}

#[async_trait]
impl<T: KeyValueStore + ?Sized> KeyValueStore for std::sync::Arc<T> {
    async fn get(&self, key: &str) -> KvResult<Option<Vec<u8>>> {
        (**self).get(key).await
    }

    async fn get_many(&self, keys: &[String]) -> KvResult<Vec<Option<Vec<u8>>>> {
        (**self).get_many(keys).await
    }

    async fn members(&self, key: &str) -> KvResult<Vec<String>> {
        (**self).members(key).await
    }

    async fn remove_members(&self, key: &str, members: &[String]) -> KvResult<()> {
        (**self).remove_members(key, members).await
    }

    async fn execute(&self, batch: WriteBatch) -> KvResult<()> {
        (**self).execute(batch).await
    }

    async fn ping(&self) -> KvResult<()> {
        (**self).ping().await
    }
}
