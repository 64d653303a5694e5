//! In-memory key-value backend.
//!
//! Mirrors the subset of Redis semantics the grant store relies on, so the
//! store logic can be exercised without a server. Single-instance
//! deployments can use it directly.
//!
//! Expired entries are invisible to reads and are dropped the next time a
//! write touches them or when [`InMemoryKvStore::purge_expired`] is called.
//! There is no background sweeper.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::KvError;
use crate::kv::{BatchOp, KeyValueStore, KvResult, WriteBatch};

#[derive(Debug, Clone)]
enum Value {
    Bytes(Vec<u8>),
    Set(HashSet<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

type Data = HashMap<String, Entry>;

/// In-memory [`KeyValueStore`] with per-key expiry.
///
/// Cloning shares the underlying data.
#[derive(Debug, Clone, Default)]
pub struct InMemoryKvStore {
    data: Arc<RwLock<Data>>,
}

impl InMemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.data
            .read()
            .values()
            .filter(|entry| !entry.is_expired(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if a live key of any kind exists.
    pub fn contains_key(&self, key: &str) -> bool {
        let now = Instant::now();
        self.data
            .read()
            .get(key)
            .is_some_and(|entry| !entry.is_expired(now))
    }

    /// Remaining lifetime of a key. `None` if the key is missing or has no
    /// expiry.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        self.data
            .read()
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .and_then(|entry| entry.expires_at)
            .map(|at| at.saturating_duration_since(now))
    }

    /// Drops every expired entry and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut data = self.data.write();
        let before = data.len();
        data.retain(|_, entry| !entry.is_expired(now));
        before - data.len()
    }

    pub fn clear(&self) {
        self.data.write().clear();
    }

    fn live<'a>(data: &'a Data, key: &str, now: Instant) -> Option<&'a Entry> {
        data.get(key).filter(|entry| !entry.is_expired(now))
    }

    fn read_bytes(data: &Data, key: &str, now: Instant) -> KvResult<Option<Vec<u8>>> {
        match Self::live(data, key, now) {
            None => Ok(None),
            Some(Entry {
                value: Value::Bytes(bytes),
                ..
            }) => Ok(Some(bytes.clone())),
            Some(_) => Err(KvError::wrong_type(key)),
        }
    }
}

/// Applies batch operations while recording the prior state of every touched
/// key, so a failing batch can be rolled back.
struct BatchWriter<'a> {
    data: &'a mut Data,
    undo: Vec<(String, Option<Entry>)>,
    now: Instant,
}

impl<'a> BatchWriter<'a> {
    fn new(data: &'a mut Data) -> Self {
        Self {
            data,
            undo: Vec::new(),
            now: Instant::now(),
        }
    }

    fn touch(&mut self, key: &str) {
        if !self.undo.iter().any(|(k, _)| k == key) {
            self.undo.push((key.to_string(), self.data.get(key).cloned()));
        }
        if self.data.get(key).is_some_and(|e| e.is_expired(self.now)) {
            self.data.remove(key);
        }
    }

    fn apply(&mut self, op: BatchOp) -> KvResult<()> {
        match op {
            BatchOp::Set { key, value, ttl } => {
                self.touch(&key);
                self.data.insert(
                    key,
                    Entry {
                        value: Value::Bytes(value),
                        expires_at: Some(self.now + ttl),
                    },
                );
            }
            BatchOp::Delete { keys } => {
                for key in keys {
                    self.touch(&key);
                    self.data.remove(&key);
                }
            }
            BatchOp::AddMember { key, member } => {
                self.touch(&key);
                let entry = self.data.entry(key.clone()).or_insert_with(|| Entry {
                    value: Value::Set(HashSet::new()),
                    expires_at: None,
                });
                match &mut entry.value {
                    Value::Set(set) => {
                        set.insert(member);
                    }
                    Value::Bytes(_) => return Err(KvError::wrong_type(key)),
                }
            }
            BatchOp::RemoveMembers { key, members } => {
                self.touch(&key);
                let now_empty = match self.data.get_mut(&key).map(|entry| &mut entry.value) {
                    None => false,
                    Some(Value::Set(set)) => {
                        for member in &members {
                            set.remove(member);
                        }
                        set.is_empty()
                    }
                    Some(Value::Bytes(_)) => return Err(KvError::wrong_type(key)),
                };
                if now_empty {
                    self.data.remove(&key);
                }
            }
            BatchOp::Expire { key, ttl } => {
                self.touch(&key);
                if let Some(entry) = self.data.get_mut(&key) {
                    entry.expires_at = Some(self.now + ttl);
                }
            }
        }
        Ok(())
    }

    fn rollback(self) {
        for (key, previous) in self.undo.into_iter().rev() {
            match previous {
                Some(entry) => {
                    self.data.insert(key, entry);
                }
                None => {
                    self.data.remove(&key);
                }
            }
        }
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKvStore {
    async fn get(&self, key: &str) -> KvResult<Option<Vec<u8>>> {
        let data = self.data.read();
        Self::read_bytes(&data, key, Instant::now())
    }

    async fn get_many(&self, keys: &[String]) -> KvResult<Vec<Option<Vec<u8>>>> {
        let now = Instant::now();
        let data = self.data.read();
        // MGET reads a non-string key as nil instead of failing.
        Ok(keys
            .iter()
            .map(|key| Self::read_bytes(&data, key, now).ok().flatten())
            .collect())
    }

    async fn members(&self, key: &str) -> KvResult<Vec<String>> {
        let data = self.data.read();
        match Self::live(&data, key, Instant::now()) {
            None => Ok(Vec::new()),
            Some(Entry {
                value: Value::Set(set),
                ..
            }) => Ok(set.iter().cloned().collect()),
            Some(_) => Err(KvError::wrong_type(key)),
        }
    }

    async fn remove_members(&self, key: &str, members: &[String]) -> KvResult<()> {
        let mut batch = WriteBatch::new();
        batch.remove_members(key, members.to_vec());
        self.execute(batch).await
    }

    async fn execute(&self, batch: WriteBatch) -> KvResult<()> {
        let mut data = self.data.write();
        let mut writer = BatchWriter::new(&mut data);
        for op in batch.into_ops() {
            if let Err(e) = writer.apply(op) {
                writer.rollback();
                return Err(e);
            }
        }
        Ok(())
    }

    async fn ping(&self) -> KvResult<()> {
        Ok(())
    }
}
