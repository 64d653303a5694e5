//! Index-consistent grant store.
//!
//! Keeps each grant record and its three index sets coherent on top of a
//! [`KeyValueStore`]. Every mutation is submitted as one atomic batch.
//!
//! ## Consistency
//!
//! Grant records and index sets expire independently, so an index may name
//! grants that no longer exist. Index membership is never treated as proof of
//! existence: reads through an index verify every member against its primary
//! record and prune the stale ones ("lazy pruning"). There is no sweeper.
//!
//! ## Failure Policy
//!
//! - Empty identifiers are caller bugs and fail fast with
//!   [`GrantError::Validation`].
//! - Backend failures on `store`/`remove`/`remove_all*` are logged, counted
//!   and returned as [`Outcome::Failed`], never as `Err`.
//! - Undecodable payloads read as "not found".

use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use tracing::{debug, info, instrument, warn};

use crate::codec::{GrantCodec, JsonCodec};
use crate::config::GrantStoreConfig;
use crate::error::{GrantError, GrantResult};
use crate::index::{GrantIndex, IndexLevel};
use crate::keys::GrantKeys;
use crate::kv::{KeyValueStore, WriteBatch};
use crate::metrics;
use crate::outcome::Outcome;
use crate::types::{Grant, GrantType};

/// Smallest expiry the backends accept. Grants that are already expired are
/// written with it and vanish immediately.
const MIN_TTL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy)]
enum Operation {
    Store,
    Remove,
    RemoveAll(IndexLevel),
}

impl Operation {
    fn name(self) -> &'static str {
        match self {
            Self::Store => "store",
            Self::Remove => "remove",
            Self::RemoveAll(IndexLevel::Subject) => "remove_all_subject",
            Self::RemoveAll(IndexLevel::SubjectClient) => "remove_all_subject_client",
            Self::RemoveAll(IndexLevel::SubjectClientType) => "remove_all_subject_client_type",
        }
    }
}

/// Grant persistence with subject, client and type indexes.
#[derive(Clone)]
pub struct GrantStore<S> {
    backend: S,
    keys: GrantKeys,
    codec: Arc<dyn GrantCodec>,
}

impl<S> std::fmt::Debug for GrantStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrantStore")
            .field("keys", &self.keys)
            .finish_non_exhaustive()
    }
}

impl<S: KeyValueStore> GrantStore<S> {
    /// Creates a store with unprefixed keys and JSON payloads.
    pub fn new(backend: S) -> Self {
        Self {
            backend,
            keys: GrantKeys::default(),
            codec: Arc::new(JsonCodec),
        }
    }

    /// Creates a store from configuration.
    pub fn with_config(backend: S, config: &GrantStoreConfig) -> GrantResult<Self> {
        config.validate()?;
        Ok(Self {
            backend,
            keys: config.keys(),
            codec: config.codec.codec(),
        })
    }

    /// Replaces the payload codec.
    #[must_use]
    pub fn with_codec(mut self, codec: impl GrantCodec + 'static) -> Self {
        self.codec = Arc::new(codec);
        self
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    pub fn keys(&self) -> &GrantKeys {
        &self.keys
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Persists a grant and indexes it under its subject, client and type.
    ///
    /// Grants without a subject are written without any index update. The
    /// subject+client+type index expiry is refreshed to this grant's
    /// lifetime; the coarser indexes never expire on their own.
    ///
    /// # Errors
    ///
    /// Returns [`GrantError::Validation`] for an empty key or client and
    /// [`GrantError::Serialization`] if the payload cannot be encoded.
    /// Backend failures are reported as [`Outcome::Failed`].
    #[instrument(skip(self, grant), fields(key = %grant.key, grant_type = %grant.grant_type))]
    pub async fn store(&self, grant: &Grant) -> GrantResult<Outcome> {
        require("grant key", &grant.key)?;
        require("client id", &grant.client_id)?;

        let ttl = grant.ttl(OffsetDateTime::now_utc()).max(MIN_TTL);
        let payload = self.codec.encode(grant)?;
        let primary = self.keys.primary(&grant.key);

        let mut batch = WriteBatch::new();
        batch.set(primary.clone(), payload, ttl);
        for index in GrantIndex::for_grant(grant) {
            let index_key = index.key(&self.keys);
            batch.add_member(index_key.clone(), primary.clone());
            if index.level().carries_ttl() {
                batch.expire(index_key, ttl);
            }
        }

        let outcome = match self.backend.execute(batch).await {
            Ok(()) => Outcome::applied(1),
            Err(e) => Outcome::Failed(e),
        };
        Ok(self.observe(Operation::Store, outcome))
    }

    /// Deletes a grant and removes it from its index sets.
    ///
    /// Removing a grant that no longer exists is a no-op reported as
    /// [`Outcome::NotFound`]. A record whose payload cannot be decoded is
    /// still deleted; its index entries are left for lazy pruning since the
    /// subject, client and type are unknown.
    #[instrument(skip(self))]
    pub async fn remove(&self, key: &str) -> GrantResult<Outcome> {
        require("grant key", key)?;

        let primary = self.keys.primary(key);
        let outcome = match self.backend.get(&primary).await {
            Ok(Some(bytes)) => {
                let mut batch = WriteBatch::new();
                batch.delete(vec![primary.clone()]);
                match self.codec.decode(&bytes) {
                    Ok(grant) => {
                        for index in GrantIndex::for_grant(&grant) {
                            batch.remove_members(index.key(&self.keys), vec![primary.clone()]);
                        }
                    }
                    Err(e) => {
                        warn!(
                            key = %key,
                            category = %e.category(),
                            error = %e,
                            "Removing undecodable grant without index cleanup"
                        );
                    }
                }
                match self.backend.execute(batch).await {
                    Ok(()) => Outcome::applied(1),
                    Err(e) => Outcome::Failed(e),
                }
            }
            Ok(None) => Outcome::NotFound,
            Err(e) => Outcome::Failed(e),
        };
        Ok(self.observe(Operation::Remove, outcome))
    }

    /// Deletes every grant a subject holds for a client.
    ///
    /// The matching keys are also removed from the subject index. The
    /// per-type indexes under this subject and client are left alone; they
    /// expire on their own or are pruned by later reads.
    #[instrument(skip(self))]
    pub async fn remove_all(&self, subject_id: &str, client_id: &str) -> GrantResult<Outcome> {
        require("subject id", subject_id)?;
        require("client id", client_id)?;
        self.remove_index(GrantIndex::SubjectClient {
            subject_id,
            client_id,
        })
        .await
    }

    /// Deletes every grant of one type a subject holds for a client, and
    /// removes the keys from both the subject+client and subject indexes.
    #[instrument(skip(self), fields(grant_type = %grant_type))]
    pub async fn remove_all_of_type(
        &self,
        subject_id: &str,
        client_id: &str,
        grant_type: &GrantType,
    ) -> GrantResult<Outcome> {
        require("subject id", subject_id)?;
        require("client id", client_id)?;
        require("grant type", grant_type.as_str())?;
        self.remove_index(GrantIndex::SubjectClientType {
            subject_id,
            client_id,
            grant_type,
        })
        .await
    }

    /// Deletes every grant a subject holds across all clients.
    ///
    /// Only the subject index itself is dropped; the finer indexes expire or
    /// are pruned lazily.
    #[instrument(skip(self))]
    pub async fn remove_all_for_subject(&self, subject_id: &str) -> GrantResult<Outcome> {
        require("subject id", subject_id)?;
        self.remove_index(GrantIndex::Subject { subject_id }).await
    }

    /// Bulk deletion shared by the `remove_all*` operations: deletes every
    /// member grant and the index set itself, then removes the members from
    /// each coarser index in one atomic batch.
    ///
    /// The applied count is the number of index members deleted. Members
    /// whose record had already expired are included.
    async fn remove_index(&self, index: GrantIndex<'_>) -> GrantResult<Outcome> {
        let index_key = index.key(&self.keys);
        let outcome = match self.backend.members(&index_key).await {
            Ok(members) if members.is_empty() => Outcome::NotFound,
            Ok(members) => {
                let count = members.len();
                let mut doomed = members.clone();
                doomed.push(index_key);

                let mut batch = WriteBatch::new();
                batch.delete(doomed);
                for coarser in index.coarser() {
                    batch.remove_members(coarser.key(&self.keys), members.clone());
                }
                match self.backend.execute(batch).await {
                    Ok(()) => Outcome::applied(count),
                    Err(e) => Outcome::Failed(e),
                }
            }
            Err(e) => Outcome::Failed(e),
        };
        Ok(self.observe(Operation::RemoveAll(index.level()), outcome))
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Reads a grant by key. Missing, expired and undecodable records all
    /// read as `None`.
    ///
    /// # Errors
    ///
    /// Returns [`GrantError::Validation`] for an empty key and
    /// [`GrantError::Store`] if the backend read fails.
    #[instrument(skip(self))]
    pub async fn get(&self, key: &str) -> GrantResult<Option<Grant>> {
        require("grant key", key)?;

        let primary = self.keys.primary(key);
        let bytes = self.backend.get(&primary).await?;
        let grant = bytes.and_then(|bytes| self.decode_or_discard(&primary, &bytes));

        metrics::record_lookup(grant.is_some());
        if grant.is_some() {
            debug!(key = %key, "grant hit");
        } else {
            debug!(key = %key, "grant miss");
        }
        Ok(grant)
    }

    /// Reads every live grant of a subject, in no particular order.
    ///
    /// Index members whose grant has expired are removed from the subject
    /// index as a side effect.
    #[instrument(skip(self))]
    pub async fn get_all(&self, subject_id: &str) -> GrantResult<Vec<Grant>> {
        require("subject id", subject_id)?;
        self.load_index(GrantIndex::Subject { subject_id }).await
    }

    /// Reads every live grant a subject holds for a client, pruning the
    /// subject+client index.
    #[instrument(skip(self))]
    pub async fn get_all_for_client(
        &self,
        subject_id: &str,
        client_id: &str,
    ) -> GrantResult<Vec<Grant>> {
        require("subject id", subject_id)?;
        require("client id", client_id)?;
        self.load_index(GrantIndex::SubjectClient {
            subject_id,
            client_id,
        })
        .await
    }

    /// Reads every live grant of one type a subject holds for a client,
    /// pruning the subject+client+type index.
    #[instrument(skip(self), fields(grant_type = %grant_type))]
    pub async fn get_all_for_type(
        &self,
        subject_id: &str,
        client_id: &str,
        grant_type: &GrantType,
    ) -> GrantResult<Vec<Grant>> {
        require("subject id", subject_id)?;
        require("client id", client_id)?;
        require("grant type", grant_type.as_str())?;
        self.load_index(GrantIndex::SubjectClientType {
            subject_id,
            client_id,
            grant_type,
        })
        .await
    }

    async fn load_index(&self, index: GrantIndex<'_>) -> GrantResult<Vec<Grant>> {
        let index_key = index.key(&self.keys);
        let members = self.backend.members(&index_key).await?;
        if members.is_empty() {
            return Ok(Vec::new());
        }

        let values = self.backend.get_many(&members).await?;
        let mut grants = Vec::with_capacity(members.len());
        let mut stale = Vec::new();
        for (member, value) in members.into_iter().zip(values) {
            match value.and_then(|bytes| self.decode_or_discard(&member, &bytes)) {
                Some(grant) => grants.push(grant),
                None => stale.push(member),
            }
        }

        if !stale.is_empty() {
            self.prune(&index_key, index.level(), stale).await;
        }
        Ok(grants)
    }

    /// Best-effort removal of stale index members. Failures are logged only;
    /// the next read retries.
    async fn prune(&self, index_key: &str, level: IndexLevel, stale: Vec<String>) {
        let count = stale.len();
        match self.backend.remove_members(index_key, &stale).await {
            Ok(()) => {
                metrics::record_pruned(level.as_str(), count);
                debug!(index = %index_key, pruned = count, "pruned stale index members");
            }
            Err(e) => {
                warn!(index = %index_key, error = %e, "Failed to prune stale index members");
            }
        }
    }

    /// Checks that the backing store is reachable.
    pub async fn health_check(&self) -> GrantResult<()> {
        self.backend.ping().await.map_err(GrantError::from)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Decodes a stored payload. Undecodable payloads and grants past their
    /// `expires_at` read as absent.
    fn decode_or_discard(&self, primary: &str, bytes: &[u8]) -> Option<Grant> {
        let key = self.keys.grant_key(primary);
        match self.codec.decode(bytes) {
            Ok(grant) if grant.is_expired() => {
                debug!(key = %key, "grant past expiry");
                None
            }
            Ok(grant) => Some(grant),
            Err(e) => {
                warn!(
                    key = %key,
                    category = %e.category(),
                    error = %e,
                    "Discarding undecodable grant payload"
                );
                None
            }
        }
    }

    fn observe(&self, operation: Operation, outcome: Outcome) -> Outcome {
        metrics::record_operation(operation.name(), outcome.label());
        match (&outcome, operation) {
            (Outcome::Applied { grants }, _) => {
                debug!(operation = operation.name(), grants, "grant write applied");
            }
            (Outcome::NotFound, _) => {
                debug!(operation = operation.name(), "no matching grants");
            }
            (Outcome::Failed(e), Operation::Store) => {
                warn!(operation = operation.name(), error = %e, "Failed to store grant");
            }
            (Outcome::Failed(e), _) => {
                info!(operation = operation.name(), error = %e, "Failed to remove grants");
            }
        }
        outcome
    }
}

fn require(field: &str, value: &str) -> GrantResult<()> {
    if value.is_empty() {
        return Err(GrantError::validation(format!("{field} must not be empty")));
    }
    Ok(())
}
