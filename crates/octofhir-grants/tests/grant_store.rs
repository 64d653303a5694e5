//! End-to-end behavior of the grant store over the in-memory backend, plus
//! the failure policy against a backend that rejects every command.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use octofhir_grants::{
    Grant, GrantError, GrantStore, GrantType, InMemoryKvStore, KeyValueStore, KvError, KvResult,
    WriteBatch,
};
use serde_json::json;
use tokio_test::assert_ok;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("octofhir_grants=debug")
        .try_init();
}

fn refresh_token(key: &str, subject: &str, client: &str) -> Grant {
    Grant::new(key, client, GrantType::RefreshToken, time::Duration::seconds(3600))
        .with_subject(subject)
        .with_payload(json!({"scope": "openid offline_access patient/*.read"}))
}

fn sorted_keys(grants: Vec<Grant>) -> Vec<String> {
    let mut keys: Vec<String> = grants.into_iter().map(|g| g.key).collect();
    keys.sort();
    keys
}

#[tokio::test]
async fn test_store_get_get_all_remove_all_scenario() {
    init_tracing();
    let store = GrantStore::new(InMemoryKvStore::new());
    let grant = refresh_token("k1", "u1", "c1");

    assert_ok!(store.store(&grant).await);

    let loaded = assert_ok!(store.get("k1").await).expect("grant stored");
    assert_eq!(loaded.key, "k1");
    assert_eq!(loaded.subject_id.as_deref(), Some("u1"));
    assert_eq!(loaded.client_id, "c1");
    assert_eq!(loaded.grant_type, GrantType::RefreshToken);
    assert_eq!(loaded, grant);

    assert_eq!(sorted_keys(store.get_all("u1").await.unwrap()), vec!["k1"]);

    let outcome = store.remove_all("u1", "c1").await.unwrap();
    assert!(outcome.is_applied());

    assert_eq!(store.get("k1").await.unwrap(), None);
    assert!(store.get_all("u1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_remove_all_for_one_client_keeps_other_clients() {
    let store = GrantStore::new(InMemoryKvStore::new());
    store.store(&refresh_token("a1", "u1", "client-a")).await.unwrap();
    store.store(&refresh_token("b1", "u1", "client-b")).await.unwrap();

    store.remove_all("u1", "client-a").await.unwrap();

    assert_eq!(sorted_keys(store.get_all("u1").await.unwrap()), vec!["b1"]);
    assert!(store.get("b1").await.unwrap().is_some());
}

#[tokio::test]
async fn test_grant_without_subject_creates_no_index() {
    let backend = InMemoryKvStore::new();
    let store = GrantStore::new(backend.clone());
    let code = Grant::new(
        "code-1",
        "c1",
        GrantType::AuthorizationCode,
        time::Duration::minutes(10),
    );

    store.store(&code).await.unwrap();

    assert_eq!(backend.len(), 1);
    assert!(backend.contains_key("code-1"));
    assert_eq!(store.get("code-1").await.unwrap(), Some(code));
}

#[tokio::test]
async fn test_lazy_pruning_after_independent_expiry() {
    init_tracing();
    let backend = InMemoryKvStore::new();
    let store = GrantStore::new(backend.clone());

    let short = Grant::new(
        "short",
        "c1",
        GrantType::AuthorizationCode,
        time::Duration::milliseconds(50),
    )
    .with_subject("u1");
    store.store(&short).await.unwrap();
    store.store(&refresh_token("long", "u1", "c1")).await.unwrap();

    tokio::time::sleep(Duration::from_millis(120)).await;

    // The subject index has no TTL and still names the expired grant.
    let mut members = backend.members("idx:u1").await.unwrap();
    members.sort();
    assert_eq!(members, vec!["long", "short"]);

    assert_eq!(sorted_keys(store.get_all("u1").await.unwrap()), vec!["long"]);
    assert_eq!(backend.members("idx:u1").await.unwrap(), vec!["long"]);
}

#[tokio::test]
async fn test_remove_twice_is_a_no_op() {
    let backend = InMemoryKvStore::new();
    let store = GrantStore::new(backend.clone());
    store.store(&refresh_token("k1", "u1", "c1")).await.unwrap();
    store.store(&refresh_token("k2", "u1", "c1")).await.unwrap();

    assert!(store.remove("k1").await.unwrap().is_applied());
    let live_keys = backend.len();

    let second = store.remove("k1").await.unwrap();
    assert!(second.is_not_found());
    assert_eq!(backend.len(), live_keys);
    assert_eq!(sorted_keys(store.get_all("u1").await.unwrap()), vec!["k2"]);
}

#[tokio::test]
async fn test_concurrent_stores_for_one_subject() {
    let store = Arc::new(GrantStore::new(InMemoryKvStore::new()));

    let handles: Vec<_> = (0..32)
        .map(|i| {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                let grant = refresh_token(&format!("k{i}"), "u1", &format!("c{}", i % 4));
                store.store(&grant).await.unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(store.get_all("u1").await.unwrap().len(), 32);
    assert_eq!(store.get_all_for_client("u1", "c0").await.unwrap().len(), 8);
}

// =============================================================================
// Failure policy
// =============================================================================

/// Backend that forwards to memory until switched into failure mode.
#[derive(Clone, Default)]
struct FlakyKvStore {
    inner: InMemoryKvStore,
    failing: Arc<AtomicBool>,
}

impl FlakyKvStore {
    fn fail(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    fn check(&self) -> KvResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(KvError::connection("connection refused"));
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FlakyKvStore {
    async fn get(&self, key: &str) -> KvResult<Option<Vec<u8>>> {
        self.check()?;
        self.inner.get(key).await
    }

    async fn get_many(&self, keys: &[String]) -> KvResult<Vec<Option<Vec<u8>>>> {
        self.check()?;
        self.inner.get_many(keys).await
    }

    async fn members(&self, key: &str) -> KvResult<Vec<String>> {
        self.check()?;
        self.inner.members(key).await
    }

    async fn remove_members(&self, key: &str, members: &[String]) -> KvResult<()> {
        self.check()?;
        self.inner.remove_members(key, members).await
    }

    async fn execute(&self, batch: WriteBatch) -> KvResult<()> {
        self.check()?;
        self.inner.execute(batch).await
    }

    async fn ping(&self) -> KvResult<()> {
        self.check()
    }
}

#[tokio::test]
async fn test_backend_failures_do_not_propagate_from_writes() {
    init_tracing();
    let backend = FlakyKvStore::default();
    let store = GrantStore::new(backend.clone());
    store.store(&refresh_token("k1", "u1", "c1")).await.unwrap();

    backend.fail();

    let outcome = store.store(&refresh_token("k2", "u1", "c1")).await.unwrap();
    assert!(outcome.is_failed());
    assert!(outcome.error().is_some_and(KvError::is_transient));

    assert!(store.remove("k1").await.unwrap().is_failed());
    assert!(store.remove_all("u1", "c1").await.unwrap().is_failed());
    assert!(
        store
            .remove_all_of_type("u1", "c1", &GrantType::RefreshToken)
            .await
            .unwrap()
            .is_failed()
    );

    // Nothing was written while the backend was down.
    assert!(backend.inner.contains_key("k1"));
    assert!(!backend.inner.contains_key("k2"));
}

#[tokio::test]
async fn test_backend_failures_surface_on_reads() {
    let backend = FlakyKvStore::default();
    let store = GrantStore::new(backend.clone());
    backend.fail();

    assert!(matches!(store.get("k1").await, Err(GrantError::Store(_))));
    assert!(matches!(store.get_all("u1").await, Err(GrantError::Store(_))));
    assert!(store.health_check().await.is_err());
}

#[tokio::test]
async fn test_validation_errors_still_fail_fast_when_backend_is_down() {
    let backend = FlakyKvStore::default();
    let store = GrantStore::new(backend.clone());
    backend.fail();

    let err = store.remove("").await.unwrap_err();
    assert!(err.is_validation());
    let err = store
        .remove_all_of_type("", "c1", &GrantType::RefreshToken)
        .await
        .unwrap_err();
    assert!(err.is_validation());
}
