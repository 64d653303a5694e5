//! # octofhir-grants
//!
//! Persistence for short-lived OAuth artifacts ("grants"): refresh tokens,
//! authorization codes, consent records and device codes.
//!
//! Each grant lives under its own key and expires through the backing
//! store's TTL. Grants with a subject are also indexed by subject, by
//! subject+client and by subject+client+type, so they can be listed and
//! revoked in bulk along any of those dimensions.
//!
//! ## Modules
//!
//! - [`store`] - Index-consistent grant store (the public entry point)
//! - [`kv`] - Key-value capability the store runs on
//! - [`memory`] - In-memory backend
//! - [`index`] - Index levels and deletion fan-out
//! - [`keys`] - Storage key derivation
//! - [`codec`] - Payload encoding
//! - [`config`] - Store configuration
//!
//! Redis support lives in the `octofhir-grants-redis` crate.
//!
//! ## Example
//!
//! ```
//! use octofhir_grants::{Grant, GrantStore, GrantType, InMemoryKvStore};
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let store = GrantStore::new(InMemoryKvStore::new());
//!
//! let grant = Grant::new("k1", "c1", GrantType::RefreshToken, time::Duration::hours(1))
//!     .with_subject("u1");
//! store.store(&grant).await.unwrap();
//!
//! assert_eq!(store.get("k1").await.unwrap(), Some(grant));
//! assert_eq!(store.get_all("u1").await.unwrap().len(), 1);
//!
//! store.remove_all("u1", "c1").await.unwrap();
//! assert!(store.get_all("u1").await.unwrap().is_empty());
//! # });
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod index;
pub mod keys;
pub mod kv;
pub mod memory;
pub mod metrics;
pub mod outcome;
pub mod store;
pub mod types;

pub use codec::{CodecFormat, GrantCodec, JsonCodec, MessagePackCodec};
pub use config::GrantStoreConfig;
pub use error::{ErrorCategory, GrantError, GrantResult, KvError};
pub use index::{GrantIndex, IndexLevel};
pub use keys::GrantKeys;
pub use kv::{BatchOp, KeyValueStore, KvResult, WriteBatch};
pub use memory::InMemoryKvStore;
pub use outcome::Outcome;
pub use store::GrantStore;
pub use types::{Grant, GrantType};
