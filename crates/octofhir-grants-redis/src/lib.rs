//! Redis storage backend for octofhir-grants
//!
//! Provides [`RedisKvStore`], a [`KeyValueStore`](octofhir_grants::KeyValueStore)
//! on a `deadpool-redis` pool, so grants are shared across server instances
//! and expire through Redis TTLs.
//!
//! # Example
//!
//! ```ignore
//! use octofhir_grants::GrantStore;
//! use octofhir_grants_redis::{RedisConfig, create_grant_backend};
//!
//! let backend = create_grant_backend(&RedisConfig {
//!     enabled: true,
//!     ..RedisConfig::default()
//! })
//! .await;
//! let grants = GrantStore::new(backend);
//! ```

pub mod backend;
pub mod config;

pub use backend::{GrantBackend, RedisKvStore, create_grant_backend};
pub use config::RedisConfig;
