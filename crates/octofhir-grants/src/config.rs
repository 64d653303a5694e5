//! Grant store configuration.
//!
//! # Example (TOML)
//!
//! ```toml
//! [grants]
//! key_prefix = "octofhir:grants:"
//! codec = "messagepack"
//! ```

use serde::{Deserialize, Serialize};

use crate::codec::CodecFormat;
use crate::error::{GrantError, GrantResult};
use crate::keys::GrantKeys;

/// Grant store configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct GrantStoreConfig {
    /// Namespace prepended to every key written by the store.
    /// Empty by default, which stores grants under their own key.
    pub key_prefix: String,

    /// Payload encoding.
    pub codec: CodecFormat,
}

impl GrantStoreConfig {
    /// Parses the configuration from a TOML document. The settings may sit at
    /// the top level or under a `[grants]` table.
    pub fn from_toml_str(input: &str) -> GrantResult<Self> {
        #[derive(Deserialize)]
        struct Document {
            grants: Option<GrantStoreConfig>,
            #[serde(flatten)]
            top_level: GrantStoreConfig,
        }

        let document: Document =
            toml::from_str(input).map_err(|e| GrantError::configuration(e.to_string()))?;
        let config = document.grants.unwrap_or(document.top_level);
        config.validate()?;
        Ok(config)
    }

    /// Checks the configuration for values the key scheme cannot use.
    pub fn validate(&self) -> GrantResult<()> {
        if self.key_prefix.chars().any(char::is_whitespace) {
            return Err(GrantError::configuration(
                "key_prefix must not contain whitespace",
            ));
        }
        Ok(())
    }

    pub fn keys(&self) -> GrantKeys {
        GrantKeys::new(self.key_prefix.clone())
    }
}
