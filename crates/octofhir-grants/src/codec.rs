//! Grant payload encoding.
//!
//! Grants are stored as opaque bytes. JSON is the default; MessagePack is
//! available for deployments that prefer compact payloads.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{GrantError, GrantResult};
use crate::types::Grant;

/// Encodes and decodes grant records.
pub trait GrantCodec: Send + Sync {
    /// Encodes a grant into its storage payload.
    ///
    /// # Errors
    ///
    /// Returns [`GrantError::Serialization`] if the payload cannot be
    /// represented in the target format.
    fn encode(&self, grant: &Grant) -> GrantResult<Vec<u8>>;

    /// Decodes a storage payload into a grant.
    ///
    /// # Errors
    ///
    /// Returns [`GrantError::Deserialization`] if the bytes are not a valid
    /// grant encoding.
    fn decode(&self, bytes: &[u8]) -> GrantResult<Grant>;
}

/// JSON codec (`serde_json`).
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl GrantCodec for JsonCodec {
    fn encode(&self, grant: &Grant) -> GrantResult<Vec<u8>> {
        serde_json::to_vec(grant).map_err(|e| GrantError::serialization(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> GrantResult<Grant> {
        serde_json::from_slice(bytes).map_err(|e| GrantError::deserialization(e.to_string()))
    }
}

/// MessagePack codec (`rmp-serde`), fields encoded by name.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessagePackCodec;

impl GrantCodec for MessagePackCodec {
    fn encode(&self, grant: &Grant) -> GrantResult<Vec<u8>> {
        rmp_serde::to_vec_named(grant).map_err(|e| GrantError::serialization(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> GrantResult<Grant> {
        rmp_serde::from_slice(bytes).map_err(|e| GrantError::deserialization(e.to_string()))
    }
}

/// Payload format selectable from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecFormat {
    /// [`JsonCodec`]
    #[default]
    Json,
    /// [`MessagePackCodec`]
    MessagePack,
}

impl CodecFormat {
    /// Builds the codec for this format.
    #[must_use]
    pub fn codec(self) -> Arc<dyn GrantCodec> {
        match self {
            Self::Json => Arc::new(JsonCodec),
            Self::MessagePack => Arc::new(MessagePackCodec),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GrantType;
    use serde_json::json;
    use time::Duration;

    fn sample_grant() -> Grant {
        Grant::new("k1", "c1", GrantType::RefreshToken, Duration::hours(1))
            .with_subject("u1")
            .with_payload(json!({
                "scope": "openid offline_access",
                "claims": {"amr": ["pwd", "otp"]},
                "launch": null
            }))
    }

    #[test]
    fn test_json_codec_preserves_grant() {
        let grant = sample_grant();
        let bytes = JsonCodec.encode(&grant).unwrap();
        assert_eq!(JsonCodec.decode(&bytes).unwrap(), grant);
    }

    #[test]
    fn test_msgpack_codec_preserves_grant() {
        let grant = sample_grant();
        let bytes = MessagePackCodec.encode(&grant).unwrap();
        assert_eq!(MessagePackCodec.decode(&bytes).unwrap(), grant);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = JsonCodec.decode(b"not a grant").unwrap_err();
        assert!(matches!(err, GrantError::Deserialization { .. }));

        let err = JsonCodec.decode(br#"{"key":"k1"}"#).unwrap_err();
        assert!(matches!(err, GrantError::Deserialization { .. }));

        let err = MessagePackCodec.decode(&[0xc1, 0x00]).unwrap_err();
        assert!(matches!(err, GrantError::Deserialization { .. }));
    }

    #[test]
    fn test_codec_format_from_config_value() {
        let format: CodecFormat = serde_json::from_value(json!("messagepack")).unwrap();
        assert_eq!(format, CodecFormat::MessagePack);
        assert_eq!(CodecFormat::default(), CodecFormat::Json);

        let grant = sample_grant();
        let codec = CodecFormat::MessagePack.codec();
        let bytes = codec.encode(&grant).unwrap();
        assert_eq!(codec.decode(&bytes).unwrap(), grant);
    }
}
