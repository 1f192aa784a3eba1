//! Idempotency keys used to deduplicate job submissions.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::{ModelError, ModelResult, ProcessingOptions};

/// Maximum accepted key length.
pub const MAX_KEY_LEN: usize = 256;

/// Caller-supplied or derived job identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Validate a caller-supplied key: non-empty, bounded, no control characters.
    pub fn new(key: impl Into<String>) -> ModelResult<Self> {
        let key = key.into();
        if key.is_empty() {
            return Err(ModelError::invalid_key("key is empty"));
        }
        if key.len() > MAX_KEY_LEN {
            return Err(ModelError::invalid_key(format!(
                "key exceeds {} bytes",
                MAX_KEY_LEN
            )));
        }
        if key.chars().any(char::is_control) {
            return Err(ModelError::invalid_key("key contains control characters"));
        }
        Ok(Self(key))
    }

    /// Derive a key from the input identity and the options.
    ///
    /// Format: `<sha256(input)>:<sha256(options json)>`. The input identity is
    /// whatever the caller uses to name the source (a content hash when the
    /// bytes are available, otherwise the path or URL).
    pub fn derive(input_identity: &str, options: &ProcessingOptions) -> Self {
        // ProcessingOptions serialization cannot fail: no maps with non-string keys.
        let options_json = serde_json::to_string(options).unwrap_or_default();
        Self(format!(
            "{}:{}",
            sha256_hex(input_identity.as_bytes()),
            sha256_hex(options_json.as_bytes())
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lowercase hex SHA-256 digest.
pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}
