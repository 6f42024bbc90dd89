//! Dispatch payloads sent by CI to trigger a generation run

use anyhow::{Context, Result};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::path::Path;

type HmacSha256 = Hmac<Sha256>;

/// Payload describing which repository changed and where
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchPayload {
    pub repo_name: Option<String>,
    pub commit_sha: Option<String>,
    pub branch: Option<String>,
    /// Paths relative to the source repository root
    pub changed_files: Vec<String>,
}

impl DispatchPayload {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read payload: {:?}", path))?;
        serde_json::from_str(&content).with_context(|| format!("Failed to parse payload: {:?}", path))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("no dispatch signature provided")]
    MissingSignature,
    #[error("no dispatch secret configured")]
    MissingSecret,
    #[error("signature is not valid hex")]
    MalformedSignature,
    #[error("invalid dispatch payload signature")]
    Mismatch,
}

/// Verify a hex HMAC-SHA256 `signature` of `payload` under `secret`
pub fn verify_signature(payload: &[u8], secret: &str, signature: &str) -> Result<(), DispatchError> {
    let expected = hex::decode(signature.trim()).map_err(|_| DispatchError::MalformedSignature)?;

    // HMAC accepts keys of any length
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| DispatchError::Mismatch)?;
    mac.update(payload);
    mac.verify_slice(&expected).map_err(|_| DispatchError::Mismatch)
}
