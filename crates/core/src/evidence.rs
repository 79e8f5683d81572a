//! Evidence photo keys and time-limited read URL signing.
//!
//! Photos are uploaded to object storage outside this system; jobs only
//! record the storage key. Read URLs are HMAC-SHA256 signed over the key
//! and an expiry timestamp so the storage gateway can verify them without a
//! database round trip.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

/// Maximum length of a storage key.
const MAX_KEY_LEN: usize = 512;

/// Maximum number of photos attached in one request.
pub const MAX_PHOTOS_PER_REQUEST: usize = 20;

text_enum! {
    /// What a photo documents.
    PhotoType {
        Scope => "scope",
        Before => "before",
        After => "after",
        Flag => "flag",
        Mismatch => "mismatch",
        Parts => "parts",
    }
}

/// Prefix every storage key for `job_id` must start with.
pub fn job_key_prefix(job_id: DbId) -> String {
    format!("jobs/{job_id}/")
}

/// Validate a storage key supplied for `job_id`.
///
/// Rules:
/// - Must start with `jobs/{job_id}/` and have something after the prefix.
/// - Must not exceed `MAX_KEY_LEN` characters.
/// - Must not contain `..` path segments or whitespace.
pub fn validate_storage_key(job_id: DbId, key: &str) -> Result<(), CoreError> {
    let prefix = job_key_prefix(job_id);
    if !key.starts_with(&prefix) || key.len() == prefix.len() {
        return Err(CoreError::Validation(format!(
            "Storage key must start with '{prefix}'"
        )));
    }
    if key.len() > MAX_KEY_LEN {
        return Err(CoreError::Validation(format!(
            "Storage key must not exceed {MAX_KEY_LEN} characters"
        )));
    }
    if key.split('/').any(|seg| seg == "..") || key.chars().any(char::is_whitespace) {
        return Err(CoreError::Validation(
            "Storage key contains illegal path segments".to_string(),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Signing
// ---------------------------------------------------------------------------

type HmacSha256 = Hmac<Sha256>;

fn signature(secret: &str, key: &str, expires: i64) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(key.as_bytes());
    mac.update(b"\n");
    mac.update(expires.to_string().as_bytes());
    format!("{:x}", mac.finalize().into_bytes())
}

/// Build a signed read URL for `key`, valid until `expires_at`.
pub fn signed_read_url(base_url: &str, secret: &str, key: &str, expires_at: Timestamp) -> String {
    let expires = expires_at.timestamp();
    format!(
        "{}/{key}?expires={expires}&signature={}",
        base_url.trim_end_matches('/'),
        signature(secret, key, expires)
    )
}

/// Verify a signature produced by [`signed_read_url`] at `now`.
pub fn verify_read_signature(
    secret: &str,
    key: &str,
    expires: i64,
    signature_hex: &str,
    now: Timestamp,
) -> bool {
    if now.timestamp() > expires {
        return false;
    }
    let expected = signature(secret, key, expires);
    // Constant-time compare.
    expected.len() == signature_hex.len()
        && expected
            .bytes()
            .zip(signature_hex.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}
