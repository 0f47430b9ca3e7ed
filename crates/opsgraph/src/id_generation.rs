//! Hash-based identifier generation.
//!
//! Creates collision-resistant short IDs using SHA256 and base36 encoding,
//! formatted as `{prefix}-{hash}` (e.g. `wu-a3f8`). The hash length adapts
//! to store size so IDs stay short while the store is small.

use chrono::Utc;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, warn};

const BASE36_CHARS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const MAX_NONCE: u32 = 100;

/// Errors that can occur during ID generation.
#[derive(Debug, Error)]
pub enum IdGenerationError {
    /// Unable to generate a unique ID after exhausting all nonces and
    /// length increases.
    #[error("Unable to generate unique ID after {attempts} attempts")]
    CollisionExhausted {
        /// Number of nonces tried.
        attempts: u32,
    },

    /// Base36 encoding failed.
    #[error("Base36 encoding failed: {0}")]
    EncodingFailed(String),

    /// Invalid length parameter.
    #[error("Length must be greater than 0")]
    InvalidLength,
}

/// Configuration for ID generation.
#[derive(Debug, Clone)]
pub struct IdGeneratorConfig {
    /// Prefix for all IDs (e.g. "wu", "dep", "cap", "risk").
    pub prefix: String,

    /// Current number of records of this type (affects adaptive length).
    pub store_size: usize,
}

/// Hash-based ID generator with collision detection.
///
/// The generator tracks every ID it has handed out (plus any registered
/// pre-existing IDs) so repeated calls with identical seeds still produce
/// distinct IDs via nonce retry.
pub struct IdGenerator {
    config: IdGeneratorConfig,
    existing_ids: HashSet<String>,
}

impl IdGenerator {
    /// Create a new ID generator with the given configuration.
    pub fn new(config: IdGeneratorConfig) -> Self {
        Self {
            config,
            existing_ids: HashSet::new(),
        }
    }

    /// Create a generator for the given prefix with an empty store.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self::new(IdGeneratorConfig {
            prefix: prefix.into(),
            store_size: 0,
        })
    }

    /// Register an existing ID to prevent collisions.
    pub fn register_id(&mut self, id: String) {
        self.existing_ids.insert(id);
    }

    /// Update the store size driving adaptive ID length.
    pub fn set_store_size(&mut self, size: usize) {
        self.config.store_size = size;
    }

    /// Generate a new unique ID from an arbitrary seed string.
    ///
    /// The seed only influences the hash; uniqueness comes from collision
    /// tracking plus timestamp and nonce mixing.
    ///
    /// # Errors
    ///
    /// Returns an error if unable to generate a unique ID after trying all
    /// nonces at the maximum length.
    pub fn generate(&mut self, seed: &str) -> Result<String, IdGenerationError> {
        let id_length = self.adaptive_length();

        for nonce in 0..MAX_NONCE {
            let id = self.generate_hash_id(seed, nonce, id_length)?;

            if !self.existing_ids.contains(&id) {
                if nonce > 0 {
                    debug!(
                        nonce,
                        id_length, "Generated unique ID after {} collision retries", nonce
                    );
                }
                self.existing_ids.insert(id.clone());
                return Ok(id);
            }
        }

        // If all nonces collide, try with increased length
        if id_length < 6 {
            warn!(
                id_length,
                max_nonce = MAX_NONCE,
                "All nonces exhausted, increasing ID length to {}",
                id_length + 1
            );
            let longer_id = self.generate_hash_id(seed, 0, id_length + 1)?;
            self.existing_ids.insert(longer_id.clone());
            return Ok(longer_id);
        }

        Err(IdGenerationError::CollisionExhausted {
            attempts: MAX_NONCE,
        })
    }

    fn generate_hash_id(
        &self,
        seed: &str,
        nonce: u32,
        length: usize,
    ) -> Result<String, IdGenerationError> {
        let timestamp = Utc::now().timestamp();
        let content = format!("{}|{}|{}", seed, timestamp, nonce);

        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        let hash_bytes = hasher.finalize();

        let hash_str = encode_base36(&hash_bytes[..8], length)?;

        Ok(format!("{}-{}", self.config.prefix, hash_str))
    }

    /// Determine ID length based on store size.
    ///
    /// - 0-500 records: 4 chars
    /// - 501-1,500: 5 chars
    /// - 1,500+: 6 chars
    fn adaptive_length(&self) -> usize {
        match self.config.store_size {
            0..=500 => 4,
            501..=1500 => 5,
            _ => 6,
        }
    }
}

/// Encode bytes as a base36 string of exactly `length` characters.
///
/// Input is limited by callers to the first 8 bytes of a SHA256 hash so the
/// accumulated value fits a u64; wrapping arithmetic keeps the conversion
/// deterministic regardless.
///
/// # Errors
///
/// Returns an error if length is 0 or if UTF-8 conversion fails.
fn encode_base36(bytes: &[u8], length: usize) -> Result<String, IdGenerationError> {
    if length == 0 {
        return Err(IdGenerationError::InvalidLength);
    }

    let mut num: u64 = 0;
    for &byte in bytes {
        num = num.wrapping_shl(8).wrapping_add(u64::from(byte));
    }

    let mut result = Vec::new();
    let mut n = num;

    while result.len() < length {
        let remainder = (n % 36) as usize;
        result.push(BASE36_CHARS[remainder]);
        n /= 36;
    }

    result.reverse();

    String::from_utf8(result)
        .map_err(|e| IdGenerationError::EncodingFailed(format!("UTF-8 conversion failed: {}", e)))
}

/// Validate ID format: `{prefix}-{hash}` with a 4-6 char alphanumeric hash.
pub fn validate_id(id: &str, prefix: &str) -> bool {
    let Some(hash) = id.strip_prefix(prefix).and_then(|s| s.strip_prefix('-')) else {
        return false;
    };

    if hash.len() < 4 || hash.len() > 6 {
        return false;
    }

    hash.chars().all(|c| c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base36_encoding() {
        let bytes = &[0x12, 0x34, 0x56, 0x78];
        let result = encode_base36(bytes, 4).unwrap();
        assert_eq!(result.len(), 4);
        assert!(result.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_adaptive_length() {
        let small = IdGenerator::new(IdGeneratorConfig {
            prefix: "wu".to_string(),
            store_size: 100,
        });
        assert_eq!(small.adaptive_length(), 4);

        let medium = IdGenerator::new(IdGeneratorConfig {
            prefix: "wu".to_string(),
            store_size: 800,
        });
        assert_eq!(medium.adaptive_length(), 5);

        let large = IdGenerator::new(IdGeneratorConfig {
            prefix: "wu".to_string(),
            store_size: 2000,
        });
        assert_eq!(large.adaptive_length(), 6);
    }

    #[test]
    fn test_id_generation() {
        let mut generator = IdGenerator::with_prefix("wu");

        let id = generator.generate("task:T-1001").unwrap();

        assert!(id.starts_with("wu-"));
        assert!(validate_id(&id, "wu"));
    }

    #[test]
    fn test_collision_handling() {
        let mut generator = IdGenerator::with_prefix("wu");

        // Same seed twice must still yield distinct IDs
        let id1 = generator.generate("task:T-1001").unwrap();
        let id2 = generator.generate("task:T-1001").unwrap();

        assert_ne!(id1, id2);
    }

    #[test]
    fn test_id_validation() {
        assert!(validate_id("wu-a3f8", "wu"));
        assert!(validate_id("risk-abc123", "risk"));

        assert!(!validate_id("invalid", "wu"));
        assert!(!validate_id("wu-", "wu"));
        assert!(!validate_id("wu-ab", "wu")); // Too short
        assert!(!validate_id("wu-abcdefg", "wu")); // Too long
        assert!(!validate_id("dep-a3f8", "wu")); // Wrong prefix
    }

    #[test]
    fn test_register_existing_ids() {
        let mut generator = IdGenerator::with_prefix("wu");

        generator.register_id("wu-a3f8".to_string());
        generator.register_id("wu-b4g9".to_string());

        let new_id = generator.generate("anything").unwrap();
        assert_ne!(new_id, "wu-a3f8");
        assert_ne!(new_id, "wu-b4g9");
    }
}
