//! PBKDF2-HMAC-SHA256 password hashing.
//!
//! Hashes are self-describing (`pbkdf2_sha256$<iterations>$<salt>$<hash>`,
//! unpadded base64) so the iteration count can be raised without
//! invalidating stored credentials.

use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::warn;

const SCHEME: &str = "pbkdf2_sha256";
const SALT_LEN: usize = 16;
const KEY_LEN: usize = 32;

pub const DEFAULT_ITERATIONS: u32 = 100_000;
pub const MIN_ITERATIONS: u32 = 1_000;

#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    iterations: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(DEFAULT_ITERATIONS)
    }
}

impl PasswordHasher {
    pub fn new(iterations: u32) -> Self {
        if iterations < MIN_ITERATIONS {
            warn!(
                requested = iterations,
                applied = MIN_ITERATIONS,
                "PBKDF2 iteration count raised to minimum"
            );
        }
        Self {
            iterations: iterations.max(MIN_ITERATIONS),
        }
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Hash with a fresh random salt.
    pub fn hash(&self, password: &str) -> String {
        let mut salt = [0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt);
        let key = derive(password, &salt, self.iterations);
        format!(
            "{SCHEME}${}${}${}",
            self.iterations,
            STANDARD_NO_PAD.encode(salt),
            STANDARD_NO_PAD.encode(key)
        )
    }

    /// Check `password` against an encoded hash. Malformed input never verifies.
    pub fn verify(&self, password: &str, encoded: &str) -> bool {
        let Some((iterations, salt, expected)) = parse(encoded) else {
            return false;
        };
        let actual = derive(password, &salt, iterations);
        actual.as_slice().ct_eq(expected.as_slice()).into()
    }
}

fn derive(password: &str, salt: &[u8], iterations: u32) -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut key);
    key
}

fn parse(encoded: &str) -> Option<(u32, Vec<u8>, Vec<u8>)> {
    let mut parts = encoded.split('$');
    if parts.next()? != SCHEME {
        return None;
    }
    let iterations: u32 = parts.next()?.parse().ok()?;
    let salt = STANDARD_NO_PAD.decode(parts.next()?).ok()?;
    let hash = STANDARD_NO_PAD.decode(parts.next()?).ok()?;
    if parts.next().is_some() || iterations == 0 || salt.is_empty() || hash.len() != KEY_LEN {
        return None;
    }
    Some((iterations, salt, hash))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> PasswordHasher {
        PasswordHasher::new(MIN_ITERATIONS)
    }

    #[test]
    fn test_hash_and_verify() {
        let h = hasher();
        let encoded = h.hash("correct horse battery");
        assert!(encoded.starts_with("pbkdf2_sha256$1000$"));
        assert!(h.verify("correct horse battery", &encoded));
        assert!(!h.verify("correct horse batterz", &encoded));
    }

    #[test]
    fn test_single_bit_difference_rejected() {
        let h = hasher();
        let encoded = h.hash("bit-flip-check");
        let (iterations, salt, mut key) = parse(&encoded).unwrap();
        key[KEY_LEN - 1] ^= 0x01;
        let tampered = format!(
            "{SCHEME}${iterations}${}${}",
            STANDARD_NO_PAD.encode(&salt),
            STANDARD_NO_PAD.encode(&key)
        );
        assert!(h.verify("bit-flip-check", &encoded));
        assert!(!h.verify("bit-flip-check", &tampered));
    }

    #[test]
    fn test_salts_differ() {
        let h = hasher();
        assert_ne!(h.hash("same-password"), h.hash("same-password"));
    }

    #[test]
    fn test_verify_uses_stored_iterations() {
        let encoded = PasswordHasher::new(2_000).hash("s3cret-pass");
        assert!(hasher().verify("s3cret-pass", &encoded));
    }

    #[test]
    fn test_malformed_hashes_do_not_verify() {
        let h = hasher();
        for bad in [
            "",
            "plaintext",
            "bcrypt$1000$c2FsdA$aGFzaA",
            "pbkdf2_sha256$abc$c2FsdA$aGFzaA",
            "pbkdf2_sha256$1000$!!!$aGFzaA",
            "pbkdf2_sha256$1000$c2FsdA$aGFzaA",
            "pbkdf2_sha256$1000$c2FsdA$aGFzaA$extra",
        ] {
            assert!(!h.verify("anything", bad), "{bad} should not verify");
        }
    }

    #[test]
    fn test_iterations_clamped_to_minimum() {
        assert_eq!(PasswordHasher::new(10).iterations(), MIN_ITERATIONS);
        assert_eq!(PasswordHasher::default().iterations(), DEFAULT_ITERATIONS);
    }
}
