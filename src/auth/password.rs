//! PBKDF2-HMAC-SHA256 password digests with per-password random salt.
//!
//! Digest format: `pbkdf2-sha256$<rounds>$<salt hex>$<hash hex>`. The salt
//! and round count travel inside the digest, so the configured round count
//! can change without invalidating stored digests — verification always
//! replays the parameters embedded in the digest being checked.

use rand::RngCore;

/// Salt byte length for password hashing.
const SALT_BYTES: usize = 16;

/// Derived key length (SHA-256 output size).
const HASH_BYTES: usize = 32;

/// Digest scheme tag. Anything else is rejected on verify.
const SCHEME: &str = "pbkdf2-sha256";

/// Default PBKDF2 round count for new digests.
pub const DEFAULT_ROUNDS: u32 = 100_000;

/// Fixed salt for the dummy computation on unknown-account login attempts.
const DUMMY_SALT: [u8; SALT_BYTES] = [0u8; SALT_BYTES];

/// Stateless hasher carrying the round count used for new digests.
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    rounds: u32,
}

impl PasswordHasher {
    /// A hasher producing digests with the given round count. Zero falls
    /// back to the default.
    pub fn new(rounds: u32) -> Self {
        Self {
            rounds: if rounds == 0 { DEFAULT_ROUNDS } else { rounds },
        }
    }

    /// Hash a password with a fresh random salt.
    pub fn hash(&self, password: &str) -> String {
        let mut salt = [0u8; SALT_BYTES];
        rand::rngs::OsRng.fill_bytes(&mut salt);
        let derived = derive(password, &salt, self.rounds);
        format!(
            "{SCHEME}${}${}${}",
            self.rounds,
            hex::encode(salt),
            hex::encode(derived)
        )
    }

    /// Check a password against a stored digest using the salt and rounds
    /// embedded in it. A digest that does not parse verifies as `false`,
    /// never as an error.
    pub fn verify(&self, password: &str, digest: &str) -> bool {
        let Some((rounds, salt, expected)) = parse_digest(digest) else {
            return false;
        };
        let derived = derive(password, &salt, rounds);
        constant_time_eq(&derived, &expected)
    }

    /// Burn one PBKDF2 computation and discard the result. Called on login
    /// attempts against unknown identifiers so their timing is comparable
    /// to a real verification.
    pub fn burn(&self, password: &str) {
        let _ = derive(password, &DUMMY_SALT, self.rounds);
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(DEFAULT_ROUNDS)
    }
}

fn derive(password: &str, salt: &[u8], rounds: u32) -> [u8; HASH_BYTES] {
    let mut out = [0u8; HASH_BYTES];
    pbkdf2::pbkdf2_hmac::<sha2::Sha256>(password.as_bytes(), salt, rounds, &mut out);
    out
}

/// Split `pbkdf2-sha256$rounds$salt$hash` into its parts. `None` on any
/// structural problem: wrong scheme, missing fields, bad hex, zero rounds.
fn parse_digest(digest: &str) -> Option<(u32, Vec<u8>, Vec<u8>)> {
    let mut parts = digest.split('$');
    let scheme = parts.next()?;
    let rounds: u32 = parts.next()?.parse().ok()?;
    let salt = hex::decode(parts.next()?).ok()?;
    let hash = hex::decode(parts.next()?).ok()?;
    if scheme != SCHEME || rounds == 0 || salt.is_empty() || hash.is_empty() {
        return None;
    }
    if parts.next().is_some() {
        return None;
    }
    Some((rounds, salt, hash))
}

/// Constant-time byte comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
