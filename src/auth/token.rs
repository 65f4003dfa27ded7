//! Self-contained signed bearer tokens.
//!
//! Format: `ebx1.<base64url(claims JSON)>.<base64url(HMAC-SHA256 sig)>`
//! where claims are `{sub, iat, exp}` (account id + unix seconds). The
//! signature covers `ebx1.<payload>`. Nothing is stored server-side: a
//! token is valid iff its signature matches the current secret and `exp`
//! has not been reached. There is no revocation — logout is the client
//! discarding its copy.

use anyhow::{Context, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::path::Path;

/// Version tag at the front of every token. Bump on format changes.
pub const TOKEN_PREFIX: &str = "ebx1";

/// Generated signing secret length before hex encoding.
const SECRET_BYTES: usize = 32;

/// Why a token failed verification. Collapsed to a single 401 at the
/// gateway; the distinction exists for logs and tests only.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,
    #[error("token signature mismatch")]
    BadSignature,
    #[error("token expired")]
    Expired,
}

/// Signed token claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Owning account id.
    pub sub: String,
    /// Issued-at, unix seconds.
    pub iat: i64,
    /// Expiry, unix seconds. The token is invalid once this is reached.
    pub exp: i64,
}

/// Issues and verifies bearer tokens against one HMAC secret.
pub struct TokenIssuer {
    key: Vec<u8>,
    ttl_secs: u64,
}

impl TokenIssuer {
    pub fn new(secret: &str, ttl_secs: u64) -> Self {
        Self {
            key: secret.as_bytes().to_vec(),
            ttl_secs,
        }
    }

    /// Mint a token for the given account, valid for the configured window
    /// starting now.
    pub fn issue(&self, account_id: &str) -> Result<String> {
        self.issue_at(account_id, Utc::now().timestamp())
    }

    fn issue_at(&self, account_id: &str, now: i64) -> Result<String> {
        let claims = Claims {
            sub: account_id.to_string(),
            iat: now,
            exp: now + self.ttl_secs as i64,
        };
        let payload = serde_json::to_vec(&claims).context("failed to encode token claims")?;
        let signing_input = format!("{TOKEN_PREFIX}.{}", URL_SAFE_NO_PAD.encode(payload));

        let mut mac = Hmac::<Sha256>::new_from_slice(&self.key)
            .map_err(|_| anyhow::anyhow!("invalid token signing key"))?;
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();

        Ok(format!(
            "{signing_input}.{}",
            URL_SAFE_NO_PAD.encode(signature)
        ))
    }

    /// Verify a token and return its claims. Signature is checked before
    /// expiry, so a tampered-but-expired token reports `BadSignature`.
    pub fn verify(&self, token: &str) -> std::result::Result<Claims, TokenError> {
        self.verify_at(token, Utc::now().timestamp())
    }

    fn verify_at(&self, token: &str, now: i64) -> std::result::Result<Claims, TokenError> {
        let mut parts = token.split('.');
        let (prefix, payload_b64, sig_b64) = match (parts.next(), parts.next(), parts.next()) {
            (Some(p), Some(c), Some(s)) if !c.is_empty() && !s.is_empty() => (p, c, s),
            _ => return Err(TokenError::Malformed),
        };
        if prefix != TOKEN_PREFIX || parts.next().is_some() {
            return Err(TokenError::Malformed);
        }

        let expected = URL_SAFE_NO_PAD
            .decode(sig_b64)
            .map_err(|_| TokenError::Malformed)?;

        let signing_input = format!("{prefix}.{payload_b64}");
        let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(&self.key) else {
            return Err(TokenError::BadSignature);
        };
        mac.update(signing_input.as_bytes());
        // Constant-time comparison
        if mac.verify_slice(&expected).is_err() {
            return Err(TokenError::BadSignature);
        }

        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| TokenError::Malformed)?;
        let claims: Claims =
            serde_json::from_slice(&payload).map_err(|_| TokenError::Malformed)?;

        if now >= claims.exp {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }
}

/// Read the signing secret from `<data_dir>/token.secret`, generating and
/// persisting a fresh one on first run.
pub fn load_or_generate_secret(data_dir: &Path) -> Result<String> {
    let secret_path = data_dir.join("token.secret");
    if secret_path.exists() {
        let secret = std::fs::read_to_string(&secret_path)
            .with_context(|| format!("failed to read {}", secret_path.display()))?;
        let secret = secret.trim().to_string();
        if secret.is_empty() {
            anyhow::bail!("signing secret at {} is empty", secret_path.display());
        }
        return Ok(secret);
    }

    let mut bytes = [0u8; SECRET_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    let secret = hex::encode(bytes);
    std::fs::write(&secret_path, &secret)
        .with_context(|| format!("failed to write {}", secret_path.display()))?;
    tracing::info!("generated new token signing secret at {}", secret_path.display());
    Ok(secret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new("unit-test-secret", 3600)
    }

    #[test]
    fn issue_then_verify_returns_the_account() {
        let issuer = issuer();
        let token = issuer.issue("acct-123").unwrap();
        let claims = issuer.verify(&token).unwrap();
        assert_eq!(claims.sub, "acct-123");
        assert_eq!(claims.exp, claims.iat + 3600);
    }

    #[test]
    fn token_shape_is_prefix_payload_signature() {
        let token = issuer().issue("acct-123").unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "ebx1");
    }

    #[test]
    fn different_secret_fails_with_bad_signature() {
        let token = issuer().issue("acct-123").unwrap();
        let other = TokenIssuer::new("a-different-secret", 3600);
        assert_eq!(other.verify(&token), Err(TokenError::BadSignature));
    }

    #[test]
    fn tampered_payload_fails_with_bad_signature() {
        let issuer = issuer();
        let victim = issuer.issue("acct-123").unwrap();
        let forged_payload =
            URL_SAFE_NO_PAD.encode(br#"{"sub":"acct-999","iat":0,"exp":9999999999}"#);
        let sig = victim.rsplit('.').next().unwrap();
        let forged = format!("{TOKEN_PREFIX}.{forged_payload}.{sig}");
        assert_eq!(issuer.verify(&forged), Err(TokenError::BadSignature));
    }

    #[test]
    fn garbage_is_malformed() {
        let issuer = issuer();
        for token in [
            "",
            "not-a-token",
            "ebx1",
            "ebx1.",
            "ebx1..",
            "ebx1.onlypayload",
            "ebx0.payload.sig",
            "ebx1.pay load.sig!!",
            "ebx1.a.b.c",
        ] {
            assert_eq!(
                issuer.verify(token),
                Err(TokenError::Malformed),
                "token: {token:?}"
            );
        }
    }

    #[test]
    fn expired_token_is_rejected() {
        let issuer = issuer();
        let token = issuer.issue_at("acct-123", 1_000_000).unwrap();
        // Way past iat + ttl.
        assert_eq!(
            issuer.verify_at(&token, 1_000_000 + 4000),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn expiry_boundary_is_exclusive() {
        let issuer = issuer();
        let token = issuer.issue_at("acct-123", 1_000_000).unwrap();
        // One second before exp: still valid.
        assert!(issuer.verify_at(&token, 1_000_000 + 3599).is_ok());
        // At exp exactly: expired.
        assert_eq!(
            issuer.verify_at(&token, 1_000_000 + 3600),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn expired_and_tampered_reports_bad_signature_first() {
        let issuer = issuer();
        let token = issuer.issue_at("acct-123", 1_000_000).unwrap();
        let mut forged = token.clone();
        let last = forged.pop().unwrap();
        forged.push(if last == 'A' { 'B' } else { 'A' });
        let result = issuer.verify_at(&forged, 1_000_000 + 999_999);
        assert!(matches!(
            result,
            Err(TokenError::BadSignature) | Err(TokenError::Malformed)
        ));
    }

    #[test]
    fn zero_ttl_tokens_are_born_expired() {
        let issuer = TokenIssuer::new("unit-test-secret", 0);
        let token = issuer.issue("acct-123").unwrap();
        assert_eq!(issuer.verify(&token), Err(TokenError::Expired));
    }

    #[test]
    fn secret_is_generated_once_and_reused() {
        let tmp = TempDir::new().unwrap();
        let first = load_or_generate_secret(tmp.path()).unwrap();
        assert_eq!(first.len(), SECRET_BYTES * 2);
        assert!(tmp.path().join("token.secret").exists());

        let second = load_or_generate_secret(tmp.path()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn empty_secret_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("token.secret"), "  \n").unwrap();
        assert!(load_or_generate_secret(tmp.path()).is_err());
    }
}
