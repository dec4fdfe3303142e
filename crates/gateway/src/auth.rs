//! Bearer-token issuance and verification.
//!
//! Tokens are `uid.expiry.signature`: an HMAC-SHA256 over the first two
//! parts, base64url-encoded. Verification yields the stable user id; a
//! bad signature or a past expiry rejects. The signing secret comes from
//! config, or is generated per process when absent — tokens then die
//! with the process, which is fine for local development.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use reframe_core::TokenVerifier;
use reframe_core::error::AuthError;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub struct TokenAuthority {
    secret: Vec<u8>,
    ttl_hours: u64,
}

impl TokenAuthority {
    pub fn new(secret: impl Into<Vec<u8>>, ttl_hours: u64) -> Self {
        Self {
            secret: secret.into(),
            ttl_hours,
        }
    }

    /// Use the configured secret, or generate a per-process one.
    pub fn from_config(config: &reframe_config::GatewayConfig) -> Self {
        let secret = match &config.token_secret {
            Some(secret) => secret.as_bytes().to_vec(),
            None => {
                tracing::warn!(
                    "No gateway.token_secret configured; using a per-process secret \
                     (issued tokens will not survive a restart)"
                );
                let mut bytes = [0u8; 32];
                rand::Rng::fill(&mut rand::rng(), &mut bytes[..]);
                bytes.to_vec()
            }
        };
        Self::new(secret, config.token_ttl_hours)
    }

    /// Issue a token for `uid`. Returns the token and its expiry.
    pub fn issue(&self, uid: &str) -> (String, DateTime<Utc>) {
        let expiry = Utc::now() + chrono::Duration::hours(self.ttl_hours as i64);
        let payload = format!("{uid}.{}", expiry.timestamp());
        let token = format!("{payload}.{}", self.sign(&payload));
        (token, expiry)
    }

    fn sign(&self, payload: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .unwrap_or_else(|_| HmacSha256::new_from_slice(b"reframe").unwrap());
        mac.update(payload.as_bytes());
        URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
    }
}

impl TokenVerifier for TokenAuthority {
    fn verify(&self, token: &str) -> Result<String, AuthError> {
        let mut parts = token.rsplitn(2, '.');
        let signature = parts
            .next()
            .ok_or_else(|| AuthError::InvalidToken("Malformed token".into()))?;
        let payload = parts
            .next()
            .ok_or_else(|| AuthError::InvalidToken("Malformed token".into()))?;

        if self.sign(payload) != signature {
            return Err(AuthError::InvalidToken("Bad signature".into()));
        }

        let (uid, expiry) = payload
            .rsplit_once('.')
            .ok_or_else(|| AuthError::InvalidToken("Malformed payload".into()))?;
        let expiry: i64 = expiry
            .parse()
            .map_err(|_| AuthError::InvalidToken("Malformed expiry".into()))?;
        let expiry = Utc
            .timestamp_opt(expiry, 0)
            .single()
            .ok_or_else(|| AuthError::InvalidToken("Malformed expiry".into()))?;

        if expiry < Utc::now() {
            return Err(AuthError::Expired);
        }

        if uid.is_empty() {
            return Err(AuthError::InvalidToken("Empty uid".into()));
        }

        Ok(uid.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_verify_roundtrip() {
        let authority = TokenAuthority::new(b"test-secret".to_vec(), 24);
        let (token, expiry) = authority.issue("user_42");
        assert!(expiry > Utc::now());
        assert_eq!(authority.verify(&token).unwrap(), "user_42");
    }

    #[test]
    fn tampered_signature_rejected() {
        let authority = TokenAuthority::new(b"test-secret".to_vec(), 24);
        let (token, _) = authority.issue("user_42");
        let tampered = format!("{}x", token);
        assert!(matches!(
            authority.verify(&tampered),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn tampered_uid_rejected() {
        let authority = TokenAuthority::new(b"test-secret".to_vec(), 24);
        let (token, _) = authority.issue("user_42");
        let swapped = token.replacen("user_42", "user_43", 1);
        assert!(authority.verify(&swapped).is_err());
    }

    #[test]
    fn wrong_secret_rejected() {
        let issuer = TokenAuthority::new(b"secret-a".to_vec(), 24);
        let verifier = TokenAuthority::new(b"secret-b".to_vec(), 24);
        let (token, _) = issuer.issue("user_42");
        assert!(verifier.verify(&token).is_err());
    }

    #[test]
    fn expired_token_rejected() {
        let authority = TokenAuthority::new(b"test-secret".to_vec(), 0);
        let (token, _) = authority.issue("user_42");
        // TTL of zero hours expires immediately.
        assert!(matches!(authority.verify(&token), Err(AuthError::Expired)));
    }

    #[test]
    fn garbage_rejected() {
        let authority = TokenAuthority::new(b"test-secret".to_vec(), 24);
        for garbage in ["", "no-dots", "a.b", "...."] {
            assert!(authority.verify(garbage).is_err(), "accepted {garbage:?}");
        }
    }
}
