//! TokenVerifier trait — the abstraction over the auth collaborator.
//!
//! Every protected operation presents a bearer token; the verifier maps it
//! to a stable user identifier or rejects it. Token issuance lives with
//! the implementation, not here.

use crate::error::AuthError;

pub trait TokenVerifier: Send + Sync {
    /// Verify a bearer token and return the stable user id it names.
    fn verify(&self, token: &str) -> std::result::Result<String, AuthError>;
}
