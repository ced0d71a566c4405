//! Ticket authentication.
//!
//! A client proves its identity with two headers: `X-Openid` carries the
//! identity in clear text and `X-Ticket` carries
//! `base64(RSA-PKCS#1-v1.5(identity ++ unix_timestamp))`, encrypted with
//! the server's public key. The timestamp is appended as decimal digits
//! with no separator.
//!
//! The timestamp suffix must be plain ASCII digits and may not lie more
//! than [`MAX_CLOCK_SKEW_SECS`] in the future. Otherwise a ticket for
//! `alice1` or `alice+` would also decode as a ticket for `alice`.
//!
//! Every rejection reason maps to the same `401` response; the reason is
//! only visible in debug logs.

use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, Request};
use axum::middleware::Next;
use axum::response::Response;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey};
use thiserror::Error;
use tracing::debug;

use crate::error::ApiError;
use crate::metrics;

/// Header carrying the client identity.
pub const OPENID_HEADER: &str = "X-Openid";
/// Header carrying the encrypted ticket.
pub const TICKET_HEADER: &str = "X-Ticket";

/// Tolerated difference between client and server clocks.
pub const MAX_CLOCK_SKEW_SECS: i64 = 60;

/// Reasons a ticket is rejected. Never shown to clients.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing credentials")]
    MissingCredentials,

    #[error("empty identity")]
    EmptyIdentity,

    #[error("ticket is not valid base64")]
    InvalidEncoding,

    #[error("ticket could not be decrypted")]
    DecryptionFailed,

    #[error("ticket plaintext is not UTF-8")]
    NotUtf8,

    #[error("ticket identity does not match")]
    IdentityMismatch,

    #[error("ticket timestamp is malformed")]
    MalformedTimestamp,

    #[error("ticket issued {ahead}s in the future")]
    IssuedInFuture { ahead: i64 },

    #[error("ticket expired ({age}s old, limit {ttl}s)")]
    Expired { age: i64, ttl: i64 },
}

/// Failure to load the server key at startup.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("failed to read private key {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unrecognized private key format")]
    Format,
}

/// Identity established by a valid ticket.
///
/// Inserted into request extensions by [`require_ticket`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketIdentity {
    pub openid: String,
    /// Unix timestamp embedded in the ticket
    pub issued_at: i64,
}

/// Validates tickets against the server private key.
pub struct TicketAuthenticator {
    key: RsaPrivateKey,
    ttl_secs: i64,
    enforce_expiry: bool,
}

impl TicketAuthenticator {
    pub fn new(key: RsaPrivateKey, ttl_secs: i64, enforce_expiry: bool) -> Self {
        Self {
            key,
            ttl_secs,
            enforce_expiry,
        }
    }

    /// Load the private key from disk.
    pub fn from_key_file(
        path: impl AsRef<Path>,
        ttl_secs: i64,
        enforce_expiry: bool,
    ) -> Result<Self, KeyError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| KeyError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let key = parse_private_key(&text)?;
        Ok(Self::new(key, ttl_secs, enforce_expiry))
    }

    pub fn ttl_secs(&self) -> i64 {
        self.ttl_secs
    }

    pub fn enforces_expiry(&self) -> bool {
        self.enforce_expiry
    }

    /// Validate a ticket against the current time.
    pub fn validate(&self, identity: &str, ticket: &str) -> Result<TicketIdentity, AuthError> {
        self.validate_at(identity, ticket, Utc::now().timestamp())
    }

    /// Validate a ticket as if the current unix time were `now`.
    ///
    /// Timestamps up to [`MAX_CLOCK_SKEW_SECS`] ahead of `now` are accepted
    /// whether or not expiry is enforced.
    pub fn validate_at(
        &self,
        identity: &str,
        ticket: &str,
        now: i64,
    ) -> Result<TicketIdentity, AuthError> {
        if identity.is_empty() {
            return Err(AuthError::EmptyIdentity);
        }

        let ciphertext = STANDARD
            .decode(ticket.trim())
            .map_err(|_| AuthError::InvalidEncoding)?;
        let plaintext = self
            .key
            .decrypt(Pkcs1v15Encrypt, &ciphertext)
            .map_err(|_| AuthError::DecryptionFailed)?;
        let plaintext = String::from_utf8(plaintext).map_err(|_| AuthError::NotUtf8)?;

        let suffix = plaintext
            .strip_prefix(identity)
            .ok_or(AuthError::IdentityMismatch)?;
        if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AuthError::MalformedTimestamp);
        }
        let issued_at: i64 = suffix.parse().map_err(|_| AuthError::MalformedTimestamp)?;

        let ahead = issued_at.saturating_sub(now);
        if ahead > MAX_CLOCK_SKEW_SECS {
            return Err(AuthError::IssuedInFuture { ahead });
        }

        if self.enforce_expiry {
            let age = now.saturating_sub(issued_at);
            if age > self.ttl_secs {
                return Err(AuthError::Expired {
                    age,
                    ttl: self.ttl_secs,
                });
            }
        }

        Ok(TicketIdentity {
            openid: identity.to_string(),
            issued_at,
        })
    }
}

/// Parse a private key as PEM (PKCS#8 or PKCS#1) or bare base64 DER.
pub fn parse_private_key(text: &str) -> Result<RsaPrivateKey, KeyError> {
    let text = text.trim();

    if text.starts_with("-----BEGIN") {
        return RsaPrivateKey::from_pkcs8_pem(text)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(text))
            .map_err(|_| KeyError::Format);
    }

    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let der = STANDARD.decode(compact).map_err(|_| KeyError::Format)?;
    RsaPrivateKey::from_pkcs8_der(&der)
        .or_else(|_| RsaPrivateKey::from_pkcs1_der(&der))
        .map_err(|_| KeyError::Format)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Middleware guard for task routes.
pub async fn require_ticket(
    State(auth): State<Arc<TicketAuthenticator>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let headers = request.headers();
    let credentials = match (
        header_str(headers, OPENID_HEADER),
        header_str(headers, TICKET_HEADER),
    ) {
        (Some(identity), Some(ticket)) => Some((identity.trim().to_string(), ticket.to_string())),
        _ => None,
    };

    let verdict = match credentials {
        // CPU-bound RSA decryption
        Some((identity, ticket)) => tokio::task::spawn_blocking(move || {
            auth.validate(&identity, &ticket)
        })
        .await
        .map_err(|e| ApiError::internal(format!("ticket validation task failed: {}", e)))?,
        None => Err(AuthError::MissingCredentials),
    };

    match verdict {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            Ok(next.run(request).await)
        }
        Err(reason) => {
            debug!(path = %request.uri().path(), %reason, "Ticket rejected");
            metrics::record_auth_failure();
            Err(ApiError::Unauthorized)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::OnceLock;

    use rsa::pkcs1::EncodeRsaPrivateKey;
    use rsa::pkcs8::{EncodePrivateKey, LineEnding};
    use rsa::RsaPublicKey;

    use super::*;

    fn test_key() -> &'static RsaPrivateKey {
        static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
        KEY.get_or_init(|| RsaPrivateKey::new(&mut rand::thread_rng(), 1024).unwrap())
    }

    fn ticket(plaintext: &str) -> String {
        let public = RsaPublicKey::from(test_key());
        let ciphertext = public
            .encrypt(&mut rand::thread_rng(), Pkcs1v15Encrypt, plaintext.as_bytes())
            .unwrap();
        STANDARD.encode(ciphertext)
    }

    fn authenticator(enforce_expiry: bool) -> TicketAuthenticator {
        TicketAuthenticator::new(test_key().clone(), 300, enforce_expiry)
    }

    #[test]
    fn test_valid_ticket() {
        let auth = authenticator(true);
        let identity = auth
            .validate_at("alice", &ticket("alice1700000000"), 1_700_000_100)
            .unwrap();
        assert_eq!(identity.openid, "alice");
        assert_eq!(identity.issued_at, 1_700_000_000);
    }

    #[test]
    fn test_identity_mismatch() {
        let auth = authenticator(true);
        let err = auth
            .validate_at("bob", &ticket("alice1700000000"), 1_700_000_000)
            .unwrap_err();
        assert!(matches!(err, AuthError::IdentityMismatch));
    }

    #[test]
    fn test_expiry_boundary() {
        let auth = authenticator(true);
        let t = ticket("alice1700000000");

        assert!(auth.validate_at("alice", &t, 1_700_000_300).is_ok());
        assert!(matches!(
            auth.validate_at("alice", &t, 1_700_000_301),
            Err(AuthError::Expired { age: 301, ttl: 300 })
        ));
    }

    #[test]
    fn test_expiry_disabled_accepts_old_ticket() {
        let auth = authenticator(false);
        assert!(auth
            .validate_at("alice", &ticket("alice1000"), 1_700_000_000)
            .is_ok());
    }

    #[test]
    fn test_small_clock_skew_accepted() {
        let auth = authenticator(true);
        assert!(auth
            .validate_at("alice", &ticket("alice1700000060"), 1_700_000_000)
            .is_ok());
        assert!(matches!(
            auth.validate_at("alice", &ticket("alice1700000061"), 1_700_000_000),
            Err(AuthError::IssuedInFuture { ahead: 61 })
        ));
    }

    #[test]
    fn test_signed_suffix_does_not_match_shorter_identity() {
        let auth = authenticator(false);
        for plaintext in ["alice+1700000000", "alice-1700000000", "alice 1700000000"] {
            assert!(matches!(
                auth.validate_at("alice", &ticket(plaintext), 1_700_000_000),
                Err(AuthError::MalformedTimestamp)
            ));
        }
    }

    #[test]
    fn test_digit_identity_ticket_does_not_match_prefix() {
        // "alice1" + ts decodes as "alice" + a timestamp ten times too large.
        let t = ticket("alice11700000000");
        let now = 1_700_000_000 + 115 * 24 * 3600;

        for enforce in [true, false] {
            let auth = authenticator(enforce);
            assert!(matches!(
                auth.validate_at("alice", &t, now),
                Err(AuthError::IssuedInFuture { .. })
            ));
        }
        assert!(authenticator(true).validate_at("alice1", &t, 1_700_000_000).is_ok());
    }

    #[test]
    fn test_malformed_suffix() {
        let auth = authenticator(false);
        assert!(matches!(
            auth.validate_at("alice", &ticket("alice17000x0000"), 0),
            Err(AuthError::MalformedTimestamp)
        ));
        assert!(matches!(
            auth.validate_at("alice", &ticket("alice"), 0),
            Err(AuthError::MalformedTimestamp)
        ));
    }

    #[test]
    fn test_garbage_ticket() {
        let auth = authenticator(false);
        assert!(matches!(
            auth.validate_at("alice", "not base64!!", 0),
            Err(AuthError::InvalidEncoding)
        ));
        assert!(matches!(
            auth.validate_at("alice", &STANDARD.encode(b"short"), 0),
            Err(AuthError::DecryptionFailed)
        ));
    }

    #[test]
    fn test_empty_identity() {
        let auth = authenticator(false);
        assert!(matches!(
            auth.validate_at("", &ticket("1700000000"), 0),
            Err(AuthError::EmptyIdentity)
        ));
    }

    #[test]
    fn test_parse_key_formats() {
        let key = test_key();

        let pkcs8_pem = key.to_pkcs8_pem(LineEnding::LF).unwrap();
        assert_eq!(&parse_private_key(&pkcs8_pem).unwrap(), key);

        let pkcs1_pem = key.to_pkcs1_pem(LineEnding::LF).unwrap();
        assert_eq!(&parse_private_key(&pkcs1_pem).unwrap(), key);

        let pkcs1_der = key.to_pkcs1_der().unwrap();
        let bare = STANDARD.encode(pkcs1_der.as_bytes());
        assert_eq!(&parse_private_key(&bare).unwrap(), key);

        assert!(matches!(
            parse_private_key("definitely not a key"),
            Err(KeyError::Format)
        ));
    }
}
