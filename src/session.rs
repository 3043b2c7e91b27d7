//! Signed viewer session cookies.

use axum::http::{HeaderMap, header};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

pub const VIEWER_COOKIE: &str = "intercom_viewer";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session key rejected: {0}")]
    InvalidKey(String),
}

/// Issues and checks `intercom_viewer=<user id>.<hex hmac>` values.
#[derive(Clone)]
pub struct SessionSigner {
    mac: Hmac<Sha256>,
}

impl std::fmt::Debug for SessionSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSigner").finish_non_exhaustive()
    }
}

impl SessionSigner {
    pub fn new(secret: &[u8]) -> Result<Self, SessionError> {
        let mac = Hmac::<Sha256>::new_from_slice(secret)
            .map_err(|e| SessionError::InvalidKey(e.to_string()))?;
        Ok(Self { mac })
    }

    /// Random per-process key; cookies stop verifying after a restart.
    pub fn ephemeral() -> Result<Self, SessionError> {
        let mut key = uuid::Uuid::new_v4().as_bytes().to_vec();
        key.extend_from_slice(uuid::Uuid::new_v4().as_bytes());
        Self::new(&key)
    }

    pub fn sign(&self, user_id: u64) -> String {
        let mut mac = self.mac.clone();
        mac.update(user_id.to_string().as_bytes());
        format!("{user_id}.{}", hex::encode(mac.finalize().into_bytes()))
    }

    /// `Set-Cookie` value for a signed-in viewer.
    pub fn cookie(&self, user_id: u64) -> String {
        format!(
            "{VIEWER_COOKIE}={}; Path=/; HttpOnly; SameSite=Lax",
            self.sign(user_id)
        )
    }

    /// User id carried by a signed value; `None` for anything unsigned or tampered.
    pub fn verify(&self, value: &str) -> Option<u64> {
        let (id, signature) = value.split_once('.')?;
        let signature = hex::decode(signature).ok()?;
        let mut mac = self.mac.clone();
        mac.update(id.as_bytes());
        mac.verify_slice(&signature).ok()?;
        id.parse().ok()
    }

    /// Verified viewer id from the request cookies.
    pub fn viewer_id(&self, headers: &HeaderMap) -> Option<u64> {
        self.verify(&viewer_cookie(headers)?)
    }
}

fn viewer_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|cookies| {
            cookies
                .split(';')
                .map(|c| c.trim())
                .find_map(|c| c.strip_prefix(VIEWER_COOKIE)?.strip_prefix('='))
                .map(|s| s.to_string())
        })
}
