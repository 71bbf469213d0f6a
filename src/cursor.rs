//! Signed, opaque pagination cursors for record listings
//!
//! A cursor is `base64(json).base64(hmac-sha256)`. Clients cannot forge an
//! offset or swap the sort a listing was started with.

use anyhow::{anyhow, Result};
use base64::prelude::*;
use hmac::{Hmac, Mac};
use rand::RngExt;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::ads::{AdField, SortOrder};

/// Position within a sorted listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorData {
    pub offset: usize,
    pub sort: AdField,
    pub order: SortOrder,
}

#[derive(Clone)]
pub struct CursorSigner {
    key: Vec<u8>,
}

impl CursorSigner {
    /// Signer keyed by `secret`, or by a random key when unset
    /// (cursors then do not survive restarts)
    pub fn new(secret: Option<&str>) -> Self {
        let key = match secret {
            Some(s) => s.as_bytes().to_vec(),
            None => {
                let mut rng = rand::rng();
                (0..32).map(|_| rng.random::<u8>()).collect()
            }
        };
        Self { key }
    }

    fn mac(&self, payload: &str) -> Result<Vec<u8>> {
        let mut mac = Hmac::<Sha256>::new_from_slice(&self.key)
            .map_err(|e| anyhow!("Failed to create HMAC: {}", e))?;
        mac.update(payload.as_bytes());
        Ok(mac.finalize().into_bytes().to_vec())
    }

    pub fn encode(&self, data: &CursorData) -> Result<String> {
        let json = serde_json::to_string(data)?;
        let payload = BASE64_URL_SAFE_NO_PAD.encode(json.as_bytes());
        let signature = BASE64_URL_SAFE_NO_PAD.encode(self.mac(&payload)?);
        Ok(format!("{payload}.{signature}"))
    }

    pub fn decode(&self, cursor: &str) -> Result<CursorData> {
        let (payload, signature_b64) = cursor
            .split_once('.')
            .filter(|(_, sig)| !sig.contains('.'))
            .ok_or_else(|| anyhow!("Invalid cursor format"))?;

        let provided = BASE64_URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| anyhow!("Invalid cursor signature encoding"))?;
        let expected = self.mac(payload)?;

        if !bool::from(expected.ct_eq(&provided)) {
            return Err(anyhow!("Cursor signature verification failed"));
        }

        let json = BASE64_URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| anyhow!("Invalid cursor payload encoding"))?;
        serde_json::from_slice(&json).map_err(|_| anyhow!("Invalid cursor data"))
    }
}
