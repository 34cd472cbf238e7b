// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Secrets: plaintext `data` is transient; only `encrypt_data` is persisted.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::meta::Metadata;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Secret {
    #[serde(flatten)]
    pub meta: Metadata,

    /// Plaintext values. Cleared by [`Secret::encrypt`] before persistence.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub data: HashMap<String, String>,
    /// Encrypted values, keyed like `data`.
    #[serde(default, rename = "encryptData", skip_serializing_if = "HashMap::is_empty")]
    pub encrypt_data: HashMap<String, String>,
}

impl Secret {
    /// Encrypt every plaintext value into `encrypt_data` and clear `data`.
    pub fn encrypt(&mut self) {
        for (k, v) in self.data.drain() {
            self.encrypt_data.insert(k, BASE64.encode(v.as_bytes()));
        }
    }

    /// Decrypt every value of `encrypt_data` back into `data`.
    pub fn decrypt(&mut self) -> Result<(), crate::Error> {
        for (k, v) in &self.encrypt_data {
            let raw = BASE64.decode(v).map_err(|e| {
                crate::Error::internal(format!("decryption key({k}) value failed: {e}"))
            })?;
            let val = String::from_utf8(raw).map_err(|e| {
                crate::Error::internal(format!("decryption key({k}) value failed: {e}"))
            })?;
            self.data.insert(k.clone(), val);
        }
        Ok(())
    }

    /// Find a plaintext value by secret name and key among decryptable secrets.
    pub fn find_key(secrets: &[Secret], name: &str, key: &str) -> Option<String> {
        for secret in secrets {
            if secret.meta.name != name {
                continue;
            }
            let mut copy = secret.clone();
            if copy.decrypt().is_err() {
                return None;
            }
            return copy.data.get(key).cloned();
        }
        None
    }
}

#[cfg(test)]
#[path = "secret_tests.rs"]
mod tests;
