// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Proxy authorization (spec §4.10 "Authorization"): an IP whitelist and
//! basic credentials, composable AND. Credentials are delivered as a
//! small encrypted-or-base64 blob in the `init` frame's `authorization`
//! field, not as wire encryption of the whole protocol (SPEC_FULL.md
//! "Non-goals carried over verbatim").

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use distio_core::{DioError, DioResult};
use rand::RngCore;
use regex::Regex;
use sha2::{Digest, Sha256};

const NONCE_LEN: usize = 12;

/// Basic credentials a proxy can require of connecting controllers
/// (spec §4.10 "Basic credentials: `{username, password, optional
/// passphrase}`").
#[derive(Debug, Clone)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
    pub passphrase: Option<String>,
}

impl BasicAuth {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self { username: username.into(), password: password.into(), passphrase: None }
    }

    pub fn with_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.passphrase = Some(passphrase.into());
        self
    }

    /// Encode `username:password` for delivery in an `init` frame's
    /// `authorization` field: AES-256-GCM-then-base64 when a passphrase
    /// is set, plain base64 otherwise (spec §4.10).
    pub fn encode_credentials(&self) -> String {
        let plain = format!("{}:{}", self.username, self.password);
        match &self.passphrase {
            Some(passphrase) => encrypt(passphrase, plain.as_bytes()),
            None => BASE64.encode(plain),
        }
    }

    fn verify(&self, authorization: &str) -> bool {
        let decoded = match &self.passphrase {
            Some(passphrase) => decrypt(passphrase, authorization),
            None => BASE64.decode(authorization).ok(),
        };
        let Some(bytes) = decoded else { return false };
        let Ok(text) = String::from_utf8(bytes) else { return false };
        let Some((user, pass)) = text.split_once(':') else { return false };
        user == self.username && pass == self.password
    }
}

/// Composable proxy authorization: IP whitelist AND basic credentials,
/// both optional (spec §4.10 "Authorization (both optional, composable
/// AND)").
#[derive(Debug, Clone, Default)]
pub struct ProxyAuth {
    pub ip_allowlist: Vec<Regex>,
    pub basic: Option<BasicAuth>,
}

impl ProxyAuth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ip_allowlist(mut self, patterns: impl IntoIterator<Item = Regex>) -> Self {
        self.ip_allowlist = patterns.into_iter().collect();
        self
    }

    pub fn with_basic(mut self, basic: BasicAuth) -> Self {
        self.basic = Some(basic);
        self
    }

    /// A connecting peer address must match at least one whitelist
    /// pattern, if any are configured (spec §4.10 "IP whitelist").
    pub fn check_peer(&self, addr: &str) -> DioResult<()> {
        if self.ip_allowlist.is_empty() {
            return Ok(());
        }
        if self.ip_allowlist.iter().any(|re| re.is_match(addr)) {
            Ok(())
        } else {
            Err(DioError::Unauthorized)
        }
    }

    /// Wrong or missing credentials fail with `Unauthorized` before any
    /// worker is spawned (spec §4.10).
    pub fn check_credentials(&self, authorization: Option<&str>) -> DioResult<()> {
        let Some(basic) = &self.basic else { return Ok(()) };
        match authorization {
            Some(header) if basic.verify(header) => Ok(()),
            _ => Err(DioError::Unauthorized),
        }
    }
}

fn derive_key(passphrase: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(passphrase.as_bytes());
    hasher.finalize().into()
}

fn encrypt(passphrase: &str, plaintext: &[u8]) -> String {
    let key_bytes = derive_key(passphrase);
    let key = Key::<Aes256Gcm>::from_slice(&key_bytes);
    let cipher = Aes256Gcm::new(key);

    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    // Infallible with a fixed-size key/nonce pair; AES-GCM only errors on
    // buffer-size mismatches we don't hit here.
    let ciphertext = cipher.encrypt(nonce, plaintext).unwrap_or_default();
    let mut blob = nonce_bytes.to_vec();
    blob.extend_from_slice(&ciphertext);
    BASE64.encode(blob)
}

fn decrypt(passphrase: &str, encoded: &str) -> Option<Vec<u8>> {
    let blob = BASE64.decode(encoded).ok()?;
    if blob.len() < NONCE_LEN {
        return None;
    }
    let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LEN);
    let key_bytes = derive_key(passphrase);
    let key = Key::<Aes256Gcm>::from_slice(&key_bytes);
    let cipher = Aes256Gcm::new(key);
    cipher.decrypt(Nonce::from_slice(nonce_bytes), ciphertext).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base64_credentials_round_trip_without_passphrase() {
        let auth = BasicAuth::new("foo", "bar");
        let encoded = auth.encode_credentials();
        assert!(auth.verify(&encoded));
        assert!(!auth.verify(&BASE64.encode("faoo:bar")));
    }

    #[test]
    fn encrypted_credentials_round_trip_with_passphrase() {
        let auth = BasicAuth::new("foo", "bar").with_passphrase("shh");
        let encoded = auth.encode_credentials();
        assert!(auth.verify(&encoded));
    }

    #[test]
    fn wrong_passphrase_fails_verification() {
        let auth = BasicAuth::new("foo", "bar").with_passphrase("shh");
        let encoded = auth.encode_credentials();
        let wrong = BasicAuth::new("foo", "bar").with_passphrase("other");
        assert!(!wrong.verify(&encoded));
    }

    #[test]
    fn empty_allowlist_accepts_any_peer() {
        let auth = ProxyAuth::new();
        assert!(auth.check_peer("10.0.0.1").is_ok());
    }

    #[test]
    fn allowlist_rejects_unmatched_peer() {
        let auth = ProxyAuth::new().with_ip_allowlist([Regex::new(r"^10\.0\.").unwrap()]);
        assert!(auth.check_peer("10.0.0.1").is_ok());
        assert!(matches!(auth.check_peer("192.168.0.1"), Err(DioError::Unauthorized)));
    }

    #[test]
    fn missing_credentials_unauthorized_when_basic_required() {
        let auth = ProxyAuth::new().with_basic(BasicAuth::new("foo", "bar"));
        assert!(matches!(auth.check_credentials(None), Err(DioError::Unauthorized)));
    }
}
