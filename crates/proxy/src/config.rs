// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Proxy server configuration (spec §4.10). A plain builder-pattern
//! struct constructed programmatically, matching the library-first
//! posture noted in SPEC_FULL.md "Configuration" — no implicit global
//! config file.

use std::path::PathBuf;

use distio_core::{DioError, DioResult};

use crate::auth::ProxyAuth;

/// Configuration for one proxy server instance (spec §4.10).
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// `0` means "let the OS assign a port" (spec §4.10 "Lifecycle":
    /// "`start()` resolves when the socket is listening (reports chosen
    /// port if system-assigned)").
    pub port: u16,
    pub root: PathBuf,
    pub max_concurrent_slaves: Option<u32>,
    pub kill_slaves_after_ms: Option<u64>,
    pub auth: ProxyAuth,
}

impl ProxyConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            port: 0,
            root: root.into(),
            max_concurrent_slaves: None,
            kill_slaves_after_ms: None,
            auth: ProxyAuth::default(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_max_concurrent_slaves(mut self, max: u32) -> Self {
        self.max_concurrent_slaves = Some(max);
        self
    }

    pub fn with_kill_slaves_after(mut self, ms: u64) -> Self {
        self.kill_slaves_after_ms = Some(ms);
        self
    }

    pub fn with_auth(mut self, auth: ProxyAuth) -> Self {
        self.auth = auth;
        self
    }

    /// `root` must exist and be a directory (spec §4.10 "Script root").
    pub fn validate(&self) -> DioResult<()> {
        if !self.root.is_dir() {
            return Err(DioError::BadArgument(format!(
                "script root {} does not exist or is not a directory",
                self.root.display()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_missing_root() {
        let config = ProxyConfig::new("/does/not/exist/hopefully");
        assert!(matches!(config.validate(), Err(DioError::BadArgument(_))));
    }

    #[test]
    fn validate_accepts_existing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = ProxyConfig::new(dir.path());
        assert!(config.validate().is_ok());
    }
}
