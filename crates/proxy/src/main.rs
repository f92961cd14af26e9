// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `distio-proxyd`: standalone proxy server binary (spec §6 "Proxy CLI").

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use distio_proxy::{BasicAuth, ProxyAuth, ProxyConfig, ProxyServer};
use regex::Regex;
use serde::Deserialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// `--port=<n>`, `--logLevel=<error|warn|info|verbose|number>`,
/// `--root=<path>`, `--maxConcurrentSlaves=<n>`, `--killSlavesAfter=<ms>`,
/// `--authorizedIps=<json-array-of-regex>`, `--basicAuth=<json-object>`
/// (spec §6 "Proxy CLI").
#[derive(Debug, Parser)]
#[command(name = "distio-proxyd", about = "distio remote worker proxy server")]
struct Args {
    #[arg(long, default_value_t = 0)]
    port: u16,

    #[arg(long = "logLevel", default_value = "info")]
    log_level: String,

    #[arg(long)]
    root: PathBuf,

    #[arg(long = "maxConcurrentSlaves")]
    max_concurrent_slaves: Option<u32>,

    #[arg(long = "killSlavesAfter")]
    kill_slaves_after: Option<u64>,

    /// JSON array of regex patterns, e.g. `["^10\\."]`.
    #[arg(long = "authorizedIps")]
    authorized_ips: Option<String>,

    /// JSON object, e.g. `{"username":"foo","password":"bar"}`.
    #[arg(long = "basicAuth")]
    basic_auth: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BasicAuthArg {
    username: String,
    password: String,
    #[serde(default)]
    passphrase: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(&args.log_level);

    let auth = match build_auth(&args) {
        Ok(auth) => auth,
        Err(message) => {
            eprintln!("{message}");
            return ExitCode::FAILURE;
        }
    };

    let mut config = ProxyConfig::new(args.root.clone()).with_port(args.port).with_auth(auth);
    if let Some(max) = args.max_concurrent_slaves {
        config = config.with_max_concurrent_slaves(max);
    }
    if let Some(ms) = args.kill_slaves_after {
        config = config.with_kill_slaves_after(ms);
    }

    let server = match ProxyServer::new(config) {
        Ok(server) => server,
        Err(e) => {
            eprintln!("invalid proxy configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    let addr = match server.start().await {
        Ok(addr) => addr,
        Err(e) => {
            eprintln!("failed to bind proxy socket: {e}");
            return ExitCode::FAILURE;
        }
    };
    info!(%addr, "distio-proxyd started");

    server.bind_sigint();
    server.wait_for_stop().await;
    ExitCode::SUCCESS
}

fn build_auth(args: &Args) -> Result<ProxyAuth, String> {
    let mut auth = ProxyAuth::new();

    if let Some(raw) = &args.authorized_ips {
        let patterns: Vec<String> =
            serde_json::from_str(raw).map_err(|e| format!("invalid --authorizedIps: {e}"))?;
        let mut regexes = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            let regex = Regex::new(&pattern)
                .map_err(|e| format!("invalid --authorizedIps pattern {pattern:?}: {e}"))?;
            regexes.push(regex);
        }
        auth = auth.with_ip_allowlist(regexes);
    }

    if let Some(raw) = &args.basic_auth {
        let parsed: BasicAuthArg =
            serde_json::from_str(raw).map_err(|e| format!("invalid --basicAuth: {e}"))?;
        let mut basic = BasicAuth::new(parsed.username, parsed.password);
        if let Some(passphrase) = parsed.passphrase {
            basic = basic.with_passphrase(passphrase);
        }
        auth = auth.with_basic(basic);
    }

    Ok(auth)
}

/// Accepts the standard level names plus `verbose` (alias for `debug`) and
/// a bare syslog-style number 0-4, least to most verbose (spec §6
/// "`--logLevel=<error|warn|info|verbose|number>`").
fn init_tracing(log_level: &str) {
    let directive = match log_level {
        "verbose" => "debug".to_string(),
        "0" => "error".to_string(),
        "1" => "warn".to_string(),
        "2" => "info".to_string(),
        "3" => "debug".to_string(),
        "4" => "trace".to_string(),
        other => other.to_string(),
    };
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
