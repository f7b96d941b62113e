//!
//! vaxgate server binary
//! ---------------------
//! Command-line entry point for the portal gateway. Configuration comes from
//! `VAXGATE_*` environment variables; CLI flags override them.

use anyhow::{Context, Result};
use std::env;

use vaxgate::config::GateConfig;

fn parse_port_arg(args: &[String], flag: &str) -> Result<Option<u16>> {
    match flag_value(args, flag) {
        Some(v) => v.parse::<u16>().map(Some).with_context(|| format!("{} expects a port number, got '{}'", flag, v)),
        None => Ok(None),
    }
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag {
            return args.get(i + 1).map(|s| s.as_str());
        }
        i += 1;
    }
    None
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .try_init();

    let args: Vec<String> = env::args().collect();

    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        println!("vaxgate server\n\nUSAGE:\n  vaxgate_server [--http-port N] [--backend-url URL]\n\nOPTIONS:\n  --http-port N        HTTP port (env: VAXGATE_HTTP_PORT, default 3000)\n  --backend-url URL    Backend REST API base (env: VAXGATE_BACKEND_URL, default http://localhost:8000)\n\nENVIRONMENT:\n  VAXGATE_ENV=production       Mark cookies Secure\n  VAXGATE_COOKIE_MAX_AGE       Session lifetime in seconds (default 3600)\n  VAXGATE_UNKNOWN_ROLE         relogin | deny (default relogin)\n  VAXGATE_ROLE_TABLE           JSON file mapping roles to path prefixes\n  VAXGATE_PUBLIC_PATHS         Comma-separated public prefixes\n  VAXGATE_REQUEST_TIMEOUT_MS   Backend timeout (default 30000)\n  VAXGATE_RETRIES              Retries for GETs; POSTs retry only failed connects (default 2)\n");
        return Ok(());
    }

    let mut cfg = GateConfig::from_env().context("invalid gateway configuration")?;

    // CLI arguments override environment
    if let Some(port) = parse_port_arg(&args, "--http-port")? {
        cfg.http_port = port;
    }
    if let Some(url) = flag_value(&args, "--backend-url") {
        let url = url.trim_end_matches('/');
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            anyhow::bail!("--backend-url must be an http(s) URL, got '{}'", url);
        }
        cfg.backend_url = url.to_string();
    }

    vaxgate::server::run_with_config(cfg).await
}
