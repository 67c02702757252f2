//! Configuration Module
//!
//! Loads runtime settings from environment variables.

use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use serde::Deserialize;
use tracing::warn;

use crate::token::{TokenCodec, KEY_LEN};
use crate::views::{Group, PolicyStore, UserSpec};

/// Runtime configuration.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Clone)]
pub struct Config {
    /// Port the HTTP server listens on
    pub server_port: u16,
    /// JSON file declaring groups and users
    pub policy_file: Option<PathBuf>,
    /// JSON file of records served by the in-memory upstream
    pub fixtures_file: Option<PathBuf>,
    /// Maximum number of entries the cache can hold
    pub max_entries: usize,
    /// Records requested per upstream page
    pub page_size: u32,
    /// Oldest record a user may page back to; None = unbounded
    pub max_resource_age: Option<Duration>,
    /// Deadline for the upstream fetch serving a request
    pub fetch_timeout: Duration,
    /// How long a prefetched page stays in the cache
    pub prefetch_ttl: Duration,
    /// Number of prefetch workers
    pub prefetch_workers: usize,
    /// Pending prefetch jobs before new ones are dropped
    pub prefetch_queue_depth: usize,
    /// Deadline for a single prefetch job
    pub prefetch_timeout: Duration,
    /// Interval between expired-entry sweeps
    pub cleanup_interval: Duration,
    /// Key used to seal continuation cursors and media URLs
    pub secret_key: [u8; KEY_LEN],
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP port (default: 3000)
    /// - `POLICY_FILE` - Groups and users, JSON (default: none, no users)
    /// - `FIXTURES_FILE` - Records for the in-memory upstream, JSON (default: none)
    /// - `MAX_ENTRIES` - Maximum cache entries (default: 1000)
    /// - `PAGE_SIZE` - Records per page (default: 50)
    /// - `MAX_RESOURCE_AGE` - Maximum record age in seconds (default: unbounded)
    /// - `FETCH_TIMEOUT_MS` - Upstream deadline per request (default: 3000)
    /// - `PREFETCH_TTL` - Prefetched page lifetime in seconds (default: 300)
    /// - `PREFETCH_WORKERS` - Prefetch worker count (default: 4)
    /// - `PREFETCH_QUEUE_DEPTH` - Pending prefetch jobs (default: 64)
    /// - `PREFETCH_TIMEOUT` - Prefetch job deadline in seconds (default: 30)
    /// - `CLEANUP_INTERVAL` - Expired entry sweep in seconds (default: 30)
    /// - `SECRET_KEY` - 32 bytes, base64; a random key is generated when unset
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let secret_key = match env::var("SECRET_KEY") {
            Ok(value) if !value.trim().is_empty() => {
                parse_secret_key(value.trim()).context("SECRET_KEY is invalid")?
            }
            _ => {
                warn!("SECRET_KEY not set; generated a random key, tokens will not survive a restart");
                defaults.secret_key
            }
        };

        Ok(Self {
            server_port: env_or("SERVER_PORT", defaults.server_port),
            policy_file: env::var_os("POLICY_FILE").map(PathBuf::from),
            fixtures_file: env::var_os("FIXTURES_FILE").map(PathBuf::from),
            max_entries: env_or("MAX_ENTRIES", defaults.max_entries),
            page_size: env_or("PAGE_SIZE", defaults.page_size),
            max_resource_age: env::var("MAX_RESOURCE_AGE")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            fetch_timeout: Duration::from_millis(env_or("FETCH_TIMEOUT_MS", 3000)),
            prefetch_ttl: Duration::from_secs(env_or("PREFETCH_TTL", 300)),
            prefetch_workers: env_or("PREFETCH_WORKERS", defaults.prefetch_workers),
            prefetch_queue_depth: env_or("PREFETCH_QUEUE_DEPTH", defaults.prefetch_queue_depth),
            prefetch_timeout: Duration::from_secs(env_or("PREFETCH_TIMEOUT", 30)),
            cleanup_interval: Duration::from_secs(env_or("CLEANUP_INTERVAL", 30)),
            secret_key,
        })
    }

    /// Builds the token codec for the configured key.
    pub fn token_codec(&self) -> TokenCodec {
        TokenCodec::new(self.secret_key)
    }

    /// Loads the policy tables from `policy_file`.
    ///
    /// Without a policy file the store is empty and every request that
    /// names a user is refused.
    pub fn load_policies(&self) -> anyhow::Result<PolicyStore> {
        match &self.policy_file {
            Some(path) => load_policy_file(path),
            None => {
                warn!("POLICY_FILE not set; no users can sign in");
                Ok(PolicyStore::default())
            }
        }
    }
}

/// On-disk policy layout.
#[derive(Debug, Deserialize)]
struct PolicyFile {
    #[serde(default)]
    groups: Vec<Group>,
    #[serde(default)]
    users: Vec<UserSpec>,
}

fn load_policy_file(path: &Path) -> anyhow::Result<PolicyStore> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("could not read policy file {}", path.display()))?;
    let file: PolicyFile = serde_json::from_str(&raw)
        .with_context(|| format!("could not parse policy file {}", path.display()))?;
    PolicyStore::new(file.groups, file.users)
        .with_context(|| format!("invalid policy file {}", path.display()))
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Decodes a base64 (url-safe or standard) 32-byte key.
pub fn parse_secret_key(encoded: &str) -> anyhow::Result<[u8; KEY_LEN]> {
    let bytes = URL_SAFE_NO_PAD
        .decode(encoded.as_bytes())
        .or_else(|_| STANDARD.decode(encoded.as_bytes()))
        .context("not valid base64")?;
    if bytes.len() != KEY_LEN {
        bail!("expected {} bytes, got {}", KEY_LEN, bytes.len());
    }
    let mut key = [0u8; KEY_LEN];
    key.copy_from_slice(&bytes);
    Ok(key)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            policy_file: None,
            fixtures_file: None,
            max_entries: 1000,
            page_size: 50,
            max_resource_age: None,
            fetch_timeout: Duration::from_secs(3),
            prefetch_ttl: Duration::from_secs(300),
            prefetch_workers: 4,
            prefetch_queue_depth: 64,
            prefetch_timeout: Duration::from_secs(30),
            cleanup_interval: Duration::from_secs(30),
            secret_key: TokenCodec::random_key(),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("server_port", &self.server_port)
            .field("policy_file", &self.policy_file)
            .field("fixtures_file", &self.fixtures_file)
            .field("max_entries", &self.max_entries)
            .field("page_size", &self.page_size)
            .field("max_resource_age", &self.max_resource_age)
            .field("fetch_timeout", &self.fetch_timeout)
            .field("prefetch_ttl", &self.prefetch_ttl)
            .field("prefetch_workers", &self.prefetch_workers)
            .field("prefetch_queue_depth", &self.prefetch_queue_depth)
            .field("prefetch_timeout", &self.prefetch_timeout)
            .field("cleanup_interval", &self.cleanup_interval)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}
