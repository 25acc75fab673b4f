use crate::admission::{AdmissionPolicy, BucketConfig};
use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Signing secret used when `CLOUDSAVE_SIGNING_SECRET` is unset.
pub const DEV_SIGNING_SECRET: &str = "cloudsave-dev-secret";
pub const DEFAULT_EDGE_HEADER: &str = "x-edge-location";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub signing_secret: String,
    pub edge_header: String,
    /// Root of the JSON file store; `None` keeps profiles in memory
    pub data_dir: Option<PathBuf>,
    pub create_missing_profiles: bool,
    pub rate_capacity: u32,
    pub rate_initial: u32,
    pub rate_refill: f64,
    /// Reverse proxies in front of the server that append to `X-Forwarded-For`;
    /// zero keys admission on the socket peer address
    pub trusted_proxy_hops: usize,
    pub bucket_prune_interval: Duration,
    pub partition_idle_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("APP_HOST").unwrap_or_else(|| "0.0.0.0".to_string());

        let port = lookup("APP_PORT")
            .unwrap_or_else(|| "8080".to_string())
            .parse::<u16>()
            .context("APP_PORT must be a valid u16")?;

        let signing_secret = match lookup("CLOUDSAVE_SIGNING_SECRET") {
            Some(secret) if !secret.is_empty() => secret,
            _ => {
                warn!("CLOUDSAVE_SIGNING_SECRET is not set, using the development secret");
                DEV_SIGNING_SECRET.to_string()
            }
        };

        let edge_header = lookup("CLOUDSAVE_EDGE_HEADER")
            .unwrap_or_else(|| DEFAULT_EDGE_HEADER.to_string())
            .to_ascii_lowercase();

        let data_dir = lookup("CLOUDSAVE_DATA_DIR")
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from);

        let create_missing_profiles = lookup("CLOUDSAVE_CREATE_MISSING_PROFILES")
            .map(|raw| parse_flag(&raw))
            .transpose()
            .context("CLOUDSAVE_CREATE_MISSING_PROFILES must be true or false")?
            .unwrap_or(false);

        let rate_capacity = lookup("CLOUDSAVE_RATE_CAPACITY")
            .unwrap_or_else(|| "20".to_string())
            .parse::<u32>()
            .context("CLOUDSAVE_RATE_CAPACITY must be a valid u32")?;

        let rate_initial = match lookup("CLOUDSAVE_RATE_INITIAL") {
            Some(raw) => raw
                .parse::<u32>()
                .context("CLOUDSAVE_RATE_INITIAL must be a valid u32")?,
            None => rate_capacity,
        };

        let rate_refill = lookup("CLOUDSAVE_RATE_REFILL")
            .unwrap_or_else(|| "2.0".to_string())
            .parse::<f64>()
            .context("CLOUDSAVE_RATE_REFILL must be a number")?;

        let trusted_proxy_hops = lookup("CLOUDSAVE_TRUSTED_PROXY_HOPS")
            .unwrap_or_else(|| "0".to_string())
            .parse::<usize>()
            .context("CLOUDSAVE_TRUSTED_PROXY_HOPS must be a non-negative integer")?;

        let bucket_prune_interval = Duration::from_secs(
            lookup("CLOUDSAVE_BUCKET_PRUNE_SECS")
                .unwrap_or_else(|| "60".to_string())
                .parse::<u64>()
                .context("CLOUDSAVE_BUCKET_PRUNE_SECS must be a valid u64")?,
        );

        let partition_idle_timeout = Duration::from_secs(
            lookup("CLOUDSAVE_PARTITION_IDLE_SECS")
                .unwrap_or_else(|| "60".to_string())
                .parse::<u64>()
                .context("CLOUDSAVE_PARTITION_IDLE_SECS must be a valid u64")?,
        );

        Ok(Self {
            host,
            port,
            signing_secret,
            edge_header,
            data_dir,
            create_missing_profiles,
            rate_capacity,
            rate_initial,
            rate_refill,
            trusted_proxy_hops,
            bucket_prune_interval,
            partition_idle_timeout,
        })
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn bucket_config(&self) -> Result<BucketConfig> {
        BucketConfig::new(self.rate_capacity, self.rate_initial, self.rate_refill)
            .context("invalid admission bucket configuration")
    }

    pub fn admission_policy(&self) -> Result<AdmissionPolicy> {
        Ok(AdmissionPolicy::new(self.bucket_config()?))
    }
}

fn parse_flag(raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(anyhow::anyhow!("unrecognized flag value '{raw}'")),
    }
}
