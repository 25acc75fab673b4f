use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::HeaderName;

use crate::{
    admission::{AdmissionController, AdmissionPolicy},
    affinity::{CacheAffinityRouter, HmacSigner},
    config::AppConfig,
    storage::ProfileStore,
    sync::{PartitionRegistry, ProfileSyncService},
};

#[derive(Clone)]
pub struct AppState {
    pub admission: Arc<AdmissionController>,
    pub policy: Arc<AdmissionPolicy>,
    pub affinity: CacheAffinityRouter,
    pub sync: ProfileSyncService,
    /// Header carrying the edge location code of the request
    pub edge_header: HeaderName,
    /// Trusted proxies appending to `X-Forwarded-For`; zero ignores the header
    pub trusted_proxy_hops: usize,
}

impl AppState {
    pub fn new(
        admission: Arc<AdmissionController>,
        policy: AdmissionPolicy,
        affinity: CacheAffinityRouter,
        sync: ProfileSyncService,
    ) -> Self {
        Self {
            admission,
            policy: Arc::new(policy),
            affinity,
            sync,
            edge_header: HeaderName::from_static(crate::config::DEFAULT_EDGE_HEADER),
            trusted_proxy_hops: 0,
        }
    }

    pub fn with_edge_header(mut self, edge_header: HeaderName) -> Self {
        self.edge_header = edge_header;
        self
    }

    pub fn with_trusted_proxy_hops(mut self, hops: usize) -> Self {
        self.trusted_proxy_hops = hops;
        self
    }

    /// Wires every component from `config` on top of `store`.
    pub fn from_config(config: &AppConfig, store: Arc<dyn ProfileStore>) -> Result<Self> {
        let signer = HmacSigner::new(&config.signing_secret)
            .context("failed to initialize region signer")?;
        let edge_header = HeaderName::from_bytes(config.edge_header.as_bytes())
            .with_context(|| format!("invalid edge header name '{}'", config.edge_header))?;
        let partitions =
            PartitionRegistry::default().with_idle_timeout(config.partition_idle_timeout);
        let sync = ProfileSyncService::new(store)
            .with_partitions(Arc::new(partitions))
            .create_missing_profiles(config.create_missing_profiles);

        Ok(Self::new(
            Arc::new(AdmissionController::in_memory()),
            config.admission_policy()?,
            CacheAffinityRouter::new(Arc::new(signer)),
            sync,
        )
        .with_edge_header(edge_header)
        .with_trusted_proxy_hops(config.trusted_proxy_hops))
    }
}
