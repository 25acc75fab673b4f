use super::bucket::{BucketConfig, BucketState};
use super::store::{BucketStore, DashMapBucketStore};
use crate::core::{Clock, Result, SyncError, SystemClock};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Limiter key: a route, optionally narrowed to one client.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AdmissionKey {
    route: String,
    client: Option<String>,
}

impl AdmissionKey {
    pub fn route(route: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            client: None,
        }
    }

    pub fn with_client(mut self, client: impl Into<String>) -> Self {
        self.client = Some(client.into());
        self
    }

    pub fn route_name(&self) -> &str {
        &self.route
    }
}

impl fmt::Display for AdmissionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.client {
            Some(client) => write!(f, "{}|{}", self.route, client),
            None => f.write_str(&self.route),
        }
    }
}

/// Per-route bucket configuration with a fallback for unlisted routes.
#[derive(Debug, Clone)]
pub struct AdmissionPolicy {
    default: BucketConfig,
    routes: HashMap<String, BucketConfig>,
}

impl AdmissionPolicy {
    pub fn new(default: BucketConfig) -> Self {
        Self {
            default,
            routes: HashMap::new(),
        }
    }

    pub fn with_route(mut self, route: impl Into<String>, config: BucketConfig) -> Self {
        self.routes.insert(route.into(), config);
        self
    }

    pub fn config_for(&self, route: &str) -> &BucketConfig {
        self.routes.get(route).unwrap_or(&self.default)
    }
}

/// Token-bucket admission gate shared by all request handlers.
///
/// Denial is a normal outcome: `try_acquire` reports it as `false`, and
/// only `admit` turns it into [`SyncError::RateLimited`] for the caller.
pub struct AdmissionController<S: BucketStore = DashMapBucketStore> {
    store: S,
    clock: Arc<dyn Clock>,
}

impl AdmissionController<DashMapBucketStore> {
    pub fn in_memory() -> Self {
        Self::new(DashMapBucketStore::new(), Arc::new(SystemClock))
    }
}

impl<S: BucketStore> AdmissionController<S> {
    pub fn new(store: S, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Refills the bucket for `key`, then consumes one token if available.
    ///
    /// The refreshed state is stored whether or not a token was taken.
    pub fn try_acquire(&self, key: &str, config: &BucketConfig) -> bool {
        let now = self.clock.now();
        self.store.get_and_update(
            key,
            || BucketState::new(config, now),
            |state| state.try_take(config, now),
        )
    }

    /// Like [`try_acquire`](Self::try_acquire), surfacing denial as an error.
    pub fn admit(&self, key: &AdmissionKey, config: &BucketConfig) -> Result<()> {
        let key = key.to_string();
        if self.try_acquire(&key, config) {
            Ok(())
        } else {
            debug!(key = %key, "admission denied");
            Err(SyncError::RateLimited { key })
        }
    }

    /// Admits `key` using the bucket configured for its route.
    pub fn admit_with(&self, key: &AdmissionKey, policy: &AdmissionPolicy) -> Result<()> {
        self.admit(key, policy.config_for(key.route_name()))
    }

    /// Drops every bucket that has refilled to capacity and returns how many
    /// were removed.
    ///
    /// A recreated bucket starts at the route's `initial_tokens`, which never
    /// exceeds capacity, so a pruned key cannot regain more than it had.
    pub fn prune(&self, policy: &AdmissionPolicy) -> usize {
        let now = self.clock.now();
        let mut removed = 0;
        self.store.retain(|key, state| {
            let route = key.split_once('|').map_or(key, |(route, _)| route);
            let config = policy.config_for(route);
            state.refill(config, now);
            let keep = state.tokens < f64::from(config.capacity());
            if !keep {
                removed += 1;
            }
            keep
        });
        if removed > 0 {
            debug!(removed, remaining = self.store.len(), "pruned idle admission buckets");
        }
        removed
    }

    pub fn peek(&self, key: &str) -> Option<BucketState> {
        self.store.get(key)
    }

    pub fn tracked_keys(&self) -> usize {
        self.store.len()
    }
}
