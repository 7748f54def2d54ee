//! # Store Client Registry
//!
//! Resolves a configuration name to a connected store client. Clients are
//! created on first use and cached for the life of the process: no eviction,
//! no TTL, no credential refresh.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::config::StoreConfig;
use crate::error::RegistryError;
use crate::store::{DynObjectStore, StoreFactory};

pub struct StoreRegistry {
    configs: BTreeMap<String, StoreConfig>,
    default_name: String,
    factory: Arc<dyn StoreFactory>,
    clients: RwLock<HashMap<String, DynObjectStore>>,
}

impl StoreRegistry {
    pub fn new(
        configs: BTreeMap<String, StoreConfig>,
        default_name: impl Into<String>,
        factory: Arc<dyn StoreFactory>,
    ) -> Self {
        Self {
            configs,
            default_name: default_name.into(),
            factory,
            clients: RwLock::new(HashMap::new()),
        }
    }

    /// Configuration names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.configs.keys().cloned().collect()
    }

    pub fn default_name(&self) -> &str {
        &self.default_name
    }

    /// The caller's configuration name, or the default when none was given.
    pub fn resolve_name<'a>(&'a self, name: Option<&'a str>) -> &'a str {
        match name {
            Some(n) if !n.trim().is_empty() => n,
            _ => &self.default_name,
        }
    }

    /// Client for `name`, connecting on first use.
    ///
    /// Repeated calls return the same `Arc`. The write path re-checks the
    /// cache, so concurrent first calls still construct a single client.
    ///
    /// # Rust Concept: Async RwLock
    ///
    /// `tokio::sync::RwLock` lets many readers hold the lock at once and
    /// yields to the runtime while waiting instead of blocking the thread.
    /// Guards are dropped at the end of their scope, which releases the lock.
    pub async fn client(&self, name: &str) -> Result<DynObjectStore, RegistryError> {
        if let Some(client) = self.clients.read().await.get(name) {
            return Ok(Arc::clone(client));
        }

        let config = self
            .configs
            .get(name)
            .ok_or_else(|| RegistryError::ConfigNotFound(name.to_string()))?;

        let mut clients = self.clients.write().await;
        if let Some(client) = clients.get(name) {
            debug!(config = %name, "Client created concurrently, reusing");
            return Ok(Arc::clone(client));
        }

        let client = self
            .factory
            .connect(config)
            .map_err(|source| RegistryError::ClientConstruction {
                name: name.to_string(),
                source,
            })?;

        info!(config = %name, bucket = %config.bucket, "Connected store client");
        clients.insert(name.to_string(), Arc::clone(&client));
        Ok(client)
    }
}
