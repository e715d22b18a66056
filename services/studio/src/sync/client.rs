//! services/studio/src/sync/client.rs
//!
//! Holds the one remote store handle in use, keyed by the credentials that
//! built it. Asking again with byte-identical credentials returns the same
//! handle; different credentials build a new one and replace it in a single
//! write, so readers see either the old handle or the new one. If the new
//! credentials cannot connect, the old handle is dropped all the same.

use arunika_core::domain::RemoteConfig;
use arunika_core::ports::{PortResult, RemoteStore, RemoteStoreFactory};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

struct CachedClient {
    config: RemoteConfig,
    client: Arc<dyn RemoteStore>,
}

pub struct ClientRegistry {
    factory: Arc<dyn RemoteStoreFactory>,
    origin: Uuid,
    current: RwLock<Option<CachedClient>>,
}

impl ClientRegistry {
    pub fn new(factory: Arc<dyn RemoteStoreFactory>, origin: Uuid) -> Self {
        Self {
            factory,
            origin,
            current: RwLock::new(None),
        }
    }

    /// Returns the handle for `config`, or `None` when the credentials are incomplete.
    pub async fn client_for(&self, config: &RemoteConfig) -> PortResult<Option<Arc<dyn RemoteStore>>> {
        if !config.is_complete() {
            if self.current.write().await.take().is_some() {
                info!("Remote credentials cleared; running in local-only mode");
            }
            return Ok(None);
        }

        if let Some(cached) = self.current.read().await.as_ref() {
            if cached.config == *config {
                return Ok(Some(cached.client.clone()));
            }
        }

        let mut current = self.current.write().await;
        // Another caller may have connected while we waited for the lock.
        if let Some(cached) = current.as_ref() {
            if cached.config == *config {
                return Ok(Some(cached.client.clone()));
            }
        }
        let client = match self.factory.connect(config, self.origin).await {
            Ok(client) => client,
            Err(e) => {
                if current.take().is_some() {
                    warn!("Dropped the previous remote handle; new credentials failed: {}", e);
                }
                return Err(e);
            }
        };
        info!("Connected remote store at {}", config.endpoint_url);
        *current = Some(CachedClient {
            config: config.clone(),
            client: client.clone(),
        });
        Ok(Some(client))
    }

    /// The handle currently in use, if any.
    pub async fn current(&self) -> Option<Arc<dyn RemoteStore>> {
        self.current.read().await.as_ref().map(|c| c.client.clone())
    }
}
