use crate::domain::platform::Platform;
use crate::error::PaymentError;
use crate::service::store::PaymentStore;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Platforms resolved by API key, kept for `ttl`.
#[derive(Clone)]
pub struct PlatformCache {
    pub store: Arc<dyn PaymentStore>,
    inner: Arc<RwLock<HashMap<String, (Instant, Platform)>>>,
    ttl: Duration,
}

impl PlatformCache {
    pub fn new(store: Arc<dyn PaymentStore>, ttl: Duration) -> Self {
        Self {
            store,
            inner: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Checks both keys and the active flag. A missing key is `Auth`, a key
    /// that does not resolve to an active platform is `Forbidden`.
    pub async fn authenticate(&self, api_key: &str, secret_key: &str) -> Result<Platform, PaymentError> {
        if api_key.is_empty() || secret_key.is_empty() {
            return Err(PaymentError::Auth("X-API-KEY and X-SECRET-KEY are required".to_string()));
        }
        let platform = self
            .lookup(api_key)
            .await?
            .ok_or_else(|| PaymentError::Forbidden("unknown platform".to_string()))?;
        if platform.secret_key != secret_key || !platform.is_active {
            return Err(PaymentError::Forbidden("platform is not allowed".to_string()));
        }
        Ok(platform)
    }

    async fn lookup(&self, api_key: &str) -> anyhow::Result<Option<Platform>> {
        {
            let read = self.inner.read().await;
            if let Some((loaded_at, platform)) = read.get(api_key) {
                if loaded_at.elapsed() <= self.ttl {
                    return Ok(Some(platform.clone()));
                }
            }
        }

        let Some(platform) = self.store.find_platform_by_api_key(api_key).await? else {
            return Ok(None);
        };
        let mut write = self.inner.write().await;
        write.insert(api_key.to_string(), (Instant::now(), platform.clone()));
        Ok(Some(platform))
    }
}
