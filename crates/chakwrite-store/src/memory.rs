use std::sync::Arc;

use anyhow::Result;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use crate::types::ConfigStore;

#[derive(Debug, Clone, Default)]
pub struct MemoryConfigStore {
    inner: Arc<RwLock<Map<String, Value>>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(items: Map<String, Value>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(items)),
        }
    }
}

#[async_trait::async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn get_all(&self) -> Result<Map<String, Value>> {
        Ok(self.inner.read().await.clone())
    }

    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.inner.read().await.get(key).cloned())
    }

    async fn set(&self, items: Map<String, Value>) -> Result<()> {
        let mut inner = self.inner.write().await;
        for (k, v) in items {
            inner.insert(k, v);
        }
        Ok(())
    }
}
