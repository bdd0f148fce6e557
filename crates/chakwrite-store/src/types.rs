use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};

use chakwrite_common::{now_ms, SelectionContext, UserConfig};

/// Flat key/value storage with the semantics of the extension's local storage:
/// `set` replaces whole top-level keys and leaves the others untouched.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn get_all(&self) -> Result<Map<String, Value>>;
    async fn get(&self, key: &str) -> Result<Option<Value>>;
    async fn set(&self, items: Map<String, Value>) -> Result<()>;
}

/// Read the whole store as a typed snapshot. Only a failing store is an
/// error; malformed sections fall back to their defaults.
pub async fn load_config(store: &dyn ConfigStore) -> Result<UserConfig> {
    let items = store.get_all().await?;
    Ok(UserConfig::from_storage(items))
}

/// Seed the install-time defaults for every top-level key that is missing.
///
/// Returns the keys that were written.
pub async fn install_defaults(store: &dyn ConfigStore) -> Result<Vec<String>> {
    let Value::Object(defaults) = serde_json::to_value(UserConfig::default())? else {
        anyhow::bail!("default config did not serialize to an object");
    };

    let existing = store.get_all().await?;
    let missing: Map<String, Value> = defaults
        .into_iter()
        .filter(|(k, _)| k != "context" && !existing.contains_key(k))
        .collect();

    let written: Vec<String> = missing.keys().cloned().collect();
    if !missing.is_empty() {
        store.set(missing).await?;
        tracing::info!(keys = ?written, "installed default configuration");
    }
    Ok(written)
}

/// Record the page's latest selection under `context`.
pub async fn remember_selection(store: &dyn ConfigStore, selected_text: &str) -> Result<()> {
    let context = SelectionContext {
        last_selected_text: Some(selected_text.to_string()),
        updated_at: Some(now_ms()),
    };
    let mut items = Map::new();
    items.insert("context".to_string(), serde_json::to_value(context)?);
    store.set(items).await
}
