use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use crate::types::ConfigStore;

/// Config persisted as one JSON object on disk.
///
/// Writes go to a sibling temp file first and are renamed into place, so a
/// crash never leaves a half-written config behind.
#[derive(Debug)]
pub struct FileConfigStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<Map<String, Value>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("read {}", self.path.display()));
            }
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Map::new());
        }
        match serde_json::from_slice::<Value>(&bytes)
            .with_context(|| format!("parse {}", self.path.display()))?
        {
            Value::Object(map) => Ok(map),
            other => anyhow::bail!(
                "{} holds a JSON {} instead of an object",
                self.path.display(),
                json_kind(&other)
            ),
        }
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[async_trait::async_trait]
impl ConfigStore for FileConfigStore {
    async fn get_all(&self) -> Result<Map<String, Value>> {
        self.read().await
    }

    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.read().await?.remove(key))
    }

    async fn set(&self, items: Map<String, Value>) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut current = self.read().await?;
        for (k, v) in items {
            current.insert(k, v);
        }

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("create {}", dir.display()))?;
        }

        let tmp = self.path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(&Value::Object(current))?;
        tokio::fs::write(&tmp, bytes)
            .await
            .with_context(|| format!("write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("replace {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{install_defaults, load_config};

    fn scratch_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("chakwrite-store-{}", uuid::Uuid::new_v4()))
            .join("config.json")
    }

    #[tokio::test]
    async fn missing_file_reads_as_empty() {
        let store = FileConfigStore::new(scratch_path());
        assert!(store.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn set_merges_top_level_keys_on_disk() {
        let path = scratch_path();
        let store = FileConfigStore::new(&path);
        install_defaults(&store).await.unwrap();

        let mut items = Map::new();
        items.insert("apiConfig".to_string(), json!({ "defaultModel": "local" }));
        store.set(items).await.unwrap();

        let reopened = FileConfigStore::new(&path);
        let cfg = load_config(&reopened).await.unwrap();
        assert_eq!(cfg.user_preferences.theme, "dark");
        assert_eq!(cfg.extra["apiConfig"]["defaultModel"], "local");

        let _ = tokio::fs::remove_dir_all(path.parent().unwrap()).await;
    }

    #[tokio::test]
    async fn non_object_file_is_rejected() {
        let path = scratch_path();
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        tokio::fs::write(&path, b"[1, 2]").await.unwrap();

        let err = FileConfigStore::new(&path).get_all().await.unwrap_err();
        assert!(err.to_string().contains("array"));

        let _ = tokio::fs::remove_dir_all(path.parent().unwrap()).await;
    }
}
