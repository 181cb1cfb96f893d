use std::path::PathBuf;

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::{Map, Value};

use super::KvStore;
use crate::error::BridgeError;

/// JSON object persisted to one file, loaded into memory on first access and
/// written through on every mutation.
pub struct FileKvStore {
    path: PathBuf,
    cache: tokio::sync::Mutex<Option<Map<String, Value>>>,
}

impl FileKvStore {
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: tokio::sync::Mutex::new(None),
        }
    }

    async fn load(&self) -> Result<Map<String, Value>, BridgeError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) if contents.trim().is_empty() => Ok(Map::new()),
            Ok(contents) => serde_json::from_str(&contents).map_err(|err| {
                BridgeError::Storage(format!(
                    "{} is not a JSON object: {err}",
                    self.path.display()
                ))
            }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Map::new()),
            Err(err) => Err(BridgeError::Storage(format!(
                "failed to read {}: {err}",
                self.path.display()
            ))),
        }
    }

    async fn persist(&self, map: &Map<String, Value>) -> Result<(), BridgeError> {
        let contents = serde_json::to_string_pretty(map)
            .map_err(|err| BridgeError::Storage(format!("failed to encode cache: {err}")))?;
        tokio::fs::write(&self.path, contents).await.map_err(|err| {
            BridgeError::Storage(format!("failed to write {}: {err}", self.path.display()))
        })
    }

    /// Apply `mutate` to a copy of the map, persist it, then publish it.
    async fn update(
        &self,
        mutate: impl FnOnce(&mut Map<String, Value>) -> bool + Send,
    ) -> Result<(), BridgeError> {
        let mut guard = self.cache.lock().await;
        let mut next = match guard.as_ref() {
            Some(map) => map.clone(),
            None => self.load().await?,
        };
        if mutate(&mut next) {
            self.persist(&next).await?;
        }
        *guard = Some(next);
        Ok(())
    }
}

impl KvStore for FileKvStore {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Value>, BridgeError>> {
        Box::pin(async move {
            let mut guard = self.cache.lock().await;
            if guard.is_none() {
                *guard = Some(self.load().await?);
            }
            Ok(guard.as_ref().and_then(|map| map.get(key)).cloned())
        })
    }

    fn put<'a>(&'a self, key: &'a str, value: Value) -> BoxFuture<'a, Result<(), BridgeError>> {
        Box::pin(async move {
            self.update(move |map| {
                map.insert(key.to_string(), value);
                true
            })
            .await
        })
    }

    fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<(), BridgeError>> {
        Box::pin(async move { self.update(move |map| map.remove(key).is_some()).await })
    }
}

/// Process-local store for tests and ephemeral deployments.
#[derive(Default)]
pub struct MemoryKvStore {
    entries: Mutex<FxHashMap<String, Value>>,
}

impl MemoryKvStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryKvStore {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Value>, BridgeError>> {
        let value = self.entries.lock().get(key).cloned();
        Box::pin(async move { Ok(value) })
    }

    fn put<'a>(&'a self, key: &'a str, value: Value) -> BoxFuture<'a, Result<(), BridgeError>> {
        self.entries.lock().insert(key.to_string(), value);
        Box::pin(async { Ok(()) })
    }

    fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<(), BridgeError>> {
        self.entries.lock().remove(key);
        Box::pin(async { Ok(()) })
    }
}
