//! In-memory object store for tests.
//!
//! Objects keep insertion order so listings come back unsorted, like a real
//! store is allowed to. Every call is recorded so tests can assert which
//! remote operations were (or were not) issued.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;
use tokio::sync::RwLock;

use super::{ObjectInfo, ObjectStore, SEPARATOR};
use crate::error::StoreError;

#[derive(Debug, Clone)]
struct StoredObject {
    key: String,
    body: Vec<u8>,
}

pub struct MemoryObjectStore {
    bucket: String,
    objects: RwLock<Vec<StoredObject>>,
    calls: Mutex<Vec<String>>,
    failing: Mutex<HashSet<&'static str>>,
}

impl MemoryObjectStore {
    pub fn new(bucket: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            objects: RwLock::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
        }
    }

    /// Seed objects without recording calls.
    pub async fn with_objects(self, objects: &[(&str, &str)]) -> Self {
        {
            let mut stored = self.objects.write().await;
            for (key, body) in objects {
                stored.push(StoredObject {
                    key: key.to_string(),
                    body: body.as_bytes().to_vec(),
                });
            }
        }
        self
    }

    /// Make every future call of `operation` ("head", "copy", ...) fail.
    pub fn fail_on(&self, operation: &'static str) {
        self.failing.lock().unwrap().insert(operation);
    }

    /// Recorded calls, e.g. `["head:a", "copy:a->b"]`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count_calls(&self, operation: &str) -> usize {
        let prefix = format!("{}:", operation);
        self.calls().iter().filter(|c| c.starts_with(&prefix)).count()
    }

    pub async fn body(&self, key: &str) -> Option<String> {
        let objects = self.objects.read().await;
        objects
            .iter()
            .find(|o| o.key == key)
            .map(|o| String::from_utf8_lossy(&o.body).into_owned())
    }

    pub async fn keys(&self) -> Vec<String> {
        self.objects.read().await.iter().map(|o| o.key.clone()).collect()
    }

    fn record(&self, operation: &'static str, detail: String) -> Result<(), StoreError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{}:{}", operation, detail));

        if self.failing.lock().unwrap().contains(operation) {
            return Err(StoreError::Remote(format!("injected {} failure", operation)));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn head(&self, key: &str) -> Result<Option<ObjectInfo>, StoreError> {
        self.record("head", key.to_string())?;
        let objects = self.objects.read().await;

        Ok(objects
            .iter()
            .find(|o| o.key == key)
            .map(|o| ObjectInfo::new(&o.key, o.body.len() as u64, Some(Utc::now()))))
    }

    async fn copy(&self, source: &str, destination: &str) -> Result<(), StoreError> {
        self.record("copy", format!("{}->{}", source, destination))?;
        let mut objects = self.objects.write().await;

        let body = objects
            .iter()
            .find(|o| o.key == source)
            .map(|o| o.body.clone())
            .ok_or_else(|| StoreError::Remote(format!("NoSuchKey: {}", source)))?;

        match objects.iter_mut().find(|o| o.key == destination) {
            Some(existing) => existing.body = body,
            None => objects.push(StoredObject {
                key: destination.to_string(),
                body,
            }),
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.record("delete", key.to_string())?;
        self.objects.write().await.retain(|o| o.key != key);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>, StoreError> {
        self.record("list", prefix.to_string())?;
        let objects = self.objects.read().await;

        Ok(objects
            .iter()
            .filter(|o| match o.key.strip_prefix(prefix) {
                // one level: nothing nested below the prefix
                Some(rest) => !rest.trim_end_matches(SEPARATOR).contains(SEPARATOR),
                None => false,
            })
            .map(|o| ObjectInfo::new(&o.key, o.body.len() as u64, None))
            .collect())
    }

    async fn put_file(&self, key: &str, path: &Path) -> Result<u64, StoreError> {
        self.record("put", key.to_string())?;
        let body = tokio::fs::read(path).await.map_err(|e| StoreError::LocalFile {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let size = body.len() as u64;
        let mut objects = self.objects.write().await;

        match objects.iter_mut().find(|o| o.key == key) {
            Some(existing) => existing.body = body,
            None => objects.push(StoredObject {
                key: key.to_string(),
                body,
            }),
        }
        Ok(size)
    }

    fn object_url(&self, key: &str) -> String {
        format!("memory://{}/{}", self.bucket, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_is_one_level() {
        let store = MemoryObjectStore::new("b")
            .with_objects(&[
                ("img/a.png", "a"),
                ("img/", ""),
                ("img/sub/b.png", "b"),
                ("other/c.png", "c"),
            ])
            .await;

        let keys: Vec<String> = store
            .list("img/")
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.key)
            .collect();

        assert_eq!(keys, vec!["img/a.png", "img/"]);
    }

    #[tokio::test]
    async fn test_fail_on_records_then_fails() {
        let store = MemoryObjectStore::new("b");
        store.fail_on("delete");

        assert!(store.delete("x").await.is_err());
        assert_eq!(store.calls(), vec!["delete:x"]);
    }

    #[tokio::test]
    async fn test_put_file_missing_path() {
        let store = MemoryObjectStore::new("b");
        let temp = tempfile::TempDir::new().unwrap();

        let result = store.put_file("k", &temp.path().join("gone.txt")).await;

        assert!(matches!(result, Err(StoreError::LocalFile { .. })));
        assert!(store.keys().await.is_empty());
    }
}
