//! In-memory stores (testing only)

use crate::error::{Result, StoreError};
use crate::store::RecordStore;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Keeps every record in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(&self) -> Vec<String> {
        self.records.lock().unwrap().keys().cloned().collect()
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.records.lock().unwrap().get(key).cloned()
    }

    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(key)
            .and_then(|body| serde_json::from_slice(&body).ok())
    }

    /// Every record whose key starts with `prefix`, decoded
    pub fn list_json<T: DeserializeOwned>(&self, prefix: &str) -> Vec<T> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .filter_map(|(_, body)| serde_json::from_slice(body).ok())
            .collect()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<()> {
        self.records.lock().unwrap().insert(key.to_string(), body);
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

/// Rejects every write
#[derive(Debug)]
pub struct FailingStore {
    message: String,
}

impl FailingStore {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl RecordStore for FailingStore {
    async fn put(&self, key: &str, _body: Vec<u8>) -> Result<()> {
        Err(StoreError::S3 {
            bucket: "failing".to_string(),
            key: key.to_string(),
            message: self.message.clone(),
        })
    }

    fn location(&self) -> String {
        "s3://failing".to_string()
    }
}
