//! Delivery records

use crate::error::Result;
use crate::record::DeliveryRecord;
use crate::store::RecordStore;
use std::sync::Arc;

/// Writes delivery records for successfully pushed images
#[derive(Clone)]
pub struct DeliveryRecorder {
    store: Arc<dyn RecordStore>,
}

impl DeliveryRecorder {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub async fn record(&self, record: &DeliveryRecord) -> Result<String> {
        let key = record.key();
        let body = serde_json::to_vec_pretty(record)?;
        self.store.put(&key, body).await?;

        tracing::info!("Recorded delivery {} in {}", key, self.store.location());
        Ok(key)
    }
}
