//! Image Assembly Line records
//!
//! Build time metrics and delivery records, written as JSON documents to
//! S3 or to a local directory.

pub mod delivery;
pub mod error;
#[cfg(any(test, feature = "test-utils"))]
pub mod fakes;
pub mod metrics;
pub mod record;
pub mod s3;
pub mod store;

pub use delivery::DeliveryRecorder;
pub use error::{Result, StoreError};
pub use metrics::MetricsRecorder;
pub use record::{BuildMetric, DeliveryRecord, NO_ERROR};
pub use s3::S3Store;
pub use store::{FileStore, RecordStore};
