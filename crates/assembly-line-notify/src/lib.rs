//! Image Assembly Line notifications
//!
//! Posts build results and vulnerability alerts to Slack. Notification
//! failures never decide the outcome of a build; callers log and move on.

pub mod channel;
pub mod error;
#[cfg(any(test, feature = "test-utils"))]
pub mod fakes;
pub mod gateway;
pub mod message;
pub mod slack;

pub use channel::{AlertRoutes, NotifyChannels};
pub use error::{NotifyError, Result};
pub use gateway::NotificationGateway;
pub use message::{ChatMessage, format_build_time};
pub use slack::{ChatApi, SlackClient};
