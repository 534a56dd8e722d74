//! Slack channel selection
//!
//! Routes vulnerability alerts to a product channel when the image name
//! contains a configured product name. Routes are checked in configuration
//! order and the first match wins.

use crate::error::{NotifyError, Result};

/// Channels used by [`crate::NotificationGateway`]
#[derive(Debug, Clone, Default)]
pub struct NotifyChannels {
    /// Build failure notifications (SLACK_CONTAINERS_NOTIFICATION)
    pub build_failed: Option<String>,
    /// Ready-to-deploy notifications (SLACK_CICD_NOTIFICATION_TEST)
    pub ready_to_deploy: Option<String>,
    pub alerts: AlertRoutes,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertRoutes {
    routes: Vec<(String, String)>,
    default_channel: Option<String>,
}

impl AlertRoutes {
    pub fn new(default_channel: Option<String>) -> Self {
        Self {
            routes: Vec::new(),
            default_channel: default_channel.filter(|c| !c.is_empty()),
        }
    }

    pub fn with_route(mut self, product: impl Into<String>, channel: impl Into<String>) -> Self {
        self.routes.push((product.into(), channel.into()));
        self
    }

    /// Pair up comma separated product names and channel ids by position
    ///
    /// Blank entries are skipped; extra products without a channel are ignored.
    pub fn with_route_lists(mut self, products: &str, channels: &str) -> Self {
        for (product, channel) in products.split(',').zip(channels.split(',')) {
            let (product, channel) = (product.trim(), channel.trim());
            if product.is_empty() || channel.is_empty() {
                continue;
            }
            self.routes.push((product.to_string(), channel.to_string()));
        }
        self
    }

    pub fn routes(&self) -> &[(String, String)] {
        &self.routes
    }

    /// Pick the channel for a vulnerability alert on `image_name`
    ///
    /// An explicit, non-empty channel always wins. Otherwise the first route
    /// whose product name is contained in the image name, then the default
    /// alert channel.
    pub fn select(&self, image_name: &str, explicit: Option<&str>) -> Result<String> {
        if let Some(channel) = explicit.filter(|c| !c.is_empty()) {
            return Ok(channel.to_string());
        }

        let default_channel = self
            .default_channel
            .as_ref()
            .ok_or(NotifyError::MissingChannel("SLACK_TRIVY_ALERT"))?;

        Ok(self
            .routes
            .iter()
            .find(|(product, _)| image_name.contains(product.as_str()))
            .map(|(_, channel)| channel.clone())
            .unwrap_or_else(|| default_channel.clone()))
    }
}
