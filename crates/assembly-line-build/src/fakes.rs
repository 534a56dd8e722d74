//! In-memory fakes for the daemon, build tool and scanner seams (testing only)

use crate::auth::RegistryCredentials;
use crate::builder::{BuildRequest, ImageBuilder};
use crate::daemon::DockerDaemon;
use crate::error::{DaemonError, Result as DaemonResult};
use crate::scanner::{ScanOptions, ScanReport, VulnerabilityScanner};
use assembly_line_core::{AssemblyError, BuiltImage, ImageRecord, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// (name, tag, username)
pub type PushCall = (String, String, Option<String>);

/// Docker daemon fake. Tag and push responses are 2xx unless a failure is
/// registered for the tag.
#[derive(Debug, Default)]
pub struct FakeDaemon {
    images: Vec<ImageRecord>,
    tag_failures: HashMap<String, (u16, String)>,
    push_failures: HashMap<String, (u16, String)>,
    tagged: Mutex<Vec<(String, String, String)>>,
    pushed: Mutex<Vec<PushCall>>,
}

impl FakeDaemon {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_images(mut self, images: Vec<ImageRecord>) -> Self {
        self.images = images;
        self
    }

    pub fn fail_tag(mut self, tag: &str, status: u16, message: &str) -> Self {
        self.tag_failures
            .insert(tag.to_string(), (status, message.to_string()));
        self
    }

    pub fn fail_push(mut self, tag: &str, status: u16, message: &str) -> Self {
        self.push_failures
            .insert(tag.to_string(), (status, message.to_string()));
        self
    }

    /// (image_id, repo, tag) in call order
    pub fn tagged(&self) -> Vec<(String, String, String)> {
        self.tagged.lock().unwrap().clone()
    }

    pub fn pushed(&self) -> Vec<PushCall> {
        self.pushed.lock().unwrap().clone()
    }
}

#[async_trait]
impl DockerDaemon for FakeDaemon {
    async fn list_images(&self, reference: &str) -> DaemonResult<Vec<ImageRecord>> {
        Ok(self
            .images
            .iter()
            .filter(|image| image.repo_tags.iter().any(|t| t.starts_with(reference)))
            .cloned()
            .collect())
    }

    async fn tag_image(&self, image_id: &str, repo: &str, tag: &str) -> DaemonResult<()> {
        if let Some((status, message)) = self.tag_failures.get(tag) {
            return Err(DaemonError::Status {
                status: *status,
                message: message.clone(),
            });
        }
        self.tagged.lock().unwrap().push((
            image_id.to_string(),
            repo.to_string(),
            tag.to_string(),
        ));
        Ok(())
    }

    async fn push_image(
        &self,
        name: &str,
        tag: &str,
        credentials: Option<&RegistryCredentials>,
    ) -> DaemonResult<()> {
        if let Some((status, message)) = self.push_failures.get(tag) {
            return Err(DaemonError::Status {
                status: *status,
                message: message.clone(),
            });
        }
        self.pushed.lock().unwrap().push((
            name.to_string(),
            tag.to_string(),
            credentials.map(|c| c.username.clone()),
        ));
        Ok(())
    }
}

/// Build tool fake that succeeds unless constructed with [`FakeBuilder::failing`].
#[derive(Debug, Default)]
pub struct FakeBuilder {
    failure: Option<String>,
    requests: Mutex<Vec<BuildRequest>>,
}

impl FakeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<BuildRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageBuilder for FakeBuilder {
    async fn build(&self, request: &BuildRequest) -> Result<()> {
        self.requests.lock().unwrap().push(request.clone());
        match &self.failure {
            Some(message) => Err(AssemblyError::Build(message.clone())),
            None => Ok(()),
        }
    }
}

/// Scanner fake returning a fixed report.
#[derive(Debug)]
pub struct FakeScanner {
    report: std::result::Result<ScanReport, String>,
    scanned: Mutex<Vec<String>>,
}

impl Default for FakeScanner {
    fn default() -> Self {
        Self::with_report(ScanReport::clean())
    }
}

impl FakeScanner {
    pub fn with_report(report: ScanReport) -> Self {
        Self {
            report: Ok(report),
            scanned: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            report: Err(message.to_string()),
            scanned: Mutex::new(Vec::new()),
        }
    }

    pub fn scanned(&self) -> Vec<String> {
        self.scanned.lock().unwrap().clone()
    }
}

#[async_trait]
impl VulnerabilityScanner for FakeScanner {
    async fn scan(&self, image: &BuiltImage, _options: &ScanOptions) -> Result<ScanReport> {
        self.scanned.lock().unwrap().push(image.reference());
        self.report.clone().map_err(AssemblyError::Scan)
    }
}
