//! Records persisted by the assembly line

use assembly_line_core::{BuildOutcome, BuiltImage, FailureKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `error_kind` of a successful build
pub const NO_ERROR: &str = "NoError";

/// Duration and outcome of one build attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildMetric {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub registry: String,
    pub image_name: String,
    pub outcome: BuildOutcome,
    pub error_kind: String,
}

impl BuildMetric {
    pub fn new(
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        registry: impl Into<String>,
        image_name: impl Into<String>,
        outcome: BuildOutcome,
        error_kind: Option<FailureKind>,
    ) -> Self {
        let duration_secs = (finished_at - started_at).num_milliseconds().max(0) as f64 / 1000.0;
        Self {
            started_at,
            finished_at,
            duration_secs,
            registry: registry.into(),
            image_name: image_name.into(),
            outcome,
            error_kind: error_kind
                .map(|k| k.as_str().to_string())
                .unwrap_or_else(|| NO_ERROR.to_string()),
        }
    }

    /// `build-time/<registry>/<image>/<YYYY>/<MM>/<DD>/<started_at ms>.json`
    pub fn key(&self) -> String {
        format!(
            "build-time/{}/{}/{}/{}.json",
            self.registry,
            self.image_name,
            self.started_at.format("%Y/%m/%d"),
            self.started_at.timestamp_millis()
        )
    }
}

/// Image and run that downstream deployment tooling may pick up
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub image_id: String,
    pub image_name: String,
    pub tags: Vec<String>,
    pub upstream_repository: String,
    pub repository: String,
    pub commit_sha: String,
    pub run_id: String,
    pub recorded_at: DateTime<Utc>,
}

impl DeliveryRecord {
    pub fn new(
        image: &BuiltImage,
        upstream_repository: impl Into<String>,
        repository: impl Into<String>,
        commit_sha: impl Into<String>,
        run_id: impl Into<String>,
    ) -> Self {
        Self {
            image_id: image.image_id.clone(),
            image_name: image.image_name.clone(),
            tags: image.tags.clone(),
            upstream_repository: upstream_repository.into(),
            repository: repository.into(),
            commit_sha: commit_sha.into(),
            run_id: run_id.into(),
            recorded_at: Utc::now(),
        }
    }

    /// Keyed by (image, run) so a re-run of the same CI run overwrites it
    pub fn key(&self) -> String {
        format!("deliveries/{}/{}.json", self.image_name, self.run_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_build_metric_key_and_duration() {
        let start = Utc.with_ymd_and_hms(2024, 3, 9, 1, 2, 3).unwrap();
        let end = start + chrono::Duration::milliseconds(90_500);
        let metric = BuildMetric::new(
            start,
            end,
            "registry.example.com",
            "team/app",
            BuildOutcome::Fail,
            Some(FailureKind::PushError),
        );

        assert_eq!(metric.duration_secs, 90.5);
        assert_eq!(metric.error_kind, "PushError");
        assert_eq!(
            metric.key(),
            format!(
                "build-time/registry.example.com/team/app/2024/03/09/{}.json",
                start.timestamp_millis()
            )
        );
    }

    #[test]
    fn test_successful_metric_has_no_error() {
        let now = Utc::now();
        let metric = BuildMetric::new(now, now, "r", "i", BuildOutcome::Success, None);
        assert_eq!(metric.error_kind, NO_ERROR);
        let json = serde_json::to_value(&metric).unwrap();
        assert_eq!(json["outcome"], "success");
    }

    #[test]
    fn test_delivery_key() {
        let image = BuiltImage::new("sha256:abc", "team/app").with_tags(vec!["1.0".into()]);
        let record = DeliveryRecord::new(&image, "registry/team/app", "org/app", "deadbeef", "123");
        assert_eq!(record.key(), "deliveries/team/app/123.json");
        assert_eq!(record.tags, vec!["1.0"]);
    }
}
