use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::storage_keys::DatePartition;
use crate::transform::TransformationKind;

/// Placeholder used in the output file name when no initials are given.
pub const DEFAULT_INITIALS: &str = "Guy_Fawkes";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunRequest {
    pub bucket: String,
    pub date_partition: String,
    #[serde(default = "default_initials")]
    pub initials: String,
    pub transformation: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedRunRequest {
    pub bucket: String,
    pub partition: DatePartition,
    pub initials: String,
    pub transformation: TransformationKind,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Published {
        bucket: String,
        key: String,
        rows: usize,
        content_sha256: String,
    },
    Skipped {
        transformation: TransformationKind,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ValidationError {}

pub fn default_initials() -> String {
    DEFAULT_INITIALS.to_string()
}

pub fn normalize_request(request: RunRequest) -> Result<NormalizedRunRequest, ValidationError> {
    let bucket = request.bucket.trim().to_string();
    if bucket.is_empty() {
        return Err(ValidationError::new("bucket_name cannot be empty"));
    }

    let initials = request.initials.trim().to_string();
    if initials.is_empty() {
        return Err(ValidationError::new("initials cannot be empty"));
    }
    if initials.contains('/') {
        return Err(ValidationError::new(format!(
            "initials must not contain '/': {initials}"
        )));
    }

    let partition = DatePartition::parse(request.date_partition.trim())?;

    let transformation = request
        .transformation
        .trim()
        .parse::<TransformationKind>()
        .map_err(|error| ValidationError::new(error.to_string()))?;

    Ok(NormalizedRunRequest {
        bucket,
        partition,
        initials,
        transformation,
    })
}

/// Hex SHA-256 of a published payload. Reprocessing a partition is expected
/// to reproduce the same fingerprint.
pub fn content_fingerprint(body: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_request() -> RunRequest {
        RunRequest {
            bucket: " impressions-bucket ".to_string(),
            date_partition: "2022-04-15".to_string(),
            initials: "TI".to_string(),
            transformation: "aggregate_impressions".to_string(),
        }
    }

    #[test]
    fn normalize_request_trims_and_types_fields() {
        let normalized = normalize_request(sample_request()).expect("request should pass");

        assert_eq!(normalized.bucket, "impressions-bucket");
        assert_eq!(normalized.partition.to_string(), "2022-04-15");
        assert_eq!(normalized.transformation, TransformationKind::AggregateImpressions);
    }

    #[test]
    fn normalize_request_rejects_empty_bucket() {
        let request = RunRequest {
            bucket: "  ".to_string(),
            ..sample_request()
        };

        let error = normalize_request(request).expect_err("request should fail");
        assert_eq!(error.message(), "bucket_name cannot be empty");
    }

    #[test]
    fn normalize_request_rejects_malformed_date() {
        let request = RunRequest {
            date_partition: "15-04-2022".to_string(),
            ..sample_request()
        };

        let error = normalize_request(request).expect_err("request should fail");
        assert!(error.message().contains("YYYY-MM-DD"));
    }

    #[test]
    fn normalize_request_rejects_unknown_transformation() {
        let request = RunRequest {
            transformation: "pivot".to_string(),
            ..sample_request()
        };

        let error = normalize_request(request).expect_err("request should fail");
        assert_eq!(error.message(), "unknown transformation `pivot`");
    }

    #[test]
    fn normalize_request_rejects_initials_with_separator() {
        let request = RunRequest {
            initials: "../TI".to_string(),
            ..sample_request()
        };

        assert!(normalize_request(request).is_err());
    }

    #[test]
    fn initials_default_when_absent_from_payload() {
        let request: RunRequest = serde_json::from_str(
            r#"{"bucket":"b","date_partition":"2022-04-15","transformation":"other"}"#,
        )
        .expect("payload should deserialize");
        assert_eq!(request.initials, DEFAULT_INITIALS);
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let outcome = RunOutcome::Skipped {
            transformation: TransformationKind::Other,
            reason: "empty".to_string(),
        };
        let json = serde_json::to_value(&outcome).expect("serialize");
        assert_eq!(json["status"], "skipped");
        assert_eq!(json["transformation"], "other");
    }

    #[test]
    fn fingerprint_is_hex_sha256() {
        assert_eq!(
            content_fingerprint(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
