use std::time::Instant;

use impressions_core::contract::{content_fingerprint, NormalizedRunRequest, RunOutcome};
use impressions_core::dataset::{Dataset, DatasetError};
use impressions_core::storage_keys::{is_tabular_object, resolve};
use impressions_core::transform::{TransformError, TransformSettings, TransformationKind};
use tracing::{debug, error, info, warn};

use crate::adapters::object_store::{ObjectStore, StorageError};

/// Explicit settings for one run; nothing is read from process-wide state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineConfig {
    pub transform: TransformSettings,
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("no bucket exists with name {bucket}")]
    BucketNotFound { bucket: String },

    #[error("no files to process in bucket {bucket} with prefix {prefix}")]
    NoInputObjects { bucket: String, prefix: String },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("failed to parse object {bucket}/{key} as csv")]
    ObjectParse {
        bucket: String,
        key: String,
        #[source]
        source: DatasetError,
    },

    #[error("transformation {transformation} failed")]
    Transform {
        transformation: TransformationKind,
        #[source]
        source: TransformError,
    },

    #[error("failed to serialize transformed dataset")]
    Serialize(#[source] DatasetError),

    #[error("failed to write result to {bucket}/{key}")]
    WriteFailed {
        bucket: String,
        key: String,
        #[source]
        source: StorageError,
    },
}

/// Runs one partition end to end: bucket check, discovery, load, transform,
/// and a single write of the complete result. An empty transformation result
/// ends the run successfully without writing anything.
pub fn run_pipeline(
    request: &NormalizedRunRequest,
    config: &PipelineConfig,
    store: &impl ObjectStore,
) -> Result<RunOutcome, PipelineError> {
    let started_at = Instant::now();
    let bucket = request.bucket.as_str();
    info!(
        bucket,
        date_partition = %request.partition,
        initials = %request.initials,
        transformation = %request.transformation,
        "pipeline run started"
    );

    if !store.bucket_exists(bucket)? {
        error!(bucket, "no bucket exists with this name");
        return Err(PipelineError::BucketNotFound {
            bucket: bucket.to_string(),
        });
    }

    let keys = resolve(&request.partition);
    let prefix = keys.discovery_prefix();
    let object_keys = discover_objects(store, bucket, prefix)?;
    if object_keys.is_empty() {
        error!(bucket, prefix, "no files to process");
        return Err(PipelineError::NoInputObjects {
            bucket: bucket.to_string(),
            prefix: prefix.to_string(),
        });
    }
    info!(bucket, prefix, objects = ?object_keys, "files to process");

    let dataset = load_dataset(store, bucket, &object_keys)?;
    info!(
        rows = dataset.len(),
        columns = dataset.columns().len(),
        "loaded input dataset"
    );

    let transformation = request.transformation.build(&config.transform);
    let transformed = transformation
        .transform(dataset)
        .map_err(|source| PipelineError::Transform {
            transformation: request.transformation,
            source,
        })?;

    if transformed.is_empty() {
        warn!(
            transformation = %request.transformation,
            "no data to upload, skipping write"
        );
        return Ok(RunOutcome::Skipped {
            transformation: request.transformation,
            reason: "transformation produced no rows".to_string(),
        });
    }

    let output_key = keys.output_key(&request.initials);
    let body = transformed.to_csv().map_err(PipelineError::Serialize)?;
    store
        .put_object(bucket, &output_key, &body)
        .map_err(|source| PipelineError::WriteFailed {
            bucket: bucket.to_string(),
            key: output_key.clone(),
            source,
        })?;

    let content_sha256 = content_fingerprint(&body);
    info!(
        bucket,
        key = %output_key,
        rows = transformed.len(),
        content_sha256 = %content_sha256,
        duration_ms = started_at.elapsed().as_millis() as u64,
        "data processed and saved"
    );

    Ok(RunOutcome::Published {
        bucket: bucket.to_string(),
        key: output_key,
        rows: transformed.len(),
        content_sha256,
    })
}

/// Tabular keys under `prefix`, sorted so load order does not depend on the
/// store's listing order.
fn discover_objects(
    store: &impl ObjectStore,
    bucket: &str,
    prefix: &str,
) -> Result<Vec<String>, PipelineError> {
    let mut keys: Vec<String> = store
        .list_objects(bucket, prefix)?
        .into_iter()
        .filter(|key| is_tabular_object(key))
        .collect();
    keys.sort();
    keys.dedup();
    Ok(keys)
}

fn load_dataset(
    store: &impl ObjectStore,
    bucket: &str,
    object_keys: &[String],
) -> Result<Dataset, PipelineError> {
    let mut parts = Vec::with_capacity(object_keys.len());
    for key in object_keys {
        let body = store.get_object(bucket, key)?;
        let part = Dataset::from_csv(&body).map_err(|source| PipelineError::ObjectParse {
            bucket: bucket.to_string(),
            key: key.clone(),
            source,
        })?;
        debug!(key = %key, rows = part.len(), "loaded object");
        parts.push(part);
    }
    Ok(Dataset::concat(parts))
}
