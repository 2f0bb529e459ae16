use std::path::{Path, PathBuf};

use impressions_core::contract::NormalizedRunRequest;
use impressions_core::storage_keys::DatePartition;
use impressions_core::transform::{TransformSettings, TransformationKind};
use impressions_pipeline::adapters::local::LocalObjectStore;
use impressions_pipeline::handlers::pipeline::PipelineConfig;

pub const BUCKET: &str = "impressions";

pub fn bundled_schema() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../schemas/impressions.yaml")
}

pub fn pipeline_config() -> PipelineConfig {
    PipelineConfig {
        transform: TransformSettings {
            impressions_schema: bundled_schema(),
            ..TransformSettings::default()
        },
    }
}

pub fn request(date_partition: &str, transformation: TransformationKind) -> NormalizedRunRequest {
    NormalizedRunRequest {
        bucket: BUCKET.to_string(),
        partition: DatePartition::parse(date_partition).expect("valid partition"),
        initials: "TI".to_string(),
        transformation,
    }
}

/// A temporary local store with an empty `impressions` bucket.
pub struct LocalBucket {
    pub dir: tempfile::TempDir,
    pub store: LocalObjectStore,
}

impl LocalBucket {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir(dir.path().join(BUCKET)).expect("create bucket dir");
        let store = LocalObjectStore::new(dir.path());
        Self { dir, store }
    }

    pub fn seed(&self, key: &str, body: &str) {
        let path = self.dir.path().join(BUCKET).join(key);
        std::fs::create_dir_all(path.parent().expect("key has parent")).expect("mkdir");
        std::fs::write(path, body).expect("seed object");
    }

    pub fn read(&self, key: &str) -> Option<String> {
        std::fs::read_to_string(self.dir.path().join(BUCKET).join(key)).ok()
    }
}
