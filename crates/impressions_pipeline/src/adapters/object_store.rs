#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("failed to check bucket {bucket}: {message}")]
    BucketCheck { bucket: String, message: String },

    #[error("failed to list objects in {bucket} under prefix {prefix}: {message}")]
    List {
        bucket: String,
        prefix: String,
        message: String,
    },

    #[error("failed to get object {bucket}/{key}: {message}")]
    ObjectGet {
        bucket: String,
        key: String,
        message: String,
    },

    #[error("failed to put object {bucket}/{key}: {message}")]
    ObjectPut {
        bucket: String,
        key: String,
        message: String,
    },
}

/// Blocking object-store operations the pipeline consumes. Retries, if any,
/// belong to the implementation.
pub trait ObjectStore {
    fn bucket_exists(&self, bucket: &str) -> Result<bool, StorageError>;

    /// Keys under `prefix`, never `None`; an empty listing is `Ok(vec![])`.
    fn list_objects(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, StorageError>;

    fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError>;

    fn put_object(&self, bucket: &str, key: &str, body: &[u8]) -> Result<(), StorageError>;
}
