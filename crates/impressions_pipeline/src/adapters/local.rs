use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::adapters::object_store::{ObjectStore, StorageError};

/// Directory-backed [`ObjectStore`] for local runs: each bucket is a
/// directory under `root` and keys are `/`-separated relative paths.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// A bucket is exactly one plain directory name under `root`.
    fn bucket_path(&self, bucket: &str) -> Result<PathBuf, String> {
        let mut components = Path::new(bucket).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) => Ok(self.root.join(name)),
            _ => Err(format!("invalid bucket name: {bucket}")),
        }
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, String> {
        let bucket_path = self.bucket_path(bucket)?;
        if key.is_empty() || !is_relative_path(key) {
            return Err(format!("invalid object key: {key}"));
        }
        Ok(bucket_path.join(key))
    }
}

fn is_relative_path(value: &str) -> bool {
    Path::new(value)
        .components()
        .all(|component| matches!(component, Component::Normal(_)))
}

fn collect_keys(dir: &Path, relative: &str, keys: &mut Vec<String>) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let key = if relative.is_empty() {
            name
        } else {
            format!("{relative}/{name}")
        };

        if entry.file_type()?.is_dir() {
            collect_keys(&entry.path(), &key, keys)?;
        } else {
            keys.push(key);
        }
    }
    Ok(())
}

impl ObjectStore for LocalObjectStore {
    fn bucket_exists(&self, bucket: &str) -> Result<bool, StorageError> {
        Ok(self
            .bucket_path(bucket)
            .map(|path| path.is_dir())
            .unwrap_or(false))
    }

    fn list_objects(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, StorageError> {
        let list_error = |message: String| StorageError::List {
            bucket: bucket.to_string(),
            prefix: prefix.to_string(),
            message,
        };

        let bucket_path = self.bucket_path(bucket).map_err(list_error)?;
        let mut keys = Vec::new();
        collect_keys(&bucket_path, "", &mut keys).map_err(|error| list_error(error.to_string()))?;

        keys.retain(|key| key.starts_with(prefix));
        keys.sort();
        Ok(keys)
    }

    fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let get_error = |message: String| StorageError::ObjectGet {
            bucket: bucket.to_string(),
            key: key.to_string(),
            message,
        };

        let path = self.object_path(bucket, key).map_err(get_error)?;
        fs::read(path).map_err(|error| get_error(error.to_string()))
    }

    fn put_object(&self, bucket: &str, key: &str, body: &[u8]) -> Result<(), StorageError> {
        let put_error = |message: String| StorageError::ObjectPut {
            bucket: bucket.to_string(),
            key: key.to_string(),
            message,
        };

        let path = self.object_path(bucket, key).map_err(put_error)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|error| put_error(error.to_string()))?;
        }
        fs::write(&path, body).map_err(|error| put_error(error.to_string()))
    }
}
