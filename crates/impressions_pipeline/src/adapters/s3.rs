use std::future::Future;

use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use tokio::runtime::Runtime;
use tracing::debug;

use crate::adapters::object_store::{ObjectStore, StorageError};
use crate::config::StorageSettings;

/// S3-backed [`ObjectStore`]. Owns a single-threaded tokio runtime so the
/// pipeline can stay synchronous; every call blocks until the SDK request
/// settles.
pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
    runtime: Runtime,
}

impl S3ObjectStore {
    /// Builds a client from the default AWS provider chain, with optional
    /// region, endpoint and path-style overrides from `settings`.
    pub fn connect(settings: &StorageSettings) -> std::io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let client = runtime.block_on(async {
            let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
            if let Some(region) = &settings.region {
                loader = loader.region(Region::new(region.clone()));
            }
            if let Some(endpoint_url) = &settings.endpoint_url {
                loader = loader.endpoint_url(endpoint_url);
            }
            let shared_config = loader.load().await;

            let s3_config = aws_sdk_s3::config::Builder::from(&shared_config)
                .force_path_style(settings.force_path_style)
                .build();
            aws_sdk_s3::Client::from_conf(s3_config)
        });

        Ok(Self { client, runtime })
    }

    fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }
}

fn error_message<E, R>(error: &SdkError<E, R>) -> String
where
    E: std::error::Error + 'static,
    R: std::fmt::Debug,
{
    DisplayErrorContext(error).to_string()
}

impl ObjectStore for S3ObjectStore {
    fn bucket_exists(&self, bucket: &str) -> Result<bool, StorageError> {
        match self.block_on(self.client.head_bucket().bucket(bucket).send()) {
            Ok(_) => Ok(true),
            // A missing bucket and a forbidden one look the same to the caller.
            Err(SdkError::ServiceError(error)) => {
                debug!(bucket, error = ?error.err(), "head_bucket rejected");
                Ok(false)
            }
            Err(error) => Err(StorageError::BucketCheck {
                bucket: bucket.to_string(),
                message: error_message(&error),
            }),
        }
    }

    fn list_objects(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, StorageError> {
        self.block_on(async {
            let mut pages = self
                .client
                .list_objects_v2()
                .bucket(bucket)
                .prefix(prefix)
                .into_paginator()
                .send();

            let mut keys = Vec::new();
            while let Some(page) = pages.next().await {
                let page = page.map_err(|error| StorageError::List {
                    bucket: bucket.to_string(),
                    prefix: prefix.to_string(),
                    message: error_message(&error),
                })?;
                keys.extend(
                    page.contents()
                        .iter()
                        .filter_map(|object| object.key().map(str::to_string)),
                );
            }

            Ok::<_, StorageError>(keys)
        })
    }

    fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let get_error = |message: String| StorageError::ObjectGet {
            bucket: bucket.to_string(),
            key: key.to_string(),
            message,
        };

        self.block_on(async {
            let output = self
                .client
                .get_object()
                .bucket(bucket)
                .key(key)
                .send()
                .await
                .map_err(|error| get_error(error_message(&error)))?;

            let body = output
                .body
                .collect()
                .await
                .map_err(|error| get_error(format!("failed to read object body: {error}")))?;

            Ok::<_, StorageError>(body.into_bytes().to_vec())
        })
    }

    fn put_object(&self, bucket: &str, key: &str, body: &[u8]) -> Result<(), StorageError> {
        self.block_on(
            self.client
                .put_object()
                .bucket(bucket)
                .key(key)
                .content_type("text/csv")
                .body(ByteStream::from(body.to_vec()))
                .send(),
        )
        .map(|_| ())
        .map_err(|error| StorageError::ObjectPut {
            bucket: bucket.to_string(),
            key: key.to_string(),
            message: error_message(&error),
        })
    }
}
