//! Domain primitives for the daily impressions pipeline.
//!
//! This crate owns the tabular dataset model, schema validation, the
//! impression aggregation, and the partition-to-key naming contract. It
//! intentionally excludes storage SDK and process runtime concerns, which
//! live in `impressions_pipeline`.

pub mod aggregate;
pub mod contract;
pub mod dataset;
pub mod schema;
pub mod storage_keys;
pub mod transform;
