//! Storage adapters, configuration and the orchestrator for the daily
//! impressions pipeline.
//!
//! This crate owns runtime integration details (S3 and local-directory
//! object stores, YAML configuration, logging setup) and drives the domain
//! primitives from `impressions_core` through one run.

pub mod adapters;
pub mod config;
pub mod handlers;
pub mod logging;
