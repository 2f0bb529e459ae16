use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use impressions_core::contract::{normalize_request, RunRequest, DEFAULT_INITIALS};
use impressions_core::storage_keys::DatePartition;
use impressions_core::transform::TransformationKind;
use impressions_pipeline::adapters::local::LocalObjectStore;
use impressions_pipeline::adapters::s3::S3ObjectStore;
use impressions_pipeline::config::{AppConfig, StorageBackend};
use impressions_pipeline::handlers::pipeline::run_pipeline;
use impressions_pipeline::logging;
use tracing::info;

#[derive(Parser)]
#[command(
    name = "process_partition",
    about = "Deduplicate and aggregate one daily partition of impression logs"
)]
struct Cli {
    /// Bucket name to process
    #[arg(long = "bucket_name")]
    bucket_name: String,

    /// Date partition to process, in YYYY-MM-DD format
    #[arg(long = "date_partition", value_parser = parse_date_partition)]
    date_partition: DatePartition,

    /// Initials for the output file name
    #[arg(long, default_value = DEFAULT_INITIALS)]
    initials: String,

    /// Transformation to apply on the loaded data
    #[arg(long = "transformation_type", value_parser = TransformationKind::NAMES)]
    transformation_type: String,

    /// Optional YAML config file
    #[arg(long, env = "IMPRESSIONS_CONFIG")]
    config: Option<PathBuf>,
}

fn parse_date_partition(value: &str) -> Result<DatePartition, String> {
    DatePartition::parse(value).map_err(|error| error.to_string())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let app_config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    logging::init(&app_config.logging);

    info!(
        bucket_name = %cli.bucket_name,
        date_partition = %cli.date_partition,
        initials = %cli.initials,
        transformation_type = %cli.transformation_type,
        "parsed arguments"
    );

    let request = normalize_request(RunRequest {
        bucket: cli.bucket_name,
        date_partition: cli.date_partition.to_string(),
        initials: cli.initials,
        transformation: cli.transformation_type,
    })?;
    let pipeline_config = app_config.pipeline_config();

    let outcome = match app_config.storage.backend {
        StorageBackend::S3 => {
            let store = S3ObjectStore::connect(&app_config.storage)
                .context("failed to start the storage runtime")?;
            run_pipeline(&request, &pipeline_config, &store)?
        }
        StorageBackend::Local => {
            let store = LocalObjectStore::new(&app_config.storage.local_root);
            run_pipeline(&request, &pipeline_config, &store)?
        }
    };

    println!("{}", serde_json::to_string(&outcome)?);
    Ok(())
}
