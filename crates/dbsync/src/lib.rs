//! 🪣➡️🗄️ dbsync: index documents from a bucket, rows in a table.
//!
//! One pass over the bucket. Leaf directories become pages, directories with
//! children become sections, twenty at a time into the table, with backoff
//! when the table asks for a breather.

pub mod app_config;
pub mod backends;
pub mod bulk_writer;
pub mod classifier;
pub mod collectors;
pub mod common;
pub mod progress;
mod supervisors;
mod transforms;

use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use tracing::info;

use crate::app_config::AppConfig;
use crate::backends::dynamodb::DynamoDbTable;
use crate::backends::s3::S3ObjectStore;
use crate::backends::{DynamoDbTableConfig, ObjectStoreBackend, TableBackend};
use crate::progress::SyncSummary;
use crate::supervisors::{PipelineSettings, Supervisor};

/// 🚀 Sync the bucket into the table once.
///
/// Errors only for bad config, unbuildable clients, a failed listing, or a
/// malformed index document. Batches that could not be written are counted in
/// the returned summary instead.
pub async fn run(app_config: AppConfig) -> Result<SyncSummary> {
    app_config.validate()?;

    let store = S3ObjectStore::new(app_config.source.clone())
        .await
        .context("💀 Could not build the S3 client")?;
    let table = DynamoDbTable::new(app_config.table.clone())
        .await
        .context("💀 Could not build the DynamoDB client")?;

    let settings = PipelineSettings::from_config(&app_config, new_run_id());
    info!(
        "🗄️ syncing into table '{}' as {}",
        app_config.table.table_name, settings.run_id
    );
    Supervisor::new(
        ObjectStoreBackend::S3(store),
        TableBackend::DynamoDb(table),
        settings,
    )
    .run()
    .await
}

/// 🏗️ Create the destination table. Day-one setup, not part of a sync.
pub async fn create_table(config: &DynamoDbTableConfig) -> Result<()> {
    let table = DynamoDbTable::new(config.clone())
        .await
        .context("💀 Could not build the DynamoDB client")?;
    table.create_table().await
}

/// ☁️ Managed-function entry point. Neither the event nor the invocation
/// context says anything we need, so both are ignored and the config comes
/// from the environment alone.
pub async fn handle(
    _event: serde_json::Value,
    _context: serde_json::Value,
) -> Result<SyncSummary> {
    let app_config = app_config::load_config(None)?;
    run(app_config).await
}

fn new_run_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_millis());
    format!("run-{millis}")
}
