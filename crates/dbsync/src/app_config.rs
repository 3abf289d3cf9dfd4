//! 🔧 App Configuration: environment and TOML, folded into one struct.
//!
//! 📡 "Config not found: We looked everywhere. Under the couch. Behind the fridge.
//! In the junk drawer. Nothing." (every developer at 3am) 🦆
//!
//! Layers, lowest first:
//! 1. Legacy deployment variables: `RESOURCE_JSON_BUCKET`, `RESOURCE_SEARCH_TABLE`.
//! 2. `DBSYNC_*` variables, `__` for nesting (`DBSYNC_RUNTIME__MAX_ATTEMPTS=5`).
//! 3. The TOML file, if one was given. TOML wins on conflicts.
//!
//! Region and credentials are left to the AWS provider chain unless a
//! section sets `region` explicitly.

use std::path::Path;

use anyhow::{Context, ensure};
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use tracing::info;

use crate::backends::{DynamoDbTableConfig, S3SourceConfig};
use crate::bulk_writer::BackoffPolicy;

/// 📦 Everything the job needs to know before it touches the network.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub source: S3SourceConfig,
    pub table: DynamoDbTableConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

/// 🎛️ Pipeline knobs.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RuntimeConfig {
    /// 📦 Documents per bulk write. BatchWriteItem tops out at 25.
    #[serde(default = "default_batch_capacity")]
    pub batch_capacity: usize,
    /// ⏱️ First backoff after a throttled write, doubled after each one.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// 🔁 Bulk calls per batch before it is abandoned.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// 🗂️ Write section rows. When off, sections are counted and reported as skipped.
    #[serde(default = "default_write_sections")]
    pub write_sections: bool,
    /// 🧹 After a clean run, delete rows that this run did not write.
    #[serde(default)]
    pub sweep_orphans: bool,
}

fn default_batch_capacity() -> usize {
    20
}

fn default_initial_backoff_ms() -> u64 {
    1500
}

fn default_max_attempts() -> u32 {
    20
}

fn default_write_sections() -> bool {
    true
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            batch_capacity: default_batch_capacity(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_attempts: default_max_attempts(),
            write_sections: default_write_sections(),
            sweep_orphans: false,
        }
    }
}

impl RuntimeConfig {
    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            initial: std::time::Duration::from_millis(self.initial_backoff_ms),
            max_attempts: self.max_attempts,
        }
    }
}

impl AppConfig {
    /// ✅ Catch the obvious mistakes before the first list call does.
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            !self.source.bucket.trim().is_empty(),
            "💀 source.bucket is empty. We need a bucket to read from. Any bucket. Well, the right one."
        );
        ensure!(
            !self.table.table_name.trim().is_empty(),
            "💀 table.table_name is empty. The rows need somewhere to go."
        );
        ensure!(
            (1..=1000).contains(&self.source.max_keys),
            "💀 source.max_keys must be between 1 and 1000, got {}",
            self.source.max_keys
        );
        ensure!(
            !self.source.index_document.is_empty() && !self.source.index_document.contains('/'),
            "💀 source.index_document must be a bare file name, got '{}'",
            self.source.index_document
        );
        ensure!(
            (1..=25).contains(&self.runtime.batch_capacity),
            "💀 runtime.batch_capacity must be between 1 and 25 (the bulk write cap), got {}",
            self.runtime.batch_capacity
        );
        ensure!(
            self.runtime.max_attempts >= 1,
            "💀 runtime.max_attempts must be at least 1. Zero attempts is a very fast way to write nothing."
        );
        Ok(())
    }
}

/// 🚀 Load the config from the environment, plus a TOML file if one was given.
///
/// 💀 Returns an error if the merged config doesn't deserialize. Validation is a
/// separate step, see [`AppConfig::validate`].
pub fn load_config(config_file_name: Option<&Path>) -> anyhow::Result<AppConfig> {
    info!(
        "🔧 Loading configuration: {:#?}",
        config_file_name.unwrap_or(Path::new(""))
    );

    let config = Figment::new()
        .merge(
            Env::raw()
                .only(&["RESOURCE_JSON_BUCKET", "RESOURCE_SEARCH_TABLE"])
                .map(|key| {
                    if key.as_str().eq_ignore_ascii_case("RESOURCE_JSON_BUCKET") {
                        "source.bucket".into()
                    } else {
                        "table.table_name".into()
                    }
                }),
        )
        .merge(Env::prefixed("DBSYNC_").split("__"));

    let config = match config_file_name {
        Some(file_name) => config.merge(Toml::file(file_name)),
        None => config,
    };

    let context_msg = match config_file_name {
        Some(path) => format!(
            "💀 Failed to parse configuration from file '{}' and environment variables \
             (DBSYNC_*, RESOURCE_*). Check the file exists and every section is spelled right.",
            path.display()
        ),
        None => "💀 Failed to parse configuration from environment variables (DBSYNC_*, RESOURCE_*). \
                 No file was provided, so this one's all on the environment."
            .to_string(),
    };

    config.extract().context(context_msg)
}
