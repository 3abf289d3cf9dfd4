//! 🗄️📡 DynamoDB table: bulk writes, a scan, and a create for the very first run.
//!
//! The table has one opinion: `pagePath` is the hash key. Everything else is
//! just attributes along for the ride.

use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_dynamodb::config::retry::RetryConfig;
use aws_sdk_dynamodb::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_dynamodb::operation::batch_write_item::BatchWriteItemError;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, AttributeValue, BillingMode, KeySchemaElement, KeyType,
    ScalarAttributeType,
};
use serde::Deserialize;
use tracing::{debug, info};

use super::attributes::{request_key, to_write_request};
use crate::backends::{BulkWriteOutcome, Table, WriteRequest, load_aws_config};
use crate::transforms::attr;

/// 🗄️ Which table, where.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct DynamoDbTableConfig {
    pub table_name: String,
    #[serde(default)]
    pub region: Option<String>,
    /// 🧪 dynamodb-local, localstack, or a mock server in a test.
    #[serde(default)]
    pub endpoint_url: Option<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct DynamoDbTable {
    client: aws_sdk_dynamodb::Client,
    table_name: String,
}

impl DynamoDbTable {
    pub(crate) async fn new(config: DynamoDbTableConfig) -> Result<Self> {
        let shared = load_aws_config(config.region.as_deref()).await;
        // -- 🚦 one backoff policy at a time. ours wins.
        let mut builder = aws_sdk_dynamodb::config::Builder::from(&shared)
            .retry_config(RetryConfig::disabled());
        if let Some(endpoint_url) = &config.endpoint_url {
            builder = builder.endpoint_url(endpoint_url);
        }
        let client = aws_sdk_dynamodb::Client::from_conf(builder.build());
        Ok(Self::from_client(client, config.table_name))
    }

    pub(crate) fn from_client(client: aws_sdk_dynamodb::Client, table_name: String) -> Self {
        Self { client, table_name }
    }

    /// 🏗️ `pagePath` as a string hash key, on-demand billing. Day-one setup only.
    pub(crate) async fn create_table(&self) -> Result<()> {
        info!("🏗️ creating table '{}'", self.table_name);
        let response = self
            .client
            .create_table()
            .table_name(&self.table_name)
            .attribute_definitions(
                AttributeDefinition::builder()
                    .attribute_name(attr::PATH)
                    .attribute_type(ScalarAttributeType::S)
                    .build()
                    .context("💀 AttributeDefinition refused to build")?,
            )
            .key_schema(
                KeySchemaElement::builder()
                    .attribute_name(attr::PATH)
                    .key_type(KeyType::Hash)
                    .build()
                    .context("💀 KeySchemaElement refused to build")?,
            )
            .billing_mode(BillingMode::PayPerRequest)
            .send()
            .await
            .map_err(|err| anyhow::anyhow!("{}", DisplayErrorContext(&err)))
            .with_context(|| format!("💀 CreateTable '{}' failed", self.table_name))?;

        let status = response
            .table_description()
            .and_then(|description| description.table_status())
            .map(|status| status.as_str().to_string())
            .unwrap_or_else(|| "UNKNOWN".to_string());
        info!("✅ table '{}' created, status {}", self.table_name, status);
        Ok(())
    }
}

/// 🚦 Is this the table telling us to slow down, as opposed to telling us we're wrong?
pub(crate) fn is_throttling<R>(err: &SdkError<BatchWriteItemError, R>) -> bool {
    match err.as_service_error() {
        Some(service_err) => {
            service_err.is_provisioned_throughput_exceeded_exception()
                || service_err.is_request_limit_exceeded()
                || service_err.code() == Some("ThrottlingException")
        }
        None => false,
    }
}

#[async_trait]
impl Table for DynamoDbTable {
    async fn bulk_write(&self, requests: Vec<WriteRequest>) -> Result<BulkWriteOutcome> {
        if requests.is_empty() {
            return Ok(BulkWriteOutcome::Written);
        }
        let items = requests
            .iter()
            .map(to_write_request)
            .collect::<Result<Vec<_>>>()?;

        let result = self
            .client
            .batch_write_item()
            .request_items(&self.table_name, items)
            .send()
            .await;

        match result {
            Ok(output) => {
                let unprocessed_keys: HashSet<&str> = output
                    .unprocessed_items()
                    .and_then(|by_table| by_table.get(&self.table_name))
                    .map(|pending| pending.iter().filter_map(request_key).collect())
                    .unwrap_or_default();
                if unprocessed_keys.is_empty() {
                    return Ok(BulkWriteOutcome::Written);
                }
                debug!(
                    "🐢 {} of {} items came back unprocessed",
                    unprocessed_keys.len(),
                    requests.len()
                );
                let reason = format!("{} unprocessed items", unprocessed_keys.len());
                let unprocessed = requests
                    .into_iter()
                    .filter(|request| unprocessed_keys.contains(request.key()))
                    .collect();
                Ok(BulkWriteOutcome::Throttled {
                    unprocessed,
                    reason,
                })
            }
            Err(err) if is_throttling(&err) => Ok(BulkWriteOutcome::Throttled {
                unprocessed: requests,
                reason: DisplayErrorContext(&err).to_string(),
            }),
            Err(err) => Err(anyhow::anyhow!("{}", DisplayErrorContext(&err))).with_context(|| {
                format!(
                    "💀 BatchWriteItem into '{}' failed and it wasn't throttling. \
                     Retrying won't fix this one.",
                    self.table_name
                )
            }),
        }
    }

    async fn scan_run_ids(&self) -> Result<Vec<(String, Option<String>)>> {
        let mut keys = Vec::new();
        let mut start_key: Option<HashMap<String, AttributeValue>> = None;
        loop {
            let output = self
                .client
                .scan()
                .table_name(&self.table_name)
                .projection_expression("#path, #run")
                .expression_attribute_names("#path", attr::PATH)
                .expression_attribute_names("#run", attr::SYNC_RUN_ID)
                .set_exclusive_start_key(start_key)
                .send()
                .await
                .map_err(|err| anyhow::anyhow!("{}", DisplayErrorContext(&err)))
                .with_context(|| format!("💀 Scan of '{}' failed", self.table_name))?;

            for item in output.items() {
                let Some(path) = item.get(attr::PATH).and_then(|v| v.as_s().ok()) else {
                    continue;
                };
                let run_id = item
                    .get(attr::SYNC_RUN_ID)
                    .and_then(|v| v.as_s().ok())
                    .cloned();
                keys.push((path.clone(), run_id));
            }

            start_key = output.last_evaluated_key().cloned();
            if start_key.is_none() {
                break;
            }
        }
        Ok(keys)
    }
}
