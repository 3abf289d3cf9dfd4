//! 🔌 Backends: where the real I/O happens.
//!
//! 🪣 Object stores pour the JSON, 🗄️ tables soak up the rows.
//! Everything in between is pure functions and a couple of channels.
//!
//! Same shape on both ends: trait → concrete impls → enum dispatcher. The
//! supervisor only ever sees [`ObjectStoreBackend`] and [`TableBackend`] and
//! never needs to know whether it is talking to AWS or to a `BTreeMap`.
//!
//! 🦆 The duck has read access to the bucket. It has not been given write access to the table.

use anyhow::Result;
use async_trait::async_trait;

use crate::common::Row;

pub(crate) mod dynamodb;
#[cfg(test)]
pub(crate) mod in_mem;
pub(crate) mod s3;

pub use dynamodb::DynamoDbTableConfig;
pub use s3::S3SourceConfig;

// ===== Object store =====

/// 📃 One page of a listing: the keys, plus the cursor for the next page (if any).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListedPage {
    pub keys: Vec<String>,
    pub next_token: Option<String>,
}

/// 🪣 A paginated blob store.
///
/// # Contract 📜
/// - `list_page(None)` starts the enumeration. Feed `next_token` back in to continue.
/// - No `next_token` means the listing is done.
/// - `fetch` returns the whole object as text. Failures carry the key in their context.
#[async_trait]
pub(crate) trait ObjectStore: std::fmt::Debug + Send + Sync {
    async fn list_page(&self, continuation_token: Option<String>) -> Result<ListedPage>;
    async fn fetch(&self, key: &str) -> Result<String>;
}

#[derive(Debug)]
pub(crate) enum ObjectStoreBackend {
    #[cfg(test)]
    InMemory(in_mem::InMemoryObjectStore),
    S3(s3::S3ObjectStore),
}

#[async_trait]
impl ObjectStore for ObjectStoreBackend {
    async fn list_page(&self, continuation_token: Option<String>) -> Result<ListedPage> {
        match self {
            #[cfg(test)]
            ObjectStoreBackend::InMemory(store) => store.list_page(continuation_token).await,
            ObjectStoreBackend::S3(store) => store.list_page(continuation_token).await,
        }
    }

    async fn fetch(&self, key: &str) -> Result<String> {
        match self {
            #[cfg(test)]
            ObjectStoreBackend::InMemory(store) => store.fetch(key).await,
            ObjectStoreBackend::S3(store) => store.fetch(key).await,
        }
    }
}

// ===== Table =====

/// ✍️ One item of a bulk write: upsert a row, or delete a key.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteRequest {
    Put(Row),
    Delete(String),
}

impl WriteRequest {
    pub fn key(&self) -> &str {
        match self {
            WriteRequest::Put(row) => &row.key,
            WriteRequest::Delete(key) => key,
        }
    }
}

/// 🚦 What a bulk write said back, when it said anything at all.
///
/// Errors that are not throttling come back as `Err`. Throttling is not an
/// error here, it is a request to come back later with `unprocessed`.
#[derive(Debug, Clone, PartialEq)]
pub enum BulkWriteOutcome {
    Written,
    Throttled {
        unprocessed: Vec<WriteRequest>,
        reason: String,
    },
}

/// 🗄️ A key-value table that takes unconditional bulk writes.
///
/// # Contract 📜
/// - `bulk_write` is last-writer-wins. No conditions, no versions.
/// - A request never names the same key twice.
/// - `scan_run_ids` returns every key with the sync run id that last wrote it.
#[async_trait]
pub(crate) trait Table: std::fmt::Debug + Send + Sync {
    async fn bulk_write(&self, requests: Vec<WriteRequest>) -> Result<BulkWriteOutcome>;
    async fn scan_run_ids(&self) -> Result<Vec<(String, Option<String>)>>;
}

#[derive(Debug, Clone)]
pub(crate) enum TableBackend {
    #[cfg(test)]
    InMemory(in_mem::InMemoryTable),
    DynamoDb(dynamodb::DynamoDbTable),
}

#[async_trait]
impl Table for TableBackend {
    async fn bulk_write(&self, requests: Vec<WriteRequest>) -> Result<BulkWriteOutcome> {
        match self {
            #[cfg(test)]
            TableBackend::InMemory(table) => table.bulk_write(requests).await,
            TableBackend::DynamoDb(table) => table.bulk_write(requests).await,
        }
    }

    async fn scan_run_ids(&self) -> Result<Vec<(String, Option<String>)>> {
        match self {
            #[cfg(test)]
            TableBackend::InMemory(table) => table.scan_run_ids().await,
            TableBackend::DynamoDb(table) => table.scan_run_ids().await,
        }
    }
}

/// ☁️ Shared AWS config loader. Region falls back to the usual provider chain.
pub(crate) async fn load_aws_config(region: Option<&str>) -> aws_config::SdkConfig {
    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
    if let Some(region) = region {
        loader = loader.region(aws_config::Region::new(region.to_string()));
    }
    loader.load().await
}
