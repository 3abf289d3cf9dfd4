//! 🪣📡 S3 object store: paging through a bucket one continuation token at a time.
//!
//! INT. AWS CONSOLE. NIGHT. A static site generator has dumped ten thousand
//! `index.json` files into a bucket and gone home. Somebody has to read them.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::trace;

use crate::backends::{ListedPage, ObjectStore, load_aws_config};
use crate::common::DEFAULT_INDEX_DOCUMENT;

/// 🪣 Where the JSON lives and how to walk it.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct S3SourceConfig {
    pub bucket: String,
    /// 🔍 Only list keys under this prefix. `None` walks the whole bucket.
    #[serde(default)]
    pub prefix: Option<String>,
    /// 🌍 Falls back to the AWS provider chain (`AWS_REGION`, profile, ...) when absent.
    #[serde(default)]
    pub region: Option<String>,
    /// 🧪 Point at localstack/minio instead of the real thing.
    #[serde(default)]
    pub endpoint_url: Option<String>,
    /// 📃 Keys per listing page.
    #[serde(default = "default_max_keys")]
    pub max_keys: i32,
    /// 📄 The only file name worth fetching.
    #[serde(default = "default_index_document")]
    pub index_document: String,
}

fn default_max_keys() -> i32 {
    50
}

fn default_index_document() -> String {
    DEFAULT_INDEX_DOCUMENT.to_string()
}

/// 🪣 Thin wrapper around an `aws_sdk_s3::Client` bound to one bucket.
#[derive(Debug, Clone)]
pub(crate) struct S3ObjectStore {
    client: aws_sdk_s3::Client,
    config: S3SourceConfig,
}

impl S3ObjectStore {
    pub(crate) async fn new(config: S3SourceConfig) -> Result<Self> {
        let shared = load_aws_config(config.region.as_deref()).await;
        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint_url) = &config.endpoint_url {
            // -- 🧪 local S3 lookalikes rarely do virtual-hosted buckets
            builder = builder.endpoint_url(endpoint_url).force_path_style(true);
        }
        let client = aws_sdk_s3::Client::from_conf(builder.build());
        Ok(Self::from_client(client, config))
    }

    pub(crate) fn from_client(client: aws_sdk_s3::Client, config: S3SourceConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn list_page(&self, continuation_token: Option<String>) -> Result<ListedPage> {
        let response = self
            .client
            .list_objects_v2()
            .bucket(&self.config.bucket)
            .max_keys(self.config.max_keys)
            .set_prefix(self.config.prefix.clone())
            .set_continuation_token(continuation_token)
            .send()
            .await
            .with_context(|| {
                format!(
                    "💀 ListObjectsV2 failed for s3://{}. The bucket ghosted us. \
                     Check: bucket name, region, credentials.",
                    self.config.bucket
                )
            })?;

        let keys: Vec<String> = response
            .contents()
            .iter()
            .filter_map(|object| object.key().map(str::to_string))
            .collect();
        trace!("📃 listed {} keys from s3://{}", keys.len(), self.config.bucket);

        Ok(ListedPage {
            keys,
            next_token: response.next_continuation_token().map(str::to_string),
        })
    }

    async fn fetch(&self, key: &str) -> Result<String> {
        let response = self
            .client
            .get_object()
            .bucket(&self.config.bucket)
            .key(key)
            .send()
            .await
            .with_context(|| {
                format!(
                    "💀 GetObject failed for s3://{}/{key}. It was in the listing a second ago. \
                     Check: IAM permissions, bucket policy, whether someone is deleting things.",
                    self.config.bucket
                )
            })?;

        let bytes = response
            .body
            .collect()
            .await
            .with_context(|| format!("💀 The body of s3://{}/{key} stopped mid-stream", self.config.bucket))?
            .into_bytes();

        String::from_utf8(bytes.to_vec())
            .with_context(|| format!("💀 s3://{}/{key} is not UTF-8", self.config.bucket))
    }
}
