//! 🗄️ DynamoDB backend: the table at the end of the pipeline.
//!
//! `BatchWriteItem` for puts and deletes, `Scan` for the orphan sweep,
//! `CreateTable` for day one. The SDK's own retries are switched off so the
//! bulk writer's backoff is the only one in play.

mod attributes;
mod dynamodb_table;

pub(crate) use dynamodb_table::DynamoDbTable;
pub use dynamodb_table::DynamoDbTableConfig;
