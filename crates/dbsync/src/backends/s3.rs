//! 🪣 S3 backend: the bucket full of index documents.
//!
//! `ListObjectsV2` fifty keys at a time, `GetObject` for the ones that matter.
//! Config lives next to the store that reads it, same as every other backend.

mod s3_object_store;

pub(crate) use s3_object_store::S3ObjectStore;
pub use s3_object_store::S3SourceConfig;
