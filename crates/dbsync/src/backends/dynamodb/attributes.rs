//! 🧱 Row ⇄ DynamoDB `AttributeValue` plumbing.

use std::collections::HashMap;

use anyhow::{Context, Result};
use aws_sdk_dynamodb::types::{AttributeValue, DeleteRequest, PutRequest};

use crate::backends::WriteRequest;
use crate::common::{Attribute, Row};
use crate::transforms::attr;

pub(crate) fn to_attribute_value(attribute: &Attribute) -> AttributeValue {
    match attribute {
        Attribute::S(s) => AttributeValue::S(s.clone()),
        Attribute::N(n) => AttributeValue::N(n.to_string()),
        Attribute::L(values) => {
            AttributeValue::L(values.iter().cloned().map(AttributeValue::S).collect())
        }
    }
}

pub(crate) fn to_item(row: &Row) -> HashMap<String, AttributeValue> {
    let mut item: HashMap<String, AttributeValue> = row
        .attributes
        .iter()
        .map(|(name, value)| (name.clone(), to_attribute_value(value)))
        .collect();
    // -- 🔑 the hash key always matches the row key, whatever the transform wrote
    item.insert(attr::PATH.to_string(), AttributeValue::S(row.key.clone()));
    item
}

pub(crate) fn to_write_request(
    request: &WriteRequest,
) -> Result<aws_sdk_dynamodb::types::WriteRequest> {
    let built = match request {
        WriteRequest::Put(row) => aws_sdk_dynamodb::types::WriteRequest::builder()
            .put_request(
                PutRequest::builder()
                    .set_item(Some(to_item(row)))
                    .build()
                    .context("💀 PutRequest refused to build")?,
            )
            .build(),
        WriteRequest::Delete(key) => aws_sdk_dynamodb::types::WriteRequest::builder()
            .delete_request(
                DeleteRequest::builder()
                    .key(attr::PATH, AttributeValue::S(key.clone()))
                    .build()
                    .context("💀 DeleteRequest refused to build")?,
            )
            .build(),
    };
    Ok(built)
}

/// 🔑 The key a DynamoDB write request targets, if we can find one.
pub(crate) fn request_key(request: &aws_sdk_dynamodb::types::WriteRequest) -> Option<&str> {
    let from_put = request
        .put_request()
        .and_then(|put| put.item().get(attr::PATH));
    let from_delete = request
        .delete_request()
        .and_then(|delete| delete.key().get(attr::PATH));
    from_put
        .or(from_delete)
        .and_then(|value| value.as_s().ok())
        .map(String::as_str)
}
