//! 📦 Common data structures, the building blocks of dbsync.
//!
//! 🎬 A JSON file sits in a bucket. It has a title. Maybe tags. Maybe children.
//! Maybe nothing at all except a vague sense of purpose. This module gives it
//! a shape ([`RawDocument`]), a name ([`canonicalize`]), and eventually a row
//! ([`Row`]) to live in.
//!
//! 🦆 The duck is table-agnostic. So are these types.

use std::collections::BTreeMap;
use std::fmt;

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// 📄 The file name every content directory publishes its metadata under.
pub const DEFAULT_INDEX_DOCUMENT: &str = "index.json";

/// 📄 One deserialized index document, straight out of the bucket.
///
/// Every field is optional. Missing and `null` both land as `None`, unknown
/// fields are ignored. Nobody validates this thing before it becomes a row,
/// so fields are read leniently too: a number where a string was expected is
/// stringified, a lone string where a list was expected becomes a list of
/// one, and anything stranger than that is treated as absent. Only JSON that
/// does not parse at all is an error.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct RawDocument {
    #[serde(default, deserialize_with = "lenient_string")]
    pub link: Option<String>,
    /// 🧒 Arbitrary child entries. We only ever count them.
    #[serde(default, deserialize_with = "lenient_children")]
    pub children: Option<Vec<serde_json::Value>>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub summary: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub content: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub date: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub tags: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub categories: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub images: Option<Vec<String>>,
}

/// 🔤 Strings stay strings, numbers and booleans get stringified, the rest is `None`.
fn scalar_to_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<Value>::deserialize(deserializer)?.and_then(scalar_to_string))
}

/// 📋 `["a", 1, null]` → `["a", "1"]`, `"solo"` → `["solo"]`, `{..}` → `None`.
fn lenient_list<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Vec<String>>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(items)) => Some(items.into_iter().filter_map(scalar_to_string).collect()),
        Some(other) => scalar_to_string(other).map(|single| vec![single]),
        None => None,
    })
}

/// 🧒 Only an actual array has children. `"children": 3` is a page with ambitions.
fn lenient_children<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Vec<Value>>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(items)) => Some(items),
        _ => None,
    })
}

impl RawDocument {
    /// 🔍 Parse a fetched body. Malformed JSON is an error the caller treats as fatal.
    pub fn parse(raw: &str, key: &str) -> Result<Self> {
        serde_json::from_str(raw).with_context(|| {
            format!(
                "💀 '{key}' is not a valid index document. Whatever generated the site \
                 wrote something that only looks like JSON from a distance."
            )
        })
    }

    pub fn child_count(&self) -> usize {
        self.children.as_ref().map_or(0, Vec::len)
    }
}

/// 🎭 Leaf page or section. Decided purely by whether `children` has anything in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Page,
    Section,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Page => "page",
            Self::Section => "section",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 🧱 One attribute value, in the three flavors the destination table cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attribute {
    S(String),
    N(i64),
    L(Vec<String>),
}

/// 🗄️ A flattened row, keyed by canonical path.
///
/// Table-agnostic on purpose: the DynamoDB backend turns it into
/// `AttributeValue`s, the in-memory table just keeps it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub key: String,
    pub attributes: BTreeMap<String, Attribute>,
}

impl Row {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_string(mut self, name: &str, value: impl Into<String>) -> Self {
        self.attributes
            .insert(name.to_string(), Attribute::S(value.into()));
        self
    }

    pub fn with_number(mut self, name: &str, value: i64) -> Self {
        self.attributes.insert(name.to_string(), Attribute::N(value));
        self
    }

    pub fn with_list(mut self, name: &str, values: Vec<String>) -> Self {
        self.attributes.insert(name.to_string(), Attribute::L(values));
        self
    }

    pub fn string(&self, name: &str) -> Option<&str> {
        match self.attributes.get(name) {
            Some(Attribute::S(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn number(&self, name: &str) -> Option<i64> {
        match self.attributes.get(name) {
            Some(Attribute::N(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn list(&self, name: &str) -> Option<&[String]> {
        match self.attributes.get(name) {
            Some(Attribute::L(l)) => Some(l.as_slice()),
            _ => None,
        }
    }
}

/// 🧭 Canonicalize a storage key or directory into a table key.
///
/// One leading slash, no trailing slash, no trailing `/index.json`, and the
/// empty path becomes `/`. Idempotent: running it twice changes nothing.
pub fn canonicalize(path: &str) -> String {
    let mut canonical = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    };

    let suffix = format!("/{DEFAULT_INDEX_DOCUMENT}");
    loop {
        if canonical.ends_with('/') {
            canonical.pop();
        } else if canonical.ends_with(&suffix) {
            canonical.truncate(canonical.len() - suffix.len());
        } else {
            break;
        }
    }

    if canonical.is_empty() {
        canonical.push('/');
    }
    canonical
}

/// ✂️ Drop the last `/`-separated component. `"a/b/index.json"` → `"a/b"`, `"x"` → `""`.
pub fn strip_last_component(path: &str) -> &str {
    path.rsplit_once('/').map_or("", |(dir, _)| dir)
}

/// 📄 Does this key name exactly the index document (and not merely end with it)?
pub fn is_index_document(key: &str, index_document: &str) -> bool {
    key.rsplit('/').next() == Some(index_document)
}
