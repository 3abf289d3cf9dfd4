use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::backends::{ListedPage, ObjectStore};

/// 🪣 A bucket that fits in a `BTreeMap`.
///
/// Keys are listed in sorted order, `page_size` at a time. The continuation
/// token is just the offset of the next key, stringified, because opaque is
/// in the eye of the beholder.
#[derive(Debug, Clone)]
pub(crate) struct InMemoryObjectStore {
    objects: BTreeMap<String, String>,
    page_size: usize,
    failing_keys: HashSet<String>,
    fetches: Arc<AtomicUsize>,
    listings: Arc<AtomicUsize>,
}

impl InMemoryObjectStore {
    pub(crate) fn new(page_size: usize) -> Self {
        Self {
            objects: BTreeMap::new(),
            page_size: page_size.max(1),
            failing_keys: HashSet::new(),
            fetches: Arc::new(AtomicUsize::new(0)),
            listings: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn with_object(mut self, key: &str, body: impl Into<String>) -> Self {
        self.objects.insert(key.to_string(), body.into());
        self
    }

    /// 💥 The key shows up in listings but every fetch of it fails.
    pub(crate) fn with_failing_object(mut self, key: &str) -> Self {
        self.objects.insert(key.to_string(), String::new());
        self.failing_keys.insert(key.to_string());
        self
    }

    pub(crate) fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub(crate) fn list_count(&self) -> usize {
        self.listings.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn list_page(&self, continuation_token: Option<String>) -> Result<ListedPage> {
        self.listings.fetch_add(1, Ordering::SeqCst);
        let offset = match continuation_token {
            Some(token) => token
                .parse::<usize>()
                .with_context(|| format!("💀 '{token}' is not a token this store ever handed out"))?,
            None => 0,
        };
        let keys: Vec<String> = self
            .objects
            .keys()
            .skip(offset)
            .take(self.page_size)
            .cloned()
            .collect();
        let next = offset + keys.len();
        let next_token = (next < self.objects.len()).then(|| next.to_string());
        Ok(ListedPage { keys, next_token })
    }

    async fn fetch(&self, key: &str) -> Result<String> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.failing_keys.contains(key) {
            anyhow::bail!("💀 in-memory fetch of '{key}' failed on purpose");
        }
        self.objects
            .get(key)
            .cloned()
            .with_context(|| format!("💀 '{key}' not found in the in-memory bucket"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn the_one_where_tokens_walk_the_whole_bucket() -> Result<()> {
        let store = (0..5).fold(InMemoryObjectStore::new(2), |store, n| {
            store.with_object(&format!("k{n}"), "{}")
        });

        let mut seen = Vec::new();
        let mut token = None;
        loop {
            let page = store.list_page(token).await?;
            assert!(page.keys.len() <= 2);
            seen.extend(page.keys);
            token = page.next_token;
            if token.is_none() {
                break;
            }
        }
        assert_eq!(seen, vec!["k0", "k1", "k2", "k3", "k4"]);
        assert_eq!(store.list_count(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_the_empty_bucket_ends_immediately() -> Result<()> {
        let page = InMemoryObjectStore::new(10).list_page(None).await?;
        assert!(page.keys.is_empty());
        assert_eq!(page.next_token, None);
        Ok(())
    }
}
