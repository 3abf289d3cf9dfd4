//! 🎬 *[camera pans across a bucket of ten thousand index.json files]*
//! 🎬 "In a world where content must be synced..."
//! 🎬 "One supervisor dared to list them all." 🦆
//!
//! 📦 The Supervisor drives one run end to end:
//!
//! ```text
//!   Start ─▶ Listing ─▶ (Classifying ─▶ Accumulating)* ─▶ Draining ─▶ Done
//!              │  ▲                          │
//!              └──┘ next token               └─▶ full batch ─▶ SinkWorker(kind) ─▶ table
//! ```
//!
//! Listing, fetching, parsing and classifying happen right here, one key at a
//! time. Full batches go out over a bounded channel to the sink worker for
//! their kind, so at most one bulk write per kind is ever in flight.
//!
//! ⚠️ WORKERS ARE THE SUPERVISOR'S PRIVATE LITTLE MINIONS. DO NOT MAKE THEM PUB.

mod sweep;
mod workers;

use std::time::Instant;

use anyhow::{Context, Result};
use async_channel::Sender;
use tracing::{debug, info, trace, warn};

use crate::app_config::AppConfig;
use crate::backends::{ObjectStore, ObjectStoreBackend, TableBackend};
use crate::bulk_writer::{BackoffPolicy, BatchWriter};
use crate::classifier::classify;
use crate::collectors::{Batch, BatchAccumulator};
use crate::common::{
    DEFAULT_INDEX_DOCUMENT, RawDocument, RecordKind, canonicalize, is_index_document,
};
use crate::progress::{SyncProgress, SyncSummary};
use workers::{SinkWorker, Worker};

/// 🔧 The slice of configuration a run actually needs.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PipelineSettings {
    pub run_id: String,
    pub label: String,
    pub index_document: String,
    pub batch_capacity: usize,
    pub backoff: BackoffPolicy,
    pub write_sections: bool,
    pub sweep_orphans: bool,
    /// 🔭 Canonical form of the listing prefix. The sweep never reaches outside it.
    pub sweep_scope: String,
}

impl PipelineSettings {
    pub(crate) fn from_config(config: &AppConfig, run_id: String) -> Self {
        Self {
            run_id,
            label: format!("s3://{}", config.source.bucket),
            index_document: config.source.index_document.clone(),
            batch_capacity: config.runtime.batch_capacity,
            backoff: config.runtime.backoff_policy(),
            write_sections: config.runtime.write_sections,
            sweep_orphans: config.runtime.sweep_orphans,
            sweep_scope: config
                .source
                .prefix
                .as_deref()
                .map_or_else(|| "/".to_string(), canonicalize),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            run_id: "run-0".to_string(),
            label: "memory".to_string(),
            index_document: DEFAULT_INDEX_DOCUMENT.to_string(),
            batch_capacity: 20,
            backoff: BackoffPolicy::default(),
            write_sections: true,
            sweep_orphans: false,
            sweep_scope: "/".to_string(),
        }
    }
}

/// 📮 One bounded channel per kind. Capacity one: a queued batch waits while
/// the worker's batch is in flight, and the next `send` waits for both.
struct BatchSenders {
    pages: Sender<Batch>,
    sections: Sender<Batch>,
}

impl BatchSenders {
    async fn send(&self, batch: Batch) -> Result<()> {
        let kind = batch.kind;
        let tx = match kind {
            RecordKind::Page => &self.pages,
            RecordKind::Section => &self.sections,
        };
        tx.send(batch)
            .await
            .map_err(|_| anyhow::anyhow!("💀 the {kind} SinkWorker hung up before the run was over"))
    }
}

/// 📦 Owns the store, the table, and every batch of the run.
#[derive(Debug)]
pub(crate) struct Supervisor {
    store: ObjectStoreBackend,
    table: TableBackend,
    settings: PipelineSettings,
}

impl Supervisor {
    pub(crate) fn new(
        store: ObjectStoreBackend,
        table: TableBackend,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            store,
            table,
            settings,
        }
    }

    /// 🚀 Run once. Only listing and parse errors end the run early; write
    /// trouble is counted in the summary and the run carries on.
    pub(crate) async fn run(&self) -> Result<SyncSummary> {
        let started = Instant::now();
        let mut summary = SyncSummary {
            run_id: self.settings.run_id.clone(),
            ..SyncSummary::default()
        };
        info!(
            "🚀 sync run {} starting from {}",
            self.settings.run_id, self.settings.label
        );

        let writer = BatchWriter::new(self.table.clone(), self.settings.backoff);
        let (pages_tx, pages_rx) = async_channel::bounded(1);
        let (sections_tx, sections_rx) = async_channel::bounded(1);
        let page_worker = SinkWorker::new(
            RecordKind::Page,
            pages_rx,
            writer.clone(),
            self.settings.run_id.clone(),
        )
        .start();
        let section_worker = SinkWorker::new(
            RecordKind::Section,
            sections_rx,
            writer.clone(),
            self.settings.run_id.clone(),
        )
        .start();
        let senders = BatchSenders {
            pages: pages_tx,
            sections: sections_tx,
        };

        let progress = SyncProgress::new(&self.settings.label);
        let mut accumulator = BatchAccumulator::new(self.settings.batch_capacity);
        let mut enumerated = self
            .enumerate(&mut accumulator, &senders, &mut summary, &progress)
            .await;
        progress.finish();

        if enumerated.is_ok() {
            debug!("🚰 draining partial batches");
            for batch in accumulator.drain() {
                if let Err(err) = self.dispatch(batch, &senders, &mut summary).await {
                    enumerated = Err(err);
                    break;
                }
            }
        }

        // -- 🔒 closing the channels is what lets the workers finish
        drop(senders);
        let (pages_done, sections_done) = futures::future::join(page_worker, section_worker).await;
        summary
            .writes
            .merge(pages_done.context("💀 page SinkWorker panicked")??);
        summary
            .writes
            .merge(sections_done.context("💀 section SinkWorker panicked")??);

        enumerated?;
        info!(
            "✅ finished enumerating: {} pages and {} sections",
            summary.pages, summary.sections
        );

        if self.settings.sweep_orphans {
            self.sweep(&writer, &mut summary).await;
        }

        summary.elapsed = started.elapsed();
        Ok(summary)
    }

    /// 📃 Listing → (Classifying → Accumulating)*, following tokens until there are none.
    async fn enumerate(
        &self,
        accumulator: &mut BatchAccumulator,
        senders: &BatchSenders,
        summary: &mut SyncSummary,
        progress: &SyncProgress,
    ) -> Result<()> {
        let mut token: Option<String> = None;
        loop {
            let page = self
                .store
                .list_page(token.take())
                .await
                .with_context(|| format!("💀 Listing {} failed", self.settings.label))?;
            summary.keys_listed += page.keys.len();

            for key in page.keys {
                if !is_index_document(&key, &self.settings.index_document) {
                    trace!("⏭️ skipping '{key}'");
                    summary.keys_skipped += 1;
                    continue;
                }

                let body = match self.store.fetch(&key).await {
                    Ok(body) => body,
                    Err(err) => {
                        warn!("💥 could not fetch '{key}', moving on: {err:#}");
                        summary.fetch_failures += 1;
                        continue;
                    }
                };

                let document = RawDocument::parse(&body, &key)?;
                let classified = classify(&key, document);
                trace!("🏷️ '{key}' is a {} at {}", classified.kind, classified.path);
                match classified.kind {
                    RecordKind::Page => summary.pages += 1,
                    RecordKind::Section => summary.sections += 1,
                }

                if let Some(batch) = accumulator.add(classified) {
                    self.dispatch(batch, senders, summary).await?;
                }
            }

            debug!(
                "🔎 found {} pages and {} sections so far",
                summary.pages, summary.sections
            );
            progress.update(summary);

            match page.next_token {
                Some(next) => token = Some(next),
                None => return Ok(()),
            }
        }
    }

    async fn dispatch(
        &self,
        batch: Batch,
        senders: &BatchSenders,
        summary: &mut SyncSummary,
    ) -> Result<()> {
        if batch.kind == RecordKind::Section && !self.settings.write_sections {
            info!(
                "🗂️ section writes are turned off, not writing {} sections",
                batch.len()
            );
            summary.sections_skipped += batch.len();
            return Ok(());
        }
        senders.send(batch).await
    }

    async fn sweep(&self, writer: &BatchWriter, summary: &mut SyncSummary) {
        if !summary.is_clean() || summary.sections_skipped > 0 {
            warn!(
                "🧹 skipping the orphan sweep: this run did not write every document it found"
            );
            return;
        }
        match sweep::sweep_orphans(
            &self.table,
            writer,
            &self.settings.run_id,
            &self.settings.sweep_scope,
            self.settings.batch_capacity,
        )
        .await
        {
            Ok(swept) => summary.rows_swept = swept,
            Err(err) => warn!("🧹 orphan sweep failed, rows left as they were: {err:#}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::in_mem::{InMemoryObjectStore, InMemoryTable, Scripted};
    use crate::common::Row;
    use crate::transforms::attr;
    use std::time::Duration;

    fn supervisor(
        store: &InMemoryObjectStore,
        table: &InMemoryTable,
        settings: PipelineSettings,
    ) -> Supervisor {
        Supervisor::new(
            ObjectStoreBackend::InMemory(store.clone()),
            TableBackend::InMemory(table.clone()),
            settings,
        )
    }

    fn page_json(title: &str) -> String {
        serde_json::json!({ "title": title, "children": [] }).to_string()
    }

    #[tokio::test]
    async fn the_one_where_the_example_site_syncs() -> Result<()> {
        let store = InMemoryObjectStore::new(50)
            .with_object(
                "/a/index.json",
                serde_json::json!({"children": [], "title": "T", "tags": ["x", "y"]}).to_string(),
            )
            .with_object(
                "/a/b/index.json",
                serde_json::json!({"children": [{"link": "/a/b/c"}], "title": "B"}).to_string(),
            );
        let table = InMemoryTable::new();

        let summary = supervisor(&store, &table, PipelineSettings::default())
            .run()
            .await?;

        assert_eq!(summary.pages, 1);
        assert_eq!(summary.sections, 1);
        assert!(summary.is_clean());

        let page = table.row("/a").await.expect("page row for /a");
        assert_eq!(page.string(attr::SECTION), Some("/"));
        assert_eq!(page.string(attr::TAGS), Some("x y"));
        assert_eq!(page.string(attr::KIND), Some("page"));

        let section = table.row("/a/b").await.expect("section row for /a/b");
        assert_eq!(section.string(attr::KIND), Some("section"));
        assert_eq!(section.number(attr::CHILD_COUNT), Some(1));
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_only_index_files_get_fetched() -> Result<()> {
        let store = InMemoryObjectStore::new(3)
            .with_object("a/index.json", page_json("a"))
            .with_object("a/cover.png", "binary-ish")
            .with_object("b/index.json", page_json("b"))
            .with_object("b/index.json.bak", "{ definitely not json")
            .with_object("c/notindex.json", "{}")
            .with_object("index.json", page_json("root"))
            .with_object("robots.txt", "User-agent: *");
        let table = InMemoryTable::new();

        let summary = supervisor(&store, &table, PipelineSettings::default())
            .run()
            .await?;

        assert_eq!(store.fetch_count(), 3);
        assert_eq!(summary.keys_listed, 7);
        assert_eq!(summary.keys_skipped, 4);
        assert_eq!(store.list_count(), 3, "7 keys at 3 per page is three listings");
        assert_eq!(table.rows().await.len(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_batches_fill_to_twenty_and_not_one_more() -> Result<()> {
        let store = (0..45).fold(InMemoryObjectStore::new(7), |store, n| {
            store.with_object(&format!("posts/{n:02}/index.json"), page_json(&n.to_string()))
        });
        let table = InMemoryTable::new();

        let summary = supervisor(&store, &table, PipelineSettings::default())
            .run()
            .await?;

        let sizes: Vec<usize> = table.calls().await.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![20, 20, 5]);
        assert_eq!(summary.writes.batches_written, 3);
        assert_eq!(summary.writes.rows_written, 45);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_an_empty_bucket_writes_nothing() -> Result<()> {
        let store = InMemoryObjectStore::new(10);
        let table = InMemoryTable::new();

        let summary = supervisor(&store, &table, PipelineSettings::default())
            .run()
            .await?;

        assert_eq!(summary.keys_listed, 0);
        assert!(table.calls().await.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_malformed_json_stops_the_show() {
        let store = InMemoryObjectStore::new(10)
            .with_object("a/index.json", page_json("fine"))
            .with_object("b/index.json", "{ \"title\": ");
        let table = InMemoryTable::new();

        let err = supervisor(&store, &table, PipelineSettings::default())
            .run()
            .await
            .expect_err("a malformed index document is fatal");
        assert!(format!("{err:#}").contains("b/index.json"));
    }

    #[tokio::test]
    async fn the_one_where_a_missing_file_is_counted_not_fatal() -> Result<()> {
        let store = InMemoryObjectStore::new(10)
            .with_object("a/index.json", page_json("a"))
            .with_failing_object("b/index.json")
            .with_object("c/index.json", page_json("c"));
        let table = InMemoryTable::new();

        let summary = supervisor(&store, &table, PipelineSettings::default())
            .run()
            .await?;

        assert_eq!(summary.fetch_failures, 1);
        assert_eq!(summary.pages, 2);
        assert_eq!(table.rows().await.len(), 2);
        assert!(!summary.is_clean());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn the_one_where_one_write_per_kind_is_in_flight() -> Result<()> {
        let store = (0..100).fold(InMemoryObjectStore::new(50), |store, n| {
            store.with_object(&format!("p/{n:03}/index.json"), page_json("p"))
        });
        let table = InMemoryTable::new().with_latency(Duration::from_millis(250));
        table
            .script([Scripted::Throttle, Scripted::Throttle, Scripted::Throttle])
            .await;

        let summary = supervisor(&store, &table, PipelineSettings::default())
            .run()
            .await?;

        assert_eq!(table.max_in_flight(), 1);
        assert_eq!(summary.writes.batches_written, 5);
        assert_eq!(table.rows().await.len(), 100);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn the_one_where_throttling_to_the_end_is_reported() -> Result<()> {
        let store = InMemoryObjectStore::new(10).with_object("a/index.json", page_json("a"));
        let table = InMemoryTable::new();
        table.script(std::iter::repeat_n(Scripted::Throttle, 3)).await;
        let settings = PipelineSettings {
            backoff: BackoffPolicy {
                initial: Duration::from_millis(10),
                max_attempts: 3,
            },
            ..PipelineSettings::default()
        };

        let summary = supervisor(&store, &table, settings).run().await?;

        assert_eq!(summary.writes.batches_abandoned, 1);
        assert_eq!(summary.writes.rows_unwritten, 1);
        assert!(!summary.is_clean());
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_the_last_write_wins() -> Result<()> {
        let table = InMemoryTable::new();
        let first = InMemoryObjectStore::new(10).with_object("a/index.json", page_json("old"));
        supervisor(&first, &table, PipelineSettings::default())
            .run()
            .await?;

        let second = InMemoryObjectStore::new(10).with_object("a/index.json", page_json("new"));
        supervisor(&second, &table, PipelineSettings::default())
            .run()
            .await?;

        let rows = table.rows().await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows["/a"].string(attr::TITLE), Some("new"));
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_sections_can_sit_this_one_out() -> Result<()> {
        let store = InMemoryObjectStore::new(10)
            .with_object("s/index.json", serde_json::json!({"children": [1, 2]}).to_string())
            .with_object("s/p/index.json", page_json("p"));
        let table = InMemoryTable::new();
        let settings = PipelineSettings {
            write_sections: false,
            ..PipelineSettings::default()
        };

        let summary = supervisor(&store, &table, settings).run().await?;

        assert_eq!(summary.sections, 1);
        assert_eq!(summary.sections_skipped, 1);
        assert!(table.row("/s").await.is_none());
        assert!(table.row("/s/p").await.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_the_sweep_follows_a_clean_run() -> Result<()> {
        let table = InMemoryTable::new();
        table
            .insert(Row::new("/gone").with_string(attr::SYNC_RUN_ID, "run-old"))
            .await;
        let store = InMemoryObjectStore::new(10).with_object("here/index.json", page_json("here"));
        let settings = PipelineSettings {
            run_id: "run-new".to_string(),
            sweep_orphans: true,
            ..PipelineSettings::default()
        };

        let summary = supervisor(&store, &table, settings).run().await?;

        assert_eq!(summary.rows_swept, 1);
        let keys: Vec<String> = table.rows().await.into_keys().collect();
        assert_eq!(keys, vec!["/here".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_dirty_run_skips_the_sweep() -> Result<()> {
        let table = InMemoryTable::new();
        table
            .insert(Row::new("/maybe-gone").with_string(attr::SYNC_RUN_ID, "run-old"))
            .await;
        let store = InMemoryObjectStore::new(10)
            .with_object("here/index.json", page_json("here"))
            .with_failing_object("flaky/index.json");
        let settings = PipelineSettings {
            run_id: "run-new".to_string(),
            sweep_orphans: true,
            ..PipelineSettings::default()
        };

        let summary = supervisor(&store, &table, settings).run().await?;

        assert_eq!(summary.rows_swept, 0);
        assert!(table.row("/maybe-gone").await.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_quirky_document_still_gets_a_row() -> Result<()> {
        let store = InMemoryObjectStore::new(10)
            .with_object("a/index.json", page_json("a"))
            .with_object(
                "b/index.json",
                r#"{"date": 20240101, "tags": "solo", "images": [null]}"#,
            )
            .with_object("c/index.json", page_json("c"));
        let table = InMemoryTable::new();

        let summary = supervisor(&store, &table, PipelineSettings::default())
            .run()
            .await?;

        assert_eq!(summary.pages, 3);
        assert!(summary.is_clean());
        let quirky = table.row("/b").await.expect("row for the quirky document");
        assert_eq!(quirky.string(attr::DATE), Some("20240101"));
        assert_eq!(quirky.string(attr::TAGS), Some("solo"));
        assert_eq!(quirky.list(attr::TAG_ARRAY), Some(&["solo".to_string()][..]));
        assert_eq!(quirky.string(attr::IMAGE), Some(""));
        assert_eq!(quirky.list(attr::IMAGE_ARRAY), Some(&[][..]));
        assert!(table.row("/a").await.is_some());
        assert!(table.row("/c").await.is_some());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn the_one_where_pages_and_sections_each_get_one_lane() -> Result<()> {
        // -- 🔀 interleaved keys so both kinds fill batches while the other is mid-write
        let store = (0..60).fold(InMemoryObjectStore::new(25), |store, n| {
            store
                .with_object(&format!("{n:02}/p/index.json"), page_json("p"))
                .with_object(
                    &format!("{n:02}/s/index.json"),
                    serde_json::json!({"children": [{"link": "x"}]}).to_string(),
                )
        });
        let table = InMemoryTable::new().with_latency(Duration::from_millis(250));
        table.script([Scripted::Throttle, Scripted::Throttle]).await;

        let summary = supervisor(&store, &table, PipelineSettings::default())
            .run()
            .await?;

        assert_eq!(summary.pages, 60);
        assert_eq!(summary.sections, 60);
        assert_eq!(table.max_in_flight_for("page").await, 1);
        assert_eq!(table.max_in_flight_for("section").await, 1);
        assert!(table.max_in_flight() <= 2);
        assert_eq!(summary.writes.batches_written, 6);
        assert_eq!(table.rows().await.len(), 120);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_prefixed_run_only_sweeps_its_own_yard() -> Result<()> {
        let table = InMemoryTable::new();
        table
            .insert(Row::new("/other/page").with_string(attr::SYNC_RUN_ID, "run-old"))
            .await;
        table
            .insert(Row::new("/posts/gone").with_string(attr::SYNC_RUN_ID, "run-old"))
            .await;
        let store = InMemoryObjectStore::new(10).with_object("posts/x/index.json", page_json("x"));
        let settings = PipelineSettings {
            run_id: "run-new".to_string(),
            sweep_orphans: true,
            sweep_scope: "/posts".to_string(),
            ..PipelineSettings::default()
        };

        let summary = supervisor(&store, &table, settings).run().await?;

        assert_eq!(summary.rows_swept, 1);
        let keys: Vec<String> = table.rows().await.into_keys().collect();
        assert_eq!(keys, vec!["/other/page", "/posts/x"]);
        Ok(())
    }

    #[test]
    fn the_one_where_the_prefix_becomes_the_sweep_scope() {
        let config = |prefix: Option<&str>| -> AppConfig {
            serde_json::from_value(serde_json::json!({
                "source": { "bucket": "site", "prefix": prefix },
                "table": { "table_name": "pages" }
            }))
            .expect("minimal config deserializes")
        };

        let scoped = PipelineSettings::from_config(&config(Some("posts/")), "run-1".into());
        assert_eq!(scoped.sweep_scope, "/posts");
        let everything = PipelineSettings::from_config(&config(None), "run-1".into());
        assert_eq!(everything.sweep_scope, "/");
    }
}
