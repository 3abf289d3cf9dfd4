//! 🎬 *[a channel holds one batch. a worker holds another. nobody else gets in.]*
//!
//! 🗑️ The SinkWorker: one per record kind. It pulls full batches off a
//! bounded channel, turns them into rows, and hands them to the bulk writer,
//! one batch at a time. While it sits in a backoff sleep, the channel fills
//! and the supervisor waits on `send`, so a throttled table never has more
//! than one write per kind aimed at it.

use anyhow::Result;
use async_channel::Receiver;
use tokio::task::JoinHandle;
use tracing::debug;

use super::Worker;
use crate::backends::WriteRequest;
use crate::bulk_writer::BatchWriter;
use crate::collectors::Batch;
use crate::common::RecordKind;
use crate::progress::WriteStats;
use crate::transforms::rows_for_batch;

#[derive(Debug)]
pub(in crate::supervisors) struct SinkWorker {
    kind: RecordKind,
    rx: Receiver<Batch>,
    writer: BatchWriter,
    run_id: String,
}

impl SinkWorker {
    pub(in crate::supervisors) fn new(
        kind: RecordKind,
        rx: Receiver<Batch>,
        writer: BatchWriter,
        run_id: String,
    ) -> Self {
        Self {
            kind,
            rx,
            writer,
            run_id,
        }
    }
}

impl Worker for SinkWorker {
    type Output = WriteStats;

    fn start(self) -> JoinHandle<Result<WriteStats>> {
        tokio::spawn(async move {
            debug!("📥 {} SinkWorker started draining channel...", self.kind);
            let mut stats = WriteStats::default();
            while let Ok(batch) = self.rx.recv().await {
                let requests: Vec<WriteRequest> = rows_for_batch(&batch, &self.run_id)
                    .into_iter()
                    .map(WriteRequest::Put)
                    .collect();
                let row_count = requests.len();
                debug!(
                    "🪣 {} SinkWorker flushing batch of {} documents as {} rows",
                    self.kind,
                    batch.len(),
                    row_count
                );
                let outcome = self.writer.write(requests).await;
                stats.record(&outcome, row_count);
            }
            debug!("🏁 {} SinkWorker: channel closed. Shutting down.", self.kind);
            Ok(stats)
        })
    }
}
