use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::backends::{BulkWriteOutcome, Table, WriteRequest};
use crate::common::Row;
use crate::transforms::attr;

/// 🎬 What the next bulk call should pretend happened. Unscripted calls just succeed.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Scripted {
    /// 🐢 Nothing written, everything comes back unprocessed.
    Throttle,
    /// 🐢 The first `n` requests land, the rest come back unprocessed.
    ThrottleAfter(usize),
    /// 💥 A hard error. Nothing written.
    Fail(String),
}

#[derive(Debug, Default)]
struct TableState {
    rows: BTreeMap<String, Row>,
    calls: Vec<Vec<String>>,
    script: VecDeque<Scripted>,
    /// 🛣️ Calls in flight right now, and the most ever seen, per lane.
    lane_in_flight: BTreeMap<String, usize>,
    lane_peak: BTreeMap<String, usize>,
}

/// 🗄️ A table that never forgets, and never bills.
///
/// Clone-able because tests need to peek inside after handing a copy to the
/// pipeline. Every clone shares the same rows, call log, and script.
#[derive(Debug, Clone, Default)]
pub(crate) struct InMemoryTable {
    state: Arc<Mutex<TableState>>,
    latency: Duration,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl InMemoryTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// ⏳ Hold every bulk call open this long, so overlapping calls are observable.
    pub(crate) fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub(crate) async fn script(&self, outcomes: impl IntoIterator<Item = Scripted>) {
        self.state.lock().await.script.extend(outcomes);
    }

    pub(crate) async fn insert(&self, row: Row) {
        self.state.lock().await.rows.insert(row.key.clone(), row);
    }

    pub(crate) async fn rows(&self) -> BTreeMap<String, Row> {
        self.state.lock().await.rows.clone()
    }

    pub(crate) async fn row(&self, key: &str) -> Option<Row> {
        self.state.lock().await.rows.get(key).cloned()
    }

    /// 📒 The keys sent by every bulk call, in call order.
    pub(crate) async fn calls(&self) -> Vec<Vec<String>> {
        self.state.lock().await.calls.clone()
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// 🛣️ Peak concurrent calls for one lane: the `pageKind` of the rows being
    /// put (`"page"`, `"section"`), or `"delete"` for sweeps.
    pub(crate) async fn max_in_flight_for(&self, lane: &str) -> usize {
        self.state
            .lock()
            .await
            .lane_peak
            .get(lane)
            .copied()
            .unwrap_or(0)
    }

    fn lane_of(requests: &[WriteRequest]) -> String {
        match requests.first() {
            Some(WriteRequest::Put(row)) => row.string(attr::KIND).unwrap_or("unknown").to_string(),
            Some(WriteRequest::Delete(_)) => "delete".to_string(),
            None => "empty".to_string(),
        }
    }

    fn apply(rows: &mut BTreeMap<String, Row>, requests: Vec<WriteRequest>) {
        for request in requests {
            match request {
                WriteRequest::Put(row) => {
                    rows.insert(row.key.clone(), row);
                }
                WriteRequest::Delete(key) => {
                    rows.remove(&key);
                }
            }
        }
    }
}

#[async_trait]
impl Table for InMemoryTable {
    async fn bulk_write(&self, mut requests: Vec<WriteRequest>) -> Result<BulkWriteOutcome> {
        let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);
        let lane = Self::lane_of(&requests);
        {
            let mut state = self.state.lock().await;
            let lane_now = {
                let count = state.lane_in_flight.entry(lane.clone()).or_default();
                *count += 1;
                *count
            };
            let peak = state.lane_peak.entry(lane.clone()).or_default();
            *peak = (*peak).max(lane_now);
        }
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let outcome = {
            let mut state = self.state.lock().await;
            if let Some(count) = state.lane_in_flight.get_mut(&lane) {
                *count -= 1;
            }
            state
                .calls
                .push(requests.iter().map(|r| r.key().to_string()).collect());
            match state.script.pop_front() {
                None => {
                    Self::apply(&mut state.rows, requests);
                    Ok(BulkWriteOutcome::Written)
                }
                Some(Scripted::Throttle) => Ok(BulkWriteOutcome::Throttled {
                    unprocessed: requests,
                    reason: "scripted throttle".to_string(),
                }),
                Some(Scripted::ThrottleAfter(n)) => {
                    let unprocessed = requests.split_off(n.min(requests.len()));
                    Self::apply(&mut state.rows, requests);
                    Ok(BulkWriteOutcome::Throttled {
                        unprocessed,
                        reason: format!("scripted throttle after {n}"),
                    })
                }
                Some(Scripted::Fail(reason)) => Err(anyhow::anyhow!("💀 {reason}")),
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome
    }

    async fn scan_run_ids(&self) -> Result<Vec<(String, Option<String>)>> {
        let state = self.state.lock().await;
        Ok(state
            .rows
            .iter()
            .map(|(key, row)| {
                (
                    key.clone(),
                    row.string(attr::SYNC_RUN_ID).map(str::to_string),
                )
            })
            .collect())
    }
}
