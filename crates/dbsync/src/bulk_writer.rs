//! 🐢 Bulk writer: one bulk call per batch, and patience when the table says no.
//!
//! ```text
//!   attempt 1 ──throttled──▶ sleep 1.5s ──▶ attempt 2 ──throttled──▶ sleep 3s ──▶ ...
//!       │                                       │
//!       └──other error──▶ Failed                └──written──▶ Written
//! ```
//!
//! Only throttling earns a retry. Anything else is logged and the batch is
//! given up on, so one bad batch doesn't sink the whole run. Running out of
//! attempts is reported as `Abandoned`, distinct from `Failed`, and both end
//! up in the run summary.

use std::time::Duration;

use tracing::{debug, warn};

use crate::backends::{BulkWriteOutcome, Table, TableBackend, WriteRequest};

/// ⏱️ Exponential backoff: `initial`, then doubling, for at most `max_attempts` calls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    pub initial: Duration,
    pub max_attempts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(1500),
            max_attempts: 20,
        }
    }
}

impl BackoffPolicy {
    /// ⏳ Sleep before retry number `retry` (1-based): `initial * 2^(retry - 1)`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(31);
        self.initial.saturating_mul(1u32 << exponent)
    }
}

/// 📬 How a batch ended up.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    Written { attempts: u32 },
    /// 🐢 Still throttled after the last allowed attempt.
    Abandoned { attempts: u32, unwritten: usize },
    /// 💥 A non-throttling error. No retry was attempted.
    Failed { attempts: u32, reason: String },
}

/// ✍️ Writes batches into a table with the backoff policy above.
#[derive(Debug, Clone)]
pub(crate) struct BatchWriter {
    table: TableBackend,
    policy: BackoffPolicy,
}

impl BatchWriter {
    /// 🏗️ Cheap to clone. Every clone talks to the same table with the same patience.
    pub(crate) fn new(table: TableBackend, policy: BackoffPolicy) -> Self {
        Self { table, policy }
    }

    /// 📡 Write one batch, come what may. Never errors: every ending is a
    /// [`WriteOutcome`], and the caller decides how sad to be about it.
    ///
    /// Each retry carries only the items the table didn't take last time.
    /// Like a waiter re-bringing only the dishes that got sent back. 🍝
    pub(crate) async fn write(&self, requests: Vec<WriteRequest>) -> WriteOutcome {
        if requests.is_empty() {
            return WriteOutcome::Written { attempts: 0 };
        }
        debug!("📡 starting write of {} items", requests.len());

        let mut pending = requests;
        let mut attempt = 0;
        while attempt < self.policy.max_attempts {
            attempt += 1;
            match self.table.bulk_write(pending).await {
                Ok(BulkWriteOutcome::Written) => {
                    debug!("✅ write completed on attempt {attempt}");
                    return WriteOutcome::Written { attempts: attempt };
                }
                Ok(BulkWriteOutcome::Throttled {
                    unprocessed,
                    reason,
                }) => {
                    if unprocessed.is_empty() {
                        return WriteOutcome::Written { attempts: attempt };
                    }
                    pending = unprocessed;
                    if attempt == self.policy.max_attempts {
                        break;
                    }
                    let delay = self.policy.delay_for(attempt);
                    warn!(
                        "🐢 throughput exceeded ({reason}), retry {} of {} in {:?} with {} items",
                        attempt + 1,
                        self.policy.max_attempts,
                        delay,
                        pending.len()
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    warn!("💥 error writing items, giving up on this batch: {err:#}");
                    return WriteOutcome::Failed {
                        attempts: attempt,
                        reason: format!("{err:#}"),
                    };
                }
            }
        }

        warn!(
            "🪦 still throttled after {attempt} attempts, abandoning {} items",
            pending.len()
        );
        WriteOutcome::Abandoned {
            attempts: attempt,
            unwritten: pending.len(),
        }
    }
}
