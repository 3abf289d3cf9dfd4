//! 🧹 Orphan sweep: rows whose source document is gone stay in the table forever,
//! unless somebody comes through with a broom.
//!
//! Every row carries the id of the run that last wrote it. After a clean run,
//! anything with a different id was not in the bucket this time, so it goes.
//! Unless it lives outside the listed prefix, in which case this run never
//! looked for it and has no business deleting it.

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::backends::{Table, TableBackend, WriteRequest};
use crate::bulk_writer::{BatchWriter, WriteOutcome};

/// 🔭 Is `key` at or below the canonical `scope`? `/` covers everything.
pub(super) fn in_scope(key: &str, scope: &str) -> bool {
    scope == "/"
        || key == scope
        || key
            .strip_prefix(scope)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// 🧹 Delete every row under `scope` not stamped with `run_id`. Returns how many went away.
pub(super) async fn sweep_orphans(
    table: &TableBackend,
    writer: &BatchWriter,
    run_id: &str,
    scope: &str,
    batch_capacity: usize,
) -> Result<usize> {
    let orphans: Vec<String> = table
        .scan_run_ids()
        .await
        .context("💀 Could not scan the table for orphans")?
        .into_iter()
        .filter(|(key, row_run_id)| {
            row_run_id.as_deref() != Some(run_id) && in_scope(key, scope)
        })
        .map(|(key, _)| key)
        .collect();

    if orphans.is_empty() {
        info!("🧹 no orphans to sweep");
        return Ok(0);
    }
    info!("🧹 sweeping {} orphaned rows", orphans.len());

    let mut swept = 0;
    for chunk in orphans.chunks(batch_capacity.max(1)) {
        let requests = chunk.iter().cloned().map(WriteRequest::Delete).collect();
        match writer.write(requests).await {
            WriteOutcome::Written { .. } => swept += chunk.len(),
            WriteOutcome::Abandoned { unwritten, .. } => {
                warn!("🪦 {unwritten} orphans survived the sweep, throttled to the end");
                swept += chunk.len() - unwritten;
            }
            WriteOutcome::Failed { reason, .. } => {
                warn!("💥 orphan delete failed, leaving {} rows: {reason}", chunk.len());
            }
        }
    }
    Ok(swept)
}
