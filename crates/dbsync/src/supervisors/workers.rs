//! 🧵 Workers: the ones who actually do the writing while the Supervisor
//! takes all the credit in the sprint retro.
//!
//! ⚠️ Private to the supervisor. The world does not need to know they exist.

use anyhow::Result;
use tokio::task::JoinHandle;

mod sink_worker;
pub(super) use sink_worker::SinkWorker;

/// 🏗️ A background worker, that does work. duh.
pub(super) trait Worker {
    type Output: Send + 'static;

    /// 🚀 Spawn onto the runtime. The handle yields whatever the worker tallied up.
    fn start(self) -> JoinHandle<Result<Self::Output>>;
}
