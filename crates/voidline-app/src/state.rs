//! State shared between the game loop thread and its callers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LockResult, RwLock};

use tracing::warn;

use voidline_core::commands::SimCommand;
use voidline_sim::PublishedTraces;

static TRACE_LOCK_POISONED: AtomicBool = AtomicBool::new(false);

/// Take the guard even if a writer panicked. Warns on the first poisoned
/// access only.
fn recover<G>(result: LockResult<G>, operation: &'static str) -> G {
    result.unwrap_or_else(|poisoned| {
        if !TRACE_LOCK_POISONED.swap(true, Ordering::Relaxed) {
            warn!(operation, "trace_handle_lock_poisoned");
        }
        poisoned.into_inner()
    })
}

/// Commands sent from the caller to the game loop thread.
#[derive(Debug)]
pub enum GameLoopCommand {
    /// A command to forward to the simulation engine.
    Sim(SimCommand),
    /// Shut down the game loop thread gracefully.
    Shutdown,
}

/// Where presentation readers pick up the latest published trace.
///
/// The game loop swaps in a whole `Arc<PublishedTraces>` after every tick;
/// a reader clones the `Arc` and can interpolate from it for as long as it
/// likes without blocking the loop.
#[derive(Clone, Debug, Default)]
pub struct TraceHandle {
    latest: Arc<RwLock<Arc<PublishedTraces>>>,
}

impl TraceHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Arc<PublishedTraces> {
        Arc::clone(&*recover(self.latest.read(), "read"))
    }

    pub(crate) fn publish(&self, traces: Arc<PublishedTraces>) {
        *recover(self.latest.write(), "write") = traces;
    }
}
