//! RT-safe garbage collection for snapshot object graphs
//!
//! Sources, rooms and effect graphs are referenced from snapshots through
//! `basedrop::Shared<T>`. When the last reference is dropped on the audio
//! thread or a render worker, the allocation is only enqueued; a dedicated
//! collector thread frees it later, where latency doesn't matter.
//!
//! Each [`AudioEngine`](super::AudioEngine) owns its own collector, so two
//! engines in one process never share state and dropping the engine stops
//! the thread.
//!
//! ```ignore
//! let source = Shared::new(&engine.gc_handle(), my_source);
//! let for_snapshot = source.clone();
//! drop(source);
//! drop(for_snapshot); // queued for the GC thread, not freed here
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use basedrop::{Collector, Handle};

use crate::audio::{AudioError, AudioResult};

/// How often the collector thread reclaims deferred drops
const COLLECT_INTERVAL: Duration = Duration::from_millis(100);

/// Owns the collector thread for one engine instance
pub struct GarbageCollector {
    handle: Handle,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl GarbageCollector {
    /// Spawn the collector thread and wait for its handle
    pub fn start() -> AudioResult<Self> {
        let (tx, rx) = mpsc::channel();
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = stop.clone();

        let thread = thread::Builder::new()
            .name("audio-gc".to_string())
            .spawn(move || {
                // Collector is !Sync, so it is created on the thread that runs it
                let mut collector = Collector::new();
                if tx.send(collector.handle()).is_err() {
                    return;
                }
                log::info!("Audio GC thread started");

                while !thread_stop.load(Ordering::Relaxed) {
                    collector.collect();
                    thread::park_timeout(COLLECT_INTERVAL);
                }

                // Final sweep; anything still referenced elsewhere is leaked
                // to the remaining owners rather than freed under them.
                collector.collect();
                log::debug!(
                    "Audio GC thread stopped ({} allocations outstanding)",
                    collector.alloc_count()
                );
            })
            .map_err(|e| AudioError::ThreadSpawnFailed(format!("audio-gc: {}", e)))?;

        let handle = rx
            .recv()
            .map_err(|_| AudioError::ThreadSpawnFailed("audio-gc exited early".to_string()))?;

        Ok(Self {
            handle,
            stop,
            thread: Some(thread),
        })
    }

    /// Handle for creating `Shared<T>` allocations
    ///
    /// Cheap to clone; may be moved to other threads.
    pub fn handle(&self) -> Handle {
        self.handle.clone()
    }
}

impl Drop for GarbageCollector {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            thread.thread().unpark();
            let _ = thread.join();
        }
    }
}

impl std::fmt::Debug for GarbageCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GarbageCollector")
            .field("running", &self.thread.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use basedrop::Shared;
    use std::sync::atomic::AtomicUsize;

    struct Counted(Arc<AtomicUsize>);

    impl Drop for Counted {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_deferred_drop_runs_on_collector() {
        let drops = Arc::new(AtomicUsize::new(0));
        let gc = GarbageCollector::start().unwrap();

        let value = Shared::new(&gc.handle(), Counted(drops.clone()));
        let clone = value.clone();
        drop(value);
        drop(clone);

        // Dropping the collector performs a final sweep and joins
        drop(gc);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }
}
