//! Render scheduling with explicit lookahead and grace
//!
//! Once per device callback, before mixing processing ID `current`:
//!
//! 1. **Cancel overdue work.** Every outstanding task whose target `T`
//!    satisfies `T + grace <= current` is retired. If it is still queued it
//!    is cancelled, which counts as one drop.
//! 2. **Schedule next work.** For `next = current + lookahead`, every point
//!    and ambient source in the render snapshot is claimed in slot
//!    `next % N` and submitted to the worker pool, once per source per cycle.
//!
//! Submission never blocks or allocates: jobs go through a pre-allocated
//! bounded channel to long-lived workers, and the outstanding list has a
//! fixed capacity. When either is full the source is skipped for that tick
//! (silence, not a drop).

use std::collections::VecDeque;

use basedrop::Shared;
use crossbeam::channel::{self, Receiver, Sender, TrySendError};

use super::snapshot::Snapshot;
use super::source::AudioSource;
use crate::audio::{AudioError, AudioResult};
use crate::config::RenderConfig;
use crate::types::ProcessingId;

/// One source rendering one target
pub(crate) struct RenderJob {
    source: Shared<AudioSource>,
    target: ProcessingId,
}

/// Long-lived render workers fed by a bounded channel
pub struct RenderPool {
    // Declared first so the channel disconnects before the pool is dropped
    tx: Sender<RenderJob>,
    workers: usize,
    _pool: rayon::ThreadPool,
}

impl RenderPool {
    /// Start `workers` threads named `audio-worker-{i}`
    pub fn new(workers: usize, capacity: usize) -> AudioResult<Self> {
        let workers = workers.max(1);
        let (tx, rx) = channel::bounded::<RenderJob>(capacity.max(1));

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("audio-worker-{}", i))
            .build()
            .map_err(|e| AudioError::ThreadSpawnFailed(format!("audio workers: {}", e)))?;

        for _ in 0..workers {
            let rx = rx.clone();
            pool.spawn(move || worker_loop(rx));
        }

        log::info!(
            "Render pool started: {} workers, queue capacity {}",
            workers,
            capacity
        );

        Ok(Self {
            tx,
            workers,
            _pool: pool,
        })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Queue a job without blocking; hands it back if the queue is full
    fn try_submit(&self, job: RenderJob) -> Result<(), RenderJob> {
        match self.tx.try_send(job) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(job)) | Err(TrySendError::Disconnected(job)) => Err(job),
        }
    }
}

/// Runs until every sender is gone
fn worker_loop(rx: Receiver<RenderJob>) {
    for job in rx.iter() {
        job.source.render(job.target);
    }
}

/// Where render jobs execute
pub enum Dispatch {
    /// Synchronously on the scheduling thread
    Inline,
    /// On a [`RenderPool`]
    Pool(RenderPool),
}

impl Dispatch {
    pub fn from_config(config: &RenderConfig) -> AudioResult<Self> {
        if config.worker_threads == 0 {
            return Ok(Dispatch::Inline);
        }
        let capacity = config.max_sources * config.deadline_periods() as usize;
        Ok(Dispatch::Pool(RenderPool::new(config.worker_threads, capacity)?))
    }
}

struct Outstanding {
    source: Shared<AudioSource>,
    target: ProcessingId,
}

/// Per-callback scheduler state, owned by the audio thread
pub struct RenderScheduler {
    dispatch: Dispatch,
    outstanding: VecDeque<Outstanding>,
    capacity: usize,
    lookahead: u64,
    grace: u64,
}

impl RenderScheduler {
    /// Build a scheduler; `config` must already be validated
    pub fn new(config: &RenderConfig) -> AudioResult<Self> {
        let capacity = config.max_sources * (config.deadline_periods() as usize + 1);
        Ok(Self {
            dispatch: Dispatch::from_config(config)?,
            outstanding: VecDeque::with_capacity(capacity),
            capacity,
            lookahead: config.lookahead,
            grace: config.grace,
        })
    }

    /// Retire outstanding tasks that reached their deadline
    ///
    /// Returns the number of tasks that had not finished and were cancelled.
    pub fn cancel_overdue(&mut self, current: ProcessingId) -> u32 {
        let mut drops = 0;
        while let Some(front) = self.outstanding.front() {
            if front.target + self.grace > current {
                break;
            }
            if let Some(entry) = self.outstanding.pop_front() {
                let slot = entry.source.ring().slot_for(entry.target);
                if slot.target_id() == entry.target && slot.cancel() {
                    drops += 1;
                }
            }
        }
        drops
    }

    /// Submit render tasks for `current + lookahead`
    pub fn schedule(&mut self, snapshot: &Snapshot, current: ProcessingId) {
        let next = current + self.lookahead;
        let sources = snapshot
            .sources
            .iter()
            .map(|point| &point.source)
            .chain(snapshot.ambients.iter().map(|ambient| &ambient.source));

        for source in sources {
            self.submit(source, next);
        }
    }

    /// Steps 1 and 2 for one callback; returns the drop count
    pub fn run(&mut self, snapshot: &Snapshot, current: ProcessingId) -> u32 {
        let drops = self.cancel_overdue(current);
        self.schedule(snapshot, current);
        drops
    }

    /// Tasks submitted and not yet retired
    pub fn outstanding(&self) -> usize {
        self.outstanding.len()
    }

    fn submit(&mut self, source: &Shared<AudioSource>, target: ProcessingId) {
        if !source.mark_scheduled(target) {
            return;
        }
        let slot = source.ring().slot_for(target);

        match &self.dispatch {
            Dispatch::Inline => {
                if slot.try_claim(target) {
                    source.render(target);
                }
            }
            Dispatch::Pool(pool) => {
                if self.outstanding.len() >= self.capacity || !slot.try_claim(target) {
                    return;
                }
                let job = RenderJob {
                    source: source.clone(),
                    target,
                };
                match pool.try_submit(job) {
                    Ok(()) => self.outstanding.push_back(Outstanding {
                        source: source.clone(),
                        target,
                    }),
                    Err(_job) => slot.release_claim(),
                }
            }
        }
    }
}

impl Drop for RenderScheduler {
    /// Cancel every task still in flight so cancel-polling providers return
    /// and their workers can exit once the channel disconnects
    fn drop(&mut self) {
        let mut cancelled = 0;
        for entry in self.outstanding.drain(..) {
            let slot = entry.source.ring().slot_for(entry.target);
            if slot.target_id() == entry.target && slot.cancel() {
                cancelled += 1;
            }
        }
        if cancelled > 0 {
            log::debug!("Cancelled {} render task(s) on shutdown", cancelled);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ring::{BufferRing, CancelToken, SlotState};
    use crate::engine::source::{AudioProvider, ConstantProvider};
    use crate::engine::GarbageCollector;
    use crate::types::{PlanarBuffer, SourceKey};
    use std::time::{Duration, Instant};

    struct Blocking;

    impl AudioProvider for Blocking {
        fn provide(
            &self,
            _target: ProcessingId,
            _output: &mut PlanarBuffer,
            _scratch: &mut PlanarBuffer,
            cancel: CancelToken<'_>,
        ) {
            while !cancel.is_cancelled() {
                std::thread::sleep(Duration::from_millis(1));
            }
        }
    }

    fn shared_source(
        gc: &GarbageCollector,
        key: u64,
        provider: impl AudioProvider + 'static,
    ) -> Shared<AudioSource> {
        let ring = BufferRing::new(3, 1, 8);
        Shared::new(
            &gc.handle(),
            AudioSource::new(SourceKey(key), ring, Box::new(provider)),
        )
    }

    fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < Duration::from_secs(5) {
            if condition() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        false
    }

    #[test]
    fn test_inline_renders_lookahead_target() {
        let gc = GarbageCollector::start().unwrap();
        let source = shared_source(&gc, 1, ConstantProvider::new(0.5));
        let mut snapshot = Snapshot::default();
        snapshot.add_ambient(&source, 1.0);

        let mut scheduler = RenderScheduler::new(&RenderConfig::inline()).unwrap();
        assert_eq!(scheduler.run(&snapshot, 0), 0);

        assert!(source.ring().fresh(2).is_some());
        assert!(source.ring().fresh(0).is_none());
        assert_eq!(scheduler.outstanding(), 0);
    }

    #[test]
    fn test_duplicate_listing_is_scheduled_once() {
        let gc = GarbageCollector::start().unwrap();
        let source = shared_source(&gc, 1, Blocking);
        let mut snapshot = Snapshot::default();
        snapshot.add_ambient(&source, 1.0);
        snapshot.add_ambient(&source, 0.5);
        snapshot.add_point_source(&source, crate::types::Pose::IDENTITY, 1.0);

        let config = RenderConfig {
            worker_threads: 1,
            ..RenderConfig::default()
        };
        let mut scheduler = RenderScheduler::new(&config).unwrap();
        scheduler.schedule(&snapshot, 0);
        assert_eq!(scheduler.outstanding(), 1);

        // Deadline for target 2 is the start of callback 2
        assert_eq!(scheduler.cancel_overdue(1), 0);
        assert_eq!(scheduler.cancel_overdue(2), 1);
        assert_eq!(scheduler.outstanding(), 0);

        assert!(wait_for(|| source.ring().slot_for(2).state() == SlotState::Idle));
    }

    #[test]
    fn test_finished_task_is_not_a_drop() {
        let gc = GarbageCollector::start().unwrap();
        let source = shared_source(&gc, 1, ConstantProvider::new(0.25));
        let mut snapshot = Snapshot::default();
        snapshot.add_ambient(&source, 1.0);

        let config = RenderConfig {
            worker_threads: 1,
            ..RenderConfig::default()
        };
        let mut scheduler = RenderScheduler::new(&config).unwrap();
        scheduler.schedule(&snapshot, 0);

        assert!(wait_for(|| source.ring().fresh(2).is_some()));
        assert_eq!(scheduler.cancel_overdue(2), 0);
    }

    #[test]
    fn test_grace_delays_cancellation() {
        let gc = GarbageCollector::start().unwrap();
        let source = shared_source(&gc, 1, Blocking);
        let mut snapshot = Snapshot::default();
        snapshot.add_ambient(&source, 1.0);

        let config = RenderConfig {
            ring_depth: 3,
            lookahead: 1,
            grace: 1,
            worker_threads: 1,
            max_sources: 4,
        };
        let mut scheduler = RenderScheduler::new(&config).unwrap();
        scheduler.schedule(&snapshot, 0);

        assert_eq!(scheduler.cancel_overdue(1), 0);
        assert_eq!(scheduler.cancel_overdue(2), 1);
    }

    #[test]
    fn test_drop_cancels_outstanding_tasks() {
        let gc = GarbageCollector::start().unwrap();
        let source = shared_source(&gc, 1, Blocking);
        let mut snapshot = Snapshot::default();
        snapshot.add_ambient(&source, 1.0);

        let config = RenderConfig {
            worker_threads: 1,
            ..RenderConfig::default()
        };
        let mut scheduler = RenderScheduler::new(&config).unwrap();
        scheduler.schedule(&snapshot, 0);
        assert_eq!(scheduler.outstanding(), 1);

        drop(scheduler);
        drop(snapshot);

        // The worker observes the cancellation, publishes nothing and exits
        assert!(wait_for(|| source.ring().slot_for(2).state() == SlotState::Idle));
        assert!(source.ring().fresh(2).is_none());
    }
}
