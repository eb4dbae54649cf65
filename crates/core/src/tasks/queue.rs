//! Game-thread scheduler
//!
//! Any thread may post work; only the game thread drains it, once per frame.
//! A drain runs exactly the items present when it started, so work posted by
//! a running task waits for the next frame.

use std::collections::{HashSet, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::thread::{report_violation, GameThread};

/// A task to execute on the game thread
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Default queue depth above which avatar updates are coalesced
pub const DEFAULT_SOFT_CAP: usize = 1024;

/// What a task does, for back-pressure and shutdown decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// Avatar spawn
    Spawn,
    /// Avatar despawn; still runs during the shutdown drain
    Despawn,
    /// Season or clock change
    Environment,
    /// Full-state server update for one entity; may be coalesced
    AvatarUpdate(u64),
    /// Local-authority write of our own avatar; coalesced only with other
    /// local writes
    LocalAvatarUpdate(u64),
    /// Anything else
    General,
}

impl TaskKind {
    /// Older items with the same key may be dropped in favor of this one
    fn coalesce_key(self) -> Option<TaskKind> {
        match self {
            Self::AvatarUpdate(_) | Self::LocalAvatarUpdate(_) => Some(self),
            _ => None,
        }
    }
}

struct QueuedTask {
    kind: TaskKind,
    task: Task,
}

struct QueueState {
    items: VecDeque<QueuedTask>,
    /// Depth at which the next coalescing pass runs
    coalesce_at: usize,
}

/// Counters for diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub queued: usize,
    pub posted: u64,
    pub executed: u64,
    pub coalesced: u64,
    pub discarded: u64,
}

/// FIFO of callables bound to the game thread
pub struct GameThreadScheduler {
    game_thread: GameThread,
    soft_cap: usize,
    state: Mutex<QueueState>,
    shutting_down: AtomicBool,
    posted: AtomicU64,
    executed: AtomicU64,
    coalesced: AtomicU64,
    discarded: AtomicU64,
}

impl GameThreadScheduler {
    pub fn new(game_thread: GameThread, soft_cap: usize) -> Self {
        let soft_cap = soft_cap.max(1);
        Self {
            game_thread,
            soft_cap,
            state: Mutex::new(QueueState {
                items: VecDeque::with_capacity(soft_cap),
                coalesce_at: soft_cap + 1,
            }),
            shutting_down: AtomicBool::new(false),
            posted: AtomicU64::new(0),
            executed: AtomicU64::new(0),
            coalesced: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
        }
    }

    pub fn game_thread(&self) -> GameThread {
        self.game_thread
    }

    /// Queue a task for the next drain
    ///
    /// Safe to call from any thread. After shutdown only despawns are
    /// accepted.
    pub fn post<F>(&self, kind: TaskKind, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.is_shutting_down() && kind != TaskKind::Despawn {
            tracing::trace!("Scheduler shutting down, dropping {:?} task", kind);
            self.discarded.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let mut state = self.state.lock();
        state.items.push_back(QueuedTask {
            kind,
            task: Box::new(task),
        });
        self.posted.fetch_add(1, Ordering::Relaxed);

        if state.items.len() >= state.coalesce_at {
            let removed = coalesce(&mut state.items);
            self.coalesced.fetch_add(removed as u64, Ordering::Relaxed);

            // Lifecycle and environment items are never dropped, so the queue
            // can stay above the cap; back off to keep posting amortized O(1)
            let len = state.items.len();
            state.coalesce_at = if len > self.soft_cap {
                len * 2
            } else {
                self.soft_cap + 1
            };

            if removed > 0 {
                tracing::debug!("Coalesced {} avatar updates ({} queued)", removed, len);
            } else {
                tracing::warn!("Scheduler over soft cap with nothing to coalesce ({} queued)", len);
            }
        }
    }

    /// Run every task queued before this call, in FIFO order
    ///
    /// Game thread only. Returns the number of tasks executed.
    pub fn drain(&self) -> usize {
        if !self.game_thread.is_current() {
            report_violation("GameThreadScheduler::drain");
            return 0;
        }

        let batch = {
            let mut state = self.state.lock();
            state.coalesce_at = self.soft_cap + 1;
            std::mem::take(&mut state.items)
        };

        if batch.is_empty() {
            return 0;
        }

        let shutting_down = self.is_shutting_down();
        let mut count = 0;

        for item in batch {
            if shutting_down && item.kind != TaskKind::Despawn {
                self.discarded.fetch_add(1, Ordering::Relaxed);
                continue;
            }

            let kind = item.kind;
            if panic::catch_unwind(AssertUnwindSafe(item.task)).is_err() {
                tracing::error!("{:?} task panicked", kind);
            }
            count += 1;
        }

        self.executed.fetch_add(count as u64, Ordering::Relaxed);
        count
    }

    /// Stop accepting work; the next drain runs only despawns
    pub fn shutdown(&self) {
        if !self.shutting_down.swap(true, Ordering::AcqRel) {
            tracing::debug!("Scheduler shutting down with {} queued", self.len());
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }

    /// Number of tasks waiting for the next drain
    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            queued: self.len(),
            posted: self.posted.load(Ordering::Relaxed),
            executed: self.executed.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
        }
    }
}

/// Keep only the newest queued update per entity
///
/// Updates carry the full avatar state, so applying only the newest one
/// leaves the mirror exactly as applying all of them in order would.
fn coalesce(items: &mut VecDeque<QueuedTask>) -> usize {
    let before = items.len();
    let mut newest = HashSet::new();

    let mut kept: VecDeque<QueuedTask> = items
        .drain(..)
        .rev()
        .filter(|item| match item.kind.coalesce_key() {
            Some(key) => newest.insert(key),
            None => true,
        })
        .collect();
    kept.make_contiguous().reverse();

    *items = kept;
    before - items.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn recorder() -> (Arc<Mutex<Vec<u32>>>, impl Fn(u32) -> Task) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        let make = move |n: u32| -> Task {
            let sink = sink.clone();
            Box::new(move || sink.lock().push(n))
        };
        (log, make)
    }

    #[test]
    fn test_fifo_drain() {
        let scheduler = GameThreadScheduler::new(GameThread::current(), 16);
        let (log, make) = recorder();

        for n in 0..5 {
            scheduler.post(TaskKind::General, make(n));
        }
        assert_eq!(scheduler.len(), 5);
        assert_eq!(scheduler.drain(), 5);
        assert_eq!(*log.lock(), vec![0, 1, 2, 3, 4]);
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_posted_during_drain_waits() {
        let scheduler = Arc::new(GameThreadScheduler::new(GameThread::current(), 16));
        let (log, make) = recorder();

        let inner = scheduler.clone();
        let later = make(2);
        scheduler.post(TaskKind::General, make(1));
        scheduler.post(TaskKind::General, move || inner.post(TaskKind::General, later));

        assert_eq!(scheduler.drain(), 2);
        assert_eq!(*log.lock(), vec![1]);
        assert_eq!(scheduler.drain(), 1);
        assert_eq!(*log.lock(), vec![1, 2]);
    }

    #[test]
    fn test_coalesce_keeps_newest_per_entity() {
        let scheduler = GameThreadScheduler::new(GameThread::current(), 4);
        let (log, make) = recorder();

        scheduler.post(TaskKind::Spawn, make(0));
        scheduler.post(TaskKind::AvatarUpdate(1), make(11));
        scheduler.post(TaskKind::AvatarUpdate(2), make(21));
        scheduler.post(TaskKind::AvatarUpdate(1), make(12));
        scheduler.post(TaskKind::Environment, make(100));
        scheduler.post(TaskKind::AvatarUpdate(2), make(22));

        scheduler.drain();
        let log = log.lock();
        assert!(log.contains(&0) && log.contains(&100));
        assert!(!log.contains(&11), "older update for entity 1 should be dropped");
        assert!(log.contains(&12) && log.contains(&22));

        let pos = |n| log.iter().position(|&x| x == n).unwrap();
        assert!(pos(0) < pos(12));
        assert!(pos(12) < pos(100));
        assert!(scheduler.stats().coalesced >= 1);
    }

    #[test]
    fn test_lifecycle_never_dropped() {
        let scheduler = GameThreadScheduler::new(GameThread::current(), 2);
        let (log, make) = recorder();

        for n in 0..10 {
            let kind = if n % 2 == 0 { TaskKind::Spawn } else { TaskKind::Despawn };
            scheduler.post(kind, make(n));
        }

        assert_eq!(scheduler.drain(), 10);
        assert_eq!(*log.lock(), (0..10).collect::<Vec<_>>());
        assert_eq!(scheduler.stats().coalesced, 0);
    }

    #[test]
    fn test_local_write_survives_server_updates() {
        let scheduler = GameThreadScheduler::new(GameThread::current(), 2);
        let (log, make) = recorder();

        scheduler.post(TaskKind::LocalAvatarUpdate(7), make(1));
        scheduler.post(TaskKind::AvatarUpdate(7), make(2));
        scheduler.post(TaskKind::AvatarUpdate(7), make(3));

        assert_eq!(scheduler.drain(), 2);
        assert_eq!(*log.lock(), vec![1, 3]);
        assert_eq!(scheduler.stats().coalesced, 1);
    }

    #[test]
    fn test_shutdown_runs_despawns_only() {
        let scheduler = GameThreadScheduler::new(GameThread::current(), 16);
        let (log, make) = recorder();

        scheduler.post(TaskKind::Spawn, make(1));
        scheduler.post(TaskKind::Despawn, make(2));
        scheduler.post(TaskKind::AvatarUpdate(7), make(3));
        scheduler.post(TaskKind::Despawn, make(4));

        scheduler.shutdown();
        scheduler.post(TaskKind::Environment, make(5));

        assert_eq!(scheduler.drain(), 2);
        assert_eq!(*log.lock(), vec![2, 4]);
        assert_eq!(scheduler.stats().discarded, 3);
    }

    #[test]
    fn test_panicking_task_does_not_stop_drain() {
        let scheduler = GameThreadScheduler::new(GameThread::current(), 16);
        let (log, make) = recorder();

        scheduler.post(TaskKind::General, || panic!("boom"));
        scheduler.post(TaskKind::General, make(1));

        assert_eq!(scheduler.drain(), 2);
        assert_eq!(*log.lock(), vec![1]);
    }

    #[test]
    fn test_concurrent_post_fifo_per_producer() {
        const PRODUCERS: u32 = 8;
        const PER_PRODUCER: u32 = 500;

        let scheduler = Arc::new(GameThreadScheduler::new(GameThread::current(), 1 << 16));
        let log = Arc::new(Mutex::new(Vec::new()));

        let handles: Vec<_> = (0..PRODUCERS)
            .map(|producer| {
                let scheduler = scheduler.clone();
                let log = log.clone();
                std::thread::spawn(move || {
                    for seq in 0..PER_PRODUCER {
                        let log = log.clone();
                        scheduler.post(TaskKind::General, move || log.lock().push((producer, seq)));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(scheduler.drain(), (PRODUCERS * PER_PRODUCER) as usize);

        let log = log.lock();
        for producer in 0..PRODUCERS {
            let seqs: Vec<u32> = log
                .iter()
                .filter(|(p, _)| *p == producer)
                .map(|(_, s)| *s)
                .collect();
            assert_eq!(seqs, (0..PER_PRODUCER).collect::<Vec<_>>());
        }
    }
}
