//! Game frame hook
//!
//! Called once per frame on the game thread by the plugin's frame export.
//! This is the only point where queued work reaches the state mirror and
//! the host.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::runtime;

/// Frames seen since load
static FRAME_COUNT: AtomicU64 = AtomicU64::new(0);

/// Last frame's processing time (nanoseconds)
static LAST_FRAME_TIME_NS: AtomicU64 = AtomicU64::new(0);

/// Frame budget above which a warning is logged
const SLOW_FRAME_NS: u64 = 1_000_000;

pub fn frame_count() -> u64 {
    FRAME_COUNT.load(Ordering::Relaxed)
}

pub fn last_frame_time_ns() -> u64 {
    LAST_FRAME_TIME_NS.load(Ordering::Relaxed)
}

/// Run one frame of the installed runtime
///
/// Tears the runtime down afterwards if a fatal condition requested it.
/// Returns the number of scheduler tasks executed.
pub fn on_game_frame() -> usize {
    let start = Instant::now();
    let frame = FRAME_COUNT.fetch_add(1, Ordering::Relaxed) + 1;

    let Some(runtime) = runtime::current() else {
        return 0;
    };

    let executed = runtime.run_frame(frame);
    if executed > 0 {
        tracing::trace!("Ran {} queued tasks", executed);
    }
    drop(runtime);

    if runtime::shutdown_requested() {
        tracing::warn!("Shutdown requested, tearing down bridge runtime");
        runtime::shutdown();
    }

    let elapsed = start.elapsed().as_nanos() as u64;
    LAST_FRAME_TIME_NS.store(elapsed, Ordering::Relaxed);

    if elapsed > SLOW_FRAME_NS {
        tracing::warn!(
            "Frame {} took {}ms ({} tasks)",
            frame,
            elapsed / 1_000_000,
            executed
        );
    }

    executed
}
