// src/engine/pool.rs
//
// Worker pool construction.
//
// Each engine owns one rayon pool. Commands are spawned onto it, and the row-parallel
// raster loops inside a command run on the same threads, so an engine never uses more
// than `worker_threads` cores.

use crate::engine::common::panic_message;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::any::Any;
use tracing::warn;

/// Minimum number of worker threads
const MIN_WORKER_THREADS: usize = 1;

pub fn build_pool(threads: usize) -> ThreadPool {
    let threads = threads.max(MIN_WORKER_THREADS);
    ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("pixelsmith-worker-{i}"))
        .panic_handler(log_worker_panic)
        .build()
        .unwrap_or_else(|e| {
            warn!(threads, error = %e, "worker pool creation failed; retrying with one thread");
            fallback_pool()
        })
}

/// Spawned jobs that escape every guard end up here instead of aborting the process.
fn log_worker_panic(payload: Box<dyn Any + Send>) {
    let message = panic_message(payload.as_ref());
    warn!(%message, "worker job panicked");
}

fn fallback_pool() -> ThreadPool {
    match ThreadPoolBuilder::new()
        .num_threads(MIN_WORKER_THREADS)
        .panic_handler(log_worker_panic)
        .build()
    {
        Ok(pool) => pool,
        // Nothing can run without a thread; this is unrecoverable.
        Err(e) => panic!("failed to create fallback worker pool: {e}"),
    }
}
