//! Cooperative cancellation for block computation.
//!
//! The generator polls its checker once per row, so a cancelled block stops
//! after at most one more row of work.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub trait CancellationChecker: Clone {
    fn is_cancelled(&self) -> bool;
}

/// For callers that always run blocks to completion.
#[derive(Clone, Copy, Debug, Default)]
pub struct NeverCancel;

impl CancellationChecker for NeverCancel {
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Reads a flag shared with whoever schedules the block.
#[derive(Clone, Debug)]
pub struct AtomicBoolChecker {
    flag: Arc<AtomicBool>,
}

impl AtomicBoolChecker {
    pub fn new(flag: Arc<AtomicBool>) -> Self {
        Self { flag }
    }
}

impl CancellationChecker for AtomicBoolChecker {
    fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Owner side of a cancellation flag; hand out checkers to worker threads.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn checker(&self) -> AtomicBoolChecker {
        AtomicBoolChecker::new(Arc::clone(&self.flag))
    }
}
