//! Player identity allocation.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Opaque player identifier, assigned once per accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PlayerId(u64);

impl PlayerId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hands out strictly increasing ids starting at 0.
///
/// Shared by every connection handler behind an `Arc`; `next_id` is a single
/// atomic increment and never blocks. A 64-bit counter is never exhausted in
/// practice, so ids are not reused while the server runs.
#[derive(Debug, Default)]
pub struct IdAllocator {
    next: AtomicU64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> PlayerId {
        PlayerId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}
