//! Credential pools for the upstream services.
//!
//! The question-answering pool keeps one process-wide cursor that only moves
//! forward: once a credential reports quota exhaustion the whole process moves
//! past it, so a known-bad key is never probed again until restart. The
//! image-generation pool has no cursor at all; every request draws a
//! credential at random and a failure simply yields no image.

use std::sync::atomic::{AtomicUsize, Ordering};

use rand::Rng;

/// Ordered credential list with a sticky, forward-only cursor.
#[derive(Debug)]
pub struct KeyPool {
    keys: Vec<String>,
    cursor: AtomicUsize,
}

impl KeyPool {
    pub fn new(keys: Vec<String>) -> Self {
        Self {
            keys,
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// The active credential and its index, or `None` once exhausted.
    pub fn current(&self) -> Option<(usize, &str)> {
        let idx = self.cursor.load(Ordering::Acquire);
        self.keys.get(idx).map(|k| (idx, k.as_str()))
    }

    /// Advance past the credential at `from`. Compare-and-swap, so two
    /// concurrent failures on the same key move the cursor once; a stale
    /// `from` (someone already advanced) is a no-op.
    pub fn advance(&self, from: usize) {
        let _ = self.cursor.compare_exchange(
            from,
            from + 1,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    /// Terminal for the process lifetime; recovery needs a restart or an
    /// out-of-band credential refresh.
    pub fn is_exhausted(&self) -> bool {
        self.cursor.load(Ordering::Acquire) >= self.keys.len()
    }
}

/// Stateless pool: one uniformly random credential per request, no failover.
#[derive(Debug)]
pub struct ImageKeyPool {
    keys: Vec<String>,
}

impl ImageKeyPool {
    pub fn new(keys: Vec<String>) -> Self {
        Self { keys }
    }

    pub fn pick(&self) -> Option<&str> {
        if self.keys.is_empty() {
            return None;
        }
        let idx = rand::thread_rng().gen_range(0..self.keys.len());
        Some(self.keys[idx].as_str())
    }
}
