//! Generation tokens: the viewer's only cancellation mechanism.
//!
//! Every restart of a load or render pass calls [`GenerationCounter::begin`],
//! which invalidates all tokens handed out before it. A suspended task holds
//! the [`Generation`] it was started with and re-checks it after each await;
//! once it is stale the task returns without touching shared state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Monotonic counter shared between a controller and its tasks.
#[derive(Debug, Clone, Default)]
pub struct GenerationCounter {
    current: Arc<AtomicU64>,
}

impl GenerationCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invalidate all outstanding tokens and return a fresh one.
    pub fn begin(&self) -> Generation {
        let id = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        Generation {
            id,
            current: Arc::clone(&self.current),
        }
    }

    /// Invalidate all outstanding tokens without starting new work.
    pub fn invalidate(&self) {
        self.current.fetch_add(1, Ordering::SeqCst);
    }

    pub fn current_id(&self) -> u64 {
        self.current.load(Ordering::SeqCst)
    }
}

/// A token tied to one generation of a [`GenerationCounter`].
#[derive(Debug, Clone)]
pub struct Generation {
    id: u64,
    current: Arc<AtomicU64>,
}

impl Generation {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// True while no newer generation has begun.
    pub fn is_current(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.id
    }

    pub fn is_stale(&self) -> bool {
        !self.is_current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_supersedes_previous_tokens() {
        let counter = GenerationCounter::new();
        let first = counter.begin();
        assert!(first.is_current());

        let second = counter.begin();
        assert!(first.is_stale());
        assert!(second.is_current());
        assert!(second.id() > first.id());
    }

    #[test]
    fn invalidate_leaves_no_current_token() {
        let counter = GenerationCounter::new();
        let token = counter.begin();
        counter.invalidate();
        assert!(token.is_stale());
        assert_eq!(counter.current_id(), token.id() + 1);
    }

    #[test]
    fn clones_share_the_counter() {
        let counter = GenerationCounter::new();
        let token = counter.begin();
        let other_handle = counter.clone();
        other_handle.begin();
        assert!(token.is_stale());
    }
}
