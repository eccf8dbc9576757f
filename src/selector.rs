//! Shard selection for `get`.

use rand::Rng;

/// Picks the shard a claim is routed to.
///
/// Selection is a load-spreading heuristic only; any index is correct. Values
/// outside `0..shard_count` are reduced modulo `shard_count` by the pool.
pub trait ShardSelector: Send + Sync {
    /// Returns an index in `0..shard_count`. `shard_count` is never zero.
    fn select(&self, shard_count: usize) -> usize;
}

/// Uniform random selection using the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomSelector;

impl RandomSelector {
    /// Creates a new random selector.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl ShardSelector for RandomSelector {
    #[inline]
    fn select(&self, shard_count: usize) -> usize {
        if shard_count <= 1 {
            return 0;
        }
        rand::rng().random_range(0..shard_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_selector_in_range() {
        let selector = RandomSelector::new();
        for _ in 0..1000 {
            assert!(selector.select(7) < 7);
        }
        assert_eq!(selector.select(1), 0);
    }

    #[test]
    fn test_random_selector_spreads() {
        let selector = RandomSelector::new();
        let mut hits = [0usize; 4];
        for _ in 0..4000 {
            hits[selector.select(4)] += 1;
        }
        assert!(hits.iter().all(|&h| h > 0));
    }
}
