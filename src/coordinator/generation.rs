//! Per-key write generations.
//!
//! A refresh bumps its key's generation after persisting and before writing
//! the cache. A plain read notes the generation before it touches
//! persistence and only writes the cache while the generation is unchanged,
//! so a slow read can never put an older record over a refreshed one.

use dashmap::DashMap;

/// Keys are cache keys. Only refreshed keys get an entry.
pub(crate) struct Generations {
    seen: DashMap<String, u64>,
}

impl Generations {
    pub(crate) fn new() -> Self {
        Self { seen: DashMap::new() }
    }

    pub(crate) fn current(&self, key: &str) -> u64 {
        self.seen.get(key).map(|g| *g).unwrap_or(0)
    }

    pub(crate) fn bump(&self, key: &str) -> u64 {
        let mut generation = self.seen.entry(key.to_string()).or_insert(0);
        *generation += 1;
        *generation
    }

    pub(crate) fn is_current(&self, key: &str, seen: u64) -> bool {
        self.current(key) == seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_key_is_generation_zero() {
        let generations = Generations::new();
        assert_eq!(generations.current("f1dash:session:2023:monza:R"), 0);
        assert!(generations.is_current("f1dash:session:2023:monza:R", 0));
    }

    #[test]
    fn test_bump_invalidates_earlier_snapshot() {
        let generations = Generations::new();
        let key = "f1dash:session:2023:monza:R";

        let before = generations.current(key);
        assert_eq!(generations.bump(key), 1);
        assert!(!generations.is_current(key, before));
        assert!(generations.is_current(key, 1));

        // Other keys are unaffected
        assert!(generations.is_current("f1dash:session:2023:spa:R", 0));
    }
}
