//! In-memory document number sequences.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use stockledger_documents::SequenceGenerator;

/// One atomic counter per bucket.
///
/// Counters are never removed, so a poisoned map is still consistent and is
/// used as-is.
#[derive(Debug, Default)]
pub struct InMemorySequence {
    counters: RwLock<HashMap<String, Arc<AtomicU64>>>,
}

impl InMemorySequence {
    pub fn new() -> Self {
        Self::default()
    }

    fn counter(&self, bucket: &str) -> Arc<AtomicU64> {
        if let Some(counter) = self
            .counters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(bucket)
        {
            return Arc::clone(counter);
        }

        let mut counters = self.counters.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(counters.entry(bucket.to_string()).or_default())
    }
}

impl SequenceGenerator for InMemorySequence {
    fn next(&self, bucket: &str) -> u64 {
        self.counter(bucket).fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn buckets_count_independently() {
        let seq = InMemorySequence::new();
        assert_eq!(seq.next("SALE-20250101"), 1);
        assert_eq!(seq.next("SALE-20250101"), 2);
        assert_eq!(seq.next("SALE-20250102"), 1);
        assert_eq!(seq.next("SALE-20250101"), 3);
    }

    #[test]
    fn concurrent_draws_never_collide() {
        let seq = Arc::new(InMemorySequence::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let seq = Arc::clone(&seq);
                thread::spawn(move || (0..100).map(|_| seq.next("b")).collect::<Vec<_>>())
            })
            .collect();

        let mut all: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort_unstable();
        all.dedup();

        assert_eq!(all.len(), 800);
        assert_eq!(all.last(), Some(&800));
    }
}
