//! Per-scope sequence tickets for poll results.
//!
//! A poller takes a ticket before it sends its request. A slow response
//! therefore carries an older ticket than a faster, later one, and the
//! reconciler discards it as stale.

use courier_core::PollScope;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Issues monotonically increasing tickets per scope. Shareable across tasks.
#[derive(Debug, Default)]
pub struct ScopeSequencer {
    last: Mutex<HashMap<PollScope, u64>>,
}

impl ScopeSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the next ticket for `scope`. The first ticket is 1.
    pub fn next(&self, scope: &PollScope) -> u64 {
        let mut last = self.last.lock();
        let seq = last.entry(scope.clone()).or_insert(0);
        *seq += 1;
        *seq
    }

    /// Last ticket issued for `scope`, if any.
    pub fn last(&self, scope: &PollScope) -> Option<u64> {
        self.last.lock().get(scope).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::sync::Arc;

    #[test]
    fn test_tickets_are_monotonic_per_scope() {
        let seq = ScopeSequencer::new();
        let date = PollScope::Date(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());

        assert_eq!(seq.last(&date), None);
        assert_eq!(seq.next(&date), 1);
        assert_eq!(seq.next(&date), 2);
        assert_eq!(seq.next(&PollScope::Nearby), 1);
        assert_eq!(seq.last(&date), Some(2));
    }

    #[test]
    fn test_tickets_unique_across_threads() {
        let seq = Arc::new(ScopeSequencer::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let seq = seq.clone();
                std::thread::spawn(move || {
                    (0..100)
                        .map(|_| seq.next(&PollScope::Nearby))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut all: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 400);
        assert_eq!(seq.last(&PollScope::Nearby), Some(400));
    }
}
