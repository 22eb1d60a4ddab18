use std::collections::VecDeque;

use crate::location::LocationFix;

/// Fixed-capacity FIFO of the most recent fixes. Pushing onto a full buffer
/// evicts the oldest entry.
#[derive(Debug, Clone)]
pub struct LocationHistory {
    buf: VecDeque<LocationFix>,
    capacity: usize,
}

impl LocationHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, fix: LocationFix) {
        if self.capacity == 0 {
            return;
        }

        if self.buf.len() >= self.capacity {
            self.buf.pop_front();
        }

        self.buf.push_back(fix);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LocationFix> {
        self.buf.iter()
    }

    /// Owned copy in arrival order, oldest first
    pub fn to_vec(&self) -> Vec<LocationFix> {
        self.buf.iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{location::Provider, tests::mk_fix};

    #[test]
    fn test_fifo_eviction() {
        let mut history = LocationHistory::new(3);

        for lat in 0..5 {
            history.push(mk_fix(Provider::Gps, 5.0, lat as f64));
        }

        assert_eq!(history.len(), 3);
        let lats = history
            .iter()
            .map(|f| f.location.lat)
            .collect::<Vec<_>>();
        assert_eq!(lats, vec![2.0, 3.0, 4.0], "Oldest entries were not evicted first");
    }

    #[test]
    fn test_under_capacity_keeps_everything() {
        let mut history = LocationHistory::new(10);

        history.push(mk_fix(Provider::Network, 12.0, 1.0));
        history.push(mk_fix(Provider::Gps, 4.0, 2.0));

        assert_eq!(history.len(), 2);
        assert_eq!(history.to_vec()[0].location.lat, 1.0);
    }

    #[test]
    fn test_zero_capacity_never_stores() {
        let mut history = LocationHistory::new(0);
        history.push(mk_fix(Provider::Gps, 1.0, 0.0));
        assert!(history.is_empty());
    }
}
