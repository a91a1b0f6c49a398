use std::collections::HashMap;
use std::hash::Hash;
use tokio::time::Instant;

/// One cancellable deadline per key; scheduling a key again replaces its
/// previous deadline
#[derive(Debug, Clone)]
pub struct DeadlineMap<K> {
    deadlines: HashMap<K, Instant>,
}

impl<K> Default for DeadlineMap<K> {
    fn default() -> Self {
        Self {
            deadlines: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Clone + Ord> DeadlineMap<K> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the deadline that was replaced, if any
    pub fn schedule(&mut self, key: K, deadline: Instant) -> Option<Instant> {
        self.deadlines.insert(key, deadline)
    }

    pub fn cancel(&mut self, key: &K) -> Option<Instant> {
        self.deadlines.remove(key)
    }

    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.deadlines.contains_key(key)
    }

    #[must_use]
    pub fn get(&self, key: &K) -> Option<Instant> {
        self.deadlines.get(key).copied()
    }

    /// Earliest pending deadline
    #[must_use]
    pub fn next(&self) -> Option<Instant> {
        self.deadlines.values().min().copied()
    }

    /// Remove and return every key due at `now`, earliest first
    pub fn pop_expired(&mut self, now: Instant) -> Vec<K> {
        let mut due: Vec<(Instant, K)> = self
            .deadlines
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(key, deadline)| (*deadline, key.clone()))
            .collect();
        due.sort();
        for (_, key) in &due {
            self.deadlines.remove(key);
        }
        due.into_iter().map(|(_, key)| key).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.deadlines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn rescheduling_replaces_deadline() {
        let now = Instant::now();
        let mut timers = DeadlineMap::new();

        timers.schedule("a.py".to_string(), now + Duration::from_millis(100));
        let replaced = timers.schedule("a.py".to_string(), now + Duration::from_millis(500));

        assert_eq!(replaced, Some(now + Duration::from_millis(100)));
        assert_eq!(timers.len(), 1);
        assert!(timers.pop_expired(now + Duration::from_millis(200)).is_empty());
        assert_eq!(
            timers.pop_expired(now + Duration::from_millis(500)),
            vec!["a.py".to_string()]
        );
        assert!(timers.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn expired_keys_come_out_in_deadline_order() {
        let now = Instant::now();
        let mut timers = DeadlineMap::new();
        timers.schedule("late", now + Duration::from_millis(30));
        timers.schedule("early", now + Duration::from_millis(10));
        timers.schedule("future", now + Duration::from_secs(5));

        assert_eq!(timers.next(), Some(now + Duration::from_millis(10)));
        assert_eq!(
            timers.pop_expired(now + Duration::from_millis(50)),
            vec!["early", "late"]
        );
        assert!(timers.contains(&"future"));
        assert!(timers.cancel(&"future").is_some());
        assert_eq!(timers.next(), None);
    }
}
