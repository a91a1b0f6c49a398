use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use tokio::time::Instant;

/// Pending node ids grouped by file
pub type PendingBatch = BTreeMap<String, BTreeSet<String>>;

/// Collects pending node ids into one classifier request per window.
///
/// The first enqueue opens the window; later enqueues join the open batch
/// without moving its deadline.
#[derive(Debug, Clone)]
pub struct ClassificationBatcher {
    window: Duration,
    deadline: Option<Instant>,
    pending: PendingBatch,
}

impl ClassificationBatcher {
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
            pending: BTreeMap::new(),
        }
    }

    pub fn enqueue<I>(&mut self, relative_path: &str, ids: I, now: Instant)
    where
        I: IntoIterator<Item = String>,
    {
        let mut ids = ids.into_iter().peekable();
        if ids.peek().is_none() {
            return;
        }
        self.pending
            .entry(relative_path.to_string())
            .or_default()
            .extend(ids);
        self.deadline.get_or_insert(now + self.window);
    }

    /// Drop queued ids of a file that went away
    pub fn forget_file(&mut self, relative_path: &str) {
        self.pending.remove(relative_path);
        if self.pending.is_empty() {
            self.deadline = None;
        }
    }

    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.values().map(BTreeSet::len).sum()
    }

    /// Close the window and hand out the batch when its deadline has passed
    pub fn take_due(&mut self, now: Instant) -> Option<PendingBatch> {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                Some(std::mem::take(&mut self.pending))
            }
            _ => None,
        }
    }
}
