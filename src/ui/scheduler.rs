use crate::state::SegmentHandle;
use std::time::Duration;
use tokio::time::Instant;

pub const DEFAULT_RENDER_DEBOUNCE: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingRender {
    target: SegmentHandle,
    deadline: Instant,
}

/// Rate limit for re-rendering the growing text segment.
///
/// The first delta after a render arms a deadline one window out; later
/// deltas ride along without moving it, so a steady stream of deltas still
/// renders at least once per window.
#[derive(Debug, Clone)]
pub struct RenderScheduler {
    window: Duration,
    pending: Option<PendingRender>,
}

impl Default for RenderScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_RENDER_DEBOUNCE)
    }
}

impl RenderScheduler {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
        }
    }

    /// Record a delta for `target` observed at `now`.
    pub fn note_delta(&mut self, target: SegmentHandle, now: Instant) {
        match self.pending {
            Some(pending) if pending.target == target => {}
            _ => {
                self.pending = Some(PendingRender {
                    target,
                    deadline: now + self.window,
                })
            }
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.map(|pending| pending.deadline)
    }

    pub fn pending_target(&self) -> Option<SegmentHandle> {
        self.pending.map(|pending| pending.target)
    }

    /// Take the pending render if its deadline has passed.
    pub fn take_due(&mut self, now: Instant) -> Option<SegmentHandle> {
        let pending = self.pending?;
        if pending.deadline > now {
            return None;
        }
        self.pending = None;
        Some(pending.target)
    }

    /// Drop any pending render for `target`; returns whether one was queued.
    /// Callers sealing `target` render it synchronously afterwards.
    pub fn cancel(&mut self, target: SegmentHandle) -> bool {
        if self.pending_target() == Some(target) {
            self.pending = None;
            true
        } else {
            false
        }
    }

    pub fn clear(&mut self) {
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::SegmentStore;

    fn handles() -> (SegmentHandle, SegmentHandle) {
        let mut store = SegmentStore::new();
        (store.open_text(), store.open_text())
    }

    #[test]
    fn test_deltas_within_window_coalesce_into_one_render() {
        let (first, _) = handles();
        let start = Instant::now();
        let mut scheduler = RenderScheduler::default();

        for step in 0..10 {
            scheduler.note_delta(first, start + Duration::from_millis(step * 3));
        }

        assert_eq!(scheduler.take_due(start + Duration::from_millis(49)), None);
        assert_eq!(scheduler.take_due(start + Duration::from_millis(50)), Some(first));
        assert_eq!(scheduler.take_due(start + Duration::from_millis(500)), None);
    }

    #[test]
    fn test_continuous_deltas_do_not_push_deadline_out() {
        let (first, _) = handles();
        let start = Instant::now();
        let mut scheduler = RenderScheduler::new(Duration::from_millis(20));

        scheduler.note_delta(first, start);
        scheduler.note_delta(first, start + Duration::from_millis(19));
        assert_eq!(scheduler.deadline(), Some(start + Duration::from_millis(20)));
    }

    #[test]
    fn test_cancel_only_drops_matching_target() {
        let (first, second) = handles();
        let now = Instant::now();
        let mut scheduler = RenderScheduler::default();
        scheduler.note_delta(first, now);

        assert!(!scheduler.cancel(second));
        assert!(scheduler.cancel(first));
        assert!(!scheduler.cancel(first));
        assert_eq!(scheduler.deadline(), None);
    }

    #[test]
    fn test_new_target_replaces_pending_render() {
        let (first, second) = handles();
        let now = Instant::now();
        let mut scheduler = RenderScheduler::default();
        scheduler.note_delta(first, now);
        scheduler.note_delta(second, now + Duration::from_millis(10));

        assert_eq!(scheduler.pending_target(), Some(second));
        assert_eq!(scheduler.deadline(), Some(now + Duration::from_millis(60)));
    }

    #[test]
    fn test_take_due_with_nothing_pending_is_a_no_op() {
        let mut scheduler = RenderScheduler::default();
        assert_eq!(scheduler.take_due(Instant::now()), None);
        scheduler.clear();
        assert_eq!(scheduler.take_due(Instant::now()), None);
    }
}
