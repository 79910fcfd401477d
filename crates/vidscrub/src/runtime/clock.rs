use std::time::Duration;

/// What a scheduled timer is for. The page dispatches on this when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Forces overlay dismissal if readiness never completes.
    FailSafe,
    /// Starts the resource swap fetch.
    SwapDeferral,
    /// Ends the overlay fade and removes it.
    OverlayFade,
}

/// Handle returned by [`Scheduler::schedule`], used to cancel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

#[derive(Debug, Clone)]
struct Timer {
    id: TimerId,
    due: Duration,
    kind: TimerKind,
}

/// Deadline queue on the page-relative clock (time since page load).
///
/// Timers are drained one at a time with [`Scheduler::pop_due`] so a handler
/// that cancels another timer due at the same instant is honoured.
#[derive(Debug, Default)]
pub struct Scheduler {
    next_id: u64,
    pending: Vec<Timer>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, due: Duration, kind: TimerKind) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.pending.push(Timer { id, due, kind });
        log::debug!("Scheduled {kind:?} at {}ms", due.as_millis());
        id
    }

    /// Cancel a pending timer. Returns false if it already fired or was cancelled.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.pending.len();
        self.pending.retain(|t| t.id != id);
        before != self.pending.len()
    }

    /// Earliest pending deadline.
    pub fn next_due(&self) -> Option<Duration> {
        self.pending.iter().map(|t| t.due).min()
    }

    /// Remove and return the earliest timer due at or before `now`.
    /// Ties resolve in scheduling order.
    pub fn pop_due(&mut self, now: Duration) -> Option<(TimerId, TimerKind)> {
        let idx = self
            .pending
            .iter()
            .enumerate()
            .filter(|(_, t)| t.due <= now)
            .min_by_key(|(_, t)| (t.due, t.id))
            .map(|(i, _)| i)?;
        let timer = self.pending.swap_remove(idx);
        Some((timer.id, timer.kind))
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn nothing_due_before_deadline() {
        let mut s = Scheduler::new();
        s.schedule(ms(1000), TimerKind::SwapDeferral);
        assert!(s.pop_due(ms(999)).is_none());
        assert!(matches!(
            s.pop_due(ms(1000)),
            Some((_, TimerKind::SwapDeferral))
        ));
        assert!(s.is_empty());
    }

    #[test]
    fn pops_in_deadline_order() {
        let mut s = Scheduler::new();
        s.schedule(ms(10_000), TimerKind::FailSafe);
        s.schedule(ms(1000), TimerKind::SwapDeferral);
        assert_eq!(s.next_due(), Some(ms(1000)));
        assert!(matches!(s.pop_due(ms(20_000)), Some((_, TimerKind::SwapDeferral))));
        assert!(matches!(s.pop_due(ms(20_000)), Some((_, TimerKind::FailSafe))));
        assert!(s.pop_due(ms(20_000)).is_none());
    }

    #[test]
    fn ties_resolve_in_schedule_order() {
        let mut s = Scheduler::new();
        let first = s.schedule(ms(500), TimerKind::OverlayFade);
        let second = s.schedule(ms(500), TimerKind::FailSafe);
        assert_eq!(s.pop_due(ms(500)).map(|(id, _)| id), Some(first));
        assert_eq!(s.pop_due(ms(500)).map(|(id, _)| id), Some(second));
    }

    #[test]
    fn cancelled_timer_never_fires() {
        let mut s = Scheduler::new();
        let id = s.schedule(ms(10_000), TimerKind::FailSafe);
        assert_eq!(s.len(), 1);
        assert!(s.cancel(id));
        assert!(!s.cancel(id));
        assert!(s.pop_due(ms(60_000)).is_none());
    }
}
