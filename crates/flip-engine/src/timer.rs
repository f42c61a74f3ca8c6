//! Timers
//!
//! Deadline list driven by the host clock. The engine has no thread of
//! its own; `fire_due` runs from the container's `tick`.

use crate::page::PageId;

/// Timer id type
pub type TimerId = u64;

/// What a timer firing means to the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Periodic content refresh for a page
    Refresh(PageId),
}

#[derive(Debug)]
struct Entry {
    id: TimerId,
    due: f64,
    period_ms: Option<u64>,
    kind: TimerKind,
}

/// Host-driven timer set.
#[derive(Debug, Default)]
pub struct Timers {
    entries: Vec<Entry>,
    next_id: TimerId,
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a repeating timer.
    pub fn every(&mut self, now: f64, period_ms: u64, kind: TimerKind) -> TimerId {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push(Entry {
            id,
            due: now + period_ms as f64,
            period_ms: Some(period_ms),
            kind,
        });
        id
    }

    pub fn cancel(&mut self, id: TimerId) {
        self.entries.retain(|e| e.id != id);
    }

    /// Fire every due timer once, rescheduling repeating ones from `now`.
    pub fn fire_due(&mut self, now: f64) -> Vec<TimerKind> {
        let mut fired = Vec::new();
        for entry in &mut self.entries {
            if now >= entry.due {
                fired.push(entry.kind);
                match entry.period_ms {
                    Some(p) => entry.due = now + p as f64,
                    None => entry.due = f64::INFINITY,
                }
            }
        }
        self.entries.retain(|e| e.due.is_finite());
        fired
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeating_fires_and_reschedules() {
        let mut timers = Timers::new();
        timers.every(0.0, 100, TimerKind::Refresh(1));

        assert!(timers.fire_due(50.0).is_empty());
        assert_eq!(timers.fire_due(100.0), vec![TimerKind::Refresh(1)]);
        // rescheduled relative to the firing tick
        assert!(timers.fire_due(150.0).is_empty());
        assert_eq!(timers.fire_due(200.0), vec![TimerKind::Refresh(1)]);
    }

    #[test]
    fn test_cancel() {
        let mut timers = Timers::new();
        let id = timers.every(0.0, 100, TimerKind::Refresh(2));
        timers.cancel(id);
        assert!(timers.fire_due(1000.0).is_empty());
        assert!(timers.is_empty());
    }
}
