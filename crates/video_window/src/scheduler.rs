//! Periodic update scheduling
//!
//! Consumers register an [`UpdateId`] with a period and a priority. The
//! application loop asks [`Scheduler::due`] which updates to run on each
//! tick; ids come back ordered by ascending priority value.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Identity of one periodic update registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UpdateId(u64);

impl UpdateId {
    /// Allocate a fresh id
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    priority: i32,
    period: Duration,
    next_due: Instant,
}

/// Periodic update registry
#[derive(Debug, Default)]
pub struct Scheduler {
    entries: HashMap<UpdateId, Entry>,
}

impl Scheduler {
    /// Empty scheduler
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `id` every `period`, ordered by `priority` within a tick
    ///
    /// Re-enabling an id replaces its priority and period and makes it due
    /// immediately.
    pub fn enable_periodic_update(&mut self, id: UpdateId, priority: i32, period: Duration) {
        self.enable_at(id, priority, period, Instant::now());
    }

    fn enable_at(&mut self, id: UpdateId, priority: i32, period: Duration, now: Instant) {
        log::debug!("Periodic update {:?}: every {:?} at priority {}", id, period, priority);
        self.entries.insert(id, Entry { priority, period, next_due: now });
    }

    /// Stop running `id`
    pub fn disable_periodic_update(&mut self, id: UpdateId) {
        if self.entries.remove(&id).is_some() {
            log::debug!("Periodic update {:?} disabled", id);
        }
    }

    /// Whether `id` is registered
    pub fn is_enabled(&self, id: UpdateId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Period of `id`, if registered
    pub fn period(&self, id: UpdateId) -> Option<Duration> {
        self.entries.get(&id).map(|entry| entry.period)
    }

    /// Updates due at `now`, by ascending priority; each is rescheduled
    ///
    /// An update that fell more than a period behind resumes from `now`
    /// instead of running repeatedly to catch up.
    pub fn due(&mut self, now: Instant) -> Vec<UpdateId> {
        let mut due: Vec<(i32, UpdateId)> = Vec::new();
        for (id, entry) in &mut self.entries {
            if entry.next_due > now {
                continue;
            }
            due.push((entry.priority, *id));
            entry.next_due += entry.period;
            if entry.next_due <= now {
                entry.next_due = now + entry.period;
            }
        }
        due.sort();
        due.into_iter().map(|(_, id)| id).collect()
    }

    /// Earliest pending deadline
    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries.values().map(|entry| entry.next_due).min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_due_orders_by_priority() {
        let mut scheduler = Scheduler::new();
        let now = Instant::now();
        let late = UpdateId::next();
        let early = UpdateId::next();
        scheduler.enable_at(late, 10, Duration::from_millis(10), now);
        scheduler.enable_at(early, -5, Duration::from_millis(10), now);

        assert_eq!(scheduler.due(now), vec![early, late]);
        assert!(scheduler.due(now).is_empty());
        assert_eq!(scheduler.due(now + Duration::from_millis(10)), vec![early, late]);
    }

    #[test]
    fn test_periods_are_independent() {
        let mut scheduler = Scheduler::new();
        let now = Instant::now();
        let fast = UpdateId::next();
        let slow = UpdateId::next();
        scheduler.enable_at(fast, 0, Duration::from_millis(10), now);
        scheduler.enable_at(slow, 0, Duration::from_millis(40), now);
        scheduler.due(now);

        assert_eq!(scheduler.due(now + Duration::from_millis(20)), vec![fast]);
        assert_eq!(scheduler.next_deadline(), Some(now + Duration::from_millis(30)));
    }

    #[test]
    fn test_disable_removes() {
        let mut scheduler = Scheduler::new();
        let id = UpdateId::next();
        scheduler.enable_periodic_update(id, 0, Duration::from_millis(16));
        assert!(scheduler.is_enabled(id));
        assert_eq!(scheduler.period(id), Some(Duration::from_millis(16)));

        scheduler.disable_periodic_update(id);
        assert!(!scheduler.is_enabled(id));
        assert!(scheduler.due(Instant::now() + Duration::from_secs(1)).is_empty());
    }

    #[test]
    fn test_falling_behind_does_not_burst() {
        let mut scheduler = Scheduler::new();
        let now = Instant::now();
        let id = UpdateId::next();
        scheduler.enable_at(id, 0, Duration::from_millis(10), now);

        let later = now + Duration::from_millis(100);
        assert_eq!(scheduler.due(later), vec![id]);
        assert!(scheduler.due(later).is_empty());
    }
}
