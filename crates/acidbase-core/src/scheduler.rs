//! Deferred colour changes.
//!
//! A scheduled transition is just `(fire_at, ids, color)`. Single entries
//! are never cancelled: when one comes due the beaker applies it to whichever
//! of its ids still exist and ignores the rest. Restoring a snapshot clears
//! the whole queue.

use crate::particle::ParticleId;

/// One pending colour change.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledTransition {
    pub fire_at: u64,
    seq: u64,
    pub ids: Vec<ParticleId>,
    pub color: String,
}

/// Pending transitions ordered by fire time, then by insertion.
#[derive(Debug, Default)]
pub struct TransitionScheduler {
    queue: Vec<ScheduledTransition>,
    next_seq: u64,
}

impl TransitionScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, fire_at: u64, ids: Vec<ParticleId>, color: impl Into<String>) {
        if ids.is_empty() {
            return;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        let index = self
            .queue
            .partition_point(|entry| (entry.fire_at, entry.seq) <= (fire_at, seq));
        self.queue.insert(
            index,
            ScheduledTransition {
                fire_at,
                seq,
                ids,
                color: color.into(),
            },
        );
    }

    /// Remove and return every entry due at `now`, oldest first.
    pub fn drain_due(&mut self, now: u64) -> Vec<ScheduledTransition> {
        let due = self.queue.partition_point(|entry| entry.fire_at <= now);
        self.queue.drain(..due).collect()
    }

    /// Drop every pending entry.
    pub fn clear(&mut self) {
        self.queue.clear();
    }

    pub fn next_fire_at(&self) -> Option<u64> {
        self.queue.first().map(|entry| entry.fire_at)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[u64]) -> Vec<ParticleId> {
        raw.iter().copied().map(ParticleId).collect()
    }

    #[test]
    fn test_drain_returns_due_in_order() {
        let mut s = TransitionScheduler::new();
        s.schedule(300, ids(&[3]), "#333");
        s.schedule(100, ids(&[1]), "#111");
        s.schedule(100, ids(&[2]), "#222");
        assert_eq!(s.next_fire_at(), Some(100));

        let due = s.drain_due(150);
        assert_eq!(due.len(), 2);
        assert_eq!(due[0].color, "#111");
        assert_eq!(due[1].color, "#222");
        assert_eq!(s.len(), 1);

        assert!(s.drain_due(299).is_empty());
        assert_eq!(s.drain_due(300).len(), 1);
        assert!(s.is_empty());
    }

    #[test]
    fn test_clear_drops_pending() {
        let mut s = TransitionScheduler::new();
        s.schedule(10, ids(&[1, 2]), "#111");
        s.clear();
        assert!(s.drain_due(u64::MAX).is_empty());
        assert_eq!(s.next_fire_at(), None);
    }

    #[test]
    fn test_empty_id_sets_are_not_queued() {
        let mut s = TransitionScheduler::new();
        s.schedule(0, Vec::new(), "#000");
        assert!(s.is_empty());
    }
}
