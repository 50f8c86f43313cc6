//! Auto-advance watchers.
//!
//! Each watcher fires at most once per visit to a step. Latches are keyed
//! by [`StepEntry::serial`], so leaving a step and coming back re-arms them.
//! The equilibrium watcher is edge-triggered: it only fires after the flag
//! has been seen false during the visit.

use std::collections::HashSet;

use acidbase_logic::lesson::{AutoAdvance, GuideStep};

use crate::guide::sequencer::StepEntry;
use crate::simulation::Simulation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchKind {
    Equilibrium,
    Exhaustion,
    Midpoint,
    TitrantExhausted,
    IndicatorFilled,
    SubstanceExhausted,
    Timer,
}

impl WatchKind {
    fn of(auto: &AutoAdvance) -> Self {
        match auto {
            AutoAdvance::Equilibrium => WatchKind::Equilibrium,
            AutoAdvance::Exhaustion { .. } => WatchKind::Exhaustion,
            AutoAdvance::Midpoint { .. } => WatchKind::Midpoint,
            AutoAdvance::TitrantExhausted => WatchKind::TitrantExhausted,
            AutoAdvance::IndicatorFilled => WatchKind::IndicatorFilled,
            AutoAdvance::SubstanceExhausted => WatchKind::SubstanceExhausted,
        }
    }
}

/// A watcher decided the current step should advance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchFire {
    pub step_id: String,
    pub kind: WatchKind,
}

#[derive(Debug, Default)]
pub struct AutoAdvanceWatchers {
    serial: u64,
    fired: HashSet<WatchKind>,
    equilibrium_armed: bool,
}

impl AutoAdvanceWatchers {
    pub fn new() -> Self {
        Self::default()
    }

    fn sync(&mut self, entry: &StepEntry) {
        if entry.serial != self.serial {
            self.serial = entry.serial;
            self.fired.clear();
            self.equilibrium_armed = !entry.equilibrium_at_entry;
        }
    }

    /// Check the step's simulation condition.
    ///
    /// Equilibrium fires on the flag turning true during the visit. Add-style
    /// conditions on titrant, indicator and substance also need the user to
    /// have interacted with the step first.
    pub fn evaluate(&mut self, step: &GuideStep, entry: &StepEntry, sim: &Simulation) -> Option<WatchFire> {
        self.sync(entry);
        let auto = step.auto_advance?;
        let kind = WatchKind::of(&auto);
        if self.fired.contains(&kind) {
            return None;
        }

        let p = sim.params();
        if !p.equilibrium_reached {
            self.equilibrium_armed = true;
        }
        let ready = match auto {
            AutoAdvance::Equilibrium => self.equilibrium_armed && p.equilibrium_reached,
            AutoAdvance::Exhaustion { .. } => p.strong_max > 0 && p.strong_added >= p.strong_max,
            AutoAdvance::Midpoint { fraction, .. } => {
                p.strong_max > 0
                    && p.strong_added > entry.strong_added
                    && p.strong_added as f64 >= fraction * p.strong_max as f64
            }
            AutoAdvance::TitrantExhausted => entry.interacted && sim.has_added_enough_titrant(),
            AutoAdvance::IndicatorFilled => entry.interacted && !sim.can_add_indicator(),
            AutoAdvance::SubstanceExhausted => entry.interacted && !sim.can_add_substance(),
        };
        self.fire_if(ready, kind, step)
    }

    /// Check the step's timer against `now_ms`.
    pub fn evaluate_timer(&mut self, step: &GuideStep, entry: &StepEntry, now_ms: u64) -> Option<WatchFire> {
        self.sync(entry);
        let seconds = step.auto_advance_after_seconds?;
        if self.fired.contains(&WatchKind::Timer) {
            return None;
        }
        let due = entry.entered_at_ms + (seconds * 1000.0).round() as u64;
        self.fire_if(now_ms >= due, WatchKind::Timer, step)
    }

    fn fire_if(&mut self, ready: bool, kind: WatchKind, step: &GuideStep) -> Option<WatchFire> {
        if !ready {
            return None;
        }
        self.fired.insert(kind);
        Some(WatchFire {
            step_id: step.id.clone(),
            kind,
        })
    }
}
