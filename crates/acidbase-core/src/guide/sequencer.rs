//! Step sequencer.
//!
//! Walks a [`LessonScript`] one step at a time. Entering a step applies its
//! declarative actions and, for checkpoint steps, captures a snapshot that a
//! later `back` restores exactly.

use std::collections::BTreeMap;

use acidbase_logic::lesson::{AutoAdvance, GuideStep, InputKind, LessonScript, StepAction};
use acidbase_logic::substances::SubstanceType;

use crate::guide::snapshot::SimulationSnapshot;
use crate::simulation::Simulation;

/// Result of a navigation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Advanced { from: usize, to: usize },
    Retreated { from: usize, to: usize, restored: bool },
    /// `next` on the last step. The caller leaves the lesson.
    Completed { route: Option<String> },
    Unchanged,
}

/// Bookkeeping for the visit to the current step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepEntry {
    /// Increases on every entry, including re-entry of the same step.
    pub serial: u64,
    pub index: usize,
    pub entered_at_ms: u64,
    /// Strong substance added when the step was entered.
    pub strong_added: u32,
    pub equilibrium_at_entry: bool,
    /// The user used the step's input since entering.
    pub interacted: bool,
    /// The step was entered by restoring a snapshot.
    pub restored: bool,
    suppress_once: bool,
}

pub struct GuideSequencer {
    script: LessonScript,
    index: usize,
    snapshots: BTreeMap<String, SimulationSnapshot>,
    entry: StepEntry,
}

impl GuideSequencer {
    /// Start `script` at its first step.
    pub fn new(script: LessonScript, sim: &mut Simulation) -> Self {
        let mut sequencer = Self {
            script,
            index: 0,
            snapshots: BTreeMap::new(),
            entry: StepEntry {
                serial: 0,
                index: 0,
                entered_at_ms: 0,
                strong_added: 0,
                equilibrium_at_entry: false,
                interacted: false,
                restored: false,
                suppress_once: false,
            },
        };
        sequencer.enter(sim, false);
        sequencer
    }

    pub fn script(&self) -> &LessonScript {
        &self.script
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.script.len()
    }

    pub fn is_empty(&self) -> bool {
        self.script.is_empty()
    }

    pub fn is_last(&self) -> bool {
        self.index + 1 >= self.script.len()
    }

    pub fn current(&self) -> &GuideStep {
        &self.script.steps[self.index]
    }

    pub fn entry(&self) -> &StepEntry {
        &self.entry
    }

    pub fn mark_interaction(&mut self) {
        self.entry.interacted = true;
    }

    /// Consume the one-pass auto-advance suppression left by a restore.
    pub fn take_suppression(&mut self) -> bool {
        std::mem::replace(&mut self.entry.suppress_once, false)
    }

    pub fn snapshot(&self, step_id: &str) -> Option<&SimulationSnapshot> {
        self.snapshots.get(step_id)
    }

    pub fn snapshots(&self) -> impl Iterator<Item = &SimulationSnapshot> {
        self.snapshots.values()
    }

    pub fn next(&mut self, sim: &mut Simulation) -> Navigation {
        let from = self.index;
        let step = &self.script.steps[from];

        if step.input.kind() == InputKind::ChooseSubstance && sim.substance().is_none() {
            let section = step
                .input
                .substance_type()
                .or(sim.params().section)
                .unwrap_or(SubstanceType::StrongAcid);
            if sim.select_first_of(section) {
                sim.reset_progress();
            }
        }

        if self.is_last() {
            log::info!("lesson '{}' complete", self.script.id);
            return Navigation::Completed {
                route: self.script.completion_route.clone(),
            };
        }

        self.index += 1;
        if self.current().input.kind() == InputKind::ChooseSubstance {
            sim.reset_progress();
        }
        self.enter(sim, false);
        Navigation::Advanced { from, to: self.index }
    }

    pub fn back(&mut self, sim: &mut Simulation) -> Navigation {
        if self.index == 0 {
            return Navigation::Unchanged;
        }
        let from = self.index;
        let to = self
            .current()
            .back_target
            .as_deref()
            .and_then(|target| self.script.index_of(target))
            .unwrap_or(from - 1);
        self.index = to;

        let step = &self.script.steps[to];
        let restored = match self.snapshots.get(&step.id) {
            Some(snapshot) => {
                snapshot.restore(sim);
                log::info!("restored snapshot '{}'", step.id);
                true
            }
            None => {
                if step.checkpoint {
                    log::warn!("no snapshot for checkpoint '{}', keeping current state", step.id);
                }
                if step.input.is_setup() {
                    sim.reset_progress();
                }
                false
            }
        };
        self.enter(sim, restored);
        Navigation::Retreated { from, to, restored }
    }

    /// Whether the current step's input condition is met.
    pub fn can_advance(&self, sim: &Simulation) -> bool {
        let step = self.current();
        if !step.requires_action {
            return true;
        }
        let p = sim.params();
        if step.auto_advance == Some(AutoAdvance::Equilibrium) {
            return p.equilibrium_reached;
        }
        match step.input.kind() {
            InputKind::ChooseSubstance => sim.substance().is_some(),
            InputKind::AddSubstance => {
                p.substance_added >= sim.config().min_substance_particles || !sim.can_add_substance()
            }
            InputKind::AddSalt => p.equilibrium_reached,
            InputKind::AddStrongSubstance => p.strong_max > 0 && p.strong_added >= p.strong_max,
            InputKind::AddIndicator => p.indicator_added >= sim.config().max_indicator,
            InputKind::AddTitrant => sim.has_added_enough_titrant(),
            InputKind::None | InputKind::SetWaterLevel | InputKind::SetTitrantMolarity => true,
        }
    }

    /// Jump to `index` with previously saved snapshots, without running
    /// step actions. Used when loading a saved session.
    pub fn resume(&mut self, index: usize, snapshots: Vec<SimulationSnapshot>, sim: &Simulation) {
        self.index = index.min(self.script.len() - 1);
        self.snapshots = snapshots
            .into_iter()
            .map(|snapshot| (snapshot.step_id.clone(), snapshot))
            .collect();
        self.record_entry(sim, true);
    }

    fn enter(&mut self, sim: &mut Simulation, restored: bool) {
        let step = &self.script.steps[self.index];
        if !restored {
            sim.display_mut().substance_selector_open = step.input.kind() == InputKind::ChooseSubstance;
            for action in &step.actions {
                apply_action(sim, action);
            }
            if matches!(
                step.auto_advance,
                Some(AutoAdvance::Exhaustion { derive_max: true })
                    | Some(AutoAdvance::Midpoint { derive_max: true, .. })
            ) {
                sim.derive_strong_max();
            }
        }
        self.record_entry(sim, restored);

        let step = &self.script.steps[self.index];
        if step.checkpoint {
            self.snapshots
                .insert(step.id.clone(), SimulationSnapshot::capture(&step.id, sim));
            log::info!("captured snapshot '{}'", step.id);
        }
        log::info!(
            "step {}/{} '{}'",
            self.index + 1,
            self.script.len(),
            step.id
        );
    }

    fn record_entry(&mut self, sim: &Simulation, restored: bool) {
        self.entry = StepEntry {
            serial: self.entry.serial + 1,
            index: self.index,
            entered_at_ms: sim.now_ms(),
            strong_added: sim.params().strong_added,
            equilibrium_at_entry: sim.params().equilibrium_reached,
            interacted: false,
            restored,
            suppress_once: restored,
        };
    }
}

fn apply_action(sim: &mut Simulation, action: &StepAction) {
    match action {
        StepAction::SetPhase(phase) => sim.set_phase(*phase),
        StepAction::SwitchSection(section) => sim.switch_section(*section),
        StepAction::SetBeakerView(view) => sim.display_mut().beaker_view = *view,
        StepAction::ShowIndicatorFill(show) => sim.display_mut().show_indicator_fill = *show,
        StepAction::ShowTitrantFill(show) => sim.display_mut().show_titrant_fill = *show,
        StepAction::ShowPhString(show) => sim.display_mut().show_ph_string = *show,
        StepAction::SubstanceSelectorOpen(open) => sim.display_mut().substance_selector_open = *open,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beaker::ReactingBeakerModel;
    use crate::clock::ManualClock;
    use crate::config::{BeakerConfig, LessonConfig};
    use crate::grid::RowMajorPicker;
    use acidbase_logic::chemistry::StandardChemistry;
    use acidbase_logic::lesson::SimulationPhase;
    use std::rc::Rc;

    fn sim() -> Simulation {
        let beaker = ReactingBeakerModel::new(
            BeakerConfig::default(),
            Rc::new(ManualClock::new(0)),
            Box::new(RowMajorPicker),
        );
        Simulation::new(beaker, Box::new(StandardChemistry::new()), LessonConfig::default())
    }

    fn script(json: &str) -> LessonScript {
        LessonScript::from_json(json).unwrap()
    }

    const THREE_STEPS: &str = r#"{
        "id": "t", "completionRoute": "/done",
        "steps": [{"id": "a"}, {"id": "b"}, {"id": "c"}]
    }"#;

    #[test]
    fn test_next_stops_at_last_step() {
        let mut s = sim();
        let mut seq = GuideSequencer::new(script(THREE_STEPS), &mut s);
        assert_eq!(seq.next(&mut s), Navigation::Advanced { from: 0, to: 1 });
        assert_eq!(seq.next(&mut s), Navigation::Advanced { from: 1, to: 2 });
        assert_eq!(
            seq.next(&mut s),
            Navigation::Completed {
                route: Some("/done".into())
            }
        );
        assert_eq!(seq.index(), 2);
    }

    #[test]
    fn test_back_at_first_step_is_noop() {
        let mut s = sim();
        let mut seq = GuideSequencer::new(script(THREE_STEPS), &mut s);
        assert_eq!(seq.back(&mut s), Navigation::Unchanged);
        assert_eq!(seq.index(), 0);
    }

    #[test]
    fn test_entry_serial_changes_on_reentry() {
        let mut s = sim();
        let mut seq = GuideSequencer::new(script(THREE_STEPS), &mut s);
        seq.next(&mut s);
        let first = seq.entry().serial;
        seq.back(&mut s);
        seq.next(&mut s);
        assert_eq!(seq.index(), 1);
        assert!(seq.entry().serial > first);
    }

    #[test]
    fn test_actions_apply_on_entry() {
        let json = r#"{"id": "t", "steps": [
            {"id": "a"},
            {"id": "b", "actions": ["phase=equilibrium", "showPhString=true"]}
        ]}"#;
        let mut s = sim();
        let mut seq = GuideSequencer::new(script(json), &mut s);
        seq.next(&mut s);
        assert_eq!(s.params().phase, SimulationPhase::Equilibrium);
        assert!(s.params().display.show_ph_string);
    }

    #[test]
    fn test_choose_substance_auto_selects_first_of_type() {
        let json = r#"{"id": "t", "steps": [
            {"id": "choose", "input": {"type": "chooseSubstance", "substanceType": "weakBase"}},
            {"id": "next"}
        ]}"#;
        let mut s = sim();
        let mut seq = GuideSequencer::new(script(json), &mut s);
        assert!(s.params().display.substance_selector_open);
        seq.next(&mut s);
        assert_eq!(s.substance().map(|x| x.id.as_str()), Some("ammonia"));
        assert!(!s.params().display.substance_selector_open);
    }

    #[test]
    fn test_back_restores_checkpoint() {
        let json = r#"{"id": "t", "steps": [
            {"id": "a"},
            {"id": "b", "checkpoint": true},
            {"id": "c"}
        ]}"#;
        let mut s = sim();
        s.select_substance("hydrogenChloride");
        s.add_substance(6);
        let mut seq = GuideSequencer::new(script(json), &mut s);
        seq.next(&mut s);
        let saved = seq.snapshot("b").cloned().unwrap();

        seq.next(&mut s);
        s.add_substance(9);
        let nav = seq.back(&mut s);
        assert_eq!(
            nav,
            Navigation::Retreated {
                from: 2,
                to: 1,
                restored: true
            }
        );
        assert_eq!(s.params(), &saved.params);
        assert_eq!(s.beaker().particles(), saved.particles.as_slice());
        assert!(seq.take_suppression());
        assert!(!seq.take_suppression());
    }

    #[test]
    fn test_back_target_loops_to_checkpoint() {
        let json = r#"{"id": "t", "steps": [
            {"id": "a", "checkpoint": true},
            {"id": "b"},
            {"id": "c", "backTarget": "a"}
        ]}"#;
        let mut s = sim();
        let mut seq = GuideSequencer::new(script(json), &mut s);
        seq.next(&mut s);
        seq.next(&mut s);
        assert_eq!(
            seq.back(&mut s),
            Navigation::Retreated {
                from: 2,
                to: 0,
                restored: true
            }
        );
    }

    #[test]
    fn test_can_advance_waits_for_substance() {
        let json = r#"{"id": "t", "steps": [
            {"id": "add", "input": {"type": "addSubstance"}, "requiresAction": true},
            {"id": "done"}
        ]}"#;
        let mut s = sim();
        s.select_substance("hydrogenChloride");
        let seq = GuideSequencer::new(script(json), &mut s);
        assert!(!seq.can_advance(&s));
        s.add_substance(19);
        assert!(!seq.can_advance(&s));
        s.add_substance(1);
        assert!(seq.can_advance(&s));
    }

    #[test]
    fn test_derive_max_on_entry() {
        let json = r#"{"id": "t", "steps": [
            {"id": "a"},
            {"id": "strong", "input": {"type": "addStrongSubstance"}, "requiresAction": true,
             "autoAdvance": {"kind": "midpoint", "deriveMax": true}}
        ]}"#;
        let mut s = sim();
        s.select_substance("aceticAcid");
        s.add_substance(20);
        s.set_phase(SimulationPhase::Equilibrium);
        s.add_salt(5);
        let mut seq = GuideSequencer::new(script(json), &mut s);
        seq.next(&mut s);
        assert_eq!(s.params().strong_max, 14);
        assert!(!seq.can_advance(&s));
    }
}
