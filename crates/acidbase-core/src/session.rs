//! Lesson session: the object a lesson screen owns.
//!
//! Ties one [`GuideSequencer`] to one [`Simulation`]. Inputs are accepted
//! only while the current step asks for them; after every accepted input
//! the auto-advance watchers get a chance to move the lesson on, and the
//! session notifies its listeners once.

use std::io::{Read, Write};
use std::rc::Rc;

use serde::Serialize;

use acidbase_logic::chemistry::StandardChemistry;
use acidbase_logic::lesson::{InputKind, InputState, LessonScript};
use acidbase_logic::statements;

use crate::beaker::ReactingBeakerModel;
use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::grid::PositionPicker;
use crate::guide::{AutoAdvanceWatchers, GuideSequencer, Navigation};
use crate::observe::{Listeners, Subscription};
use crate::particle::Particle;
use crate::persistence::{self, SaveError};
use crate::simulation::{Simulation, SimulationView};

/// Guide state exposed to the rendering layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuideView {
    pub lesson_id: String,
    pub step_id: String,
    pub index: usize,
    pub total: usize,
    /// Statement lines with placeholders filled in.
    pub statement: Vec<String>,
    pub highlights: Vec<String>,
    pub input: InputState,
    pub can_advance: bool,
    pub is_last: bool,
}

/// Everything a lesson screen redraws from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    pub guide: GuideView,
    pub simulation: SimulationView,
    pub completed: bool,
}

pub struct LessonSession {
    sequencer: GuideSequencer,
    simulation: Simulation,
    watchers: AutoAdvanceWatchers,
    listeners: Listeners<SessionView>,
    completed: bool,
}

impl LessonSession {
    pub fn new(script: LessonScript, mut simulation: Simulation) -> Self {
        let sequencer = GuideSequencer::new(script, &mut simulation);
        Self {
            sequencer,
            simulation,
            watchers: AutoAdvanceWatchers::new(),
            listeners: Listeners::new(),
            completed: false,
        }
    }

    /// Build a session from explicit config, clock and placement strategy.
    pub fn with_parts(
        script: LessonScript,
        config: EngineConfig,
        clock: Rc<dyn Clock>,
        picker: Box<dyn PositionPicker>,
    ) -> Self {
        let beaker = ReactingBeakerModel::new(config.beaker, clock, picker);
        let simulation = Simulation::new(beaker, Box::new(StandardChemistry::new()), config.lesson);
        Self::new(script, simulation)
    }

    pub fn with_defaults(script: LessonScript) -> Self {
        Self::new(script, Simulation::with_defaults())
    }

    pub fn simulation(&self) -> &Simulation {
        &self.simulation
    }

    pub fn sequencer(&self) -> &GuideSequencer {
        &self.sequencer
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn particles(&self) -> &[Particle] {
        self.simulation.beaker().particles()
    }

    pub fn current_step_id(&self) -> &str {
        &self.sequencer.current().id
    }

    pub fn can_advance(&self) -> bool {
        self.sequencer.can_advance(&self.simulation)
    }

    pub fn guide_view(&self) -> GuideView {
        let step = self.sequencer.current();
        let ctx = self.simulation.statement_context();
        GuideView {
            lesson_id: self.sequencer.script().id.clone(),
            step_id: step.id.clone(),
            index: self.sequencer.index(),
            total: self.sequencer.len(),
            statement: statements::resolve_lines(&step.statement, &ctx),
            highlights: step.highlights.clone(),
            input: step.input.clone(),
            can_advance: self.can_advance(),
            is_last: self.sequencer.is_last(),
        }
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            guide: self.guide_view(),
            simulation: self.simulation.view(),
            completed: self.completed,
        }
    }

    /// Listen for guide and simulation changes.
    pub fn subscribe(&self, listener: impl FnMut(&SessionView) + 'static) -> Subscription {
        self.listeners.subscribe(listener)
    }

    /// Listen for particle changes.
    pub fn subscribe_particles(&self, listener: impl FnMut(&[Particle]) + 'static) -> Subscription {
        self.simulation.beaker().subscribe(listener)
    }

    // ── Navigation ─────────────────────────────────────────────────────

    pub fn next(&mut self) -> Navigation {
        let nav = self.sequencer.next(&mut self.simulation);
        if matches!(nav, Navigation::Completed { .. }) {
            self.completed = true;
        }
        self.settle();
        self.publish();
        nav
    }

    pub fn back(&mut self) -> Navigation {
        let nav = self.sequencer.back(&mut self.simulation);
        if nav != Navigation::Unchanged {
            self.completed = false;
            self.settle();
            self.publish();
        }
        nav
    }

    /// Run due colour transitions and the step timer.
    pub fn tick(&mut self) -> Option<Navigation> {
        let recolored = self.simulation.beaker_mut().run_due_transitions();
        let now = self.simulation.now_ms();
        let fire = self
            .watchers
            .evaluate_timer(self.sequencer.current(), self.sequencer.entry(), now);

        let nav = match fire {
            Some(fire) if !self.sequencer.is_last() => {
                log::info!("step '{}' timed out, advancing", fire.step_id);
                let nav = self.sequencer.next(&mut self.simulation);
                self.settle();
                Some(nav)
            }
            _ => None,
        };
        if recolored || nav.is_some() {
            self.publish();
        }
        nav
    }

    // ── Inputs ─────────────────────────────────────────────────────────

    pub fn choose_substance(&mut self, id: &str) -> bool {
        if !self.accepts(InputKind::ChooseSubstance) {
            return false;
        }
        let wanted = self.sequencer.current().input.substance_type();
        let matches = acidbase_logic::substances::find(id)
            .is_some_and(|s| wanted.map_or(true, |t| t == s.substance_type));
        if !matches || !self.simulation.select_substance(id) {
            return false;
        }
        self.simulation.reset_progress();
        self.simulation.display_mut().substance_selector_open = false;
        self.after_input();
        true
    }

    /// Water level as a `0..=1` fraction.
    pub fn set_water_level(&mut self, fraction: f64) -> bool {
        if !self.accepts(InputKind::SetWaterLevel) {
            return false;
        }
        self.simulation.set_water_level(fraction);
        self.after_input();
        true
    }

    pub fn add_substance(&mut self, amount: u32) -> u32 {
        if !self.accepts(InputKind::AddSubstance) {
            return 0;
        }
        let accepted = self.simulation.add_substance(amount);
        self.after_input();
        accepted
    }

    pub fn add_salt(&mut self, amount: u32) -> u32 {
        if !self.accepts(InputKind::AddSalt) {
            return 0;
        }
        let accepted = self.simulation.add_salt(amount);
        self.after_input();
        accepted
    }

    pub fn add_strong_substance(&mut self, amount: u32) -> u32 {
        if !self.accepts(InputKind::AddStrongSubstance) {
            return 0;
        }
        let accepted = self.simulation.add_strong(amount);
        self.after_input();
        accepted
    }

    pub fn add_indicator(&mut self, drops: u32) -> u32 {
        if !self.accepts(InputKind::AddIndicator) {
            return 0;
        }
        let accepted = self.simulation.add_indicator(drops);
        self.after_input();
        accepted
    }

    pub fn add_titrant(&mut self, amount: u32) -> u32 {
        if !self.accepts(InputKind::AddTitrant) {
            return 0;
        }
        let accepted = self.simulation.add_titrant(amount);
        self.after_input();
        accepted
    }

    pub fn set_titrant_molarity(&mut self, molarity: f64) -> bool {
        if !self.accepts(InputKind::SetTitrantMolarity) {
            return false;
        }
        self.simulation.set_titrant_molarity(molarity);
        self.after_input();
        true
    }

    /// Feed an externally computed equilibrium flag.
    pub fn set_equilibrium_reached(&mut self, reached: bool) {
        self.simulation.set_equilibrium_reached(reached);
        self.settle();
        self.publish();
    }

    // ── Persistence ────────────────────────────────────────────────────

    pub fn save<W: Write>(&self, writer: W) -> Result<(), SaveError> {
        persistence::save_session(writer, self)
    }

    /// Load a session saved from the same lesson.
    pub fn load<R: Read>(&mut self, reader: R) -> Result<(), SaveError> {
        let data = persistence::load_session(reader, &self.sequencer.script().id, self.sequencer.len())?;
        self.simulation.restore(&data.params, &data.particles);
        self.sequencer
            .resume(data.step_index, data.snapshots, &self.simulation);
        self.completed = false;
        self.settle();
        self.publish();
        Ok(())
    }

    // ── Internals ──────────────────────────────────────────────────────

    fn accepts(&self, kind: InputKind) -> bool {
        let current = self.sequencer.current().input.kind();
        if current != kind {
            log::debug!("ignoring {:?} input during step '{}'", kind, self.current_step_id());
            return false;
        }
        true
    }

    fn after_input(&mut self) {
        self.sequencer.mark_interaction();
        self.settle();
        self.publish();
    }

    /// Let watchers advance the lesson, one step per pass, until none fires.
    fn settle(&mut self) {
        if self.sequencer.take_suppression() {
            return;
        }
        for _ in 0..self.sequencer.len() {
            let fire = self.watchers.evaluate(
                self.sequencer.current(),
                self.sequencer.entry(),
                &self.simulation,
            );
            let Some(fire) = fire else { break };
            log::info!("auto-advancing from '{}' ({:?})", fire.step_id, fire.kind);
            if let Navigation::Completed { .. } = self.sequencer.next(&mut self.simulation) {
                self.completed = true;
                break;
            }
        }
    }

    fn publish(&self) {
        if !self.listeners.is_empty() {
            self.listeners.notify(&self.view());
        }
    }

    pub(crate) fn snapshot_parts(&self) -> (&GuideSequencer, &Simulation) {
        (&self.sequencer, &self.simulation)
    }
}
