//! Simulation parameters and phase-driven reconciliation.
//!
//! [`Simulation`] owns the beaker, the chemistry engine and every scalar a
//! lesson manipulates. Each setter finishes by calling the reconcile path
//! that applies to the current phase, so the particles always match the
//! parameters once a setter returns.
//!
//! | Phase | Particles come from |
//! |-------|---------------------|
//! | `Preparation`, `Adding` | `substance_added` undissociated substance |
//! | `Equilibrium` | [`ChemistryEngine::species_counts`] (until salt is added) |
//! | `SaltAdded` | [`ChemistryEngine::buffer_counts`], then strong additions react in place |
//! | `PreEquivalence`, `PostEquivalence` | [`ChemistryEngine::titration_counts`] |

use serde::{Deserialize, Serialize};

use acidbase_logic::beaker_math::{self, WATER_LEVEL_MAX, WATER_LEVEL_MIN};
use acidbase_logic::chemistry::{ChemistryEngine, Concentrations, StandardChemistry, TitrationInput};
use acidbase_logic::constants::lesson::NEUTRAL_PH;
use acidbase_logic::lesson::{BeakerView, SimulationPhase};
use acidbase_logic::species::{Species, SpeciesColors, SpeciesCounts};
use acidbase_logic::statements::StatementContext;
use acidbase_logic::substances::{self, Substance, SubstanceType};

use crate::beaker::{ReactingBeakerModel, ReactionColors, ReactionRule, UpdateOptions};
use crate::config::LessonConfig;
use crate::particle::Particle;

/// Litres of analyte in the titration flask; particle units scale moles.
const ANALYTE_VOLUME_L: f64 = 0.05;

/// Presentation toggles driven by step actions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplayFlags {
    pub beaker_view: BeakerView,
    pub show_indicator_fill: bool,
    pub show_titrant_fill: bool,
    pub show_ph_string: bool,
    pub substance_selector_open: bool,
}

/// Every scalar a lesson step can change. Snapshots copy this wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationParams {
    /// Substance type the current sub-lesson is about.
    pub section: Option<SubstanceType>,
    pub substance_id: Option<String>,
    pub phase: SimulationPhase,
    pub water_level: f64,
    pub molarity: f64,
    pub titrant_molarity: f64,
    pub substance_added: u32,
    pub salt_added: u32,
    pub strong_added: u32,
    /// Strong substance the buffer can take; zero until derived.
    pub strong_max: u32,
    /// Titrant added in the current titration phase.
    pub titrant_added: u32,
    pub max_pre_ep_titrant: u32,
    /// A post-EP step was entered before the equivalence point was reached.
    pub post_ep_pending: bool,
    pub indicator_added: u32,
    pub equilibrium_reached: bool,
    pub display: DisplayFlags,
}

impl SimulationParams {
    fn new(config: &LessonConfig) -> Self {
        Self {
            section: None,
            substance_id: None,
            phase: SimulationPhase::Adding,
            water_level: config.initial_water_level,
            molarity: config.default_molarity,
            titrant_molarity: config.titrant_molarity,
            substance_added: 0,
            salt_added: 0,
            strong_added: 0,
            strong_max: 0,
            titrant_added: 0,
            max_pre_ep_titrant: 0,
            post_ep_pending: false,
            indicator_added: 0,
            equilibrium_reached: false,
            display: DisplayFlags::default(),
        }
    }
}

/// Scalars exposed to the rendering layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationView {
    pub substance_id: Option<String>,
    pub phase: SimulationPhase,
    pub ph: f64,
    pub counts: SpeciesCounts,
    pub concentrations: Concentrations,
    pub water_level: f64,
    pub visible_rows: u32,
    pub substance_added: u32,
    pub salt_added: u32,
    pub strong_added: u32,
    pub strong_max: u32,
    pub titrant_added: u32,
    pub indicator_added: u32,
    pub equilibrium_reached: bool,
    pub display: DisplayFlags,
}

pub struct Simulation {
    params: SimulationParams,
    substance: Option<Substance>,
    beaker: ReactingBeakerModel,
    chemistry: Box<dyn ChemistryEngine>,
    config: LessonConfig,
}

impl Simulation {
    pub fn new(beaker: ReactingBeakerModel, chemistry: Box<dyn ChemistryEngine>, config: LessonConfig) -> Self {
        let params = SimulationParams::new(&config);
        let mut sim = Self {
            params,
            substance: None,
            beaker,
            chemistry,
            config,
        };
        sim.beaker.set_water_level(sim.params.water_level);
        sim
    }

    pub fn with_defaults() -> Self {
        Self::new(
            ReactingBeakerModel::with_defaults(),
            Box::new(StandardChemistry::new()),
            LessonConfig::default(),
        )
    }

    pub fn params(&self) -> &SimulationParams {
        &self.params
    }

    pub fn config(&self) -> &LessonConfig {
        &self.config
    }

    pub fn beaker(&self) -> &ReactingBeakerModel {
        &self.beaker
    }

    /// Direct beaker access for screens that drive particles themselves.
    pub fn beaker_mut(&mut self) -> &mut ReactingBeakerModel {
        &mut self.beaker
    }

    pub fn substance(&self) -> Option<&Substance> {
        self.substance.as_ref()
    }

    pub fn now_ms(&self) -> u64 {
        self.beaker.now_ms()
    }

    // ── Setters ────────────────────────────────────────────────────────

    /// Select a catalog substance. Unknown ids are ignored.
    pub fn select_substance(&mut self, id: &str) -> bool {
        let Some(substance) = substances::find(id) else {
            log::warn!("unknown substance '{}'", id);
            return false;
        };
        self.params.section = Some(substance.substance_type);
        self.params.substance_id = Some(substance.id.clone());
        self.substance = Some(substance);
        self.reconcile();
        true
    }

    /// Pick the first catalog substance of `section`.
    pub fn select_first_of(&mut self, section: SubstanceType) -> bool {
        match substances::by_type(section).first() {
            Some(substance) => {
                let id = substance.id.clone();
                self.select_substance(&id)
            }
            None => false,
        }
    }

    /// Start a sub-lesson on `section`, dropping the selected substance.
    pub fn switch_section(&mut self, section: SubstanceType) {
        self.params.section = Some(section);
        self.params.substance_id = None;
        self.substance = None;
        self.reset_progress();
    }

    /// Zero every added amount and return to the adding phase with the
    /// initial water level.
    pub fn reset_progress(&mut self) {
        let p = &mut self.params;
        p.phase = SimulationPhase::Adding;
        p.water_level = self.config.initial_water_level;
        p.substance_added = 0;
        p.salt_added = 0;
        p.strong_added = 0;
        p.strong_max = 0;
        p.titrant_added = 0;
        p.max_pre_ep_titrant = 0;
        p.post_ep_pending = false;
        p.indicator_added = 0;
        p.equilibrium_reached = false;
        self.beaker.set_water_level(p.water_level);
        self.reconcile();
    }

    /// Water level as a `0..=1` fraction of the usable range.
    pub fn set_water_level(&mut self, fraction: f64) {
        let fraction = if fraction.is_finite() { fraction.clamp(0.0, 1.0) } else { 0.0 };
        self.params.water_level = fraction;
        self.beaker.set_water_level(fraction);
    }

    /// Water level from the raw slider value.
    pub fn set_water_slider(&mut self, raw: f64) {
        let fraction = beaker_math::model_level_for_water_level(raw, WATER_LEVEL_MIN, WATER_LEVEL_MAX);
        self.set_water_level(fraction);
    }

    pub fn max_substance(&self) -> u32 {
        let grid = self.beaker.config().grid;
        (grid.columns * self.beaker.effective_rows()).div_ceil(3)
    }

    pub fn can_add_substance(&self) -> bool {
        self.substance.is_some() && self.params.substance_added < self.max_substance()
    }

    /// Pour in substance. Returns how much was accepted.
    pub fn add_substance(&mut self, amount: u32) -> u32 {
        if self.substance.is_none() {
            return 0;
        }
        let room = self.max_substance().saturating_sub(self.params.substance_added);
        let accepted = amount.min(room);
        if accepted == 0 {
            return 0;
        }
        self.params.substance_added += accepted;
        self.reconcile();
        accepted
    }

    /// Shake conjugate salt into the equilibrium mixture.
    pub fn add_salt(&mut self, amount: u32) -> u32 {
        let Some(substance) = &self.substance else {
            return 0;
        };
        if substance.is_strong() || amount == 0 {
            return 0;
        }
        if self.params.phase == SimulationPhase::Equilibrium {
            self.params.phase = SimulationPhase::SaltAdded;
        }
        if self.params.phase != SimulationPhase::SaltAdded {
            return 0;
        }
        self.params.salt_added += amount;
        if self.params.salt_added >= self.config.salt_shakes_for_equilibrium {
            self.params.equilibrium_reached = true;
        }
        self.reconcile_salt();
        amount
    }

    /// Externally computed equilibrium flag, e.g. once an animation settles.
    pub fn set_equilibrium_reached(&mut self, reached: bool) {
        self.params.equilibrium_reached = reached;
    }

    /// Fix the strong-substance budget from the secondary ions now present.
    pub fn derive_strong_max(&mut self) {
        let secondary = self.beaker.counts().secondary;
        let max = (secondary + self.config.min_final_primary_ion_count)
            .saturating_sub(self.config.final_secondary_ion_count);
        self.params.strong_max = max;
        self.params.strong_added = 0;
        log::debug!("strong substance budget set to {} ({} secondary ions)", max, secondary);
    }

    pub fn can_add_strong(&self) -> bool {
        self.substance.is_some() && self.params.strong_added < self.params.strong_max
    }

    /// Add strong acid/base to the buffer; each particle neutralises one
    /// secondary ion in place.
    pub fn add_strong(&mut self, amount: u32) -> u32 {
        let Some(substance) = &self.substance else {
            return 0;
        };
        let room = self.params.strong_max.saturating_sub(self.params.strong_added);
        let accepted = amount.min(room);
        if accepted == 0 {
            return 0;
        }
        let colors = substance.colors();
        let rule = ReactionRule {
            reactant: Species::PrimaryIon,
            reacting_with: Species::SecondaryIon,
            producing: Species::Substance,
        };
        let reaction_colors = ReactionColors {
            reactant: colors.primary_ion,
            produced: colors.substance,
        };
        self.beaker.add_with_reaction(rule, accepted as usize, &reaction_colors);
        self.params.strong_added += accepted;
        accepted
    }

    pub fn can_add_indicator(&self) -> bool {
        self.params.indicator_added < self.config.max_indicator
    }

    pub fn add_indicator(&mut self, drops: u32) -> u32 {
        let room = self.config.max_indicator.saturating_sub(self.params.indicator_added);
        let accepted = drops.min(room);
        if accepted == 0 {
            return 0;
        }
        self.params.indicator_added += accepted;
        self.reconcile();
        accepted
    }

    pub fn set_titrant_molarity(&mut self, molarity: f64) {
        if molarity.is_finite() && molarity > 0.0 {
            self.params.titrant_molarity = molarity;
        }
    }

    /// Titrant the current titration phase still accepts.
    pub fn titrant_capacity(&self) -> u32 {
        match self.params.phase {
            SimulationPhase::PreEquivalence => self.params.max_pre_ep_titrant,
            SimulationPhase::PostEquivalence => self.config.post_ep_titrant_max,
            _ => 0,
        }
    }

    pub fn has_added_enough_titrant(&self) -> bool {
        let capacity = self.titrant_capacity();
        capacity > 0 && self.params.titrant_added >= capacity
    }

    pub fn add_titrant(&mut self, amount: u32) -> u32 {
        if self.substance.is_none() {
            return 0;
        }
        let room = self.titrant_capacity().saturating_sub(self.params.titrant_added);
        let accepted = amount.min(room);
        if accepted == 0 {
            return 0;
        }
        self.params.titrant_added += accepted;
        if self.params.post_ep_pending && self.params.titrant_added >= self.params.max_pre_ep_titrant {
            self.enter_post_equivalence();
        }
        self.reconcile();
        accepted
    }

    /// Move to `phase` as a step action.
    pub fn set_phase(&mut self, phase: SimulationPhase) {
        let previous = self.params.phase;
        match phase {
            SimulationPhase::PreEquivalence => {
                if previous != SimulationPhase::PreEquivalence {
                    self.params.titrant_added = 0;
                    self.params.max_pre_ep_titrant = self.params.substance_added;
                }
                self.params.phase = phase;
            }
            SimulationPhase::PostEquivalence => {
                let short_of_equivalence = previous == SimulationPhase::PreEquivalence
                    && self.params.titrant_added < self.params.max_pre_ep_titrant;
                let weak = self.substance.as_ref().is_some_and(|s| !s.is_strong());
                if short_of_equivalence && weak {
                    // Keep titrating until the equivalence point is reached.
                    self.params.post_ep_pending = true;
                } else if previous != SimulationPhase::PostEquivalence {
                    self.enter_post_equivalence();
                }
            }
            _ => self.params.phase = phase,
        }
        if self.params.phase != previous {
            log::debug!("phase {:?} -> {:?}", previous, self.params.phase);
        }
        self.reconcile();
    }

    fn enter_post_equivalence(&mut self) {
        if self.params.max_pre_ep_titrant == 0 {
            self.params.max_pre_ep_titrant = self.params.substance_added;
        }
        self.params.phase = SimulationPhase::PostEquivalence;
        self.params.titrant_added = 0;
        self.params.post_ep_pending = false;
    }

    pub fn display_mut(&mut self) -> &mut DisplayFlags {
        &mut self.params.display
    }

    // ── Snapshots ──────────────────────────────────────────────────────

    /// Replace every scalar and particle with saved values, without
    /// recomputing anything.
    pub fn restore(&mut self, params: &SimulationParams, particles: &[Particle]) {
        self.params = params.clone();
        self.substance = params.substance_id.as_deref().and_then(substances::find);
        self.beaker.set_water_level(params.water_level);
        self.beaker.set_particles(particles);
    }

    // ── Derived values ─────────────────────────────────────────────────

    /// Titrant added across both titration phases.
    fn total_titrant(&self) -> u32 {
        match self.params.phase {
            SimulationPhase::PostEquivalence => self.params.max_pre_ep_titrant + self.params.titrant_added,
            SimulationPhase::PreEquivalence => self.params.titrant_added,
            _ => 0,
        }
    }

    /// Analyte molarity scaled by how full the beaker is.
    fn effective_molarity(&self) -> f64 {
        let max = self.max_substance();
        if max == 0 {
            return 0.0;
        }
        self.params.molarity * self.params.substance_added as f64 / max as f64
    }

    pub fn ph(&self) -> f64 {
        let Some(substance) = &self.substance else {
            return NEUTRAL_PH;
        };
        if self.params.substance_added == 0 {
            return NEUTRAL_PH;
        }
        match self.params.phase {
            SimulationPhase::Preparation | SimulationPhase::Adding | SimulationPhase::Equilibrium => {
                self.chemistry.ph(substance, self.effective_molarity())
            }
            SimulationPhase::SaltAdded => self.buffer_ph(substance),
            SimulationPhase::PreEquivalence | SimulationPhase::PostEquivalence => {
                self.chemistry.titration_ph(substance, &self.titration_input())
            }
        }
    }

    /// Henderson-Hasselbalch over the particles in the beaker.
    fn buffer_ph(&self, substance: &Substance) -> f64 {
        let counts = self.beaker.counts();
        if counts.substance == 0 || counts.secondary == 0 {
            return self.chemistry.ph(substance, self.effective_molarity());
        }
        let ratio = (counts.secondary as f64 / counts.substance as f64).log10();
        let ph = if substance.is_acid() {
            substance.pka() + ratio
        } else {
            14.0 - (-substance.kb().log10() + ratio)
        };
        if ph.is_finite() {
            ph.clamp(0.0, 14.0)
        } else {
            NEUTRAL_PH
        }
    }

    fn titration_input(&self) -> TitrationInput {
        let mut input = TitrationInput {
            analyte_molarity: self.params.molarity,
            analyte_volume: ANALYTE_VOLUME_L,
            titrant_molarity: self.params.titrant_molarity,
            titrant_volume: 0.0,
        };
        let units = self.params.substance_added.max(1) as f64;
        input.titrant_volume = input.equivalence_volume() * self.total_titrant() as f64 / units;
        input
    }

    pub fn concentrations(&self) -> Concentrations {
        match &self.substance {
            Some(substance) => self.chemistry.concentrations(substance, self.effective_molarity()),
            None => Concentrations::default(),
        }
    }

    /// Moles of substance in the beaker at the current water level.
    pub fn substance_moles(&self) -> f64 {
        let volume = self.params.water_level.max(0.0) * 0.1;
        self.effective_molarity() * volume
    }

    /// Resting colours for the current state: the substance's palette, the
    /// titrant's ion colour past equivalence, and the indicator tint.
    pub fn resting_colors(&self) -> SpeciesColors {
        let Some(substance) = &self.substance else {
            return SpeciesColors::default();
        };
        let mut colors = substance.colors();
        if self.params.phase == SimulationPhase::PostEquivalence {
            if let Some(titrant) = titrant_for(substance) {
                colors.primary_ion = titrant.primary_color;
            }
        }
        if self.params.indicator_added > 0 {
            if let Some(tint) = self.chemistry.indicator_color(self.ph()) {
                colors.substance = tint;
            }
        }
        colors
    }

    pub fn statement_context(&self) -> StatementContext<'_> {
        StatementContext {
            substance: self.substance.as_ref(),
            ph: self.ph(),
            substance_moles: self.substance_moles(),
        }
    }

    pub fn view(&self) -> SimulationView {
        let grid = self.beaker.config().grid;
        let slider = WATER_LEVEL_MIN + (WATER_LEVEL_MAX - WATER_LEVEL_MIN) * self.params.water_level;
        SimulationView {
            substance_id: self.params.substance_id.clone(),
            phase: self.params.phase,
            ph: self.ph(),
            counts: self.beaker.counts(),
            concentrations: self.concentrations(),
            water_level: self.params.water_level,
            visible_rows: beaker_math::grid_rows_for_water_level(
                slider,
                WATER_LEVEL_MIN,
                WATER_LEVEL_MAX,
                grid.rows_min,
                grid.rows_max,
            ),
            substance_added: self.params.substance_added,
            salt_added: self.params.salt_added,
            strong_added: self.params.strong_added,
            strong_max: self.params.strong_max,
            titrant_added: self.params.titrant_added,
            indicator_added: self.params.indicator_added,
            equilibrium_reached: self.params.equilibrium_reached,
            display: self.params.display,
        }
    }

    // ── Reconciliation ─────────────────────────────────────────────────

    /// Bring the particles in line with the parameters for the current phase.
    /// Salt and strong additions own the particles once salt is in, so this
    /// leaves a salted beaker alone.
    pub fn reconcile(&mut self) {
        let Some(substance) = &self.substance else {
            self.beaker.initialize(SpeciesCounts::ZERO, &SpeciesColors::default());
            return;
        };
        let p = &self.params;
        let target = match p.phase {
            SimulationPhase::Preparation | SimulationPhase::Adding => {
                SpeciesCounts::new(p.substance_added, 0, 0)
            }
            SimulationPhase::Equilibrium if p.salt_added == 0 => {
                self.chemistry.species_counts(substance, p.molarity, p.substance_added)
            }
            SimulationPhase::Equilibrium | SimulationPhase::SaltAdded => return,
            SimulationPhase::PreEquivalence | SimulationPhase::PostEquivalence => {
                self.chemistry
                    .titration_counts(substance, p.max_pre_ep_titrant, self.total_titrant())
            }
        };
        let colors = self.resting_colors();
        self.beaker.update_particles(target, &colors, &UpdateOptions::new());
    }

    /// Redraw the salted buffer; new secondary ions fade in from the excess colour.
    fn reconcile_salt(&mut self) {
        let Some(substance) = &self.substance else {
            return;
        };
        let p = &self.params;
        let target = self
            .chemistry
            .buffer_counts(substance, p.molarity, p.substance_added, p.salt_added);
        let colors = self.resting_colors();
        let options = UpdateOptions::new()
            .initial_color(Species::SecondaryIon, self.beaker.config().excess_reactant_color.clone());
        self.beaker.update_particles(target, &colors, &options);
    }
}

/// Strong substance of the opposite kind, used as the titrant.
fn titrant_for(analyte: &Substance) -> Option<Substance> {
    let titrant_type = if analyte.is_acid() {
        SubstanceType::StrongBase
    } else {
        SubstanceType::StrongAcid
    };
    substances::by_type(titrant_type).into_iter().next()
}
