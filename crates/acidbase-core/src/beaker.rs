//! Reacting beaker model.
//!
//! Owns the particle list and its grid index. Every public mutation
//! computes its full result, then notifies listeners exactly once.
//!
//! Colour changes are never applied immediately: a particle is created or
//! re-tagged with its old `display_color`, a new `target_color`, and the
//! transition timings the renderer needs. A [`TransitionScheduler`] entry then
//! flips `display_color` when [`ReactingBeakerModel::run_due_transitions`]
//! runs at or after its fire time.

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::rc::Rc;

use acidbase_logic::beaker_math;
use acidbase_logic::species::{Species, SpeciesColors, SpeciesCounts};

use crate::clock::{Clock, SystemClock};
use crate::config::BeakerConfig;
use crate::grid::{GridPosition, ParticleGrid, PositionPicker, RandomPicker};
use crate::observe::{Listeners, Subscription};
use crate::particle::{Particle, ParticleId};
use crate::scheduler::TransitionScheduler;

/// Which species react when particles are added with a reaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReactionRule {
    /// Species being added.
    pub reactant: Species,
    /// Species consumed by the added particles.
    pub reacting_with: Species,
    /// Species every reacting pair turns into.
    pub producing: Species,
}

/// Colours used by [`ReactingBeakerModel::add_with_reaction`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionColors {
    pub reactant: String,
    pub produced: String,
}

/// Options for [`ReactingBeakerModel::add_directly`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectOptions {
    /// Colour shown before the transition to the resting colour.
    pub initial_color: Option<String>,
    pub transition_ms: Option<u64>,
    /// Delay between consecutive particles' transitions.
    pub stagger_ms: u64,
}

/// Per-species options for [`ReactingBeakerModel::update_particles`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateOptions {
    initial_colors: BTreeMap<Species, String>,
    skip_fade_in: BTreeSet<Species>,
    transition_delay_ms: BTreeMap<Species, u64>,
    stagger_ms: BTreeMap<Species, u64>,
}

impl UpdateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Newly allocated particles of `species` start at `color`.
    pub fn initial_color(mut self, species: Species, color: impl Into<String>) -> Self {
        self.initial_colors.insert(species, color.into());
        self
    }

    /// Newly allocated particles of `species` appear already faded in.
    pub fn skip_fade_in(mut self, species: Species) -> Self {
        self.skip_fade_in.insert(species);
        self
    }

    /// Hold the colour change of new `species` particles for `ms`.
    pub fn transition_delay(mut self, species: Species, ms: u64) -> Self {
        self.transition_delay_ms.insert(species, ms);
        self
    }

    pub fn stagger(mut self, species: Species, ms: u64) -> Self {
        self.stagger_ms.insert(species, ms);
        self
    }
}

/// What [`ReactingBeakerModel::add_with_reaction`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReactionOutcome {
    /// Ids of the consumed partner particles, in insertion order.
    pub consumed: Vec<ParticleId>,
    /// Product particles created.
    pub produced: usize,
    /// Surplus reactant particles created.
    pub excess: usize,
}

/// Particle churn caused by one [`ReactingBeakerModel::update_particles`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Surplus particles taken out of their species.
    pub removed: usize,
    /// Surplus particles re-tagged in place to fill a deficit.
    pub reused: usize,
    /// Particles placed at new cells.
    pub created: usize,
    /// Surplus particles dropped and their cells freed.
    pub released: usize,
    /// Particles recoloured because their species' resting colour changed.
    pub restyled: usize,
}

impl ReconcileReport {
    /// Whether any particle was created or dropped.
    pub fn churned(&self) -> bool {
        self.created > 0 || self.released > 0 || self.reused > 0
    }
}

pub struct ReactingBeakerModel {
    config: BeakerConfig,
    particles: Vec<Particle>,
    grid: ParticleGrid,
    effective_rows: u32,
    next_id: u64,
    clock: Rc<dyn Clock>,
    scheduler: TransitionScheduler,
    listeners: Listeners<[Particle]>,
}

impl ReactingBeakerModel {
    pub fn new(config: BeakerConfig, clock: Rc<dyn Clock>, picker: Box<dyn PositionPicker>) -> Self {
        let grid = ParticleGrid::new(config.grid, picker);
        let effective_rows = config
            .initial_effective_rows
            .clamp(config.grid.rows_min, config.grid.rows_max);
        Self {
            config,
            particles: Vec::new(),
            grid,
            effective_rows,
            next_id: 0,
            clock,
            scheduler: TransitionScheduler::new(),
            listeners: Listeners::new(),
        }
    }

    /// Default tuning, wall clock and random placement.
    pub fn with_defaults() -> Self {
        Self::new(
            BeakerConfig::default(),
            Rc::new(SystemClock::new()),
            Box::new(RandomPicker::from_entropy()),
        )
    }

    pub fn config(&self) -> &BeakerConfig {
        &self.config
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Rows new particles may be placed in.
    pub fn effective_rows(&self) -> u32 {
        self.effective_rows
    }

    /// Recompute the effective rows from a `0..=1` water level. Particles
    /// above the new limit stay where they are.
    pub fn set_water_level(&mut self, fraction: f64) {
        let grid = self.config.grid;
        self.effective_rows = beaker_math::effective_rows(
            fraction,
            grid.rows_min,
            grid.rows_max,
            self.config.row_round_threshold,
        );
    }

    /// Replace everything with `counts` particles at rest in `colors`.
    pub fn initialize(&mut self, counts: SpeciesCounts, colors: &SpeciesColors) {
        self.particles.clear();
        self.grid.clear();
        let now = self.now_ms();
        for species in Species::ALL {
            self.place_new(
                species,
                counts.get(species) as usize,
                colors.get(species),
                &DirectOptions::default(),
                now,
            );
        }
        log::debug!("beaker initialised with {} particles", self.particles.len());
        self.notify();
    }

    /// Replace the particle list with a copy of `particles` and rebuild the
    /// grid from their positions.
    pub fn set_particles(&mut self, particles: &[Particle]) {
        self.particles = particles.to_vec();
        self.grid.clear();
        for particle in &self.particles {
            self.grid.occupy(particle.position);
        }
        if let Some(max_id) = self.particles.iter().map(|p| p.id.0).max() {
            self.next_id = self.next_id.max(max_id + 1);
        }

        // Entries queued for the replaced beaker no longer apply. Restored
        // particles caught mid-transition get theirs re-issued.
        self.scheduler.clear();
        let now = self.now_ms();
        let mut pending: BTreeMap<String, Vec<ParticleId>> = BTreeMap::new();
        for particle in self.particles.iter().filter(|p| p.display_color != p.target_color) {
            pending
                .entry(particle.target_color.clone())
                .or_default()
                .push(particle.id);
        }
        for (color, ids) in pending {
            self.scheduler.schedule(now, ids, color);
        }
        self.notify();
    }

    /// Add up to `count` particles of `species` at free cells. Returns how
    /// many were placed, which is less than `count` when the grid is full.
    pub fn add_directly(&mut self, species: Species, count: usize, color: &str, options: &DirectOptions) -> usize {
        let now = self.now_ms();
        let placed = self.place_new(species, count, color, options, now).len();
        self.notify();
        placed
    }

    /// Add `count` reactant particles that each consume one `reacting_with`
    /// particle, newest first. Reactants beyond what can react are added as
    /// surplus, fading in from the excess colour.
    pub fn add_with_reaction(&mut self, rule: ReactionRule, count: usize, colors: &ReactionColors) -> ReactionOutcome {
        let now = self.now_ms();
        let reaction_ms = self.config.reaction_transition_ms;
        let stagger = self.config.stagger_ms;

        let partners: Vec<ParticleId> = self
            .particles
            .iter()
            .filter(|p| p.species == rule.reacting_with)
            .map(|p| p.id)
            .collect();
        let reaction_count = count.min(partners.len());
        let consumed_ids: HashSet<ParticleId> =
            partners[partners.len() - reaction_count..].iter().copied().collect();

        let (consumed, kept): (Vec<Particle>, Vec<Particle>) = std::mem::take(&mut self.particles)
            .into_iter()
            .partition(|p| consumed_ids.contains(&p.id));
        self.particles = kept;

        // Consumed cells stay occupied; the products take them over.
        let mut produced = Vec::with_capacity(reaction_count * 2);
        for (k, partner) in consumed.iter().enumerate() {
            let id = self.create_particle_at(
                partner.position,
                rule.producing,
                &partner.display_color,
                &colors.produced,
                Some((reaction_ms, k as u64 * stagger)),
                now,
            );
            produced.push(id);
        }

        let reactant_cells = self
            .grid
            .random_available_positions(reaction_count, &[], self.effective_rows);
        for (k, position) in reactant_cells.into_iter().enumerate() {
            let id = self.create_particle_at(
                position,
                rule.producing,
                &colors.reactant,
                &colors.produced,
                Some((reaction_ms, (k + reaction_count) as u64 * stagger)),
                now,
            );
            produced.push(id);
        }
        let produced_count = produced.len();
        self.scheduler.schedule(now, produced, colors.produced.clone());

        let surplus = count - reaction_count;
        let excess = if surplus > 0 {
            let options = DirectOptions {
                initial_color: Some(self.config.excess_reactant_color.clone()),
                transition_ms: Some(reaction_ms),
                stagger_ms: stagger,
            };
            self.place_new(rule.reactant, surplus, &colors.reactant, &options, now).len()
        } else {
            0
        };

        log::debug!(
            "{} {} reacted with {} {}, {} produced, {} surplus",
            count,
            rule.reactant,
            reaction_count,
            rule.reacting_with,
            produced_count,
            excess
        );
        self.notify();

        ReactionOutcome {
            consumed: consumed.into_iter().map(|p| p.id).collect(),
            produced: produced_count,
            excess,
        }
    }

    /// Converge the per-species counts on `target`.
    ///
    /// Surplus particles are taken from the tail of their species, re-tagged
    /// in place to fill deficits, and only then are new cells allocated. Any
    /// surplus left over is dropped. Finally every particle whose resting
    /// colour changed is recoloured.
    pub fn update_particles(
        &mut self,
        target: SpeciesCounts,
        colors: &SpeciesColors,
        options: &UpdateOptions,
    ) -> ReconcileReport {
        let now = self.now_ms();
        let reconcile_ms = self.config.reconcile_transition_ms;
        let before = self.counts();
        let mut report = ReconcileReport::default();

        // 1. Pull surplus off the tail of each species.
        let mut removed_ids = HashSet::new();
        let mut pool = VecDeque::new();
        for species in Species::ALL {
            let (have, want) = (before.get(species), target.get(species));
            if have <= want {
                continue;
            }
            let excess = (have - want) as usize;
            let of_species: Vec<&Particle> = self.particles.iter().filter(|p| p.species == species).collect();
            for particle in &of_species[of_species.len() - excess..] {
                removed_ids.insert(particle.id);
                pool.push_back((*particle).clone());
            }
        }
        self.particles.retain(|p| !removed_ids.contains(&p.id));
        report.removed = pool.len();

        // 2 + 3. Fill deficits from the pool, then from new cells.
        let mut fresh: HashSet<ParticleId> = HashSet::new();
        for species in Species::ALL {
            let (have, want) = (before.get(species), target.get(species));
            if want <= have {
                continue;
            }
            let mut deficit = (want - have) as usize;
            let color = colors.get(species);
            let stagger = options.stagger_ms.get(&species).copied().unwrap_or(self.config.stagger_ms);

            let mut retagged = Vec::new();
            while deficit > 0 {
                let Some(old) = pool.pop_front() else { break };
                let id = self.create_particle_at(
                    old.position,
                    species,
                    &old.display_color,
                    color,
                    Some((reconcile_ms, retagged.len() as u64 * stagger)),
                    now,
                );
                retagged.push(id);
                deficit -= 1;
            }
            report.reused += retagged.len();
            fresh.extend(retagged.iter().copied());
            self.scheduler.schedule(now, retagged, color);

            if deficit == 0 {
                continue;
            }
            let initial = options.initial_colors.get(&species).map(String::as_str);
            let skip_fade = options.skip_fade_in.contains(&species);
            let created = if initial.is_some_and(|c| c != color) || skip_fade {
                let from = initial.unwrap_or(color);
                let created_at = if skip_fade {
                    now.saturating_sub(self.config.skip_fade_backdate_ms)
                } else {
                    now
                };
                let cells = self
                    .grid
                    .random_available_positions(deficit, &[], self.effective_rows);
                let mut ids = Vec::with_capacity(cells.len());
                for (i, position) in cells.into_iter().enumerate() {
                    let transition = (from != color).then_some((reconcile_ms, i as u64 * stagger));
                    ids.push(self.create_particle_at(position, species, from, color, transition, created_at));
                }
                let created = ids.len();
                fresh.extend(ids.iter().copied());
                if from != color {
                    let delay = options.transition_delay_ms.get(&species).copied().unwrap_or(0);
                    self.scheduler.schedule(now + delay, ids, color);
                }
                created
            } else {
                let ids = self.place_new(species, deficit, color, &DirectOptions::default(), now);
                fresh.extend(ids.iter().copied());
                ids.len()
            };
            if created < deficit {
                log::warn!(
                    "grid full: placed {} of {} {} particles",
                    created,
                    deficit,
                    species
                );
            }
            report.created += created;
        }

        // 4. Whatever surplus nobody needed leaves the beaker.
        for old in pool {
            self.grid.release(old.position);
            report.released += 1;
        }

        // 5. Recolour older particles not showing their resting colour.
        for species in Species::ALL {
            let color = colors.get(species);
            let stagger = options.stagger_ms.get(&species).copied().unwrap_or(self.config.stagger_ms);
            let mut ids = Vec::new();
            for (index, particle) in self
                .particles
                .iter_mut()
                .filter(|p| p.species == species && !fresh.contains(&p.id))
                .enumerate()
            {
                if particle.display_color == color {
                    continue;
                }
                if particle.target_color != color {
                    particle.target_color = color.to_string();
                    particle.transition_ms = Some(reconcile_ms);
                    particle.transition_delay_ms = Some(index as u64 * stagger);
                }
                ids.push(particle.id);
            }
            report.restyled += ids.len();
            self.scheduler.schedule(now, ids, color);
        }

        log::debug!("reconciled beaker to {:?}: {:?}", target, report);
        self.notify();
        report
    }

    /// Borrow the current particles.
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// Copy of the current particles.
    pub fn get_particles(&self) -> Vec<Particle> {
        self.particles.clone()
    }

    pub fn counts(&self) -> SpeciesCounts {
        let mut counts = SpeciesCounts::ZERO;
        for particle in &self.particles {
            counts.set(particle.species, counts.get(particle.species) + 1);
        }
        counts
    }

    /// Listen for particle changes.
    pub fn subscribe(&self, listener: impl FnMut(&[Particle]) + 'static) -> Subscription {
        self.listeners.subscribe(listener)
    }

    /// Apply every scheduled colour change that is due. Returns whether
    /// anything visible changed; listeners are notified once if so.
    pub fn run_due_transitions(&mut self) -> bool {
        let due = self.scheduler.drain_due(self.now_ms());
        if due.is_empty() {
            return false;
        }
        let mut changed = false;
        for entry in due {
            let ids: HashSet<ParticleId> = entry.ids.into_iter().collect();
            for particle in self.particles.iter_mut().filter(|p| ids.contains(&p.id)) {
                if particle.display_color != entry.color {
                    particle.display_color = entry.color.clone();
                    changed = true;
                }
                particle.target_color = entry.color.clone();
            }
        }
        if changed {
            self.notify();
        }
        changed
    }

    pub fn pending_transitions(&self) -> usize {
        self.scheduler.len()
    }

    pub fn next_transition_at(&self) -> Option<u64> {
        self.scheduler.next_fire_at()
    }

    pub fn grid(&self) -> &ParticleGrid {
        &self.grid
    }

    fn notify(&self) {
        self.listeners.notify(&self.particles);
    }

    fn allocate_id(&mut self) -> ParticleId {
        let id = ParticleId(self.next_id);
        self.next_id += 1;
        id
    }

    fn create_particle_at(
        &mut self,
        position: GridPosition,
        species: Species,
        initial_color: &str,
        target_color: &str,
        transition: Option<(u64, u64)>,
        created_at: u64,
    ) -> ParticleId {
        let id = self.allocate_id();
        self.grid.occupy(position);
        self.particles.push(Particle {
            id,
            species,
            position,
            display_color: initial_color.to_string(),
            target_color: target_color.to_string(),
            created_at,
            transition_ms: transition.map(|(ms, _)| ms),
            transition_delay_ms: transition.map(|(_, delay)| delay),
        });
        id
    }

    /// Place up to `count` new particles without notifying.
    fn place_new(
        &mut self,
        species: Species,
        count: usize,
        color: &str,
        options: &DirectOptions,
        now: u64,
    ) -> Vec<ParticleId> {
        let cells = self
            .grid
            .random_available_positions(count, &[], self.effective_rows);
        let animate = options
            .initial_color
            .as_deref()
            .filter(|initial| *initial != color)
            .zip(options.transition_ms);

        let mut ids = Vec::with_capacity(cells.len());
        for (i, position) in cells.into_iter().enumerate() {
            let id = match animate {
                Some((initial, ms)) => self.create_particle_at(
                    position,
                    species,
                    initial,
                    color,
                    Some((ms, i as u64 * options.stagger_ms)),
                    now,
                ),
                None => self.create_particle_at(position, species, color, color, None, now),
            };
            ids.push(id);
        }
        if animate.is_some() {
            self.scheduler.schedule(now, ids.clone(), color);
        }
        ids
    }
}

impl Default for ReactingBeakerModel {
    fn default() -> Self {
        Self::with_defaults()
    }
}
