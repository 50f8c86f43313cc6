//! Integration tests for the reacting beaker: grid occupancy, reconciliation,
//! reactions, deferred colour transitions and the redraw loop.
//!
//! Placement is deterministic (row-major or seeded) and time is driven by a
//! manual clock, so every assertion is exact.

use std::cell::Cell;
use std::collections::HashSet;
use std::rc::Rc;

use acidbase_core::beaker::{DirectOptions, ReactingBeakerModel, ReactionColors, ReactionRule, UpdateOptions};
use acidbase_core::clock::{Clock, ManualClock};
use acidbase_core::config::{BeakerConfig, ProjectorConfig};
use acidbase_core::grid::{GridPosition, PositionPicker, RandomPicker, RowMajorPicker};
use acidbase_core::particle::{Particle, ParticleId};
use acidbase_core::projector::RedrawLoop;
use acidbase_logic::species::{Species, SpeciesColors, SpeciesCounts};
use approx::assert_relative_eq;

const EXCESS: &str = "#ADD8E6";

// ── Helpers ────────────────────────────────────────────────────────────

fn beaker_with(picker: Box<dyn PositionPicker>) -> (ReactingBeakerModel, ManualClock) {
    let clock = ManualClock::new(50_000);
    let model = ReactingBeakerModel::new(BeakerConfig::default(), Rc::new(clock.clone()), picker);
    (model, clock)
}

fn beaker() -> (ReactingBeakerModel, ManualClock) {
    beaker_with(Box::new(RowMajorPicker))
}

fn palette() -> SpeciesColors {
    SpeciesColors::new("#A2C4C9", "#E06666", "#8E7CC3")
}

fn positions(particles: &[Particle]) -> HashSet<GridPosition> {
    particles.iter().map(|p| p.position).collect()
}

fn assert_grid_consistent(model: &ReactingBeakerModel) {
    let particles = model.particles();
    assert_eq!(
        positions(particles).len(),
        particles.len(),
        "two particles share a cell"
    );
    assert_eq!(model.grid().occupied_count(), particles.len());
    for particle in particles {
        assert!(model.grid().is_occupied(particle.position));
    }
}

// ── End-to-end scenario ────────────────────────────────────────────────

#[test]
fn twenty_substance_particles_split_into_ten_five_five() {
    for picker in [
        Box::new(RowMajorPicker) as Box<dyn PositionPicker>,
        Box::new(RandomPicker::seeded(7)) as Box<dyn PositionPicker>,
    ] {
        let (mut model, _clock) = beaker_with(picker);
        assert_eq!(model.effective_rows(), 11);

        let placed = model.add_directly(Species::Substance, 20, EXCESS, &DirectOptions::default());
        assert_eq!(placed, 20);
        let before = model.get_particles();
        assert!(before.iter().all(|p| p.species == Species::Substance));
        assert!(before.iter().all(|p| p.display_color == EXCESS));
        assert!(before.iter().all(|p| p.position.row < 11 && p.position.col < 12));
        assert_eq!(positions(&before).len(), 20);

        model.update_particles(SpeciesCounts::new(10, 5, 5), &palette(), &UpdateOptions::new());
        assert_eq!(model.counts(), SpeciesCounts::new(10, 5, 5));
        assert_eq!(model.particles().len(), 20);

        let kept = positions(model.particles())
            .intersection(&positions(&before))
            .count();
        assert!(kept >= 10, "only {} cells survived", kept);
        assert_grid_consistent(&model);
    }
}

// ── Grid uniqueness ────────────────────────────────────────────────────

#[test]
fn mixed_operations_never_share_a_cell() {
    let (mut model, clock) = beaker_with(Box::new(RandomPicker::seeded(2024)));
    let colors = palette();
    let rule = ReactionRule {
        reactant: Species::PrimaryIon,
        reacting_with: Species::SecondaryIon,
        producing: Species::Substance,
    };
    let reaction_colors = ReactionColors {
        reactant: colors.primary_ion.clone(),
        produced: colors.substance.clone(),
    };

    let targets = [
        SpeciesCounts::new(20, 0, 0),
        SpeciesCounts::new(10, 10, 10),
        SpeciesCounts::new(15, 5, 15),
        SpeciesCounts::new(3, 1, 40),
        SpeciesCounts::new(30, 30, 30),
        SpeciesCounts::new(0, 0, 0),
        SpeciesCounts::new(8, 2, 6),
    ];
    for (round, target) in targets.into_iter().enumerate() {
        model.update_particles(target, &colors, &UpdateOptions::new());
        assert_eq!(model.counts(), target, "round {}", round);
        assert_grid_consistent(&model);

        model.add_with_reaction(rule, 3, &reaction_colors);
        assert_grid_consistent(&model);

        model.set_water_level((round as f64) / 6.0);
        clock.advance(500);
        model.run_due_transitions();
        assert_grid_consistent(&model);
    }
}

#[test]
fn grid_exhaustion_returns_short_without_duplicates() {
    let (mut model, _clock) = beaker();
    model.set_water_level(0.0);
    // 12 columns × 6 rows.
    let placed = model.add_directly(Species::Substance, 100, EXCESS, &DirectOptions::default());
    assert_eq!(placed, 72);
    assert_eq!(model.add_directly(Species::PrimaryIon, 5, EXCESS, &DirectOptions::default()), 0);

    let report = model.update_particles(SpeciesCounts::new(72, 10, 0), &palette(), &UpdateOptions::new());
    assert_eq!(report.created, 0);
    assert_eq!(model.counts(), SpeciesCounts::new(72, 0, 0));
    assert_grid_consistent(&model);
}

// ── Reconciliation ─────────────────────────────────────────────────────

#[test]
fn reconcile_converges_from_any_state() {
    let (mut model, _clock) = beaker_with(Box::new(RandomPicker::seeded(11)));
    let colors = palette();
    model.add_directly(Species::SecondaryIon, 17, EXCESS, &DirectOptions::default());
    model.add_directly(Species::Substance, 4, EXCESS, &DirectOptions::default());

    for target in [
        SpeciesCounts::new(0, 12, 3),
        SpeciesCounts::new(25, 0, 0),
        SpeciesCounts::new(1, 1, 1),
    ] {
        model.update_particles(target, &colors, &UpdateOptions::new());
        assert_eq!(model.counts(), target);
    }
}

#[test]
fn second_reconcile_with_same_target_changes_nothing() {
    let (mut model, clock) = beaker();
    let colors = palette();
    model.add_directly(Species::Substance, 20, EXCESS, &DirectOptions::default());

    let first = model.update_particles(SpeciesCounts::new(6, 7, 7), &colors, &UpdateOptions::new());
    assert!(first.churned());
    clock.advance(1);
    model.run_due_transitions();
    let snapshot = model.get_particles();

    let second = model.update_particles(SpeciesCounts::new(6, 7, 7), &colors, &UpdateOptions::new());
    assert!(!second.churned());
    assert_eq!(second.removed, 0);
    assert_eq!(second.restyled, 0);
    assert_eq!(model.particles(), snapshot.as_slice());
}

#[test]
fn shifted_counts_reuse_existing_cells() {
    let (mut model, _clock) = beaker_with(Box::new(RandomPicker::seeded(99)));
    let colors = palette();
    model.update_particles(SpeciesCounts::new(12, 0, 0), &colors, &UpdateOptions::new());
    let before = positions(model.particles());

    // Eight substance particles turn into primary ions.
    let report = model.update_particles(SpeciesCounts::new(4, 8, 0), &colors, &UpdateOptions::new());
    assert_eq!(report.reused, 8);
    assert_eq!(report.created, 0);
    assert_eq!(report.released, 0);
    assert_eq!(positions(model.particles()), before);

    // Retagged particles start from their old colour and settle later.
    let primaries: Vec<&Particle> = model
        .particles()
        .iter()
        .filter(|p| p.species == Species::PrimaryIon)
        .collect();
    assert_eq!(primaries.len(), 8);
    assert!(primaries
        .iter()
        .all(|p| p.display_color == colors.substance && p.target_color == colors.primary_ion));
}

#[test]
fn shrinking_releases_cells_for_reuse() {
    let (mut model, _clock) = beaker();
    let colors = palette();
    model.update_particles(SpeciesCounts::new(30, 0, 0), &colors, &UpdateOptions::new());
    let report = model.update_particles(SpeciesCounts::new(10, 0, 0), &colors, &UpdateOptions::new());
    assert_eq!(report.released, 20);
    assert_eq!(model.grid().occupied_count(), 10);

    model.update_particles(SpeciesCounts::new(10, 0, 20), &colors, &UpdateOptions::new());
    assert_eq!(model.counts(), SpeciesCounts::new(10, 0, 20));
    assert_grid_consistent(&model);
}

// ── Effective rows ─────────────────────────────────────────────────────

#[test]
fn water_level_outside_unit_range_clamps_rows() {
    let (mut model, _clock) = beaker();
    for (fraction, rows) in [(-3.0, 6), (0.0, 6), (1.0, 16), (7.5, 16), (f64::NAN, 6)] {
        model.set_water_level(fraction);
        assert_eq!(model.effective_rows(), rows, "fraction {}", fraction);
    }
}

#[test]
fn rows_round_up_only_past_threshold() {
    let (mut model, _clock) = beaker();
    // 6 + 10 × fraction rows; remainders of .35 and .45 either side of 0.4.
    model.set_water_level(0.035);
    assert_eq!(model.effective_rows(), 6);
    model.set_water_level(0.045);
    assert_eq!(model.effective_rows(), 7);
    model.set_water_level(0.535);
    assert_eq!(model.effective_rows(), 11);
    model.set_water_level(0.545);
    assert_eq!(model.effective_rows(), 12);
}

#[test]
fn new_particles_respect_effective_rows() {
    let (mut model, _clock) = beaker_with(Box::new(RandomPicker::seeded(5)));
    model.set_water_level(0.0);
    model.add_directly(Species::Substance, 40, EXCESS, &DirectOptions::default());
    assert!(model.particles().iter().all(|p| p.position.row < 6));

    // Lowering the water does not move particles already placed higher.
    model.set_water_level(1.0);
    model.add_directly(Species::PrimaryIon, 60, EXCESS, &DirectOptions::default());
    let high = model.particles().iter().filter(|p| p.position.row >= 6).count();
    assert!(high > 0);
    model.set_water_level(0.0);
    assert_eq!(
        model.particles().iter().filter(|p| p.position.row >= 6).count(),
        high
    );
}

// ── Reactions ──────────────────────────────────────────────────────────

#[test]
fn reaction_consumes_the_most_recent_partners() {
    let (mut model, _clock) = beaker();
    let colors = palette();
    model.add_directly(Species::SecondaryIon, 4, &colors.secondary_ion, &DirectOptions::default());
    model.add_directly(Species::Substance, 3, &colors.substance, &DirectOptions::default());
    model.add_directly(Species::SecondaryIon, 4, &colors.secondary_ion, &DirectOptions::default());

    let insertion_order: Vec<ParticleId> = model
        .particles()
        .iter()
        .filter(|p| p.species == Species::SecondaryIon)
        .map(|p| p.id)
        .collect();

    let rule = ReactionRule {
        reactant: Species::PrimaryIon,
        reacting_with: Species::SecondaryIon,
        producing: Species::Substance,
    };
    let outcome = model.add_with_reaction(
        rule,
        5,
        &ReactionColors {
            reactant: colors.primary_ion.clone(),
            produced: colors.substance.clone(),
        },
    );

    let consumed: HashSet<ParticleId> = outcome.consumed.iter().copied().collect();
    let expected: HashSet<ParticleId> = insertion_order[3..].iter().copied().collect();
    assert_eq!(consumed, expected);
    assert_eq!(outcome.excess, 0);

    let survivors: Vec<ParticleId> = model
        .particles()
        .iter()
        .filter(|p| p.species == Species::SecondaryIon)
        .map(|p| p.id)
        .collect();
    assert_eq!(survivors, insertion_order[..3].to_vec());
}

#[test]
fn reaction_beyond_partners_leaves_surplus_reactant() {
    let (mut model, _clock) = beaker();
    let colors = palette();
    model.add_directly(Species::SecondaryIon, 2, &colors.secondary_ion, &DirectOptions::default());
    let outcome = model.add_with_reaction(
        ReactionRule {
            reactant: Species::PrimaryIon,
            reacting_with: Species::SecondaryIon,
            producing: Species::Substance,
        },
        5,
        &ReactionColors {
            reactant: colors.primary_ion.clone(),
            produced: colors.substance.clone(),
        },
    );
    assert_eq!(outcome.consumed.len(), 2);
    assert_eq!(outcome.excess, 3);
    assert_eq!(model.counts().secondary, 0);
    assert_eq!(model.counts().primary, 3);
    assert!(model
        .particles()
        .iter()
        .filter(|p| p.species == Species::PrimaryIon)
        .all(|p| p.display_color == EXCESS && p.target_color == colors.primary_ion));
}

// ── Deferred colour transitions ────────────────────────────────────────

#[test]
fn delayed_transition_fires_on_the_manual_clock() {
    let (mut model, clock) = beaker();
    let colors = palette();
    let options = UpdateOptions::new()
        .initial_color(Species::SecondaryIon, EXCESS)
        .transition_delay(Species::SecondaryIon, 1_200);
    model.update_particles(SpeciesCounts::new(0, 0, 6), &colors, &options);
    assert_eq!(model.next_transition_at(), Some(51_200));

    clock.advance(1_199);
    assert!(!model.run_due_transitions());
    assert!(model.particles().iter().all(|p| p.display_color == EXCESS));

    clock.advance(1);
    assert!(model.run_due_transitions());
    assert!(model
        .particles()
        .iter()
        .all(|p| p.display_color == colors.secondary_ion));
    assert_eq!(model.pending_transitions(), 0);
}

#[test]
fn transitions_for_removed_particles_are_dropped() {
    let (mut model, clock) = beaker();
    let colors = palette();
    let options = UpdateOptions::new()
        .initial_color(Species::Substance, EXCESS)
        .transition_delay(Species::Substance, 500);
    model.update_particles(SpeciesCounts::new(5, 0, 0), &colors, &options);
    model.update_particles(SpeciesCounts::ZERO, &colors, &UpdateOptions::new());

    clock.advance(500);
    assert!(!model.run_due_transitions());
    assert!(model.particles().is_empty());
}

// ── Listeners ──────────────────────────────────────────────────────────

#[test]
fn each_mutation_notifies_listeners_once() {
    let (mut model, clock) = beaker();
    let colors = palette();
    let calls = Rc::new(Cell::new(0));
    let seen = calls.clone();
    let subscription = model.subscribe(move |_| seen.set(seen.get() + 1));

    model.add_directly(Species::Substance, 10, EXCESS, &DirectOptions::default());
    assert_eq!(calls.get(), 1);
    model.update_particles(SpeciesCounts::new(4, 3, 3), &colors, &UpdateOptions::new());
    assert_eq!(calls.get(), 2);
    clock.advance(5_000);
    model.run_due_transitions();
    assert_eq!(calls.get(), 3);

    subscription.unsubscribe();
    model.update_particles(SpeciesCounts::ZERO, &colors, &UpdateOptions::new());
    assert_eq!(calls.get(), 3);
}

// ── Redraw loop ────────────────────────────────────────────────────────

#[test]
fn redraw_loop_fades_in_new_particles_then_stops() {
    let (mut model, clock) = beaker();
    model.add_directly(Species::Substance, 3, EXCESS, &DirectOptions::default());

    let config = ProjectorConfig::default();
    let mut redraw = RedrawLoop::new(config);
    let input: Rc<[Particle]> = Rc::from(model.get_particles());
    redraw.set_input(input.clone(), clock.now_ms());
    assert!(redraw.is_running());
    assert!(redraw.current().iter().all(|d| d.opacity == 0.0));

    let halfway = clock.now_ms() + config.fade_in_ms / 2;
    let frame = redraw.frame(halfway).unwrap();
    assert!(frame.iter().all(|d| d.opacity > 0.0 && d.opacity < 1.0));

    let settled = clock.now_ms() + config.fade_in_ms;
    let frame = redraw.frame(settled).unwrap();
    for display in frame {
        assert_relative_eq!(display.opacity, 1.0);
        assert_relative_eq!(display.scale, 1.0);
    }
    assert!(!redraw.is_running());
    assert!(redraw.frame(settled + 16).is_none());

    // Handing over the same list does not restart the loop.
    redraw.set_input(input, settled + 32);
    assert!(!redraw.is_running());
}
