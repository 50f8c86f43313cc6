//! Acid-Base Headless Lesson Harness
//!
//! Plays the bundled lesson scripts through a full lesson session.
//! Runs entirely in-process with a manual clock and row-major placement,
//! so every run is deterministic. Nothing is rendered.
//!
//! Usage:
//!   cargo run -p acidbase-simtest
//!   cargo run -p acidbase-simtest -- --verbose

use std::collections::HashSet;
use std::rc::Rc;

use acidbase_core::clock::ManualClock;
use acidbase_core::config::EngineConfig;
use acidbase_core::grid::RowMajorPicker;
use acidbase_core::guide::Navigation;
use acidbase_core::lessons::{self, LESSON_IDS};
use acidbase_core::LessonSession;
use acidbase_logic::chemistry::{ChemistryEngine, StandardChemistry, TitrationInput};
use acidbase_logic::constants::lesson::NEUTRAL_PH;
use acidbase_logic::lesson::{LessonScript, SimulationPhase};
use acidbase_logic::species::SpeciesCounts;
use acidbase_logic::substances::{self, SubstanceType};
use env_logger::Env;

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

fn check(name: &str, passed: bool, detail: impl Into<String>) -> TestResult {
    TestResult {
        name: name.into(),
        passed,
        detail: detail.into(),
    }
}

fn main() {
    let verbose = std::env::args().any(|a| a == "--verbose");
    env_logger::Builder::from_env(Env::default().default_filter_or(if verbose { "debug" } else { "info" }))
        .init();
    println!("=== Acid-Base Lesson Harness ===\n");

    let mut results = Vec::new();

    // 1. Lesson script validation
    results.extend(validate_lesson_scripts(verbose));

    // 2. Substance catalog & chemistry
    results.extend(validate_chemistry(verbose));

    // 3. Introduction playthrough
    results.extend(play_introduction(verbose));

    // 4. Buffers playthrough
    results.extend(play_buffers(verbose));

    // 5. Titration playthrough
    results.extend(play_titration(verbose));

    // 6. Save & resume
    results.extend(validate_save_resume(verbose));

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed, total, failed
    );

    if failed > 0 {
        std::process::exit(1);
    }
}

// ── Session helpers ─────────────────────────────────────────────────────

fn session_for(lesson_id: &str) -> Result<(LessonSession, ManualClock), String> {
    let script = match lessons::by_id(lesson_id) {
        Some(Ok(script)) => script,
        Some(Err(e)) => return Err(format!("{}: {}", lesson_id, e)),
        None => return Err(format!("no bundled lesson '{}'", lesson_id)),
    };
    let clock = ManualClock::new(0);
    let session = LessonSession::with_parts(
        script,
        EngineConfig::default(),
        Rc::new(clock.clone()),
        Box::new(RowMajorPicker),
    );
    Ok((session, clock))
}

/// Press next until `step_id` is current. Bounded by the lesson length.
fn advance_to(session: &mut LessonSession, step_id: &str) -> bool {
    for _ in 0..session.sequencer().len() {
        if session.current_step_id() == step_id {
            return true;
        }
        session.next();
    }
    session.current_step_id() == step_id
}

/// No two particles share a cell and every particle sits inside the grid.
fn grid_is_consistent(session: &LessonSession) -> bool {
    let beaker = session.simulation().beaker();
    let config = &beaker.config().grid;
    let mut seen = HashSet::new();
    session.particles().iter().all(|p| {
        p.position.col < config.columns && p.position.row < config.rows_max && seen.insert(p.position)
    }) && beaker.grid().occupied_count() == session.particles().len()
}

fn print_view(session: &LessonSession) {
    match serde_json::to_string_pretty(&session.view().simulation) {
        Ok(json) => println!("{}", json),
        Err(e) => println!("  (view not serializable: {})", e),
    }
}

// ── 1. Lesson Scripts ───────────────────────────────────────────────────

fn validate_lesson_scripts(verbose: bool) -> Vec<TestResult> {
    println!("--- Lesson Scripts ---");
    let mut results = Vec::new();

    let raw_sources = [
        ("introduction", lessons::INTRODUCTION_JSON),
        ("buffers", lessons::BUFFERS_JSON),
        ("titration", lessons::TITRATION_JSON),
    ];

    for (id, json) in raw_sources {
        let script = match LessonScript::from_json(json) {
            Ok(script) => script,
            Err(e) => {
                results.push(check(&format!("{}_parse", id), false, format!("{}", e)));
                continue;
            }
        };
        results.push(check(
            &format!("{}_parse", id),
            script.id == id,
            format!("'{}' with {} steps", script.title, script.len()),
        ));

        // Every raw step survives parsing
        let raw_steps = serde_json::from_str::<serde_json::Value>(json)
            .ok()
            .and_then(|v| v.get("steps").and_then(|s| s.as_array()).map(|s| s.len()));
        results.push(check(
            &format!("{}_step_count", id),
            raw_steps == Some(script.len()),
            format!("raw={:?} parsed={}", raw_steps, script.len()),
        ));

        // Loops land on checkpoints
        let bad_targets: Vec<_> = script
            .steps
            .iter()
            .filter_map(|s| s.back_target.as_deref())
            .filter(|target| !script.step(target).is_some_and(|t| t.checkpoint))
            .collect();
        results.push(check(
            &format!("{}_back_targets", id),
            bad_targets.is_empty(),
            if bad_targets.is_empty() {
                "all back targets capture snapshots".to_string()
            } else {
                format!("targets without checkpoint: {}", bad_targets.join(", "))
            },
        ));

        results.push(check(
            &format!("{}_completion_route", id),
            script.completion_route.is_some(),
            format!("{:?}", script.completion_route),
        ));

        if verbose {
            let checkpoints: Vec<_> = script.checkpoint_ids().collect();
            println!("  {}: checkpoints {}", id, checkpoints.join(", "));
        }
    }

    results.push(check(
        "lesson_ids_resolve",
        LESSON_IDS.iter().all(|id| matches!(lessons::by_id(id), Some(Ok(_)))),
        format!("{} bundled lessons", LESSON_IDS.len()),
    ));

    results
}

// ── 2. Chemistry ────────────────────────────────────────────────────────

fn validate_chemistry(verbose: bool) -> Vec<TestResult> {
    println!("--- Substance Catalog & Chemistry ---");
    let mut results = Vec::new();
    let chem = StandardChemistry::new();
    let catalog = substances::catalog();

    // Each section has something to choose
    let empty_types: Vec<_> = [
        SubstanceType::StrongAcid,
        SubstanceType::StrongBase,
        SubstanceType::WeakAcid,
        SubstanceType::WeakBase,
    ]
    .into_iter()
    .filter(|t| substances::by_type(*t).is_empty())
    .collect();
    results.push(check(
        "catalog_covers_types",
        empty_types.is_empty(),
        format!("{} substances, empty types: {:?}", catalog.len(), empty_types),
    ));

    // pH sits on the right side of neutral
    let wrong_side: Vec<_> = catalog
        .iter()
        .filter(|s| {
            let ph = chem.ph(s, 0.1);
            if s.is_acid() {
                ph >= NEUTRAL_PH
            } else {
                ph <= NEUTRAL_PH
            }
        })
        .map(|s| s.id.as_str())
        .collect();
    results.push(check(
        "ph_side_of_neutral",
        wrong_side.is_empty(),
        if wrong_side.is_empty() {
            "acids below 7, bases above".to_string()
        } else {
            format!("wrong side: {}", wrong_side.join(", "))
        },
    ));

    // Strong substances move pH further than weak ones
    let strongest_weak_acid = substances::by_type(SubstanceType::WeakAcid)
        .iter()
        .map(|s| chem.ph(s, 0.1))
        .fold(f64::INFINITY, f64::min);
    let weakest_strong_acid = substances::by_type(SubstanceType::StrongAcid)
        .iter()
        .map(|s| chem.ph(s, 0.1))
        .fold(f64::NEG_INFINITY, f64::max);
    results.push(check(
        "strong_acid_below_weak",
        weakest_strong_acid < strongest_weak_acid,
        format!("strong ≤ {:.2}, weak ≥ {:.2}", weakest_strong_acid, strongest_weak_acid),
    ));

    // Particle counts conserve what was added
    let leaky: Vec<_> = catalog
        .iter()
        .filter(|s| {
            [1u32, 20, 44, 64].iter().any(|&n| {
                let c = chem.species_counts(s, 0.1, n);
                c.substance + c.primary != n || c.primary != c.secondary
            })
        })
        .map(|s| s.id.as_str())
        .collect();
    results.push(check(
        "species_counts_conserve",
        leaky.is_empty(),
        if leaky.is_empty() {
            "every substance conserves its particles".to_string()
        } else {
            format!("leaks: {}", leaky.join(", "))
        },
    ));

    // Titration curves never fall
    let mut curve_failures = Vec::new();
    for substance in catalog.iter().filter(|s| s.is_acid()) {
        let base = TitrationInput {
            analyte_molarity: 0.1,
            analyte_volume: 0.05,
            titrant_molarity: 0.1,
            titrant_volume: 0.0,
        };
        let equivalence = base.equivalence_volume();
        let curve: Vec<f64> = (0..=40)
            .map(|i| {
                let input = TitrationInput {
                    titrant_volume: equivalence * i as f64 / 20.0,
                    ..base
                };
                chem.titration_ph(substance, &input)
            })
            .collect();
        if curve.windows(2).any(|w| w[1] < w[0]) {
            curve_failures.push(substance.id.clone());
        }
        if verbose {
            println!(
                "  {}: start {:.2}, equivalence {:.2}, end {:.2}",
                substance.id, curve[0], curve[20], curve[40]
            );
        }
    }
    results.push(check(
        "titration_curves_monotone",
        curve_failures.is_empty(),
        if curve_failures.is_empty() {
            "pH rises through equivalence".to_string()
        } else {
            format!("falls for: {}", curve_failures.join(", "))
        },
    ));

    results
}

// ── 3. Introduction ─────────────────────────────────────────────────────

fn play_introduction(verbose: bool) -> Vec<TestResult> {
    println!("--- Introduction Lesson ---");
    let mut results = Vec::new();
    let (mut session, clock) = match session_for("introduction") {
        Ok(parts) => parts,
        Err(e) => return vec![check("intro_load", false, e)],
    };

    clock.advance(6_000);
    let timed = session.tick();
    results.push(check(
        "intro_welcome_timer",
        matches!(timed, Some(Navigation::Advanced { .. })) && session.current_step_id() == "chooseStrongAcid",
        format!("after 6s: {}", session.current_step_id()),
    ));

    session.choose_substance("hydrogenChloride");
    advance_to(&mut session, "addStrongAcid");
    let accepted = session.add_substance(20);
    session.next();
    let counts = session.simulation().beaker().counts();
    results.push(check(
        "intro_strong_acid_dissociates",
        accepted == 20 && counts == SpeciesCounts::new(0, 20, 20),
        format!("{} added, counts {:?}", accepted, counts),
    ));
    results.push(check(
        "intro_strong_acid_ph",
        session.simulation().ph() < 2.0,
        format!("pH {:.2}", session.simulation().ph()),
    ));

    advance_to(&mut session, "chooseWeakAcid");
    session.choose_substance("aceticAcid");
    session.next();
    let max = session.simulation().max_substance();
    let accepted = session.add_substance(max + 50);
    results.push(check(
        "intro_weak_acid_fills_and_advances",
        accepted == max && session.current_step_id() == "weakAcidEquilibrium",
        format!("{}/{} accepted, now at {}", accepted, max, session.current_step_id()),
    ));
    results.push(check("intro_grid_consistent", grid_is_consistent(&session), "no shared cells"));

    let nav = session.back();
    results.push(check(
        "intro_back_restores",
        matches!(nav, Navigation::Retreated { restored: true, .. }) && session.particles().is_empty(),
        format!("{} particles after back", session.particles().len()),
    ));

    if verbose {
        print_view(&session);
    }
    results
}

// ── 4. Buffers ──────────────────────────────────────────────────────────

fn play_buffers(verbose: bool) -> Vec<TestResult> {
    println!("--- Buffers Lesson ---");
    let mut results = Vec::new();
    let (mut session, _clock) = match session_for("buffers") {
        Ok(parts) => parts,
        Err(e) => return vec![check("buffers_load", false, e)],
    };

    advance_to(&mut session, "chooseWeakAcid");
    session.choose_substance("aceticAcid");
    session.next();
    session.add_substance(20);
    advance_to(&mut session, "instructToAddSalt");
    for _ in 0..5 {
        session.add_salt(1);
    }
    let counts = session.simulation().beaker().counts();
    results.push(check(
        "buffers_salt_forms_buffer",
        session.current_step_id() == "acidBufferFormed"
            && session.simulation().params().phase == SimulationPhase::SaltAdded,
        format!("at {} with {:?}", session.current_step_id(), counts),
    ));

    session.next();
    let budget = session.simulation().params().strong_max;
    results.push(check(
        "buffers_strong_budget",
        budget > 0,
        format!("strong budget {}", budget),
    ));

    let ph_before = session.simulation().ph();
    let accepted = session.add_strong_substance(budget + 10);
    let counts = session.simulation().beaker().counts();
    results.push(check(
        "buffers_acid_limit",
        accepted == budget && session.current_step_id() == "acidBufferLimitReached",
        format!("{} accepted, {:?}, at {}", accepted, counts, session.current_step_id()),
    ));
    results.push(check(
        "buffers_ph_drops_with_strong_acid",
        session.simulation().ph() < ph_before,
        format!("{:.2} → {:.2}", ph_before, session.simulation().ph()),
    ));
    results.push(check("buffers_grid_consistent", grid_is_consistent(&session), "no shared cells"));

    advance_to(&mut session, "chooseWeakBase");
    session.next();
    let chosen = session.simulation().substance().map(|s| s.id.clone());
    session.add_substance(20);
    advance_to(&mut session, "instructToAddBaseSalt");
    session.add_salt(5);
    results.push(check(
        "buffers_base_section_cascades",
        chosen.as_deref() == Some("ammonia") && session.current_step_id() == "instructToAddStrongBase",
        format!("default {:?}, at {}", chosen, session.current_step_id()),
    ));

    let budget = session.simulation().params().strong_max;
    session.add_strong_substance(budget);
    advance_to(&mut session, "buffersComplete");
    let nav = session.next();
    results.push(check(
        "buffers_completes",
        matches!(&nav, Navigation::Completed { route: Some(r) } if r == "/acids-bases/titration"),
        format!("{:?}", nav),
    ));

    if verbose {
        print_view(&session);
    }
    results
}

// ── 5. Titration ────────────────────────────────────────────────────────

fn play_titration(verbose: bool) -> Vec<TestResult> {
    println!("--- Titration Lesson ---");
    let mut results = Vec::new();
    let (mut session, _clock) = match session_for("titration") {
        Ok(parts) => parts,
        Err(e) => return vec![check("titration_load", false, e)],
    };

    advance_to(&mut session, "chooseStrongAcid");
    session.choose_substance("hydrogenChloride");
    session.next();
    session.add_substance(20);
    session.next();
    session.add_indicator(10);
    let params = session.simulation().params();
    results.push(check(
        "titration_indicator_fills",
        session.current_step_id() == "startTitration" && params.indicator_added > 0,
        format!("{} drops, at {}", params.indicator_added, session.current_step_id()),
    ));

    let start_ph = session.simulation().ph();
    let capacity = session.simulation().params().max_pre_ep_titrant;
    session.add_titrant(capacity + 5);
    let ep_ph = session.simulation().ph();
    results.push(check(
        "titration_reaches_equivalence",
        session.current_step_id() == "equivalencePoint" && (ep_ph - NEUTRAL_PH).abs() < 1e-6,
        format!("pH {:.2} → {:.2} after {} titrant", start_ph, ep_ph, capacity),
    ));

    session.next();
    session.add_titrant(100);
    results.push(check(
        "titration_post_ep_basic",
        session.current_step_id() == "strongTitrationDone" && session.simulation().ph() > NEUTRAL_PH,
        format!("pH {:.2} at {}", session.simulation().ph(), session.current_step_id()),
    ));
    results.push(check("titration_grid_consistent", grid_is_consistent(&session), "no shared cells"));

    advance_to(&mut session, "chooseWeakAcid");
    session.choose_substance("aceticAcid");
    session.next();
    session.add_substance(20);
    advance_to(&mut session, "startWeakTitration");
    session.add_titrant(5);
    session.next();
    let pending = session.simulation().params().post_ep_pending;
    let capacity = session.simulation().params().max_pre_ep_titrant;
    session.add_titrant(capacity);
    let phase = session.simulation().params().phase;
    results.push(check(
        "titration_weak_waits_for_equivalence",
        pending && phase == SimulationPhase::PostEquivalence,
        format!("pending={} then phase {:?}", pending, phase),
    ));

    session.add_titrant(100);
    advance_to(&mut session, "titrationComplete");
    let nav = session.next();
    results.push(check(
        "titration_completes",
        matches!(&nav, Navigation::Completed { route: Some(r) } if r == "/acids-bases/finished"),
        format!("{:?}", nav),
    ));

    if verbose {
        print_view(&session);
    }
    results
}

// ── 6. Save & Resume ────────────────────────────────────────────────────

fn validate_save_resume(_verbose: bool) -> Vec<TestResult> {
    println!("--- Save & Resume ---");
    let mut results = Vec::new();
    let ((mut original, _), (mut resumed, _)) = match (session_for("buffers"), session_for("buffers")) {
        (Ok(a), Ok(b)) => (a, b),
        (Err(e), _) | (_, Err(e)) => return vec![check("save_load_sessions", false, e)],
    };

    advance_to(&mut original, "chooseWeakAcid");
    original.choose_substance("hydrogenFluoride");
    original.next();
    original.add_substance(20);
    advance_to(&mut original, "instructToAddSalt");
    original.add_salt(2);

    let mut bytes = Vec::new();
    if let Err(e) = original.save(&mut bytes) {
        return vec![check("save_session", false, format!("{}", e))];
    }
    results.push(check("save_session", !bytes.is_empty(), format!("{} bytes", bytes.len())));

    let loaded = resumed.load(bytes.as_slice());
    results.push(check(
        "resume_matches",
        loaded.is_ok()
            && resumed.current_step_id() == original.current_step_id()
            && resumed.simulation().params() == original.simulation().params()
            && resumed.particles() == original.particles(),
        format!("{:?} at {}", loaded.err().map(|e| e.to_string()), resumed.current_step_id()),
    ));

    resumed.add_salt(3);
    results.push(check(
        "resume_continues",
        resumed.current_step_id() == "acidBufferFormed",
        format!("at {}", resumed.current_step_id()),
    ));

    let (mut foreign, _) = match session_for("titration") {
        Ok(parts) => parts,
        Err(e) => return vec![check("save_load_sessions", false, e)],
    };
    results.push(check(
        "resume_rejects_other_lesson",
        foreign.load(bytes.as_slice()).is_err(),
        "buffers save refused by titration",
    ));

    results
}
