//! Pure lesson logic for the acid-base simulations.
//!
//! This crate holds everything that is independent of engine state:
//! functions take plain data and return results, so they are unit-testable
//! and shared between the lesson engine and the headless harness.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`beaker_math`] | Water-level slider → grid row conversions |
//! | [`chemistry`] | Chemistry engine trait, pH and species-count formulas |
//! | [`constants`] | Grid geometry, animation timings, tuned thresholds |
//! | [`lesson`] | Lesson script types, JSON parsing, validation |
//! | [`species`] | Particle species tags and per-species count/colour maps |
//! | [`statements`] | Placeholder substitution for guide statements |
//! | [`substances`] | Acid/base catalog with dissociation constants and colours |

pub mod beaker_math;
pub mod chemistry;
pub mod constants;
pub mod lesson;
pub mod species;
pub mod statements;
pub mod substances;
