//! Lesson engine for the acid-base simulations.
//!
//! A lesson screen owns one [`session::LessonSession`], which ties a guide
//! sequencer to a simulation. The simulation owns the reacting beaker, whose
//! particle list is what gets drawn.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`beaker`] | Reacting beaker model: particle list, reactions, reconciliation |
//! | [`clock`] | Wall and manual millisecond clocks |
//! | [`config`] | Tunable grid, beaker, projector and lesson settings |
//! | [`grid`] | Grid occupancy and free-cell selection |
//! | [`guide`] | Step sequencer, checkpoint snapshots, auto-advance watchers |
//! | [`lessons`] | Bundled lesson scripts |
//! | [`observe`] | Listener registry and subscriptions |
//! | [`particle`] | Canonical particle record |
//! | [`persistence`] | Save/load of a lesson session |
//! | [`projector`] | Fade-in projection and redraw loop |
//! | [`scheduler`] | Deferred colour transitions |
//! | [`session`] | Lesson session with guide-gated inputs |
//! | [`simulation`] | Simulation parameters and phase-driven reconciliation |

pub mod beaker;
pub mod clock;
pub mod config;
pub mod grid;
pub mod guide;
pub mod lessons;
pub mod observe;
pub mod particle;
pub mod persistence;
pub mod projector;
pub mod scheduler;
pub mod session;
pub mod simulation;

pub use session::LessonSession;

/// Common imports for lesson screens.
pub mod prelude {
    pub use crate::beaker::{DirectOptions, ReactingBeakerModel, ReactionColors, ReactionRule, UpdateOptions};
    pub use crate::clock::{Clock, ManualClock, SystemClock};
    pub use crate::config::{BeakerConfig, EngineConfig, GridConfig, LessonConfig, ProjectorConfig};
    pub use crate::grid::{GridPosition, PositionPicker, RandomPicker, RowMajorPicker};
    pub use crate::guide::{GuideSequencer, Navigation};
    pub use crate::particle::{Particle, ParticleId};
    pub use crate::projector::{DisplayParticle, RedrawLoop};
    pub use crate::session::{GuideView, LessonSession, SessionView};
    pub use crate::simulation::{Simulation, SimulationView};
    pub use acidbase_logic::species::{Species, SpeciesColors, SpeciesCounts};
}
