//! Tuned constants shared by the engine and the harness.
//!
//! Most of these values were tuned by eye against the reference lessons and
//! have no derivation; keep them exact.

pub mod grid {
    /// Particle columns across the beaker.
    pub const COLUMNS: u32 = 12;
    /// Rows available with the water level at its minimum.
    pub const ROWS_MIN: u32 = 6;
    /// Rows available with the water level at its maximum.
    pub const ROWS_MAX: u32 = 16;
    /// Effective rows before any water level is applied.
    pub const DEFAULT_EFFECTIVE_ROWS: u32 = 11;
    /// Fractional remainder above which the row count rounds up.
    pub const ROW_ROUND_THRESHOLD: f64 = 0.4;
}

pub mod timing {
    /// Colour transition for particles produced by a reaction.
    pub const REACTION_TRANSITION_MS: u64 = 1000;
    /// Colour transition for particles re-tagged during reconciliation.
    pub const RECONCILE_TRANSITION_MS: u64 = 800;
    /// Delay between consecutive particles of one creation batch.
    pub const STAGGER_MS: u64 = 150;
    /// How far creation is backdated when a fade-in is skipped.
    pub const SKIP_FADE_BACKDATE_MS: u64 = 1000;
    /// Fade-in window used by the animation projector.
    pub const FADE_IN_MS: u64 = 400;
    /// Scale a particle starts at when it fades in.
    pub const FADE_IN_INITIAL_SCALE: f64 = 0.8;
}

pub mod colors {
    /// Colour of reactant particles added beyond what can react.
    pub const EXCESS_REACTANT: &str = "#ADD8E6";
    /// Indicator tint once the solution turns basic.
    pub const INDICATOR_BASIC: &str = "#FF69B4";
    /// pH at which the default indicator changes colour.
    pub const INDICATOR_TRANSITION_PH: f64 = 8.2;
}

pub mod lesson {
    /// Water level a fresh sub-lesson starts from.
    pub const INITIAL_WATER_LEVEL: f64 = 0.5;
    /// Substance particles required before an add-substance step unlocks.
    pub const MIN_SUBSTANCE_PARTICLES: u32 = 20;
    /// Fraction of the strong-substance budget that triggers the mid-step narrative.
    pub const MIDPOINT_FRACTION: f64 = 0.2;
    /// Indicator drops needed to fill an indicator step.
    pub const MAX_INDICATOR: u32 = 5;
    /// Titrant that may be added after the equivalence point.
    pub const POST_EP_TITRANT_MAX: u32 = 10;
    /// Salt shakes that bring a buffer to equilibrium.
    pub const SALT_SHAKES_FOR_EQUILIBRIUM: u32 = 5;
    /// Secondary ions the buffer should end with after strong addition.
    pub const FINAL_SECONDARY_ION_COUNT: u32 = 2;
    /// Primary ions the buffer always keeps after strong addition.
    pub const MIN_FINAL_PRIMARY_ION_COUNT: u32 = 1;
    /// Substance molarity used when a lesson does not set one.
    pub const DEFAULT_MOLARITY: f64 = 0.1;
    /// Titrant molarity used when a lesson does not set one.
    pub const DEFAULT_TITRANT_MOLARITY: f64 = 0.1;
    /// Neutral pH reported for an empty or degenerate beaker.
    pub const NEUTRAL_PH: f64 = 7.0;
}
