//! Engine configuration.
//!
//! Every tuned number the engine uses lives here with its default taken from
//! [`acidbase_logic::constants`]. Configs are `serde` types so a screen can
//! ship overrides as JSON.

use serde::{Deserialize, Serialize};

use acidbase_logic::constants::{colors, grid, lesson, timing};

/// Particle grid geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub columns: u32,
    pub rows_min: u32,
    pub rows_max: u32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            columns: grid::COLUMNS,
            rows_min: grid::ROWS_MIN,
            rows_max: grid::ROWS_MAX,
        }
    }
}

impl GridConfig {
    /// Cells available with the beaker full.
    pub fn capacity(&self) -> usize {
        self.columns as usize * self.rows_max as usize
    }
}

/// Reacting beaker tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BeakerConfig {
    pub grid: GridConfig,
    /// Effective rows before the first water-level update.
    pub initial_effective_rows: u32,
    pub row_round_threshold: f64,
    pub reaction_transition_ms: u64,
    pub reconcile_transition_ms: u64,
    pub stagger_ms: u64,
    pub skip_fade_backdate_ms: u64,
    pub excess_reactant_color: String,
}

impl Default for BeakerConfig {
    fn default() -> Self {
        Self {
            grid: GridConfig::default(),
            initial_effective_rows: grid::DEFAULT_EFFECTIVE_ROWS,
            row_round_threshold: grid::ROW_ROUND_THRESHOLD,
            reaction_transition_ms: timing::REACTION_TRANSITION_MS,
            reconcile_transition_ms: timing::RECONCILE_TRANSITION_MS,
            stagger_ms: timing::STAGGER_MS,
            skip_fade_backdate_ms: timing::SKIP_FADE_BACKDATE_MS,
            excess_reactant_color: colors::EXCESS_REACTANT.to_string(),
        }
    }
}

/// Fade-in projection tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectorConfig {
    pub fade_in_ms: u64,
    pub initial_scale: f64,
}

impl Default for ProjectorConfig {
    fn default() -> Self {
        Self {
            fade_in_ms: timing::FADE_IN_MS,
            initial_scale: timing::FADE_IN_INITIAL_SCALE,
        }
    }
}

/// Lesson flow tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LessonConfig {
    pub initial_water_level: f64,
    pub min_substance_particles: u32,
    pub max_indicator: u32,
    pub post_ep_titrant_max: u32,
    pub salt_shakes_for_equilibrium: u32,
    pub final_secondary_ion_count: u32,
    pub min_final_primary_ion_count: u32,
    pub default_molarity: f64,
    pub titrant_molarity: f64,
}

impl Default for LessonConfig {
    fn default() -> Self {
        Self {
            initial_water_level: lesson::INITIAL_WATER_LEVEL,
            min_substance_particles: lesson::MIN_SUBSTANCE_PARTICLES,
            max_indicator: lesson::MAX_INDICATOR,
            post_ep_titrant_max: lesson::POST_EP_TITRANT_MAX,
            salt_shakes_for_equilibrium: lesson::SALT_SHAKES_FOR_EQUILIBRIUM,
            final_secondary_ion_count: lesson::FINAL_SECONDARY_ION_COUNT,
            min_final_primary_ion_count: lesson::MIN_FINAL_PRIMARY_ION_COUNT,
            default_molarity: lesson::DEFAULT_MOLARITY,
            titrant_molarity: lesson::DEFAULT_TITRANT_MOLARITY,
        }
    }
}

/// Everything a lesson screen configures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub beaker: BeakerConfig,
    pub projector: ProjectorConfig,
    pub lesson: LessonConfig,
}

impl EngineConfig {
    /// Parse overrides; missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
