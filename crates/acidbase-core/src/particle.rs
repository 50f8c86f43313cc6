//! Canonical particle record.

use serde::{Deserialize, Serialize};

use acidbase_logic::species::Species;

use crate::grid::GridPosition;

/// Identity of a particle. Ids are never reused within one beaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParticleId(pub u64);

impl std::fmt::Display for ParticleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "p{}", self.0)
    }
}

/// A molecule or ion drawn in the beaker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Particle {
    pub id: ParticleId,
    pub species: Species,
    pub position: GridPosition,
    /// Colour shown right now.
    pub display_color: String,
    /// Colour the particle settles on once any pending transition fires.
    pub target_color: String,
    /// Milliseconds on the beaker clock.
    pub created_at: u64,
    pub transition_ms: Option<u64>,
    pub transition_delay_ms: Option<u64>,
}

impl Particle {
    /// Whether a colour change is still pending.
    pub fn is_transitioning(&self) -> bool {
        self.display_color != self.target_color
    }
}
