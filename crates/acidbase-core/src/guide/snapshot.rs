//! Checkpoint snapshots.

use serde::{Deserialize, Serialize};

use crate::particle::Particle;
use crate::simulation::{Simulation, SimulationParams};

/// Full copy of the simulation taken when a checkpoint step is entered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSnapshot {
    pub step_id: String,
    pub params: SimulationParams,
    pub particles: Vec<Particle>,
}

impl SimulationSnapshot {
    pub fn capture(step_id: &str, sim: &Simulation) -> Self {
        Self {
            step_id: step_id.to_string(),
            params: sim.params().clone(),
            particles: sim.beaker().get_particles(),
        }
    }

    pub fn restore(&self, sim: &mut Simulation) {
        sim.restore(&self.params, &self.particles);
    }
}
