//! Save/Load for lesson sessions.
//!
//! Uses bincode for a compact binary dump of the step index, the checkpoint
//! snapshots and the live simulation. A save only loads back into a session
//! running the same lesson.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::guide::SimulationSnapshot;
use crate::particle::Particle;
use crate::session::LessonSession;
use crate::simulation::SimulationParams;

/// Bumped whenever the layout of [`SaveData`] changes.
const SAVE_VERSION: u32 = 1;

/// Serializable state of a lesson session.
#[derive(Debug, Serialize, Deserialize)]
pub struct SaveData {
    pub version: u32,
    pub lesson_id: String,
    pub step_index: usize,
    pub params: SimulationParams,
    pub particles: Vec<Particle>,
    pub snapshots: Vec<SimulationSnapshot>,
}

/// Save `session` to a writer.
pub fn save_session<W: Write>(writer: W, session: &LessonSession) -> Result<(), SaveError> {
    let (sequencer, simulation) = session.snapshot_parts();
    let save_data = SaveData {
        version: SAVE_VERSION,
        lesson_id: sequencer.script().id.clone(),
        step_index: sequencer.index(),
        params: simulation.params().clone(),
        particles: simulation.beaker().get_particles(),
        snapshots: sequencer.snapshots().cloned().collect(),
    };
    bincode::serialize_into(writer, &save_data)?;
    log::info!(
        "saved lesson '{}' at step {}",
        save_data.lesson_id,
        save_data.step_index
    );
    Ok(())
}

/// Read a save and check it belongs to `lesson_id` with `step_count` steps.
pub fn load_session<R: Read>(reader: R, lesson_id: &str, step_count: usize) -> Result<SaveData, SaveError> {
    let save_data: SaveData = bincode::deserialize_from(reader)?;

    if save_data.version != SAVE_VERSION {
        return Err(SaveError::VersionMismatch {
            expected: SAVE_VERSION,
            found: save_data.version,
        });
    }
    if save_data.lesson_id != lesson_id {
        return Err(SaveError::LessonMismatch {
            expected: lesson_id.to_string(),
            found: save_data.lesson_id,
        });
    }
    if save_data.step_index >= step_count {
        return Err(SaveError::StepOutOfRange {
            index: save_data.step_index,
            steps: step_count,
        });
    }
    Ok(save_data)
}

/// Why a save could not be written or read back.
#[derive(Error, Debug)]
pub enum SaveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Bincode(#[from] Box<bincode::ErrorKind>),

    #[error("Save version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("Save belongs to lesson '{found}', not '{expected}'")]
    LessonMismatch { expected: String, found: String },

    #[error("Saved step {index} is outside a {steps}-step lesson")]
    StepOutOfRange { index: usize, steps: usize },
}
