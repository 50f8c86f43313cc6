//! Guided lesson flow: step sequencing, checkpoints and auto-advance.

pub mod sequencer;
pub mod snapshot;
pub mod watchers;

pub use sequencer::{GuideSequencer, Navigation, StepEntry};
pub use snapshot::SimulationSnapshot;
pub use watchers::{AutoAdvanceWatchers, WatchFire, WatchKind};
