//! Particle grid occupancy and free-cell selection.
//!
//! The grid is an index over the beaker's particles, never a second source
//! of truth: [`crate::beaker::ReactingBeakerModel`] rebuilds it whenever the
//! particle list is replaced wholesale.
//!
//! Which free cells get picked is delegated to a [`PositionPicker`] so tests
//! can place particles deterministically.

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::config::GridConfig;

/// Cell in the particle grid. Row 0 is the bottom of the beaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridPosition {
    pub row: u32,
    pub col: u32,
}

impl GridPosition {
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }
}

/// Strategy choosing `count` cells out of the free candidates.
pub trait PositionPicker {
    /// `candidates` arrive in row-major order. Return at most `count` of them.
    fn pick(&mut self, candidates: Vec<GridPosition>, count: usize) -> Vec<GridPosition>;
}

/// Uniformly random choice.
pub struct RandomPicker<R: Rng = StdRng> {
    rng: R,
}

impl<R: Rng> RandomPicker<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl RandomPicker<StdRng> {
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }
}

impl<R: Rng> PositionPicker for RandomPicker<R> {
    fn pick(&mut self, mut candidates: Vec<GridPosition>, count: usize) -> Vec<GridPosition> {
        let (chosen, _) = candidates.partial_shuffle(&mut self.rng, count);
        chosen.to_vec()
    }
}

/// Fills the lowest free cells first, left to right.
#[derive(Debug, Clone, Copy, Default)]
pub struct RowMajorPicker;

impl PositionPicker for RowMajorPicker {
    fn pick(&mut self, mut candidates: Vec<GridPosition>, count: usize) -> Vec<GridPosition> {
        candidates.truncate(count);
        candidates
    }
}

/// Set of occupied cells.
pub struct ParticleGrid {
    columns: u32,
    rows: u32,
    occupied: HashSet<GridPosition>,
    picker: Box<dyn PositionPicker>,
}

impl ParticleGrid {
    pub fn new(config: GridConfig, picker: Box<dyn PositionPicker>) -> Self {
        Self {
            columns: config.columns,
            rows: config.rows_max,
            occupied: HashSet::with_capacity(config.capacity()),
            picker,
        }
    }

    /// Mark a cell used. Idempotent.
    pub fn occupy(&mut self, position: GridPosition) {
        self.occupied.insert(position);
    }

    /// Mark a cell free. No-op if it was free.
    pub fn release(&mut self, position: GridPosition) {
        self.occupied.remove(&position);
    }

    pub fn clear(&mut self) {
        self.occupied.clear();
    }

    pub fn is_occupied(&self, position: GridPosition) -> bool {
        self.occupied.contains(&position)
    }

    pub fn occupied_count(&self) -> usize {
        self.occupied.len()
    }

    pub fn capacity(&self) -> usize {
        self.columns as usize * self.rows as usize
    }

    /// Choose up to `count` distinct free cells in rows `[0, row_limit)`
    /// that are not in `exclude`. Occupancy is left untouched; the caller
    /// occupies whatever it commits to.
    pub fn random_available_positions(
        &mut self,
        count: usize,
        exclude: &[GridPosition],
        row_limit: u32,
    ) -> Vec<GridPosition> {
        if count == 0 {
            return Vec::new();
        }
        let excluded: HashSet<GridPosition> = exclude.iter().copied().collect();
        let rows = row_limit.min(self.rows);

        let candidates: Vec<GridPosition> = (0..rows)
            .flat_map(|row| (0..self.columns).map(move |col| GridPosition::new(row, col)))
            .filter(|p| !self.occupied.contains(p) && !excluded.contains(p))
            .collect();

        if candidates.len() < count {
            log::warn!(
                "grid has {} free cells below row {}, {} requested",
                candidates.len(),
                rows,
                count
            );
        }
        self.picker.pick(candidates, count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(picker: Box<dyn PositionPicker>) -> ParticleGrid {
        ParticleGrid::new(GridConfig::default(), picker)
    }

    #[test]
    fn test_occupy_is_idempotent() {
        let mut g = grid(Box::new(RowMajorPicker));
        let p = GridPosition::new(0, 0);
        g.occupy(p);
        g.occupy(p);
        assert_eq!(g.occupied_count(), 1);
        g.release(p);
        g.release(p);
        assert_eq!(g.occupied_count(), 0);
    }

    #[test]
    fn test_selection_is_unique_bounded_and_free() {
        let mut g = grid(Box::new(RandomPicker::seeded(7)));
        g.occupy(GridPosition::new(0, 0));
        let exclude = [GridPosition::new(0, 1)];
        let picked = g.random_available_positions(40, &exclude, 5);

        assert_eq!(picked.len(), 40);
        let unique: HashSet<_> = picked.iter().collect();
        assert_eq!(unique.len(), 40);
        assert!(picked.iter().all(|p| p.row < 5));
        assert!(!picked.contains(&GridPosition::new(0, 0)));
        assert!(!picked.contains(&GridPosition::new(0, 1)));
        // Selection alone does not occupy.
        assert_eq!(g.occupied_count(), 1);
    }

    #[test]
    fn test_short_result_when_exhausted() {
        let mut g = grid(Box::new(RandomPicker::seeded(1)));
        let picked = g.random_available_positions(100, &[], 2);
        assert_eq!(picked.len(), 24);
        assert!(g.random_available_positions(5, &[], 0).is_empty());
    }

    #[test]
    fn test_row_limit_capped_at_grid_height() {
        let mut g = grid(Box::new(RowMajorPicker));
        let picked = g.random_available_positions(10_000, &[], 1_000);
        assert_eq!(picked.len(), g.capacity());
    }

    #[test]
    fn test_row_major_picker_fills_bottom_first() {
        let mut g = grid(Box::new(RowMajorPicker));
        g.occupy(GridPosition::new(0, 0));
        let picked = g.random_available_positions(3, &[], 11);
        assert_eq!(
            picked,
            vec![GridPosition::new(0, 1), GridPosition::new(0, 2), GridPosition::new(0, 3)]
        );
    }

    #[test]
    fn test_seeded_pickers_agree() {
        let mut a = grid(Box::new(RandomPicker::seeded(42)));
        let mut b = grid(Box::new(RandomPicker::seeded(42)));
        assert_eq!(
            a.random_available_positions(10, &[], 11),
            b.random_available_positions(10, &[], 11)
        );
    }
}
