//! Conversions between the water-level slider and particle grid rows.

/// Bottom of the water-level slider's usable range, as a fraction of the beaker.
pub const WATER_LEVEL_MIN: f64 = 0.31818;
/// Top of the water-level slider's usable range, as a fraction of the beaker.
pub const WATER_LEVEL_MAX: f64 = 0.681818;

/// Rows available for new particles at a water-level `fraction` in `0..=1`.
///
/// Interpolates between `rows_min` and `rows_max`, rounds up only when the
/// fractional remainder is strictly greater than `round_threshold`, and
/// clamps the result to `[rows_min, rows_max]`.
pub fn effective_rows(fraction: f64, rows_min: u32, rows_max: u32, round_threshold: f64) -> u32 {
    let fraction = if fraction.is_finite() { fraction } else { 0.0 };
    let rows_float = rows_min as f64 + (rows_max as f64 - rows_min as f64) * fraction;
    let floor = rows_float.floor();
    let decimal = rows_float - floor;
    let rounded = if decimal > round_threshold {
        rows_float.ceil()
    } else {
        floor
    };
    rounded.clamp(rows_min as f64, rows_max as f64) as u32
}

/// Rows covered by a raw slider value, where any partially visible row
/// counts as active.
pub fn grid_rows_for_water_level(
    water_level: f64,
    level_min: f64,
    level_max: f64,
    rows_min: u32,
    rows_max: u32,
) -> u32 {
    let normalized = model_level_for_water_level(water_level, level_min, level_max);
    let rows_float = rows_min as f64 + (rows_max as f64 - rows_min as f64) * normalized;
    rows_float.ceil().clamp(rows_min as f64, rows_max as f64) as u32
}

/// Normalise a raw slider value into the `0..=1` fraction the beaker model takes.
pub fn model_level_for_water_level(water_level: f64, level_min: f64, level_max: f64) -> f64 {
    let span = level_max - level_min;
    if !water_level.is_finite() || span <= 0.0 {
        return 0.0;
    }
    ((water_level - level_min) / span).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::grid::{ROWS_MAX, ROWS_MIN, ROW_ROUND_THRESHOLD};

    fn rows(fraction: f64) -> u32 {
        effective_rows(fraction, ROWS_MIN, ROWS_MAX, ROW_ROUND_THRESHOLD)
    }

    #[test]
    fn test_endpoints() {
        assert_eq!(rows(0.0), ROWS_MIN);
        assert_eq!(rows(1.0), ROWS_MAX);
        assert_eq!(rows(0.5), 11);
    }

    #[test]
    fn test_out_of_range_clamps() {
        assert_eq!(rows(-0.5), ROWS_MIN);
        assert_eq!(rows(-100.0), ROWS_MIN);
        assert_eq!(rows(1.5), ROWS_MAX);
        assert_eq!(rows(f64::NAN), ROWS_MIN);
    }

    #[test]
    fn test_round_threshold_boundary() {
        // Remainder exactly at the threshold rounds down.
        assert_eq!(effective_rows(0.4, 0, 1, 0.4), 0);
        assert_eq!(effective_rows(0.41, 0, 1, 0.4), 1);
        // 6 + 10 * 0.045 = 6.45: remainder above the threshold, rounds up.
        assert_eq!(effective_rows(0.045, 6, 16, 0.4), 7);
        // 6 + 10 * 0.035 = 6.35: below, rounds down.
        assert_eq!(effective_rows(0.035, 6, 16, 0.4), 6);
    }

    #[test]
    fn test_slider_rows_round_up() {
        assert_eq!(grid_rows_for_water_level(WATER_LEVEL_MIN, WATER_LEVEL_MIN, WATER_LEVEL_MAX, 6, 16), 6);
        assert_eq!(grid_rows_for_water_level(WATER_LEVEL_MAX, WATER_LEVEL_MIN, WATER_LEVEL_MAX, 6, 16), 16);
        // Any sliver above the minimum activates the next row.
        assert_eq!(grid_rows_for_water_level(WATER_LEVEL_MIN + 0.001, WATER_LEVEL_MIN, WATER_LEVEL_MAX, 6, 16), 7);
        assert_eq!(grid_rows_for_water_level(0.0, WATER_LEVEL_MIN, WATER_LEVEL_MAX, 6, 16), 6);
    }

    #[test]
    fn test_model_level_normalises() {
        assert_eq!(model_level_for_water_level(0.0, 0.25, 0.75), 0.0);
        assert_eq!(model_level_for_water_level(1.0, 0.25, 0.75), 1.0);
        assert!((model_level_for_water_level(0.5, 0.25, 0.75) - 0.5).abs() < 1e-12);
        assert_eq!(model_level_for_water_level(0.5, 0.5, 0.5), 0.0);
    }
}
