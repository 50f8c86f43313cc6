//! Particle species tags and per-species maps.
//!
//! Every particle in the beaker belongs to exactly one of three species.
//! What the species *means* depends on the selected substance: for a weak
//! acid `HA`, `Substance` is `HA`, `PrimaryIon` is `H⁺` and `SecondaryIon`
//! is `A⁻`.

use serde::{Deserialize, Serialize};

/// Closed set of particle species.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Species {
    /// Undissociated substance molecule.
    Substance,
    /// H⁺ for acids, OH⁻ for bases.
    PrimaryIon,
    /// Conjugate ion of the substance.
    SecondaryIon,
}

impl Species {
    /// All species in reconciliation order.
    pub const ALL: [Species; 3] = [Species::Substance, Species::PrimaryIon, Species::SecondaryIon];

    pub fn as_str(&self) -> &'static str {
        match self {
            Species::Substance => "substance",
            Species::PrimaryIon => "primaryIon",
            Species::SecondaryIon => "secondaryIon",
        }
    }
}

impl std::fmt::Display for Species {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Desired or observed particle count per species.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeciesCounts {
    pub substance: u32,
    pub primary: u32,
    pub secondary: u32,
}

impl SpeciesCounts {
    pub const ZERO: Self = Self {
        substance: 0,
        primary: 0,
        secondary: 0,
    };

    pub fn new(substance: u32, primary: u32, secondary: u32) -> Self {
        Self {
            substance,
            primary,
            secondary,
        }
    }

    /// Build counts from raw floating-point values, clamping anything
    /// negative or non-finite to zero and rounding the rest.
    pub fn from_raw(substance: f64, primary: f64, secondary: f64) -> Self {
        Self {
            substance: sanitize_count(substance),
            primary: sanitize_count(primary),
            secondary: sanitize_count(secondary),
        }
    }

    pub fn get(&self, species: Species) -> u32 {
        match species {
            Species::Substance => self.substance,
            Species::PrimaryIon => self.primary,
            Species::SecondaryIon => self.secondary,
        }
    }

    pub fn set(&mut self, species: Species, count: u32) {
        match species {
            Species::Substance => self.substance = count,
            Species::PrimaryIon => self.primary = count,
            Species::SecondaryIon => self.secondary = count,
        }
    }

    pub fn total(&self) -> u32 {
        self.substance + self.primary + self.secondary
    }
}

/// Clamp a computed count to a usable particle count.
pub fn sanitize_count(value: f64) -> u32 {
    if !value.is_finite() || value <= 0.0 {
        return 0;
    }
    value.round().min(u32::MAX as f64) as u32
}

/// Resting colour per species, as CSS hex strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeciesColors {
    pub substance: String,
    pub primary_ion: String,
    pub secondary_ion: String,
}

impl SpeciesColors {
    pub fn new(
        substance: impl Into<String>,
        primary_ion: impl Into<String>,
        secondary_ion: impl Into<String>,
    ) -> Self {
        Self {
            substance: substance.into(),
            primary_ion: primary_ion.into(),
            secondary_ion: secondary_ion.into(),
        }
    }

    pub fn get(&self, species: Species) -> &str {
        match species {
            Species::Substance => &self.substance,
            Species::PrimaryIon => &self.primary_ion,
            Species::SecondaryIon => &self.secondary_ion,
        }
    }

    /// Same colour for every species.
    pub fn uniform(color: impl Into<String>) -> Self {
        let color = color.into();
        Self {
            substance: color.clone(),
            primary_ion: color.clone(),
            secondary_ion: color,
        }
    }
}
