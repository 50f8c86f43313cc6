//! Chemistry engine — pH and species breakdowns for a substance.
//!
//! The lesson engine only ever talks to the [`ChemistryEngine`] trait, so a
//! screen can swap in a different model without touching the particle or
//! guide logic. [`StandardChemistry`] is the textbook equilibrium model used
//! by the bundled lessons.
//!
//! Every function here promises a finite answer: degenerate input (zero or
//! non-finite molarity, zero volume) falls back to neutral pH or zero counts.

use serde::{Deserialize, Serialize};

use crate::constants::{colors, lesson::NEUTRAL_PH};
use crate::species::SpeciesCounts;
use crate::substances::{Substance, KW};

/// Molar concentration of each species, for the equation panels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Concentrations {
    pub substance: f64,
    pub primary: f64,
    pub secondary: f64,
}

/// Titration inputs, all volumes in litres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TitrationInput {
    pub analyte_molarity: f64,
    pub analyte_volume: f64,
    pub titrant_molarity: f64,
    pub titrant_volume: f64,
}

impl TitrationInput {
    /// Titrant volume that exactly neutralises the analyte.
    pub fn equivalence_volume(&self) -> f64 {
        if self.titrant_molarity <= 0.0 {
            return 0.0;
        }
        finite_or(
            self.analyte_molarity * self.analyte_volume / self.titrant_molarity,
            0.0,
        )
    }
}

/// Pure chemistry interface consumed by the lesson engine.
pub trait ChemistryEngine {
    /// pH of `substance` dissolved at `molarity`.
    fn ph(&self, substance: &Substance, molarity: f64) -> f64;

    /// Equilibrium concentrations of each species.
    fn concentrations(&self, substance: &Substance, molarity: f64) -> Concentrations;

    /// Particle counts to draw once `particle_count` substance particles
    /// have dissociated.
    fn species_counts(&self, substance: &Substance, molarity: f64, particle_count: u32) -> SpeciesCounts;

    /// Particle counts after `salt_added` conjugate-ion particles were shaken
    /// into the equilibrium mixture.
    fn buffer_counts(
        &self,
        substance: &Substance,
        molarity: f64,
        particle_count: u32,
        salt_added: u32,
    ) -> SpeciesCounts;

    /// Particle counts after `titrant_units` titrant particles reacted with
    /// `analyte_units` analyte particles. Past equivalence the excess titrant
    /// is drawn as primary ions.
    fn titration_counts(&self, substance: &Substance, analyte_units: u32, titrant_units: u32) -> SpeciesCounts;

    /// pH part-way through a titration of `substance` by a strong titrant.
    fn titration_ph(&self, substance: &Substance, input: &TitrationInput) -> f64;

    /// Resting colour override from the indicator at `ph`, if any.
    fn indicator_color(&self, ph: f64) -> Option<String>;
}

/// Textbook equilibrium model.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardChemistry;

impl StandardChemistry {
    pub fn new() -> Self {
        Self
    }

    /// `-log10` of the concentration of the substance's own ion (H⁺ for
    /// acids, OH⁻ for bases).
    fn own_ion_p(substance: &Substance, molarity: f64) -> Option<f64> {
        if !molarity.is_finite() || molarity <= 0.0 {
            return None;
        }
        let x = own_ion_concentration(substance, molarity);
        let p = -x.log10();
        p.is_finite().then_some(p)
    }
}

/// Concentration of the dissociated ion at equilibrium.
fn own_ion_concentration(substance: &Substance, molarity: f64) -> f64 {
    if substance.is_strong() {
        return molarity;
    }
    let k = substance.k;
    // Positive root of x² + kx − kC = 0.
    (-k + (k * k + 4.0 * k * molarity).sqrt()) / 2.0
}

fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

/// Convert a p-value on the substance's own ion side into pH.
fn to_ph(substance: &Substance, own_p: f64) -> f64 {
    let ph = if substance.is_acid() { own_p } else { 14.0 - own_p };
    finite_or(ph, NEUTRAL_PH).clamp(0.0, 14.0)
}

impl ChemistryEngine for StandardChemistry {
    fn ph(&self, substance: &Substance, molarity: f64) -> f64 {
        match Self::own_ion_p(substance, molarity) {
            Some(p) => to_ph(substance, p),
            None => NEUTRAL_PH,
        }
    }

    fn concentrations(&self, substance: &Substance, molarity: f64) -> Concentrations {
        if !molarity.is_finite() || molarity <= 0.0 {
            return Concentrations::default();
        }
        let ion = finite_or(own_ion_concentration(substance, molarity), 0.0);
        Concentrations {
            substance: (molarity - ion).max(0.0),
            primary: ion,
            secondary: ion,
        }
    }

    fn species_counts(&self, substance: &Substance, _molarity: f64, particle_count: u32) -> SpeciesCounts {
        if particle_count == 0 {
            return SpeciesCounts::ZERO;
        }
        let per_ion = substance.substance_added_per_ion;
        if substance.is_strong() || per_ion == 0 {
            return SpeciesCounts::new(0, particle_count, particle_count);
        }
        let ions = (particle_count / per_ion).max(1);
        SpeciesCounts::new(particle_count - ions, ions, ions)
    }

    fn buffer_counts(
        &self,
        substance: &Substance,
        molarity: f64,
        particle_count: u32,
        salt_added: u32,
    ) -> SpeciesCounts {
        let eq = self.species_counts(substance, molarity, particle_count);
        // The common ion pushes the equilibrium back, but one primary ion stays.
        let converted = salt_added.min(eq.primary.saturating_sub(1));
        SpeciesCounts::new(
            eq.substance + converted,
            eq.primary - converted,
            eq.secondary + salt_added,
        )
    }

    fn titration_counts(&self, substance: &Substance, analyte_units: u32, titrant_units: u32) -> SpeciesCounts {
        if titrant_units >= analyte_units {
            return SpeciesCounts::new(0, titrant_units - analyte_units, analyte_units);
        }
        let remaining = analyte_units - titrant_units;
        if substance.is_strong() {
            // Spectator ions stay; only the own ion is neutralised.
            SpeciesCounts::new(0, remaining, analyte_units)
        } else {
            SpeciesCounts::new(remaining, 0, titrant_units)
        }
    }

    fn titration_ph(&self, substance: &Substance, input: &TitrationInput) -> f64 {
        let analyte = input.analyte_molarity * input.analyte_volume;
        let titrant = input.titrant_molarity * input.titrant_volume.max(0.0);
        let volume = input.analyte_volume + input.titrant_volume.max(0.0);
        if !analyte.is_finite() || !titrant.is_finite() || volume <= 0.0 || analyte <= 0.0 {
            return NEUTRAL_PH;
        }

        // Work on the analyte's own-ion side and mirror at the end.
        let Some(initial_p) = Self::own_ion_p(substance, analyte / volume) else {
            return NEUTRAL_PH;
        };
        // Opposite ion at equivalence: water for strong analytes,
        // conjugate hydrolysis (Kw / K) for weak ones.
        let opposite_at_equivalence = if substance.is_strong() {
            KW.sqrt()
        } else {
            (KW / substance.k * analyte / volume).sqrt()
        };
        let equivalence_p = 14.0 + opposite_at_equivalence.log10();

        let own_p = if titrant <= 0.0 {
            initial_p
        } else if titrant < analyte {
            let p = if substance.is_strong() {
                -((analyte - titrant) / volume).log10()
            } else {
                // Henderson-Hasselbalch on the own-ion side.
                let pk = -substance.k.log10();
                pk + (titrant / (analyte - titrant)).log10()
            };
            p.max(initial_p).min(equivalence_p)
        } else {
            // Past equivalence the excess titrant ion dominates.
            let excess = (titrant - analyte) / volume;
            14.0 + excess.max(opposite_at_equivalence).log10()
        };

        to_ph(substance, own_p)
    }

    fn indicator_color(&self, ph: f64) -> Option<String> {
        (ph.is_finite() && ph >= colors::INDICATOR_TRANSITION_PH)
            .then(|| colors::INDICATOR_BASIC.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::substances::find;
    use approx::assert_relative_eq;

    #[test]
    fn test_strong_acid_ph() {
        let hcl = find("hydrogenChloride").unwrap();
        assert_relative_eq!(StandardChemistry.ph(&hcl, 0.1), 1.0, epsilon = 1e-9);
        assert_relative_eq!(StandardChemistry.ph(&hcl, 0.01), 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_strong_base_ph() {
        let naoh = find("sodiumHydroxide").unwrap();
        assert_relative_eq!(StandardChemistry.ph(&naoh, 0.1), 13.0, epsilon = 1e-9);
    }

    #[test]
    fn test_weak_acid_ph_between_strong_and_neutral() {
        let acetic = find("aceticAcid").unwrap();
        let ph = StandardChemistry.ph(&acetic, 0.1);
        assert!(ph > 2.5 && ph < 3.2, "pH was {}", ph);
    }

    #[test]
    fn test_degenerate_molarity_is_neutral() {
        let hcl = find("hydrogenChloride").unwrap();
        assert_eq!(StandardChemistry.ph(&hcl, 0.0), NEUTRAL_PH);
        assert_eq!(StandardChemistry.ph(&hcl, f64::NAN), NEUTRAL_PH);
        assert_eq!(StandardChemistry.ph(&hcl, -1.0), NEUTRAL_PH);
        assert_eq!(StandardChemistry.concentrations(&hcl, 0.0), Concentrations::default());
    }

    #[test]
    fn test_strong_counts_fully_dissociate() {
        let hcl = find("hydrogenChloride").unwrap();
        let counts = StandardChemistry.species_counts(&hcl, 0.1, 20);
        assert_eq!(counts, SpeciesCounts::new(0, 20, 20));
    }

    #[test]
    fn test_weak_counts_conserve_substance_units() {
        let acetic = find("aceticAcid").unwrap();
        let counts = StandardChemistry.species_counts(&acetic, 0.1, 20);
        assert_eq!(counts, SpeciesCounts::new(10, 10, 10));
        assert_eq!(counts.substance + counts.primary, 20);
    }

    #[test]
    fn test_buffer_counts_keep_one_primary_ion() {
        let acetic = find("aceticAcid").unwrap();
        let counts = StandardChemistry.buffer_counts(&acetic, 0.1, 20, 50);
        assert_eq!(counts.primary, 1);
        assert_eq!(counts.secondary, 60);
        assert_eq!(counts.substance, 19);
    }

    #[test]
    fn test_strong_titration_equivalence_is_neutral() {
        let hcl = find("hydrogenChloride").unwrap();
        let input = TitrationInput {
            analyte_molarity: 0.1,
            analyte_volume: 0.05,
            titrant_molarity: 0.1,
            titrant_volume: 0.05,
        };
        assert_relative_eq!(input.equivalence_volume(), 0.05, epsilon = 1e-12);
        assert_relative_eq!(StandardChemistry.titration_ph(&hcl, &input), 7.0, epsilon = 1e-6);
    }

    #[test]
    fn test_weak_titration_half_equivalence_is_pka() {
        let acetic = find("aceticAcid").unwrap();
        let input = TitrationInput {
            analyte_molarity: 0.1,
            analyte_volume: 0.05,
            titrant_molarity: 0.1,
            titrant_volume: 0.025,
        };
        assert_relative_eq!(
            StandardChemistry.titration_ph(&acetic, &input),
            acetic.pka(),
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_weak_acid_equivalence_is_basic() {
        let acetic = find("aceticAcid").unwrap();
        let input = TitrationInput {
            analyte_molarity: 0.1,
            analyte_volume: 0.05,
            titrant_molarity: 0.1,
            titrant_volume: 0.05,
        };
        let ph = StandardChemistry.titration_ph(&acetic, &input);
        assert!(ph > 8.0 && ph < 9.5, "pH was {}", ph);
    }

    #[test]
    fn test_titration_past_equivalence_rises() {
        let hcl = find("hydrogenChloride").unwrap();
        let mut input = TitrationInput {
            analyte_molarity: 0.1,
            analyte_volume: 0.05,
            titrant_molarity: 0.1,
            titrant_volume: 0.06,
        };
        let ph_a = StandardChemistry.titration_ph(&hcl, &input);
        input.titrant_volume = 0.08;
        let ph_b = StandardChemistry.titration_ph(&hcl, &input);
        assert!(ph_a > 7.0 && ph_b > ph_a);
    }

    #[test]
    fn test_titration_counts_before_and_after_equivalence() {
        let hcl = find("hydrogenChloride").unwrap();
        let acetic = find("aceticAcid").unwrap();
        assert_eq!(StandardChemistry.titration_counts(&hcl, 20, 0), SpeciesCounts::new(0, 20, 20));
        assert_eq!(StandardChemistry.titration_counts(&hcl, 20, 15), SpeciesCounts::new(0, 5, 20));
        assert_eq!(StandardChemistry.titration_counts(&acetic, 20, 15), SpeciesCounts::new(5, 0, 15));
        assert_eq!(StandardChemistry.titration_counts(&acetic, 20, 20), SpeciesCounts::new(0, 0, 20));
        assert_eq!(StandardChemistry.titration_counts(&acetic, 20, 24), SpeciesCounts::new(0, 4, 20));
    }

    #[test]
    fn test_indicator_switches_at_transition_ph() {
        assert_eq!(StandardChemistry.indicator_color(7.0), None);
        assert_eq!(
            StandardChemistry.indicator_color(8.2).as_deref(),
            Some(colors::INDICATOR_BASIC)
        );
        assert_eq!(StandardChemistry.indicator_color(f64::NAN), None);
    }
}
