//! Acid/base substance catalog.
//!
//! Each substance carries the dissociation constant and the colours used
//! for its three particle species. Lessons refer to substances by `id`.

use serde::{Deserialize, Serialize};

use crate::species::SpeciesColors;

/// Broad class of a substance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SubstanceType {
    StrongAcid,
    StrongBase,
    WeakAcid,
    WeakBase,
}

impl SubstanceType {
    pub const ALL: [SubstanceType; 4] = [
        SubstanceType::StrongAcid,
        SubstanceType::StrongBase,
        SubstanceType::WeakAcid,
        SubstanceType::WeakBase,
    ];

    pub fn is_acid(&self) -> bool {
        matches!(self, SubstanceType::StrongAcid | SubstanceType::WeakAcid)
    }

    pub fn is_strong(&self) -> bool {
        matches!(self, SubstanceType::StrongAcid | SubstanceType::StrongBase)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubstanceType::StrongAcid => "strongAcid",
            SubstanceType::StrongBase => "strongBase",
            SubstanceType::WeakAcid => "weakAcid",
            SubstanceType::WeakBase => "weakBase",
        }
    }
}

impl std::str::FromStr for SubstanceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "strongAcid" => Ok(SubstanceType::StrongAcid),
            "strongBase" => Ok(SubstanceType::StrongBase),
            "weakAcid" => Ok(SubstanceType::WeakAcid),
            "weakBase" => Ok(SubstanceType::WeakBase),
            other => Err(format!("unknown substance type '{}'", other)),
        }
    }
}

/// A selectable acid or base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Substance {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub substance_type: SubstanceType,
    /// Ka for acids, Kb for bases. Strong substances use a large nominal value.
    pub k: f64,
    /// Neutral molecules drawn per dissociated ion pair; `0` for strong substances.
    pub substance_added_per_ion: u32,
    pub primary_ion: String,
    pub secondary_ion: String,
    pub color: String,
    pub primary_color: String,
    pub secondary_color: String,
}

impl Substance {
    pub fn is_strong(&self) -> bool {
        self.substance_type.is_strong()
    }

    pub fn is_acid(&self) -> bool {
        self.substance_type.is_acid()
    }

    pub fn ka(&self) -> f64 {
        if self.is_acid() {
            self.k
        } else {
            KW / self.k
        }
    }

    pub fn kb(&self) -> f64 {
        if self.is_acid() {
            KW / self.k
        } else {
            self.k
        }
    }

    pub fn pka(&self) -> f64 {
        -self.ka().log10()
    }

    pub fn colors(&self) -> SpeciesColors {
        SpeciesColors::new(&self.color, &self.primary_color, &self.secondary_color)
    }
}

/// Ion product of water at 25 °C.
pub const KW: f64 = 1e-14;

#[allow(clippy::too_many_arguments)]
fn substance(
    id: &str,
    symbol: &str,
    name: &str,
    substance_type: SubstanceType,
    k: f64,
    per_ion: u32,
    primary_ion: &str,
    secondary_ion: &str,
    colors: [&str; 3],
) -> Substance {
    Substance {
        id: id.to_string(),
        symbol: symbol.to_string(),
        name: name.to_string(),
        substance_type,
        k,
        substance_added_per_ion: per_ion,
        primary_ion: primary_ion.to_string(),
        secondary_ion: secondary_ion.to_string(),
        color: colors[0].to_string(),
        primary_color: colors[1].to_string(),
        secondary_color: colors[2].to_string(),
    }
}

/// Every substance offered by the lessons, in menu order.
pub fn catalog() -> Vec<Substance> {
    use SubstanceType::*;
    vec![
        substance("hydrogenChloride", "HCl", "Hydrogen chloride", StrongAcid, 1e7, 0,
            "H", "Cl", ["#9FC5E8", "#E06666", "#93C47D"]),
        substance("hydrogenBromide", "HBr", "Hydrogen bromide", StrongAcid, 1e9, 0,
            "H", "Br", ["#9FC5E8", "#E06666", "#B4A7D6"]),
        substance("sodiumHydroxide", "NaOH", "Sodium hydroxide", StrongBase, 1e2, 0,
            "OH", "Na", ["#D5A6BD", "#6FA8DC", "#F6B26B"]),
        substance("potassiumHydroxide", "KOH", "Potassium hydroxide", StrongBase, 3e2, 0,
            "OH", "K", ["#D5A6BD", "#6FA8DC", "#FFD966"]),
        substance("aceticAcid", "HA", "Acetic acid", WeakAcid, 1.8e-5, 2,
            "H", "A", ["#A2C4C9", "#E06666", "#8E7CC3"]),
        substance("hydrogenFluoride", "HF", "Hydrogen fluoride", WeakAcid, 6.8e-4, 2,
            "H", "F", ["#A2C4C9", "#E06666", "#76A5AF"]),
        substance("ammonia", "B", "Ammonia", WeakBase, 1.8e-5, 2,
            "OH", "BH", ["#C9DAF8", "#6FA8DC", "#E69138"]),
        substance("pyridine", "Py", "Pyridine", WeakBase, 1.7e-9, 3,
            "OH", "PyH", ["#C9DAF8", "#6FA8DC", "#C27BA0"]),
    ]
}

/// Substances of one type, in menu order.
pub fn by_type(substance_type: SubstanceType) -> Vec<Substance> {
    catalog()
        .into_iter()
        .filter(|s| s.substance_type == substance_type)
        .collect()
}

/// Look up a substance by id.
pub fn find(id: &str) -> Option<Substance> {
    catalog().into_iter().find(|s| s.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_every_type_has_substances() {
        for t in SubstanceType::ALL {
            assert!(!by_type(t).is_empty(), "no substances for {:?}", t);
        }
    }

    #[test]
    fn test_catalog_ids_unique() {
        let all = catalog();
        let mut ids: Vec<_> = all.iter().map(|s| s.id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), all.len());
    }

    #[test]
    fn test_ka_kb_relation() {
        let acetic = find("aceticAcid").unwrap();
        assert_relative_eq!(acetic.ka() * acetic.kb(), KW, max_relative = 1e-9);
        assert_relative_eq!(acetic.pka(), 4.7447, epsilon = 1e-3);

        let ammonia = find("ammonia").unwrap();
        assert_relative_eq!(ammonia.kb(), 1.8e-5);
    }

    #[test]
    fn test_strong_substances_have_no_neutral_ratio() {
        for s in catalog().iter().filter(|s| s.is_strong()) {
            assert_eq!(s.substance_added_per_ion, 0, "{}", s.id);
        }
    }

    #[test]
    fn test_type_round_trip_from_str() {
        for t in SubstanceType::ALL {
            assert_eq!(t.as_str().parse::<SubstanceType>().unwrap(), t);
        }
        assert!("superAcid".parse::<SubstanceType>().is_err());
    }
}
