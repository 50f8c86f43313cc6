//! Lesson scripts — the static, ordered description of a guided lesson.
//!
//! Scripts are authored as JSON (see `data/lessons/`) and parsed once at
//! startup. Parsing validates the cross-references between steps so that a
//! broken script is caught by tests rather than at runtime.
//!
//! ```
//! use acidbase_logic::lesson::{InputState, LessonScript};
//!
//! let json = r#"{
//!     "id": "demo",
//!     "steps": [
//!         { "id": "intro", "statement": ["Welcome!"] },
//!         { "id": "water", "input": { "type": "setWaterLevel" } }
//!     ]
//! }"#;
//! let script = LessonScript::from_json(json).unwrap();
//! assert_eq!(script.len(), 2);
//! assert_eq!(script.steps[1].input, InputState::SetWaterLevel);
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::lesson::MIDPOINT_FRACTION;
use crate::substances::SubstanceType;

/// Which reconciliation formula the beaker applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SimulationPhase {
    /// Titration beaker being filled; substance drawn undissociated.
    Preparation,
    /// Substance being poured in, not yet reacted.
    #[default]
    Adding,
    /// Substance dissociated per the chemistry engine.
    Equilibrium,
    /// Conjugate salt shaken into a weak-substance equilibrium.
    SaltAdded,
    /// Titrant being added before the equivalence point.
    #[serde(rename = "preEP")]
    PreEquivalence,
    /// Titrant being added past the equivalence point.
    #[serde(rename = "postEP")]
    PostEquivalence,
}

impl std::str::FromStr for SimulationPhase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(serde_json::Value::String(s.to_string()))
            .map_err(|_| format!("unknown phase '{}'", s))
    }
}

/// The interaction a step asks the user for.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum InputState {
    #[default]
    None,
    ChooseSubstance {
        #[serde(rename = "substanceType")]
        substance_type: SubstanceType,
    },
    SetWaterLevel,
    AddSubstance {
        #[serde(rename = "substanceType", default)]
        substance_type: Option<SubstanceType>,
    },
    AddSalt,
    AddStrongSubstance,
    AddIndicator,
    AddTitrant,
    SetTitrantMolarity,
}

/// Field-less view of [`InputState`] used for input gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputKind {
    None,
    ChooseSubstance,
    SetWaterLevel,
    AddSubstance,
    AddSalt,
    AddStrongSubstance,
    AddIndicator,
    AddTitrant,
    SetTitrantMolarity,
}

impl InputState {
    pub fn kind(&self) -> InputKind {
        match self {
            InputState::None => InputKind::None,
            InputState::ChooseSubstance { .. } => InputKind::ChooseSubstance,
            InputState::SetWaterLevel => InputKind::SetWaterLevel,
            InputState::AddSubstance { .. } => InputKind::AddSubstance,
            InputState::AddSalt => InputKind::AddSalt,
            InputState::AddStrongSubstance => InputKind::AddStrongSubstance,
            InputState::AddIndicator => InputKind::AddIndicator,
            InputState::AddTitrant => InputKind::AddTitrant,
            InputState::SetTitrantMolarity => InputKind::SetTitrantMolarity,
        }
    }

    /// Substance type this input is about, when it names one.
    pub fn substance_type(&self) -> Option<SubstanceType> {
        match self {
            InputState::ChooseSubstance { substance_type } => Some(*substance_type),
            InputState::AddSubstance { substance_type } => *substance_type,
            _ => None,
        }
    }

    /// Setup steps start a sub-lesson from a clean beaker.
    pub fn is_setup(&self) -> bool {
        matches!(self, InputState::ChooseSubstance { .. } | InputState::SetWaterLevel)
    }

    /// Inputs that add material to the beaker.
    pub fn is_additive(&self) -> bool {
        matches!(
            self,
            InputState::AddSubstance { .. }
                | InputState::AddSalt
                | InputState::AddStrongSubstance
                | InputState::AddIndicator
                | InputState::AddTitrant
        )
    }
}

/// Simulation condition that advances a step on its own.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum AutoAdvance {
    /// The externally computed equilibrium flag became true.
    Equilibrium,
    /// Strong substance added reached the step budget.
    Exhaustion {
        /// Re-derive the budget from the beaker on entry.
        #[serde(rename = "deriveMax", default)]
        derive_max: bool,
    },
    /// Strong substance added since entry crossed `fraction` of the budget.
    Midpoint {
        #[serde(default = "default_midpoint_fraction")]
        fraction: f64,
        #[serde(rename = "deriveMax", default)]
        derive_max: bool,
    },
    /// No more titrant may be added in the current phase.
    TitrantExhausted,
    /// The indicator dropper is empty.
    IndicatorFilled,
    /// No more substance may be added.
    SubstanceExhausted,
}

fn default_midpoint_fraction() -> f64 {
    MIDPOINT_FRACTION
}

/// Whether the beaker is drawn as particles or as a solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BeakerView {
    #[default]
    Microscopic,
    Macroscopic,
}

/// Declarative side effect applied when a step is entered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StepAction {
    SetPhase(SimulationPhase),
    /// Start a new sub-lesson on a different substance type.
    SwitchSection(SubstanceType),
    SetBeakerView(BeakerView),
    ShowIndicatorFill(bool),
    ShowTitrantFill(bool),
    ShowPhString(bool),
    SubstanceSelectorOpen(bool),
}

impl StepAction {
    /// Parse a `key=value` action string. Whitespace is ignored.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
        let (key, value) = compact
            .split_once('=')
            .ok_or_else(|| "expected key=value".to_string())?;

        let flag = |v: &str| match v {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(format!("expected true/false, got '{}'", other)),
        };

        match key {
            "phase" => value.parse().map(StepAction::SetPhase),
            "section" | "substance" => value.parse().map(StepAction::SwitchSection),
            "beakerState" => match value {
                "macroscopic" => Ok(StepAction::SetBeakerView(BeakerView::Macroscopic)),
                "microscopic" => Ok(StepAction::SetBeakerView(BeakerView::Microscopic)),
                other => Err(format!("unknown beaker state '{}'", other)),
            },
            "showIndicatorFill" => flag(value).map(StepAction::ShowIndicatorFill),
            "showTitrantFill" => flag(value).map(StepAction::ShowTitrantFill),
            "showPhString" => flag(value).map(StepAction::ShowPhString),
            "substanceSelectionIsToggled" | "substanceSelectorOpen" => {
                flag(value).map(StepAction::SubstanceSelectorOpen)
            }
            other => Err(format!("unknown action key '{}'", other)),
        }
    }
}

/// One step of a guided lesson.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuideStep {
    pub id: String,
    pub input: InputState,
    /// UI element ids eligible for spotlighting.
    pub highlights: Vec<String>,
    /// Statement template lines; see [`crate::statements`].
    pub statement: Vec<String>,
    /// Advancing waits for the input condition.
    pub requires_action: bool,
    /// Capture a simulation snapshot on entry.
    pub checkpoint: bool,
    /// Step that `back` returns to instead of the previous index.
    pub back_target: Option<String>,
    pub auto_advance: Option<AutoAdvance>,
    pub auto_advance_after_seconds: Option<f64>,
    pub actions: Vec<StepAction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStep {
    id: String,
    #[serde(default)]
    input: InputState,
    #[serde(default)]
    highlights: Vec<String>,
    #[serde(default)]
    statement: Vec<String>,
    #[serde(default)]
    requires_action: bool,
    #[serde(default)]
    checkpoint: bool,
    #[serde(default)]
    back_target: Option<String>,
    #[serde(default)]
    auto_advance: Option<AutoAdvance>,
    #[serde(default)]
    auto_advance_after_seconds: Option<f64>,
    #[serde(default)]
    actions: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawScript {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    completion_route: Option<String>,
    steps: Vec<RawStep>,
}

/// A parsed and validated lesson.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LessonScript {
    pub id: String,
    pub title: String,
    /// Where the caller navigates once the last step is passed.
    pub completion_route: Option<String>,
    pub steps: Vec<GuideStep>,
}

/// Problems found while loading a lesson script.
#[derive(Error, Debug)]
pub enum ScriptError {
    #[error("lesson script is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("lesson '{0}' has no steps")]
    Empty(String),

    #[error("duplicate step id '{0}'")]
    DuplicateStep(String),

    #[error("step '{step}' refers to undefined step '{target}'")]
    UnknownStep { step: String, target: String },

    #[error("step '{step}' loops back to '{target}', which does not come before it")]
    BackTargetNotEarlier { step: String, target: String },

    #[error("step '{step}' has invalid action '{action}': {reason}")]
    BadAction {
        step: String,
        action: String,
        reason: String,
    },

    #[error("step '{step}' has a non-positive auto-advance delay")]
    BadDelay { step: String },

    #[error("step '{step}' has midpoint fraction {fraction}, outside (0, 1]")]
    BadMidpoint { step: String, fraction: f64 },
}

impl LessonScript {
    /// Parse and validate a JSON lesson script.
    pub fn from_json(json: &str) -> Result<Self, ScriptError> {
        let raw: RawScript = serde_json::from_str(json)?;

        let mut steps = Vec::with_capacity(raw.steps.len());
        for step in raw.steps {
            let actions = step
                .actions
                .iter()
                .map(|a| {
                    StepAction::parse(a).map_err(|reason| ScriptError::BadAction {
                        step: step.id.clone(),
                        action: a.clone(),
                        reason,
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;

            steps.push(GuideStep {
                id: step.id,
                input: step.input,
                highlights: step.highlights,
                statement: step.statement,
                requires_action: step.requires_action,
                checkpoint: step.checkpoint,
                back_target: step.back_target,
                auto_advance: step.auto_advance,
                auto_advance_after_seconds: step.auto_advance_after_seconds,
                actions,
            });
        }

        let script = Self {
            id: raw.id,
            title: raw.title,
            completion_route: raw.completion_route,
            steps,
        };
        script.validate()?;
        Ok(script)
    }

    /// Check step id uniqueness and every cross-reference.
    pub fn validate(&self) -> Result<(), ScriptError> {
        if self.steps.is_empty() {
            return Err(ScriptError::Empty(self.id.clone()));
        }

        let mut seen = std::collections::HashSet::new();
        for step in &self.steps {
            if !seen.insert(step.id.as_str()) {
                return Err(ScriptError::DuplicateStep(step.id.clone()));
            }
        }

        for (index, step) in self.steps.iter().enumerate() {
            if let Some(target) = &step.back_target {
                match self.index_of(target) {
                    None => {
                        return Err(ScriptError::UnknownStep {
                            step: step.id.clone(),
                            target: target.clone(),
                        })
                    }
                    Some(t) if t >= index => {
                        return Err(ScriptError::BackTargetNotEarlier {
                            step: step.id.clone(),
                            target: target.clone(),
                        })
                    }
                    Some(_) => {}
                }
            }
            if let Some(delay) = step.auto_advance_after_seconds {
                if !(delay.is_finite() && delay > 0.0) {
                    return Err(ScriptError::BadDelay {
                        step: step.id.clone(),
                    });
                }
            }
            if let Some(AutoAdvance::Midpoint { fraction, .. }) = step.auto_advance {
                if !(fraction > 0.0 && fraction <= 1.0) {
                    return Err(ScriptError::BadMidpoint {
                        step: step.id.clone(),
                        fraction,
                    });
                }
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.id == id)
    }

    pub fn step(&self, id: &str) -> Option<&GuideStep> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Ids of all steps that capture snapshots.
    pub fn checkpoint_ids(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().filter(|s| s.checkpoint).map(|s| s.id.as_str())
    }
}
