//! Lesson scripts shipped with the engine.

use acidbase_logic::lesson::{LessonScript, ScriptError};

pub const INTRODUCTION_JSON: &str = include_str!("../../../data/lessons/introduction.json");
pub const BUFFERS_JSON: &str = include_str!("../../../data/lessons/buffers.json");
pub const TITRATION_JSON: &str = include_str!("../../../data/lessons/titration.json");

/// Ids of the bundled lessons, in menu order.
pub const LESSON_IDS: [&str; 3] = ["introduction", "buffers", "titration"];

pub fn introduction() -> Result<LessonScript, ScriptError> {
    LessonScript::from_json(INTRODUCTION_JSON)
}

pub fn buffers() -> Result<LessonScript, ScriptError> {
    LessonScript::from_json(BUFFERS_JSON)
}

pub fn titration() -> Result<LessonScript, ScriptError> {
    LessonScript::from_json(TITRATION_JSON)
}

/// Load a bundled lesson by id.
pub fn by_id(id: &str) -> Option<Result<LessonScript, ScriptError>> {
    match id {
        "introduction" => Some(introduction()),
        "buffers" => Some(buffers()),
        "titration" => Some(titration()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_bundled_lesson_parses() {
        for id in LESSON_IDS {
            let script = by_id(id).unwrap().unwrap_or_else(|e| panic!("{}: {}", id, e));
            assert_eq!(script.id, id);
        }
        assert!(by_id("thermodynamics").is_none());
    }
}
