//! Closed vocabularies for model-labelled fields. Anything a model returns outside a vocabulary maps
//! to that vocabulary's default.

use serde::{Deserialize, Serialize};

fn normalize(raw: &str) -> String {
	raw.trim().trim_matches(|c: char| !c.is_alphanumeric()).to_ascii_lowercase()
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
	Recall,
	#[default]
	Comprehension,
	Application,
}
impl QuestionType {
	pub fn parse(raw: &str) -> Option<Self> {
		match normalize(raw).as_str() {
			"recall" => Some(Self::Recall),
			"comprehension" => Some(Self::Comprehension),
			"application" => Some(Self::Application),
			_ => None,
		}
	}

	pub fn parse_or_default(raw: Option<&str>) -> Self {
		raw.and_then(Self::parse).unwrap_or_default()
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Recall => "recall",
			Self::Comprehension => "comprehension",
			Self::Application => "application",
		}
	}
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionDifficulty {
	Easy,
	#[default]
	Medium,
	Hard,
}
impl QuestionDifficulty {
	pub fn parse(raw: &str) -> Option<Self> {
		match normalize(raw).as_str() {
			"easy" => Some(Self::Easy),
			"medium" => Some(Self::Medium),
			"hard" => Some(Self::Hard),
			_ => None,
		}
	}

	pub fn parse_or_default(raw: Option<&str>) -> Self {
		raw.and_then(Self::parse).unwrap_or_default()
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Easy => "easy",
			Self::Medium => "medium",
			Self::Hard => "hard",
		}
	}
}

/// Overall level of a note, used to pitch generated questions.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteLevel {
	Beginner,
	#[default]
	Intermediate,
	Advanced,
}
impl NoteLevel {
	pub fn parse(raw: &str) -> Option<Self> {
		match normalize(raw).as_str() {
			"beginner" => Some(Self::Beginner),
			"intermediate" => Some(Self::Intermediate),
			"advanced" => Some(Self::Advanced),
			_ => None,
		}
	}

	/// Accepts either a bare label or a short sentence whose first recognised word is the label.
	pub fn from_free_text(raw: &str) -> Option<Self> {
		Self::parse(raw).or_else(|| raw.split_whitespace().find_map(Self::parse))
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Beginner => "beginner",
			Self::Intermediate => "intermediate",
			Self::Advanced => "advanced",
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn labels_are_case_and_whitespace_insensitive() {
		assert_eq!(QuestionType::parse("  Recall "), Some(QuestionType::Recall));
		assert_eq!(QuestionDifficulty::parse("HARD"), Some(QuestionDifficulty::Hard));
		assert_eq!(NoteLevel::parse("\"advanced\"."), Some(NoteLevel::Advanced));
	}

	#[test]
	fn unknown_labels_fall_back_to_defaults() {
		assert_eq!(QuestionType::parse_or_default(Some("analysis")), QuestionType::Comprehension);
		assert_eq!(QuestionType::parse_or_default(None), QuestionType::Comprehension);
		assert_eq!(QuestionDifficulty::parse_or_default(Some("extreme")), QuestionDifficulty::Medium);
	}

	#[test]
	fn level_is_found_inside_a_sentence() {
		assert_eq!(NoteLevel::from_free_text("This note is Beginner level."), Some(NoteLevel::Beginner));
		assert_eq!(NoteLevel::from_free_text("unclear"), None);
	}
}
