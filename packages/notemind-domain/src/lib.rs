pub mod history;
pub mod idle;
pub mod message;
pub mod stage_output;
pub mod time_serde;
pub mod vocab;

pub use message::{ChatMessage, Role, SessionState};
pub use stage_output::{FallbackReason, StageOutput};
pub use vocab::{NoteLevel, QuestionDifficulty, QuestionType};

/// Cuts `text` to at most `max_chars` characters, never splitting a character.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
	match text.char_indices().nth(max_chars) {
		Some((idx, _)) => &text[..idx],
		None => text,
	}
}

/// Stable actor key for the session that belongs to `note_id`.
pub fn session_key(note_id: &str) -> String {
	format!("note:{}", note_id.trim())
}
