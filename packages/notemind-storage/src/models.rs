use sqlx::types::Json;
use time::OffsetDateTime;

use notemind_domain::{ChatMessage, SessionState};

#[derive(Debug, sqlx::FromRow)]
pub struct ChatSessionRow {
	pub session_key: String,
	pub note_id: String,
	pub note_context: String,
	pub last_activity: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}
impl From<ChatSessionRow> for SessionState {
	fn from(row: ChatSessionRow) -> Self {
		Self { note_id: row.note_id, note_context: row.note_context, last_activity: row.last_activity }
	}
}

#[derive(Debug, sqlx::FromRow)]
pub struct ChatSessionMessagesRow {
	pub session_key: String,
	pub messages: Json<Vec<ChatMessage>>,
	pub updated_at: OffsetDateTime,
}

#[derive(Debug, sqlx::FromRow)]
pub struct ChatSessionAlarm {
	pub session_key: String,
	pub fire_at: OffsetDateTime,
}

#[derive(Debug, sqlx::FromRow)]
pub struct Note {
	pub note_id: String,
	pub title: String,
	pub content: String,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}
