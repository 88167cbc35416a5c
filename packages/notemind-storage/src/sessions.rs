//! Per-session records: the session state row, the bounded message record, and the pending
//! wake-up. Every function is scoped to one session key.

use sqlx::types::Json;
use time::OffsetDateTime;

use notemind_domain::{ChatMessage, SessionState};

use crate::{
	Error, Result,
	db::Db,
	models::{ChatSessionAlarm, ChatSessionMessagesRow, ChatSessionRow},
};

pub async fn load_state(db: &Db, session_key: &str) -> Result<Option<SessionState>> {
	let row = sqlx::query_as::<_, ChatSessionRow>(
		"\
SELECT session_key, note_id, note_context, last_activity, updated_at
FROM chat_sessions
WHERE session_key = $1",
	)
	.bind(session_key)
	.fetch_optional(&db.pool)
	.await?;

	Ok(row.map(SessionState::from))
}

pub async fn save_state(db: &Db, session_key: &str, state: &SessionState) -> Result<()> {
	if session_key.trim().is_empty() {
		return Err(Error::InvalidArgument("session_key must be non-empty.".to_string()));
	}

	sqlx::query(
		"\
INSERT INTO chat_sessions (session_key, note_id, note_context, last_activity, updated_at)
VALUES ($1, $2, $3, $4, now())
ON CONFLICT (session_key) DO UPDATE
SET
	note_id = EXCLUDED.note_id,
	note_context = EXCLUDED.note_context,
	last_activity = EXCLUDED.last_activity,
	updated_at = now()",
	)
	.bind(session_key)
	.bind(state.note_id.as_str())
	.bind(state.note_context.as_str())
	.bind(state.last_activity)
	.execute(&db.pool)
	.await?;

	Ok(())
}

pub async fn load_messages(db: &Db, session_key: &str) -> Result<Vec<ChatMessage>> {
	let row = sqlx::query_as::<_, ChatSessionMessagesRow>(
		"\
SELECT session_key, messages, updated_at
FROM chat_session_messages
WHERE session_key = $1",
	)
	.bind(session_key)
	.fetch_optional(&db.pool)
	.await?;

	Ok(row.map(|row| row.messages.0).unwrap_or_default())
}

pub async fn save_messages(db: &Db, session_key: &str, messages: &[ChatMessage]) -> Result<()> {
	sqlx::query(
		"\
INSERT INTO chat_session_messages (session_key, messages, updated_at)
VALUES ($1, $2, now())
ON CONFLICT (session_key) DO UPDATE
SET messages = EXCLUDED.messages, updated_at = now()",
	)
	.bind(session_key)
	.bind(Json(messages))
	.execute(&db.pool)
	.await?;

	Ok(())
}

pub async fn delete_messages(db: &Db, session_key: &str) -> Result<()> {
	sqlx::query("DELETE FROM chat_session_messages WHERE session_key = $1")
		.bind(session_key)
		.execute(&db.pool)
		.await?;

	Ok(())
}

pub async fn get_alarm(db: &Db, session_key: &str) -> Result<Option<OffsetDateTime>> {
	let fire_at = sqlx::query_scalar::<_, OffsetDateTime>(
		"SELECT fire_at FROM chat_session_alarms WHERE session_key = $1",
	)
	.bind(session_key)
	.fetch_optional(&db.pool)
	.await?;

	Ok(fire_at)
}

/// Replaces any pending wake-up for the session; there is never more than one.
pub async fn set_alarm(db: &Db, session_key: &str, fire_at: OffsetDateTime) -> Result<()> {
	sqlx::query(
		"\
INSERT INTO chat_session_alarms (session_key, fire_at)
VALUES ($1, $2)
ON CONFLICT (session_key) DO UPDATE
SET fire_at = EXCLUDED.fire_at",
	)
	.bind(session_key)
	.bind(fire_at)
	.execute(&db.pool)
	.await?;

	Ok(())
}

pub async fn clear_alarm(db: &Db, session_key: &str) -> Result<()> {
	sqlx::query("DELETE FROM chat_session_alarms WHERE session_key = $1")
		.bind(session_key)
		.execute(&db.pool)
		.await?;

	Ok(())
}

pub async fn list_alarms(db: &Db) -> Result<Vec<ChatSessionAlarm>> {
	let alarms = sqlx::query_as::<_, ChatSessionAlarm>(
		"SELECT session_key, fire_at FROM chat_session_alarms ORDER BY fire_at ASC",
	)
	.fetch_all(&db.pool)
	.await?;

	Ok(alarms)
}
