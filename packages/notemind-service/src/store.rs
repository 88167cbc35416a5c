//! [`SessionStore`] and [`NoteSource`] backends: Postgres for the running service and in-memory
//! maps for tests and local runs.

use std::{
	collections::HashMap,
	sync::{
		Arc, Mutex, MutexGuard,
		atomic::{AtomicUsize, Ordering},
	},
};

use time::OffsetDateTime;

use notemind_domain::{ChatMessage, SessionState};
use notemind_storage::{db::Db, notes, sessions};

use crate::{BoxFuture, NoteDocument, NoteSource, Result, SessionStore};

pub struct PgSessionStore {
	db: Arc<Db>,
}
impl PgSessionStore {
	pub fn new(db: Arc<Db>) -> Self {
		Self { db }
	}
}

impl SessionStore for PgSessionStore {
	fn load_state<'a>(&'a self, session_key: &'a str) -> BoxFuture<'a, Result<Option<SessionState>>> {
		Box::pin(async move { Ok(sessions::load_state(&self.db, session_key).await?) })
	}

	fn save_state<'a>(
		&'a self,
		session_key: &'a str,
		state: &'a SessionState,
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move { Ok(sessions::save_state(&self.db, session_key, state).await?) })
	}

	fn load_messages<'a>(&'a self, session_key: &'a str) -> BoxFuture<'a, Result<Vec<ChatMessage>>> {
		Box::pin(async move { Ok(sessions::load_messages(&self.db, session_key).await?) })
	}

	fn save_messages<'a>(
		&'a self,
		session_key: &'a str,
		messages: &'a [ChatMessage],
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move { Ok(sessions::save_messages(&self.db, session_key, messages).await?) })
	}

	fn delete_messages<'a>(&'a self, session_key: &'a str) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move { Ok(sessions::delete_messages(&self.db, session_key).await?) })
	}

	fn get_alarm<'a>(&'a self, session_key: &'a str) -> BoxFuture<'a, Result<Option<OffsetDateTime>>> {
		Box::pin(async move { Ok(sessions::get_alarm(&self.db, session_key).await?) })
	}

	fn set_alarm<'a>(
		&'a self,
		session_key: &'a str,
		fire_at: OffsetDateTime,
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move { Ok(sessions::set_alarm(&self.db, session_key, fire_at).await?) })
	}

	fn clear_alarm<'a>(&'a self, session_key: &'a str) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move { Ok(sessions::clear_alarm(&self.db, session_key).await?) })
	}

	fn list_alarms(&self) -> BoxFuture<'_, Result<Vec<(String, OffsetDateTime)>>> {
		Box::pin(async move {
			let alarms = sessions::list_alarms(&self.db).await?;

			Ok(alarms.into_iter().map(|alarm| (alarm.session_key, alarm.fire_at)).collect())
		})
	}
}

pub struct PgNoteSource {
	db: Arc<Db>,
}
impl PgNoteSource {
	pub fn new(db: Arc<Db>) -> Self {
		Self { db }
	}
}

impl NoteSource for PgNoteSource {
	fn fetch_note<'a>(&'a self, note_id: &'a str) -> BoxFuture<'a, Result<Option<NoteDocument>>> {
		Box::pin(async move {
			let note = notes::fetch_note(&self.db, note_id).await?;

			Ok(note.map(|note| NoteDocument {
				note_id: note.note_id,
				title: note.title,
				content: note.content,
			}))
		})
	}
}

#[derive(Clone, Debug, Default)]
struct MemorySession {
	state: Option<SessionState>,
	messages: Option<Vec<ChatMessage>>,
	alarm: Option<OffsetDateTime>,
}

/// Process-local store. `writes` counts every mutating call so tests can assert that an operation
/// left storage untouched.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
	sessions: Mutex<HashMap<String, MemorySession>>,
	writes: AtomicUsize,
}
impl MemorySessionStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn writes(&self) -> usize {
		self.writes.load(Ordering::SeqCst)
	}

	fn lock(&self) -> MutexGuard<'_, HashMap<String, MemorySession>> {
		self.sessions.lock().unwrap_or_else(|err| err.into_inner())
	}

	fn write(&self, session_key: &str, f: impl FnOnce(&mut MemorySession)) {
		self.writes.fetch_add(1, Ordering::SeqCst);

		let mut sessions = self.lock();

		f(sessions.entry(session_key.to_string()).or_default());
	}

	fn read<T>(&self, session_key: &str, f: impl FnOnce(&MemorySession) -> T) -> Option<T> {
		self.lock().get(session_key).map(f)
	}
}

impl SessionStore for MemorySessionStore {
	fn load_state<'a>(&'a self, session_key: &'a str) -> BoxFuture<'a, Result<Option<SessionState>>> {
		let state = self.read(session_key, |session| session.state.clone()).flatten();

		Box::pin(async move { Ok(state) })
	}

	fn save_state<'a>(
		&'a self,
		session_key: &'a str,
		state: &'a SessionState,
	) -> BoxFuture<'a, Result<()>> {
		self.write(session_key, |session| session.state = Some(state.clone()));

		Box::pin(async move { Ok(()) })
	}

	fn load_messages<'a>(&'a self, session_key: &'a str) -> BoxFuture<'a, Result<Vec<ChatMessage>>> {
		let messages =
			self.read(session_key, |session| session.messages.clone()).flatten().unwrap_or_default();

		Box::pin(async move { Ok(messages) })
	}

	fn save_messages<'a>(
		&'a self,
		session_key: &'a str,
		messages: &'a [ChatMessage],
	) -> BoxFuture<'a, Result<()>> {
		self.write(session_key, |session| session.messages = Some(messages.to_vec()));

		Box::pin(async move { Ok(()) })
	}

	fn delete_messages<'a>(&'a self, session_key: &'a str) -> BoxFuture<'a, Result<()>> {
		self.write(session_key, |session| session.messages = None);

		Box::pin(async move { Ok(()) })
	}

	fn get_alarm<'a>(&'a self, session_key: &'a str) -> BoxFuture<'a, Result<Option<OffsetDateTime>>> {
		let alarm = self.read(session_key, |session| session.alarm).flatten();

		Box::pin(async move { Ok(alarm) })
	}

	fn set_alarm<'a>(
		&'a self,
		session_key: &'a str,
		fire_at: OffsetDateTime,
	) -> BoxFuture<'a, Result<()>> {
		self.write(session_key, |session| session.alarm = Some(fire_at));

		Box::pin(async move { Ok(()) })
	}

	fn clear_alarm<'a>(&'a self, session_key: &'a str) -> BoxFuture<'a, Result<()>> {
		self.write(session_key, |session| session.alarm = None);

		Box::pin(async move { Ok(()) })
	}

	fn list_alarms(&self) -> BoxFuture<'_, Result<Vec<(String, OffsetDateTime)>>> {
		let mut alarms: Vec<_> = self
			.lock()
			.iter()
			.filter_map(|(key, session)| session.alarm.map(|at| (key.clone(), at)))
			.collect();

		alarms.sort_by_key(|(_, at)| *at);

		Box::pin(async move { Ok(alarms) })
	}
}

#[derive(Debug, Default)]
pub struct MemoryNoteSource {
	notes: Mutex<HashMap<String, NoteDocument>>,
}
impl MemoryNoteSource {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&self, note_id: &str, title: &str, content: &str) {
		let note = NoteDocument {
			note_id: note_id.to_string(),
			title: title.to_string(),
			content: content.to_string(),
		};

		self.notes.lock().unwrap_or_else(|err| err.into_inner()).insert(note_id.to_string(), note);
	}
}

impl NoteSource for MemoryNoteSource {
	fn fetch_note<'a>(&'a self, note_id: &'a str) -> BoxFuture<'a, Result<Option<NoteDocument>>> {
		let note = self.notes.lock().unwrap_or_else(|err| err.into_inner()).get(note_id).cloned();

		Box::pin(async move { Ok(note) })
	}
}

#[cfg(test)]
mod tests {
	use time::macros::datetime;

	use super::*;

	#[tokio::test]
	async fn reads_do_not_count_as_writes() {
		let store = MemorySessionStore::new();

		assert!(store.load_state("note:a").await.expect("load failed").is_none());
		assert!(store.load_messages("note:a").await.expect("load failed").is_empty());
		assert_eq!(store.writes(), 0);

		store.delete_messages("note:a").await.expect("delete failed");

		assert_eq!(store.writes(), 1);
	}

	#[tokio::test]
	async fn alarms_are_listed_in_fire_order() {
		let store = MemorySessionStore::new();

		store.set_alarm("note:b", datetime!(2026-01-02 00:00 UTC)).await.expect("set failed");
		store.set_alarm("note:a", datetime!(2026-01-03 00:00 UTC)).await.expect("set failed");
		store.set_alarm("note:a", datetime!(2026-01-01 00:00 UTC)).await.expect("set failed");

		let alarms = store.list_alarms().await.expect("list failed");

		assert_eq!(
			alarms,
			vec![
				("note:a".to_string(), datetime!(2026-01-01 00:00 UTC)),
				("note:b".to_string(), datetime!(2026-01-02 00:00 UTC)),
			]
		);
	}
}
