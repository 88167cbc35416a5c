pub mod pipeline;
pub mod session;
pub mod store;
pub mod workflow;

mod error;

pub use error::{Error, Result};
pub use pipeline::{
	questions::{QuestionsPipeline, QuestionsResult, StudyQuestion},
	summary::{SummaryPipeline, SummaryResult},
};
pub use session::{
	PostMessageReply, PostMessageRequest, SessionHandle, SessionSettings,
	registry::SessionRegistry,
};
pub use store::{MemoryNoteSource, MemorySessionStore, PgNoteSource, PgSessionStore};

use std::{future::Future, pin::Pin, sync::Arc};

use serde_json::Value;
use time::OffsetDateTime;

use notemind_config::{Config, Generation, LlmProviderConfig};
use notemind_domain::{ChatMessage, SessionState, history::PromptMessage};
use notemind_providers::chat;
use notemind_storage::db::Db;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One chat completion per call. Implementations never retry.
pub trait ModelInvoker
where
	Self: Send + Sync,
{
	fn complete<'a>(
		&'a self,
		messages: &'a [PromptMessage],
		params: Generation,
	) -> BoxFuture<'a, color_eyre::Result<String>>;
}

/// Durable per-session records. Every method is scoped to one session key except
/// [`SessionStore::list_alarms`], which scans all pending wake-ups on startup.
pub trait SessionStore
where
	Self: Send + Sync,
{
	fn load_state<'a>(&'a self, session_key: &'a str) -> BoxFuture<'a, Result<Option<SessionState>>>;

	fn save_state<'a>(
		&'a self,
		session_key: &'a str,
		state: &'a SessionState,
	) -> BoxFuture<'a, Result<()>>;

	fn load_messages<'a>(&'a self, session_key: &'a str) -> BoxFuture<'a, Result<Vec<ChatMessage>>>;

	fn save_messages<'a>(
		&'a self,
		session_key: &'a str,
		messages: &'a [ChatMessage],
	) -> BoxFuture<'a, Result<()>>;

	fn delete_messages<'a>(&'a self, session_key: &'a str) -> BoxFuture<'a, Result<()>>;

	fn get_alarm<'a>(&'a self, session_key: &'a str) -> BoxFuture<'a, Result<Option<OffsetDateTime>>>;

	fn set_alarm<'a>(
		&'a self,
		session_key: &'a str,
		fire_at: OffsetDateTime,
	) -> BoxFuture<'a, Result<()>>;

	fn clear_alarm<'a>(&'a self, session_key: &'a str) -> BoxFuture<'a, Result<()>>;

	fn list_alarms(&self) -> BoxFuture<'_, Result<Vec<(String, OffsetDateTime)>>>;
}

#[derive(Clone, Debug, PartialEq)]
pub struct NoteDocument {
	pub note_id: String,
	pub title: String,
	pub content: String,
}

/// Read-only lookup of note title and content.
pub trait NoteSource
where
	Self: Send + Sync,
{
	fn fetch_note<'a>(&'a self, note_id: &'a str) -> BoxFuture<'a, Result<Option<NoteDocument>>>;
}

pub trait Clock
where
	Self: Send + Sync,
{
	fn now(&self) -> OffsetDateTime;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;
impl Clock for SystemClock {
	fn now(&self) -> OffsetDateTime {
		OffsetDateTime::now_utc()
	}
}

/// OpenAI-compatible chat completions over HTTP.
pub struct HttpModelInvoker {
	cfg: LlmProviderConfig,
}
impl HttpModelInvoker {
	pub fn new(cfg: LlmProviderConfig) -> Self {
		Self { cfg }
	}
}

impl ModelInvoker for HttpModelInvoker {
	fn complete<'a>(
		&'a self,
		messages: &'a [PromptMessage],
		params: Generation,
	) -> BoxFuture<'a, color_eyre::Result<String>> {
		Box::pin(async move {
			let payload: Vec<Value> = messages
				.iter()
				.map(|message| {
					serde_json::json!({ "role": message.role.as_str(), "content": message.content })
				})
				.collect();

			chat::complete(&self.cfg, &payload, params.max_tokens, params.temperature).await
		})
	}
}

/// Injected collaborators. Tests swap any of them for in-memory or stub versions.
#[derive(Clone)]
pub struct Components {
	pub store: Arc<dyn SessionStore>,
	pub notes: Arc<dyn NoteSource>,
	pub invoker: Arc<dyn ModelInvoker>,
	pub clock: Arc<dyn Clock>,
}
impl Components {
	pub fn postgres(cfg: &Config, db: Arc<Db>) -> Self {
		Self {
			store: Arc::new(PgSessionStore::new(db.clone())),
			notes: Arc::new(PgNoteSource::new(db)),
			invoker: Arc::new(HttpModelInvoker::new(cfg.providers.llm.clone())),
			clock: Arc::new(SystemClock),
		}
	}
}

#[derive(Clone, Debug)]
pub struct ServiceSettings {
	pub session: SessionSettings,
	pub pipelines: notemind_config::Pipelines,
}
impl ServiceSettings {
	pub fn from_config(cfg: &Config) -> Self {
		Self {
			session: SessionSettings::from_config(&cfg.session),
			pipelines: cfg.pipelines.clone(),
		}
	}
}
impl Default for ServiceSettings {
	fn default() -> Self {
		Self {
			session: SessionSettings::default(),
			pipelines: notemind_config::Pipelines::default(),
		}
	}
}

pub struct NotemindService {
	pub sessions: Arc<SessionRegistry>,
	pub notes: Arc<dyn NoteSource>,
	pub summary: SummaryPipeline,
	pub questions: QuestionsPipeline,
}
impl NotemindService {
	/// Starts the session registry (re-arming persisted wake-ups) and wires both pipelines to the
	/// shared invoker.
	pub async fn start(settings: ServiceSettings, components: Components) -> Result<Self> {
		let sessions = SessionRegistry::start(
			settings.session,
			components.store,
			components.invoker.clone(),
			components.clock,
		)
		.await?;

		Ok(Self {
			sessions,
			notes: components.notes,
			summary: SummaryPipeline::new(components.invoker.clone(), &settings.pipelines),
			questions: QuestionsPipeline::new(components.invoker, &settings.pipelines),
		})
	}

	pub fn session(&self, note_id: &str) -> Result<SessionHandle> {
		self.sessions.session(note_id)
	}
}
