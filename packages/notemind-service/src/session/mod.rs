//! Per-note conversational sessions.
//!
//! Each session key is owned by one [`actor::SessionActor`] task that drains an `mpsc` mailbox one
//! command at a time, so every operation on a key observes the effects of the ones before it.
//! Callers talk to the actor through a [`SessionHandle`]; replies come back on `oneshot` channels.
//! An actor whose key has expired is retired and respawned on the next command.

pub mod alarm;
pub mod registry;

mod actor;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::Duration;
use tokio::sync::oneshot;

use notemind_config::Generation;
use notemind_domain::{ChatMessage, history::HistoryLimits};

use crate::{Error, Result, session::registry::SessionRegistry};

#[derive(Clone, Debug)]
pub struct SessionSettings {
	pub limits: HistoryLimits,
	pub idle_timeout: Duration,
	pub chat: Generation,
	pub mailbox_capacity: usize,
}
impl SessionSettings {
	pub fn from_config(cfg: &notemind_config::Session) -> Self {
		Self {
			limits: HistoryLimits::from_config(cfg),
			idle_timeout: Duration::hours(cfg.idle_timeout_hours),
			chat: cfg.chat,
			mailbox_capacity: cfg.mailbox_capacity as usize,
		}
	}
}
impl Default for SessionSettings {
	fn default() -> Self {
		Self::from_config(&notemind_config::Session::default())
	}
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostMessageRequest {
	pub message: String,
	#[serde(default)]
	pub note_context: Option<String>,
	/// Idempotency key. A retry carrying the id of the newest stored user message does not append
	/// it again.
	#[serde(default)]
	pub client_message_id: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct PostMessageReply {
	pub reply: String,
	pub history: Vec<ChatMessage>,
}

type Reply<T> = oneshot::Sender<Result<T>>;

pub(crate) enum SessionCommand {
	Initialize { note_id: String, note_context: String, reply: Reply<()> },
	PostMessage { request: PostMessageRequest, reply: Reply<PostMessageReply> },
	StoreMessage { role: String, content: String, reply: Reply<()> },
	GetHistory { reply: Reply<Vec<ChatMessage>> },
	Clear { reply: Reply<()> },
	IdleTimeout,
}

/// Cloneable address of one session key. Every request goes through the registry, so a handle
/// outlives the retirement of the actor behind it.
#[derive(Clone)]
pub struct SessionHandle {
	note_id: String,
	session_key: String,
	registry: Arc<SessionRegistry>,
}
impl SessionHandle {
	pub(crate) fn new(note_id: &str, session_key: String, registry: Arc<SessionRegistry>) -> Self {
		Self { note_id: note_id.trim().to_string(), session_key, registry }
	}

	pub fn session_key(&self) -> &str {
		&self.session_key
	}

	pub async fn init(&self, note_context: &str) -> Result<()> {
		let note_id = self.note_id.clone();
		let note_context = note_context.to_string();

		self.request(|reply| SessionCommand::Initialize { note_id, note_context, reply }).await
	}

	pub async fn post_message(&self, request: PostMessageRequest) -> Result<PostMessageReply> {
		self.request(|reply| SessionCommand::PostMessage { request, reply }).await
	}

	pub async fn store_message(&self, role: &str, content: &str) -> Result<()> {
		let role = role.to_string();
		let content = content.to_string();

		self.request(|reply| SessionCommand::StoreMessage { role, content, reply }).await
	}

	pub async fn history(&self) -> Result<Vec<ChatMessage>> {
		self.request(|reply| SessionCommand::GetHistory { reply }).await
	}

	pub async fn clear(&self) -> Result<()> {
		self.request(|reply| SessionCommand::Clear { reply }).await
	}

	async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> SessionCommand) -> Result<T> {
		let (reply, rx) = oneshot::channel();

		self.registry.deliver(&self.session_key, build(reply)).await?;

		rx.await.map_err(|_| Error::ActorUnavailable {
			message: format!("Session {} dropped the reply.", self.session_key),
		})?
	}
}

impl std::fmt::Debug for SessionCommand {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let name = match self {
			Self::Initialize { .. } => "Initialize",
			Self::PostMessage { .. } => "PostMessage",
			Self::StoreMessage { .. } => "StoreMessage",
			Self::GetHistory { .. } => "GetHistory",
			Self::Clear { .. } => "Clear",
			Self::IdleTimeout => "IdleTimeout",
		};

		f.write_str(name)
	}
}
