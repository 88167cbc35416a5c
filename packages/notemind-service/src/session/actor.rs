use std::sync::{Arc, Weak};

use time::OffsetDateTime;
use tokio::sync::mpsc;

use notemind_domain::{
	ChatMessage, Role, SessionState,
	history,
	idle::{self, IdleDecision},
	truncate_chars,
};

use crate::{
	Clock, Error, ModelInvoker, Result, SessionStore,
	session::{
		PostMessageReply, PostMessageRequest, SessionCommand, SessionSettings, alarm::AlarmScheduler,
		registry::{Envelope, SessionRegistry},
	},
};

/// Everything an actor needs besides its key. Shared by every actor the registry spawns.
#[derive(Clone)]
pub(crate) struct ActorDeps {
	pub(crate) settings: SessionSettings,
	pub(crate) store: Arc<dyn SessionStore>,
	pub(crate) invoker: Arc<dyn ModelInvoker>,
	pub(crate) clock: Arc<dyn Clock>,
	pub(crate) alarms: AlarmScheduler,
}

pub(crate) struct SessionActor {
	session_key: String,
	deps: ActorDeps,
}
impl SessionActor {
	pub(crate) fn new(session_key: String, deps: ActorDeps) -> Self {
		Self { session_key, deps }
	}

	/// Drains the mailbox until the registry retires this key and every sender is gone.
	pub(crate) async fn run(
		self,
		mut rx: mpsc::Receiver<Envelope>,
		registry: Weak<SessionRegistry>,
	) {
		while let Some(envelope) = rx.recv().await {
			let dormant = self.handle(envelope.open()).await;

			if dormant && registry.upgrade().is_some_and(|registry| registry.retire(self.key())) {
				tracing::debug!(session_key = self.key(), "Dormant session actor retired.");
			}
		}

		tracing::debug!(session_key = self.key(), "Session mailbox closed.");
	}

	/// Returns `true` when the key is left with no pending wake-up, so the actor may be retired.
	pub(crate) async fn handle(&self, command: SessionCommand) -> bool {
		tracing::trace!(session_key = self.key(), ?command, "Session command dequeued.");

		// A dropped reply receiver means the caller gave up; the command still ran to completion.
		match command {
			SessionCommand::Initialize { note_id, note_context, reply } => {
				let _ = reply.send(self.initialize(&note_id, &note_context).await);
			},
			SessionCommand::PostMessage { request, reply } => {
				let _ = reply.send(self.post_message(request).await);
			},
			SessionCommand::StoreMessage { role, content, reply } => {
				let _ = reply.send(self.store_message(&role, &content).await);
			},
			SessionCommand::GetHistory { reply } => {
				let _ = reply.send(self.history().await);
			},
			SessionCommand::Clear { reply } => {
				let _ = reply.send(self.clear().await);
			},
			SessionCommand::IdleTimeout => match self.on_idle_timeout().await {
				Ok(dormant) => return dormant,
				Err(err) => {
					tracing::warn!(session_key = self.key(), error = %err, "Idle wake-up failed.");
				},
			},
		}

		false
	}

	fn key(&self) -> &str {
		&self.session_key
	}

	fn max_stored(&self) -> usize {
		self.deps.settings.limits.max_stored_messages
	}

	fn bounded_context(&self, note_context: &str) -> String {
		truncate_chars(note_context, self.deps.settings.limits.max_note_context_chars).to_string()
	}

	async fn initialize(&self, note_id: &str, note_context: &str) -> Result<()> {
		let now = self.deps.clock.now();
		let state = SessionState {
			note_id: note_id.trim().to_string(),
			note_context: self.bounded_context(note_context),
			last_activity: now,
		};

		self.deps.store.save_state(self.key(), &state).await?;
		self.schedule_wake(idle::wake_at(now, self.deps.settings.idle_timeout)).await?;

		tracing::info!(session_key = self.key(), note_id = state.note_id.as_str(), "Session initialized.");

		Ok(())
	}

	async fn post_message(&self, request: PostMessageRequest) -> Result<PostMessageReply> {
		let Some(mut state) = self.deps.store.load_state(self.key()).await? else {
			return Err(Error::SessionNotInitialized { session_key: self.key().to_string() });
		};
		let message = request.message.trim();

		if message.is_empty() {
			return Err(Error::invalid_input("message must be non-empty."));
		}

		let client_message_id =
			request.client_message_id.filter(|id| !id.trim().is_empty()).map(|id| id.trim().to_string());
		let now = self.deps.clock.now();

		if let Some(note_context) = request.note_context.as_deref() {
			state.note_context = self.bounded_context(note_context);
			state.last_activity = now;

			self.deps.store.save_state(self.key(), &state).await?;
		}

		let mut messages = self.deps.store.load_messages(self.key()).await?;
		let is_retry = client_message_id.is_some()
			&& messages.last().is_some_and(|last| {
				last.role == Role::User && last.client_message_id == client_message_id
			});

		if is_retry {
			tracing::debug!(
				session_key = self.key(),
				"User message already stored for this client message id; retrying the reply only."
			);
		} else {
			let user_message =
				ChatMessage::new(Role::User, message, now).with_client_message_id(client_message_id);

			history::append(&mut messages, user_message, self.max_stored());

			self.deps.store.save_messages(self.key(), &messages).await?;
		}

		// The stored user message must expire even if the model call below fails.
		self.ensure_wake().await?;

		let window =
			history::context_window(&messages, &state.note_context, &self.deps.settings.limits);
		let reply = match self.deps.invoker.complete(&window, self.deps.settings.chat).await {
			Ok(reply) => reply,
			Err(err) => {
				tracing::warn!(session_key = self.key(), error = %err, "Chat model call failed.");

				return Err(Error::ModelCallFailed { message: err.to_string() });
			},
		};
		let replied_at = self.deps.clock.now();

		history::append(
			&mut messages,
			ChatMessage::new(Role::Assistant, reply.clone(), replied_at),
			self.max_stored(),
		);

		self.deps.store.save_messages(self.key(), &messages).await?;

		state.last_activity = replied_at;

		self.deps.store.save_state(self.key(), &state).await?;

		Ok(PostMessageReply { reply, history: messages })
	}

	async fn store_message(&self, role: &str, content: &str) -> Result<()> {
		if role.trim().is_empty() || content.trim().is_empty() {
			return Err(Error::invalid_input("role and content must be non-empty."));
		}

		let role: Role = role.parse().map_err(Error::invalid_input)?;
		let now = self.deps.clock.now();
		let mut messages = self.deps.store.load_messages(self.key()).await?;

		history::append(&mut messages, ChatMessage::new(role, content, now), self.max_stored());

		self.deps.store.save_messages(self.key(), &messages).await?;

		if let Some(mut state) = self.deps.store.load_state(self.key()).await? {
			state.last_activity = now;

			self.deps.store.save_state(self.key(), &state).await?;
			self.ensure_wake().await?;
		}

		tracing::debug!(session_key = self.key(), role = role.as_str(), "Message stored.");

		Ok(())
	}

	async fn history(&self) -> Result<Vec<ChatMessage>> {
		self.deps.store.load_messages(self.key()).await
	}

	async fn clear(&self) -> Result<()> {
		self.deps.store.delete_messages(self.key()).await?;

		tracing::info!(session_key = self.key(), "Session history cleared.");

		Ok(())
	}

	async fn on_idle_timeout(&self) -> Result<bool> {
		let Some(state) = self.deps.store.load_state(self.key()).await? else {
			self.drop_wake().await?;

			return Ok(true);
		};

		match idle::decide(self.deps.clock.now(), state.last_activity, self.deps.settings.idle_timeout)
		{
			IdleDecision::Expire => {
				self.deps.store.delete_messages(self.key()).await?;
				self.drop_wake().await?;

				tracing::info!(session_key = self.key(), "Idle session expired; history dropped.");

				Ok(true)
			},
			IdleDecision::Reschedule(fire_at) => {
				self.schedule_wake(fire_at).await?;

				tracing::debug!(session_key = self.key(), %fire_at, "Idle wake-up rescheduled.");

				Ok(false)
			},
		}
	}

	async fn schedule_wake(&self, fire_at: OffsetDateTime) -> Result<()> {
		self.deps.store.set_alarm(self.key(), fire_at).await?;
		self.deps.alarms.arm(self.key(), fire_at);

		Ok(())
	}

	/// Activity on a session whose wake-up already ran (or never existed) arms one a full timeout
	/// from now, so an active session always has exactly one pending wake-up.
	async fn ensure_wake(&self) -> Result<()> {
		if self.deps.store.get_alarm(self.key()).await?.is_none() {
			self.schedule_wake(idle::wake_at(self.deps.clock.now(), self.deps.settings.idle_timeout))
				.await?;
		}

		Ok(())
	}

	async fn drop_wake(&self) -> Result<()> {
		self.deps.store.clear_alarm(self.key()).await?;
		self.deps.alarms.cancel(self.key());

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Mutex;

	use time::{Duration, macros::datetime};
	use tokio::sync::oneshot;

	use notemind_config::Generation;
	use notemind_domain::history::PromptMessage;

	use super::*;
	use crate::{BoxFuture, MemorySessionStore};

	struct ManualClock(Mutex<OffsetDateTime>);
	impl ManualClock {
		fn set(&self, now: OffsetDateTime) {
			*self.0.lock().unwrap_or_else(|err| err.into_inner()) = now;
		}
	}

	impl Clock for ManualClock {
		fn now(&self) -> OffsetDateTime {
			*self.0.lock().unwrap_or_else(|err| err.into_inner())
		}
	}

	struct EchoInvoker;
	impl ModelInvoker for EchoInvoker {
		fn complete<'a>(
			&'a self,
			messages: &'a [PromptMessage],
			_params: Generation,
		) -> BoxFuture<'a, color_eyre::Result<String>> {
			let last = messages.last().map(|message| message.content.clone()).unwrap_or_default();

			Box::pin(async move { Ok(format!("echo: {last}")) })
		}
	}

	struct OfflineInvoker;
	impl ModelInvoker for OfflineInvoker {
		fn complete<'a>(
			&'a self,
			_messages: &'a [PromptMessage],
			_params: Generation,
		) -> BoxFuture<'a, color_eyre::Result<String>> {
			Box::pin(async { Err(color_eyre::eyre::eyre!("model offline")) })
		}
	}

	const START: OffsetDateTime = datetime!(2026-05-01 09:00 UTC);

	fn actor() -> (SessionActor, Arc<MemorySessionStore>, Arc<ManualClock>) {
		actor_with(Arc::new(EchoInvoker))
	}

	fn actor_with(
		invoker: Arc<dyn ModelInvoker>,
	) -> (SessionActor, Arc<MemorySessionStore>, Arc<ManualClock>) {
		let store = Arc::new(MemorySessionStore::new());
		let clock = Arc::new(ManualClock(Mutex::new(START)));
		let (alarms, _fired) = AlarmScheduler::spawn(clock.clone());
		let deps = ActorDeps {
			settings: SessionSettings::default(),
			store: store.clone(),
			invoker,
			clock: clock.clone(),
			alarms,
		};

		(SessionActor::new("note:n1".to_string(), deps), store, clock)
	}

	async fn init(actor: &SessionActor) {
		let (reply, rx) = oneshot::channel();

		actor
			.handle(SessionCommand::Initialize {
				note_id: "n1".to_string(),
				note_context: "context".to_string(),
				reply,
			})
			.await;

		rx.await.expect("no reply").expect("init failed");
	}

	#[tokio::test]
	async fn initialize_schedules_wake_one_timeout_ahead() {
		let (actor, store, _clock) = actor();

		init(&actor).await;

		assert_eq!(
			store.get_alarm("note:n1").await.expect("alarm read failed"),
			Some(START + Duration::hours(24))
		);
	}

	#[tokio::test]
	async fn idle_wake_before_timeout_reschedules_from_last_activity() {
		let (actor, store, clock) = actor();

		init(&actor).await;
		actor.store_message("user", "hello").await.expect("store failed");

		let last_activity = START + Duration::hours(2);

		clock.set(last_activity);
		actor.store_message("assistant", "hi").await.expect("store failed");
		clock.set(START + Duration::hours(24));
		actor.handle(SessionCommand::IdleTimeout).await;

		assert_eq!(store.load_messages("note:n1").await.expect("load failed").len(), 2);
		assert_eq!(
			store.get_alarm("note:n1").await.expect("alarm read failed"),
			Some(last_activity + Duration::hours(24))
		);
	}

	#[tokio::test]
	async fn idle_wake_after_timeout_drops_history_but_keeps_state() {
		let (actor, store, clock) = actor();

		init(&actor).await;
		actor.store_message("user", "hello").await.expect("store failed");
		clock.set(START + Duration::hours(24));
		actor.handle(SessionCommand::IdleTimeout).await;

		assert!(store.load_messages("note:n1").await.expect("load failed").is_empty());
		assert!(store.get_alarm("note:n1").await.expect("alarm read failed").is_none());

		let state = store.load_state("note:n1").await.expect("load failed").expect("state dropped");

		assert_eq!(state.note_context, "context");
		assert_eq!(state.last_activity, START);
	}

	#[tokio::test]
	async fn idle_wake_without_state_drops_the_alarm() {
		let (actor, store, _clock) = actor();

		store.set_alarm("note:n1", START).await.expect("set failed");
		actor.handle(SessionCommand::IdleTimeout).await;

		assert!(store.get_alarm("note:n1").await.expect("alarm read failed").is_none());
		assert!(store.load_state("note:n1").await.expect("load failed").is_none());
	}

	#[tokio::test]
	async fn activity_after_expiry_rearms_a_wake() {
		let (actor, store, clock) = actor();

		init(&actor).await;
		clock.set(START + Duration::hours(30));
		actor.handle(SessionCommand::IdleTimeout).await;

		assert!(store.get_alarm("note:n1").await.expect("alarm read failed").is_none());

		let reply = actor
			.post_message(PostMessageRequest { message: "back again".to_string(), ..Default::default() })
			.await
			.expect("post failed");

		assert_eq!(reply.history.len(), 2);
		assert_eq!(
			store.get_alarm("note:n1").await.expect("alarm read failed"),
			Some(START + Duration::hours(54))
		);
	}

	#[tokio::test]
	async fn failed_post_after_expiry_still_arms_a_wake() {
		let (actor, store, clock) = actor_with(Arc::new(OfflineInvoker));

		init(&actor).await;
		clock.set(START + Duration::hours(30));
		actor.handle(SessionCommand::IdleTimeout).await;

		let err = actor
			.post_message(PostMessageRequest {
				message: "hi".to_string(),
				note_context: Some("new".to_string()),
				..Default::default()
			})
			.await
			.expect_err("post should fail");

		assert!(matches!(err, Error::ModelCallFailed { .. }));
		assert_eq!(store.load_messages("note:n1").await.expect("load failed").len(), 1);
		assert_eq!(
			store.get_alarm("note:n1").await.expect("alarm read failed"),
			Some(START + Duration::hours(54))
		);

		clock.set(START + Duration::hours(54));

		assert!(actor.handle(SessionCommand::IdleTimeout).await);
		assert!(store.load_messages("note:n1").await.expect("load failed").is_empty());
	}

	#[tokio::test]
	async fn only_expiry_marks_the_actor_dormant() {
		let (actor, _store, clock) = actor();

		init(&actor).await;
		clock.set(START + Duration::hours(12));

		assert!(!actor.handle(SessionCommand::IdleTimeout).await);

		clock.set(START + Duration::hours(24));

		assert!(actor.handle(SessionCommand::IdleTimeout).await);
	}

	#[tokio::test]
	async fn note_context_is_bounded_when_stored() {
		let (actor, store, _clock) = actor();
		let (reply, rx) = oneshot::channel();

		actor
			.handle(SessionCommand::Initialize {
				note_id: " n1 ".to_string(),
				note_context: "a".repeat(5_000),
				reply,
			})
			.await;
		rx.await.expect("no reply").expect("init failed");

		let state = store.load_state("note:n1").await.expect("load failed").expect("no state");

		assert_eq!(state.note_id, "n1");
		assert_eq!(state.note_context.chars().count(), 4_000);
	}
}
