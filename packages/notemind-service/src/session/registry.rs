use std::{
	collections::{HashMap, hash_map::Entry},
	sync::{
		Arc, Mutex, MutexGuard, Weak,
		atomic::{AtomicUsize, Ordering},
	},
};

use tokio::sync::mpsc;

use notemind_domain::session_key;

use crate::{
	Clock, Error, ModelInvoker, Result, SessionStore,
	session::{
		SessionCommand, SessionHandle, SessionSettings,
		actor::{ActorDeps, SessionActor},
		alarm::AlarmScheduler,
	},
};

type Mailboxes = HashMap<String, Mailbox>;

struct Mailbox {
	tx: mpsc::Sender<Envelope>,
	/// Commands addressed to this mailbox that the actor has not dequeued yet.
	in_flight: Arc<AtomicUsize>,
}

struct InFlight(Arc<AtomicUsize>);
impl Drop for InFlight {
	fn drop(&mut self) {
		self.0.fetch_sub(1, Ordering::SeqCst);
	}
}

/// A command plus its share of the mailbox's in-flight count, released when the actor opens it
/// or when a failed send hands it back.
pub(crate) struct Envelope {
	command: SessionCommand,
	in_flight: InFlight,
}
impl Envelope {
	pub(crate) fn open(self) -> SessionCommand {
		let Self { command, in_flight } = self;

		drop(in_flight);

		command
	}
}

/// Maps session keys to actor mailboxes, spawning an actor the first time a key is used and
/// retiring it once the key goes dormant.
pub struct SessionRegistry {
	deps: ActorDeps,
	mailboxes: Mutex<Mailboxes>,
}
impl SessionRegistry {
	/// Spawns the alarm scheduler and re-arms every wake-up persisted by a previous process.
	/// Overdue wake-ups fire as soon as the scheduler runs.
	pub async fn start(
		settings: SessionSettings,
		store: Arc<dyn SessionStore>,
		invoker: Arc<dyn ModelInvoker>,
		clock: Arc<dyn Clock>,
	) -> Result<Arc<Self>> {
		let pending = store.list_alarms().await?;
		let (alarms, fired) = AlarmScheduler::spawn(clock.clone());
		let registry = Arc::new(Self {
			deps: ActorDeps { settings, store, invoker, clock, alarms },
			mailboxes: Mutex::default(),
		});

		tokio::spawn(dispatch_fired(Arc::downgrade(&registry), fired));

		for (session_key, fire_at) in &pending {
			registry.deps.alarms.arm(session_key, *fire_at);
		}

		tracing::info!(rearmed = pending.len(), "Session registry started.");

		Ok(registry)
	}

	pub fn session(self: &Arc<Self>, note_id: &str) -> Result<SessionHandle> {
		if note_id.trim().is_empty() {
			return Err(Error::invalid_input("note_id must be non-empty."));
		}

		Ok(SessionHandle::new(note_id, session_key(note_id), self.clone()))
	}

	/// Number of keys with a running actor.
	pub fn live_sessions(&self) -> usize {
		self.lock().len()
	}

	/// Enqueues `command` on the actor for `session_key`, spawning one if the key has none.
	pub(crate) async fn deliver(
		self: &Arc<Self>,
		session_key: &str,
		command: SessionCommand,
	) -> Result<()> {
		let (tx, in_flight) = self.checkout(session_key);

		tx.send(Envelope { command, in_flight }).await.map_err(|_| Error::ActorUnavailable {
			message: format!("Mailbox for {session_key} is closed."),
		})
	}

	/// Drops the mailbox for `session_key` when no command is queued or about to be. The actor then
	/// sees its mailbox close once the last sender is gone. Returns whether the key was retired.
	pub(crate) fn retire(&self, session_key: &str) -> bool {
		let mut mailboxes = self.lock();
		let idle = mailboxes
			.get(session_key)
			.is_some_and(|mailbox| mailbox.in_flight.load(Ordering::SeqCst) == 0);

		if idle {
			mailboxes.remove(session_key);
		}

		idle
	}

	fn lock(&self) -> MutexGuard<'_, Mailboxes> {
		self.mailboxes.lock().unwrap_or_else(|err| err.into_inner())
	}

	fn checkout(self: &Arc<Self>, session_key: &str) -> (mpsc::Sender<Envelope>, InFlight) {
		let mut mailboxes = self.lock();
		let mailbox = match mailboxes.entry(session_key.to_string()) {
			Entry::Occupied(entry) if !entry.get().tx.is_closed() => entry.into_mut(),
			Entry::Occupied(mut entry) => {
				entry.insert(self.spawn_actor(session_key));

				entry.into_mut()
			},
			Entry::Vacant(entry) => entry.insert(self.spawn_actor(session_key)),
		};

		mailbox.in_flight.fetch_add(1, Ordering::SeqCst);

		(mailbox.tx.clone(), InFlight(mailbox.in_flight.clone()))
	}

	fn spawn_actor(self: &Arc<Self>, session_key: &str) -> Mailbox {
		let (tx, rx) = mpsc::channel(self.deps.settings.mailbox_capacity.max(1));
		let actor = SessionActor::new(session_key.to_string(), self.deps.clone());

		tokio::spawn(actor.run(rx, Arc::downgrade(self)));

		tracing::debug!(session_key, "Session actor spawned.");

		Mailbox { tx, in_flight: Arc::default() }
	}
}

async fn dispatch_fired(registry: Weak<SessionRegistry>, mut fired: mpsc::UnboundedReceiver<String>) {
	while let Some(session_key) = fired.recv().await {
		let Some(registry) = registry.upgrade() else {
			return;
		};

		// Each wake-up is delivered on its own task so a full mailbox never stalls other keys.
		tokio::spawn(async move {
			if let Err(err) = registry.deliver(&session_key, SessionCommand::IdleTimeout).await {
				tracing::warn!(
					session_key = session_key.as_str(),
					error = %err,
					"Idle wake-up was not delivered."
				);
			}
		});
	}
}
