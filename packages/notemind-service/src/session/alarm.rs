//! One pending wake-up per session key.
//!
//! A single task owns a min-heap of `(fire_at, key)` entries plus a `key -> fire_at` map. Arming a
//! key overwrites the map entry; heap entries that no longer match the map are stale and skipped
//! when they surface. Due keys are sent on the fired channel returned by [`AlarmScheduler::spawn`].

use std::{
	cmp::Reverse,
	collections::{BinaryHeap, HashMap},
	sync::Arc,
};

use time::OffsetDateTime;
use tokio::{sync::mpsc, time as tokio_time};

use crate::Clock;

#[derive(Debug)]
enum AlarmCommand {
	Arm { session_key: String, fire_at: OffsetDateTime },
	Cancel { session_key: String },
}

#[derive(Clone, Debug)]
pub struct AlarmScheduler {
	tx: mpsc::UnboundedSender<AlarmCommand>,
}
impl AlarmScheduler {
	pub fn spawn(clock: Arc<dyn Clock>) -> (Self, mpsc::UnboundedReceiver<String>) {
		let (tx, rx) = mpsc::unbounded_channel();
		let (fired_tx, fired_rx) = mpsc::unbounded_channel();

		tokio::spawn(run(rx, fired_tx, clock));

		(Self { tx }, fired_rx)
	}

	/// Replaces any pending wake-up for `session_key`.
	pub fn arm(&self, session_key: &str, fire_at: OffsetDateTime) {
		let command = AlarmCommand::Arm { session_key: session_key.to_string(), fire_at };

		if self.tx.send(command).is_err() {
			tracing::warn!(session_key, "Alarm scheduler is gone; wake-up not armed.");
		}
	}

	pub fn cancel(&self, session_key: &str) {
		let _ = self.tx.send(AlarmCommand::Cancel { session_key: session_key.to_string() });
	}
}

#[derive(Debug, Default)]
struct AlarmQueue {
	heap: BinaryHeap<Reverse<(OffsetDateTime, String)>>,
	pending: HashMap<String, OffsetDateTime>,
}
impl AlarmQueue {
	fn arm(&mut self, session_key: String, fire_at: OffsetDateTime) {
		self.pending.insert(session_key.clone(), fire_at);
		self.heap.push(Reverse((fire_at, session_key)));
	}

	fn cancel(&mut self, session_key: &str) {
		self.pending.remove(session_key);
	}

	fn next_fire(&mut self) -> Option<OffsetDateTime> {
		while let Some(Reverse((fire_at, session_key))) = self.heap.peek() {
			if self.pending.get(session_key) == Some(fire_at) {
				return Some(*fire_at);
			}

			self.heap.pop();
		}

		None
	}

	fn pop_due(&mut self, now: OffsetDateTime) -> Vec<String> {
		let mut due = Vec::new();

		while let Some(fire_at) = self.next_fire() {
			if fire_at > now {
				break;
			}

			if let Some(Reverse((_, session_key))) = self.heap.pop() {
				self.pending.remove(&session_key);
				due.push(session_key);
			}
		}

		due
	}
}

async fn run(
	mut rx: mpsc::UnboundedReceiver<AlarmCommand>,
	fired_tx: mpsc::UnboundedSender<String>,
	clock: Arc<dyn Clock>,
) {
	let mut queue = AlarmQueue::default();

	loop {
		for session_key in queue.pop_due(clock.now()) {
			tracing::debug!(session_key = session_key.as_str(), "Alarm fired.");

			if fired_tx.send(session_key).is_err() {
				return;
			}
		}

		let sleep_for = queue.next_fire().map(|fire_at| {
			let remaining = fire_at - clock.now();

			remaining.try_into().unwrap_or(std::time::Duration::ZERO)
		});

		tokio::select! {
			command = rx.recv() => match command {
				Some(AlarmCommand::Arm { session_key, fire_at }) => queue.arm(session_key, fire_at),
				Some(AlarmCommand::Cancel { session_key }) => queue.cancel(&session_key),
				None => return,
			},
			_ = tokio_time::sleep(sleep_for.unwrap_or_default()), if sleep_for.is_some() => {},
		}
	}
}

#[cfg(test)]
mod tests {
	use time::{Duration, macros::datetime};

	use super::*;
	use crate::SystemClock;

	#[test]
	fn overwrite_leaves_only_the_latest_fire_time() {
		let mut queue = AlarmQueue::default();
		let base = datetime!(2026-03-01 12:00 UTC);

		queue.arm("note:a".to_string(), base + Duration::hours(1));
		queue.arm("note:a".to_string(), base + Duration::hours(3));
		queue.arm("note:b".to_string(), base + Duration::hours(2));

		assert_eq!(queue.pop_due(base + Duration::hours(1)), Vec::<String>::new());
		assert_eq!(queue.pop_due(base + Duration::hours(2)), vec!["note:b".to_string()]);
		assert_eq!(queue.pop_due(base + Duration::hours(5)), vec!["note:a".to_string()]);
		assert_eq!(queue.next_fire(), None);
	}

	#[test]
	fn cancelled_keys_never_fire() {
		let mut queue = AlarmQueue::default();
		let base = datetime!(2026-03-01 12:00 UTC);

		queue.arm("note:a".to_string(), base);
		queue.cancel("note:a");

		assert!(queue.pop_due(base + Duration::days(1)).is_empty());
	}

	#[tokio::test]
	async fn overwritten_alarm_fires_once_at_the_new_time() {
		let (scheduler, mut fired) = AlarmScheduler::spawn(Arc::new(SystemClock));
		let now = OffsetDateTime::now_utc();

		scheduler.arm("note:a", now + Duration::hours(1));
		scheduler.arm("note:a", now + Duration::milliseconds(50));

		let key = tokio_time::timeout(std::time::Duration::from_secs(5), fired.recv())
			.await
			.expect("alarm did not fire")
			.expect("scheduler stopped");

		assert_eq!(key, "note:a");
		assert!(OffsetDateTime::now_utc() >= now + Duration::milliseconds(50));

		let again = tokio_time::timeout(std::time::Duration::from_millis(200), fired.recv()).await;

		assert!(again.is_err(), "alarm fired twice");
	}

	#[tokio::test]
	async fn overdue_alarm_fires_immediately() {
		let (scheduler, mut fired) = AlarmScheduler::spawn(Arc::new(SystemClock));

		scheduler.arm("note:late", OffsetDateTime::now_utc() - Duration::days(2));

		let key = tokio_time::timeout(std::time::Duration::from_secs(5), fired.recv())
			.await
			.expect("alarm did not fire")
			.expect("scheduler stopped");

		assert_eq!(key, "note:late");
	}
}
