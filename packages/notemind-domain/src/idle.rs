use time::{Duration, OffsetDateTime};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IdleDecision {
	/// Idle for the whole timeout; stored history should be dropped.
	Expire,
	/// Still within the timeout; wake again at the contained time.
	Reschedule(OffsetDateTime),
}

pub fn wake_at(last_activity: OffsetDateTime, timeout: Duration) -> OffsetDateTime {
	last_activity + timeout
}

pub fn decide(
	now: OffsetDateTime,
	last_activity: OffsetDateTime,
	timeout: Duration,
) -> IdleDecision {
	if now - last_activity >= timeout {
		IdleDecision::Expire
	} else {
		IdleDecision::Reschedule(wake_at(last_activity, timeout))
	}
}
