// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for authenticator activity.
#[derive(Debug, Default)]
pub struct AuthMetrics {
	cache_hits: AtomicU64,
	refresh_attempts: AtomicU64,
	refresh_failures: AtomicU64,
	password_attempts: AtomicU64,
	password_failures: AtomicU64,
	reauthentications: AtomicU64,
	persist_failures: AtomicU64,
}
impl AuthMetrics {
	/// Number of times a stored credential was adopted without a network call.
	pub fn cache_hits(&self) -> u64 {
		self.cache_hits.load(Ordering::Relaxed)
	}

	/// Number of refresh grant exchanges sent.
	pub fn refresh_attempts(&self) -> u64 {
		self.refresh_attempts.load(Ordering::Relaxed)
	}

	/// Number of refresh grant exchanges that failed.
	pub fn refresh_failures(&self) -> u64 {
		self.refresh_failures.load(Ordering::Relaxed)
	}

	/// Number of password grant exchanges sent.
	pub fn password_attempts(&self) -> u64 {
		self.password_attempts.load(Ordering::Relaxed)
	}

	/// Number of password grant exchanges that failed.
	pub fn password_failures(&self) -> u64 {
		self.password_failures.load(Ordering::Relaxed)
	}

	/// Number of reauthentications that ran a grant exchange.
	pub fn reauthentications(&self) -> u64 {
		self.reauthentications.load(Ordering::Relaxed)
	}

	/// Number of credential saves that failed.
	pub fn persist_failures(&self) -> u64 {
		self.persist_failures.load(Ordering::Relaxed)
	}

	/// Total grant exchanges sent, successful or not.
	pub fn exchanges(&self) -> u64 {
		self.refresh_attempts() + self.password_attempts()
	}

	pub(crate) fn record_cache_hit(&self) {
		self.cache_hits.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_refresh_attempt(&self) {
		self.refresh_attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_refresh_failure(&self) {
		self.refresh_failures.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_password_attempt(&self) {
		self.password_attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_password_failure(&self) {
		self.password_failures.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_reauthentication(&self) {
		self.reauthentications.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_persist_failure(&self) {
		self.persist_failures.fetch_add(1, Ordering::Relaxed);
	}
}
