//! Optional observability helpers for authentication and request flows.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `netatmo_client.flow` with the `flow` and
//!   `stage` fields, plus events for every authenticator transition.
//! - Enable `metrics` to increment the `netatmo_client_flow_total` counter for every
//!   attempt/success/failure, labeled by `flow` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Flow kinds observed by the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Full authentication chain (cache, refresh, password).
	Authenticate,
	/// Reauthentication after a rejected request.
	Reauthenticate,
	/// Refresh token grant exchange.
	Refresh,
	/// Password grant exchange.
	Password,
	/// Authenticated resource read.
	Fetch,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::Authenticate => "authenticate",
			FlowKind::Reauthenticate => "reauthenticate",
			FlowKind::Refresh => "refresh",
			FlowKind::Password => "password",
			FlowKind::Fetch => "fetch",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a flow.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
