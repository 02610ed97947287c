// self
use crate::{_prelude::*, obs::FlowKind};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// A span builder used by client flows.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Creates a new span tagged with the provided flow kind + stage.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("netatmo_client.flow", flow = kind.as_str(), stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Emits a debug event when the authenticator enters a new stage.
pub fn record_transition(kind: FlowKind, stage: &'static str) {
	#[cfg(feature = "tracing")]
	tracing::debug!(flow = kind.as_str(), stage, "Authenticator stage changed.");
	#[cfg(not(feature = "tracing"))]
	let _ = (kind, stage);
}

/// Emits a warning for a failure that was absorbed instead of returned.
pub fn record_absorbed_failure(kind: FlowKind, what: &'static str, error: &dyn StdError) {
	#[cfg(feature = "tracing")]
	tracing::warn!(flow = kind.as_str(), what, error = %error, "Continuing after failure.");
	#[cfg(not(feature = "tracing"))]
	let _ = (kind, what, error);
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn events_are_safe_without_subscriber() {
		record_transition(FlowKind::Authenticate, "try_cached");
		record_absorbed_failure(
			FlowKind::Refresh,
			"persist",
			&std::io::Error::other("disk full"),
		);
	}

	#[cfg(feature = "tracing")]
	#[tokio::test]
	async fn instrument_wraps_future() {
		let span = FlowSpan::new(FlowKind::Fetch, "instrument_wraps_future");
		let value = span.instrument(async { 42 }).await;

		assert_eq!(value, 42);
	}
}
