// self
use crate::{
	_prelude::*,
	http::ApiMethod,
	obs::{FlowKind, record_retry},
};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// A span builder used by every operation.
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
			let span = tracing::info_span!("playlist_stats.flow", flow = kind.as_str(), stage);

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

/// Logs and counts a failed attempt that will be retried.
pub fn retry_scheduled(method: ApiMethod, url: &Url, attempt: u32, max_attempts: u32, error: &Error) {
	record_retry(method);

	#[cfg(feature = "tracing")]
	tracing::warn!(
		%method,
		url = %url,
		attempt,
		max_attempts,
		error = %error,
		"API request failed; retrying after delay"
	);

	#[cfg(not(feature = "tracing"))]
	{
		let _ = (url, attempt, max_attempts, error);
	}
}

/// Logs a request that ran out of attempts.
pub fn retries_exhausted(method: ApiMethod, url: &Url, attempts: u32) {
	#[cfg(feature = "tracing")]
	tracing::error!(%method, url = %url, attempts, "API request exhausted its retry budget");

	#[cfg(not(feature = "tracing"))]
	{
		let _ = (method, url, attempts);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn instrument_wraps_future() {
		let span = FlowSpan::new(FlowKind::Refresh, "instrument_wraps_future");
		let value = span.instrument(async { 42 }).await;

		assert_eq!(value, 42);
	}
}
