// self
use crate::{
	_prelude::*,
	error::TransportError,
	obs::ProtocolStep,
	session::{SessionKind, StoreError},
};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedStep<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedStep<F> = F;

/// A span builder used by orchestrator steps.
#[derive(Clone, Debug)]
pub struct StepSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl StepSpan {
	/// Creates a new span tagged with the provided step + stage.
	pub fn new(step: ProtocolStep, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("lti_tool.step", step = step.as_str(), stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (step, stage);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedStep<Fut>
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

/// Logs the specific failure kind behind a denial; the caller only shows a generic message.
pub fn log_denial(step: ProtocolStep, error: &Error) {
	#[cfg(feature = "tracing")]
	{
		if error.is_internal() {
			tracing::error!(step = step.as_str(), kind = error.kind().as_str(), %error, "step failed");
		} else {
			tracing::warn!(step = step.as_str(), kind = error.kind().as_str(), %error, "step denied");
		}
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (step, error);
	}
}

/// Logs why a session lookup came back empty. Expiry and not-found deny alike but point at
/// different causes (clock skew or abandonment versus replay).
pub fn log_session_lookup(step: ProtocolStep, kind: SessionKind, error: &StoreError) {
	#[cfg(feature = "tracing")]
	{
		tracing::info!(
			step = step.as_str(),
			session.kind = kind.as_str(),
			session.lookup = error.lookup_label(),
			"session unavailable"
		);
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (step, kind, error);
	}
}

/// Logs a failed keyset attempt that will be retried.
pub fn log_key_fetch_retry(url: &Url, error: &TransportError) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(jwks_url = %url, %error, "keyset fetch failed, retrying");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (url, error);
	}
}

/// Logs a keyset fetch that exhausted its attempts.
pub fn log_key_fetch_failure(issuer: &str, error: &TransportError) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(issuer, %error, "keyset fetch failed");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (issuer, error);
	}
}

/// Logs an unknown `kid` whose refetch was suppressed by the refetch interval.
pub fn log_refetch_suppressed(issuer: &str, kid: &str) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(issuer, kid, "keyset refetch suppressed");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (issuer, kid);
	}
}

/// Logs a signed Deep Linking response by fingerprint; the JWT itself is never logged.
pub fn log_response_signed(platform: &str, deployment_id: &str, fingerprint: &str) {
	#[cfg(feature = "tracing")]
	{
		tracing::info!(
			platform,
			deployment_id,
			jwt.fingerprint = fingerprint,
			"deep linking response signed"
		);
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (platform, deployment_id, fingerprint);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn logging_helpers_accept_every_failure_shape() {
		log_denial(ProtocolStep::Launch, &Error::NonceUnknownOrReused);
		log_denial(ProtocolStep::Login, &Error::Storage(StoreError::Timeout));
		log_session_lookup(ProtocolStep::ReturnDeepLink, SessionKind::DeepLink, &StoreError::Expired);
		log_response_signed("https://platform.example", "dep-1", "q1w2e3r4t5y6");
	}

	#[tokio::test]
	async fn instrument_wraps_future() {
		let span = StepSpan::new(ProtocolStep::Login, "instrument_wraps_future");
		let value = span.instrument(async { 42 }).await;

		assert_eq!(value, 42);
	}
}
