//! Optional observability helpers for protocol steps.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `lti_tool.step` with the `step` and
//!   `stage` (call site) fields, plus `warn`/`debug` events for denials and keyset fetches.
//! - Enable `metrics` to increment the `lti_tool_step_total` counter for every
//!   attempt/success/failure, labeled by `step`, `outcome`, and `kind` (the failure kind on
//!   denials, `none` otherwise).

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Protocol steps exposed by the orchestrator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProtocolStep {
	/// Third-party login initiation.
	Login,
	/// id token post to the launch endpoint.
	Launch,
	/// Deep linking launch entering content selection.
	DeepLinkSelect,
	/// Content selection finished; signed response returned to the platform.
	ReturnDeepLink,
}
impl ProtocolStep {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			ProtocolStep::Login => "login",
			ProtocolStep::Launch => "launch",
			ProtocolStep::DeepLinkSelect => "deep_link_select",
			ProtocolStep::ReturnDeepLink => "return_deep_link",
		}
	}
}
impl Display for ProtocolStep {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StepOutcome {
	/// Entry to an orchestrator step.
	Attempt,
	/// Successful completion.
	Success,
	/// Denial propagated back to the caller.
	Failure,
}
impl StepOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			StepOutcome::Attempt => "attempt",
			StepOutcome::Success => "success",
			StepOutcome::Failure => "failure",
		}
	}
}
impl Display for StepOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
