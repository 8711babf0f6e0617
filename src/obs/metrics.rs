// self
use crate::{
	error::FailureKind,
	obs::{ProtocolStep, StepOutcome},
};

/// Counter incremented for every step attempt, success, and denial.
pub const STEP_COUNTER: &str = "lti_tool_step_total";

/// `kind` label value for attempts and successes.
pub const NO_FAILURE: &str = "none";

/// Returns the `kind` label: the denial reason on failures, [`NO_FAILURE`] otherwise.
///
/// Replayed nonces, rotated keys, and unregistered deployments all surface as distinct series,
/// so a spike can be attributed without reading logs.
pub fn failure_label(outcome: StepOutcome, failure: Option<FailureKind>) -> &'static str {
	match (outcome, failure) {
		(StepOutcome::Failure, Some(kind)) => kind.as_str(),
		_ => NO_FAILURE,
	}
}

/// Records a step outcome via the global metrics recorder (when enabled).
pub fn record_step_outcome(step: ProtocolStep, outcome: StepOutcome, failure: Option<FailureKind>) {
	let kind = failure_label(outcome, failure);

	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			STEP_COUNTER,
			"step" => step.as_str(),
			"outcome" => outcome.as_str(),
			"kind" => kind
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (step, kind);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn denials_are_labeled_by_failure_kind() {
		assert_eq!(
			failure_label(StepOutcome::Failure, Some(FailureKind::NonceUnknownOrReused)),
			"nonce_unknown_or_reused"
		);
		assert_eq!(failure_label(StepOutcome::Failure, Some(FailureKind::KeyNotFound)), "key_not_found");
		assert_eq!(failure_label(StepOutcome::Failure, None), NO_FAILURE);
		assert_eq!(failure_label(StepOutcome::Attempt, Some(FailureKind::KeyNotFound)), NO_FAILURE);
		assert_eq!(failure_label(StepOutcome::Success, None), NO_FAILURE);
	}

	#[test]
	fn record_step_outcome_accepts_denials_without_recorder() {
		record_step_outcome(ProtocolStep::Launch, StepOutcome::Attempt, None);
		record_step_outcome(
			ProtocolStep::Launch,
			StepOutcome::Failure,
			Some(FailureKind::SignatureInvalid),
		);
	}
}
