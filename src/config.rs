//! Runtime settings for the Tool orchestrator and its key resolver.

// self
use crate::{_prelude::*, error::ConfigError};

/// Validated Tool settings consumed by [`crate::flows::LtiTool`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolConfig {
	/// Application entry point successful resource-link launches redirect to.
	pub app_entry_url: Url,
	/// Lifetime of a login session between `login` and `launch`.
	pub login_ttl: Duration,
	/// Lifetime of a content-selection session between `deep_link_select` and
	/// `return_deep_link`.
	pub selection_ttl: Duration,
	/// Lifetime stamped on outbound deep linking response tokens.
	pub response_ttl: Duration,
	/// Tolerance applied to `exp`/`nbf` checks on platform tokens.
	pub clock_leeway: Duration,
	/// Upper bound for every session-store call.
	pub store_timeout: StdDuration,
}
impl ToolConfig {
	const DEFAULT_CLOCK_LEEWAY: Duration = Duration::seconds(60);
	const DEFAULT_LOGIN_TTL: Duration = Duration::minutes(10);
	const DEFAULT_RESPONSE_TTL: Duration = Duration::minutes(5);
	const DEFAULT_SELECTION_TTL: Duration = Duration::minutes(30);
	const DEFAULT_STORE_TIMEOUT: StdDuration = StdDuration::from_secs(2);

	/// Creates a builder seeded with defaults for the provided entry point.
	pub fn builder(app_entry_url: Url) -> ToolConfigBuilder {
		ToolConfigBuilder {
			config: Self {
				app_entry_url,
				login_ttl: Self::DEFAULT_LOGIN_TTL,
				selection_ttl: Self::DEFAULT_SELECTION_TTL,
				response_ttl: Self::DEFAULT_RESPONSE_TTL,
				clock_leeway: Self::DEFAULT_CLOCK_LEEWAY,
				store_timeout: Self::DEFAULT_STORE_TIMEOUT,
			},
		}
	}

	fn validate(&self) -> Result<(), ConfigError> {
		if self.app_entry_url.scheme() != "https" {
			return Err(ConfigError::InsecureUrl {
				field: "app_entry_url",
				url: self.app_entry_url.to_string(),
			});
		}

		for (field, value) in [
			("login_ttl", self.login_ttl),
			("selection_ttl", self.selection_ttl),
			("response_ttl", self.response_ttl),
		] {
			if !value.is_positive() {
				return Err(ConfigError::NonPositiveDuration { field });
			}
		}

		if self.clock_leeway.is_negative() {
			return Err(ConfigError::NonPositiveDuration { field: "clock_leeway" });
		}
		if self.store_timeout.is_zero() {
			return Err(ConfigError::NonPositiveDuration { field: "store_timeout" });
		}

		Ok(())
	}
}

/// Builder for [`ToolConfig`].
#[derive(Debug)]
pub struct ToolConfigBuilder {
	config: ToolConfig,
}
impl ToolConfigBuilder {
	/// Overrides the login session lifetime (defaults to 10 minutes).
	pub fn login_ttl(mut self, ttl: Duration) -> Self {
		self.config.login_ttl = ttl;

		self
	}

	/// Overrides the content-selection session lifetime (defaults to 30 minutes).
	pub fn selection_ttl(mut self, ttl: Duration) -> Self {
		self.config.selection_ttl = ttl;

		self
	}

	/// Overrides the deep linking response token lifetime (defaults to 5 minutes).
	pub fn response_ttl(mut self, ttl: Duration) -> Self {
		self.config.response_ttl = ttl;

		self
	}

	/// Overrides the clock-skew leeway (defaults to 60 seconds).
	pub fn clock_leeway(mut self, leeway: Duration) -> Self {
		self.config.clock_leeway = leeway;

		self
	}

	/// Overrides the per-call session store timeout (defaults to 2 seconds).
	pub fn store_timeout(mut self, timeout: StdDuration) -> Self {
		self.config.store_timeout = timeout;

		self
	}

	/// Consumes the builder and validates the resulting settings.
	pub fn build(self) -> Result<ToolConfig, ConfigError> {
		self.config.validate()?;

		Ok(self.config)
	}
}

/// Fetch and cache policy for platform keysets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JwksPolicy {
	/// How long a resolved key stays usable before the keyset is refetched.
	pub cache_ttl: Duration,
	/// Deadline applied to each individual fetch attempt.
	pub attempt_timeout: StdDuration,
	/// Total fetch attempts per resolution (initial request plus retries).
	pub max_attempts: u32,
	/// Minimum spacing between refetches triggered by an unknown `kid`.
	pub min_refetch_interval: Duration,
}
impl JwksPolicy {
	/// Validates invariants for the policy.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if !self.cache_ttl.is_positive() {
			return Err(ConfigError::InvalidJwksPolicy { reason: "cache_ttl must be positive" });
		}
		if self.attempt_timeout < StdDuration::from_millis(100) {
			return Err(ConfigError::InvalidJwksPolicy {
				reason: "attempt_timeout must be at least 100 ms",
			});
		}
		if self.max_attempts == 0 {
			return Err(ConfigError::InvalidJwksPolicy {
				reason: "max_attempts must be at least 1",
			});
		}
		if self.min_refetch_interval.is_negative() {
			return Err(ConfigError::InvalidJwksPolicy {
				reason: "min_refetch_interval cannot be negative",
			});
		}
		if self.min_refetch_interval > self.cache_ttl {
			return Err(ConfigError::InvalidJwksPolicy {
				reason: "min_refetch_interval cannot exceed cache_ttl",
			});
		}

		Ok(())
	}
}
impl Default for JwksPolicy {
	fn default() -> Self {
		Self {
			cache_ttl: Duration::minutes(10),
			attempt_timeout: StdDuration::from_secs(5),
			max_attempts: 2,
			min_refetch_interval: Duration::seconds(30),
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn entry() -> Url {
		Url::parse("https://tool.example/app").expect("Entry URL fixture should parse.")
	}

	#[test]
	fn builder_applies_defaults() {
		let config = ToolConfig::builder(entry()).build().expect("Defaults should validate.");

		assert_eq!(config.login_ttl, Duration::minutes(10));
		assert_eq!(config.store_timeout, StdDuration::from_secs(2));
		assert_eq!(config.clock_leeway, Duration::seconds(60));
	}

	#[test]
	fn builder_rejects_insecure_entry_and_zero_ttl() {
		let insecure = Url::parse("http://tool.example/app").expect("URL fixture should parse.");
		let err = ToolConfig::builder(insecure)
			.build()
			.expect_err("Plain HTTP entry points must be rejected.");

		assert!(matches!(err, ConfigError::InsecureUrl { field: "app_entry_url", .. }));

		let err = ToolConfig::builder(entry())
			.login_ttl(Duration::ZERO)
			.build()
			.expect_err("A zero login TTL must be rejected.");

		assert!(matches!(err, ConfigError::NonPositiveDuration { field: "login_ttl" }));
	}

	#[test]
	fn jwks_policy_requires_an_attempt() {
		assert!(JwksPolicy::default().validate().is_ok());

		let policy = JwksPolicy { max_attempts: 0, ..JwksPolicy::default() };

		assert!(matches!(policy.validate(), Err(ConfigError::InvalidJwksPolicy { .. })));
	}
}
