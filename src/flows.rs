//! Protocol orchestrator: one entry point per LTI step.

pub mod common;
pub mod deep_link;
pub mod launch;
pub mod login;

pub use common::*;
pub use deep_link::*;
pub use launch::*;
pub use login::*;

// self
use crate::{
	_prelude::*,
	config::{JwksPolicy, ToolConfig},
	error::ConfigError,
	http::JwksHttpClient,
	issuer::{IssuerRegistry, RegistryError},
	jwks::{JwkSet, KeyResolver},
	keys::ToolKeySource,
	obs::{self, ProtocolStep, StepOutcome},
	session::{FlowSessionStore, StoreError},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;

#[cfg(feature = "reqwest")]
/// Tool specialized for the crate's default reqwest transport stack.
pub type ReqwestLtiTool = LtiTool<ReqwestHttpClient>;

/// Coordinates the Tool side of LTI 1.3 launches and Deep Linking.
///
/// The tool owns the issuer registry, the session store, the platform key resolver, and the
/// Tool's own signing key, so each step only composes them. Steps never panic and never
/// redirect on failure: every failure surfaces as an [`Error`] the HTTP layer turns into a
/// denial (see [`ProtocolReply::deny`]).
pub struct LtiTool<C>
where
	C: ?Sized + JwksHttpClient,
{
	/// Trusted platforms; the only source of endpoint URLs.
	pub registry: Arc<dyn IssuerRegistry>,
	/// In-flight login and content-selection sessions.
	pub sessions: Arc<dyn FlowSessionStore>,
	/// Platform key resolver.
	pub keys: Arc<KeyResolver<C>>,
	/// Key-management boundary signing deep linking responses.
	pub signer: Arc<dyn ToolKeySource>,
	/// Validated runtime settings.
	pub config: ToolConfig,
}
impl<C> LtiTool<C>
where
	C: ?Sized + JwksHttpClient,
{
	/// Creates a tool that fetches platform keysets through the caller-provided transport.
	pub fn with_http_client(
		registry: Arc<dyn IssuerRegistry>,
		sessions: Arc<dyn FlowSessionStore>,
		signer: Arc<dyn ToolKeySource>,
		config: ToolConfig,
		http_client: impl Into<Arc<C>>,
		policy: JwksPolicy,
	) -> Result<Self, ConfigError> {
		Ok(Self {
			registry,
			sessions,
			keys: Arc::new(KeyResolver::new(http_client, policy)?),
			signer,
			config,
		})
	}

	/// Public keyset platforms use to verify this Tool's deep linking responses.
	pub fn public_jwks(&self) -> JwkSet {
		self.signer.public_jwks()
	}

	/// Drops every expired session, returning how many were removed. Intended for a
	/// periodic background task; stores also evict lazily.
	pub async fn purge_expired_sessions(&self) -> Result<usize> {
		Ok(self.bounded_store(self.sessions.purge_expired(OffsetDateTime::now_utc())).await?)
	}

	/// Awaits a session-store future under the configured store timeout.
	pub(crate) async fn bounded_store<T>(
		&self,
		fut: impl Future<Output = Result<T, StoreError>>,
	) -> Result<T, StoreError> {
		tokio::time::timeout(self.config.store_timeout, fut)
			.await
			.unwrap_or(Err(StoreError::Timeout))
	}

	/// Awaits a registry future under the configured store timeout.
	pub(crate) async fn bounded_registry<T>(
		&self,
		fut: impl Future<Output = Result<T, RegistryError>>,
	) -> Result<T, RegistryError> {
		tokio::time::timeout(self.config.store_timeout, fut).await.unwrap_or_else(|_| {
			Err(RegistryError::Backend { message: "issuer lookup timed out".into() })
		})
	}
}
#[cfg(feature = "reqwest")]
impl LtiTool<ReqwestHttpClient> {
	/// Creates a tool that provisions its own reqwest-backed keyset transport with the
	/// default [`JwksPolicy`].
	pub fn new(
		registry: Arc<dyn IssuerRegistry>,
		sessions: Arc<dyn FlowSessionStore>,
		signer: Arc<dyn ToolKeySource>,
		config: ToolConfig,
	) -> Result<Self, ConfigError> {
		Self::with_http_client(
			registry,
			sessions,
			signer,
			config,
			ReqwestHttpClient::new()?,
			JwksPolicy::default(),
		)
	}
}
impl<C> Clone for LtiTool<C>
where
	C: ?Sized + JwksHttpClient,
{
	fn clone(&self) -> Self {
		Self {
			registry: self.registry.clone(),
			sessions: self.sessions.clone(),
			keys: self.keys.clone(),
			signer: self.signer.clone(),
			config: self.config.clone(),
		}
	}
}
impl<C> Debug for LtiTool<C>
where
	C: ?Sized + JwksHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("LtiTool")
			.field("config", &self.config)
			.field("keys", &self.keys)
			.field("signer_kid", &self.signer.kid())
			.finish()
	}
}

/// Records attempt/outcome metrics around a step, labeling denials with their failure kind.
pub(crate) async fn observe<T>(
	step: ProtocolStep,
	fut: impl Future<Output = Result<T>>,
) -> Result<T> {
	obs::record_step_outcome(step, StepOutcome::Attempt, None);

	let result = fut.await;

	match &result {
		Ok(_) => obs::record_step_outcome(step, StepOutcome::Success, None),
		Err(e) => {
			obs::record_step_outcome(step, StepOutcome::Failure, Some(e.kind()));
			obs::log_denial(step, e);
		},
	}

	result
}
