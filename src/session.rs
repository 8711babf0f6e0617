//! In-flight protocol sessions and the store contract that guards them.
//!
//! A session is created by the login or deep-link-select step and consumed exactly once by
//! the step that completes it. Sessions are namespaced by [`SessionKind`]: a lookup for one
//! kind never sees (or removes) a session of the other kind, and every nonce is unique across
//! both kinds while it is live.

pub mod memory;
pub mod token;

pub use memory::MemorySessionStore;

// self
use crate::{_prelude::*, claims::DeepLinkingSettings};

/// Boxed future returned by [`FlowSessionStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage contract for in-flight protocol sessions.
///
/// Implementations must be safe under arbitrary interleaving: two `create` calls never yield
/// the same state or nonce, and of several racing `consume` calls for one key exactly one
/// succeeds.
pub trait FlowSessionStore
where
	Self: Send + Sync,
{
	/// Inserts a new session with freshly generated state and nonce.
	fn create(&self, draft: SessionDraft, now: OffsetDateTime) -> StoreFuture<'_, SessionHandle>;

	/// Looks a session up without consuming it (diagnostics only).
	fn get<'a>(
		&'a self,
		kind: SessionKind,
		state: &'a str,
		now: OffsetDateTime,
	) -> StoreFuture<'a, FlowSession>;

	/// Atomically removes and returns the session stored under `state`.
	fn consume<'a>(
		&'a self,
		kind: SessionKind,
		state: &'a str,
		now: OffsetDateTime,
	) -> StoreFuture<'a, FlowSession>;

	/// Atomically removes and returns the session whose nonce is `nonce`.
	fn consume_by_nonce<'a>(
		&'a self,
		kind: SessionKind,
		nonce: &'a str,
		now: OffsetDateTime,
	) -> StoreFuture<'a, FlowSession>;

	/// Drops every session expired at `now`, returning how many were removed.
	fn purge_expired(&self, now: OffsetDateTime) -> StoreFuture<'_, usize>;
}

/// Error type produced by [`FlowSessionStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// No live session matches the key (never created, wrong kind, or already consumed).
	#[error("Session not found.")]
	NotFound,
	/// The session existed but its lifetime elapsed; it has been removed.
	#[error("Session expired.")]
	Expired,
	/// The store did not answer within the configured timeout.
	#[error("Session store timed out.")]
	Timeout,
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
impl StoreError {
	/// Returns true for the "no usable session" outcomes the flows treat as a denial.
	pub fn is_missing(&self) -> bool {
		matches!(self, Self::NotFound | Self::Expired)
	}

	/// Stable label distinguishing lookups in logs.
	pub const fn lookup_label(&self) -> &'static str {
		match self {
			Self::NotFound => "not_found",
			Self::Expired => "expired",
			Self::Timeout => "timeout",
			Self::Serialization { .. } | Self::Backend { .. } => "backend",
		}
	}
}

/// Session namespaces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
	/// Opened by `login`, consumed by the launch verifier.
	Login,
	/// Opened by `deep_link_select`, consumed by `return_deep_link`.
	DeepLink,
}
impl SessionKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Login => "login",
			Self::DeepLink => "deep_link",
		}
	}
}
impl Display for SessionKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Per-kind context carried by a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionContext {
	/// Context recorded at login initiation.
	Login {
		/// Where the platform will post the id token.
		target_link_uri: Url,
		/// Platform login hint.
		login_hint: String,
		/// Platform message hint, if any.
		lti_message_hint: Option<String>,
	},
	/// Context recorded when content selection starts.
	DeepLink {
		/// Deployment id of the deep linking launch.
		deployment_id: String,
		/// Settings from the verified deep linking request.
		settings: DeepLinkingSettings,
		/// Platform user who is selecting.
		subject: Option<String>,
	},
}
impl SessionContext {
	/// Kind implied by the context.
	pub fn kind(&self) -> SessionKind {
		match self {
			Self::Login { .. } => SessionKind::Login,
			Self::DeepLink { .. } => SessionKind::DeepLink,
		}
	}
}

/// Input to [`FlowSessionStore::create`].
#[derive(Clone, Debug)]
pub struct SessionDraft {
	/// Issuer the flow belongs to.
	pub issuer: String,
	/// Client id expected as the token audience.
	pub audience: String,
	/// Kind-specific context.
	pub context: SessionContext,
	/// Lifetime from creation.
	pub ttl: Duration,
}

/// Values handed back by [`FlowSessionStore::create`].
#[derive(Clone, PartialEq, Eq)]
pub struct SessionHandle {
	/// Opaque state token (also the session id).
	pub state: String,
	/// Single-use nonce bound to the session.
	pub nonce: String,
	/// Absolute expiry.
	pub expires_at: OffsetDateTime,
}
impl Debug for SessionHandle {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionHandle")
			.field("state", &self.state)
			.field("nonce", &"<redacted>")
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

/// Stored protocol session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowSession {
	/// Opaque state token; the session id.
	pub state: String,
	/// Single-use nonce.
	pub nonce: String,
	/// Issuer the flow belongs to.
	pub issuer: String,
	/// Client id expected as the token audience.
	pub audience: String,
	/// Creation instant.
	pub created_at: OffsetDateTime,
	/// Expiry instant; the session is unreachable from this instant on.
	pub expires_at: OffsetDateTime,
	/// Kind-specific context.
	pub context: SessionContext,
}
impl FlowSession {
	/// Session namespace.
	pub fn kind(&self) -> SessionKind {
		self.context.kind()
	}

	/// Returns true once `now` reached `expires_at`.
	pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
		now >= self.expires_at
	}
}
