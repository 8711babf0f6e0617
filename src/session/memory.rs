//! Thread-safe in-memory [`FlowSessionStore`] with lazy TTL eviction.

// self
use crate::{
	_prelude::*,
	session::{
		FlowSession, FlowSessionStore, SessionDraft, SessionHandle, SessionKind, StoreError,
		StoreFuture, token,
	},
};

#[derive(Debug)]
struct Inner {
	sessions: HashMap<String, FlowSession>,
	nonces: HashMap<String, String>,
	next_sweep: OffsetDateTime,
}
impl Inner {
	fn take(
		&mut self,
		kind: SessionKind,
		state: &str,
		now: OffsetDateTime,
	) -> Result<FlowSession, StoreError> {
		match self.sessions.get(state) {
			None => return Err(StoreError::NotFound),
			Some(session) if session.kind() != kind => return Err(StoreError::NotFound),
			Some(_) => (),
		}

		let session = self.sessions.remove(state).ok_or(StoreError::NotFound)?;

		self.nonces.remove(&session.nonce);

		if session.is_expired_at(now) { Err(StoreError::Expired) } else { Ok(session) }
	}

	fn sweep(&mut self, now: OffsetDateTime) -> usize {
		let before = self.sessions.len();

		self.sessions.retain(|_, session| !session.is_expired_at(now));

		let sessions = &self.sessions;

		self.nonces.retain(|_, state| sessions.contains_key(state));

		before - self.sessions.len()
	}
}

/// Process-local session store guarded by a single lock, so each operation observes and
/// mutates sessions and the nonce index together.
#[derive(Clone, Debug)]
pub struct MemorySessionStore {
	inner: Arc<RwLock<Inner>>,
	sweep_interval: Duration,
}
impl MemorySessionStore {
	const DEFAULT_SWEEP_INTERVAL: Duration = Duration::seconds(60);

	/// Overrides how often `create` sweeps expired sessions (defaults to 60 seconds).
	pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
		self.sweep_interval = if interval.is_negative() { Duration::ZERO } else { interval };

		self
	}

	/// Number of stored sessions, expired or not.
	pub fn len(&self) -> usize {
		self.inner.read().sessions.len()
	}

	/// Returns true when no session is stored.
	pub fn is_empty(&self) -> bool {
		self.inner.read().sessions.is_empty()
	}

	fn create_now(&self, draft: SessionDraft, now: OffsetDateTime) -> SessionHandle {
		let mut guard = self.inner.write();

		if now >= guard.next_sweep {
			guard.sweep(now);
			guard.next_sweep = now + self.sweep_interval;
		}

		let state = loop {
			let candidate = token::random_token();

			if !guard.sessions.contains_key(&candidate) {
				break candidate;
			}
		};
		let nonce = loop {
			let candidate = token::random_token();

			if !guard.nonces.contains_key(&candidate) {
				break candidate;
			}
		};
		let expires_at = now + draft.ttl;
		let session = FlowSession {
			state: state.clone(),
			nonce: nonce.clone(),
			issuer: draft.issuer,
			audience: draft.audience,
			created_at: now,
			expires_at,
			context: draft.context,
		};

		guard.nonces.insert(nonce.clone(), state.clone());
		guard.sessions.insert(state.clone(), session);

		SessionHandle { state, nonce, expires_at }
	}

	fn get_now(
		&self,
		kind: SessionKind,
		state: &str,
		now: OffsetDateTime,
	) -> Result<FlowSession, StoreError> {
		let mut guard = self.inner.write();
		let expired = match guard.sessions.get(state) {
			Some(session) if session.kind() == kind => session.is_expired_at(now),
			_ => return Err(StoreError::NotFound),
		};

		if !expired {
			return guard.sessions.get(state).cloned().ok_or(StoreError::NotFound);
		}

		// Reported once, then unreachable.
		guard.take(kind, state, now)
	}

	fn consume_nonce_now(
		&self,
		kind: SessionKind,
		nonce: &str,
		now: OffsetDateTime,
	) -> Result<FlowSession, StoreError> {
		let mut guard = self.inner.write();
		let state = guard.nonces.get(nonce).cloned().ok_or(StoreError::NotFound)?;

		guard.take(kind, &state, now)
	}
}
impl Default for MemorySessionStore {
	fn default() -> Self {
		Self {
			inner: Arc::new(RwLock::new(Inner {
				sessions: HashMap::new(),
				nonces: HashMap::new(),
				next_sweep: OffsetDateTime::UNIX_EPOCH,
			})),
			sweep_interval: Self::DEFAULT_SWEEP_INTERVAL,
		}
	}
}
impl FlowSessionStore for MemorySessionStore {
	fn create(&self, draft: SessionDraft, now: OffsetDateTime) -> StoreFuture<'_, SessionHandle> {
		Box::pin(async move { Ok(self.create_now(draft, now)) })
	}

	fn get<'a>(
		&'a self,
		kind: SessionKind,
		state: &'a str,
		now: OffsetDateTime,
	) -> StoreFuture<'a, FlowSession> {
		Box::pin(async move { self.get_now(kind, state, now) })
	}

	fn consume<'a>(
		&'a self,
		kind: SessionKind,
		state: &'a str,
		now: OffsetDateTime,
	) -> StoreFuture<'a, FlowSession> {
		Box::pin(async move { self.inner.write().take(kind, state, now) })
	}

	fn consume_by_nonce<'a>(
		&'a self,
		kind: SessionKind,
		nonce: &'a str,
		now: OffsetDateTime,
	) -> StoreFuture<'a, FlowSession> {
		Box::pin(async move { self.consume_nonce_now(kind, nonce, now) })
	}

	fn purge_expired(&self, now: OffsetDateTime) -> StoreFuture<'_, usize> {
		Box::pin(async move { Ok(self.inner.write().sweep(now)) })
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::session::SessionContext;

	fn draft(ttl: Duration) -> SessionDraft {
		SessionDraft {
			issuer: "https://lms.example".into(),
			audience: "abc".into(),
			context: SessionContext::Login {
				target_link_uri: Url::parse("https://tool.example/launch")
					.expect("Target link fixture should parse."),
				login_hint: "user-1".into(),
				lti_message_hint: None,
			},
			ttl,
		}
	}

	#[test]
	fn get_reports_expiry_once_then_not_found() {
		let store = MemorySessionStore::default();
		let now = OffsetDateTime::now_utc();
		let handle = store.create_now(draft(Duration::minutes(5)), now);
		let later = now + Duration::minutes(6);

		assert!(store.get_now(SessionKind::Login, &handle.state, now).is_ok());
		assert_eq!(
			store.get_now(SessionKind::Login, &handle.state, later),
			Err(StoreError::Expired)
		);
		assert_eq!(
			store.get_now(SessionKind::Login, &handle.state, later),
			Err(StoreError::NotFound)
		);
		assert!(store.is_empty());
	}

	#[test]
	fn create_sweeps_expired_sessions_lazily() {
		let store = MemorySessionStore::default().with_sweep_interval(Duration::ZERO);
		let now = OffsetDateTime::now_utc();

		store.create_now(draft(Duration::seconds(1)), now);
		store.create_now(draft(Duration::seconds(1)), now);

		assert_eq!(store.len(), 2);

		store.create_now(draft(Duration::minutes(5)), now + Duration::seconds(2));

		assert_eq!(store.len(), 1);
		assert_eq!(store.inner.read().nonces.len(), 1);
	}

	#[test]
	fn wrong_kind_neither_finds_nor_removes() {
		let store = MemorySessionStore::default();
		let now = OffsetDateTime::now_utc();
		let handle = store.create_now(draft(Duration::minutes(5)), now);
		let mut guard = store.inner.write();

		assert_eq!(guard.take(SessionKind::DeepLink, &handle.state, now), Err(StoreError::NotFound));
		assert!(guard.take(SessionKind::Login, &handle.state, now).is_ok());
	}
}
