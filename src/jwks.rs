//! Platform signing-key resolution.
//!
//! [`KeyResolver`] answers `(issuer, kid)` lookups from a bounded-lifetime cache and falls
//! back to fetching the issuer's keyset through a [`JwksHttpClient`]. Each fetch is a bounded
//! number of attempts, each under its own deadline; anything short of a usable key collapses
//! into [`Error::KeyNotFound`] so callers fail closed.
//!
//! Concurrent misses for one issuer are single-flighted behind a per-issuer async mutex, and
//! refetches triggered by unknown key ids are spaced by [`JwksPolicy::min_refetch_interval`]
//! so a stream of forged `kid` values cannot turn the Tool into a request amplifier.

// crates.io
use jsonwebtoken::DecodingKey;
// self
use crate::{
	_prelude::*,
	config::JwksPolicy,
	error::{ConfigError, TransportError},
	http::JwksHttpClient,
	issuer::IssuerRecord,
	obs,
};

/// JSON Web Key as published in a keyset (RFC 7517); only the RSA members are modeled.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
	/// Key type (`RSA`, `EC`, ...).
	pub kty: String,
	/// Intended use (`sig`, `enc`).
	#[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
	pub key_use: Option<String>,
	/// Algorithm the key is meant for.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub alg: Option<String>,
	/// Key id.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub kid: Option<String>,
	/// RSA modulus, base64url.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub n: Option<String>,
	/// RSA public exponent, base64url.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub e: Option<String>,
}
impl Jwk {
	/// Returns true for RSA keys usable to verify RS256 signatures.
	pub fn is_rs256_signing_key(&self) -> bool {
		self.kty == "RSA"
			&& self.key_use.as_deref().is_none_or(|key_use| key_use == "sig")
			&& self.alg.as_deref().is_none_or(|alg| alg == "RS256")
	}

	fn decoding_key(&self) -> Option<(String, DecodingKey)> {
		if !self.is_rs256_signing_key() {
			return None;
		}

		let kid = self.kid.clone()?;
		let key = DecodingKey::from_rsa_components(self.n.as_deref()?, self.e.as_deref()?).ok()?;

		Some((kid, key))
	}
}

/// JSON Web Key Set document.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwkSet {
	/// Published keys.
	pub keys: Vec<Jwk>,
}
impl JwkSet {
	/// Finds a key by id.
	pub fn find(&self, kid: &str) -> Option<&Jwk> {
		self.keys.iter().find(|key| key.kid.as_deref() == Some(kid))
	}
}

#[derive(Deserialize)]
struct RawKeySet {
	keys: Vec<serde_json::Value>,
}

#[derive(Clone)]
struct CachedKey {
	key: DecodingKey,
	expires_at: OffsetDateTime,
}

#[derive(Debug, Default)]
struct FetchGate {
	last_fetch: Option<OffsetDateTime>,
}

/// Resolves platform verification keys by `(issuer, kid)`.
pub struct KeyResolver<C>
where
	C: ?Sized + JwksHttpClient,
{
	http_client: Arc<C>,
	policy: JwksPolicy,
	cache: RwLock<HashMap<(String, String), CachedKey>>,
	gates: Mutex<HashMap<String, Arc<AsyncMutex<FetchGate>>>>,
}
impl<C> KeyResolver<C>
where
	C: ?Sized + JwksHttpClient,
{
	/// Creates a resolver after validating `policy`.
	pub fn new(http_client: impl Into<Arc<C>>, policy: JwksPolicy) -> Result<Self, ConfigError> {
		policy.validate()?;

		Ok(Self {
			http_client: http_client.into(),
			policy,
			cache: Default::default(),
			gates: Default::default(),
		})
	}

	/// Active fetch and cache policy.
	pub fn policy(&self) -> &JwksPolicy {
		&self.policy
	}

	/// Returns the verification key for `kid`, fetching the issuer's keyset on a miss.
	///
	/// The keyset URL always comes from `record`, never from the token being verified.
	pub async fn resolve(
		&self,
		record: &IssuerRecord,
		kid: &str,
		now: OffsetDateTime,
	) -> Result<DecodingKey> {
		let issuer = record.issuer_url.as_str();

		if let Some(key) = self.cached(issuer, kid, now) {
			return Ok(key);
		}

		let gate = self.gate(issuer);
		let mut gate = gate.lock().await;

		// Another task may have refilled the cache while this one waited.
		if let Some(key) = self.cached(issuer, kid, now) {
			return Ok(key);
		}

		let not_found = || Error::KeyNotFound { issuer: issuer.to_owned(), kid: kid.to_owned() };

		if gate.last_fetch.is_some_and(|last| now - last < self.policy.min_refetch_interval) {
			obs::log_refetch_suppressed(issuer, kid);

			return Err(not_found());
		}

		gate.last_fetch = Some(now);

		match self.fetch_keys(&record.jwks_url).await {
			Ok(keys) => self.install(issuer, keys, now),
			Err(e) => {
				obs::log_key_fetch_failure(issuer, &e);

				return Err(not_found());
			},
		}

		self.cached(issuer, kid, now).ok_or_else(not_found)
	}

	/// Number of cached keys across issuers, expired or not.
	pub fn cached_len(&self) -> usize {
		self.cache.read().len()
	}

	fn cached(&self, issuer: &str, kid: &str, now: OffsetDateTime) -> Option<DecodingKey> {
		let cache = self.cache.read();
		let entry = cache.get(&(issuer.to_owned(), kid.to_owned()))?;

		(now < entry.expires_at).then(|| entry.key.clone())
	}

	fn gate(&self, issuer: &str) -> Arc<AsyncMutex<FetchGate>> {
		let mut gates = self.gates.lock();

		gates.entry(issuer.to_owned()).or_default().clone()
	}

	fn install(&self, issuer: &str, keys: Vec<(String, DecodingKey)>, now: OffsetDateTime) {
		let expires_at = now + self.policy.cache_ttl;
		let mut cache = self.cache.write();

		// Rotation: keys the platform stopped publishing become unresolvable.
		cache.retain(|(cached_issuer, _), _| cached_issuer != issuer);

		for (kid, key) in keys {
			cache.insert((issuer.to_owned(), kid), CachedKey { key, expires_at });
		}
	}

	async fn fetch_keys(&self, url: &Url) -> Result<Vec<(String, DecodingKey)>, TransportError> {
		let deadline = self.policy.attempt_timeout;
		let mut attempt = 0;

		loop {
			attempt += 1;

			let outcome =
				match tokio::time::timeout(deadline, self.http_client.fetch(url, deadline)).await {
					Ok(Ok(body)) => parse_key_set(&body),
					Ok(Err(e)) => Err(e),
					Err(_) => Err(TransportError::Timeout),
				};

			match outcome {
				Ok(keys) => return Ok(keys),
				Err(e) if attempt < self.policy.max_attempts => obs::log_key_fetch_retry(url, &e),
				Err(e) => return Err(e),
			}
		}
	}
}
impl<C> Debug for KeyResolver<C>
where
	C: ?Sized + JwksHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("KeyResolver")
			.field("policy", &self.policy)
			.field("cached_keys", &self.cached_len())
			.finish()
	}
}

/// Extracts RS256 signing keys; entries this Tool cannot use are skipped, not fatal.
fn parse_key_set(body: &[u8]) -> Result<Vec<(String, DecodingKey)>, TransportError> {
	let mut de = serde_json::Deserializer::from_slice(body);
	let raw: RawKeySet = serde_path_to_error::deserialize(&mut de)
		.map_err(|source| TransportError::Parse { source })?;

	Ok(raw
		.keys
		.into_iter()
		.filter_map(|value| serde_json::from_value::<Jwk>(value).ok())
		.filter_map(|jwk| jwk.decoding_key())
		.collect())
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	use super::*;
	use crate::{
		http::FetchFuture,
		keys::{RsaToolKey, ToolKeySource},
	};

	const PLATFORM_KEY: &str = include_str!("../tests/fixtures/platform_key.pem");

	struct ScriptedJwks {
		body: RwLock<Vec<u8>>,
		failures_left: AtomicUsize,
		calls: AtomicUsize,
	}
	impl ScriptedJwks {
		fn new(set: &JwkSet, failures: usize) -> Self {
			Self {
				body: RwLock::new(serde_json::to_vec(set).expect("Keyset fixture should serialize.")),
				failures_left: AtomicUsize::new(failures),
				calls: AtomicUsize::new(0),
			}
		}
	}
	impl JwksHttpClient for ScriptedJwks {
		fn fetch<'a>(&'a self, _url: &'a Url, _timeout: StdDuration) -> FetchFuture<'a> {
			Box::pin(async move {
				self.calls.fetch_add(1, Ordering::SeqCst);

				if self
					.failures_left
					.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
					.is_ok()
				{
					return Err(TransportError::Status { status: 503 });
				}

				Ok(self.body.read().clone())
			})
		}
	}

	fn record() -> IssuerRecord {
		IssuerRecord::builder("https://platform.example")
			.client_id("abc")
			.auth_url(Url::parse("https://platform.example/auth").expect("Auth URL parses."))
			.jwks_url(Url::parse("https://platform.example/jwks").expect("JWKS URL parses."))
			.build()
			.expect("Issuer fixture should build.")
	}

	fn platform_key() -> RsaToolKey {
		RsaToolKey::from_pem(PLATFORM_KEY).expect("Platform key fixture should parse.")
	}

	fn policy() -> JwksPolicy {
		JwksPolicy { min_refetch_interval: Duration::ZERO, ..JwksPolicy::default() }
	}

	#[tokio::test]
	async fn miss_fetches_once_then_serves_from_cache() {
		let key = platform_key();
		let client = Arc::new(ScriptedJwks::new(&key.public_jwks(), 0));
		let resolver = KeyResolver::<ScriptedJwks>::new(client.clone(), policy())
			.expect("Policy should validate.");
		let now = OffsetDateTime::now_utc();

		resolver.resolve(&record(), key.kid(), now).await.expect("Published kid should resolve.");
		resolver.resolve(&record(), key.kid(), now).await.expect("Cached kid should resolve.");

		assert_eq!(client.calls.load(Ordering::SeqCst), 1);
		assert_eq!(resolver.cached_len(), 1);
	}

	#[tokio::test]
	async fn single_retry_recovers_from_transient_failure() {
		let key = platform_key();
		let client = Arc::new(ScriptedJwks::new(&key.public_jwks(), 1));
		let resolver = KeyResolver::<ScriptedJwks>::new(client.clone(), policy())
			.expect("Policy should validate.");

		resolver
			.resolve(&record(), key.kid(), OffsetDateTime::now_utc())
			.await
			.expect("Retry should recover the keyset.");

		assert_eq!(client.calls.load(Ordering::SeqCst), 2);
	}

	#[tokio::test]
	async fn exhausted_attempts_fail_closed_with_key_not_found() {
		let key = platform_key();
		let client = Arc::new(ScriptedJwks::new(&key.public_jwks(), 5));
		let resolver = KeyResolver::<ScriptedJwks>::new(client.clone(), policy())
			.expect("Policy should validate.");
		let err = resolver
			.resolve(&record(), key.kid(), OffsetDateTime::now_utc())
			.await
			.err().expect("Failing keyset endpoints must not yield a key.");

		assert!(matches!(err, Error::KeyNotFound { .. }));
		assert_eq!(client.calls.load(Ordering::SeqCst), 2);
	}

	#[tokio::test]
	async fn expired_entries_are_refetched_and_rotation_drops_old_keys() {
		let key = platform_key();
		let client = Arc::new(ScriptedJwks::new(&key.public_jwks(), 0));
		let resolver = KeyResolver::<ScriptedJwks>::new(client.clone(), policy())
			.expect("Policy should validate.");
		let now = OffsetDateTime::now_utc();

		resolver.resolve(&record(), key.kid(), now).await.expect("Initial kid should resolve.");

		let rotated = RsaToolKey::from_pem(PLATFORM_KEY)
			.expect("Platform key fixture should parse.")
			.with_kid("rotated-1");

		*client.body.write() =
			serde_json::to_vec(&rotated.public_jwks()).expect("Rotated keyset should serialize.");

		let later = now + Duration::minutes(11);

		resolver.resolve(&record(), "rotated-1", later).await.expect("Rotated kid should resolve.");

		let err = resolver
			.resolve(&record(), key.kid(), later)
			.await
			.err().expect("Retired kid must no longer resolve.");

		assert!(matches!(err, Error::KeyNotFound { .. }));
		assert_eq!(client.calls.load(Ordering::SeqCst), 3);
	}

	#[tokio::test]
	async fn unknown_kid_refetches_are_rate_limited() {
		let key = platform_key();
		let client = Arc::new(ScriptedJwks::new(&key.public_jwks(), 0));
		let resolver =
			KeyResolver::<ScriptedJwks>::new(client.clone(), JwksPolicy::default())
				.expect("Policy should validate.");
		let now = OffsetDateTime::now_utc();

		for kid in ["forged-1", "forged-2", "forged-3"] {
			let err = resolver
				.resolve(&record(), kid, now)
				.await
				.err().expect("Unpublished kids must not resolve.");

			assert!(matches!(err, Error::KeyNotFound { .. }));
		}

		assert_eq!(client.calls.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn key_set_parsing_skips_unusable_entries() {
		let body = serde_json::json!({
			"keys": [
				{ "kty": "EC", "kid": "ec-1", "crv": "P-256", "x": "AA", "y": "AA" },
				{ "kty": "RSA", "kid": "enc-1", "use": "enc", "n": "AQAB", "e": "AQAB" },
				{ "kty": "RSA", "use": "sig", "n": "AQAB", "e": "AQAB" },
				"not-a-key"
			]
		});
		let keys = parse_key_set(&serde_json::to_vec(&body).expect("Body should serialize."))
			.expect("Keyset with unusable entries should still parse.");

		assert!(keys.is_empty());
		assert!(matches!(parse_key_set(b"{\"kids\":[]}"), Err(TransportError::Parse { .. })));
	}
}
