//! Shared fixtures for integration tests: a scripted keyset transport, fixture keys, and
//! platform token minting.

#![allow(dead_code)]

// std
use std::{
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration as StdDuration,
};
// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use parking_lot::RwLock;
use time::{Duration, OffsetDateTime};
use url::Url;
// self
use lti_tool::{
	LtiTool,
	claims::uri,
	config::{JwksPolicy, ToolConfig},
	error::TransportError,
	flows::{AuthRequest, LaunchRequest, LoginInitiation},
	http::{FetchFuture, JwksHttpClient},
	issuer::{IssuerRecord, MemoryIssuerRegistry},
	jwks::JwkSet,
	keys::{RsaToolKey, ToolKeySource},
	session::MemorySessionStore,
};

pub const PLATFORM_KEY: &str = include_str!("../fixtures/platform_key.pem");
pub const TOOL_KEY: &str = include_str!("../fixtures/tool_key.pem");
pub const ISSUER: &str = "https://platform.example";
pub const CLIENT_ID: &str = "abc";
pub const DEPLOYMENT_ID: &str = "deployment-1";
pub const PLATFORM_KID: &str = "platform-1";
pub const TARGET_LINK_URI: &str = "https://tool.example/launch";
pub const APP_ENTRY_URL: &str = "https://tool.example/app";
pub const RETURN_URL: &str = "https://platform.example/deep_links?course=42";

/// Keyset transport serving a fixed document and counting requests.
pub struct StaticJwks {
	body: RwLock<Vec<u8>>,
	calls: AtomicUsize,
}
impl StaticJwks {
	pub fn new(set: &JwkSet) -> Self {
		Self { body: RwLock::new(Vec::new()), calls: AtomicUsize::new(0) }.serving(set)
	}

	pub fn serving(self, set: &JwkSet) -> Self {
		self.replace(set);

		self
	}

	pub fn replace(&self, set: &JwkSet) {
		*self.body.write() = serde_json::to_vec(set).expect("Keyset fixture should serialize.");
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}
impl JwksHttpClient for StaticJwks {
	fn fetch<'a>(&'a self, _url: &'a Url, _timeout: StdDuration) -> FetchFuture<'a> {
		Box::pin(async move {
			self.calls.fetch_add(1, Ordering::SeqCst);

			Ok::<_, TransportError>(self.body.read().clone())
		})
	}
}

pub fn url(value: &str) -> Url {
	Url::parse(value).expect("URL fixture should parse.")
}

pub fn issuer_record(issuer: &str, client_id: &str) -> IssuerRecord {
	IssuerRecord::builder(issuer)
		.client_id(client_id)
		.auth_url(url(&format!("{issuer}/auth")))
		.jwks_url(url(&format!("{issuer}/jwks")))
		.deployment_ids([DEPLOYMENT_ID])
		.build()
		.expect("Issuer fixture should build.")
}

pub fn platform_key() -> RsaToolKey {
	RsaToolKey::from_pem(PLATFORM_KEY)
		.expect("Platform key fixture should parse.")
		.with_kid(PLATFORM_KID)
}

pub fn tool_key() -> RsaToolKey {
	RsaToolKey::from_pem(TOOL_KEY).expect("Tool key fixture should parse.")
}

/// Tool wired to in-memory collaborators and a scripted keyset publishing the platform key.
pub struct Harness {
	pub tool: LtiTool<StaticJwks>,
	pub jwks: Arc<StaticJwks>,
	pub registry: Arc<MemoryIssuerRegistry>,
	pub sessions: Arc<MemorySessionStore>,
	pub platform: RsaToolKey,
}
impl Harness {
	pub fn new() -> Self {
		Self::with_config(
			ToolConfig::builder(url(APP_ENTRY_URL)).build().expect("Tool config should validate."),
		)
	}

	pub fn with_config(config: ToolConfig) -> Self {
		let platform = platform_key();
		let jwks = Arc::new(StaticJwks::new(&platform.public_jwks()));
		let registry = Arc::new(
			MemoryIssuerRegistry::with_records([issuer_record(ISSUER, CLIENT_ID)])
				.expect("Registry fixture should build."),
		);
		let sessions = Arc::new(MemorySessionStore::default());
		let tool = LtiTool::<StaticJwks>::with_http_client(
			registry.clone(),
			sessions.clone(),
			Arc::new(tool_key()),
			config,
			jwks.clone(),
			JwksPolicy { min_refetch_interval: Duration::ZERO, ..JwksPolicy::default() },
		)
		.expect("Tool should assemble.");

		Self { tool, jwks, registry, sessions, platform }
	}

	/// Runs the login step and returns the request plus the nonce from its redirect.
	pub async fn login(&self) -> (AuthRequest, String) {
		let request = self
			.tool
			.login(LoginInitiation {
				iss: ISSUER.into(),
				login_hint: "user-1".into(),
				target_link_uri: url(TARGET_LINK_URI),
				lti_message_hint: Some("resource-9".into()),
			})
			.await
			.expect("Login for a registered issuer should succeed.");
		let nonce = query_param(&request.redirect, "nonce").expect("Redirect should carry a nonce.");

		(request, nonce)
	}

	/// Signs `claims` as the platform.
	pub fn mint(&self, claims: &serde_json::Value) -> String {
		self.platform.sign(claims).expect("Platform fixture should sign.").into_inner()
	}

	/// Signed launch request for `claims`, echoing `state`.
	pub fn launch_request(&self, claims: &serde_json::Value, state: &str) -> LaunchRequest {
		LaunchRequest::from_id_token(self.mint(claims)).with_state(state)
	}
}

pub fn query_param(url: &Url, name: &str) -> Option<String> {
	url.query_pairs().find(|(key, _)| key == name).map(|(_, value)| value.into_owned())
}

/// Resource launch claims echoing `nonce`.
pub fn resource_claims(nonce: &str) -> serde_json::Value {
	let now = OffsetDateTime::now_utc();

	serde_json::json!({
		"iss": ISSUER,
		"aud": CLIENT_ID,
		"sub": "user-1",
		"iat": now.unix_timestamp(),
		"exp": (now + Duration::minutes(5)).unix_timestamp(),
		"nonce": nonce,
		"https://purl.imsglobal.org/spec/lti/claim/message_type": "LtiResourceLinkRequest",
		"https://purl.imsglobal.org/spec/lti/claim/version": "1.3.0",
		"https://purl.imsglobal.org/spec/lti/claim/deployment_id": DEPLOYMENT_ID,
		"https://purl.imsglobal.org/spec/lti/claim/target_link_uri": TARGET_LINK_URI,
		"https://purl.imsglobal.org/spec/lti/claim/resource_link": { "id": "link-1", "title": "Week 1" },
		"https://purl.imsglobal.org/spec/lti/claim/roles": [
			"http://purl.imsglobal.org/vocab/lis/v2/membership#Learner"
		],
		"https://purl.imsglobal.org/spec/lti/claim/context": { "id": "course-42", "label": "CS101" },
	})
}

/// Deep linking request claims echoing `nonce`.
pub fn deep_link_claims(nonce: &str) -> serde_json::Value {
	let mut claims = resource_claims(nonce);

	claims[uri::MESSAGE_TYPE] = "LtiDeepLinkingRequest".into();
	claims[uri::DEEP_LINKING_SETTINGS] = serde_json::json!({
		"deep_link_return_url": RETURN_URL,
		"accept_types": ["ltiResourceLink", "link"],
		"accept_presentation_document_targets": ["iframe", "window"],
		"accept_multiple": true,
		"data": "opaque-platform-data",
	});

	claims
}

/// Compact token with arbitrary header and signature segments.
pub fn forge(header: &serde_json::Value, claims: &serde_json::Value, signature: &str) -> String {
	let encode = |value: &serde_json::Value| {
		URL_SAFE_NO_PAD.encode(serde_json::to_vec(value).expect("Segment should serialize."))
	};

	format!("{}.{}.{signature}", encode(header), encode(claims))
}
