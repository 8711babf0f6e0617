//! LTI 1.3 and Deep Linking 2.0 claim model.
//!
//! Claim names are the IMS Global namespaced URIs, spelled verbatim because they are wire
//! contracts with third-party platforms. [`IdTokenClaims`] is what a platform id token is
//! decoded into *after* its signature verified; [`VerifiedLaunchClaims`] is only produced once
//! every launch check passed.

// self
use crate::_prelude::*;

/// Namespaced claim URIs.
pub mod uri {
	/// LTI message type.
	pub const MESSAGE_TYPE: &str = "https://purl.imsglobal.org/spec/lti/claim/message_type";
	/// LTI version.
	pub const VERSION: &str = "https://purl.imsglobal.org/spec/lti/claim/version";
	/// Deployment id.
	pub const DEPLOYMENT_ID: &str = "https://purl.imsglobal.org/spec/lti/claim/deployment_id";
	/// Target link URI.
	pub const TARGET_LINK_URI: &str = "https://purl.imsglobal.org/spec/lti/claim/target_link_uri";
	/// Resource link.
	pub const RESOURCE_LINK: &str = "https://purl.imsglobal.org/spec/lti/claim/resource_link";
	/// Membership roles.
	pub const ROLES: &str = "https://purl.imsglobal.org/spec/lti/claim/roles";
	/// Course context.
	pub const CONTEXT: &str = "https://purl.imsglobal.org/spec/lti/claim/context";
	/// Deep linking settings.
	pub const DEEP_LINKING_SETTINGS: &str =
		"https://purl.imsglobal.org/spec/lti-dl/claim/deep_linking_settings";
	/// Deep linking content items.
	pub const CONTENT_ITEMS: &str = "https://purl.imsglobal.org/spec/lti-dl/claim/content_items";
	/// Opaque deep linking data echoed back to the platform.
	pub const DATA: &str = "https://purl.imsglobal.org/spec/lti-dl/claim/data";
}

/// LTI version this Tool speaks.
pub const LTI_VERSION: &str = "1.3.0";

/// LTI message types.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageType {
	/// Regular resource launch.
	ResourceLinkRequest,
	/// Launch asking the Tool to pick content.
	DeepLinkingRequest,
	/// Tool's answer to a deep linking request.
	DeepLinkingResponse,
	/// Any other message type, kept verbatim.
	Other(String),
}
impl MessageType {
	/// Returns the wire name.
	pub fn as_str(&self) -> &str {
		match self {
			Self::ResourceLinkRequest => "LtiResourceLinkRequest",
			Self::DeepLinkingRequest => "LtiDeepLinkingRequest",
			Self::DeepLinkingResponse => "LtiDeepLinkingResponse",
			Self::Other(value) => value,
		}
	}
}
impl From<String> for MessageType {
	fn from(value: String) -> Self {
		match value.as_str() {
			"LtiResourceLinkRequest" => Self::ResourceLinkRequest,
			"LtiDeepLinkingRequest" => Self::DeepLinkingRequest,
			"LtiDeepLinkingResponse" => Self::DeepLinkingResponse,
			_ => Self::Other(value),
		}
	}
}
impl From<MessageType> for String {
	fn from(value: MessageType) -> Self {
		match value {
			MessageType::Other(value) => value,
			known => known.as_str().to_owned(),
		}
	}
}
impl Display for MessageType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// `aud` claim, which OIDC allows as a single string or an array.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
	/// Single audience value.
	One(String),
	/// Several audience values.
	Many(Vec<String>),
}
impl Audience {
	/// Returns true when `client_id` is one of the audiences.
	pub fn contains(&self, client_id: &str) -> bool {
		match self {
			Self::One(value) => value == client_id,
			Self::Many(values) => values.iter().any(|value| value == client_id),
		}
	}

	/// Number of audience values.
	pub fn len(&self) -> usize {
		match self {
			Self::One(_) => 1,
			Self::Many(values) => values.len(),
		}
	}

	/// Returns true when the claim carries no audience at all.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

/// Resource link claim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLink {
	/// Platform-stable resource link id.
	pub id: String,
	/// Link title.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub title: Option<String>,
	/// Link description.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
}

/// Course context claim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LtiContext {
	/// Platform-stable context id.
	pub id: String,
	/// Short label (course code).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub label: Option<String>,
	/// Full title.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub title: Option<String>,
	/// Context type URIs.
	#[serde(rename = "type", default, skip_serializing_if = "Vec::is_empty")]
	pub types: Vec<String>,
}

/// Deep linking settings the platform sends with a deep linking request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeepLinkingSettings {
	/// Where the Tool must send its signed response.
	pub deep_link_return_url: Url,
	/// Content item types the platform accepts (`ltiResourceLink`, `link`, `file`, ...).
	#[serde(default)]
	pub accept_types: Vec<String>,
	/// Presentation targets the platform accepts (`iframe`, `window`, ...).
	#[serde(default)]
	pub accept_presentation_document_targets: Vec<String>,
	/// Media types accepted for `file` items.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub accept_media_types: Option<String>,
	/// Whether more than one item may be returned.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub accept_multiple: Option<bool>,
	/// Whether the platform creates the items without further user interaction.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub auto_create: Option<bool>,
	/// Default title hint.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub title: Option<String>,
	/// Default text hint.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub text: Option<String>,
	/// Opaque value that must be echoed in the response.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data: Option<String>,
}
impl DeepLinkingSettings {
	/// Checks a selection against `accept_types` and `accept_multiple`.
	pub fn check_selection(&self, items: &[ContentItem]) -> Result<(), String> {
		if items.len() > 1 && self.accept_multiple == Some(false) {
			return Err(format!("platform accepts a single item, got {}", items.len()));
		}
		if self.accept_types.is_empty() {
			return Ok(());
		}

		match items.iter().find(|item| !self.accept_types.contains(&item.item_type)) {
			Some(item) => Err(format!("item type `{}` is not accepted", item.item_type)),
			None => Ok(()),
		}
	}
}

/// Content item returned to the platform.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
	/// Item type (`ltiResourceLink`, `link`, `file`, `html`, `image`).
	#[serde(rename = "type")]
	pub item_type: String,
	/// Display title.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub title: Option<String>,
	/// Target URL.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub url: Option<Url>,
	/// Plain-text description.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub text: Option<String>,
	/// Custom parameters the platform passes back on launch.
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub custom: BTreeMap<String, String>,
}
impl ContentItem {
	/// Builds an `ltiResourceLink` item launching `url`.
	pub fn lti_resource_link(title: impl Into<String>, url: Url) -> Self {
		Self::new("ltiResourceLink", title, url)
	}

	/// Builds a plain `link` item.
	pub fn link(title: impl Into<String>, url: Url) -> Self {
		Self::new("link", title, url)
	}

	fn new(item_type: &str, title: impl Into<String>, url: Url) -> Self {
		Self {
			item_type: item_type.to_owned(),
			title: Some(title.into()),
			url: Some(url),
			text: None,
			custom: BTreeMap::new(),
		}
	}
}

/// Claims of a platform id token whose signature already verified.
#[derive(Clone, Debug, Deserialize)]
pub struct IdTokenClaims {
	/// Platform issuer.
	pub iss: String,
	/// Audience (client id or list containing it).
	pub aud: Audience,
	/// Authorized party; required to equal the client id when `aud` has several values.
	#[serde(default)]
	pub azp: Option<String>,
	/// Platform user id; absent for anonymous launches.
	#[serde(default)]
	pub sub: Option<String>,
	/// Expiry (unix seconds).
	pub exp: i64,
	/// Not-before (unix seconds).
	#[serde(default)]
	pub nbf: Option<i64>,
	/// Nonce echoed from the authentication request.
	pub nonce: String,
	/// Message type.
	#[serde(rename = "https://purl.imsglobal.org/spec/lti/claim/message_type")]
	pub message_type: MessageType,
	/// LTI version.
	#[serde(rename = "https://purl.imsglobal.org/spec/lti/claim/version")]
	pub version: String,
	/// Deployment id.
	#[serde(rename = "https://purl.imsglobal.org/spec/lti/claim/deployment_id")]
	pub deployment_id: String,
	/// Target link URI the platform launched.
	#[serde(default, rename = "https://purl.imsglobal.org/spec/lti/claim/target_link_uri")]
	pub target_link_uri: Option<String>,
	/// Resource link.
	#[serde(default, rename = "https://purl.imsglobal.org/spec/lti/claim/resource_link")]
	pub resource_link: Option<ResourceLink>,
	/// Membership roles.
	#[serde(default, rename = "https://purl.imsglobal.org/spec/lti/claim/roles")]
	pub roles: Vec<String>,
	/// Course context.
	#[serde(default, rename = "https://purl.imsglobal.org/spec/lti/claim/context")]
	pub context: Option<LtiContext>,
	/// Deep linking settings (deep linking requests only).
	#[serde(default, rename = "https://purl.imsglobal.org/spec/lti-dl/claim/deep_linking_settings")]
	pub deep_linking_settings: Option<DeepLinkingSettings>,
}

/// Launch claims produced only after signature, nonce, audience, and issuer checks passed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[non_exhaustive]
pub struct VerifiedLaunchClaims {
	/// Platform issuer.
	pub issuer: String,
	/// Client id the token was issued for.
	pub audience: String,
	/// Platform user id.
	pub subject: Option<String>,
	/// Deployment id.
	pub deployment_id: String,
	/// Message type.
	pub message_type: MessageType,
	/// LTI version.
	pub version: String,
	/// Target link URI recorded when the login started.
	pub target_link_uri: Url,
	/// Membership roles, passed through untouched.
	pub roles: Vec<String>,
	/// Resource link.
	pub resource_link: Option<ResourceLink>,
	/// Course context.
	pub context: Option<LtiContext>,
	/// Deep linking settings (deep linking requests only).
	pub deep_linking_settings: Option<DeepLinkingSettings>,
}
impl VerifiedLaunchClaims {
	pub(crate) fn from_verified(
		claims: IdTokenClaims,
		audience: String,
		target_link_uri: Url,
	) -> Self {
		Self {
			issuer: claims.iss,
			audience,
			subject: claims.sub,
			deployment_id: claims.deployment_id,
			message_type: claims.message_type,
			version: claims.version,
			target_link_uri,
			roles: claims.roles,
			resource_link: claims.resource_link,
			context: claims.context,
			deep_linking_settings: claims.deep_linking_settings,
		}
	}

	/// Returns true for deep linking requests.
	pub fn is_deep_linking(&self) -> bool {
		self.message_type == MessageType::DeepLinkingRequest
	}
}

/// Claim set of the Tool's signed deep linking response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeepLinkResponseClaims {
	/// Tool client id.
	pub iss: String,
	/// Platform issuer.
	pub aud: String,
	/// Issued-at (unix seconds).
	pub iat: i64,
	/// Expiry (unix seconds).
	pub exp: i64,
	/// Fresh nonce, never the launch nonce.
	pub nonce: String,
	/// Always `LtiDeepLinkingResponse`.
	#[serde(rename = "https://purl.imsglobal.org/spec/lti/claim/message_type")]
	pub message_type: MessageType,
	/// Always `1.3.0`.
	#[serde(rename = "https://purl.imsglobal.org/spec/lti/claim/version")]
	pub version: String,
	/// Deployment id echoed from the launch.
	#[serde(rename = "https://purl.imsglobal.org/spec/lti/claim/deployment_id")]
	pub deployment_id: String,
	/// Selected items.
	#[serde(rename = "https://purl.imsglobal.org/spec/lti-dl/claim/content_items")]
	pub content_items: Vec<ContentItem>,
	/// Platform `data` echoed when present.
	#[serde(
		default,
		rename = "https://purl.imsglobal.org/spec/lti-dl/claim/data",
		skip_serializing_if = "Option::is_none"
	)]
	pub data: Option<String>,
}
