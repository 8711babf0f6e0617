//! Validated platform records and their builder.

// self
use crate::_prelude::*;

/// Errors raised while constructing or validating issuer records.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum IssuerRecordError {
	/// The issuer identifier cannot be empty.
	#[error("Issuer identifier cannot be empty.")]
	EmptyIssuer,
	/// The client id cannot be empty.
	#[error("Client id cannot be empty.")]
	MissingClientId,
	/// The OIDC authorization endpoint is mandatory.
	#[error("Missing authorization endpoint.")]
	MissingAuthEndpoint,
	/// The keyset endpoint is mandatory.
	#[error("Missing JWKS endpoint.")]
	MissingJwksEndpoint,
	/// Endpoints must use HTTPS.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
}

/// Immutable description of a trusted platform.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuerRecord {
	/// Issuer identifier exactly as it appears in the platform's `iss` claim.
	pub issuer_url: String,
	/// Client id the platform assigned to this Tool.
	pub client_id: String,
	/// OIDC authorization endpoint the login step redirects to.
	pub auth_url: Url,
	/// OAuth 2.0 token endpoint (service calls; recorded for completeness).
	pub token_url: Option<Url>,
	/// Keyset endpoint publishing the platform's signing keys.
	pub jwks_url: Url,
	/// Deployment ids accepted for this issuer; empty accepts any deployment.
	#[serde(default)]
	pub deployment_ids: Vec<String>,
}
impl IssuerRecord {
	/// Creates a new builder for the provided issuer identifier.
	pub fn builder(issuer_url: impl Into<String>) -> IssuerRecordBuilder {
		IssuerRecordBuilder::new(issuer_url)
	}

	/// Returns true when `deployment_id` is allowed for this issuer.
	pub fn accepts_deployment(&self, deployment_id: &str) -> bool {
		self.deployment_ids.is_empty() || self.deployment_ids.iter().any(|id| id == deployment_id)
	}

	/// Validates invariants for the record.
	pub fn validate(&self) -> Result<(), IssuerRecordError> {
		if self.issuer_url.trim().is_empty() {
			return Err(IssuerRecordError::EmptyIssuer);
		}
		if self.client_id.trim().is_empty() {
			return Err(IssuerRecordError::MissingClientId);
		}

		validate_endpoint("auth", &self.auth_url)?;
		validate_endpoint("jwks", &self.jwks_url)?;

		if let Some(token) = self.token_url.as_ref() {
			validate_endpoint("token", token)?;
		}

		Ok(())
	}
}

/// Builder for [`IssuerRecord`] values.
#[derive(Debug)]
pub struct IssuerRecordBuilder {
	/// Issuer identifier for the record being constructed.
	pub issuer_url: String,
	/// Client id assigned by the platform.
	pub client_id: Option<String>,
	/// OIDC authorization endpoint.
	pub auth_url: Option<Url>,
	/// Optional token endpoint.
	pub token_url: Option<Url>,
	/// Keyset endpoint.
	pub jwks_url: Option<Url>,
	/// Allowed deployment ids.
	pub deployment_ids: Vec<String>,
}
impl IssuerRecordBuilder {
	/// Creates a new builder seeded with the provided issuer identifier.
	pub fn new(issuer_url: impl Into<String>) -> Self {
		Self {
			issuer_url: issuer_url.into(),
			client_id: None,
			auth_url: None,
			token_url: None,
			jwks_url: None,
			deployment_ids: Vec::new(),
		}
	}

	/// Sets the client id.
	pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
		self.client_id = Some(client_id.into());

		self
	}

	/// Sets the OIDC authorization endpoint.
	pub fn auth_url(mut self, url: Url) -> Self {
		self.auth_url = Some(url);

		self
	}

	/// Sets the optional token endpoint.
	pub fn token_url(mut self, url: Url) -> Self {
		self.token_url = Some(url);

		self
	}

	/// Sets the keyset endpoint.
	pub fn jwks_url(mut self, url: Url) -> Self {
		self.jwks_url = Some(url);

		self
	}

	/// Restricts the record to the provided deployment ids.
	pub fn deployment_ids<I, S>(mut self, ids: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.deployment_ids.extend(ids.into_iter().map(Into::into));

		self
	}

	/// Consumes the builder and validates the resulting record.
	pub fn build(self) -> Result<IssuerRecord, IssuerRecordError> {
		let client_id = self.client_id.ok_or(IssuerRecordError::MissingClientId)?;
		let auth_url = self.auth_url.ok_or(IssuerRecordError::MissingAuthEndpoint)?;
		let jwks_url = self.jwks_url.ok_or(IssuerRecordError::MissingJwksEndpoint)?;
		let record = IssuerRecord {
			issuer_url: self.issuer_url,
			client_id,
			auth_url,
			token_url: self.token_url,
			jwks_url,
			deployment_ids: self.deployment_ids,
		};

		record.validate()?;

		Ok(record)
	}
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), IssuerRecordError> {
	if url.scheme() != "https" {
		Err(IssuerRecordError::InsecureEndpoint { endpoint: name, url: url.to_string() })
	} else {
		Ok(())
	}
}
