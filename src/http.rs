//! Transport primitives for fetching platform keysets.
//!
//! [`JwksHttpClient`] is the Tool's only dependency on an HTTP stack. The key resolver calls
//! it with the keyset URL taken from a trusted [`crate::issuer::IssuerRecord`] and a per-attempt
//! deadline; implementations return the raw response body or a [`TransportError`].

// std
#[cfg(feature = "reqwest")] use std::ops::Deref;
// self
use crate::{_prelude::*, error::TransportError};

/// Boxed future returned by [`JwksHttpClient::fetch`].
pub type FetchFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<u8>, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP transports capable of fetching a JWKS document.
///
/// Implementations must be `Send + Sync + 'static` so one transport can back every
/// concurrent launch, and must honor `timeout` for the whole request including the body.
/// Non-success statuses are errors; redirects should not be followed, since the keyset URL is
/// pinned by configuration.
pub trait JwksHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Performs a GET against `url`, returning the response body.
	fn fetch<'a>(&'a self, url: &'a Url, timeout: StdDuration) -> FetchFuture<'a>;
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
#[cfg(feature = "reqwest")]
#[derive(Clone)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Builds a client that never follows redirects.
	pub fn new() -> Result<Self, crate::error::ConfigError> {
		let client = ReqwestClient::builder().redirect(reqwest::redirect::Policy::none()).build()?;

		Ok(Self(client))
	}

	/// Wraps an existing reqwest [`ReqwestClient`]. Configure it to disable redirect following.
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl JwksHttpClient for ReqwestHttpClient {
	fn fetch<'a>(&'a self, url: &'a Url, timeout: StdDuration) -> FetchFuture<'a> {
		Box::pin(async move {
			let response = self
				.0
				.get(url.clone())
				.header(reqwest::header::ACCEPT, "application/json")
				.timeout(timeout)
				.send()
				.await?;
			let status = response.status();

			if !status.is_success() {
				return Err(TransportError::Status { status: status.as_u16() });
			}

			Ok(response.bytes().await?.to_vec())
		})
	}
}
