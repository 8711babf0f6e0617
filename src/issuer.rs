//! Trusted platform registry.
//!
//! [`IssuerRecord`] values are the sole source of endpoint URLs the Tool talks to; nothing
//! taken from request input is ever used as an authorization or keyset endpoint. Registries
//! implement [`IssuerRegistry`] so deployments can swap the in-memory table for a persisted
//! source without touching the flows.

pub mod file;
pub mod memory;
pub mod record;

pub use file::FileIssuerRegistry;
pub use memory::MemoryIssuerRegistry;
pub use record::*;

// self
use crate::_prelude::*;

/// Boxed future returned by [`IssuerRegistry`] operations.
pub type RegistryFuture<'a, T> =
	Pin<Box<dyn Future<Output = Result<T, RegistryError>> + 'a + Send>>;

/// Lookup contract for trusted platforms.
pub trait IssuerRegistry
where
	Self: Send + Sync,
{
	/// Resolves the record registered for `issuer`, or [`RegistryError::NotFound`].
	fn lookup<'a>(&'a self, issuer: &'a str) -> RegistryFuture<'a, IssuerRecord>;
}

/// Error type produced by [`IssuerRegistry`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum RegistryError {
	/// The issuer is not registered (or was revoked).
	#[error("Issuer `{issuer}` is not registered.")]
	NotFound {
		/// Issuer URL that was looked up.
		issuer: String,
	},
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the configuration source.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
