//! Thread-safe in-memory [`IssuerRegistry`] supporting runtime registration and revocation.

// self
use crate::{
	_prelude::*,
	issuer::{IssuerRecord, IssuerRecordError, IssuerRegistry, RegistryError, RegistryFuture},
};

type RecordMap = Arc<RwLock<HashMap<String, IssuerRecord>>>;

/// Registry backed by a process-local table.
#[derive(Clone, Debug, Default)]
pub struct MemoryIssuerRegistry(RecordMap);
impl MemoryIssuerRegistry {
	/// Builds a registry pre-populated with `records`.
	pub fn with_records(
		records: impl IntoIterator<Item = IssuerRecord>,
	) -> Result<Self, IssuerRecordError> {
		let registry = Self::default();

		for record in records {
			registry.register(record)?;
		}

		Ok(registry)
	}

	/// Adds or replaces the record for its issuer.
	pub fn register(&self, record: IssuerRecord) -> Result<(), IssuerRecordError> {
		record.validate()?;
		self.0.write().insert(record.issuer_url.clone(), record);

		Ok(())
	}

	/// Removes the record for `issuer`, returning it when present.
	pub fn revoke(&self, issuer: &str) -> Option<IssuerRecord> {
		self.0.write().remove(issuer)
	}

	/// Number of registered issuers.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns true when no issuer is registered.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}

	fn lookup_now(map: &RecordMap, issuer: &str) -> Result<IssuerRecord, RegistryError> {
		map.read()
			.get(issuer)
			.cloned()
			.ok_or_else(|| RegistryError::NotFound { issuer: issuer.to_owned() })
	}
}
impl IssuerRegistry for MemoryIssuerRegistry {
	fn lookup<'a>(&'a self, issuer: &'a str) -> RegistryFuture<'a, IssuerRecord> {
		Box::pin(async move { Self::lookup_now(&self.0, issuer) })
	}
}
