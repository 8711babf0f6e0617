//! JSON-file-backed [`IssuerRegistry`] for deployments that manage platforms as configuration.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	issuer::{IssuerRecord, IssuerRegistry, RegistryError, RegistryFuture},
};

type RecordMap = HashMap<String, IssuerRecord>;

/// Persists issuer records to a JSON array after each mutation.
#[derive(Clone, Debug)]
pub struct FileIssuerRegistry {
	path: PathBuf,
	inner: Arc<RwLock<RecordMap>>,
}
impl FileIssuerRegistry {
	/// Opens (or creates) a registry at the provided path, eagerly loading existing records.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, RegistryError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let snapshot = Self::load_snapshot(&path)?;

		Ok(Self { path, inner: Arc::new(RwLock::new(snapshot)) })
	}

	/// Re-reads the file, replacing the in-memory table; returns the number of records.
	pub fn reload(&self) -> Result<usize, RegistryError> {
		let snapshot = Self::load_snapshot(&self.path)?;
		let count = snapshot.len();

		*self.inner.write() = snapshot;

		Ok(count)
	}

	/// Adds or replaces the record for its issuer and persists the table.
	///
	/// The in-memory table only changes once the file was written, so a failed registration
	/// never leaves the issuer trusted.
	pub fn register(&self, record: IssuerRecord) -> Result<(), RegistryError> {
		record
			.validate()
			.map_err(|e| RegistryError::Backend { message: format!("Rejected record: {e}") })?;

		let mut guard = self.inner.write();
		let mut next = guard.clone();

		next.insert(record.issuer_url.clone(), record);
		self.persist_locked(&next)?;

		*guard = next;

		Ok(())
	}

	/// Removes the record for `issuer` and persists the table.
	///
	/// On a persistence failure the record stays registered, matching the file.
	pub fn revoke(&self, issuer: &str) -> Result<Option<IssuerRecord>, RegistryError> {
		let mut guard = self.inner.write();

		if !guard.contains_key(issuer) {
			return Ok(None);
		}

		let mut next = guard.clone();
		let removed = next.remove(issuer);

		self.persist_locked(&next)?;

		*guard = next;

		Ok(removed)
	}

	fn load_snapshot(path: &Path) -> Result<RecordMap, RegistryError> {
		if !path.exists() {
			return Ok(HashMap::new());
		}

		let bytes = fs::read(path).map_err(|e| RegistryError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;

		if bytes.is_empty() {
			return Ok(HashMap::new());
		}

		let records: Vec<IssuerRecord> =
			serde_json::from_slice(&bytes).map_err(|e| RegistryError::Serialization {
				message: format!("Failed to parse {}: {e}", path.display()),
			})?;

		records
			.into_iter()
			.map(|record| {
				record.validate().map_err(|e| RegistryError::Serialization {
					message: format!("Invalid record `{}`: {e}", record.issuer_url),
				})?;

				Ok::<_, RegistryError>((record.issuer_url.clone(), record))
			})
			.collect()
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), RegistryError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| RegistryError::Backend {
				message: format!("Failed to create registry directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}

	fn persist_locked(&self, contents: &RecordMap) -> Result<(), RegistryError> {
		Self::ensure_parent_exists(&self.path)?;

		let mut snapshot: Vec<_> = contents.values().collect();

		snapshot.sort_by(|a, b| a.issuer_url.cmp(&b.issuer_url));

		let serialized =
			serde_json::to_vec_pretty(&snapshot).map_err(|e| RegistryError::Serialization {
				message: format!("Failed to serialize registry snapshot: {e}"),
			})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| RegistryError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| RegistryError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| RegistryError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| RegistryError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}
}
impl IssuerRegistry for FileIssuerRegistry {
	fn lookup<'a>(&'a self, issuer: &'a str) -> RegistryFuture<'a, IssuerRecord> {
		Box::pin(async move {
			self.inner
				.read()
				.get(issuer)
				.cloned()
				.ok_or_else(|| RegistryError::NotFound { issuer: issuer.to_owned() })
		})
	}
}
