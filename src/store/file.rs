//! File-backed [`CredentialStore`] that keeps the token record in a JSON file.

// std
use std::{
	fs::{self, File, OpenOptions},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	auth::Credential,
	store::{CredentialStore, StoreError, StoreFuture},
};

/// File name used when no explicit path is configured.
pub const DEFAULT_TOKEN_FILE: &str = "netatmo_token.json";

/// Persists the credential record to a JSON file readable only by its owner.
///
/// Each save writes a sibling temporary file, syncs it, and renames it over the target so
/// readers see either the previous record or the new one. Besides the JSON record the loader
/// accepts a file holding nothing but a refresh token, the bootstrap format written by
/// earlier exporter releases.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	write_lock: Arc<Mutex<()>>,
}
impl FileStore {
	/// Creates a store at the provided path. Nothing is read or written until first use.
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into(), write_lock: Default::default() }
	}

	/// Location of the backing file.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn load_now(path: &Path) -> Result<Option<Credential>, StoreError> {
		let bytes = match fs::read(path) {
			Ok(bytes) => bytes,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
			Err(e) =>
				return Err(StoreError::Backend {
					message: format!("Failed to read {}: {e}", path.display()),
				}),
		};
		let text = String::from_utf8_lossy(&bytes);
		let trimmed = text.trim();

		if trimmed.is_empty() {
			return Ok(None);
		}
		if !trimmed.starts_with('{') && !trimmed.contains(char::is_whitespace) {
			return Ok(Some(Credential::refresh_only(trimmed)));
		}

		serde_json::from_str(trimmed).map(Some).map_err(|e| StoreError::Serialization {
			message: format!("Failed to parse {}: {e}", path.display()),
		})
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}

	fn persist_locked(&self, credential: &Credential) -> Result<(), StoreError> {
		Self::ensure_parent_exists(&self.path)?;

		let serialized =
			serde_json::to_vec_pretty(credential).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize credential record: {e}"),
			})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = Self::create_private(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}

	#[cfg(unix)]
	fn create_private(path: &Path) -> std::io::Result<File> {
		// std
		use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

		let file =
			OpenOptions::new().write(true).create(true).truncate(true).mode(0o600).open(path)?;

		// `mode` only applies on creation; a leftover temp file keeps its old bits.
		file.set_permissions(fs::Permissions::from_mode(0o600))?;

		Ok(file)
	}

	#[cfg(not(unix))]
	fn create_private(path: &Path) -> std::io::Result<File> {
		OpenOptions::new().write(true).create(true).truncate(true).open(path)
	}
}
impl Default for FileStore {
	fn default() -> Self {
		Self::new(DEFAULT_TOKEN_FILE)
	}
}
impl CredentialStore for FileStore {
	fn load(&self) -> StoreFuture<'_, Option<Credential>> {
		Box::pin(async move { Self::load_now(&self.path) })
	}

	fn save(&self, credential: Credential) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			let _guard = self.write_lock.lock();

			self.persist_locked(&credential)
		})
	}
}
