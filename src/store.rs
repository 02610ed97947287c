//! Storage contract and built-in stores for the persisted credential record.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{_prelude::*, auth::Credential};

/// Boxed future returned by [`CredentialStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend holding the single credential record shared across process runs.
pub trait CredentialStore
where
	Self: Send + Sync,
{
	/// Loads the persisted credential. A missing record is `Ok(None)`, never an error.
	fn load(&self) -> StoreFuture<'_, Option<Credential>>;

	/// Persists or replaces the credential record.
	///
	/// Implementations must replace the record atomically so a concurrent [`load`] never
	/// observes a partially written value.
	///
	/// [`load`]: CredentialStore::load
	fn save(&self, credential: Credential) -> StoreFuture<'_, ()>;
}

/// Error type produced by [`CredentialStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
