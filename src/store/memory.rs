//! Thread-safe in-memory [`CredentialStore`] for tests and demos.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::{
	_prelude::*,
	auth::Credential,
	store::{CredentialStore, StoreFuture},
};

/// Storage backend that keeps the record in-process.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
	record: Arc<RwLock<Option<Credential>>>,
	saves: Arc<AtomicU64>,
}
impl MemoryStore {
	/// Creates a store pre-populated with `credential`.
	pub fn with_credential(credential: Credential) -> Self {
		Self { record: Arc::new(RwLock::new(Some(credential))), saves: Default::default() }
	}

	/// Returns a copy of the current record without going through the async contract.
	pub fn snapshot(&self) -> Option<Credential> {
		self.record.read().clone()
	}

	/// Number of completed saves.
	pub fn saves(&self) -> u64 {
		self.saves.load(Ordering::Relaxed)
	}
}
impl CredentialStore for MemoryStore {
	fn load(&self) -> StoreFuture<'_, Option<Credential>> {
		let record = self.record.read().clone();

		Box::pin(async move { Ok(record) })
	}

	fn save(&self, credential: Credential) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			*self.record.write() = Some(credential);
			self.saves.fetch_add(1, Ordering::Relaxed);

			Ok(())
		})
	}
}
