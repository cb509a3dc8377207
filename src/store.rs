//! Key-value storage contract, built-in backends, and the token store wrapper.

pub mod file;
pub mod memory;
pub mod tokens;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use tokens::TokenStore;

// self
use crate::_prelude::*;

/// Boxed future returned by [`AsyncStorage`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Persistent asynchronous key-value storage consumed by the token store.
///
/// Implementations decide their own durability; the pipeline only relies on `multi_set`
/// applying every entry in one call.
pub trait AsyncStorage
where
	Self: Send + Sync,
{
	/// Reads a single key.
	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>>;

	/// Writes a single key.
	fn set<'a>(&'a self, key: &'a str, value: String) -> StoreFuture<'a, ()>;

	/// Reads several keys, preserving the requested order.
	fn multi_get<'a>(&'a self, keys: &'a [String]) -> StoreFuture<'a, Vec<(String, Option<String>)>>;

	/// Writes several keys in a single operation.
	fn multi_set(&self, entries: Vec<(String, String)>) -> StoreFuture<'_, ()>;
}

/// Error type produced by [`AsyncStorage`] implementations.
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
