//! Thread-safe in-memory [`AsyncStorage`] implementation for local development and tests.

// self
use crate::{
	_prelude::*,
	store::{AsyncStorage, StoreFuture},
};

type StoreMap = Arc<RwLock<HashMap<String, String>>>;

/// Thread-safe storage backend that keeps entries in-process for tests and demos.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(StoreMap);
impl MemoryStore {
	/// Returns a copy of a stored value without going through the async contract.
	pub fn snapshot(&self, key: &str) -> Option<String> {
		self.0.read().get(key).cloned()
	}

	fn multi_get_now(map: StoreMap, keys: &[String]) -> Vec<(String, Option<String>)> {
		let guard = map.read();

		keys.iter().map(|key| (key.clone(), guard.get(key).cloned())).collect()
	}

	fn multi_set_now(map: StoreMap, entries: Vec<(String, String)>) {
		let mut guard = map.write();

		guard.extend(entries);
	}
}
impl AsyncStorage for MemoryStore {
	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(map.read().get(key).cloned()) })
	}

	fn set<'a>(&'a self, key: &'a str, value: String) -> StoreFuture<'a, ()> {
		let map = self.0.clone();

		Box::pin(async move {
			map.write().insert(key.to_owned(), value);

			Ok(())
		})
	}

	fn multi_get<'a>(&'a self, keys: &'a [String]) -> StoreFuture<'a, Vec<(String, Option<String>)>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(Self::multi_get_now(map, keys)) })
	}

	fn multi_set(&self, entries: Vec<(String, String)>) -> StoreFuture<'_, ()> {
		let map = self.0.clone();

		Box::pin(async move {
			Self::multi_set_now(map, entries);

			Ok(())
		})
	}
}
