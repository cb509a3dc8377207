//! Token pair persistence on top of an [`AsyncStorage`] backend.

// self
use crate::{
	_prelude::*,
	auth::{ProviderId, TokenKind, TokenPair, TokenSecret},
	error::StorageError,
	store::AsyncStorage,
};

/// Reads and writes one integration's access/refresh tokens.
///
/// Keys are scoped by provider (`"{provider}:access_token"`). Failures are surfaced as
/// [`StorageError`] without retries.
#[derive(Clone)]
pub struct TokenStore {
	storage: Arc<dyn AsyncStorage>,
	provider: ProviderId,
}
impl TokenStore {
	/// Creates a token store scoped to `provider`.
	pub fn new(storage: Arc<dyn AsyncStorage>, provider: ProviderId) -> Self {
		Self { storage, provider }
	}

	/// Integration the keys are scoped to.
	pub fn provider(&self) -> &ProviderId {
		&self.provider
	}

	/// Storage key for one half of the pair.
	pub fn key(&self, kind: TokenKind) -> String {
		self.provider.storage_key(kind)
	}

	/// Reads one token, returning `None` when the key is absent.
	pub async fn get_token(&self, kind: TokenKind) -> Result<Option<TokenSecret>, StorageError> {
		let name = self.key(kind);
		let value = self
			.storage
			.get(&name)
			.await
			.map_err(|e| StorageError::Read { message: e.to_string(), name: name.clone() })?;

		Ok(value.map(TokenSecret::new))
	}

	/// Reads both tokens with one multi-key read; `None` when no access token is stored.
	pub async fn load_pair(&self) -> Result<Option<TokenPair>, StorageError> {
		let keys = [self.key(TokenKind::Access), self.key(TokenKind::Refresh)];
		let entries = self.storage.multi_get(&keys).await.map_err(|e| StorageError::Read {
			name: keys.join(","),
			message: e.to_string(),
		})?;
		let lookup = |key: &str| {
			entries.iter().find(|(k, _)| k == key).and_then(|(_, value)| value.clone())
		};
		let Some(access) = lookup(&keys[0]) else {
			return Ok(None);
		};
		let refresh = lookup(&keys[1]).unwrap_or_default();

		Ok(Some(TokenPair::new(access, refresh)))
	}

	/// Writes both tokens in a single multi-key write.
	pub async fn set_tokens(
		&self,
		access_token: &TokenSecret,
		refresh_token: &TokenSecret,
	) -> Result<(), StorageError> {
		let entries = vec![
			(self.key(TokenKind::Access), access_token.expose().to_owned()),
			(self.key(TokenKind::Refresh), refresh_token.expose().to_owned()),
		];

		self.storage
			.multi_set(entries)
			.await
			.map_err(|e| StorageError::Write { message: e.to_string() })
	}

	/// Persists a whole pair, e.g. after the authorization-code exchange.
	pub async fn store_pair(&self, pair: &TokenPair) -> Result<(), StorageError> {
		self.set_tokens(&pair.access_token, &pair.refresh_token).await
	}
}
impl Debug for TokenStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenStore").field("provider", &self.provider).finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::store::{MemoryStore, StoreError, StoreFuture};

	struct BrokenStore;
	impl AsyncStorage for BrokenStore {
		fn get<'a>(&'a self, _key: &'a str) -> StoreFuture<'a, Option<String>> {
			Box::pin(async { Err(StoreError::Backend { message: "read boom".into() }) })
		}

		fn set<'a>(&'a self, _key: &'a str, _value: String) -> StoreFuture<'a, ()> {
			Box::pin(async { Err(StoreError::Backend { message: "boom".into() }) })
		}

		fn multi_get<'a>(
			&'a self,
			_keys: &'a [String],
		) -> StoreFuture<'a, Vec<(String, Option<String>)>> {
			Box::pin(async { Err(StoreError::Backend { message: "read boom".into() }) })
		}

		fn multi_set(&self, _entries: Vec<(String, String)>) -> StoreFuture<'_, ()> {
			Box::pin(async { Err(StoreError::Backend { message: "boom".into() }) })
		}
	}

	fn provider() -> ProviderId {
		ProviderId::new("truelayer").expect("Provider fixture should be valid.")
	}

	#[tokio::test]
	async fn set_tokens_round_trips_through_storage() {
		let backend = Arc::new(MemoryStore::default());
		let tokens = TokenStore::new(backend.clone(), provider());

		tokens.set_tokens(&"a".into(), &"b".into()).await.expect("Token write should succeed.");

		let access = tokens.get_token(TokenKind::Access).await.expect("Access read should work.");
		let refresh =
			tokens.get_token(TokenKind::Refresh).await.expect("Refresh read should work.");

		assert_eq!(access.as_ref().map(TokenSecret::expose), Some("a"));
		assert_eq!(refresh.as_ref().map(TokenSecret::expose), Some("b"));
		assert_eq!(backend.snapshot("truelayer:access_token").as_deref(), Some("a"));
		assert_eq!(
			tokens.load_pair().await.expect("Pair read should work."),
			Some(TokenPair::new("a", "b"))
		);
	}

	#[tokio::test]
	async fn missing_tokens_read_as_none() {
		let tokens = TokenStore::new(Arc::new(MemoryStore::default()), provider());

		assert_eq!(tokens.get_token(TokenKind::Refresh).await, Ok(None));
		assert_eq!(tokens.load_pair().await, Ok(None));
	}

	#[tokio::test]
	async fn write_failure_keeps_backend_message() {
		let tokens = TokenStore::new(Arc::new(BrokenStore), provider());
		let err = tokens
			.set_tokens(&"a".into(), &"b".into())
			.await
			.expect_err("Broken backend must fail the write.");
		let payload = err.payload();

		assert_eq!(payload.error, "Cannot store new tokens in AsyncStorage");
		assert!(payload.error_message.contains("boom"));
	}

	#[tokio::test]
	async fn read_failure_names_the_key() {
		let tokens = TokenStore::new(Arc::new(BrokenStore), provider());
		let err = tokens
			.get_token(TokenKind::Access)
			.await
			.expect_err("Broken backend must fail the read.");

		assert_eq!(err, StorageError::Read {
			name: "truelayer:access_token".into(),
			message: "Backend failure: read boom.".into(),
		});
	}
}
