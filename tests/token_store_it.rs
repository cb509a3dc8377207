#![cfg(feature = "reqwest")]

// std
use std::{
	env, fs,
	path::PathBuf,
	time::{SystemTime, UNIX_EPOCH},
};
// self
use openbanking_client::{
	_preludet::*,
	auth::{ProviderId, TokenKind, TokenPair, TokenSecret},
	store::{AsyncStorage, FileStore, MemoryStore, StoreError, StoreFuture, TokenStore},
};

struct FailingWrites;
impl AsyncStorage for FailingWrites {
	fn get<'a>(&'a self, _key: &'a str) -> StoreFuture<'a, Option<String>> {
		Box::pin(async { Ok(None) })
	}

	fn set<'a>(&'a self, _key: &'a str, _value: String) -> StoreFuture<'a, ()> {
		Box::pin(async { Err(StoreError::Backend { message: "boom".into() }) })
	}

	fn multi_get<'a>(&'a self, keys: &'a [String]) -> StoreFuture<'a, Vec<(String, Option<String>)>> {
		Box::pin(async move { Ok(keys.iter().map(|key| (key.clone(), None)).collect()) })
	}

	fn multi_set(&self, _entries: Vec<(String, String)>) -> StoreFuture<'_, ()> {
		Box::pin(async { Err(StoreError::Backend { message: "boom".into() }) })
	}
}

fn provider() -> ProviderId {
	ProviderId::new("truelayer").expect("Provider fixture should be valid.")
}

fn temp_path(label: &str) -> PathBuf {
	let nanos = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("Clock should be after the Unix epoch.")
		.as_nanos();

	env::temp_dir().join(format!("openbanking-client-{label}-{}-{nanos}.json", std::process::id()))
}

#[tokio::test]
async fn set_tokens_then_read_both_keys() {
	let tokens = TokenStore::new(Arc::new(MemoryStore::default()), provider());

	tokens
		.set_tokens(&TokenSecret::new("a"), &TokenSecret::new("b"))
		.await
		.expect("Token write should succeed.");

	let access = tokens.get_token(TokenKind::Access).await.expect("Access read should work.");
	let refresh = tokens.get_token(TokenKind::Refresh).await.expect("Refresh read should work.");

	assert_eq!(access, Some(TokenSecret::new("a")));
	assert_eq!(refresh, Some(TokenSecret::new("b")));
}

#[tokio::test]
async fn failed_write_produces_the_storage_payload() {
	let tokens = TokenStore::new(Arc::new(FailingWrites), provider());
	let err = tokens
		.set_tokens(&TokenSecret::new("a"), &TokenSecret::new("b"))
		.await
		.expect_err("Failing backend must reject the write.");
	let payload = Error::from(err).payload();

	assert_eq!(payload.error, "Cannot store new tokens in AsyncStorage");
	assert!(payload.error_message.contains("boom"));
}

#[tokio::test]
async fn file_store_survives_reopen() {
	let path = temp_path("reopen");

	{
		let store = FileStore::open(&path).expect("File store should open.");
		let tokens = TokenStore::new(Arc::new(store), provider());

		tokens
			.set_tokens(&TokenSecret::new("persisted-access"), &TokenSecret::new("persisted-refresh"))
			.await
			.expect("Token write should succeed.");
	}

	let reopened = FileStore::open(&path).expect("File store should reopen.");
	let tokens = TokenStore::new(Arc::new(reopened), provider());

	assert_eq!(
		tokens.load_pair().await.expect("Pair read should work."),
		Some(TokenPair::new("persisted-access", "persisted-refresh"))
	);

	fs::remove_file(&path).expect("Temp file should be removable.");
}

#[tokio::test]
async fn stores_are_scoped_per_provider() {
	let backend = Arc::new(MemoryStore::default());
	let truelayer = TokenStore::new(backend.clone(), provider());
	let other = TokenStore::new(
		backend.clone(),
		ProviderId::new("direct-bank").expect("Provider fixture should be valid."),
	);

	truelayer
		.set_tokens(&TokenSecret::new("a"), &TokenSecret::new("b"))
		.await
		.expect("Token write should succeed.");

	assert_eq!(other.load_pair().await.expect("Pair read should work."), None);
	assert_eq!(backend.snapshot("truelayer:refresh_token").as_deref(), Some("b"));
}
