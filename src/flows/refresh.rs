//! Refresh-token grant against the aggregator's token endpoint.
//!
//! [`TokenRefresher::refresh`] reads the stored refresh token, performs exactly one
//! `grant_type=refresh_token` POST with a JSON body, persists the returned pair through
//! [`TokenStore::set_tokens`], and reports failures to the event sink. It never retries; the
//! unauthenticated handler decides when it runs.

mod metrics;

pub use metrics::RefreshMetrics;

// crates.io
use oauth2::{TokenResponse, basic::BasicTokenResponse};
// self
use crate::{
	_prelude::*,
	auth::{GrantedTokens, ProviderId, TokenKind, TokenPair, TokenSecret},
	client::AuthClient,
	config::IntegrationConfig,
	error::AuthFailure,
	obs::{self, FlowKind, FlowOutcome, FlowSpan, PipelineEvent, Reporter},
	store::TokenStore,
};

/// How a missing refresh token is handled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshMode {
	/// Fail with [`AuthFailure::MissingRefreshToken`] before any network call.
	#[default]
	RequireStored,
	/// Send the empty string and let the authorization server reject it.
	Lenient,
}

#[derive(Serialize)]
struct RefreshGrantBody<'a> {
	grant_type: &'static str,
	client_id: &'a str,
	client_secret: &'a str,
	refresh_token: &'a str,
}

/// Runs the refresh-token grant for one integration.
pub struct TokenRefresher {
	auth_client: Arc<AuthClient>,
	tokens: TokenStore,
	client_id: String,
	client_secret: String,
	mode: RefreshMode,
	reporter: Reporter,
	metrics: RefreshMetrics,
}
impl TokenRefresher {
	/// Creates a refresher using the credentials and refresh mode from `config`.
	pub fn new(
		auth_client: Arc<AuthClient>,
		tokens: TokenStore,
		config: &IntegrationConfig,
		reporter: Reporter,
	) -> Self {
		Self {
			auth_client,
			tokens,
			client_id: config.client_id.clone(),
			client_secret: config.client_secret.clone(),
			mode: config.refresh_mode,
			reporter,
			metrics: Default::default(),
		}
	}

	/// Integration whose tokens are refreshed.
	pub fn provider(&self) -> &ProviderId {
		self.tokens.provider()
	}

	/// Active refresh mode.
	pub fn mode(&self) -> RefreshMode {
		self.mode
	}

	/// Attempt/success/failure counters.
	pub fn metrics(&self) -> &RefreshMetrics {
		&self.metrics
	}

	/// Exchanges the stored refresh token for a new pair and persists it.
	///
	/// Grant failures come back as [`Error::AuthGrant`], persistence failures as
	/// [`Error::Storage`]; both are reported as [`PipelineEvent::RefreshFailed`] first.
	pub async fn refresh(&self) -> Result<GrantedTokens> {
		const KIND: FlowKind = FlowKind::Refresh;

		let span = FlowSpan::new(KIND, "refresh", self.provider().as_ref());

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);
		self.metrics.record_attempt();

		let result = span.instrument(self.exchange()).await;

		match &result {
			Ok(_) => {
				self.metrics.record_success();
				obs::record_flow_outcome(KIND, FlowOutcome::Success);
			},
			Err(e) => {
				self.metrics.record_failure();
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);
				self.reporter.emit(PipelineEvent::RefreshFailed {
					provider: self.provider().clone(),
					payload: e.payload(),
				});
			},
		}

		result
	}

	async fn exchange(&self) -> Result<GrantedTokens> {
		let refresh_token = match (self.tokens.get_token(TokenKind::Refresh).await?, self.mode) {
			(Some(token), _) if !token.is_empty() => token,
			(_, RefreshMode::RequireStored) => return Err(AuthFailure::MissingRefreshToken.into()),
			(_, RefreshMode::Lenient) => TokenSecret::default(),
		};
		let body = RefreshGrantBody {
			grant_type: "refresh_token",
			client_id: &self.client_id,
			client_secret: &self.client_secret,
			refresh_token: refresh_token.expose(),
		};
		let response: BasicTokenResponse = self.auth_client.post_json(&body).await?;
		let pair = TokenPair::new(
			response.access_token().secret().as_str(),
			response.refresh_token().map(|token| token.secret().as_str()).unwrap_or_default(),
		);
		let expires_at = response
			.expires_in()
			.and_then(|ttl| Duration::try_from(ttl).ok())
			.and_then(|ttl| OffsetDateTime::now_utc().checked_add(ttl));
		let scopes = response
			.scopes()
			.map(|scopes| scopes.iter().map(|scope| scope.as_str().to_owned()).collect())
			.unwrap_or_default();

		self.tokens.store_pair(&pair).await?;

		Ok(GrantedTokens { pair, expires_at, scopes })
	}
}
impl Debug for TokenRefresher {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenRefresher")
			.field("provider", self.provider())
			.field("token_url", &self.auth_client.token_url().as_str())
			.field("client_id", &self.client_id)
			.field("mode", &self.mode)
			.finish()
	}
}

#[cfg(all(test, feature = "reqwest"))]
mod tests {
	// crates.io
	use httpmock::prelude::*;
	// self
	use super::*;
	use crate::{
		_preludet::{RecordingSink, test_config, test_reqwest_transport},
		error::{ErrorPayload, StorageError},
		store::{AsyncStorage, MemoryStore, StoreError, StoreFuture},
	};

	struct ReadOnlyStore(MemoryStore);
	impl AsyncStorage for ReadOnlyStore {
		fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
			self.0.get(key)
		}

		fn set<'a>(&'a self, _key: &'a str, _value: String) -> StoreFuture<'a, ()> {
			Box::pin(async { Err(StoreError::Backend { message: "boom".into() }) })
		}

		fn multi_get<'a>(
			&'a self,
			keys: &'a [String],
		) -> StoreFuture<'a, Vec<(String, Option<String>)>> {
			self.0.multi_get(keys)
		}

		fn multi_set(&self, _entries: Vec<(String, String)>) -> StoreFuture<'_, ()> {
			Box::pin(async { Err(StoreError::Backend { message: "boom".into() }) })
		}
	}

	fn refresher(
		config: &IntegrationConfig,
		storage: Arc<dyn AsyncStorage>,
	) -> (TokenRefresher, TokenStore, Arc<RecordingSink>) {
		let sink = Arc::new(RecordingSink::default());
		let tokens = TokenStore::new(storage, config.provider.clone());
		let auth_client = Arc::new(AuthClient::new(
			Arc::new(test_reqwest_transport()),
			config.token_url().expect("Token URL should join."),
		));
		let refresher =
			TokenRefresher::new(auth_client, tokens.clone(), config, Reporter::new(Some(sink.clone())));

		(refresher, tokens, sink)
	}

	#[tokio::test]
	async fn successful_grant_persists_the_new_pair() {
		let server = MockServer::start_async().await;
		let config = test_config(&server.base_url());
		let (refresher, tokens, sink) = refresher(&config, Arc::new(MemoryStore::default()));

		tokens.set_tokens(&"old-access".into(), &"old-refresh".into()).await.expect("Seed tokens.");

		let mock = server
			.mock_async(|when, then| {
				when.method(POST).path("/connect/token").json_body(serde_json::json!({
					"grant_type": "refresh_token",
					"client_id": config.client_id,
					"client_secret": config.client_secret,
					"refresh_token": "old-refresh"
				}));
				then.status(200).json_body(serde_json::json!({
					"access_token": "new-access",
					"refresh_token": "new-refresh",
					"token_type": "Bearer",
					"expires_in": 3600,
					"scope": "info accounts"
				}));
			})
			.await;
		let granted = refresher.refresh().await.expect("Refresh should succeed.");

		mock.assert_async().await;

		assert_eq!(granted.access_token().expose(), "new-access");
		assert!(granted.expires_at.is_some());
		assert_eq!(granted.scopes, vec!["info".to_owned(), "accounts".to_owned()]);
		assert_eq!(
			tokens.load_pair().await.expect("Pair read should work."),
			Some(TokenPair::new("new-access", "new-refresh"))
		);
		assert_eq!(refresher.metrics().successes(), 1);
		assert!(sink.events().is_empty());
	}

	#[tokio::test]
	async fn missing_refresh_token_fails_without_network_calls() {
		let server = MockServer::start_async().await;
		let config = test_config(&server.base_url());
		let (refresher, _, sink) = refresher(&config, Arc::new(MemoryStore::default()));
		let mock = server
			.mock_async(|when, then| {
				when.method(POST).path("/connect/token");
				then.status(200);
			})
			.await;
		let err = refresher.refresh().await.expect_err("Missing refresh token must fail.");

		mock.assert_calls_async(0).await;
		assert_eq!(
			err.payload(),
			ErrorPayload::new(
				"No refresh token found",
				"Could not get a valid refresh token from storage"
			)
		);
		assert_eq!(sink.count(|event| matches!(event, PipelineEvent::RefreshFailed { .. })), 1);
		assert_eq!(refresher.metrics().failures(), 1);
	}

	#[tokio::test]
	async fn lenient_mode_sends_an_empty_refresh_token() {
		let server = MockServer::start_async().await;
		let mut config = test_config(&server.base_url());

		config.refresh_mode = RefreshMode::Lenient;

		let (refresher, tokens, _) = refresher(&config, Arc::new(MemoryStore::default()));
		let mock = server
			.mock_async(|when, then| {
				when.method(POST).path("/connect/token").json_body(serde_json::json!({
					"grant_type": "refresh_token",
					"client_id": config.client_id,
					"client_secret": config.client_secret,
					"refresh_token": ""
				}));
				then.status(200).json_body(serde_json::json!({
					"access_token": "a",
					"token_type": "bearer"
				}));
			})
			.await;
		let granted = refresher.refresh().await.expect("Lenient refresh should succeed.");

		mock.assert_async().await;

		assert_eq!(granted.pair, TokenPair::new("a", ""));
		assert_eq!(granted.expires_at, None);
		assert_eq!(
			tokens.get_token(TokenKind::Refresh).await.expect("Refresh read should work."),
			Some(TokenSecret::new(""))
		);
	}

	#[tokio::test]
	async fn persistence_failures_surface_as_storage_errors() {
		let server = MockServer::start_async().await;
		let config = test_config(&server.base_url());
		let backend = MemoryStore::default();

		backend.set("mock-aggregator:refresh_token", "r".into()).await.expect("Seed token.");

		let (refresher, _, sink) = refresher(&config, Arc::new(ReadOnlyStore(backend)));

		server
			.mock_async(|when, then| {
				when.method(POST).path("/connect/token");
				then.status(200).json_body(serde_json::json!({
					"access_token": "a",
					"refresh_token": "b",
					"token_type": "Bearer"
				}));
			})
			.await;

		let err = refresher.refresh().await.expect_err("Write failure must propagate.");

		assert!(matches!(&err, Error::Storage(StorageError::Write { .. })));

		let payload = err.payload();

		assert_eq!(payload.error, "Cannot store new tokens in AsyncStorage");
		assert!(payload.error_message.contains("boom"));
		assert_eq!(sink.count(|event| matches!(event, PipelineEvent::RefreshFailed { .. })), 1);
	}
}
