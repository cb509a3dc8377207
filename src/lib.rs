//! Open-banking aggregator client with silent OAuth 2.0 token refresh: an authorization-server
//! client, a protected-resource client whose bearer augmentation is swapped atomically after every
//! refresh, and structured integration errors ready for the UI layer.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod flows;
pub mod http;
pub mod intercept;
pub mod obs;
pub mod store;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for tests; enabled via `cfg(test)` or the `test` crate
	//! feature.

	pub use crate::_prelude::*;

	// crates.io
	use parking_lot::Mutex;
	use serde_json::{Value, json};
	// self
	use crate::{
		auth::{ProviderId, TokenSecret},
		client::{ClientFactory, Clients},
		config::IntegrationConfig,
		http::ReqwestTransport,
		obs::{EventSink, PipelineEvent},
		store::{AsyncStorage, MemoryStore},
	};

	pub use crate::config::DEFAULT_TOKEN_PATH as TOKEN_PATH;

	/// Client identifier used by test configurations.
	pub const TEST_CLIENT_ID: &str = "client-test";
	/// Client secret used by test configurations.
	pub const TEST_CLIENT_SECRET: &str = "secret-test";

	/// Event sink that keeps every emitted [`PipelineEvent`] for later assertions.
	#[derive(Debug, Default)]
	pub struct RecordingSink(Mutex<Vec<PipelineEvent>>);
	impl RecordingSink {
		/// Returns a snapshot of the recorded events.
		pub fn events(&self) -> Vec<PipelineEvent> {
			self.0.lock().clone()
		}

		/// Counts recorded events matching the predicate.
		pub fn count(&self, predicate: impl Fn(&PipelineEvent) -> bool) -> usize {
			self.0.lock().iter().filter(|event| predicate(event)).count()
		}

		/// Number of `Unauthenticated` events seen.
		pub fn unauthenticated(&self) -> usize {
			self.count(|event| matches!(event, PipelineEvent::Unauthenticated { .. }))
		}

		/// Number of `TokensRefreshed` events seen.
		pub fn refreshed(&self) -> usize {
			self.count(|event| matches!(event, PipelineEvent::TokensRefreshed { .. }))
		}
	}
	impl EventSink for RecordingSink {
		fn emit(&self, event: &PipelineEvent) {
			self.0.lock().push(event.clone());
		}
	}

	/// Builds a reqwest transport that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_transport() -> ReqwestTransport {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestTransport::with_client(client)
	}

	/// Builds an integration config whose auth and data endpoints both point at `base_url`.
	pub fn test_config(base_url: &str) -> IntegrationConfig {
		let base = Url::parse(base_url).expect("Mock server base URL should parse.");

		IntegrationConfig::builder(
			ProviderId::new("mock-aggregator").expect("Test provider identifier should be valid."),
		)
		.auth_base_url(base.clone())
		.data_base_url(base)
		.client_id(TEST_CLIENT_ID)
		.client_secret(TEST_CLIENT_SECRET)
		.build()
		.expect("Test integration config should build.")
	}

	/// Wires [`Clients`] over an in-memory store, the test transport, and a recording sink.
	pub fn build_test_clients(
		config: IntegrationConfig,
	) -> (Clients, Arc<MemoryStore>, Arc<RecordingSink>) {
		let store_backend = Arc::new(MemoryStore::default());
		let storage: Arc<dyn AsyncStorage> = store_backend.clone();
		let sink = Arc::new(RecordingSink::default());
		let clients = ClientFactory::new(config, storage)
			.with_transport(Arc::new(test_reqwest_transport()))
			.with_sink(sink.clone())
			.build()
			.expect("Test clients should build.");

		(clients, store_backend, sink)
	}

	/// Persists an access/refresh pair through the clients' token store.
	pub async fn seed_tokens(clients: &Clients, access: &str, refresh: &str) {
		clients
			.token_store
			.set_tokens(&TokenSecret::new(access), &TokenSecret::new(refresh))
			.await
			.expect("Seeding tokens should succeed.");
	}

	/// JSON body the refresher posts for `refresh_token`.
	pub fn refresh_grant_body(refresh_token: &str) -> Value {
		json!({
			"grant_type": "refresh_token",
			"client_id": TEST_CLIENT_ID,
			"client_secret": TEST_CLIENT_SECRET,
			"refresh_token": refresh_token
		})
	}

	/// Successful token endpoint response.
	pub fn token_response(access: &str, refresh: &str) -> Value {
		json!({
			"access_token": access,
			"refresh_token": refresh,
			"token_type": "Bearer",
			"expires_in": 3600,
			"scope": "info accounts transactions"
		})
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::RwLock;
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize, de::DeserializeOwned};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use oauth2;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _, tokio as _};
