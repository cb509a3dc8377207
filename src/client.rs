//! Client wiring: one authorization-server client and one protected-resource client per
//! integration, built explicitly from a config, a storage backend, and a transport.

pub mod auth;
pub mod resource;

pub use auth::AuthClient;
pub use resource::ResourceClient;

// self
use crate::{
	_prelude::*,
	config::IntegrationConfig,
	error::ConfigError,
	flows::{TokenRefresher, UnauthenticatedHandler},
	http::HttpTransport,
	intercept::{AugmentationSlot, StoredBearerAugmentation},
	obs::{EventSink, Reporter},
	store::{AsyncStorage, TokenStore},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;

/// Clients sharing one token store and one event sink.
#[derive(Clone, Debug)]
pub struct Clients {
	/// Client for the token endpoint.
	pub auth_client: Arc<AuthClient>,
	/// Token-bearing client for the data API.
	pub resource_client: Arc<ResourceClient>,
	/// Token persistence for the integration.
	pub token_store: TokenStore,
}

/// Builds [`Clients`] for one integration.
///
/// ```no_run
/// use std::sync::Arc;
///
/// use openbanking_client::{
/// 	client::ClientFactory,
/// 	config::IntegrationConfig,
/// 	obs::{Notice, NoticeForwarder},
/// 	store::MemoryStore,
/// };
///
/// let config = IntegrationConfig::sandbox("client-id", "client-secret")?;
/// let clients = ClientFactory::new(config, Arc::new(MemoryStore::default()))
/// 	.with_sink(Arc::new(NoticeForwarder(|notice: Notice| eprintln!("{notice:?}"))))
/// 	.build()?;
/// # let _ = clients;
/// # Ok::<(), openbanking_client::error::ConfigError>(())
/// ```
pub struct ClientFactory {
	config: IntegrationConfig,
	storage: Arc<dyn AsyncStorage>,
	transport: Arc<dyn HttpTransport>,
	sink: Option<Arc<dyn EventSink>>,
}
impl ClientFactory {
	/// Creates a factory that sends requests through the provided transport.
	pub fn with_http_transport(
		config: IntegrationConfig,
		storage: Arc<dyn AsyncStorage>,
		transport: Arc<dyn HttpTransport>,
	) -> Self {
		Self { config, storage, transport, sink: None }
	}

	/// Replaces the transport.
	pub fn with_transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
		self.transport = transport;

		self
	}

	/// Forwards every pipeline event to `sink`.
	pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
		self.sink = Some(sink);

		self
	}

	/// Config the clients are built from.
	pub fn config(&self) -> &IntegrationConfig {
		&self.config
	}

	/// Wires the clients. The resource client starts with a store-backed augmentation.
	pub fn build(self) -> Result<Clients, ConfigError> {
		let Self { config, storage, transport, sink } = self;
		let reporter = Reporter::new(sink);
		let token_store = TokenStore::new(storage, config.provider.clone());
		let auth_client = Arc::new(AuthClient::new(transport.clone(), config.token_url()?));
		let slot = Arc::new(AugmentationSlot::new(Arc::new(StoredBearerAugmentation(
			token_store.clone(),
		))));
		let refresher =
			TokenRefresher::new(auth_client.clone(), token_store.clone(), &config, reporter.clone());
		let handler = Arc::new(UnauthenticatedHandler::new(
			refresher,
			slot.clone(),
			reporter.clone(),
			config.coalesce_refreshes,
		));
		let resource_client = Arc::new(ResourceClient::new(
			transport,
			config.data_base_url.clone(),
			slot,
			handler,
			reporter,
		));

		Ok(Clients { auth_client, resource_client, token_store })
	}
}
#[cfg(feature = "reqwest")]
impl ClientFactory {
	/// Creates a factory backed by a default [`ReqwestTransport`].
	pub fn new(config: IntegrationConfig, storage: Arc<dyn AsyncStorage>) -> Self {
		Self::with_http_transport(config, storage, Arc::new(ReqwestTransport::default()))
	}
}
impl Debug for ClientFactory {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientFactory")
			.field("config", &self.config)
			.field("sink_set", &self.sink.is_some())
			.finish()
	}
}
