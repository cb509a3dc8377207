//! Integration configuration: endpoints, client credentials, and refresh policy.
//!
//! [`IntegrationConfig`] can be assembled with [`IntegrationConfigBuilder`] or deserialized
//! from JSON via [`IntegrationConfig::from_json`]; both paths run the same validation, so a
//! config value reaching [`ClientFactory`](crate::client::ClientFactory) always has usable base
//! URLs and credentials.

// self
use crate::{_prelude::*, auth::ProviderId, error::ConfigError, flows::RefreshMode};

/// Authorization server of the aggregator's sandbox environment.
pub const SANDBOX_AUTH_URL: &str = "https://auth.truelayer-sandbox.com";
/// Data API of the aggregator's sandbox environment.
pub const SANDBOX_DATA_URL: &str = "https://api.truelayer-sandbox.com";
/// Token endpoint path relative to the authorization server.
pub const DEFAULT_TOKEN_PATH: &str = "/connect/token";

/// Validated settings for one open-banking integration.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationConfig {
	/// Integration identifier used for storage keys and notices.
	pub provider: ProviderId,
	/// Base URL of the authorization server.
	pub auth_base_url: Url,
	/// Base URL of the protected resource API.
	pub data_base_url: Url,
	/// OAuth client identifier.
	pub client_id: String,
	/// OAuth client secret; redacted from `Debug` output.
	pub client_secret: String,
	/// Token endpoint path relative to `auth_base_url`.
	#[serde(default = "default_token_path")]
	pub token_path: String,
	/// Whether a missing refresh token fails fast or is sent as an empty string.
	#[serde(default)]
	pub refresh_mode: RefreshMode,
	/// Serializes concurrent 401 recoveries so one refresh serves every sibling request.
	#[serde(default = "default_coalesce")]
	pub coalesce_refreshes: bool,
}
impl IntegrationConfig {
	/// Creates a new builder for the provided integration.
	pub fn builder(provider: ProviderId) -> IntegrationConfigBuilder {
		IntegrationConfigBuilder::new(provider)
	}

	/// Sandbox preset for the aggregator.
	pub fn sandbox(
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
	) -> Result<Self, ConfigError> {
		let parse = |endpoint: &'static str, raw: &str| {
			Url::parse(raw).map_err(|_| ConfigError::InvalidBaseUrl { endpoint, url: raw.into() })
		};

		Self::builder(ProviderId::new("truelayer")?)
			.auth_base_url(parse("auth", SANDBOX_AUTH_URL)?)
			.data_base_url(parse("data", SANDBOX_DATA_URL)?)
			.client_id(client_id)
			.client_secret(client_secret)
			.build()
	}

	/// Parses and validates a JSON config document.
	pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
		let de = &mut serde_json::Deserializer::from_str(raw);
		let config: Self = serde_path_to_error::deserialize(de).map_err(ConfigError::Parse)?;

		config.validated()
	}

	/// Absolute URL of the token endpoint.
	pub fn token_url(&self) -> Result<Url, ConfigError> {
		join(&self.auth_base_url, &self.token_path)
	}

	/// Absolute URL of a protected resource path.
	pub fn data_url(&self, path: &str) -> Result<Url, ConfigError> {
		join(&self.data_base_url, path)
	}

	fn validated(mut self) -> Result<Self, ConfigError> {
		self.auth_base_url = normalize_base("auth", self.auth_base_url)?;
		self.data_base_url = normalize_base("data", self.data_base_url)?;

		if self.client_id.trim().is_empty() {
			return Err(ConfigError::MissingField { field: "client_id" });
		}
		if self.client_secret.is_empty() {
			return Err(ConfigError::MissingField { field: "client_secret" });
		}
		if self.token_path.trim().is_empty() {
			return Err(ConfigError::MissingField { field: "token_path" });
		}

		Ok(self)
	}
}
impl Debug for IntegrationConfig {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("IntegrationConfig")
			.field("provider", &self.provider)
			.field("auth_base_url", &self.auth_base_url.as_str())
			.field("data_base_url", &self.data_base_url.as_str())
			.field("client_id", &self.client_id)
			.field("client_secret", &"<redacted>")
			.field("token_path", &self.token_path)
			.field("refresh_mode", &self.refresh_mode)
			.field("coalesce_refreshes", &self.coalesce_refreshes)
			.finish()
	}
}

/// Builder for [`IntegrationConfig`] values.
#[derive(Debug)]
pub struct IntegrationConfigBuilder {
	provider: ProviderId,
	auth_base_url: Option<Url>,
	data_base_url: Option<Url>,
	client_id: Option<String>,
	client_secret: Option<String>,
	token_path: String,
	refresh_mode: RefreshMode,
	coalesce_refreshes: bool,
}
impl IntegrationConfigBuilder {
	/// Creates a builder with default token path, fail-fast refresh, and refresh coalescing.
	pub fn new(provider: ProviderId) -> Self {
		Self {
			provider,
			auth_base_url: None,
			data_base_url: None,
			client_id: None,
			client_secret: None,
			token_path: default_token_path(),
			refresh_mode: RefreshMode::default(),
			coalesce_refreshes: default_coalesce(),
		}
	}

	/// Sets the authorization server base URL.
	pub fn auth_base_url(mut self, url: Url) -> Self {
		self.auth_base_url = Some(url);

		self
	}

	/// Sets the protected resource API base URL.
	pub fn data_base_url(mut self, url: Url) -> Self {
		self.data_base_url = Some(url);

		self
	}

	/// Sets the OAuth client identifier.
	pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
		self.client_id = Some(client_id.into());

		self
	}

	/// Sets the OAuth client secret.
	pub fn client_secret(mut self, client_secret: impl Into<String>) -> Self {
		self.client_secret = Some(client_secret.into());

		self
	}

	/// Overrides the token endpoint path.
	pub fn token_path(mut self, path: impl Into<String>) -> Self {
		self.token_path = path.into();

		self
	}

	/// Chooses how missing refresh tokens are handled.
	pub fn refresh_mode(mut self, mode: RefreshMode) -> Self {
		self.refresh_mode = mode;

		self
	}

	/// Enables or disables coalescing of concurrent 401 recoveries.
	pub fn coalesce_refreshes(mut self, enabled: bool) -> Self {
		self.coalesce_refreshes = enabled;

		self
	}

	/// Validates the inputs and returns the config.
	pub fn build(self) -> Result<IntegrationConfig, ConfigError> {
		let config = IntegrationConfig {
			provider: self.provider,
			auth_base_url: self
				.auth_base_url
				.ok_or(ConfigError::MissingField { field: "auth_base_url" })?,
			data_base_url: self
				.data_base_url
				.ok_or(ConfigError::MissingField { field: "data_base_url" })?,
			client_id: self.client_id.ok_or(ConfigError::MissingField { field: "client_id" })?,
			client_secret: self
				.client_secret
				.ok_or(ConfigError::MissingField { field: "client_secret" })?,
			token_path: self.token_path,
			refresh_mode: self.refresh_mode,
			coalesce_refreshes: self.coalesce_refreshes,
		};

		config.validated()
	}
}

fn default_token_path() -> String {
	DEFAULT_TOKEN_PATH.into()
}

fn default_coalesce() -> bool {
	true
}

// Base URLs get a trailing slash so relative joins append instead of replacing the last segment.
fn normalize_base(endpoint: &'static str, mut url: Url) -> Result<Url, ConfigError> {
	if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() || url.host().is_none()
	{
		return Err(ConfigError::InvalidBaseUrl { endpoint, url: url.to_string() });
	}
	if !url.path().ends_with('/') {
		let path = format!("{}/", url.path());

		url.set_path(&path);
	}

	url.set_query(None);
	url.set_fragment(None);

	Ok(url)
}

// Joined URLs must stay under `base`.
pub(crate) fn join(base: &Url, path: &str) -> Result<Url, ConfigError> {
	let url = base.join(path.trim_start_matches('/')).map_err(|source| {
		ConfigError::InvalidPath { base: base.to_string(), path: path.into(), source }
	})?;

	if url.origin() != base.origin() || !url.path().starts_with(base.path()) {
		return Err(ConfigError::PathOutsideBase { base: base.to_string(), url: url.into() });
	}

	Ok(url)
}
