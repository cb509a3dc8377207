//! Walks through a silent re-authentication against a mock aggregator: the first call is
//! rejected with 401, the pipeline refreshes the tokens and swaps the bearer augmentation, and
//! the caller's second call succeeds with the new access token.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use serde_json::json;
use url::Url;
// self
use openbanking_client::{
	auth::{ProviderId, TokenSecret},
	client::ClientFactory,
	config::IntegrationConfig,
	http::ReqwestTransport,
	obs::{Notice, NoticeForwarder},
	reqwest,
	store::MemoryStore,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let rejected = server
		.mock_async(|when, then| {
			when.method(GET).path("/data/v1/accounts").header("authorization", "Bearer expired");
			then.status(401).json_body(json!({
				"error": "invalid_token",
				"error_description": "Access token expired."
			}));
		})
		.await;
	let grant = server
		.mock_async(|when, then| {
			when.method(POST).path("/connect/token");
			then.status(200).json_body(json!({
				"access_token": "renewed",
				"refresh_token": "rotated",
				"token_type": "Bearer",
				"expires_in": 3600,
				"scope": "info accounts"
			}));
		})
		.await;
	let accepted = server
		.mock_async(|when, then| {
			when.method(GET).path("/data/v1/accounts").header("authorization", "Bearer renewed");
			then.status(200).json_body(json!({
				"results": [{"account_id": "acc-1", "display_name": "Current Account"}],
				"status": "Succeeded"
			}));
		})
		.await;
	let base = Url::parse(&server.base_url())?;
	let config = IntegrationConfig::builder(ProviderId::new("demo-aggregator")?)
		.auth_base_url(base.clone())
		.data_base_url(base)
		.client_id("demo-client")
		.client_secret("demo-secret")
		.build()?;
	// httpmock serves a self-signed certificate.
	let transport = ReqwestTransport::with_client(
		reqwest::Client::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()?,
	);
	let storage = Arc::new(MemoryStore::default());
	let clients = ClientFactory::with_http_transport(config, storage, Arc::new(transport))
		.with_sink(Arc::new(NoticeForwarder(|notice: Notice| {
			eprintln!("{}: {} ({})", notice.id, notice.error, notice.error_message)
		})))
		.build()?;

	clients.token_store.set_tokens(&TokenSecret::new("expired"), &TokenSecret::new("seed")).await?;

	match clients.resource_client.get::<serde_json::Value>("/data/v1/accounts").await {
		Ok(_) => println!("Unexpectedly authenticated with the expired token."),
		Err(e) if e.is_unauthorized() => println!("First call rejected: {e}"),
		Err(e) => return Err(e.into()),
	}

	let accounts = clients.resource_client.get::<serde_json::Value>("/data/v1/accounts").await?;

	println!("Second call returned {} account(s): {accounts:?}.", accounts.len());

	rejected.assert_async().await;
	grant.assert_async().await;
	accepted.assert_async().await;

	Ok(())
}
