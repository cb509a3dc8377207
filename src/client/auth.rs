//! Client for the authorization server's token endpoint.

// self
use crate::{
	_prelude::*,
	api::ApiError,
	error::{AuthFailure, ConfigError},
	http::{HeaderMap, HttpTransport, Method, build_request, json_headers},
};

/// Posts JSON to the token endpoint and decodes the bare JSON reply.
///
/// No bearer augmentation is applied here. Failures are mapped onto [`AuthFailure`] so the
/// refresher can hand them to the UI layer unchanged.
pub struct AuthClient {
	transport: Arc<dyn HttpTransport>,
	token_url: Url,
	headers: HeaderMap,
}
impl AuthClient {
	/// Creates a client posting to `token_url`.
	pub fn new(transport: Arc<dyn HttpTransport>, token_url: Url) -> Self {
		Self { transport, token_url, headers: json_headers() }
	}

	/// Absolute token endpoint URL.
	pub fn token_url(&self) -> &Url {
		&self.token_url
	}

	/// Headers sent with every request.
	pub fn default_headers(&self) -> &HeaderMap {
		&self.headers
	}

	/// Sends `body` as JSON and decodes the 2xx reply as `T`.
	pub async fn post_json<B, T>(&self, body: &B) -> Result<T>
	where
		B: ?Sized + Serialize,
		T: DeserializeOwned,
	{
		let payload = serde_json::to_vec(body).map_err(ConfigError::from)?;
		let request = build_request(Method::POST, &self.token_url, &self.headers, payload)?;
		let response = self
			.transport
			.execute(request)
			.await
			.map_err(|e| AuthFailure::Transport { message: e.message() })?;
		let status = response.status().as_u16();

		if !response.status().is_success() {
			return Err(AuthFailure::Api { status, body: ApiError::from_slice(response.body()) }
				.into());
		}

		let de = &mut serde_json::Deserializer::from_slice(response.body());

		serde_path_to_error::deserialize(de).map_err(|e| {
			AuthFailure::MalformedResponse { status, message: e.to_string() }.into()
		})
	}
}
impl Debug for AuthClient {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthClient").field("token_url", &self.token_url.as_str()).finish()
	}
}

#[cfg(all(test, feature = "reqwest"))]
mod tests {
	// crates.io
	use httpmock::prelude::*;
	// self
	use super::*;
	use crate::_preludet::test_reqwest_transport;

	#[derive(Debug, Deserialize)]
	struct Echo {
		ok: bool,
	}

	fn client(server: &MockServer) -> AuthClient {
		let url = Url::parse(&server.url("/connect/token")).expect("Mock URL should parse.");

		AuthClient::new(Arc::new(test_reqwest_transport()), url)
	}

	#[tokio::test]
	async fn posts_json_and_decodes_bare_body() {
		let server = MockServer::start_async().await;
		let mock = server
			.mock_async(|when, then| {
				when.method(POST)
					.path("/connect/token")
					.header("content-type", "application/json")
					.json_body(serde_json::json!({"hello": "world"}));
				then.status(200).json_body(serde_json::json!({"ok": true}));
			})
			.await;
		let echo: Echo = client(&server)
			.post_json(&serde_json::json!({"hello": "world"}))
			.await
			.expect("Token endpoint call should succeed.");

		mock.assert_async().await;

		assert!(echo.ok);
	}

	#[tokio::test]
	async fn error_statuses_keep_the_server_body() {
		let server = MockServer::start_async().await;

		server
			.mock_async(|when, then| {
				when.method(POST).path("/connect/token");
				then.status(400).json_body(serde_json::json!({
					"error": "invalid_grant",
					"error_description": "Refresh token expired."
				}));
			})
			.await;

		let err = client(&server)
			.post_json::<_, Echo>(&serde_json::json!({}))
			.await
			.expect_err("400 must fail.");
		let Error::AuthGrant(AuthFailure::Api { status, body }) = err else {
			panic!("Expected an API failure.");
		};

		assert_eq!(status, 400);
		assert_eq!(body.description(), Some("Refresh token expired."));
	}

	#[tokio::test]
	async fn malformed_success_bodies_name_the_failing_field() {
		let server = MockServer::start_async().await;

		server
			.mock_async(|when, then| {
				when.method(POST).path("/connect/token");
				then.status(200).json_body(serde_json::json!({"ok": "yes"}));
			})
			.await;

		let err = client(&server)
			.post_json::<_, Echo>(&serde_json::json!({}))
			.await
			.expect_err("Wrong field types must fail.");
		let Error::AuthGrant(AuthFailure::MalformedResponse { status, message }) = err else {
			panic!("Expected a malformed-response failure.");
		};

		assert_eq!(status, 200);
		assert!(message.contains("ok"));
	}
}
