//! Transport primitives shared by the authorization-server and protected-resource clients.
//!
//! The module exposes [`HttpTransport`], the pipeline's only dependency on an HTTP stack.
//! Requests and responses use the `http` crate types re-exported by `oauth2`
//! ([`HttpRequest`]/[`HttpResponse`]), so interceptors can inspect and rewrite headers without
//! knowing which client sends them.

// std
#[cfg(feature = "reqwest")] use std::ops::Deref;
// crates.io
pub use oauth2::{
	HttpRequest, HttpResponse,
	http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, header},
};
// self
use crate::{
	_prelude::*,
	error::{ConfigError, TransportError},
};

/// Boxed future returned by [`HttpTransport::execute`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP transports executing fully built requests.
///
/// Implementations must resolve with an [`HttpResponse`] for every response the server sends,
/// including non-2xx statuses; only failures where no response was received map to
/// [`TransportError`]. They must not follow redirects to other hosts with the bearer header
/// attached and must not retry on their own.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Sends `request` and buffers the full response body.
	fn execute(&self, request: HttpRequest) -> TransportFuture<'_>;
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestTransport {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestTransport {
	fn execute(&self, request: HttpRequest) -> TransportFuture<'_> {
		let client = self.0.clone();

		Box::pin(async move {
			let request = reqwest::Request::try_from(request).map_err(TransportError::from)?;
			let response = client.execute(request).await?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let mut response_new = HttpResponse::new(response.bytes().await?.to_vec());

			*response_new.status_mut() = status;
			*response_new.headers_mut() = headers;

			Ok(response_new)
		})
	}
}

/// Builds a request for `url` carrying `headers` and `body`.
pub fn build_request(
	method: Method,
	url: &Url,
	headers: &HeaderMap,
	body: Vec<u8>,
) -> Result<HttpRequest, ConfigError> {
	let mut request =
		oauth2::http::request::Builder::new().method(method).uri(url.as_str()).body(body)?;

	request.headers_mut().extend(headers.clone());

	Ok(request)
}

/// Copies every header except `Authorization`.
pub fn without_authorization(headers: &HeaderMap) -> HeaderMap {
	let mut preserved = headers.clone();

	preserved.remove(header::AUTHORIZATION);

	preserved
}

/// Default headers shared by both clients.
pub fn json_headers() -> HeaderMap {
	let mut headers = HeaderMap::new();

	headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));

	headers
}
