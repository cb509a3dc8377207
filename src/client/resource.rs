//! Client for the protected resource (data) API.

// self
use crate::{
	_prelude::*,
	auth::ProviderId,
	config,
	error::ConfigError,
	flows::{UnauthenticatedContext, UnauthenticatedHandler},
	http::{
		HeaderMap, HeaderValue, HttpRequest, HttpResponse, HttpTransport, Method, build_request,
		header, json_headers,
	},
	intercept::{AugmentationSlot, ResponseOutcome, classify, unwrap_envelope},
	obs::{PipelineEvent, Reporter},
};

/// Token-bearing client for the aggregator's data API.
///
/// Every dispatch reads the live augmentation from the slot, sends the request, and classifies
/// the response. A 401 runs the unauthenticated handler to completion and is still returned as
/// [`Error::ProtectedResource`]; callers decide whether to issue the request again.
pub struct ResourceClient {
	transport: Arc<dyn HttpTransport>,
	base_url: Url,
	headers: HeaderMap,
	slot: Arc<AugmentationSlot>,
	handler: Arc<UnauthenticatedHandler>,
	reporter: Reporter,
}
impl ResourceClient {
	/// Creates a client rooted at `base_url`.
	pub fn new(
		transport: Arc<dyn HttpTransport>,
		base_url: Url,
		slot: Arc<AugmentationSlot>,
		handler: Arc<UnauthenticatedHandler>,
		reporter: Reporter,
	) -> Self {
		let mut headers = json_headers();

		headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("max-age=0"));

		Self { transport, base_url, headers, slot, handler, reporter }
	}

	/// Integration the client talks to.
	pub fn provider(&self) -> &ProviderId {
		self.handler.refresher().provider()
	}

	/// Base URL every path is joined onto.
	pub fn base_url(&self) -> &Url {
		&self.base_url
	}

	/// Headers sent with every request.
	pub fn default_headers(&self) -> &HeaderMap {
		&self.headers
	}

	/// Slot holding the live augmentation.
	pub fn slot(&self) -> &Arc<AugmentationSlot> {
		&self.slot
	}

	/// Handler run on 401 responses.
	pub fn unauthenticated_handler(&self) -> &Arc<UnauthenticatedHandler> {
		&self.handler
	}

	/// `GET`s `path` and unwraps the results envelope.
	pub async fn get<T>(&self, path: &str) -> Result<Vec<T>>
	where
		T: DeserializeOwned,
	{
		let request = self.request(Method::GET, path, Vec::new())?;

		self.send_for_results(request).await
	}

	/// `POST`s `body` as JSON to `path` and unwraps the results envelope.
	pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<Vec<T>>
	where
		B: ?Sized + Serialize,
		T: DeserializeOwned,
	{
		let payload = serde_json::to_vec(body).map_err(ConfigError::from)?;
		let request = self.request(Method::POST, path, payload)?;

		self.send_for_results(request).await
	}

	/// Builds a request for `path` carrying the default headers.
	pub fn request(&self, method: Method, path: &str, body: Vec<u8>) -> Result<HttpRequest> {
		let url = config::join(&self.base_url, path)?;

		Ok(build_request(method, &url, &self.headers, body)?)
	}

	/// Augments and sends `request`, returning the 2xx response.
	///
	/// The default headers are applied underneath the request's own headers, so requests built
	/// outside [`ResourceClient::request`] still carry them.
	pub async fn send(&self, mut request: HttpRequest) -> Result<HttpResponse> {
		let mut headers = self.headers.clone();

		headers.extend(std::mem::take(request.headers_mut()));

		*request.headers_mut() = headers;

		let (generation, augmentation) = self.slot.current();
		let request = augmentation.augment(request).await?;
		let request_headers = request.headers().clone();
		let response = match self.transport.execute(request).await {
			Ok(response) => response,
			Err(e) => {
				self.reporter.emit(PipelineEvent::NetworkFailure {
					provider: self.provider().clone(),
					message: e.message(),
				});

				return Err(e.into());
			},
		};

		match classify(response) {
			ResponseOutcome::Success(response) => Ok(response),
			ResponseOutcome::Unauthorized(body) => {
				let context =
					UnauthenticatedContext { body: body.clone(), request_headers, generation };
				let refresh_failure = self.handler.handle(context).await.err().map(Box::new);

				Err(Error::ProtectedResource { status: 401, body, refresh_failure })
			},
			ResponseOutcome::Rejected { status, body } => {
				self.reporter.emit(PipelineEvent::ResourceRejected {
					provider: self.provider().clone(),
					status,
					body: body.clone(),
				});

				Err(Error::ProtectedResource { status, body, refresh_failure: None })
			},
		}
	}

	async fn send_for_results<T>(&self, request: HttpRequest) -> Result<Vec<T>>
	where
		T: DeserializeOwned,
	{
		let response = self.send(request).await?;

		Ok(unwrap_envelope(response.status().as_u16(), response.body())?)
	}
}
impl Debug for ResourceClient {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ResourceClient")
			.field("provider", self.provider())
			.field("base_url", &self.base_url.as_str())
			.field("slot", &self.slot)
			.finish()
	}
}
