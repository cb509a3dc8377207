//! Bearer-token augmentation strategies and the slot holding the live one.

// self
use crate::{
	_prelude::*,
	auth::{TokenKind, TokenSecret},
	error::ConfigError,
	http::{HeaderMap, HeaderValue, HttpRequest, header, without_authorization},
	store::TokenStore,
};

/// Boxed future returned by [`RequestAugmentation::augment`].
pub type AugmentFuture<'a> = Pin<Box<dyn Future<Output = Result<HttpRequest>> + 'a + Send>>;

/// Rewrites a request right before it is handed to the transport.
pub trait RequestAugmentation
where
	Self: Send + Sync,
{
	/// Returns `request` with the bearer header (and any preserved headers) applied.
	fn augment(&self, request: HttpRequest) -> AugmentFuture<'_>;
}

/// Augmentation bound to one access token, installed after a successful refresh.
///
/// Headers captured from the request that triggered the refresh are replayed on every later
/// request; headers set on the request itself take precedence over them.
#[derive(Clone)]
pub struct BearerAugmentation {
	token: TokenSecret,
	preserved: HeaderMap,
}
impl BearerAugmentation {
	/// Binds the augmentation to `token` with no preserved headers.
	pub fn new(token: TokenSecret) -> Self {
		Self { token, preserved: HeaderMap::new() }
	}

	/// Binds the augmentation to `token`, keeping every non-`Authorization` header of `headers`.
	pub fn preserving(token: TokenSecret, headers: &HeaderMap) -> Self {
		Self { token, preserved: without_authorization(headers) }
	}

	/// Token attached to every request.
	pub fn token(&self) -> &TokenSecret {
		&self.token
	}

	/// Headers replayed on every request.
	pub fn preserved_headers(&self) -> &HeaderMap {
		&self.preserved
	}
}
impl RequestAugmentation for BearerAugmentation {
	fn augment(&self, request: HttpRequest) -> AugmentFuture<'_> {
		Box::pin(async move { Ok(apply(request, &self.preserved, Some(&self.token))?) })
	}
}
impl Debug for BearerAugmentation {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("BearerAugmentation")
			.field("token", &self.token)
			.field("preserved", &self.preserved.keys().collect::<Vec<_>>())
			.finish()
	}
}

/// Augmentation that reads the access token from the token store on every request.
///
/// Installed at construction so the first requests after sign-in pick up whatever the
/// authorization-code exchange persisted. When no token is stored the request is sent without
/// an `Authorization` header.
#[derive(Clone, Debug)]
pub struct StoredBearerAugmentation(pub TokenStore);
impl RequestAugmentation for StoredBearerAugmentation {
	fn augment(&self, request: HttpRequest) -> AugmentFuture<'_> {
		Box::pin(async move {
			let token = self.0.get_token(TokenKind::Access).await?;

			Ok(apply(request, &HeaderMap::new(), token.as_ref())?)
		})
	}
}

/// Holds the live augmentation and counts replacements.
///
/// Readers take a cheap clone of the current `Arc`; [`AugmentationSlot::replace`] swaps it under
/// a single write lock and bumps the generation.
pub struct AugmentationSlot {
	live: RwLock<LiveAugmentation>,
}
impl AugmentationSlot {
	/// Creates a slot holding `initial` at generation zero.
	pub fn new(initial: Arc<dyn RequestAugmentation>) -> Self {
		Self { live: RwLock::new(LiveAugmentation { generation: 0, augmentation: initial }) }
	}

	/// Returns the generation and augmentation to use for one dispatch.
	pub fn current(&self) -> (u64, Arc<dyn RequestAugmentation>) {
		let live = self.live.read();

		(live.generation, live.augmentation.clone())
	}

	/// Number of replacements performed so far.
	pub fn generation(&self) -> u64 {
		self.live.read().generation
	}

	/// Installs `next` for every request dispatched from now on and returns the new generation.
	pub fn replace(&self, next: Arc<dyn RequestAugmentation>) -> u64 {
		let mut live = self.live.write();

		live.generation += 1;
		live.augmentation = next;

		live.generation
	}
}
impl Debug for AugmentationSlot {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AugmentationSlot").field("generation", &self.generation()).finish()
	}
}

struct LiveAugmentation {
	generation: u64,
	augmentation: Arc<dyn RequestAugmentation>,
}

// preserved, then request headers on top, then the bearer header.
fn apply(
	mut request: HttpRequest,
	preserved: &HeaderMap,
	token: Option<&TokenSecret>,
) -> Result<HttpRequest, ConfigError> {
	let mut headers = preserved.clone();

	headers.extend(std::mem::take(request.headers_mut()));

	if let Some(token) = token {
		headers.insert(header::AUTHORIZATION, bearer_value(token)?);
	}

	*request.headers_mut() = headers;

	Ok(request)
}

fn bearer_value(token: &TokenSecret) -> Result<HeaderValue, ConfigError> {
	let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose()))
		.map_err(|_| ConfigError::InvalidHeader { name: "authorization" })?;

	value.set_sensitive(true);

	Ok(value)
}
