//! Pipeline-level error types shared across stores, flows, interceptors, and clients.

// self
use crate::{_prelude::*, api::ApiError};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn StdError + Send + Sync>;

/// Canonical pipeline error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local token persistence failed.
	#[error(transparent)]
	Storage(#[from] StorageError),
	/// The refresh-token grant failed.
	#[error(transparent)]
	AuthGrant(#[from] AuthFailure),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// A successful response carried a body that could not be decoded.
	#[error(transparent)]
	Decode(#[from] DecodeError),
	/// Transport failure (DNS, TCP, TLS); no response was received.
	#[error(transparent)]
	Network(#[from] TransportError),

	/// The protected resource API answered with a non-2xx status.
	///
	/// For HTTP 401 the pipeline has already attempted a token refresh before this error is
	/// returned; `refresh_failure` carries the refresh error when that attempt failed.
	#[error("Protected resource rejected the request with HTTP {status}: {body}.")]
	ProtectedResource {
		/// HTTP status code returned by the resource server.
		status: u16,
		/// Structured error body returned by the resource server.
		body: ApiError,
		/// Refresh failure observed while recovering from a 401, if any.
		#[source]
		refresh_failure: Option<Box<Error>>,
	},
}
impl Error {
	/// Returns `true` when the error is an HTTP 401 from the protected resource API.
	pub fn is_unauthorized(&self) -> bool {
		matches!(self, Self::ProtectedResource { status: 401, .. })
	}

	/// Returns the structured server body carried by the error, if any.
	pub fn api_error(&self) -> Option<&ApiError> {
		match self {
			Self::ProtectedResource { body, .. } => Some(body),
			Self::AuthGrant(AuthFailure::Api { body, .. }) => Some(body),
			_ => None,
		}
	}

	/// Normalizes the error into the `{error, errorMessage}` pair consumed by the UI layer.
	pub fn payload(&self) -> ErrorPayload {
		match self {
			Self::Storage(e) => e.payload(),
			Self::AuthGrant(e) => e.payload(),
			Self::Config(e) => ErrorPayload::new("Invalid configuration", e.to_string()),
			Self::Decode(e) => ErrorPayload::new("Unexpected response", e.to_string()),
			Self::Network(e) => ErrorPayload::new("Network error", e.message()),
			Self::ProtectedResource { body, .. } => body.payload(),
		}
	}
}

/// Normalized `{error, errorMessage}` pair surfaced to error sinks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
	/// Short error label.
	pub error: String,
	/// Human-readable detail.
	pub error_message: String,
}
impl ErrorPayload {
	/// Creates a payload from the provided label + message.
	pub fn new(error: impl Into<String>, error_message: impl Into<String>) -> Self {
		Self { error: error.into(), error_message: error_message.into() }
	}
}

/// Failures raised while reading or writing the persisted token pair.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum StorageError {
	/// Reading a single token key failed.
	#[error("Cannot read {name} from AsyncStorage: {message}")]
	Read {
		/// Storage key that failed to load.
		name: String,
		/// Backend-supplied failure message.
		message: String,
	},
	/// Writing the token pair failed; no partial-write guarantee is made.
	#[error("Cannot store new tokens in AsyncStorage: {message}")]
	Write {
		/// Backend-supplied failure message.
		message: String,
	},
}
impl StorageError {
	/// Label used for failed token writes.
	pub const WRITE_LABEL: &'static str = "Cannot store new tokens in AsyncStorage";

	/// Normalizes the failure for error sinks.
	pub fn payload(&self) -> ErrorPayload {
		match self {
			Self::Read { name, message } =>
				ErrorPayload::new(format!("Cannot read {name} from AsyncStorage"), message.clone()),
			Self::Write { message } => ErrorPayload::new(Self::WRITE_LABEL, message.clone()),
		}
	}
}

/// Failures of the refresh-token grant against the authorization server.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum AuthFailure {
	/// No refresh token is stored and the refresher requires one.
	#[error("No refresh token found: Could not get a valid refresh token from storage.")]
	MissingRefreshToken,
	/// The authorization server answered with a non-2xx status and an error body.
	#[error("Token endpoint returned HTTP {status}: {body}.")]
	Api {
		/// HTTP status code returned by the token endpoint.
		status: u16,
		/// Structured error body.
		body: ApiError,
	},
	/// The token endpoint answered 2xx with a body that is not a token response.
	#[error("Token endpoint returned a malformed response (HTTP {status}): {message}.")]
	MalformedResponse {
		/// HTTP status code returned by the token endpoint.
		status: u16,
		/// Decoder message including the failing JSON path.
		message: String,
	},
	/// The token endpoint could not be reached.
	#[error("Token endpoint could not be reached: {message}.")]
	Transport {
		/// Transport error message.
		message: String,
	},
}
impl AuthFailure {
	/// Label used when the fail-fast refresher finds no refresh token.
	pub const MISSING_REFRESH_LABEL: &'static str = "No refresh token found";
	/// Message used when the fail-fast refresher finds no refresh token.
	pub const MISSING_REFRESH_MESSAGE: &'static str =
		"Could not get a valid refresh token from storage";

	/// Normalizes the failure for error sinks.
	pub fn payload(&self) -> ErrorPayload {
		match self {
			Self::MissingRefreshToken =>
				ErrorPayload::new(Self::MISSING_REFRESH_LABEL, Self::MISSING_REFRESH_MESSAGE),
			Self::Api { body, .. } => body.payload(),
			Self::MalformedResponse { message, .. } =>
				ErrorPayload::new("Unexpected token response", message.clone()),
			Self::Transport { message } => ErrorPayload::new("Network error", message.clone()),
		}
	}
}

/// Configuration and request-construction failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// A header value could not be encoded.
	#[error("Header `{name}` has an invalid value.")]
	InvalidHeader {
		/// Header name.
		name: &'static str,
	},
	/// A request path could not be joined onto a base URL.
	#[error("Path `{path}` cannot be joined onto {base}.")]
	InvalidPath {
		/// Base URL.
		base: String,
		/// Path supplied by the caller.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// A joined URL left the base URL it was resolved against.
	#[error("Path resolves to {url}, outside of {base}.")]
	PathOutsideBase {
		/// Base URL.
		base: String,
		/// Resolved URL.
		url: String,
	},
	/// A request body could not be serialized.
	#[error("Request body could not be serialized.")]
	Body(#[from] serde_json::Error),

	/// Base URLs must be absolute `http(s)` URLs that can carry paths.
	#[error("The {endpoint} base URL must be an absolute http(s) URL: {url}.")]
	InvalidBaseUrl {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// URL that failed validation.
		url: String,
	},
	/// A required field was not provided to the config builder.
	#[error("Integration config is missing `{field}`.")]
	MissingField {
		/// Name of the missing field.
		field: &'static str,
	},
	/// Provider identifier failed validation.
	#[error(transparent)]
	InvalidProvider(#[from] crate::auth::IdentifierError),
	/// A JSON config document could not be parsed.
	#[error("Integration config could not be parsed: {0}.")]
	Parse(#[source] serde_path_to_error::Error<serde_json::Error>),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// A 2xx body failed to decode into the expected shape.
#[derive(Debug, ThisError)]
pub enum DecodeError {
	/// Resource response was not a results envelope.
	#[error("Resource endpoint returned malformed JSON (HTTP {status}).")]
	ResponseParse {
		/// Structured parsing failure, including the JSON path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code of the response.
		status: u16,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network request failed: {source}")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred during the request: {0}")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Network { source: Box::new(src) }
	}

	/// Returns the underlying error message without the wrapper prefix.
	pub fn message(&self) -> String {
		match self {
			Self::Network { source } => source.to_string(),
			Self::Io(e) => e.to_string(),
		}
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
