//! Wire shapes shared by the authorization server and the protected resource API.
//!
//! Error bodies arrive in two shapes from the same logical API: the OAuth-style
//! `{error, error_description?, error_details?}` object and the problem-details style
//! `{type, title, status, trace_id, detail?}` object. [`ApiError`] models the union as a tagged
//! variant chosen by an explicit discriminant check (`error` field first, then `title`), so call
//! sites never inspect raw JSON shape.

// crates.io
use serde::Deserializer;
use serde_json::{Map, Value};
// self
use crate::{_prelude::*, error::ErrorPayload};

/// OAuth-style error body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthErrorBody {
	/// Machine-readable error code (e.g. `invalid_token`).
	pub error: String,
	/// Human-readable description.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error_description: Option<String>,
	/// Free-form provider details.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error_details: Option<BTreeMap<String, String>>,
}
impl OAuthErrorBody {
	/// Creates a body carrying only the error code.
	pub fn new(error: impl Into<String>) -> Self {
		Self { error: error.into(), error_description: None, error_details: None }
	}

	/// Adds the `error_description` field.
	pub fn with_description(mut self, description: impl Into<String>) -> Self {
		self.error_description = Some(description.into());

		self
	}

	/// Adds the `error_details` map.
	pub fn with_details(mut self, details: BTreeMap<String, String>) -> Self {
		self.error_details = Some(details);

		self
	}
}

/// Problem-details error body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemDetails {
	/// Problem type URI.
	#[serde(rename = "type", default)]
	pub kind: String,
	/// Short summary of the problem.
	pub title: String,
	/// HTTP status mirrored in the body.
	#[serde(default)]
	pub status: u16,
	/// Provider trace identifier for support requests.
	#[serde(default)]
	pub trace_id: String,
	/// Longer explanation, when supplied.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub detail: Option<String>,
}

/// Error body returned by either API, discriminated by the presence of `error` vs `title`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ApiError {
	/// Body with an `error` field.
	OAuth(OAuthErrorBody),
	/// Body with a `title` field.
	Problem(ProblemDetails),
	/// Anything else (non-JSON payloads, unknown objects), truncated for logging.
	Unstructured {
		/// Body preview.
		preview: String,
	},
}
impl ApiError {
	const PREVIEW_LIMIT: usize = 256;

	/// Parses a raw response body, falling back to [`ApiError::Unstructured`].
	pub fn from_slice(body: &[u8]) -> Self {
		match serde_json::from_slice::<Value>(body) {
			Ok(value) => Self::from_value(value),
			Err(_) => Self::unstructured(String::from_utf8_lossy(body).into_owned()),
		}
	}

	/// Classifies an already-parsed JSON value.
	pub fn from_value(value: Value) -> Self {
		match value {
			Value::Object(map) => Self::from_object(map),
			other => Self::unstructured(other.to_string()),
		}
	}

	/// Returns the OAuth body when the error uses that shape.
	pub fn as_oauth(&self) -> Option<&OAuthErrorBody> {
		match self {
			Self::OAuth(body) => Some(body),
			_ => None,
		}
	}

	/// Returns the human-readable description carried by either shape.
	pub fn description(&self) -> Option<&str> {
		match self {
			Self::OAuth(body) => body.error_description.as_deref(),
			Self::Problem(body) => body.detail.as_deref(),
			Self::Unstructured { .. } => None,
		}
	}

	/// Normalizes the body for error sinks.
	pub fn payload(&self) -> ErrorPayload {
		match self {
			Self::OAuth(body) =>
				ErrorPayload::new(&body.error, body.error_description.clone().unwrap_or_default()),
			Self::Problem(body) =>
				ErrorPayload::new(&body.title, body.detail.clone().unwrap_or_default()),
			Self::Unstructured { preview } =>
				ErrorPayload::new("Unexpected error response", preview.clone()),
		}
	}

	fn from_object(map: Map<String, Value>) -> Self {
		let has = |field: &str| map.get(field).is_some_and(Value::is_string);
		let parsed = if has("error") {
			serde_json::from_value(Value::Object(map.clone())).map(Self::OAuth).ok()
		} else if has("title") {
			serde_json::from_value(Value::Object(map.clone())).map(Self::Problem).ok()
		} else {
			None
		};

		parsed.unwrap_or_else(|| Self::unstructured(Value::Object(map).to_string()))
	}

	fn unstructured(raw: String) -> Self {
		let preview = if raw.chars().count() > Self::PREVIEW_LIMIT {
			raw.chars().take(Self::PREVIEW_LIMIT).collect()
		} else {
			raw
		};

		Self::Unstructured { preview }
	}
}
impl<'de> Deserialize<'de> for ApiError {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		let value = Value::deserialize(deserializer)?;

		Ok(Self::from_value(value))
	}
}
impl Display for ApiError {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::OAuth(body) => match &body.error_description {
				Some(description) => write!(f, "{} ({description})", body.error),
				None => f.write_str(&body.error),
			},
			Self::Problem(body) => match &body.detail {
				Some(detail) => write!(f, "{} ({detail})", body.title),
				None => f.write_str(&body.title),
			},
			Self::Unstructured { preview } if preview.is_empty() => f.write_str("<empty body>"),
			Self::Unstructured { preview } => f.write_str(preview),
		}
	}
}

/// Job status reported by the protected resource API.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnvelopeStatus {
	/// Results are complete.
	Succeeded,
	/// The upstream bank call failed.
	Failed,
	/// The request is queued upstream.
	Queued,
	/// The request is still running upstream.
	Running,
}

/// Success envelope wrapping every protected resource payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultsEnvelope<T> {
	/// Inner payload.
	pub results: Vec<T>,
	/// Upstream job status.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub status: Option<EnvelopeStatus>,
}
impl<T> ResultsEnvelope<T> {
	/// Drops the envelope and returns the inner results.
	pub fn into_results(self) -> Vec<T> {
		self.results
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn discriminates_oauth_and_problem_bodies() {
		let oauth = ApiError::from_slice(
			br#"{"error":"access_denied","error_description":"Consent expired.","error_details":{}}"#,
		);

		assert_eq!(
			oauth,
			ApiError::OAuth(
				OAuthErrorBody::new("access_denied")
					.with_description("Consent expired.")
					.with_details(BTreeMap::new())
			)
		);

		let problem = ApiError::from_slice(
			br#"{"type":"https://docs/errors/provider","title":"Provider error","status":502,"trace_id":"t-1"}"#,
		);

		match problem {
			ApiError::Problem(body) => {
				assert_eq!(body.title, "Provider error");
				assert_eq!(body.status, 502);
				assert_eq!(body.trace_id, "t-1");
				assert_eq!(body.detail, None);
			},
			other => panic!("Expected a problem body, got {other:?}."),
		}
	}

	#[test]
	fn error_field_wins_over_title() {
		let body = ApiError::from_slice(br#"{"error":"invalid_token","title":"ignored"}"#);

		assert_eq!(body.as_oauth().map(|b| b.error.as_str()), Some("invalid_token"));
	}

	#[test]
	fn non_json_bodies_are_previewed() {
		let html = format!("<html>{}</html>", "x".repeat(400));
		let body = ApiError::from_slice(html.as_bytes());

		match body {
			ApiError::Unstructured { preview } => assert_eq!(preview.chars().count(), 256),
			other => panic!("Expected an unstructured body, got {other:?}."),
		}
	}

	#[test]
	fn oauth_body_serializes_without_empty_fields() {
		let json = serde_json::to_string(&ApiError::OAuth(OAuthErrorBody::new("invalid_token")))
			.expect("Error body should serialize.");

		assert_eq!(json, r#"{"error":"invalid_token"}"#);
	}

	#[test]
	fn envelope_unwraps_results() {
		let envelope: ResultsEnvelope<String> =
			serde_json::from_str(r#"{"results":["x"],"status":"Succeeded"}"#)
				.expect("Envelope should deserialize.");

		assert_eq!(envelope.status, Some(EnvelopeStatus::Succeeded));
		assert_eq!(envelope.into_results(), vec!["x".to_string()]);
	}
}
