//! Response classification for the protected resource API.

// self
use crate::{
	_prelude::*,
	api::{ApiError, ResultsEnvelope},
	error::DecodeError,
	http::{HttpResponse, StatusCode},
};

/// What the resource client should do with a response.
#[derive(Debug)]
pub enum ResponseOutcome {
	/// 2xx; the body is handed back to the caller.
	Success(HttpResponse),
	/// 401; the unauthenticated handler must run before the error is returned.
	Unauthorized(ApiError),
	/// Any other non-2xx status.
	Rejected {
		/// HTTP status code.
		status: u16,
		/// Parsed error body.
		body: ApiError,
	},
}

/// Sorts a response into success, unauthorized, or rejected.
pub fn classify(response: HttpResponse) -> ResponseOutcome {
	let status = response.status();

	if status.is_success() {
		return ResponseOutcome::Success(response);
	}

	let body = ApiError::from_slice(response.body());

	if status == StatusCode::UNAUTHORIZED {
		ResponseOutcome::Unauthorized(body)
	} else {
		ResponseOutcome::Rejected { status: status.as_u16(), body }
	}
}

/// Decodes a `{results, status?}` envelope and returns exactly `results`.
pub fn unwrap_envelope<T>(status: u16, body: &[u8]) -> Result<Vec<T>, DecodeError>
where
	T: DeserializeOwned,
{
	let de = &mut serde_json::Deserializer::from_slice(body);
	let envelope: ResultsEnvelope<T> = serde_path_to_error::deserialize(de)
		.map_err(|source| DecodeError::ResponseParse { source, status })?;

	Ok(envelope.into_results())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn response(status: u16, body: &str) -> HttpResponse {
		let mut response = HttpResponse::new(body.as_bytes().to_vec());

		*response.status_mut() =
			StatusCode::from_u16(status).expect("Fixture status should be valid.");

		response
	}

	#[test]
	fn envelope_unwraps_to_exactly_the_results() {
		let results: Vec<String> =
			unwrap_envelope(200, br#"{"results": ["x"], "status": "Succeeded"}"#)
				.expect("Envelope should decode.");

		assert_eq!(results, vec!["x".to_owned()]);
	}

	#[test]
	fn envelope_errors_carry_the_json_path() {
		let err = unwrap_envelope::<u32>(200, br#"{"results": [1, "two"]}"#)
			.expect_err("Mixed result types must fail.");
		let DecodeError::ResponseParse { source, status } = err;

		assert_eq!(status, 200);
		assert_eq!(source.path().to_string(), "results[1]");
	}

	#[test]
	fn classifies_by_status() {
		assert!(matches!(classify(response(204, "")), ResponseOutcome::Success(_)));

		let ResponseOutcome::Unauthorized(body) =
			classify(response(401, r#"{"error": "invalid_token"}"#))
		else {
			panic!("401 must classify as unauthorized.");
		};

		assert_eq!(body.as_oauth().map(|body| body.error.as_str()), Some("invalid_token"));

		let ResponseOutcome::Rejected { status, body } = classify(response(
			403,
			r#"{"error": "access_denied", "error_description": "Consent revoked."}"#,
		)) else {
			panic!("403 must classify as rejected.");
		};

		assert_eq!(status, 403);
		assert_eq!(body.description(), Some("Consent revoked."));
	}

	#[test]
	fn gateway_pages_are_kept_as_previews() {
		let ResponseOutcome::Rejected { body, .. } =
			classify(response(502, "<html>Bad Gateway</html>"))
		else {
			panic!("502 must classify as rejected.");
		};

		assert_eq!(body, ApiError::Unstructured { preview: "<html>Bad Gateway</html>".into() });
	}
}
