// self
use crate::{
	_prelude::*,
	api::ApiError,
	auth::ProviderId,
	error::ErrorPayload,
};

/// Severity attached to a [`PipelineEvent`] when it is logged.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventLevel {
	/// Routine progress.
	Info,
	/// Recoverable problem.
	Warn,
	/// Failure surfaced to the caller.
	Error,
}

/// Something the pipeline observed while handling a request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PipelineEvent {
	/// The protected resource API answered 401; a refresh is about to run.
	Unauthenticated {
		/// Integration that rejected the token.
		provider: ProviderId,
		/// Error body that came with the 401.
		body: ApiError,
	},
	/// A refresh succeeded and the bearer augmentation is being replaced.
	TokensRefreshed {
		/// Integration whose tokens were refreshed.
		provider: ProviderId,
	},
	/// A sibling request already refreshed the tokens; no grant call was made.
	RefreshCoalesced {
		/// Integration whose tokens were refreshed by the sibling.
		provider: ProviderId,
	},
	/// The refresh grant or its persistence failed.
	RefreshFailed {
		/// Integration whose refresh failed.
		provider: ProviderId,
		/// Normalized failure.
		payload: ErrorPayload,
	},
	/// The protected resource API answered with a non-401 error status.
	ResourceRejected {
		/// Integration that rejected the call.
		provider: ProviderId,
		/// HTTP status code.
		status: u16,
		/// Error body, exactly as returned.
		body: ApiError,
	},
	/// No response was received from the protected resource API.
	NetworkFailure {
		/// Integration that could not be reached.
		provider: ProviderId,
		/// Transport error message.
		message: String,
	},
}
impl PipelineEvent {
	/// Integration the event belongs to.
	pub fn provider(&self) -> &ProviderId {
		match self {
			Self::Unauthenticated { provider, .. }
			| Self::TokensRefreshed { provider }
			| Self::RefreshCoalesced { provider }
			| Self::RefreshFailed { provider, .. }
			| Self::ResourceRejected { provider, .. }
			| Self::NetworkFailure { provider, .. } => provider,
		}
	}

	/// Severity used for logging.
	pub fn level(&self) -> EventLevel {
		match self {
			Self::TokensRefreshed { .. } | Self::RefreshCoalesced { .. } => EventLevel::Info,
			Self::Unauthenticated { .. } => EventLevel::Warn,
			Self::RefreshFailed { .. }
			| Self::ResourceRejected { .. }
			| Self::NetworkFailure { .. } => EventLevel::Error,
		}
	}

	/// Normalized notice for the UI error layer; `None` for events the user never sees.
	pub fn notice(&self) -> Option<Notice> {
		let payload = match self {
			Self::Unauthenticated { .. }
			| Self::TokensRefreshed { .. }
			| Self::RefreshCoalesced { .. } => return None,
			Self::RefreshFailed { payload, .. } => payload.clone(),
			Self::ResourceRejected { body, .. } => body.payload(),
			Self::NetworkFailure { message, .. } => ErrorPayload::new("Network error", message),
		};

		Some(Notice::new(self.provider(), payload))
	}
}

/// `{id, error, errorMessage}` triple consumed by toast/modal surfaces.
///
/// `id` is the provider identifier, so the UI can group notices per integration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
	/// Integration identifier.
	pub id: String,
	/// Short error label.
	pub error: String,
	/// Human-readable detail.
	pub error_message: String,
}
impl Notice {
	/// Builds a notice for `provider` from a normalized payload.
	pub fn new(provider: &ProviderId, payload: ErrorPayload) -> Self {
		Self { id: provider.to_string(), error: payload.error, error_message: payload.error_message }
	}
}

/// Receiver of every [`PipelineEvent`].
pub trait EventSink
where
	Self: Send + Sync,
{
	/// Handles one event; must not block.
	fn emit(&self, event: &PipelineEvent);
}
impl<F> EventSink for F
where
	F: Fn(&PipelineEvent) + Send + Sync,
{
	fn emit(&self, event: &PipelineEvent) {
		self(event)
	}
}

/// Adapter that forwards only user-facing failures, already normalized into [`Notice`]s.
pub struct NoticeForwarder<F>(pub F);
impl<F> EventSink for NoticeForwarder<F>
where
	F: Fn(Notice) + Send + Sync,
{
	fn emit(&self, event: &PipelineEvent) {
		if let Some(notice) = event.notice() {
			(self.0)(notice);
		}
	}
}
impl<F> Debug for NoticeForwarder<F> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("NoticeForwarder(..)")
	}
}

/// Logs events and forwards them to the optional sink.
#[derive(Clone, Default)]
pub struct Reporter {
	sink: Option<Arc<dyn EventSink>>,
}
impl Reporter {
	/// Creates a reporter forwarding to `sink`.
	pub fn new(sink: Option<Arc<dyn EventSink>>) -> Self {
		Self { sink }
	}

	/// Logs `event` and hands it to the sink.
	pub fn emit(&self, event: PipelineEvent) {
		log_event(&event);

		if let Some(sink) = &self.sink {
			sink.emit(&event);
		}
	}
}
impl Debug for Reporter {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Reporter").field("sink_set", &self.sink.is_some()).finish()
	}
}

#[cfg(feature = "tracing")]
fn log_event(event: &PipelineEvent) {
	let provider: &str = event.provider();

	match event {
		PipelineEvent::Unauthenticated { body, .. } => tracing::warn!(
			provider,
			description = body.description().unwrap_or_default(),
			"Access token rejected by the resource server; refreshing tokens."
		),
		PipelineEvent::TokensRefreshed { .. } =>
			tracing::info!(provider, "Tokens refreshed; bearer augmentation replaced."),
		PipelineEvent::RefreshCoalesced { .. } =>
			tracing::info!(provider, "Tokens already refreshed by a concurrent request."),
		PipelineEvent::RefreshFailed { payload, .. } => tracing::error!(
			provider,
			error = payload.error.as_str(),
			error_message = payload.error_message.as_str(),
			"Token refresh failed."
		),
		PipelineEvent::ResourceRejected { status, body, .. } =>
			tracing::error!(provider, status, body = %body, "Resource request failed."),
		PipelineEvent::NetworkFailure { message, .. } =>
			tracing::error!(provider, message = message.as_str(), "Resource request did not complete."),
	}
}

#[cfg(not(feature = "tracing"))]
fn log_event(event: &PipelineEvent) {
	let _ = event;
}

#[cfg(test)]
mod tests {
	// crates.io
	use parking_lot::Mutex;
	// self
	use super::*;
	use crate::api::OAuthErrorBody;

	fn provider() -> ProviderId {
		ProviderId::new("truelayer").expect("Provider fixture should be valid.")
	}

	#[test]
	fn only_failures_produce_notices() {
		let refreshed = PipelineEvent::TokensRefreshed { provider: provider() };
		let rejected = PipelineEvent::ResourceRejected {
			provider: provider(),
			status: 403,
			body: ApiError::OAuth(
				OAuthErrorBody::new("access_denied").with_description("Consent revoked."),
			),
		};

		assert_eq!(refreshed.notice(), None);
		assert_eq!(
			rejected.notice(),
			Some(Notice {
				id: "truelayer".into(),
				error: "access_denied".into(),
				error_message: "Consent revoked.".into(),
			})
		);
		assert_eq!(rejected.level(), EventLevel::Error);
	}

	#[test]
	fn notice_forwarder_skips_informational_events() {
		let seen = Arc::new(Mutex::new(Vec::new()));
		let forwarder = {
			let seen = seen.clone();

			NoticeForwarder(move |notice: Notice| seen.lock().push(notice))
		};
		let reporter = Reporter::new(Some(Arc::new(forwarder)));

		reporter.emit(PipelineEvent::TokensRefreshed { provider: provider() });
		reporter.emit(PipelineEvent::NetworkFailure {
			provider: provider(),
			message: "connection reset".into(),
		});

		let seen = seen.lock();

		assert_eq!(seen.len(), 1);
		assert_eq!(seen[0].error, "Network error");
		assert_eq!(seen[0].error_message, "connection reset");
	}

	#[test]
	fn notices_serialize_for_the_ui_layer() {
		let json = serde_json::to_string(&Notice::new(
			&provider(),
			ErrorPayload::new("No refresh token found", "missing"),
		))
		.expect("Notice should serialize.");

		assert_eq!(
			json,
			r#"{"id":"truelayer","error":"No refresh token found","errorMessage":"missing"}"#
		);
	}
}
