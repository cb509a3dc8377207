//! Recovery from HTTP 401 responses of the protected resource API.
//!
//! The handler refreshes the tokens once and swaps the live augmentation so that later requests
//! carry the new access token. The request that received the 401 is never retried here.
//!
//! With coalescing enabled, handlers serialize on an async mutex. A handler whose request was
//! dispatched before the slot's latest replacement skips the grant call, since the sibling that
//! replaced the slot already refreshed the tokens it would have refreshed.

// self
use crate::{
	_prelude::*,
	api::ApiError,
	auth::GrantedTokens,
	flows::TokenRefresher,
	http::HeaderMap,
	intercept::{AugmentationSlot, BearerAugmentation},
	obs::{self, FlowKind, FlowOutcome, FlowSpan, PipelineEvent, Reporter},
};

/// What the failing request looked like.
#[derive(Clone, Debug)]
pub struct UnauthenticatedContext {
	/// Error body that came with the 401.
	pub body: ApiError,
	/// Headers the failing request was sent with.
	pub request_headers: HeaderMap,
	/// Slot generation the failing request was augmented with.
	pub generation: u64,
}

/// Result of a successful recovery.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecoveryOutcome {
	/// A grant call was made and the slot now holds an augmentation bound to the new token.
	Refreshed(GrantedTokens),
	/// A concurrent recovery had already replaced the slot; no grant call was made.
	Coalesced,
}

/// Runs the refresh for a 401 and installs the resulting bearer augmentation.
pub struct UnauthenticatedHandler {
	refresher: TokenRefresher,
	slot: Arc<AugmentationSlot>,
	reporter: Reporter,
	guard: AsyncMutex<()>,
	coalesce: bool,
}
impl UnauthenticatedHandler {
	/// Creates a handler replacing augmentations in `slot`.
	pub fn new(
		refresher: TokenRefresher,
		slot: Arc<AugmentationSlot>,
		reporter: Reporter,
		coalesce: bool,
	) -> Self {
		Self { refresher, slot, reporter, guard: AsyncMutex::new(()), coalesce }
	}

	/// Refresher used for the grant call.
	pub fn refresher(&self) -> &TokenRefresher {
		&self.refresher
	}

	/// Whether concurrent recoveries share one refresh.
	pub fn coalesces(&self) -> bool {
		self.coalesce
	}

	/// Reports the 401, refreshes, and replaces the live augmentation.
	///
	/// A refresh failure is returned unchanged and leaves the slot untouched.
	pub async fn handle(&self, context: UnauthenticatedContext) -> Result<RecoveryOutcome> {
		const KIND: FlowKind = FlowKind::Recovery;

		let provider = self.refresher.provider().clone();
		let span = FlowSpan::new(KIND, "handle_unauthenticated", provider.as_ref());

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);
		self.reporter
			.emit(PipelineEvent::Unauthenticated { provider, body: context.body.clone() });

		let result = span.instrument(self.recover(context)).await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	async fn recover(&self, context: UnauthenticatedContext) -> Result<RecoveryOutcome> {
		let _serialized = if self.coalesce { Some(self.guard.lock().await) } else { None };
		let provider = self.refresher.provider().clone();

		if self.coalesce && self.slot.generation() > context.generation {
			self.reporter.emit(PipelineEvent::RefreshCoalesced { provider });

			return Ok(RecoveryOutcome::Coalesced);
		}

		let granted = self.refresher.refresh().await?;

		self.reporter.emit(PipelineEvent::TokensRefreshed { provider });
		self.slot.replace(Arc::new(BearerAugmentation::preserving(
			granted.access_token().clone(),
			&context.request_headers,
		)));

		Ok(RecoveryOutcome::Refreshed(granted))
	}
}
impl Debug for UnauthenticatedHandler {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("UnauthenticatedHandler")
			.field("refresher", &self.refresher)
			.field("slot", &self.slot)
			.field("coalesce", &self.coalesce)
			.finish()
	}
}
