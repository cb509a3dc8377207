//! Access/refresh token pair persisted per integration.

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Which half of the pair a storage key refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
	/// Short-lived bearer credential.
	Access,
	/// Longer-lived credential used for the refresh grant.
	Refresh,
}
impl TokenKind {
	/// Returns a stable label used inside storage keys.
	pub const fn as_str(self) -> &'static str {
		match self {
			TokenKind::Access => "access_token",
			TokenKind::Refresh => "refresh_token",
		}
	}
}
impl Display for TokenKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Current credential state for the protected resource API.
///
/// An empty access token means the application treats the user as unauthenticated.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
	/// Bearer credential attached to protected resource calls.
	pub access_token: TokenSecret,
	/// Credential presented to the token endpoint.
	pub refresh_token: TokenSecret,
}
impl TokenPair {
	/// Creates a pair from the provided secrets.
	pub fn new(access_token: impl Into<TokenSecret>, refresh_token: impl Into<TokenSecret>) -> Self {
		Self { access_token: access_token.into(), refresh_token: refresh_token.into() }
	}

	/// Returns `true` when an access token is present.
	pub fn is_authenticated(&self) -> bool {
		!self.access_token.is_empty()
	}
}

/// Result of a successful refresh grant, after persistence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrantedTokens {
	/// Newly persisted pair.
	pub pair: TokenPair,
	/// Expiry instant derived from `expires_in`, when the server supplied one.
	pub expires_at: Option<OffsetDateTime>,
	/// Scopes echoed by the server.
	pub scopes: Vec<String>,
}
impl GrantedTokens {
	/// Shortcut to the new access token.
	pub fn access_token(&self) -> &TokenSecret {
		&self.pair.access_token
	}

	/// Returns `true` if the access token has expired at the provided instant.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		self.expires_at.is_some_and(|expires_at| instant >= expires_at)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn empty_access_token_is_unauthenticated() {
		assert!(!TokenPair::default().is_authenticated());
		assert!(TokenPair::new("a", "").is_authenticated());
	}

	#[test]
	fn expiry_is_optional() {
		let now = OffsetDateTime::now_utc();
		let granted = GrantedTokens {
			pair: TokenPair::new("a", "b"),
			expires_at: Some(now + Duration::minutes(5)),
			scopes: Vec::new(),
		};

		assert!(!granted.is_expired_at(now));
		assert!(granted.is_expired_at(now + Duration::minutes(5)));
		assert!(!GrantedTokens { expires_at: None, ..granted }.is_expired_at(now));
	}
}
