//! Client registration passed explicitly into the token manager.

// self
use crate::{
	_prelude::*,
	auth::{ScopeList, TokenSecret},
};

/// Scopes requested when the caller does not supply its own list.
pub const DEFAULT_SCOPES: [&str; 5] = [
	"user-read-email",
	"user-top-read",
	"playlist-read-private",
	"playlist-modify-private",
	"playlist-modify-public",
];

/// OAuth client registration: identifier, secret, redirect target, and scope list.
///
/// Loaded once by the host process and handed to
/// [`TokenManager`](crate::flows::TokenManager); nothing in this crate reads ambient
/// environment state.
#[derive(Clone, Serialize, Deserialize)]
pub struct ClientConfig {
	/// OAuth client identifier.
	pub client_id: String,
	/// OAuth client secret, sent via HTTP Basic auth.
	pub client_secret: TokenSecret,
	/// Callback URL registered with the provider.
	pub redirect_uri: Url,
	/// Scopes requested on the consent page.
	#[serde(default = "default_scope")]
	pub scope: ScopeList,
}
impl ClientConfig {
	/// Creates a configuration requesting [`DEFAULT_SCOPES`].
	pub fn new(
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
		redirect_uri: Url,
	) -> Self {
		Self {
			client_id: client_id.into(),
			client_secret: TokenSecret::new(client_secret),
			redirect_uri,
			scope: default_scope(),
		}
	}

	/// Overrides the requested scope list.
	pub fn with_scope(mut self, scope: ScopeList) -> Self {
		self.scope = scope;

		self
	}
}
impl Debug for ClientConfig {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientConfig")
			.field("client_id", &self.client_id)
			.field("client_secret", &"<redacted>")
			.field("redirect_uri", &self.redirect_uri)
			.field("scope", &self.scope)
			.finish()
	}
}

fn default_scope() -> ScopeList {
	ScopeList::new(DEFAULT_SCOPES).unwrap_or_default()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn deserializes_with_default_scopes_and_redacts_secret() {
		let config: ClientConfig = serde_json::from_str(
			r#"{"client_id":"cid","client_secret":"shh","redirect_uri":"http://localhost:5000/callback"}"#,
		)
		.expect("Client configuration should deserialize.");

		assert_eq!(config.scope.len(), DEFAULT_SCOPES.len());
		assert_eq!(config.client_secret.expose(), "shh");
		assert!(!format!("{config:?}").contains("shh"));
	}
}
