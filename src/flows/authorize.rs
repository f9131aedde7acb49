//! Consent URL construction and the authorization code exchange.

// crates.io
use rand::{Rng, distr::Alphanumeric};
use url::form_urlencoded;
// self
use crate::{
	_prelude::*,
	auth::Credential,
	config::ClientConfig,
	error::ConfigError,
	flows::TokenManager,
	http::TokenHttpClient,
	oauth::{OAuth2Facade, TransportErrorMapper},
	obs::{self, FlowKind},
	provider::ProviderDescriptor,
	session::Session,
};

const STATE_LEN: usize = 32;

/// Consent redirect plus the `state` value it was issued with.
#[derive(Clone, Debug)]
pub struct AuthorizationRequest {
	/// Opaque value that must round-trip through the redirect handler.
	pub state: String,
	/// Consent URL the user should be sent to.
	pub authorize_url: Url,
}
impl AuthorizationRequest {
	/// Validates the `state` returned to the redirect handler.
	pub fn validate_state(&self, returned_state: &str) -> Result<()> {
		if returned_state == self.state {
			Ok(())
		} else {
			Err(ConfigError::StateMismatch.into())
		}
	}
}

impl<C, M> TokenManager<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Builds the consent URL carrying `response_type=code`, the client id, the redirect
	/// target and the scope list. Performs no I/O and keeps no state.
	pub fn begin_authorization(&self) -> Url {
		build_authorize_url(&self.descriptor, &self.config, None)
	}

	/// Like [`begin_authorization`](Self::begin_authorization), with a random 32-character
	/// `state` appended for the redirect handler to verify.
	pub fn start_authorization(&self) -> AuthorizationRequest {
		let state = random_string(STATE_LEN);
		let authorize_url = build_authorize_url(&self.descriptor, &self.config, Some(&state));

		AuthorizationRequest { state, authorize_url }
	}

	/// Exchanges an authorization code for a full credential.
	///
	/// Fails with [`Error::AuthExchangeFailed`] on a non-2xx answer or when the payload
	/// lacks `access_token`, `expires_in` or `refresh_token`.
	pub async fn exchange_code(&self, code: &str, state: &str) -> Result<Credential> {
		obs::observe(FlowKind::AuthorizationCode, "exchange_code", async move {
			if code.is_empty() {
				return Err(Error::invalid_argument("authorization code must not be empty"));
			}

			let facade = self.facade()?;

			facade.exchange_authorization_code(code, state, OffsetDateTime::now_utc()).await
		})
		.await
	}

	/// Validates the returned state, exchanges `code`, and stores the credential in
	/// `session`.
	pub async fn complete_authorization(
		&self,
		request: &AuthorizationRequest,
		code: &str,
		returned_state: &str,
		session: &Session,
	) -> Result<Credential> {
		request.validate_state(returned_state)?;

		let credential = self.exchange_code(code, returned_state).await?;

		session.authorize(credential.clone()).await;

		Ok(credential)
	}
}

fn build_authorize_url(
	descriptor: &ProviderDescriptor,
	config: &ClientConfig,
	state: Option<&str>,
) -> Url {
	let mut pairs = vec![
		("response_type", "code".to_owned()),
		("client_id", config.client_id.clone()),
		("redirect_uri", config.redirect_uri.to_string()),
	];

	if !config.scope.is_empty() {
		pairs.push(("scope", config.scope.joined()));
	}
	if let Some(state) = state {
		pairs.push(("state", state.to_owned()));
	}

	let mut query = descriptor.endpoints.authorization.query().unwrap_or_default().to_owned();

	for (key, value) in pairs {
		if !query.is_empty() {
			query.push('&');
		}

		query.push_str(key);
		query.push('=');
		query.push_str(&percent_encode(&value));
	}

	let mut url = descriptor.endpoints.authorization.clone();

	url.set_query(Some(&query));

	url
}

// Form encoding renders spaces as `+` and literal pluses as `%2B`, so the swap is lossless.
fn percent_encode(value: &str) -> String {
	form_urlencoded::byte_serialize(value.as_bytes()).collect::<String>().replace('+', "%20")
}

fn random_string(len: usize) -> String {
	rand::rng().sample_iter(Alphanumeric).take(len).map(char::from).collect()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn state_validation_errors_on_mismatch() {
		let request = AuthorizationRequest {
			state: "expected".into(),
			authorize_url: Url::parse("https://accounts.example.com/authorize?state=expected")
				.expect("Authorization URL fixture should parse successfully."),
		};

		assert!(request.validate_state("expected").is_ok());

		let err = request.validate_state("other").expect_err("State mismatch should fail.");

		assert!(matches!(err, Error::Config(ConfigError::StateMismatch)));
	}

	#[test]
	fn scope_and_redirect_are_percent_encoded() {
		assert_eq!(percent_encode("user-read-email user-top-read"), "user-read-email%20user-top-read");
		assert_eq!(
			percent_encode("http://localhost:5000/callback"),
			"http%3A%2F%2Flocalhost%3A5000%2Fcallback"
		);
		assert_eq!(percent_encode("a+b"), "a%2Bb");
	}

	#[test]
	fn random_state_is_alphanumeric() {
		let state = random_string(STATE_LEN);

		assert_eq!(state.len(), STATE_LEN);
		assert!(state.chars().all(|c| c.is_ascii_alphanumeric()));
	}
}
