//! OAuth client facade over [`oauth2::basic::BasicClient`].
//!
//! Both token grants authenticate with HTTP Basic client credentials. Any failure reported
//! by the token endpoint (non-2xx status, OAuth error payload, malformed or incomplete
//! body) becomes [`Error::AuthExchangeFailed`] or [`Error::RefreshFailed`]; network
//! failures are handed to a [`TransportErrorMapper`]. Token calls are never retried.

pub use oauth2;

// crates.io
use oauth2::{
	AuthUrl, AuthorizationCode, ClientId, ClientSecret, EndpointNotSet, EndpointSet,
	HttpClientError, RedirectUrl, RefreshToken, RequestTokenError, TokenResponse, TokenUrl,
	basic::{BasicClient, BasicErrorResponse, BasicRequestTokenError, BasicTokenResponse},
};
// self
use crate::{
	_prelude::*,
	auth::{Credential, RefreshedToken, TokenSecret},
	config::ClientConfig,
	error::{ConfigError, TransportError},
	http::{ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
	provider::ProviderDescriptor,
};

type ConfiguredBasicClient =
	BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;
type FacadeFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Token grants issued against the token endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenGrant {
	/// `grant_type=authorization_code`.
	AuthorizationCode,
	/// `grant_type=refresh_token`.
	RefreshToken,
}
impl TokenGrant {
	/// Returns the wire value of `grant_type`.
	pub const fn as_str(self) -> &'static str {
		match self {
			TokenGrant::AuthorizationCode => "authorization_code",
			TokenGrant::RefreshToken => "refresh_token",
		}
	}

	/// Builds the grant-specific failure for `reason`.
	pub fn failure(self, reason: impl Into<String>, status: Option<u16>) -> Error {
		let reason = reason.into();

		match self {
			TokenGrant::AuthorizationCode => Error::AuthExchangeFailed { reason, status },
			TokenGrant::RefreshToken => Error::RefreshFailed { reason, status },
		}
	}
}

/// Maps HTTP transport failures into crate [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport into a crate error.
	fn map_transport_error(
		&self,
		grant: TokenGrant,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> Error;
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		grant: TokenGrant,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> Error {
		match err {
			HttpClientError::Reqwest(inner) if inner.is_builder() => grant.failure(
				format!("token request could not be built: {inner}"),
				meta_status(meta),
			),
			HttpClientError::Reqwest(inner) => TransportError::from(*inner).into(),
			HttpClientError::Http(inner) => grant
				.failure(format!("token request could not be built: {inner}"), meta_status(meta)),
			HttpClientError::Io(inner) => TransportError::Io(inner).into(),
			HttpClientError::Other(message) => TransportError::network(std::io::Error::other(
				format!("HTTP client error while calling the token endpoint: {message}"),
			))
			.into(),
			_ => TransportError::network(std::io::Error::other(
				"HTTP client error while calling the token endpoint",
			))
			.into(),
		}
	}
}

pub(crate) trait OAuth2Facade {
	fn exchange_authorization_code<'a, 'code, 'state>(
		&'a self,
		code: &'code str,
		state: &'state str,
		issued_at: OffsetDateTime,
	) -> FacadeFuture<'a, Credential>
	where
		'code: 'a,
		'state: 'a;

	fn refresh_token<'a, 'refresh>(
		&'a self,
		refresh_token: &'refresh TokenSecret,
		issued_at: OffsetDateTime,
	) -> FacadeFuture<'a, RefreshedToken>
	where
		'refresh: 'a;
}

pub(crate) struct BasicFacade<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	oauth_client: ConfiguredBasicClient,
	http_client: Arc<C>,
	error_mapper: Arc<M>,
}
impl<C, M> BasicFacade<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	pub(crate) fn from_config(
		descriptor: &ProviderDescriptor,
		config: &ClientConfig,
		http_client: impl Into<Arc<C>>,
		error_mapper: impl Into<Arc<M>>,
	) -> Result<Self> {
		let auth_url = AuthUrl::new(descriptor.endpoints.authorization.to_string())
			.map_err(ConfigError::from)?;
		let token_url =
			TokenUrl::new(descriptor.endpoints.token.to_string()).map_err(ConfigError::from)?;
		let redirect_url =
			RedirectUrl::new(config.redirect_uri.to_string()).map_err(ConfigError::from)?;
		let oauth_client = BasicClient::new(ClientId::new(config.client_id.clone()))
			.set_client_secret(ClientSecret::new(config.client_secret.expose().to_owned()))
			.set_auth_uri(auth_url)
			.set_token_uri(token_url)
			.set_redirect_uri(redirect_url);

		Ok(Self {
			oauth_client,
			http_client: http_client.into(),
			error_mapper: error_mapper.into(),
		})
	}
}
impl<C, M> OAuth2Facade for BasicFacade<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn exchange_authorization_code<'a, 'code, 'state>(
		&'a self,
		code: &'code str,
		state: &'state str,
		issued_at: OffsetDateTime,
	) -> FacadeFuture<'a, Credential>
	where
		'code: 'a,
		'state: 'a,
	{
		const GRANT: TokenGrant = TokenGrant::AuthorizationCode;

		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let instrumented = self.http_client.with_metadata(meta.clone());
			let mut request =
				self.oauth_client.exchange_code(AuthorizationCode::new(code.to_owned()));

			if !state.is_empty() {
				request = request.add_extra_param("state", state);
			}

			let response = request.request_async(&instrumented).await.map_err(|err| {
				map_request_error(GRANT, meta.take(), err, self.error_mapper.as_ref())
			})?;
			let expires_in = expires_in(GRANT, &response)?;
			let refresh_token = response
				.refresh_token()
				.ok_or_else(|| GRANT.failure("token response is missing refresh_token", None))?;

			Credential::builder()
				.access_token(response.access_token().secret().to_owned())
				.refresh_token(refresh_token.secret().to_owned())
				.issued_at(issued_at)
				.expires_in(expires_in)
				.build()
				.map_err(|err| GRANT.failure(err.to_string(), None))
		})
	}

	fn refresh_token<'a, 'refresh>(
		&'a self,
		refresh_token: &'refresh TokenSecret,
		issued_at: OffsetDateTime,
	) -> FacadeFuture<'a, RefreshedToken>
	where
		'refresh: 'a,
	{
		const GRANT: TokenGrant = TokenGrant::RefreshToken;

		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let instrumented = self.http_client.with_metadata(meta.clone());
			let refresh_secret = RefreshToken::new(refresh_token.expose().to_owned());
			let response = self
				.oauth_client
				.exchange_refresh_token(&refresh_secret)
				.request_async(&instrumented)
				.await
				.map_err(|err| {
					map_request_error(GRANT, meta.take(), err, self.error_mapper.as_ref())
				})?;
			let expires_in = expires_in(GRANT, &response)?;

			Ok(RefreshedToken {
				access_token: TokenSecret::new(response.access_token().secret().to_owned()),
				refresh_token: response
					.refresh_token()
					.map(|token| TokenSecret::new(token.secret().to_owned())),
				issued_at,
				expires_in,
			})
		})
	}
}

fn expires_in(grant: TokenGrant, response: &BasicTokenResponse) -> Result<Duration> {
	let seconds = response
		.expires_in()
		.ok_or_else(|| grant.failure("token response is missing expires_in", None))?
		.as_secs();
	let seconds = i64::try_from(seconds)
		.map_err(|_| grant.failure("token response expires_in is out of range", None))?;

	if seconds <= 0 {
		return Err(grant.failure("token response expires_in must be positive", None));
	}

	Ok(Duration::seconds(seconds))
}

fn map_request_error<E, M>(
	grant: TokenGrant,
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<E>>,
	mapper: &M,
) -> Error
where
	E: 'static + Send + Sync + StdError,
	M: ?Sized + TransportErrorMapper<E>,
{
	let meta_ref = meta.as_ref();

	match err {
		RequestTokenError::ServerResponse(response) =>
			map_server_response_error(grant, response, meta_ref),
		RequestTokenError::Request(error) => mapper.map_transport_error(grant, meta_ref, error),
		RequestTokenError::Parse(error, _body) => grant.failure(
			format!("token response could not be parsed at `{}`: {}", error.path(), error.inner()),
			meta_status(meta_ref),
		),
		RequestTokenError::Other(message) => grant.failure(
			format!("token endpoint returned an unexpected response: {message}"),
			meta_status(meta_ref),
		),
	}
}

fn map_server_response_error(
	grant: TokenGrant,
	response: BasicErrorResponse,
	meta: Option<&ResponseMetadata>,
) -> Error {
	let reason = match response.error_description() {
		Some(description) =>
			format!("provider returned `{}`: {description}", response.error().as_ref()),
		None => format!("provider returned `{}`", response.error().as_ref()),
	};

	grant.failure(reason, meta_status(meta))
}

fn meta_status(meta: Option<&ResponseMetadata>) -> Option<u16> {
	meta.and_then(|value| value.status)
}
