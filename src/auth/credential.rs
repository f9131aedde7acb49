//! Access/refresh token pair with expiry bookkeeping, lifecycle helpers, and a builder.

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Credentials with less than this much validity left are refreshed before use.
pub const STALE_WINDOW: Duration = Duration::seconds(60);

/// Lifecycle status for a credential at a given instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CredentialStatus {
	/// More than [`STALE_WINDOW`] of validity remains.
	Fresh,
	/// Still valid, but inside the [`STALE_WINDOW`].
	Stale,
	/// The hard expiry instant has passed.
	Expired,
}

/// Errors produced by [`CredentialBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum CredentialBuilderError {
	/// Issued when no access token value was provided.
	#[error("Access token is required.")]
	MissingAccessToken,
	/// Issued when no refresh token value was provided.
	#[error("Refresh token is required.")]
	MissingRefreshToken,
	/// Issued when no lifetime was configured.
	#[error("Lifetime must be supplied via expires_in.")]
	MissingExpiry,
	/// Issued when the lifetime is zero or negative.
	#[error("The expires_in value must be positive.")]
	NonPositiveExpiry,
}

/// Access/refresh token pair for one authenticated session.
///
/// `issued_at + expires_in` is the hard expiry instant. Refreshing mutates the record in
/// place and keeps the refresh token unless the provider rotates it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
	/// Access token sent as the bearer credential.
	pub access_token: TokenSecret,
	/// Refresh token used to mint new access tokens.
	pub refresh_token: TokenSecret,
	/// Instant the access token was issued.
	pub issued_at: OffsetDateTime,
	/// Lifetime reported by the token endpoint.
	pub expires_in: Duration,
}
impl Credential {
	/// Returns a builder for constructing credentials.
	pub fn builder() -> CredentialBuilder {
		CredentialBuilder::default()
	}

	/// Hard expiry instant.
	pub fn expires_at(&self) -> OffsetDateTime {
		self.issued_at + self.expires_in
	}

	/// Validity left at `now`; negative once expired.
	pub fn remaining_at(&self, now: OffsetDateTime) -> Duration {
		self.expires_in - (now - self.issued_at)
	}

	/// Computes the lifecycle status at a given instant.
	pub fn status_at(&self, now: OffsetDateTime) -> CredentialStatus {
		let remaining = self.remaining_at(now);

		if !remaining.is_positive() {
			CredentialStatus::Expired
		} else if remaining < STALE_WINDOW {
			CredentialStatus::Stale
		} else {
			CredentialStatus::Fresh
		}
	}

	/// Returns `true` when fewer than 60 seconds of validity remain at `now`.
	pub fn is_stale_at(&self, now: OffsetDateTime) -> bool {
		!matches!(self.status_at(now), CredentialStatus::Fresh)
	}

	/// Returns `true` when the hard expiry instant has passed at `now`.
	pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
		matches!(self.status_at(now), CredentialStatus::Expired)
	}

	/// Applies a refresh grant in place.
	///
	/// The refresh token is replaced only when the provider returned a new one.
	pub fn apply_refresh(&mut self, grant: RefreshedToken) {
		self.access_token = grant.access_token;
		self.issued_at = grant.issued_at;
		self.expires_in = grant.expires_in;

		if let Some(rotated) = grant.refresh_token {
			self.refresh_token = rotated;
		}
	}
}
impl Debug for Credential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credential")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &"<redacted>")
			.field("issued_at", &self.issued_at)
			.field("expires_in", &self.expires_in)
			.finish()
	}
}

/// Token endpoint answer to a `refresh_token` grant.
#[derive(Clone, Debug)]
pub struct RefreshedToken {
	/// Newly minted access token.
	pub access_token: TokenSecret,
	/// Rotated refresh token, when the provider issued one.
	pub refresh_token: Option<TokenSecret>,
	/// Instant the access token was issued.
	pub issued_at: OffsetDateTime,
	/// Lifetime reported by the token endpoint.
	pub expires_in: Duration,
}

/// Builder for [`Credential`].
#[derive(Clone, Debug, Default)]
pub struct CredentialBuilder {
	access_token: Option<TokenSecret>,
	refresh_token: Option<TokenSecret>,
	issued_at: Option<OffsetDateTime>,
	expires_in: Option<Duration>,
}
impl CredentialBuilder {
	/// Provides the access token value.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.access_token = Some(TokenSecret::new(token));

		self
	}

	/// Provides the refresh token value.
	pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(token));

		self
	}

	/// Sets the issued-at instant (defaults to the current clock).
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Sets the lifetime relative to the issued-at instant.
	pub fn expires_in(mut self, duration: Duration) -> Self {
		self.expires_in = Some(duration);

		self
	}

	/// Sets the lifetime in whole seconds.
	pub fn expires_in_seconds(self, seconds: i64) -> Self {
		self.expires_in(Duration::seconds(seconds))
	}

	/// Consumes the builder and produces a [`Credential`].
	pub fn build(self) -> Result<Credential, CredentialBuilderError> {
		let access_token = self.access_token.ok_or(CredentialBuilderError::MissingAccessToken)?;
		let refresh_token =
			self.refresh_token.ok_or(CredentialBuilderError::MissingRefreshToken)?;
		let expires_in = self.expires_in.ok_or(CredentialBuilderError::MissingExpiry)?;

		if !expires_in.is_positive() {
			return Err(CredentialBuilderError::NonPositiveExpiry);
		}

		Ok(Credential {
			access_token,
			refresh_token,
			issued_at: self.issued_at.unwrap_or_else(OffsetDateTime::now_utc),
			expires_in,
		})
	}
}
