//! Refresh grants and lazy refresh-on-access.
//!
//! [`TokenManager::valid_token`] is the only sanctioned way to read a bearer token: it
//! holds the session lock for the whole check-and-refresh sequence, refreshes when fewer
//! than 60 seconds of validity remain, and writes the refreshed credential back in place.
//! Concurrent callers on the same session therefore trigger at most one refresh.

mod metrics;

pub use metrics::RefreshMetrics;

// self
use crate::{
	_prelude::*,
	auth::{Credential, TokenSecret},
	flows::TokenManager,
	http::TokenHttpClient,
	oauth::{OAuth2Facade, TokenGrant, TransportErrorMapper},
	obs::{self, FlowKind},
	session::Session,
};

impl<C, M> TokenManager<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Posts the stored refresh token and returns the updated credential.
	///
	/// The refresh token is retained unless the provider rotates it.
	pub async fn refresh(&self, credential: &Credential) -> Result<Credential> {
		self.refresh_at(credential, OffsetDateTime::now_utc()).await
	}

	/// [`refresh`](Self::refresh) with an explicit clock reading used as the new
	/// `issued_at`.
	pub async fn refresh_at(&self, credential: &Credential, now: OffsetDateTime) -> Result<Credential> {
		obs::observe(FlowKind::Refresh, "refresh", async move {
			self.refresh_metrics.record_attempt();

			let result = self.refresh_inner(credential, now).await;

			self.refresh_metrics.record_outcome(result.is_ok());

			result
		})
		.await
	}

	/// Returns a bearer token with at least 60 seconds of validity, refreshing the session's
	/// credential first when needed.
	pub async fn valid_token(&self, session: &Session) -> Result<TokenSecret> {
		self.valid_token_at(session, OffsetDateTime::now_utc()).await
	}

	/// [`valid_token`](Self::valid_token) evaluated at `now`.
	pub async fn valid_token_at(&self, session: &Session, now: OffsetDateTime) -> Result<TokenSecret> {
		let mut state = session.lock().await;
		let (token, credential) = self.ensure_valid_at(state.credential.clone(), now).await?;

		state.credential = Some(credential);

		Ok(token)
	}

	/// Value-level form of [`valid_token`](Self::valid_token): returns the token to use and
	/// the possibly updated credential the caller must store.
	///
	/// `None` means the session was never authorized and yields
	/// [`Error::NotAuthenticated`].
	pub async fn ensure_valid_at(
		&self,
		credential: Option<Credential>,
		now: OffsetDateTime,
	) -> Result<(TokenSecret, Credential)> {
		let credential = credential.ok_or(Error::NotAuthenticated)?;

		if !credential.is_stale_at(now) {
			self.refresh_metrics.record_reuse();

			return Ok((credential.access_token.clone(), credential));
		}

		let refreshed = self.refresh_at(&credential, now).await?;

		Ok((refreshed.access_token.clone(), refreshed))
	}

	async fn refresh_inner(&self, credential: &Credential, now: OffsetDateTime) -> Result<Credential> {
		let facade = self.facade()?;
		let grant = facade.refresh_token(&credential.refresh_token, now).await?;
		let mut updated = credential.clone();

		updated.apply_refresh(grant);

		if updated.is_stale_at(now) {
			return Err(TokenGrant::RefreshToken
				.failure("refreshed credential expires within the stale window", None));
		}

		Ok(updated)
	}
}
