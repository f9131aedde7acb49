//! Typed per-user session state guarded by a single-writer async mutex.
//!
//! The host's router layer owns session persistence; it hands a [`Session`] to the token
//! manager and API client. The credential inside is only ever mutated while the session
//! lock is held, so two requests for the same user cannot refresh concurrently.

// self
use crate::{_prelude::*, auth::Credential};

/// Profile fields cached after login.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
	/// Provider-side user identifier.
	pub user_id: String,
	/// Display name, when the user set one.
	pub display_name: Option<String>,
	/// URL of the first profile image, when present.
	pub avatar_url: Option<Url>,
}

/// Plain session fields with named optional slots.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
	/// Credential issued by the authorization exchange.
	pub credential: Option<Credential>,
	/// Profile fetched after login.
	pub profile: Option<UserProfile>,
}

/// Shared handle to one user's [`SessionState`].
#[derive(Clone, Debug, Default)]
pub struct Session(Arc<AsyncMutex<SessionState>>);
impl Session {
	/// Creates an empty, unauthenticated session.
	pub fn new() -> Self {
		Self::default()
	}

	/// Restores a session from previously persisted state.
	pub fn from_state(state: SessionState) -> Self {
		Self(Arc::new(AsyncMutex::new(state)))
	}

	/// Stores a freshly exchanged credential.
	pub async fn authorize(&self, credential: Credential) {
		self.0.lock().await.credential = Some(credential);
	}

	/// Returns a copy of the stored credential.
	pub async fn credential(&self) -> Option<Credential> {
		self.0.lock().await.credential.clone()
	}

	/// Stores the profile fetched after login.
	pub async fn set_profile(&self, profile: UserProfile) {
		self.0.lock().await.profile = Some(profile);
	}

	/// Returns a copy of the cached profile.
	pub async fn profile(&self) -> Option<UserProfile> {
		self.0.lock().await.profile.clone()
	}

	/// Returns a copy of the full state for persistence.
	pub async fn snapshot(&self) -> SessionState {
		self.0.lock().await.clone()
	}

	/// Drops every field (logout).
	pub async fn clear(&self) {
		*self.0.lock().await = SessionState::default();
	}

	/// Acquires exclusive access for read-modify-write sequences such as refreshes.
	pub(crate) async fn lock(&self) -> async_lock::MutexGuard<'_, SessionState> {
		self.0.lock().await
	}
}
