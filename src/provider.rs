//! Provider descriptor: the validated endpoint set for one music-streaming API.
//!
//! Endpoints must use HTTPS. Loopback hosts (`localhost`, `127.0.0.1`, `::1`) may use plain
//! HTTP so local mock servers can stand in for the provider.

pub mod builder;

pub use builder::*;

// self
use crate::_prelude::*;

/// Endpoint set declared by a provider descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEndpoints {
	/// Consent page users are redirected to.
	pub authorization: Url,
	/// Token endpoint used for code exchanges and refreshes.
	pub token: Url,
	/// Base URL that relative API paths (`me`, `audio-features`, ...) are joined onto.
	pub api_base: Url,
}

/// Immutable provider descriptor consumed by the token manager and API client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
	/// Endpoint definitions exposed by the provider.
	pub endpoints: ProviderEndpoints,
}
impl ProviderDescriptor {
	/// Creates a new builder.
	pub fn builder() -> ProviderDescriptorBuilder {
		ProviderDescriptorBuilder::default()
	}

	/// Production Spotify Web API endpoints.
	pub fn spotify() -> Result<Self> {
		Ok(Self::builder()
			.authorization_endpoint(Url::parse("https://accounts.spotify.com/authorize")?)
			.token_endpoint(Url::parse("https://accounts.spotify.com/api/token")?)
			.api_base(Url::parse("https://api.spotify.com/v1/")?)
			.build()?)
	}

	/// Resolves a relative API path against the API base.
	pub fn api_url(&self, path: &str) -> Result<Url> {
		Ok(self.endpoints.api_base.join(path)?)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn spotify_preset_resolves_api_paths() {
		let descriptor = ProviderDescriptor::spotify().expect("Spotify preset should validate.");

		assert_eq!(
			descriptor.api_url("me/playlists").expect("API path should resolve.").as_str(),
			"https://api.spotify.com/v1/me/playlists"
		);
		assert_eq!(
			descriptor.api_url("audio-features").expect("API path should resolve.").as_str(),
			"https://api.spotify.com/v1/audio-features"
		);
	}
}
