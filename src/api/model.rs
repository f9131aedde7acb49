//! Payload shapes returned by the music-streaming API.

// self
use crate::{_prelude::*, aggregate::AttributeRecord, session::UserProfile};

/// Image attached to a profile or playlist.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
	/// Image location.
	pub url: Url,
	/// Height in pixels.
	#[serde(default)]
	pub height: Option<u32>,
	/// Width in pixels.
	#[serde(default)]
	pub width: Option<u32>,
}

/// Answer of `GET me`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfilePayload {
	/// User identifier.
	pub id: String,
	/// Display name, when set.
	#[serde(default)]
	pub display_name: Option<String>,
	/// Profile images, largest first.
	#[serde(default)]
	pub images: Vec<Image>,
}
impl From<ProfilePayload> for UserProfile {
	fn from(payload: ProfilePayload) -> Self {
		Self {
			user_id: payload.id,
			display_name: payload.display_name,
			avatar_url: payload.images.into_iter().next().map(|image| image.url),
		}
	}
}

/// Reference to a playlist's track listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackListing {
	/// Number of entries in the playlist.
	#[serde(default)]
	pub total: u64,
}

/// Simplified playlist returned by `GET me/playlists`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playlist {
	/// Playlist identifier.
	pub id: String,
	/// Playlist name.
	pub name: String,
	/// Playlist URI.
	#[serde(default)]
	pub uri: String,
	/// Free-form description.
	#[serde(default)]
	pub description: Option<String>,
	/// Cover images.
	#[serde(default)]
	pub images: Vec<Image>,
	/// Track count.
	#[serde(default)]
	pub tracks: Option<TrackListing>,
}

/// Credited artist.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artist {
	/// Artist name.
	pub name: String,
}

/// Track inside a playlist entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
	/// Track identifier; local files have none.
	#[serde(default)]
	pub id: Option<String>,
	/// Track name.
	pub name: String,
	/// Track URI.
	#[serde(default)]
	pub uri: String,
	/// Duration in milliseconds.
	#[serde(default)]
	pub duration_ms: u64,
	/// Credited artists.
	#[serde(default)]
	pub artists: Vec<Artist>,
}

/// One entry of `GET playlists/{id}/tracks`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistItem {
	/// Timestamp the entry was added, as sent by the server.
	#[serde(default)]
	pub added_at: Option<String>,
	/// The track; `None` when it is no longer available.
	#[serde(default)]
	pub track: Option<Track>,
}
impl PlaylistItem {
	/// Identifier used for auxiliary lookups.
	pub fn track_id(&self) -> Option<&str> {
		self.track.as_ref().and_then(|track| track.id.as_deref())
	}

	/// URI of the contained track.
	pub fn track_uri(&self) -> Option<&str> {
		self.track.as_ref().map(|track| track.uri.as_str()).filter(|uri| !uri.is_empty())
	}
}

/// Answer of `GET audio-features?ids=…`; unknown tracks come back as `null`.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct AudioFeaturesPayload {
	/// One slot per requested identifier, in request order.
	pub audio_features: Vec<Option<AttributeRecord>>,
}

/// Answer of a playlist write.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotPayload {
	/// Playlist version identifier after the write.
	pub snapshot_id: String,
}
