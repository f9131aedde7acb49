//! Logs a user in against a mock provider, sorts one of their playlists by tempo, and writes
//! the sorted order back as a new playlist.
//!
//! 1. Build a [`ProviderDescriptor`] and [`ClientConfig`] and hand them to the token manager.
//! 2. Send the user to the consent URL, then exchange the returned code into a [`Session`].
//! 3. Use [`ApiClient::analyze_playlist`] to collect tracks and audio features.
//! 4. Append the sorted URIs to a target playlist with [`ApiClient::add_playlist_items`].

// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use serde_json::json;
// self
use playlist_stats::{
	api::{AnalysisRequest, ApiClient},
	config::ClientConfig,
	flows::ReqwestTokenManager,
	provider::ProviderDescriptor,
	retry::RetryPolicy,
	session::Session,
	url::Url,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let descriptor = ProviderDescriptor::builder()
		.authorization_endpoint(Url::parse(&server.url("/authorize"))?)
		.token_endpoint(Url::parse(&server.url("/api/token"))?)
		.api_base(Url::parse(&server.url("/v1/"))?)
		.build()?;
	let config = ClientConfig::new(
		"demo-client",
		"demo-secret",
		Url::parse("http://localhost:5000/callback")?,
	);
	let tokens = ReqwestTokenManager::new(descriptor, config);
	let client = ApiClient::new(tokens, RetryPolicy::default());
	let request = client.tokens.start_authorization();

	println!("Send your user to {}.", request.authorize_url);

	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"demo-access\",\"token_type\":\"Bearer\",\"expires_in\":3600,\"refresh_token\":\"demo-refresh\"}",
			);
		})
		.await;
	let session = Session::new();

	// Simulate the redirect handler receiving `code` and the echoed `state`.
	client.tokens.complete_authorization(&request, "demo-code", &request.state, &session).await?;
	token_mock.assert_async().await;

	server
		.mock_async(|when, then| {
			when.method(GET).path("/v1/me");
			then.status(200).json_body(json!({ "id": "demo-user", "display_name": "Demo User" }));
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/v1/playlists/demo-playlist/tracks");
			then.status(200).json_body(json!({
				"items": [
					{ "track": { "id": "fast", "name": "Fast", "uri": "spotify:track:fast" } },
					{ "track": { "id": "slow", "name": "Slow", "uri": "spotify:track:slow" } }
				],
				"next": null,
				"total": 2
			}));
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/v1/audio-features");
			then.status(200).json_body(json!({
				"audio_features": [
					{ "id": "fast", "tempo": 174.0, "energy": 0.9, "danceability": 0.6, "valence": 0.7, "acousticness": 0.0 },
					{ "id": "slow", "tempo": 70.0, "energy": 0.2, "danceability": 0.3, "valence": 0.2, "acousticness": 0.8 }
				]
			}));
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(POST).path("/v1/playlists/sorted-playlist/tracks");
			then.status(201).json_body(json!({ "snapshot_id": "demo-snapshot" }));
		})
		.await;

	let profile = client.load_profile(&session).await?;

	println!("Logged in as {}.", profile.display_name.as_deref().unwrap_or(&profile.user_id));

	let analysis =
		client.analyze_playlist(&session, "demo-playlist", &AnalysisRequest::default()).await?;

	println!("Mean tempo: {:.1} BPM.", analysis.view.sort_key_mean);

	for (attribute, summary) in &analysis.view.attributes {
		match summary.mean() {
			Some(mean) => println!("{attribute}: {mean:.3}"),
			None => println!("{attribute}: {:?}", summary.values().unwrap_or_default()),
		}
	}

	let snapshots =
		client.add_playlist_items(&session, "sorted-playlist", &analysis.track_uris).await?;

	println!("Wrote {} tracks; snapshots {snapshots:?}.", analysis.track_uris.len());

	Ok(())
}
