//! Fixtures shared by the integration suites.

#![allow(dead_code)]

// crates.io
use httpmock::MockServer;
use playlist_stats::{
	api::{ApiClient, ReqwestApiClient},
	auth::Credential,
	config::ClientConfig,
	flows::ReqwestTokenManager,
	provider::ProviderDescriptor,
	retry::RetryPolicy,
	session::Session,
	url::Url,
};
use time::{Duration, OffsetDateTime};

pub const CLIENT_ID: &str = "client-it";
pub const CLIENT_SECRET: &str = "secret-it";
pub const REDIRECT_URI: &str = "http://localhost:5000/callback";

pub fn url(value: &str) -> Url {
	Url::parse(value).expect("Fixture URL should parse successfully.")
}

pub fn descriptor(server: &MockServer) -> ProviderDescriptor {
	ProviderDescriptor::builder()
		.authorization_endpoint(url(&server.url("/authorize")))
		.token_endpoint(url(&server.url("/api/token")))
		.api_base(url(&server.url("/v1/")))
		.build()
		.expect("Mock provider descriptor should build successfully.")
}

pub fn config() -> ClientConfig {
	ClientConfig::new(CLIENT_ID, CLIENT_SECRET, url(REDIRECT_URI))
}

pub fn token_manager(server: &MockServer) -> ReqwestTokenManager {
	ReqwestTokenManager::new(descriptor(server), config())
}

/// API client with zero retry delay and tight caps so failing tests stay fast.
pub fn api_client(server: &MockServer) -> ReqwestApiClient {
	ApiClient::new(
		token_manager(server),
		RetryPolicy::default()
			.with_read_attempts(3)
			.with_write_attempts(2)
			.with_delay(std::time::Duration::ZERO),
	)
}

pub fn credential(access: &str, refresh: &str, issued_at: OffsetDateTime, lifetime: i64) -> Credential {
	Credential::builder()
		.access_token(access)
		.refresh_token(refresh)
		.issued_at(issued_at)
		.expires_in(Duration::seconds(lifetime))
		.build()
		.expect("Credential fixture should build successfully.")
}

/// Session holding a credential that stays fresh for the whole test.
pub async fn authorized_session(access: &str) -> Session {
	let session = Session::new();

	session.authorize(credential(access, "refresh-it", OffsetDateTime::now_utc(), 3600)).await;

	session
}

pub fn token_body(access: &str, refresh: Option<&str>, expires_in: i64) -> String {
	let mut body = serde_json::json!({
		"access_token": access,
		"token_type": "Bearer",
		"expires_in": expires_in,
		"scope": "user-read-email",
	});

	if let Some(refresh) = refresh {
		body["refresh_token"] = refresh.into();
	}

	body.to_string()
}
