//! Typed operations against the music-streaming API.
//!
//! Every call obtains its bearer token through [`TokenManager::valid_token`] and goes
//! through the [retry wrapper](crate::retry). List endpoints are walked with the
//! [`Collector`]; audio features are fetched with the [`BatchAggregator`].

pub mod model;

pub use model::*;

// std
use std::marker::PhantomData;
// crates.io
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	aggregate::{
		self, AuxiliaryData, AuxiliaryFuture, AuxiliarySource, BatchAggregator,
		MAX_BATCH_SIZE, SortedView,
	},
	cancel::{self, CancelToken},
	flows::TokenManager,
	http::{ApiHttpClient, ApiMethod, TokenHttpClient},
	oauth::TransportErrorMapper,
	paging::{Collection, Collector, MAX_PAGE_SIZE, Page, PageFuture, PageRequest, PageSource},
	provider::ProviderDescriptor,
	retry::{self, Requester, RetryPolicy},
	session::{Session, UserProfile},
};
#[cfg(feature = "reqwest")]
use crate::{http::ReqwestHttpClient, oauth::ReqwestTransportErrorMapper};

/// Largest number of URIs a single playlist write accepts.
pub const MAX_WRITE_BATCH: usize = 100;

#[cfg(feature = "reqwest")]
/// API client specialized for the crate's default reqwest transport stack.
pub type ReqwestApiClient = ApiClient<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Which attributes [`ApiClient::analyze_playlist`] sorts by and summarizes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisRequest {
	/// Attribute the tracks are sorted by.
	pub sort_key: String,
	/// Attributes to summarize.
	pub attributes: Vec<String>,
	/// Attributes reported as full sequences instead of means.
	pub average_exclude: Vec<String>,
}
impl Default for AnalysisRequest {
	fn default() -> Self {
		Self {
			sort_key: "tempo".into(),
			attributes: ["id", "tempo", "energy", "danceability", "valence", "acousticness"]
				.map(String::from)
				.to_vec(),
			average_exclude: vec!["id".into()],
		}
	}
}

/// Result of [`ApiClient::analyze_playlist`].
#[derive(Clone, Debug, PartialEq)]
pub struct PlaylistAnalysis {
	/// Playlist entries sorted by the requested attribute, plus the attribute summaries.
	pub view: SortedView<PlaylistItem>,
	/// Track URIs in sorted order, ready for [`ApiClient::add_playlist_items`].
	pub track_uris: Vec<String>,
	/// Audio-feature records in playlist order.
	pub features: AuxiliaryData,
}

/// Authenticated client for one provider, shared across sessions.
pub struct ApiClient<C, M>
where
	C: ?Sized + TokenHttpClient + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Token lifecycle manager consulted before every call.
	pub tokens: TokenManager<C, M>,
	/// Retry wrapper around the shared transport.
	pub requester: Requester<C>,
	cancel: Option<CancelToken>,
}
impl<C, M> ApiClient<C, M>
where
	C: ?Sized + TokenHttpClient + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a client that shares the token manager's transport.
	pub fn new(tokens: TokenManager<C, M>, policy: RetryPolicy) -> Self {
		let requester = Requester::new(tokens.http_client.clone(), policy);

		Self { tokens, requester, cancel: None }
	}

	/// Checks `token` between pages and batches of multi-request operations.
	pub fn with_cancel(mut self, token: CancelToken) -> Self {
		self.cancel = Some(token);

		self
	}

	/// Provider endpoints in use.
	pub fn descriptor(&self) -> &ProviderDescriptor {
		&self.tokens.descriptor
	}

	/// Issues one authenticated request and returns the parsed body.
	pub async fn request(
		&self,
		session: &Session,
		method: ApiMethod,
		target: Url,
		query: &[(&str, String)],
		body: Option<Value>,
	) -> Result<Value> {
		let token = self.tokens.valid_token(session).await?;

		self.requester.call(method, target, Some(&token), query, body).await
	}

	/// Issues an authenticated `GET` against a path relative to the API base.
	pub async fn get<T>(&self, session: &Session, path: &str, query: &[(&str, String)]) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let target = self.descriptor().api_url(path)?;

		retry::decode(self.request(session, ApiMethod::Get, target, query, None).await?)
	}

	/// Fetches `me` and caches the profile in `session`.
	pub async fn load_profile(&self, session: &Session) -> Result<UserProfile> {
		let profile = UserProfile::from(self.get::<ProfilePayload>(session, "me", &[]).await?);

		session.set_profile(profile.clone()).await;

		Ok(profile)
	}

	/// Collects the user's playlists; `None` walks every page.
	pub async fn user_playlists(
		&self,
		session: &Session,
		max_items: Option<usize>,
	) -> Result<Collection<Playlist>> {
		let source = ListSource::new(self, session, self.descriptor().api_url("me/playlists")?);

		self.collector(max_items)?.collect(&source).await
	}

	/// Collects the entries of one playlist; `None` walks every page.
	pub async fn playlist_tracks(
		&self,
		session: &Session,
		playlist_id: &str,
		max_items: Option<usize>,
	) -> Result<Collection<PlaylistItem>> {
		let path = format!("playlists/{}/tracks", path_segment(playlist_id)?);
		let source = ListSource::new(self, session, self.descriptor().api_url(&path)?);

		self.collector(max_items)?.collect(&source).await
	}

	/// Fetches audio features for `items` in batches of `batch_size` identifiers.
	///
	/// Entries without a track identifier get no record; unknown tracks are dropped.
	pub async fn audio_features(
		&self,
		session: &Session,
		items: &[PlaylistItem],
		batch_size: usize,
	) -> Result<AuxiliaryData> {
		let source = FeatureSource {
			client: self,
			session,
			target: self.descriptor().api_url("audio-features")?,
		};
		let mut aggregator = BatchAggregator::new(batch_size)?;

		if let Some(token) = &self.cancel {
			aggregator = aggregator.with_cancel(token.clone());
		}

		aggregator
			.fetch_auxiliary(items, |item: &PlaylistItem| item.track_id().map(str::to_owned), &source)
			.await
	}

	/// Collects a whole playlist, fetches its audio features, and sorts and summarizes it.
	pub async fn analyze_playlist(
		&self,
		session: &Session,
		playlist_id: &str,
		request: &AnalysisRequest,
	) -> Result<PlaylistAnalysis> {
		let items = self.playlist_tracks(session, playlist_id, None).await?.items;
		let features = self.audio_features(session, &items, MAX_BATCH_SIZE).await?;
		let attributes = request.attributes.iter().map(String::as_str).collect::<Vec<_>>();
		let average_exclude = request.average_exclude.iter().map(String::as_str).collect::<Vec<_>>();
		let view = aggregate::summarize(
			items,
			|item: &PlaylistItem| item.track_id().map(str::to_owned),
			&features,
			&attributes,
			&request.sort_key,
			&average_exclude,
		)?;
		let track_uris =
			view.items.iter().filter_map(PlaylistItem::track_uri).map(str::to_owned).collect();

		Ok(PlaylistAnalysis { view, track_uris, features })
	}

	/// Appends `uris` to a playlist in batches of [`MAX_WRITE_BATCH`], returning the snapshot
	/// identifier after each batch.
	pub async fn add_playlist_items(
		&self,
		session: &Session,
		playlist_id: &str,
		uris: &[String],
	) -> Result<Vec<String>> {
		if uris.is_empty() {
			return Err(Error::invalid_argument("at least one URI is required"));
		}

		let path = format!("playlists/{}/tracks", path_segment(playlist_id)?);
		let target = self.descriptor().api_url(&path)?;
		let mut snapshots = Vec::with_capacity(uris.len().div_ceil(MAX_WRITE_BATCH));

		for batch in uris.chunks(MAX_WRITE_BATCH) {
			cancel::checkpoint(self.cancel.as_ref())?;

			let body = serde_json::json!({ "uris": batch });
			let value =
				self.request(session, ApiMethod::Post, target.clone(), &[], Some(body)).await?;

			snapshots.push(retry::decode::<SnapshotPayload>(value)?.snapshot_id);
		}

		Ok(snapshots)
	}

	fn collector(&self, max_items: Option<usize>) -> Result<Collector> {
		let collector = match max_items {
			Some(max_items) => Collector::new(MAX_PAGE_SIZE, max_items)?,
			None => Collector::unbounded(MAX_PAGE_SIZE)?,
		};

		Ok(match &self.cancel {
			Some(token) => collector.with_cancel(token.clone()),
			None => collector,
		})
	}
}
impl<C, M> Clone for ApiClient<C, M>
where
	C: ?Sized + TokenHttpClient + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn clone(&self) -> Self {
		Self { tokens: self.tokens.clone(), requester: self.requester.clone(), cancel: self.cancel.clone() }
	}
}
impl<C, M> Debug for ApiClient<C, M>
where
	C: ?Sized + TokenHttpClient + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ApiClient")
			.field("tokens", &self.tokens)
			.field("requester", &self.requester)
			.finish()
	}
}

/// Pages of one list endpoint, authenticated per request.
struct ListSource<'a, C, M, T>
where
	C: ?Sized + TokenHttpClient + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	client: &'a ApiClient<C, M>,
	session: &'a Session,
	first: Url,
	_item: PhantomData<fn() -> T>,
}
impl<'a, C, M, T> ListSource<'a, C, M, T>
where
	C: ?Sized + TokenHttpClient + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn new(client: &'a ApiClient<C, M>, session: &'a Session, first: Url) -> Self {
		Self { client, session, first, _item: PhantomData }
	}
}
impl<C, M, T> PageSource<T> for ListSource<'_, C, M, T>
where
	C: ?Sized + TokenHttpClient + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
	T: DeserializeOwned + Send,
{
	fn fetch_page(&self, request: PageRequest) -> PageFuture<'_, T> {
		Box::pin(async move {
			let (target, query) = match request {
				PageRequest::First { limit, offset } => (
					self.first.clone(),
					vec![("limit", limit.to_string()), ("offset", offset.to_string())],
				),
				PageRequest::Cursor(cursor) => (cursor, Vec::new()),
			};
			let value =
				self.client.request(self.session, ApiMethod::Get, target, &query, None).await?;

			retry::decode::<Page<T>>(value)
		})
	}
}

/// `audio-features` bulk lookup, authenticated per batch.
struct FeatureSource<'a, C, M>
where
	C: ?Sized + TokenHttpClient + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	client: &'a ApiClient<C, M>,
	session: &'a Session,
	target: Url,
}
impl<C, M> AuxiliarySource for FeatureSource<'_, C, M>
where
	C: ?Sized + TokenHttpClient + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn lookup<'a>(&'a self, ids: &'a [String]) -> AuxiliaryFuture<'a> {
		Box::pin(async move {
			let query = [("ids", ids.join(","))];
			let value = self
				.client
				.request(self.session, ApiMethod::Get, self.target.clone(), &query, None)
				.await?;

			Ok(retry::decode::<AudioFeaturesPayload>(value)?.audio_features)
		})
	}
}

fn path_segment(id: &str) -> Result<&str> {
	if id.is_empty() || id.contains(['/', '?', '#']) {
		return Err(Error::invalid_argument(format!("`{id}` is not a valid identifier")));
	}

	Ok(id)
}
