//! Cursor pagination over list endpoints.
//!
//! The first request carries `limit`/`offset`; every follow-up request targets the opaque
//! `next` URI the server returned, verbatim. Offsets are never recomputed locally, so the
//! result follows whatever the server's cursor implementation does under concurrent
//! modification.

// self
use crate::{
	_prelude::*,
	cancel::{self, CancelToken},
	obs::{self, FlowKind},
};

/// Largest `limit` list endpoints accept.
pub const MAX_PAGE_SIZE: u32 = 50;

/// Boxed future returned by [`PageSource::fetch_page`].
pub type PageFuture<'a, T> = Pin<Box<dyn Future<Output = Result<Page<T>>> + 'a + Send>>;

/// Anything that can serve pages of `T`.
pub trait PageSource<T>
where
	Self: Send + Sync,
{
	/// Fetches the page described by `request`.
	fn fetch_page(&self, request: PageRequest) -> PageFuture<'_, T>;
}

/// Which page to fetch next.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PageRequest {
	/// Opening request of a collection.
	First {
		/// Page size sent as `limit`.
		limit: u32,
		/// Starting position sent as `offset`.
		offset: u64,
	},
	/// Follow-up request to a server-provided cursor.
	Cursor(Url),
}

/// One page of a list endpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
	/// Items in server order.
	pub items: Vec<T>,
	/// Cursor to the following page; `None` exactly when this is the last page.
	#[serde(default)]
	pub next: Option<Url>,
	/// Cursor to the preceding page.
	#[serde(default)]
	pub previous: Option<Url>,
	/// Total number of items the server holds.
	#[serde(default)]
	pub total: u64,
	/// Page size the server applied.
	#[serde(default)]
	pub limit: Option<u32>,
	/// Offset of the first item on this page.
	#[serde(default)]
	pub offset: Option<u64>,
}

/// Concatenation of fetched pages, in fetch order.
#[derive(Clone, Debug, PartialEq)]
pub struct Collection<T> {
	/// Collected items, capped at the requested maximum.
	pub items: Vec<T>,
	/// Cursor following the last page fetched, when the server has more.
	pub next: Option<Url>,
	/// Total reported by the first page.
	pub total: u64,
	/// Number of page requests issued.
	pub pages_fetched: u32,
}
impl<T> Collection<T> {
	/// Number of collected items.
	pub fn len(&self) -> usize {
		self.items.len()
	}

	/// Returns `true` when nothing was collected.
	pub fn is_empty(&self) -> bool {
		self.items.is_empty()
	}
}

/// Walks a [`PageSource`] until the item cap is met or the cursor runs out.
#[derive(Clone, Debug)]
pub struct Collector {
	page_size: u32,
	max_items: usize,
	cancel: Option<CancelToken>,
}
impl Collector {
	/// Creates a collector fetching `page_size` items per request (capped at
	/// [`MAX_PAGE_SIZE`]) until `max_items` are collected.
	pub fn new(page_size: u32, max_items: usize) -> Result<Self> {
		if page_size == 0 {
			return Err(Error::invalid_argument("page size must be at least 1"));
		}
		if max_items == 0 {
			return Err(Error::invalid_argument("maximum item count must be at least 1"));
		}

		Ok(Self { page_size: page_size.min(MAX_PAGE_SIZE), max_items, cancel: None })
	}

	/// Creates a collector that stops only when the cursor runs out.
	pub fn unbounded(page_size: u32) -> Result<Self> {
		Self::new(page_size, usize::MAX)
	}

	/// Checks `token` before every page request.
	pub fn with_cancel(mut self, token: CancelToken) -> Self {
		self.cancel = Some(token);

		self
	}

	/// Effective page size.
	pub fn page_size(&self) -> u32 {
		self.page_size
	}

	/// Item cap.
	pub fn max_items(&self) -> usize {
		self.max_items
	}

	/// Collects up to `max_items` items from `source`.
	///
	/// Returns `min(max_items, total)` items in server order. A page that arrives empty
	/// ends the walk even if it still carries a cursor.
	pub async fn collect<T, S>(&self, source: &S) -> Result<Collection<T>>
	where
		T: Send,
		S: ?Sized + PageSource<T>,
	{
		obs::observe(FlowKind::Collect, "collect", async move {
			cancel::checkpoint(self.cancel.as_ref())?;

			let mut page =
				source.fetch_page(PageRequest::First { limit: self.page_size, offset: 0 }).await?;
			let mut collection = Collection {
				items: Vec::with_capacity(self.max_items.min(page.items.len())),
				next: None,
				total: page.total,
				pages_fetched: 1,
			};

			loop {
				let remaining = self.max_items - collection.items.len();
				let exhausted = page.items.is_empty();

				collection.items.extend(page.items.into_iter().take(remaining));
				collection.next = page.next;

				if exhausted || collection.items.len() >= self.max_items {
					break;
				}

				let Some(cursor) = collection.next.clone() else {
					break;
				};

				cancel::checkpoint(self.cancel.as_ref())?;

				page = source.fetch_page(PageRequest::Cursor(cursor)).await?;
				collection.pages_fetched += 1;
			}

			Ok(collection)
		})
		.await
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	struct SinglePage;
	impl PageSource<u8> for SinglePage {
		fn fetch_page(&self, request: PageRequest) -> PageFuture<'_, u8> {
			Box::pin(async move {
				assert_eq!(request, PageRequest::First { limit: MAX_PAGE_SIZE, offset: 0 });

				Ok(Page {
					items: vec![1, 2, 3],
					next: None,
					previous: None,
					total: 3,
					limit: Some(MAX_PAGE_SIZE),
					offset: Some(0),
				})
			})
		}
	}

	#[test]
	fn rejects_zero_sizes() {
		assert!(matches!(Collector::new(10, 0), Err(Error::InvalidArgument { .. })));
		assert!(matches!(Collector::new(0, 10), Err(Error::InvalidArgument { .. })));
		assert_eq!(Collector::new(200, 1).expect("Oversized pages should clamp.").page_size(), 50);
	}

	#[tokio::test]
	async fn oversized_page_request_is_clamped() {
		let collection = Collector::new(100, 10)
			.expect("Collector should build.")
			.collect(&SinglePage)
			.await
			.expect("Single page should collect.");

		assert_eq!(collection.items, vec![1, 2, 3]);
		assert_eq!(collection.pages_fetched, 1);
		assert!(collection.next.is_none());
	}

	#[test]
	fn page_deserializes_spotify_shape() {
		let page: Page<Value> = serde_json::from_str(
			r#"{"href":"h","items":[{"id":"a"}],"limit":1,"next":"https://api.example.com/v1/me/playlists?offset=1&limit=1","offset":0,"previous":null,"total":2}"#,
		)
		.expect("Spotify-shaped page should deserialize.");

		assert_eq!(page.total, 2);
		assert_eq!(page.items.len(), 1);
		assert_eq!(
			page.next.as_ref().map(Url::as_str),
			Some("https://api.example.com/v1/me/playlists?offset=1&limit=1")
		);
	}
}
