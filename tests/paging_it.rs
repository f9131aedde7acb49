// std
use std::sync::{
	Mutex,
	atomic::{AtomicU32, Ordering},
};
// crates.io
use playlist_stats::{
	cancel::CancelToken,
	error::Error,
	paging::{Collector, Page, PageFuture, PageRequest, PageSource},
	url::Url,
};

/// In-memory list endpoint holding `0..total` and answering with offset cursors.
struct MockPager {
	total: u32,
	calls: AtomicU32,
	requests: Mutex<Vec<PageRequest>>,
	cancel_on_fetch: Option<CancelToken>,
}
impl MockPager {
	fn new(total: u32) -> Self {
		Self { total, calls: AtomicU32::new(0), requests: Mutex::new(Vec::new()), cancel_on_fetch: None }
	}

	fn calls(&self) -> u32 {
		self.calls.load(Ordering::SeqCst)
	}

	fn cursor(offset: u32, limit: u32) -> Url {
		Url::parse(&format!("https://api.example.com/v1/items?offset={offset}&limit={limit}"))
			.expect("Cursor URL should parse.")
	}

	fn page(&self, offset: u32, limit: u32) -> Page<u32> {
		let end = (offset + limit).min(self.total);
		let start = offset.min(end);

		Page {
			items: (start..end).collect(),
			next: (end < self.total).then(|| Self::cursor(end, limit)),
			previous: None,
			total: u64::from(self.total),
			limit: Some(limit),
			offset: Some(u64::from(offset)),
		}
	}
}
impl PageSource<u32> for MockPager {
	fn fetch_page(&self, request: PageRequest) -> PageFuture<'_, u32> {
		self.calls.fetch_add(1, Ordering::SeqCst);
		self.requests.lock().expect("Request log should lock.").push(request.clone());

		if let Some(token) = &self.cancel_on_fetch {
			token.cancel();
		}

		let (offset, limit) = match request {
			PageRequest::First { limit, offset } =>
				(u32::try_from(offset).expect("Offset should fit."), limit),
			PageRequest::Cursor(url) => {
				let value = |key: &str| {
					url.query_pairs()
						.find(|(name, _)| name == key)
						.and_then(|(_, value)| value.parse::<u32>().ok())
						.expect("Cursor should carry numeric offset and limit.")
				};

				(value("offset"), value("limit"))
			},
		};
		let page = self.page(offset, limit);

		Box::pin(async move { Ok(page) })
	}
}

#[tokio::test]
async fn collects_min_of_cap_and_total_in_server_order() {
	for total in [0_u32, 1, 37, 120] {
		for page_size in 1..=50_u32 {
			for max_items in [1_usize, 2, 7, 49, 50, 51, 99, 100, 119, 120, 121, 250] {
				let pager = MockPager::new(total);
				let collection = Collector::new(page_size, max_items)
					.expect("Collector should build.")
					.collect(&pager)
					.await
					.expect("Collection should succeed.");
				let expected_len = max_items.min(total as usize);

				assert_eq!(
					collection.items,
					(0..expected_len as u32).collect::<Vec<_>>(),
					"total={total} page_size={page_size} max_items={max_items}",
				);
				assert_eq!(
					pager.calls() as usize,
					expected_len.div_ceil(page_size as usize).max(1),
					"total={total} page_size={page_size} max_items={max_items}",
				);
				assert_eq!(collection.pages_fetched, pager.calls());
				assert_eq!(collection.total, u64::from(total));
			}
		}
	}
}

#[tokio::test]
async fn stops_at_cap_with_leftover_cursor() {
	let pager = MockPager::new(120);
	let collection = Collector::new(50, 100)
		.expect("Collector should build.")
		.collect(&pager)
		.await
		.expect("Collection should succeed.");

	assert_eq!(collection.len(), 100);
	assert_eq!(pager.calls(), 2);
	assert_eq!(collection.next, Some(MockPager::cursor(100, 50)));

	let requests = pager.requests.lock().expect("Request log should lock.").clone();

	assert_eq!(requests, vec![
		PageRequest::First { limit: 50, offset: 0 },
		PageRequest::Cursor(MockPager::cursor(50, 50)),
	]);
}

#[tokio::test]
async fn unbounded_walks_until_cursor_runs_out() {
	let pager = MockPager::new(173);
	let collection = Collector::unbounded(50)
		.expect("Collector should build.")
		.collect(&pager)
		.await
		.expect("Collection should succeed.");

	assert_eq!(collection.len(), 173);
	assert_eq!(pager.calls(), 4);
	assert!(collection.next.is_none());
}

#[test]
fn zero_cap_is_invalid_argument() {
	assert!(matches!(Collector::new(50, 0), Err(Error::InvalidArgument { .. })));
}

#[tokio::test]
async fn cancellation_is_checked_between_pages() {
	let token = CancelToken::new();
	let mut pager = MockPager::new(120);

	pager.cancel_on_fetch = Some(token.clone());

	let err = Collector::new(50, 120)
		.expect("Collector should build.")
		.with_cancel(token)
		.collect(&pager)
		.await
		.expect_err("Cancelling after the first page should abort the walk.");

	assert!(matches!(err, Error::Cancelled));
	assert_eq!(pager.calls(), 1);
}

#[tokio::test]
async fn cancelled_token_prevents_any_fetch() {
	let token = CancelToken::new();
	let pager = MockPager::new(10);

	token.cancel();

	let err = Collector::new(5, 10)
		.expect("Collector should build.")
		.with_cancel(token)
		.collect(&pager)
		.await
		.expect_err("A cancelled token should abort before fetching.");

	assert!(matches!(err, Error::Cancelled));
	assert_eq!(pager.calls(), 0);
}

struct EmptyLoop;
impl PageSource<u32> for EmptyLoop {
	fn fetch_page(&self, _request: PageRequest) -> PageFuture<'_, u32> {
		Box::pin(async move {
			Ok(Page {
				items: Vec::new(),
				next: Some(MockPager::cursor(0, 50)),
				previous: None,
				total: 10,
				limit: Some(50),
				offset: Some(0),
			})
		})
	}
}

#[tokio::test]
async fn empty_page_with_cursor_ends_the_walk() {
	let collection = Collector::new(50, 10)
		.expect("Collector should build.")
		.collect(&EmptyLoop)
		.await
		.expect("An empty page should end the walk instead of looping.");

	assert!(collection.is_empty());
	assert_eq!(collection.pages_fetched, 1);
}

struct FailsAfterFirst(AtomicU32);
impl PageSource<u32> for FailsAfterFirst {
	fn fetch_page(&self, _request: PageRequest) -> PageFuture<'_, u32> {
		let call = self.0.fetch_add(1, Ordering::SeqCst);

		Box::pin(async move {
			if call == 0 {
				Ok(Page {
					items: vec![1, 2],
					next: Some(MockPager::cursor(2, 2)),
					previous: None,
					total: 4,
					limit: Some(2),
					offset: Some(0),
				})
			} else {
				Err(Error::RequestExhausted {
					attempts: 10,
					last: Box::new(Error::HttpError { status: 503 }),
				})
			}
		})
	}
}

#[tokio::test]
async fn page_failure_propagates() {
	let err = Collector::new(2, 4)
		.expect("Collector should build.")
		.collect(&FailsAfterFirst(AtomicU32::new(0)))
		.await
		.expect_err("A failing page should abort the collection.");

	assert!(matches!(err, Error::RequestExhausted { attempts: 10, .. }));
}

/// Single page whose reported total is far beyond what it actually holds.
struct InflatedTotal;
impl PageSource<u64> for InflatedTotal {
	fn fetch_page(&self, _request: PageRequest) -> PageFuture<'_, u64> {
		Box::pin(async move {
			Ok(Page {
				items: vec![7, 8, 9],
				next: None,
				previous: None,
				total: 1 << 62,
				limit: Some(50),
				offset: Some(0),
			})
		})
	}
}

#[tokio::test]
async fn reported_total_does_not_drive_allocation() {
	let collection = Collector::unbounded(50)
		.expect("Collector should build.")
		.collect(&InflatedTotal)
		.await
		.expect("An inflated total should not abort the walk.");

	assert_eq!(collection.items, vec![7, 8, 9]);
	assert_eq!(collection.total, 1 << 62);
	assert_eq!(collection.pages_fetched, 1);
}
