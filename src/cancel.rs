//! Cooperative cancellation checked between page and batch boundaries.

// std
use std::sync::atomic::{AtomicBool, Ordering};
// self
use crate::_prelude::*;

/// Cloneable flag a caller flips to abort an in-flight collection or aggregation.
///
/// Requests already on the wire finish; the next boundary check returns
/// [`Error::Cancelled`]. Dropping the operation's future aborts immediately instead.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);
impl CancelToken {
	/// Creates an un-cancelled token.
	pub fn new() -> Self {
		Self::default()
	}

	/// Requests cancellation.
	pub fn cancel(&self) {
		self.0.store(true, Ordering::Release);
	}

	/// Returns `true` once [`cancel`](Self::cancel) has been called.
	pub fn is_cancelled(&self) -> bool {
		self.0.load(Ordering::Acquire)
	}

	/// Fails with [`Error::Cancelled`] when cancellation was requested.
	pub fn check(&self) -> Result<()> {
		if self.is_cancelled() { Err(Error::Cancelled) } else { Ok(()) }
	}
}

pub(crate) fn checkpoint(token: Option<&CancelToken>) -> Result<()> {
	token.map_or(Ok(()), CancelToken::check)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn clones_share_the_flag() {
		let token = CancelToken::new();
		let observer = token.clone();

		assert!(checkpoint(Some(&observer)).is_ok());

		token.cancel();

		assert!(matches!(checkpoint(Some(&observer)), Err(Error::Cancelled)));
		assert!(checkpoint(None).is_ok());
	}
}
