//! Crate-level error types shared by the token lifecycle, retry wrapper, collector, and
//! aggregator.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
///
/// Transport and HTTP failures are retried inside the retry wrapper and only reach callers
/// wrapped in [`Error::RequestExhausted`]; every other variant propagates untouched.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Network-level failure (DNS, TCP, TLS, timeout).
	#[error(transparent)]
	TransportFailure(#[from] TransportError),
	/// Remote API answered with a 4xx/5xx status.
	#[error("Remote API responded with HTTP status {status}.")]
	HttpError {
		/// HTTP status code.
		status: u16,
	},
	/// Every permitted attempt failed.
	#[error("Request failed after {attempts} attempt(s).")]
	RequestExhausted {
		/// Number of attempts issued before giving up.
		attempts: u32,
		/// Failure observed on the final attempt.
		#[source]
		last: Box<Error>,
	},
	/// A 2xx payload did not match the expected shape.
	#[error("Response payload could not be decoded.")]
	Decode(#[from] serde_path_to_error::Error<serde_json::Error>),

	/// Authorization code exchange was rejected or returned a malformed payload.
	#[error("Authorization code exchange failed: {reason}.")]
	AuthExchangeFailed {
		/// Provider- or crate-supplied reason string.
		reason: String,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Refresh grant was rejected or returned a malformed payload.
	#[error("Token refresh failed: {reason}.")]
	RefreshFailed {
		/// Provider- or crate-supplied reason string.
		reason: String,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// The session holds no credential.
	#[error("Session is not authenticated.")]
	NotAuthenticated,

	/// Caller supplied an argument outside the accepted range.
	#[error("Invalid argument: {reason}.")]
	InvalidArgument {
		/// Human-readable description of the violated constraint.
		reason: String,
	},
	/// A requested attribute is absent from an auxiliary record.
	#[error("Attribute `{attribute}` is missing from record `{record}`.")]
	AttributeMissing {
		/// Attribute name that was requested.
		attribute: String,
		/// Identifier of the offending record (or its position when it has none).
		record: String,
	},
	/// Aggregation was asked to summarize zero records.
	#[error("Cannot summarize an empty record set.")]
	EmptyInput,
	/// Caller aborted the operation between page or batch boundaries.
	#[error("Operation was cancelled.")]
	Cancelled,
}
impl Error {
	pub(crate) fn invalid_argument(reason: impl Into<String>) -> Self {
		Self::InvalidArgument { reason: reason.into() }
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Provider descriptor or client configuration contains an invalid URL.
	#[error("Configuration contains an invalid URL.")]
	InvalidUrl {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Provider descriptor failed validation.
	#[error(transparent)]
	InvalidDescriptor(#[from] crate::provider::ProviderDescriptorError),
	/// Redirect handler received a `state` value that was never issued.
	#[error("Authorization state mismatch.")]
	StateMismatch,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
impl From<url::ParseError> for ConfigError {
	fn from(source: url::ParseError) -> Self {
		Self::InvalidUrl { source }
	}
}
impl From<url::ParseError> for Error {
	fn from(source: url::ParseError) -> Self {
		ConfigError::from(source).into()
	}
}
impl From<crate::provider::ProviderDescriptorError> for Error {
	fn from(e: crate::provider::ProviderDescriptorError) -> Self {
		ConfigError::from(e).into()
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the remote API.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the remote API.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
