//! Ordered, de-duplicated scope lists requested during authorization.

// crates.io
use serde::{Deserializer, de::Error as DeError};
// self
use crate::_prelude::*;

/// Rejected scope entry.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ScopeError {
	/// Blank entry.
	#[error("Scope entries cannot be empty.")]
	Empty,
	/// Entry with embedded whitespace, which would split it on the consent page.
	#[error("Scope contains whitespace: {scope}.")]
	ContainsWhitespace {
		/// The offending scope string.
		scope: String,
	},
}

/// Scope list that keeps the caller's order and drops duplicates.
///
/// The consent URL lists scopes exactly in this order, joined by single spaces.
#[derive(Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "Vec<String>")]
pub struct ScopeList(Vec<String>);
impl ScopeList {
	/// Creates a validated scope list from any iterator.
	pub fn new<I, S>(scopes: I) -> Result<Self, ScopeError>
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let mut list = Self::default();

		for scope in scopes.into_iter().map(Into::into) {
			if scope.is_empty() {
				return Err(ScopeError::Empty);
			}
			if scope.contains(char::is_whitespace) {
				return Err(ScopeError::ContainsWhitespace { scope });
			}
			if !list.contains(&scope) {
				list.0.push(scope);
			}
		}

		Ok(list)
	}

	/// Number of scopes.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Whether the list requests nothing.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Returns true if the list contains the provided scope.
	pub fn contains(&self, scope: &str) -> bool {
		self.0.iter().any(|candidate| candidate == scope)
	}

	/// Space-delimited representation used for the `scope` query parameter.
	pub fn joined(&self) -> String {
		self.0.join(" ")
	}
}
impl Debug for ScopeList {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("ScopeList").field(&self.0).finish()
	}
}
impl Display for ScopeList {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.joined())
	}
}
impl From<ScopeList> for Vec<String> {
	fn from(value: ScopeList) -> Self {
		value.0
	}
}
impl FromStr for ScopeList {
	type Err = ScopeError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		if s.is_empty() {
			return Ok(Self::default());
		}
		match s.trim() {
			"" => Err(ScopeError::Empty),
			_ => Self::new(s.split_whitespace()),
		}
	}
}
impl<'de> Deserialize<'de> for ScopeList {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		#[derive(Deserialize)]
		#[serde(untagged)]
		enum Raw {
			Joined(String),
			List(Vec<String>),
		}

		match Raw::deserialize(deserializer)? {
			Raw::Joined(value) => value.parse().map_err(DeError::custom),
			Raw::List(values) => ScopeList::new(values).map_err(DeError::custom),
		}
	}
}
