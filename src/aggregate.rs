//! Batched auxiliary lookups and the statistics computed over their records.
//!
//! [`BatchAggregator::fetch_auxiliary`] splits an item list into contiguous batches, asks an
//! [`AuxiliarySource`] for the records of each batch's identifiers, and merges the answers
//! in batch order. [`summarize`] then sorts the original items by one numeric attribute and
//! reduces the requested attributes to means or full value sequences.

// self
use crate::{
	_prelude::*,
	cancel::{self, CancelToken},
	obs::{self, FlowKind},
};

/// Largest identifier list the lookup endpoint accepts.
pub const MAX_BATCH_SIZE: usize = 100;

/// Boxed future returned by [`AuxiliarySource::lookup`].
///
/// Each slot answers one requested identifier; `None` marks an identifier the server knows
/// nothing about.
pub type AuxiliaryFuture<'a> =
	Pin<Box<dyn Future<Output = Result<Vec<Option<AttributeRecord>>>> + 'a + Send>>;

/// Bulk lookup endpoint keyed by item identifiers.
pub trait AuxiliarySource
where
	Self: Send + Sync,
{
	/// Fetches the records for one batch of identifiers.
	fn lookup<'a>(&'a self, ids: &'a [String]) -> AuxiliaryFuture<'a>;
}

/// One auxiliary record: a flat mapping of attribute names to JSON values.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeRecord(serde_json::Map<String, Value>);
impl AttributeRecord {
	/// Wraps an attribute map.
	pub fn new(attributes: serde_json::Map<String, Value>) -> Self {
		Self(attributes)
	}

	/// Stable identifier stored under `id`.
	pub fn id(&self) -> Option<&str> {
		self.0.get("id").and_then(Value::as_str)
	}

	/// Raw value of `attribute`.
	pub fn get(&self, attribute: &str) -> Option<&Value> {
		self.0.get(attribute)
	}

	/// Numeric value of `attribute`, when present and numeric.
	pub fn number(&self, attribute: &str) -> Option<f64> {
		self.get(attribute).and_then(Value::as_f64)
	}

	/// Returns the underlying map.
	pub fn into_inner(self) -> serde_json::Map<String, Value> {
		self.0
	}
}
impl From<serde_json::Map<String, Value>> for AttributeRecord {
	fn from(attributes: serde_json::Map<String, Value>) -> Self {
		Self(attributes)
	}
}

/// Records merged across every batch, in batch order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AuxiliaryData {
	records: Vec<AttributeRecord>,
	index: HashMap<String, usize>,
	lookups: u32,
}
impl AuxiliaryData {
	/// Builds merged data from records already in order.
	pub fn from_records(records: Vec<AttributeRecord>) -> Self {
		let mut data = Self::default();

		records.into_iter().for_each(|record| data.push(record));

		data
	}

	/// Records in merge order.
	pub fn records(&self) -> &[AttributeRecord] {
		&self.records
	}

	/// Record answering `id`; the first one wins when the server repeated an identifier.
	pub fn get(&self, id: &str) -> Option<&AttributeRecord> {
		self.index.get(id).map(|&position| &self.records[position])
	}

	/// Number of merged records.
	pub fn len(&self) -> usize {
		self.records.len()
	}

	/// Returns `true` when no record was merged.
	pub fn is_empty(&self) -> bool {
		self.records.is_empty()
	}

	/// Number of lookup calls issued to build this data.
	pub fn lookups(&self) -> u32 {
		self.lookups
	}

	/// Consumes the data, returning the ordered records.
	pub fn into_records(self) -> Vec<AttributeRecord> {
		self.records
	}

	fn push(&mut self, record: AttributeRecord) {
		if let Some(id) = record.id() {
			self.index.entry(id.to_owned()).or_insert(self.records.len());
		}

		self.records.push(record);
	}
}

/// Splits items into lookup batches and merges the answers.
#[derive(Clone, Debug)]
pub struct BatchAggregator {
	batch_size: usize,
	cancel: Option<CancelToken>,
}
impl BatchAggregator {
	/// Creates an aggregator issuing at most `batch_size` identifiers per lookup.
	pub fn new(batch_size: usize) -> Result<Self> {
		if !(1..=MAX_BATCH_SIZE).contains(&batch_size) {
			return Err(Error::invalid_argument(format!(
				"batch size must be between 1 and {MAX_BATCH_SIZE}, got {batch_size}"
			)));
		}

		Ok(Self { batch_size, cancel: None })
	}

	/// Checks `token` before every batch.
	pub fn with_cancel(mut self, token: CancelToken) -> Self {
		self.cancel = Some(token);

		self
	}

	/// Identifiers sent per lookup.
	pub fn batch_size(&self) -> usize {
		self.batch_size
	}

	/// Fetches auxiliary records for `items`.
	///
	/// Items whose identifier cannot be extracted are skipped without aborting their batch;
	/// they simply end up with no record. A batch with no identifiers at all issues no call,
	/// and `None` answers are dropped.
	pub async fn fetch_auxiliary<T, F, S>(
		&self,
		items: &[T],
		extract_id: F,
		source: &S,
	) -> Result<AuxiliaryData>
	where
		T: Sync,
		F: Sync + Fn(&T) -> Option<String>,
		S: ?Sized + AuxiliarySource,
	{
		obs::observe(FlowKind::Aggregate, "fetch_auxiliary", async move {
			let mut data = AuxiliaryData::default();

			for batch in items.chunks(self.batch_size) {
				cancel::checkpoint(self.cancel.as_ref())?;

				let ids = batch
					.iter()
					.filter_map(&extract_id)
					.filter(|id| !id.is_empty())
					.collect::<Vec<_>>();

				if ids.is_empty() {
					continue;
				}

				let records = source.lookup(&ids).await?;

				data.lookups += 1;
				records.into_iter().flatten().for_each(|record| data.push(record));
			}

			Ok(data)
		})
		.await
	}
}
impl Default for BatchAggregator {
	fn default() -> Self {
		Self { batch_size: MAX_BATCH_SIZE, cancel: None }
	}
}

/// Reduction applied to one requested attribute.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttributeSummary {
	/// Arithmetic mean over every record.
	Mean(f64),
	/// Full value sequence, in record order.
	Values(Vec<Value>),
}
impl AttributeSummary {
	/// Returns the mean, if this attribute was averaged.
	pub fn mean(&self) -> Option<f64> {
		match self {
			AttributeSummary::Mean(mean) => Some(*mean),
			AttributeSummary::Values(_) => None,
		}
	}

	/// Returns the value sequence, if this attribute was excluded from averaging.
	pub fn values(&self) -> Option<&[Value]> {
		match self {
			AttributeSummary::Mean(_) => None,
			AttributeSummary::Values(values) => Some(values),
		}
	}
}

/// Items sorted by one attribute plus per-attribute statistics.
#[derive(Clone, Debug, PartialEq)]
pub struct SortedView<T> {
	/// Items in ascending sort-key order; items without a record trail in original order.
	pub items: Vec<T>,
	/// Attribute the items were sorted by.
	pub sort_key: String,
	/// Mean of the sort key across every record.
	pub sort_key_mean: f64,
	/// Summary of every requested attribute.
	pub attributes: BTreeMap<String, AttributeSummary>,
}
impl<T> SortedView<T> {
	/// Summary recorded for `attribute`.
	pub fn attribute(&self, attribute: &str) -> Option<&AttributeSummary> {
		self.attributes.get(attribute)
	}
}

/// Sorts `items` by `sort_key` and summarizes `attributes` over `records`.
///
/// Items are matched to records through `item_id`. Attributes listed in `average_exclude`
/// keep their full value sequence; every other attribute, and the sort key, must be
/// numeric in every record and collapses to its mean.
pub fn summarize<T, F>(
	items: Vec<T>,
	item_id: F,
	records: &AuxiliaryData,
	attributes: &[&str],
	sort_key: &str,
	average_exclude: &[&str],
) -> Result<SortedView<T>>
where
	F: Fn(&T) -> Option<String>,
{
	if records.is_empty() {
		return Err(Error::EmptyInput);
	}

	let sort_values = numeric_column(records, sort_key)?;
	let sort_key_mean = mean(&sort_values);
	let mut summaries = BTreeMap::new();

	for &attribute in attributes {
		if summaries.contains_key(attribute) {
			continue;
		}

		let summary = if average_exclude.contains(&attribute) {
			AttributeSummary::Values(column(records, attribute)?.into_iter().cloned().collect())
		} else {
			AttributeSummary::Mean(mean(&numeric_column(records, attribute)?))
		};

		summaries.insert(attribute.to_owned(), summary);
	}

	let mut by_id = HashMap::with_capacity(records.len());

	for (record, value) in records.records().iter().zip(&sort_values) {
		if let Some(id) = record.id() {
			by_id.entry(id).or_insert(*value);
		}
	}

	let mut keyed = items
		.into_iter()
		.map(|item| (item_id(&item).and_then(|id| by_id.get(id.as_str()).copied()), item))
		.collect::<Vec<_>>();

	// `sort_by` is stable, so ties and unmatched items keep their original order.
	keyed.sort_by(|(left, _), (right, _)| match (left, right) {
		(Some(left), Some(right)) => left.total_cmp(right),
		(Some(_), None) => std::cmp::Ordering::Less,
		(None, Some(_)) => std::cmp::Ordering::Greater,
		(None, None) => std::cmp::Ordering::Equal,
	});

	Ok(SortedView {
		items: keyed.into_iter().map(|(_, item)| item).collect(),
		sort_key: sort_key.to_owned(),
		sort_key_mean,
		attributes: summaries,
	})
}

fn column<'a>(records: &'a AuxiliaryData, attribute: &str) -> Result<Vec<&'a Value>> {
	records
		.records()
		.iter()
		.enumerate()
		.map(|(position, record)| {
			record.get(attribute).ok_or_else(|| Error::AttributeMissing {
				attribute: attribute.to_owned(),
				record: record_label(record, position),
			})
		})
		.collect()
}

fn numeric_column(records: &AuxiliaryData, attribute: &str) -> Result<Vec<f64>> {
	let values = column(records, attribute)?;

	values
		.into_iter()
		.zip(records.records())
		.enumerate()
		.map(|(position, (value, record))| {
			value.as_f64().ok_or_else(|| {
				Error::invalid_argument(format!(
					"attribute `{attribute}` of record `{}` is not numeric",
					record_label(record, position)
				))
			})
		})
		.collect()
}

fn mean(values: &[f64]) -> f64 {
	values.iter().sum::<f64>() / values.len() as f64
}

fn record_label(record: &AttributeRecord, position: usize) -> String {
	record.id().map_or_else(|| format!("#{position}"), str::to_owned)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn record(value: Value) -> AttributeRecord {
		serde_json::from_value(value).expect("Record fixture should deserialize.")
	}

	fn fixture() -> AuxiliaryData {
		AuxiliaryData::from_records(vec![
			record(serde_json::json!({ "id": "a", "tempo": 120.0, "energy": 0.5 })),
			record(serde_json::json!({ "id": "b", "tempo": 90.0, "energy": 0.7 })),
			record(serde_json::json!({ "id": "c", "tempo": 120.0, "energy": 0.9 })),
			record(serde_json::json!({ "id": "d", "tempo": 60, "energy": 0.3 })),
		])
	}

	fn own_id(item: &&str) -> Option<String> {
		Some((*item).to_owned())
	}

	#[test]
	fn excluded_attribute_keeps_full_sequence() {
		let view = summarize(
			vec!["a", "b", "c", "d"],
			own_id,
			&fixture(),
			&["id", "energy"],
			"tempo",
			&["id"],
		)
		.expect("Summary over complete records should succeed.");
		let ids = view.attribute("id").and_then(AttributeSummary::values).expect("Ids should stay a sequence.");

		assert_eq!(ids, ["a", "b", "c", "d"].map(Value::from).as_slice());
		let energy = view.attribute("energy").and_then(AttributeSummary::mean).expect("Energy should be averaged.");

		assert!((energy - 0.6).abs() < 1e-9);
		assert_eq!(view.sort_key_mean, 97.5);
	}

	#[test]
	fn sort_is_ascending_and_stable() {
		let view = summarize(vec!["a", "x", "b", "c", "d"], own_id, &fixture(), &[], "tempo", &[])
			.expect("Sorting should succeed.");

		assert_eq!(view.items, vec!["d", "b", "a", "c", "x"]);
	}

	#[test]
	fn empty_records_are_rejected() {
		let err = summarize(vec!["a"], own_id, &AuxiliaryData::default(), &["energy"], "tempo", &[])
			.expect_err("An empty record set has no mean.");

		assert!(matches!(err, Error::EmptyInput));
	}

	#[test]
	fn missing_attribute_names_the_record() {
		let mut records = fixture().into_records();

		records.push(record(serde_json::json!({ "id": "e", "tempo": 100.0 })));

		let err = summarize(
			Vec::<&str>::new(),
			own_id,
			&AuxiliaryData::from_records(records),
			&["energy"],
			"tempo",
			&[],
		)
		.expect_err("A record without the attribute should fail.");

		assert!(matches!(
			err,
			Error::AttributeMissing { ref attribute, ref record } if attribute == "energy" && record == "e"
		));
	}

	#[test]
	fn non_numeric_average_is_invalid() {
		let err = summarize(Vec::<&str>::new(), own_id, &fixture(), &["id"], "tempo", &[])
			.expect_err("Identifiers cannot be averaged.");

		assert!(matches!(err, Error::InvalidArgument { .. }));
	}

	#[test]
	fn batch_size_is_bounded() {
		assert!(BatchAggregator::new(0).is_err());
		assert!(BatchAggregator::new(101).is_err());
		assert_eq!(BatchAggregator::new(10).expect("Ten is a valid batch size.").batch_size(), 10);
		assert_eq!(BatchAggregator::default().batch_size(), MAX_BATCH_SIZE);
	}

	#[test]
	fn duplicate_ids_resolve_to_first_record() {
		let data = AuxiliaryData::from_records(vec![
			record(serde_json::json!({ "id": "a", "tempo": 1 })),
			record(serde_json::json!({ "id": "a", "tempo": 2 })),
		]);

		assert_eq!(data.get("a").and_then(|record| record.number("tempo")), Some(1.0));
		assert_eq!(data.len(), 2);
	}
}
