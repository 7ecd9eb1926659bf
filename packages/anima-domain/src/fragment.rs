use serde::{Deserialize, Serialize};
use time::{
	Date, OffsetDateTime, PrimitiveDateTime, Time, format_description::well_known::Rfc3339,
	macros::format_description,
};

/// Fragment timestamp as clients send it: epoch milliseconds or a date string.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Timestamp {
	Epoch(f64),
	Text(String),
}
impl Timestamp {
	/// Milliseconds since the Unix epoch, or 0 when the value cannot be read.
	pub fn epoch_millis(&self) -> i64 {
		match self {
			Self::Epoch(value) if value.is_finite() => *value as i64,
			Self::Epoch(_) => 0,
			Self::Text(text) => parse_text_millis(text.trim()).unwrap_or(0),
		}
	}
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FragmentMetadata {
	#[serde(default)]
	pub text: String,
	#[serde(default)]
	pub tags: Vec<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub timestamp: Option<Timestamp>,
	/// Position key, `"batch_slice"`.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub index: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub batch_id: Option<i64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub doc_name: Option<String>,
}
impl FragmentMetadata {
	pub fn timestamp_millis(&self) -> i64 {
		self.timestamp.as_ref().map(Timestamp::epoch_millis).unwrap_or(0)
	}

	pub fn position(&self) -> (i64, i64) {
		position_parts(self.index.as_deref().unwrap_or("0_0"))
	}

	pub fn has_tag_ignore_case(&self, candidates: &[String]) -> bool {
		let candidates: Vec<String> = candidates.iter().map(|tag| fold_tag(tag)).collect();

		self.tags.iter().any(|tag| candidates.contains(&fold_tag(tag)))
	}
}

/// A stored fragment without its vector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
	pub id: String,
	pub metadata: FragmentMetadata,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
	pub fragment: Fragment,
	pub score: f32,
	pub collection_id: String,
	#[serde(default)]
	pub is_echo: bool,
}
impl RetrievalResult {
	pub fn new(fragment: Fragment, score: f32, collection_id: impl Into<String>) -> Self {
		Self { fragment, score, collection_id: collection_id.into(), is_echo: false }
	}

	pub fn id(&self) -> &str {
		self.fragment.id.as_str()
	}
}

/// Case-folded form used wherever tags are compared.
pub fn fold_tag(tag: &str) -> String {
	tag.to_lowercase()
}

/// Splits a `"batch_slice"` key. Missing or non-numeric parts read as 0.
pub fn position_parts(key: &str) -> (i64, i64) {
	let mut parts = key.split('_');
	let batch = parts.next().and_then(|part| part.trim().parse().ok()).unwrap_or(0);
	let slice = parts.next().and_then(|part| part.trim().parse().ok()).unwrap_or(0);

	(batch, slice)
}

fn parse_text_millis(text: &str) -> Option<i64> {
	if text.is_empty() {
		return None;
	}
	if let Ok(value) = text.parse::<f64>() {
		return value.is_finite().then_some(value as i64);
	}
	if let Ok(ts) = OffsetDateTime::parse(text, &Rfc3339) {
		return Some(to_millis(ts));
	}

	let datetime = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

	if let Ok(ts) = PrimitiveDateTime::parse(text, datetime) {
		return Some(to_millis(ts.assume_utc()));
	}

	let date = format_description!("[year]-[month]-[day]");

	Date::parse(text, date)
		.ok()
		.map(|day| to_millis(PrimitiveDateTime::new(day, Time::MIDNIGHT).assume_utc()))
}

fn to_millis(ts: OffsetDateTime) -> i64 {
	(ts.unix_timestamp_nanos() / 1_000_000) as i64
}
