//! Lenient request field decoding. Clients send position keys and batch ids as either
//! strings or numbers.

use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum Loose {
	Int(i64),
	Float(f64),
	Text(String),
}
impl Loose {
	fn into_key(self) -> Option<String> {
		let key = match self {
			Self::Int(value) => value.to_string(),
			Self::Float(value) if value.is_finite() => value.to_string(),
			Self::Float(_) => return None,
			Self::Text(text) => text.trim().to_string(),
		};

		(!key.is_empty()).then_some(key)
	}

	fn into_batch(self) -> Option<i64> {
		match self {
			Self::Int(value) => Some(value),
			Self::Float(value) if value.is_finite() => Some(value.trunc() as i64),
			Self::Float(_) => None,
			Self::Text(text) => leading_integer(text.trim()),
		}
	}
}

/// Position key as a string. Numbers are rendered in decimal; blank strings read as absent.
pub fn position_key<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
	D: Deserializer<'de>,
{
	Ok(Option::<Loose>::deserialize(deserializer)?.and_then(Loose::into_key))
}

/// Batch id as an integer. Strings are read by their leading integer; anything else is absent.
pub fn batch_id<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
	D: Deserializer<'de>,
{
	Ok(Option::<Loose>::deserialize(deserializer)?.and_then(Loose::into_batch))
}

/// List of position keys, each read like [`position_key`]. Blank entries are dropped.
pub fn position_keys<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
	D: Deserializer<'de>,
{
	Ok(Option::<Vec<Loose>>::deserialize(deserializer)?
		.unwrap_or_default()
		.into_iter()
		.filter_map(Loose::into_key)
		.collect())
}

fn leading_integer(text: &str) -> Option<i64> {
	let sign_len = usize::from(text.starts_with(['-', '+']));
	let digits = text[sign_len..].chars().take_while(char::is_ascii_digit).count();

	if digits == 0 {
		return None;
	}

	text[..sign_len + digits].parse().ok()
}

#[cfg(test)]
mod tests {
	use serde::Deserialize;

	#[derive(Deserialize)]
	struct Probe {
		#[serde(default, deserialize_with = "super::position_key")]
		index: Option<String>,
		#[serde(default, deserialize_with = "super::batch_id")]
		batch_id: Option<i64>,
	}

	fn probe(raw: serde_json::Value) -> Probe {
		serde_json::from_value(raw).expect("Probe must decode.")
	}

	#[test]
	fn accepts_strings_and_numbers() {
		let text = probe(serde_json::json!({ "index": "3_1", "batch_id": "3" }));
		let numeric = probe(serde_json::json!({ "index": 7, "batch_id": 3 }));

		assert_eq!(text.index.as_deref(), Some("3_1"));
		assert_eq!(text.batch_id, Some(3));
		assert_eq!(numeric.index.as_deref(), Some("7"));
		assert_eq!(numeric.batch_id, Some(3));
	}

	#[test]
	fn treats_blank_and_garbage_as_absent() {
		let blank = probe(serde_json::json!({ "index": "  ", "batch_id": "abc" }));
		let missing = probe(serde_json::json!({}));
		let null = probe(serde_json::json!({ "index": null, "batch_id": null }));

		assert_eq!(blank.index, None);
		assert_eq!(blank.batch_id, None);
		assert_eq!(missing.index, None);
		assert_eq!(null.batch_id, None);
		assert_eq!(probe(serde_json::json!({ "batch_id": "12abc" })).batch_id, Some(12));
	}
}
