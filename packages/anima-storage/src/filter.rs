use serde::{Deserialize, Serialize};

/// Filterable fields of an indexed item.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
	Tags,
	Index,
	BatchId,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
	Int(i64),
	Text(String),
}
impl From<&str> for Scalar {
	fn from(value: &str) -> Self {
		Self::Text(value.to_string())
	}
}
impl From<String> for Scalar {
	fn from(value: String) -> Self {
		Self::Text(value)
	}
}
impl From<i64> for Scalar {
	fn from(value: i64) -> Self {
		Self::Int(value)
	}
}

/// Metadata kept in the index for filtering.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexedMetadata {
	#[serde(default)]
	pub tags: Vec<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub index: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub batch_id: Option<i64>,
}
impl IndexedMetadata {
	fn values(&self, field: Field) -> Vec<Scalar> {
		match field {
			Field::Tags => self.tags.iter().cloned().map(Scalar::Text).collect(),
			Field::Index => self.index.iter().cloned().map(Scalar::Text).collect(),
			Field::BatchId => self.batch_id.into_iter().map(Scalar::Int).collect(),
		}
	}
}
impl From<&anima_domain::fragment::FragmentMetadata> for IndexedMetadata {
	fn from(metadata: &anima_domain::fragment::FragmentMetadata) -> Self {
		Self {
			tags: metadata.tags.clone(),
			index: metadata.index.clone(),
			batch_id: metadata.batch_id,
		}
	}
}

/// Metadata predicate evaluated per item.
///
/// For the `tags` array, `Equals` means "contains" and `In` means "shares at least one
/// element"; `NotIn` holds when no element is in the set.
#[derive(Clone, Debug, PartialEq)]
pub enum Filter {
	Equals { field: Field, value: Scalar },
	In { field: Field, values: Vec<Scalar> },
	NotIn { field: Field, values: Vec<Scalar> },
	And(Vec<Filter>),
}
impl Filter {
	pub fn tag(label: impl Into<String>) -> Self {
		Self::Equals { field: Field::Tags, value: Scalar::Text(label.into()) }
	}

	pub fn tags_in<I, S>(labels: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self::In { field: Field::Tags, values: texts(labels) }
	}

	pub fn tags_not_in<I, S>(labels: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self::NotIn { field: Field::Tags, values: texts(labels) }
	}

	pub fn position(key: impl Into<String>) -> Self {
		Self::Equals { field: Field::Index, value: Scalar::Text(key.into()) }
	}

	pub fn positions_not_in<I, S>(keys: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self::NotIn { field: Field::Index, values: texts(keys) }
	}

	pub fn batch(batch_id: i64) -> Self {
		Self::Equals { field: Field::BatchId, value: Scalar::Int(batch_id) }
	}

	/// Conjoins two optional filters.
	pub fn all(lhs: Option<Self>, rhs: Option<Self>) -> Option<Self> {
		match (lhs, rhs) {
			(None, other) | (other, None) => other,
			(Some(Self::And(mut parts)), Some(rhs)) => {
				parts.push(rhs);

				Some(Self::And(parts))
			},
			(Some(lhs), Some(rhs)) => Some(Self::And(vec![lhs, rhs])),
		}
	}

	pub fn matches(&self, metadata: &IndexedMetadata) -> bool {
		match self {
			Self::Equals { field, value } => metadata.values(*field).contains(value),
			Self::In { field, values } =>
				metadata.values(*field).iter().any(|value| values.contains(value)),
			Self::NotIn { field, values } =>
				!metadata.values(*field).iter().any(|value| values.contains(value)),
			Self::And(parts) => parts.iter().all(|part| part.matches(metadata)),
		}
	}
}

fn texts<I, S>(values: I) -> Vec<Scalar>
where
	I: IntoIterator<Item = S>,
	S: Into<String>,
{
	values.into_iter().map(|value| Scalar::Text(value.into())).collect()
}
