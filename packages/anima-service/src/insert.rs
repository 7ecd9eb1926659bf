use serde::{Deserialize, Serialize};

use crate::{AnimaService, ApiConfig, Error, Result};
use anima_domain::fragment::{self, FragmentMetadata, Timestamp};
use anima_storage::filter::Filter;

#[derive(Clone, Debug, Deserialize)]
pub struct InsertRequest {
	#[serde(rename = "collectionId", default)]
	pub collection_id: String,
	#[serde(default)]
	pub text: String,
	#[serde(default)]
	pub tags: Vec<String>,
	#[serde(default)]
	pub timestamp: Option<Timestamp>,
	/// Position key, `"batch_slice"`.
	#[serde(default, deserialize_with = "crate::wire::position_key")]
	pub index: Option<String>,
	#[serde(default, deserialize_with = "crate::wire::batch_id")]
	pub batch_id: Option<i64>,
	#[serde(default)]
	pub doc_name: Option<String>,
	#[serde(rename = "apiConfig", default)]
	pub api_config: Option<ApiConfig>,
}

#[derive(Clone, Debug, Serialize)]
pub struct InsertResponse {
	pub success: bool,
	#[serde(rename = "vectorId")]
	pub vector_id: String,
}

impl AnimaService {
	/// Upserts one fragment. An existing fragment with the same position key is replaced.
	///
	/// The text is embedded before the collection is touched, so a provider failure leaves
	/// no trace on disk.
	pub async fn insert(&self, req: InsertRequest) -> Result<InsertResponse> {
		let key = crate::collection_key(&req.collection_id)?;

		if req.text.trim().is_empty() {
			return Err(Error::invalid("text is required."));
		}

		let embedding = self.embedding_config(req.api_config.as_ref())?;
		let vector = self.embed(&embedding, &req.text).await?;
		let batch_id = req
			.batch_id
			.or_else(|| req.index.as_deref().map(|index| fragment::position_parts(index).0));
		let metadata = FragmentMetadata {
			text: req.text,
			tags: clean_tags(req.tags),
			timestamp: req.timestamp,
			index: req.index,
			batch_id,
			doc_name: crate::non_blank(req.doc_name.as_deref()).map(str::to_string),
		};
		let vector_id = self
			.writes
			.run(&key, async {
				let handle = self.registry.open(&key, true).await?;

				if let Some(index) = &metadata.index {
					let replaced = handle.delete_where(&Filter::position(index.clone())).await?;

					if replaced.count > 0 {
						tracing::debug!(
							collection = %key,
							index = %index,
							replaced = replaced.count,
							"Replaced fragments at position."
						);
					}
				}

				Ok::<_, Error>(handle.insert(vector, metadata).await?)
			})
			.await?;

		Ok(InsertResponse { success: true, vector_id })
	}
}

fn clean_tags(tags: Vec<String>) -> Vec<String> {
	let mut out: Vec<String> = Vec::with_capacity(tags.len());

	for tag in tags {
		let tag = tag.trim();

		if !tag.is_empty() && !out.iter().any(|seen| seen == tag) {
			out.push(tag.to_string());
		}
	}

	out
}
