use serde::{Deserialize, Serialize};

use crate::{AnimaService, Result};
use anima_domain::{
	fragment::{RetrievalResult, Timestamp},
	ordering,
};

/// Body of every operation that names a single collection.
#[derive(Clone, Debug, Deserialize)]
pub struct CollectionRequest {
	#[serde(rename = "collectionId", default)]
	pub collection_id: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ViewItem {
	pub id: String,
	pub text: String,
	pub tags: Vec<String>,
	pub timestamp: Option<Timestamp>,
	pub index: Option<String>,
	pub batch_id: Option<i64>,
	pub doc_name: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ViewResponse {
	pub items: Vec<ViewItem>,
	/// Items whose payload could not be read.
	pub failed: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct ExistsResponse {
	pub exists: bool,
	pub count: usize,
}

impl AnimaService {
	pub async fn list(&self) -> Result<Vec<String>> {
		Ok(self.registry.list().await?)
	}

	/// Every fragment of a collection in narrative order.
	pub async fn view(&self, req: CollectionRequest) -> Result<ViewResponse> {
		let key = crate::collection_key(&req.collection_id)?;
		let handle = self.registry.open(&key, false).await?;
		let mut results = Vec::new();
		let mut failed = 0;

		for item in handle.items().await {
			match handle.read_payload(&item).await {
				Ok(fragment) => results.push(RetrievalResult::new(fragment, 0.0, key.as_str())),
				Err(err) => {
					tracing::warn!(
						error = %err,
						collection = %key,
						id = %item.id,
						"Failed to read fragment payload. Skipping it."
					);

					failed += 1;
				},
			}
		}

		ordering::sort_narrative(&mut results);

		let items = results
			.into_iter()
			.map(|result| {
				let fragment = result.fragment;
				let metadata = fragment.metadata;

				ViewItem {
					id: fragment.id,
					text: metadata.text,
					tags: metadata.tags,
					timestamp: metadata.timestamp,
					index: metadata.index,
					batch_id: metadata.batch_id,
					doc_name: metadata.doc_name,
				}
			})
			.collect();

		Ok(ViewResponse { items, failed })
	}

	pub async fn exists(&self, req: CollectionRequest) -> Result<ExistsResponse> {
		let key = crate::collection_key(&req.collection_id)?;

		match self.registry.open(&key, false).await {
			Ok(handle) => Ok(ExistsResponse { exists: true, count: handle.len().await }),
			Err(anima_storage::Error::NotFound(_)) =>
				Ok(ExistsResponse { exists: false, count: 0 }),
			Err(err) => Err(err.into()),
		}
	}
}
