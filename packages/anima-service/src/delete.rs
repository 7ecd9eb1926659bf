use serde::{Deserialize, Serialize};

use crate::{AnimaService, Error, Result};
use anima_storage::{filter::Filter, index::DeleteTally, names};

#[derive(Clone, Debug, Deserialize)]
pub struct DeleteRequest {
	#[serde(rename = "collectionId", default)]
	pub collection_id: String,
	#[serde(default, deserialize_with = "crate::wire::position_key")]
	pub index: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct DeleteBatchRequest {
	#[serde(rename = "collectionId", default)]
	pub collection_id: String,
	#[serde(default, deserialize_with = "crate::wire::batch_id")]
	pub batch_id: Option<i64>,
}

#[derive(Clone, Debug, Serialize)]
pub struct DeleteResponse {
	pub success: bool,
	/// Index entries removed.
	pub count: usize,
	/// Payload files removed from disk.
	#[serde(rename = "physicalCount")]
	pub physical_count: usize,
}
impl From<DeleteTally> for DeleteResponse {
	fn from(tally: DeleteTally) -> Self {
		Self { success: true, count: tally.count, physical_count: tally.physical }
	}
}

#[derive(Clone, Debug, Deserialize)]
pub struct DeleteCollectionRequest {
	#[serde(rename = "collectionId", default)]
	pub collection_id: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct DeleteCollectionResponse {
	pub success: bool,
	pub existed: bool,
}

impl AnimaService {
	/// Removes every fragment stored at a position key.
	pub async fn delete(&self, req: DeleteRequest) -> Result<DeleteResponse> {
		let key = crate::collection_key(&req.collection_id)?;
		let Some(index) = req.index else {
			return Err(Error::invalid("index is required."));
		};

		self.delete_matching(&key, Filter::position(index)).await
	}

	/// Removes every fragment of one batch.
	pub async fn delete_batch(&self, req: DeleteBatchRequest) -> Result<DeleteResponse> {
		let key = crate::collection_key(&req.collection_id)?;
		let Some(batch_id) = req.batch_id else {
			return Err(Error::invalid("batch_id is required."));
		};

		self.delete_matching(&key, Filter::batch(batch_id)).await
	}

	/// Destroys a collection directory and forgets its handle and write queue.
	pub async fn delete_collection(
		&self,
		req: DeleteCollectionRequest,
	) -> Result<DeleteCollectionResponse> {
		if req.collection_id.trim().is_empty() {
			return Err(Error::invalid("collectionId is required."));
		}

		names::ensure_safe_id(&req.collection_id)?;

		let key = crate::collection_key(&req.collection_id)?;
		let existed = self.writes.run(&key, self.registry.remove(&key)).await?;

		self.writes.evict(&key);

		tracing::info!(collection = %key, existed, "Collection deleted.");

		Ok(DeleteCollectionResponse { success: true, existed })
	}

	async fn delete_matching(&self, key: &str, filter: Filter) -> Result<DeleteResponse> {
		let tally = self
			.writes
			.run(key, async {
				let handle = self.registry.open(key, false).await?;

				handle.delete_where(&filter).await
			})
			.await?;

		tracing::debug!(
			collection = %key,
			count = tally.count,
			physical = tally.physical,
			"Fragments deleted."
		);

		Ok(tally.into())
	}
}
