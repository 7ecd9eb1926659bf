use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{AnimaService, Error, Result};
use anima_domain::fragment::FragmentMetadata;
use anima_storage::filter::{Field, Filter, Scalar};

#[derive(Clone, Debug, Deserialize)]
pub struct MergeRequest {
	#[serde(rename = "sourceIds", default)]
	pub source_ids: Vec<String>,
	#[serde(rename = "targetId", default)]
	pub target_id: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct MergeResponse {
	pub success: bool,
	pub merged: usize,
	/// Source fragments whose payload could not be read.
	pub failed: usize,
}

impl AnimaService {
	/// Copies fragments and their vectors from the sources into the target.
	///
	/// Position keys stay unique in the target: a copied fragment replaces any target
	/// fragment at the same key, and among the sources the last one listed wins.
	pub async fn merge(&self, req: MergeRequest) -> Result<MergeResponse> {
		let target = crate::collection_key(&req.target_id)?;
		let sources = req
			.source_ids
			.iter()
			.filter(|id| !id.trim().is_empty())
			.map(|id| crate::collection_key(id))
			.collect::<Result<Vec<_>>>()?;

		if sources.is_empty() {
			return Err(Error::invalid("sourceIds must name at least one collection."));
		}

		let mut handles = Vec::with_capacity(sources.len());

		for source in &sources {
			handles.push(self.registry.open(source, false).await?);
		}

		let mut entries: Vec<(Vec<f32>, FragmentMetadata)> = Vec::new();
		let mut slot_by_position = HashMap::new();
		let mut failed = 0;

		for handle in &handles {
			for item in handle.items().await {
				let fragment = match handle.read_payload(&item).await {
					Ok(fragment) => fragment,
					Err(err) => {
						tracing::warn!(
							error = %err,
							collection = %handle.name(),
							id = %item.id,
							"Failed to read fragment payload. Skipping it."
						);

						failed += 1;

						continue;
					},
				};
				let entry = (item.vector, fragment.metadata);

				match entry.1.index.clone() {
					Some(position) => match slot_by_position.get(&position) {
						Some(&slot) => entries[slot] = entry,
						None => {
							slot_by_position.insert(position, entries.len());
							entries.push(entry);
						},
					},
					None => entries.push(entry),
				}
			}
		}

		let dimension = entries.first().map(|(vector, _)| vector.len());

		if entries.iter().any(|(vector, _)| Some(vector.len()) != dimension) {
			return Err(Error::invalid("Source collections have different vector dimensions."));
		}

		let positions: Vec<Scalar> = slot_by_position.into_keys().map(Scalar::from).collect();
		let merged = self
			.writes
			.run(&target, async {
				let handle = self.registry.open(&target, true).await?;
				let current = handle.items().await.first().map(|item| item.vector.len());

				if let (Some(current), Some(dimension)) = (current, dimension)
					&& current != dimension
				{
					return Err(Error::invalid(format!(
						"Target collection {target} has {current} dimensions, sources have \
						 {dimension}."
					)));
				}
				if entries.is_empty() {
					return Ok(0);
				}
				if !positions.is_empty() {
					let replaced = Filter::In { field: Field::Index, values: positions };

					handle.delete_where(&replaced).await?;
				}

				Ok(handle.insert_batch(entries).await?.len())
			})
			.await?;

		tracing::info!(collection = %target, merged, failed, "Collections merged.");

		Ok(MergeResponse { success: true, merged, failed })
	}
}
