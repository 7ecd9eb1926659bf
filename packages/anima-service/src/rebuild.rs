use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{AnimaService, ApiConfig, Result};

const PROBE_TEXT: &str = "Connection test.";

#[derive(Clone, Debug, Deserialize)]
pub struct RebuildRequest {
	#[serde(rename = "collectionId", default)]
	pub collection_id: String,
	#[serde(rename = "apiConfig", default)]
	pub api_config: Option<ApiConfig>,
}

#[derive(Clone, Debug, Serialize)]
pub struct RebuildResponse {
	pub success: bool,
	pub rebuilt: usize,
	/// Fragments whose payload could not be read. They keep their old vectors.
	pub failed: usize,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct TestConnectionRequest {
	#[serde(rename = "apiConfig", default)]
	pub api_config: Option<ApiConfig>,
}

#[derive(Clone, Debug, Serialize)]
pub struct TestConnectionResponse {
	pub success: bool,
	pub dimensions: usize,
}

impl AnimaService {
	/// Re-embeds every fragment of a collection in place.
	///
	/// All vectors are computed before the index is written, so a provider failure leaves the
	/// collection untouched.
	pub async fn rebuild(&self, req: RebuildRequest) -> Result<RebuildResponse> {
		let key = crate::collection_key(&req.collection_id)?;
		let embedding = self.embedding_config(req.api_config.as_ref())?;
		let (rebuilt, failed) = self
			.writes
			.run(&key, async {
				let handle = self.registry.open(&key, false).await?;
				let mut vectors = HashMap::new();
				let mut failed = 0;

				for item in handle.items().await {
					let fragment = match handle.read_payload(&item).await {
						Ok(fragment) => fragment,
						Err(err) => {
							tracing::warn!(
								error = %err,
								collection = %key,
								id = %item.id,
								"Failed to read fragment payload. Skipping it."
							);

							failed += 1;

							continue;
						},
					};
					let vector = self.embed(&embedding, &fragment.metadata.text).await?;

					vectors.insert(item.id, vector);
				}

				let rebuilt = handle.replace_vectors(vectors).await?;

				Ok::<_, crate::Error>((rebuilt, failed))
			})
			.await?;

		tracing::info!(collection = %key, rebuilt, failed, "Collection rebuilt.");

		Ok(RebuildResponse { success: true, rebuilt, failed })
	}

	/// Embeds a fixed probe text and reports the vector width.
	pub async fn test_connection(
		&self,
		req: TestConnectionRequest,
	) -> Result<TestConnectionResponse> {
		let embedding = self.embedding_config(req.api_config.as_ref())?;
		let vector = self.embed(&embedding, PROBE_TEXT).await?;

		Ok(TestConnectionResponse { success: true, dimensions: vector.len() })
	}
}
