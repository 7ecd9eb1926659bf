use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};

use crate::{AnimaService, Error, Result};

#[derive(Clone, Debug, Deserialize)]
pub struct ExportRequest {
	#[serde(rename = "collectionId", default)]
	pub collection_id: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct ExportResponse {
	pub success: bool,
	/// Base64 gzip tarball of the collection directory.
	#[serde(rename = "zipData")]
	pub zip_data: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ImportRequest {
	#[serde(rename = "collectionId", default)]
	pub collection_id: String,
	#[serde(rename = "zipData", default)]
	pub zip_data: String,
	#[serde(default)]
	pub force: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct ImportResponse {
	pub success: bool,
	pub count: usize,
}

impl AnimaService {
	pub async fn export(&self, req: ExportRequest) -> Result<ExportResponse> {
		let key = crate::collection_key(&req.collection_id)?;
		let bytes = self.writes.run(&key, self.registry.export(&key)).await?;

		tracing::info!(collection = %key, bytes = bytes.len(), "Collection exported.");

		Ok(ExportResponse { success: true, zip_data: STANDARD.encode(bytes) })
	}

	/// Restores a collection from an archive produced by [`AnimaService::export`].
	pub async fn import(&self, req: ImportRequest) -> Result<ImportResponse> {
		let key = crate::collection_key(&req.collection_id)?;
		let data = req.zip_data.trim();

		if data.is_empty() {
			return Err(Error::invalid("zipData is required."));
		}

		let bytes = STANDARD
			.decode(data)
			.map_err(|err| Error::invalid(format!("zipData is not valid base64: {err}")))?;
		let count = self.writes.run(&key, self.registry.import(&key, bytes, req.force)).await?;

		Ok(ImportResponse { success: true, count })
	}
}
