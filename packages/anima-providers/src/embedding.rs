use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use crate::{Error, Result, upstream};

/// Embeds one text with an OpenAI-compatible `/embeddings` endpoint.
pub async fn embed(
	cfg: &anima_config::EmbeddingProviderConfig,
	text: &str,
) -> Result<Vec<f32>> {
	let api_key = cfg.api_key.as_deref().filter(|key| !key.trim().is_empty()).ok_or_else(|| {
		Error::InvalidConfig { message: "Embedding API key is missing.".to_string() }
	})?;
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base.trim_end_matches('/'), cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"input": text,
	});
	let res = client
		.post(url)
		.headers(crate::auth_headers(api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let status = res.status();

	if !status.is_success() {
		let raw = res.text().await.unwrap_or_default();
		let message = upstream::extract_message(status.as_u16(), &raw);

		tracing::warn!(
			provider_id = %cfg.provider_id,
			status = status.as_u16(),
			message = %message,
			"Embedding request failed."
		);

		return Err(Error::Upstream { status: status.as_u16(), message });
	}

	let json: Value = res.json().await?;

	parse_embedding_response(json)?.into_iter().next().ok_or_else(|| Error::InvalidResponse {
		message: "Embedding response data array is empty.".to_string(),
	})
}

fn parse_embedding_response(json: Value) -> Result<Vec<Vec<f32>>> {
	let data = json.get("data").and_then(|v| v.as_array()).ok_or_else(|| {
		Error::InvalidResponse { message: "Embedding response is missing data array.".to_string() }
	})?;
	let mut indexed: Vec<(usize, Vec<f32>)> = Vec::with_capacity(data.len());

	for (fallback_index, item) in data.iter().enumerate() {
		let index = item
			.get("index")
			.and_then(|v| v.as_u64())
			.map(|v| v as usize)
			.unwrap_or(fallback_index);
		let embedding = item.get("embedding").and_then(|v| v.as_array()).ok_or_else(|| {
			Error::InvalidResponse {
				message: "Embedding item missing embedding array.".to_string(),
			}
		})?;
		let mut vec = Vec::with_capacity(embedding.len());

		for value in embedding {
			let number = value.as_f64().ok_or_else(|| Error::InvalidResponse {
				message: "Embedding value must be numeric.".to_string(),
			})?;

			vec.push(number as f32);
		}

		indexed.push((index, vec));
	}

	indexed.sort_by_key(|(index, _)| *index);

	Ok(indexed.into_iter().map(|(_, vec)| vec).collect())
}
