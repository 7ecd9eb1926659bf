//! Parallel nearest-neighbour queries over several collections.

use std::{sync::Arc, time::Duration};

use anima_domain::fragment::RetrievalResult;
use anima_storage::{filter::Filter, index::LocalIndex};

/// Width of the shared candidate pool used by the echo cache.
pub const POOL_SIZE: usize = 50;

/// One queried collection and the id the client used for it.
#[derive(Clone, Debug)]
pub struct Source {
	pub collection_id: String,
	pub index: Arc<LocalIndex>,
}

/// Queries every source concurrently and returns the global top `k` by score.
///
/// A source that fails or exceeds `timeout` contributes nothing. Ties keep source order.
pub async fn query(
	sources: &[Source],
	vector: &[f32],
	k: usize,
	filter: Option<&Filter>,
	timeout: Duration,
) -> Vec<RetrievalResult> {
	if k == 0 || sources.is_empty() {
		return Vec::new();
	}

	let per_source = sources.iter().map(|source| query_one(source, vector, k, filter, timeout));
	let mut merged: Vec<RetrievalResult> =
		futures::future::join_all(per_source).await.into_iter().flatten().collect();

	merged.sort_by(|lhs, rhs| rhs.score.total_cmp(&lhs.score));
	merged.truncate(k);

	merged
}

/// [`query`] capped at [`POOL_SIZE`].
pub async fn query_pool(
	sources: &[Source],
	vector: &[f32],
	filter: Option<&Filter>,
	timeout: Duration,
) -> Vec<RetrievalResult> {
	query(sources, vector, POOL_SIZE, filter, timeout).await
}

async fn query_one(
	source: &Source,
	vector: &[f32],
	k: usize,
	filter: Option<&Filter>,
	timeout: Duration,
) -> Vec<RetrievalResult> {
	match tokio::time::timeout(timeout, source.index.query(vector, k, filter)).await {
		Ok(Ok(hits)) => hits
			.into_iter()
			.map(|hit| RetrievalResult::new(hit.fragment, hit.score, source.collection_id.clone()))
			.collect(),
		Ok(Err(err)) => {
			tracing::warn!(
				error = %err,
				collection = %source.collection_id,
				"Collection query failed. Skipping it."
			);

			Vec::new()
		},
		Err(_) => {
			tracing::warn!(
				collection = %source.collection_id,
				timeout_ms = timeout.as_millis() as u64,
				"Collection query timed out. Skipping it."
			);

			Vec::new()
		},
	}
}
