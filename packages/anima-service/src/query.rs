use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{
	AnimaService, ApiConfig, Error, Result,
	fanout::Source,
	strategy::{self, StrategyOptions, StrategyOutcome},
};
use anima_domain::{
	fragment::{RetrievalResult, Timestamp},
	strategy::{RawStep, Step},
};

/// One retrieval track: the collections to search and how to rank them.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct TrackContext {
	#[serde(default)]
	pub ids: Vec<String>,
	#[serde(default)]
	pub strategy: Vec<RawStep>,
	/// Overrides `retrieval.min_score` for this track.
	#[serde(default)]
	pub min_score: Option<f32>,
}

/// Per-request overrides for the `[echo]` section.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct EchoOverrides {
	#[serde(default)]
	pub enabled: Option<bool>,
	#[serde(default)]
	pub base_life: Option<i32>,
	#[serde(default)]
	pub important_life: Option<i32>,
	#[serde(default)]
	pub max_total: Option<u32>,
	#[serde(default)]
	pub important_tags: Option<Vec<String>>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct QueryRequest {
	#[serde(rename = "searchText", default)]
	pub search_text: String,
	#[serde(rename = "chatContext", default)]
	pub chat_context: Option<TrackContext>,
	#[serde(rename = "kbContext", default)]
	pub kb_context: Option<TrackContext>,
	/// Position keys the chat track must not return, typically the turns already in the
	/// prompt.
	#[serde(default, deserialize_with = "crate::wire::position_keys")]
	pub ignore_ids: Vec<String>,
	#[serde(rename = "sessionId", default)]
	pub session_id: Option<String>,
	#[serde(default)]
	pub is_swipe: bool,
	#[serde(rename = "echoConfig", default)]
	pub echo_config: Option<EchoOverrides>,
	#[serde(rename = "apiConfig", default)]
	pub api_config: Option<ApiConfig>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QueryItem {
	pub id: String,
	pub text: String,
	pub tags: Vec<String>,
	pub score: f32,
	pub timestamp: Option<Timestamp>,
	pub index: Option<String>,
	pub batch_id: Option<i64>,
	pub doc_name: Option<String>,
	#[serde(rename = "collectionId")]
	pub collection_id: String,
	pub is_echo: bool,
}
impl From<RetrievalResult> for QueryItem {
	fn from(result: RetrievalResult) -> Self {
		let RetrievalResult { fragment, score, collection_id, is_echo } = result;
		let metadata = fragment.metadata;

		Self {
			id: fragment.id,
			text: metadata.text,
			tags: metadata.tags,
			score,
			timestamp: metadata.timestamp,
			index: metadata.index,
			batch_id: metadata.batch_id,
			doc_name: metadata.doc_name,
			collection_id,
			is_echo,
		}
	}
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct QueryResponse {
	pub chat_results: Vec<QueryItem>,
	pub kb_results: Vec<QueryItem>,
	pub debug_logs: Vec<String>,
}

/// A track with its steps resolved.
struct Track {
	ids: Vec<String>,
	steps: Vec<Step>,
	options: StrategyOptions,
}

impl AnimaService {
	/// Dual-track retrieval: chat history and knowledge base run concurrently against one
	/// query embedding. Chat results then pass through the session echo cache.
	pub async fn query(&self, req: QueryRequest) -> Result<QueryResponse> {
		if req.search_text.trim().is_empty() {
			return Err(Error::invalid("searchText is required."));
		}

		let chat = self.track(req.chat_context.as_ref())?;
		let kb = self.track(req.kb_context.as_ref())?;
		let echo = self.echo_settings(req.echo_config.as_ref())?;

		if chat.ids.is_empty() && kb.ids.is_empty() {
			return Ok(QueryResponse::default());
		}

		let embedding = self.embedding_config(req.api_config.as_ref())?;
		let vector = self.embed(&embedding, &req.search_text).await?;
		let (chat_outcome, kb_outcome) = tokio::join!(
			self.run_track(&chat, &vector, &req.ignore_ids),
			self.run_track(&kb, &vector, &[])
		);
		let mut debug_logs = Vec::new();

		debug_logs.extend(chat_outcome.debug_logs.iter().map(|line| format!("chat {line}")));
		debug_logs.extend(kb_outcome.debug_logs.iter().map(|line| format!("kb {line}")));

		let mut chat_results = chat_outcome.results;

		if let Some(settings) = echo
			&& let Some(session_id) = crate::non_blank(req.session_id.as_deref())
			&& !chat.ids.is_empty()
		{
			let cycle = self
				.run_echo_cycle(
					session_id,
					req.is_swipe,
					chat_results,
					&chat_outcome.echo_pool,
					&settings,
				)
				.await;

			chat_results = cycle.results;

			debug_logs.extend(cycle.debug_logs.iter().map(|line| format!("chat {line}")));
		}

		Ok(QueryResponse {
			chat_results: chat_results.into_iter().map(QueryItem::from).collect(),
			kb_results: kb_outcome.results.into_iter().map(QueryItem::from).collect(),
			debug_logs,
		})
	}

	fn track(&self, context: Option<&TrackContext>) -> Result<Track> {
		let mut options = StrategyOptions::from_config(&self.cfg);
		let Some(context) = context else {
			return Ok(Track { ids: Vec::new(), steps: Vec::new(), options });
		};

		if let Some(min_score) = context.min_score {
			if !min_score.is_finite() {
				return Err(Error::invalid("min_score must be a finite number."));
			}

			options.min_score = min_score;
		}

		let mut steps = context
			.strategy
			.iter()
			.cloned()
			.map(Step::try_from)
			.collect::<Result<Vec<_>, _>>()
			.map_err(Error::invalid)?;

		if steps.is_empty() {
			steps = strategy::default_steps(&options.important_marker);
		}

		let mut seen = HashSet::new();
		let ids = context
			.ids
			.iter()
			.map(|id| id.trim())
			.filter(|id| !id.is_empty())
			.filter(|id| anima_storage::names::safe_name(id).is_ok_and(|key| seen.insert(key)))
			.map(str::to_string)
			.collect();

		Ok(Track { ids, steps, options })
	}

	async fn run_track(
		&self,
		track: &Track,
		vector: &[f32],
		exclude_position_keys: &[String],
	) -> StrategyOutcome {
		if track.ids.is_empty() {
			return StrategyOutcome::default();
		}

		let sources = self.sources(&track.ids).await;

		if sources.is_empty() {
			return StrategyOutcome::default();
		}

		let steps = &track.steps;

		strategy::run_strategy(&sources, vector, steps, exclude_position_keys, &track.options).await
	}

	/// Open handles for `ids`. Collections that are missing or fail to open are skipped.
	async fn sources(&self, ids: &[String]) -> Vec<Source> {
		let opened = futures::future::join_all(ids.iter().map(|id| async move {
			match self.registry.open(id, false).await {
				Ok(index) => Some(Source { collection_id: id.clone(), index }),
				Err(anima_storage::Error::NotFound(_)) => {
					tracing::debug!(collection = %id, "Collection does not exist. Skipping it.");

					None
				},
				Err(err) => {
					tracing::warn!(error = %err, collection = %id, "Failed to open collection.");

					None
				},
			}
		}))
		.await;

		opened.into_iter().flatten().collect()
	}
}
