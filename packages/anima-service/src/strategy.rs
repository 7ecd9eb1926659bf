//! Multi-step retrieval over a set of collections.
//!
//! Each step fetches its own inflated candidate list through the fan-out aggregator, then
//! accepts a bounded number of results that no earlier step accepted. The accepted set is
//! returned in narrative order together with the shared candidate pool for the echo cache.

use std::{collections::HashSet, time::Duration};

use serde::Serialize;

use crate::fanout::{self, Source};
use anima_domain::{
	fragment::RetrievalResult,
	ordering,
	strategy::{self as steps, Step, StepKind},
};
use anima_storage::filter::Filter;

#[derive(Clone, Debug)]
pub struct StrategyOptions {
	pub global_multiplier: f32,
	pub min_score: f32,
	pub exemption_slack: f32,
	pub important_marker: String,
	pub query_timeout: Duration,
}
impl StrategyOptions {
	pub fn from_config(cfg: &anima_config::Config) -> Self {
		Self {
			global_multiplier: cfg.retrieval.global_multiplier,
			min_score: cfg.retrieval.min_score,
			exemption_slack: cfg.retrieval.exemption_slack,
			important_marker: cfg.retrieval.important_marker.clone(),
			query_timeout: Duration::from_millis(cfg.storage.query_timeout_ms),
		}
	}
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct StrategyOutcome {
	pub results: Vec<RetrievalResult>,
	pub debug_logs: Vec<String>,
	/// Top candidates under the exclusion filter, used by the echo decision pass.
	pub echo_pool: Vec<RetrievalResult>,
}

/// Strategy used when a track does not send its own.
pub fn default_steps(important_marker: &str) -> Vec<Step> {
	vec![
		Step::Base { count: 2 },
		Step::Important { count: 1, labels: vec![important_marker.to_string()] },
		Step::Diversity { count: 2 },
	]
}

pub async fn run_strategy(
	sources: &[Source],
	vector: &[f32],
	plan: &[Step],
	exclude_position_keys: &[String],
	options: &StrategyOptions,
) -> StrategyOutcome {
	let mut run = Run::new(sources, vector, plan, exclude_position_keys, options);

	for step in plan {
		run.execute(step).await;
	}

	run.finish().await
}

struct Run<'a> {
	sources: &'a [Source],
	vector: &'a [f32],
	options: &'a StrategyOptions,
	exclusion: Option<Filter>,
	functional: HashSet<String>,
	accepted_ids: HashSet<String>,
	important_labels: Vec<String>,
	vibe_tag: Option<String>,
	outcome: StrategyOutcome,
	pool_seeded: bool,
}
impl<'a> Run<'a> {
	fn new(
		sources: &'a [Source],
		vector: &'a [f32],
		plan: &[Step],
		exclude_position_keys: &[String],
		options: &'a StrategyOptions,
	) -> Self {
		let exclusion = (!exclude_position_keys.is_empty())
			.then(|| Filter::positions_not_in(exclude_position_keys.iter().cloned()));

		Self {
			sources,
			vector,
			options,
			exclusion,
			functional: steps::functional_tags(plan, &options.important_marker),
			accepted_ids: HashSet::new(),
			important_labels: Vec::new(),
			vibe_tag: None,
			outcome: StrategyOutcome::default(),
			pool_seeded: false,
		}
	}

	async fn execute(&mut self, step: &Step) {
		let kind = step.kind();
		// Widen by what is already accepted so deduplication cannot starve the step.
		let fetch_k = step.candidate_k(self.options.global_multiplier) + self.accepted_ids.len();
		let candidates = match step {
			Step::Base { .. } => {
				let hits = self.fetch(fetch_k, None).await;

				if !self.pool_seeded {
					self.seed_pool().await;
				}

				hits
			},
			Step::Important { labels, .. }
			| Step::Status { labels, .. }
			| Step::Special { labels, .. } => {
				if kind == StepKind::Important {
					self.important_labels.extend(labels.iter().cloned());
				}

				self.fetch_per_label(fetch_k, labels).await
			},
			Step::Period { labels, .. } if labels.is_empty() => Vec::new(),
			Step::Period { labels, .. } =>
				self.fetch(fetch_k, Some(Filter::tags_in(labels.iter().cloned()))).await,
			Step::Diversity { .. } => {
				let mut excluded = self.important_labels.clone();

				excluded.push(self.options.important_marker.clone());
				excluded.extend(self.vibe_tag.iter().cloned());

				self.fetch(fetch_k, Some(Filter::tags_not_in(excluded))).await
			},
		};
		let fetched = candidates.len();
		let accepted = self.accept(step, candidates);

		if kind == StepKind::Base
			&& accepted > 0
			&& let Some(top) = self.outcome.results.get(self.outcome.results.len() - accepted)
		{
			self.vibe_tag = steps::detect_vibe_tag(&top.fragment.metadata.tags, &self.functional);
		}

		let mut line = format!(
			"[{}] count={} k={} candidates={} accepted={}",
			kind.as_str(),
			step.count(),
			fetch_k,
			fetched,
			accepted
		);

		if !step.labels().is_empty() {
			line.push_str(&format!(" labels={}", step.labels().join(",")));
		}
		if kind == StepKind::Base
			&& let Some(vibe) = &self.vibe_tag
		{
			line.push_str(&format!(" vibe={vibe}"));
		}

		self.outcome.debug_logs.push(line);
	}

	async fn finish(mut self) -> StrategyOutcome {
		if !self.pool_seeded {
			self.seed_pool().await;
		}

		ordering::sort_narrative(&mut self.outcome.results);

		self.outcome
	}

	async fn fetch(&self, k: usize, filter: Option<Filter>) -> Vec<RetrievalResult> {
		let filter = Filter::all(filter, self.exclusion.clone());

		fanout::query(self.sources, self.vector, k, filter.as_ref(), self.options.query_timeout)
			.await
	}

	/// One sub-query per label, run concurrently and concatenated in label order.
	async fn fetch_per_label(&self, k: usize, labels: &[String]) -> Vec<RetrievalResult> {
		let queries = labels.iter().map(|label| self.fetch(k, Some(Filter::tag(label.clone()))));

		futures::future::join_all(queries).await.into_iter().flatten().collect()
	}

	async fn seed_pool(&mut self) {
		self.outcome.echo_pool = fanout::query_pool(
			self.sources,
			self.vector,
			self.exclusion.as_ref(),
			self.options.query_timeout,
		)
		.await;
		self.pool_seeded = true;
	}

	/// Accepts up to the step limit from `candidates`, best score first.
	fn accept(&mut self, step: &Step, mut candidates: Vec<RetrievalResult>) -> usize {
		let limit = step.accept_limit();
		let floor = step.score_floor(self.options.min_score, self.options.exemption_slack);
		let mut accepted = 0;

		candidates.sort_by(|lhs, rhs| rhs.score.total_cmp(&lhs.score));

		for candidate in candidates {
			if accepted == limit {
				break;
			}
			if candidate.score < floor || self.accepted_ids.contains(candidate.id()) {
				continue;
			}

			self.accepted_ids.insert(candidate.id().to_string());
			self.outcome.results.push(candidate);

			accepted += 1;
		}

		accepted
	}
}
