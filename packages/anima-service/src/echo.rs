use anima_domain::{
	echo::{EchoOutcome, EchoSettings},
	fragment::RetrievalResult,
	ordering,
};

use crate::{AnimaService, Error, Result, query::EchoOverrides};

/// What one echo cycle produced.
#[derive(Clone, Debug, Default)]
pub struct EchoCycle {
	pub results: Vec<RetrievalResult>,
	pub debug_logs: Vec<String>,
}

impl AnimaService {
	/// Echo settings for one query, or `None` when echo is disabled.
	pub(crate) fn echo_settings(
		&self,
		overrides: Option<&EchoOverrides>,
	) -> Result<Option<EchoSettings>> {
		let cfg = &self.cfg.echo;
		let overrides = overrides.cloned().unwrap_or_default();

		if !overrides.enabled.unwrap_or(cfg.enabled) {
			return Ok(None);
		}

		let settings = EchoSettings {
			base_life: overrides.base_life.unwrap_or(cfg.base_life),
			important_life: overrides.important_life.unwrap_or(cfg.important_life),
			max_total: overrides.max_total.unwrap_or(cfg.max_total) as usize,
			important_tags: overrides.important_tags.unwrap_or_else(|| cfg.important_tags.clone()),
		};

		if settings.base_life < 1 {
			return Err(Error::invalid("echoConfig.base_life must be at least 1."));
		}
		if settings.important_life < settings.base_life {
			return Err(Error::invalid(
				"echoConfig.important_life must be greater than or equal to base_life.",
			));
		}
		if settings.max_total < 1 {
			return Err(Error::invalid("echoConfig.max_total must be at least 1."));
		}

		Ok(Some(settings))
	}

	/// Runs one echo cycle for `session_id` and returns live plus echoed results in
	/// narrative order.
	///
	/// Failures are logged and the live results come back unchanged.
	pub(crate) async fn run_echo_cycle(
		&self,
		session_id: &str,
		is_swipe: bool,
		live: Vec<RetrievalResult>,
		pool: &[RetrievalResult],
		settings: &EchoSettings,
	) -> EchoCycle {
		let key = match anima_storage::names::session_stem(session_id) {
			Ok(key) => key,
			Err(err) => {
				tracing::warn!(error = %err, session = %session_id, "Echo cycle skipped.");

				return EchoCycle { results: live, debug_logs: Vec::new() };
			},
		};
		let outcome = self
			.session_writes
			.run(&key, self.echo_step(session_id, is_swipe, &live, pool, settings))
			.await;

		match outcome {
			Ok((echoed, debug_logs)) => {
				let mut results = live;

				results.extend(echoed);
				ordering::sort_narrative(&mut results);

				EchoCycle { results, debug_logs }
			},
			Err(err) => {
				tracing::warn!(error = %err, session = %session_id, "Echo cycle failed.");

				EchoCycle { results: live, debug_logs: Vec::new() }
			},
		}
	}

	async fn echo_step(
		&self,
		session_id: &str,
		is_swipe: bool,
		live: &[RetrievalResult],
		pool: &[RetrievalResult],
		settings: &EchoSettings,
	) -> Result<(Vec<RetrievalResult>, Vec<String>)> {
		let mut memory = self.sessions.load(session_id).await?;
		let pre = memory.prepare(is_swipe);
		let decisions = memory.decide(live, pool, settings);
		let registered = memory.register(live, settings);

		memory.last_updated = crate::now_millis();

		self.sessions.persist(session_id, &memory).await?;

		let line = format!(
			"[echo] swipe={} resurrected={} collected={} refreshed={} echoed={} queued={} \
			 exhausted={} forgotten={} registered={} tracked={}",
			is_swipe,
			pre.resurrected,
			pre.collected,
			decisions.count(EchoOutcome::Refreshed),
			decisions.count(EchoOutcome::Echoed),
			decisions.count(EchoOutcome::Queued),
			decisions.count(EchoOutcome::Exhausted),
			decisions.count(EchoOutcome::Forgotten),
			registered,
			memory.len(),
		);

		tracing::debug!(session = %session_id, tracked = memory.len(), "Echo memory persisted.");

		Ok((decisions.echoed, vec![line]))
	}
}
