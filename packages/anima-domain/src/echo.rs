//! Per-conversation echo memory.
//!
//! Each query cycle runs [`EchoMemory::prepare`] before retrieval, then
//! [`EchoMemory::decide`] and [`EchoMemory::register`] once the live results and the shared
//! candidate pool are known. Persistence lives in the storage layer.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::fragment::{Fragment, RetrievalResult};

#[derive(Clone, Debug)]
pub struct EchoSettings {
	pub base_life: i32,
	pub important_life: i32,
	pub max_total: usize,
	pub important_tags: Vec<String>,
}
impl EchoSettings {
	pub fn initial_life(&self, fragment: &Fragment) -> i32 {
		if fragment.metadata.has_tag_ignore_case(&self.important_tags) {
			self.important_life
		} else {
			self.base_life
		}
	}
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EchoMemoryEntry {
	pub fragment: Fragment,
	pub score: f32,
	pub life: i32,
	pub max_life: i32,
	pub collection_id: String,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EchoOutcome {
	Refreshed,
	Echoed,
	Queued,
	Exhausted,
	Forgotten,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PrePass {
	pub resurrected: usize,
	pub collected: usize,
}

#[derive(Clone, Debug, Default)]
pub struct EchoDecisions {
	pub echoed: Vec<RetrievalResult>,
	pub outcomes: Vec<(String, EchoOutcome)>,
}
impl EchoDecisions {
	pub fn count(&self, outcome: EchoOutcome) -> usize {
		self.outcomes.iter().filter(|(_, value)| *value == outcome).count()
	}
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredMemory")]
pub struct EchoMemory {
	#[serde(rename = "lastUpdated")]
	pub last_updated: i64,
	pub memories: BTreeMap<String, EchoMemoryEntry>,
}
impl EchoMemory {
	pub fn len(&self) -> usize {
		self.memories.len()
	}

	pub fn is_empty(&self) -> bool {
		self.memories.is_empty()
	}

	/// Swipes lift exhausted entries to life 1; new turns drop them.
	pub fn prepare(&mut self, is_swipe: bool) -> PrePass {
		let mut pass = PrePass::default();

		if is_swipe {
			for entry in self.memories.values_mut() {
				if entry.life <= 0 {
					entry.life = 1;
					pass.resurrected += 1;
				}
			}
		} else {
			let before = self.memories.len();

			self.memories.retain(|_, entry| entry.life > 0);

			pass.collected = before - self.memories.len();
		}

		pass
	}

	/// Classifies every tracked entry against the live results and the candidate pool.
	///
	/// Pool entries are visited in rank order, so the most relevant tracked fragments claim
	/// echo slots first.
	pub fn decide(
		&mut self,
		live: &[RetrievalResult],
		pool: &[RetrievalResult],
		settings: &EchoSettings,
	) -> EchoDecisions {
		let mut decisions = EchoDecisions::default();
		let live_ids: HashSet<&str> = live.iter().map(RetrievalResult::id).collect();
		let pool_ids: HashSet<&str> = pool.iter().map(RetrievalResult::id).collect();

		for result in live {
			if let Some(entry) = self.memories.get_mut(result.id()) {
				entry.life = entry.max_life;
				entry.score = result.score;
				entry.fragment = result.fragment.clone();

				decisions.outcomes.push((result.id().to_string(), EchoOutcome::Refreshed));
			}
		}

		let mut slots = settings.max_total.saturating_sub(live.len());
		let mut visited = HashSet::new();

		for candidate in pool {
			let id = candidate.id();

			if live_ids.contains(id) || !visited.insert(id) {
				continue;
			}

			let Some(life) = self.memories.get(id).map(|entry| entry.life) else { continue };

			if life <= 0 {
				self.memories.remove(id);
				decisions.outcomes.push((id.to_string(), EchoOutcome::Exhausted));

				continue;
			}
			if let Some(entry) = self.memories.get_mut(id) {
				entry.life -= 1;
				entry.score = candidate.score;
			}

			if slots > 0 {
				slots -= 1;

				let mut echoed = candidate.clone();

				echoed.is_echo = true;

				decisions.echoed.push(echoed);
				decisions.outcomes.push((id.to_string(), EchoOutcome::Echoed));
			} else {
				decisions.outcomes.push((id.to_string(), EchoOutcome::Queued));
			}
		}

		let forgotten: Vec<String> = self
			.memories
			.keys()
			.filter(|id| !live_ids.contains(id.as_str()) && !pool_ids.contains(id.as_str()))
			.cloned()
			.collect();

		for id in forgotten {
			self.memories.remove(&id);
			decisions.outcomes.push((id, EchoOutcome::Forgotten));
		}

		decisions
	}

	/// Starts tracking live results that are not tracked yet. Returns how many were added.
	pub fn register(&mut self, live: &[RetrievalResult], settings: &EchoSettings) -> usize {
		let mut added = 0;

		for result in live {
			if self.memories.contains_key(result.id()) {
				continue;
			}

			let life = settings.initial_life(&result.fragment);

			self.memories.insert(
				result.id().to_string(),
				EchoMemoryEntry {
					fragment: result.fragment.clone(),
					score: result.score,
					life,
					max_life: life,
					collection_id: result.collection_id.clone(),
				},
			);

			added += 1;
		}

		added
	}
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredMemory {
	Current {
		#[serde(rename = "lastUpdated", default)]
		last_updated: i64,
		#[serde(default)]
		memories: StoredEntries,
	},
	Legacy(Vec<EchoMemoryEntry>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredEntries {
	Map(BTreeMap<String, EchoMemoryEntry>),
	List(Vec<EchoMemoryEntry>),
}
impl Default for StoredEntries {
	fn default() -> Self {
		Self::Map(BTreeMap::new())
	}
}

impl From<StoredMemory> for EchoMemory {
	fn from(stored: StoredMemory) -> Self {
		let (last_updated, entries) = match stored {
			StoredMemory::Current { last_updated, memories } => (last_updated, memories),
			StoredMemory::Legacy(list) => (0, StoredEntries::List(list)),
		};
		let memories = match entries {
			StoredEntries::Map(map) => map,
			StoredEntries::List(list) =>
				list.into_iter().map(|entry| (entry.fragment.id.clone(), entry)).collect(),
		};

		Self { last_updated, memories }
	}
}
