//! File-backed vector index for one collection.
//!
//! Layout: `index.json` holds the indexed metadata config and every item (id, vector, filterable
//! metadata, payload file name); `<id>.json` holds the full fragment. The in-memory copy is the
//! source of truth for queries and is rewritten to disk after every mutation.

use std::{
	collections::HashMap,
	io::ErrorKind,
	path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
	Error, Result,
	filter::{Filter, IndexedMetadata},
};
use anima_domain::fragment::{Fragment, FragmentMetadata};

pub const INDEX_FILE: &str = "index.json";

const FORMAT_VERSION: u32 = 1;
const INDEXED_FIELDS: [&str; 3] = ["tags", "index", "batch_id"];

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MetadataConfig {
	pub indexed: Vec<String>,
}
impl Default for MetadataConfig {
	fn default() -> Self {
		Self { indexed: INDEXED_FIELDS.iter().map(|field| field.to_string()).collect() }
	}
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexItem {
	pub id: String,
	pub vector: Vec<f32>,
	pub metadata: IndexedMetadata,
	pub metadata_file: String,
}

#[derive(Clone, Debug)]
pub struct ScoredFragment {
	pub fragment: Fragment,
	pub score: f32,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct DeleteTally {
	/// Items removed from the index.
	pub count: usize,
	/// Payload files removed from disk.
	pub physical: usize,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct IndexFile {
	#[serde(default)]
	version: u32,
	#[serde(default)]
	metadata_config: MetadataConfig,
	#[serde(default)]
	items: Vec<IndexItem>,
}

#[derive(Debug)]
pub struct LocalIndex {
	name: String,
	dir: PathBuf,
	state: RwLock<IndexFile>,
}
impl LocalIndex {
	pub async fn exists(dir: &Path) -> bool {
		tokio::fs::try_exists(dir.join(INDEX_FILE)).await.unwrap_or(false)
	}

	/// Opens the index in `dir`, writing an empty one first when none exists.
	pub async fn create(dir: &Path, name: &str) -> Result<Self> {
		tokio::fs::create_dir_all(dir).await?;

		if !Self::exists(dir).await {
			let empty = IndexFile { version: FORMAT_VERSION, ..Default::default() };

			crate::write_json_atomic(&dir.join(INDEX_FILE), &empty).await?;
		}

		Self::open(dir, name).await
	}

	pub async fn open(dir: &Path, name: &str) -> Result<Self> {
		let path = dir.join(INDEX_FILE);
		let raw = tokio::fs::read(&path).await?;
		let state: IndexFile =
			serde_json::from_slice(&raw).map_err(|source| Error::Decode { path, source })?;

		Ok(Self { name: name.to_string(), dir: dir.to_path_buf(), state: RwLock::new(state) })
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn dir(&self) -> &Path {
		&self.dir
	}

	pub async fn len(&self) -> usize {
		self.state.read().await.items.len()
	}

	pub async fn is_empty(&self) -> bool {
		self.len().await == 0
	}

	/// Snapshot of every indexed item, vectors included.
	pub async fn items(&self) -> Vec<IndexItem> {
		self.state.read().await.items.clone()
	}

	pub async fn insert(&self, vector: Vec<f32>, metadata: FragmentMetadata) -> Result<String> {
		let mut ids = self.insert_batch(vec![(vector, metadata)]).await?;

		ids.pop().ok_or_else(|| Error::InvalidArgument("Nothing was inserted.".to_string()))
	}

	/// Stores each fragment under a fresh id. The index file is rewritten once.
	pub async fn insert_batch(
		&self,
		entries: Vec<(Vec<f32>, FragmentMetadata)>,
	) -> Result<Vec<String>> {
		let mut state = self.state.write().await;
		let mut dimension = state.items.first().map(|item| item.vector.len());

		for (vector, _) in &entries {
			check_dimension(&mut dimension, vector.len())?;
		}

		let mut fresh = Vec::with_capacity(entries.len());

		for (vector, metadata) in entries {
			let id = Uuid::new_v4().to_string();
			let metadata_file = format!("{id}.json");
			let fragment = Fragment { id: id.clone(), metadata };

			if let Err(err) =
				crate::write_json_atomic(&self.dir.join(&metadata_file), &fragment).await
			{
				self.remove_payloads(&fresh).await;

				return Err(err);
			}

			fresh.push(IndexItem {
				id,
				vector,
				metadata: IndexedMetadata::from(&fragment.metadata),
				metadata_file,
			});
		}

		let before = state.items.len();

		state.items.extend(fresh);

		if let Err(err) = self.persist(&state).await {
			let orphans: Vec<IndexItem> = state.items.drain(before..).collect();

			self.remove_payloads(&orphans).await;

			return Err(err);
		}

		Ok(state.items[before..].iter().map(|item| item.id.clone()).collect())
	}

	/// Removes every item matching `filter` together with its payload file.
	pub async fn delete_where(&self, filter: &Filter) -> Result<DeleteTally> {
		let mut state = self.state.write().await;
		let (removed, kept): (Vec<IndexItem>, Vec<IndexItem>) = std::mem::take(&mut state.items)
			.into_iter()
			.partition(|item| filter.matches(&item.metadata));

		state.items = kept;

		if removed.is_empty() {
			return Ok(DeleteTally::default());
		}
		if let Err(err) = self.persist(&state).await {
			state.items.extend(removed);

			return Err(err);
		}

		let mut tally = DeleteTally { count: removed.len(), physical: 0 };

		for item in removed {
			match tokio::fs::remove_file(self.dir.join(&item.metadata_file)).await {
				Ok(()) => tally.physical += 1,
				Err(err) if err.kind() == ErrorKind::NotFound => {},
				Err(err) => {
					tracing::warn!(
						error = %err,
						collection = %self.name,
						file = %item.metadata_file,
						"Failed to remove payload file."
					);
				},
			}
		}

		Ok(tally)
	}

	/// Swaps in new vectors by id. Ids that are not indexed are ignored.
	///
	/// The new vectors may change the collection dimension only when they cover every item.
	pub async fn replace_vectors(&self, mut vectors: HashMap<String, Vec<f32>>) -> Result<usize> {
		let mut state = self.state.write().await;
		let covers_all = state.items.iter().all(|item| vectors.contains_key(&item.id));
		let mut dimension =
			if covers_all { None } else { state.items.first().map(|item| item.vector.len()) };

		for item in &state.items {
			if let Some(vector) = vectors.get(&item.id) {
				check_dimension(&mut dimension, vector.len())?;
			}
		}

		let mut previous = Vec::new();

		for item in state.items.iter_mut() {
			if let Some(vector) = vectors.remove(&item.id) {
				previous.push((item.id.clone(), std::mem::replace(&mut item.vector, vector)));
			}
		}

		if let Err(err) = self.persist(&state).await {
			let mut previous: HashMap<String, Vec<f32>> = previous.into_iter().collect();

			for item in state.items.iter_mut() {
				if let Some(vector) = previous.remove(&item.id) {
					item.vector = vector;
				}
			}

			return Err(err);
		}

		Ok(previous.len())
	}

	pub async fn read_payload(&self, item: &IndexItem) -> Result<Fragment> {
		self.read_payload_file(&item.metadata_file).await
	}

	/// Cosine nearest neighbours among items matching `filter`.
	///
	/// Items whose payload file cannot be read are skipped with a warning.
	pub async fn query(
		&self,
		vector: &[f32],
		k: usize,
		filter: Option<&Filter>,
	) -> Result<Vec<ScoredFragment>> {
		if k == 0 {
			return Ok(Vec::new());
		}

		let ranked = {
			let state = self.state.read().await;

			if let Some(first) = state.items.first()
				&& first.vector.len() != vector.len()
			{
				return Err(Error::InvalidArgument(format!(
					"Query vector has {} dimensions, collection {} has {}.",
					vector.len(),
					self.name,
					first.vector.len()
				)));
			}

			let mut scored = state
				.items
				.iter()
				.enumerate()
				.filter(|(_, item)| filter.is_none_or(|filter| filter.matches(&item.metadata)))
				.map(|(i, item)| (cosine(vector, &item.vector), i))
				.collect::<Vec<_>>();

			scored.sort_by(|lhs, rhs| rhs.0.total_cmp(&lhs.0));

			// Vectors stay behind the lock; only the names needed to read payloads leave it.
			scored
				.into_iter()
				.map(|(score, i)| {
					let item = &state.items[i];

					(score, item.id.clone(), item.metadata_file.clone())
				})
				.collect::<Vec<_>>()
		};
		let mut out = Vec::with_capacity(k.min(ranked.len()));

		for (score, id, metadata_file) in ranked {
			if out.len() == k {
				break;
			}

			match self.read_payload_file(&metadata_file).await {
				Ok(fragment) => out.push(ScoredFragment { fragment, score }),
				Err(err) => {
					tracing::warn!(
						error = %err,
						collection = %self.name,
						item_id = %id,
						"Skipping item with unreadable payload."
					);
				},
			}
		}

		Ok(out)
	}

	async fn read_payload_file(&self, metadata_file: &str) -> Result<Fragment> {
		let path = self.dir.join(metadata_file);
		let raw = tokio::fs::read(&path).await?;

		serde_json::from_slice(&raw).map_err(|source| Error::Decode { path, source })
	}

	async fn persist(&self, state: &IndexFile) -> Result<()> {
		crate::write_json_atomic(&self.dir.join(INDEX_FILE), state).await
	}

	async fn remove_payloads(&self, items: &[IndexItem]) {
		for item in items {
			let _ = tokio::fs::remove_file(self.dir.join(&item.metadata_file)).await;
		}
	}
}

fn check_dimension(expected: &mut Option<usize>, got: usize) -> Result<()> {
	if got == 0 {
		return Err(Error::InvalidArgument("Vector must be non-empty.".to_string()));
	}

	match *expected {
		Some(dim) if dim != got => Err(Error::InvalidArgument(format!(
			"Vector has {got} dimensions, collection expects {dim}."
		))),
		Some(_) => Ok(()),
		None => {
			*expected = Some(got);

			Ok(())
		},
	}
}

fn cosine(lhs: &[f32], rhs: &[f32]) -> f32 {
	let mut dot = 0.0_f32;
	let mut lhs_norm = 0.0_f32;
	let mut rhs_norm = 0.0_f32;

	for (a, b) in lhs.iter().zip(rhs) {
		dot += a * b;
		lhs_norm += a * a;
		rhs_norm += b * b;
	}

	if lhs_norm == 0.0 || rhs_norm == 0.0 {
		return 0.0;
	}

	dot / (lhs_norm.sqrt() * rhs_norm.sqrt())
}
