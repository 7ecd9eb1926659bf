//! Open collection handles, one per normalized name.

use std::{
	collections::HashMap,
	path::PathBuf,
	sync::{Arc, Mutex},
};

use tokio::sync::OnceCell;

use crate::{Error, Result, archive, index::LocalIndex, names};

type Slot = Arc<OnceCell<Arc<LocalIndex>>>;

#[derive(Debug)]
pub struct CollectionRegistry {
	root: PathBuf,
	handles: Mutex<HashMap<String, Slot>>,
}
impl CollectionRegistry {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into(), handles: Mutex::new(HashMap::new()) }
	}

	pub fn dir_for(&self, raw: &str) -> Result<PathBuf> {
		Ok(self.root.join(names::safe_name(raw)?))
	}

	/// Returns the handle for `raw`, opening it on first use.
	///
	/// Concurrent calls for one name share a single open. With `allow_create = false` a
	/// collection that is not on disk yields [`Error::NotFound`] and nothing is created, even
	/// when the directory disappears between the first check and the open.
	pub async fn open(&self, raw: &str, allow_create: bool) -> Result<Arc<LocalIndex>> {
		let name = names::safe_name(raw)?;

		if let Some(handle) = self.cached(&name) {
			return Ok(handle);
		}

		let dir = self.root.join(&name);

		if !allow_create && !LocalIndex::exists(&dir).await {
			return Err(Error::NotFound(format!("Collection {name} does not exist.")));
		}

		let slot = self.slot(&name);
		let handle = slot
			.get_or_try_init(|| async {
				let index = if LocalIndex::exists(&dir).await {
					LocalIndex::open(&dir, &name).await?
				} else if allow_create {
					LocalIndex::create(&dir, &name).await?
				} else {
					return Err(Error::NotFound(format!("Collection {name} does not exist.")));
				};

				let items = index.len().await;

				tracing::info!(collection = %name, items, "Collection opened.");

				Ok::<_, Error>(Arc::new(index))
			})
			.await?;

		Ok(handle.clone())
	}

	/// Drops the cached handle. The next `open` reads the collection from disk again.
	pub fn evict(&self, raw: &str) {
		if let Ok(name) = names::safe_name(raw) {
			self.lock().remove(&name);
		}
	}

	/// Names of every collection directory under the root, sorted.
	pub async fn list(&self) -> Result<Vec<String>> {
		let mut out = Vec::new();
		let mut entries = match tokio::fs::read_dir(&self.root).await {
			Ok(entries) => entries,
			Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(out),
			Err(err) => return Err(err.into()),
		};

		while let Some(entry) = entries.next_entry().await? {
			let Some(name) = entry.file_name().to_str().map(str::to_string) else { continue };

			if name.starts_with('.') || !entry.file_type().await?.is_dir() {
				continue;
			}
			if LocalIndex::exists(&entry.path()).await {
				out.push(name);
			}
		}

		out.sort();

		Ok(out)
	}

	/// Deletes the collection directory. Returns whether it existed.
	///
	/// The handle is evicted again once the directory is gone, so an `open` that raced the
	/// removal cannot leave a handle to the deleted directory in the cache.
	pub async fn remove(&self, raw: &str) -> Result<bool> {
		let dir = self.dir_for(raw)?;

		self.evict(raw);

		let removed = match tokio::fs::remove_dir_all(&dir).await {
			Ok(()) => true,
			Err(err) if err.kind() == std::io::ErrorKind::NotFound => false,
			Err(err) => return Err(err.into()),
		};

		self.evict(raw);

		Ok(removed)
	}

	/// Gzip tarball of the collection directory.
	pub async fn export(&self, raw: &str) -> Result<Vec<u8>> {
		let handle = self.open(raw, false).await?;

		archive::pack(handle.dir()).await
	}

	/// Replaces the collection with the contents of an archive. Returns the imported item
	/// count.
	///
	/// The archive is unpacked into a hidden staging directory and validated before the live
	/// directory is touched.
	pub async fn import(&self, raw: &str, bytes: Vec<u8>, force: bool) -> Result<usize> {
		let name = names::safe_name(raw)?;
		let dir = self.root.join(&name);

		if !force && LocalIndex::exists(&dir).await {
			return Err(Error::Conflict(format!("Collection {name} already exists.")));
		}

		tokio::fs::create_dir_all(&self.root).await?;

		let staging = self.root.join(format!(".{name}.import-{}", uuid::Uuid::new_v4().simple()));
		let staged = async {
			archive::unpack(bytes, &staging).await?;

			LocalIndex::open(&staging, &name).await.map_err(|err| match err {
				Error::Io(_) | Error::Decode { .. } => Error::InvalidArgument(format!(
					"Archive does not hold a valid collection: {err}"
				)),
				other => other,
			})
		}
		.await;
		let count = match staged {
			Ok(index) => index.len().await,
			Err(err) => {
				let _ = tokio::fs::remove_dir_all(&staging).await;

				return Err(err);
			},
		};

		self.evict(raw);

		match tokio::fs::remove_dir_all(&dir).await {
			Ok(()) => {},
			Err(err) if err.kind() == std::io::ErrorKind::NotFound => {},
			Err(err) => {
				let _ = tokio::fs::remove_dir_all(&staging).await;

				return Err(err.into());
			},
		}

		let renamed = tokio::fs::rename(&staging, &dir).await;

		self.evict(raw);
		renamed?;

		tracing::info!(collection = %name, items = count, "Collection imported.");

		Ok(count)
	}

	fn cached(&self, name: &str) -> Option<Arc<LocalIndex>> {
		self.lock().get(name).and_then(|slot| slot.get().cloned())
	}

	fn slot(&self, name: &str) -> Slot {
		self.lock().entry(name.to_string()).or_default().clone()
	}

	fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Slot>> {
		self.handles.lock().unwrap_or_else(|err| err.into_inner())
	}
}
