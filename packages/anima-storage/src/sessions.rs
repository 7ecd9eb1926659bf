use std::{io::ErrorKind, path::PathBuf};

use crate::{Error, Result, names};
use anima_domain::echo::EchoMemory;

/// Echo memory files, one per conversation.
#[derive(Clone, Debug)]
pub struct SessionStore {
	root: PathBuf,
}
impl SessionStore {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into() }
	}

	pub fn path_for(&self, session_id: &str) -> Result<PathBuf> {
		Ok(self.root.join(format!("{}.json", names::session_stem(session_id)?)))
	}

	/// Loads the memory for a conversation. A missing file is an empty memory.
	pub async fn load(&self, session_id: &str) -> Result<EchoMemory> {
		let path = self.path_for(session_id)?;
		let raw = match tokio::fs::read(&path).await {
			Ok(raw) => raw,
			Err(err) if err.kind() == ErrorKind::NotFound => return Ok(EchoMemory::default()),
			Err(err) => return Err(err.into()),
		};

		serde_json::from_slice(&raw).map_err(|source| Error::Decode { path, source })
	}

	pub async fn persist(&self, session_id: &str, memory: &EchoMemory) -> Result<()> {
		let path = self.path_for(session_id)?;

		tokio::fs::create_dir_all(&self.root).await?;

		crate::write_json_atomic(&path, memory).await
	}
}
