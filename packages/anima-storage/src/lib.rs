pub mod archive;
pub mod filter;
pub mod index;
pub mod names;
pub mod queue;
pub mod registry;
pub mod sessions;

mod error;

pub use error::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

use std::path::Path;

use serde::Serialize;

/// Writes JSON next to `path` and renames it into place.
pub(crate) async fn write_json_atomic<T>(path: &Path, value: &T) -> Result<()>
where
	T: Serialize + ?Sized,
{
	let bytes = serde_json::to_vec(value)?;
	let tmp = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));

	tokio::fs::write(&tmp, bytes).await?;

	if let Err(err) = tokio::fs::rename(&tmp, path).await {
		let _ = tokio::fs::remove_file(&tmp).await;

		return Err(err.into());
	}

	Ok(())
}
