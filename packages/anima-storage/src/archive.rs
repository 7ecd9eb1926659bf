//! Gzip tarballs of collection directories.

use std::path::Path;

use flate2::{Compression, read::GzDecoder, write::GzEncoder};

use crate::{Error, Result};

pub async fn pack(dir: &Path) -> Result<Vec<u8>> {
	let dir = dir.to_path_buf();

	tokio::task::spawn_blocking(move || -> Result<Vec<u8>> {
		let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));

		builder.append_dir_all(".", &dir)?;

		Ok(builder.into_inner()?.finish()?)
	})
	.await
	.map_err(std::io::Error::other)?
}

/// Unpacks into `dest`, rejecting entries that would land outside it.
pub async fn unpack(bytes: Vec<u8>, dest: &Path) -> Result<()> {
	let dest = dest.to_path_buf();

	tokio::task::spawn_blocking(move || unpack_blocking(&bytes, &dest))
		.await
		.map_err(std::io::Error::other)?
}

fn unpack_blocking(bytes: &[u8], dest: &Path) -> Result<()> {
	std::fs::create_dir_all(dest)?;

	let mut archive = tar::Archive::new(GzDecoder::new(bytes));
	let entries = archive.entries().map_err(malformed)?;

	for entry in entries {
		let mut entry = entry.map_err(malformed)?;

		if !entry.unpack_in(dest).map_err(malformed)? {
			return Err(Error::InvalidArgument(
				"Archive entry points outside the collection directory.".to_string(),
			));
		}
	}

	Ok(())
}

fn malformed(err: std::io::Error) -> Error {
	Error::InvalidArgument(format!("Malformed archive: {err}"))
}
