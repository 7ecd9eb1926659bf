use std::fmt::Write;

use crate::{Error, Result};

/// Maps a user-supplied id to a directory or file name.
///
/// ASCII alphanumerics, `@ - . _` and CJK unified ideographs are kept; every other character
/// becomes `_`.
pub fn safe_name(raw: &str) -> Result<String> {
	let trimmed = raw.trim();

	if trimmed.is_empty() {
		return Err(Error::InvalidArgument("Collection id is required.".to_string()));
	}

	let name: String = trimmed.chars().map(|c| if is_kept(c) { c } else { '_' }).collect();

	if name.chars().all(|c| c == '.') {
		return Err(Error::InvalidArgument(format!("Unsafe collection id: {raw}.")));
	}

	Ok(name)
}

/// Maps a conversation id to a file stem, one stem per distinct id.
///
/// ASCII alphanumerics and `-` are kept. Every other byte of the UTF-8 encoding becomes `_`
/// followed by two uppercase hex digits, so `_` itself is always escaped.
pub fn session_stem(raw: &str) -> Result<String> {
	if raw.trim().is_empty() {
		return Err(Error::InvalidArgument("Session id is required.".to_string()));
	}

	let mut stem = String::with_capacity(raw.len());

	for byte in raw.bytes() {
		if byte.is_ascii_alphanumeric() || byte == b'-' {
			stem.push(byte as char);
		} else {
			let _ = write!(stem, "_{byte:02X}");
		}
	}

	Ok(stem)
}

/// Rejects ids that could address anything outside their own directory.
pub fn ensure_safe_id(raw: &str) -> Result<()> {
	if raw.contains("..") || raw.contains('/') || raw.contains('\\') {
		return Err(Error::InvalidArgument(format!("Unsafe collection id: {raw}.")));
	}

	Ok(())
}

fn is_kept(c: char) -> bool {
	c.is_ascii_alphanumeric()
		|| matches!(c, '@' | '-' | '.' | '_')
		|| ('\u{4e00}'..='\u{9fa5}').contains(&c)
}
