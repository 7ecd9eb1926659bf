//! Human-readable messages from failed provider responses.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

const MAX_MESSAGE_CHARS: usize = 500;

static HIDDEN_BLOCKS: LazyLock<Option<Regex>> =
	LazyLock::new(|| Regex::new(r"(?is)<(script|style|head)[^>]*>.*?</(script|style|head)>").ok());
static TAGS: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").ok());
static WHITESPACE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\s+").ok());

/// Picks the message a provider put in an error body.
///
/// JSON envelopes are read in the order `error.message`, `error`, `message`, `detail`; an
/// envelope without any of them becomes `HTTP <status>`. Anything else is treated as text with
/// markup removed, and an empty result also becomes `HTTP <status>`.
pub fn extract_message(status: u16, body: &str) -> String {
	let body = body.trim();

	if let Ok(json) = serde_json::from_str::<Value>(body) {
		if let Some(message) = json_message(&json) {
			return message;
		}
		if json.is_object() || json.is_array() {
			return format!("HTTP {status}");
		}
	}

	let text = truncate(collapse_whitespace(&strip_markup(body)));

	if text.is_empty() { format!("HTTP {status}") } else { text }
}

fn json_message(json: &Value) -> Option<String> {
	let candidates = [
		json.pointer("/error/message"),
		json.get("error"),
		json.get("message"),
		json.get("detail"),
	];

	candidates
		.into_iter()
		.flatten()
		.filter_map(Value::as_str)
		.map(str::trim)
		.find(|message| !message.is_empty())
		.map(str::to_string)
}

fn strip_markup(body: &str) -> String {
	let (Some(hidden), Some(tags)) = (HIDDEN_BLOCKS.as_ref(), TAGS.as_ref()) else {
		return body.to_string();
	};
	let visible = hidden.replace_all(body, " ");

	tags.replace_all(&visible, " ").into_owned()
}

fn collapse_whitespace(text: &str) -> String {
	match WHITESPACE.as_ref() {
		Some(re) => re.replace_all(text.trim(), " ").into_owned(),
		None => text.split_whitespace().collect::<Vec<_>>().join(" "),
	}
}

fn truncate(text: String) -> String {
	match text.char_indices().nth(MAX_MESSAGE_CHARS) {
		Some((cut, _)) => format!("{}...", &text[..cut]),
		None => text,
	}
}
