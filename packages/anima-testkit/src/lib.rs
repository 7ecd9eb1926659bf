mod error;

pub use error::{Error, Result};

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use toml::{Table, Value};

use anima_config::Config;

const BASE_CONFIG_TOML: &str = r#"
[service]
http_bind  = "127.0.0.1:0"
mount_path = ""
log_level  = "warn"

[storage]
vector_root      = "vectors"
session_root     = "sessions"
query_timeout_ms = 5000

[providers.embedding]
provider_id = "test"
api_base    = "http://127.0.0.1:9"
api_key     = "test-key"
path        = "/embeddings"
model       = "test-embed"
timeout_ms  = 5000

[retrieval]
global_multiplier = 1.0
min_score         = 0.0
exemption_slack   = 0.1
important_marker  = "Important"

[echo]
enabled        = true
base_life      = 1
important_life = 3
max_total      = 10
important_tags = ["Important"]

[security]
bind_localhost_only = true
"#;

/// Vector and session roots inside a temporary directory that is removed on drop.
pub struct TestRoots {
	dir: TempDir,
}
impl TestRoots {
	pub fn new() -> Result<Self> {
		let dir = tempfile::Builder::new().prefix("anima_test_").tempdir()?;

		Ok(Self { dir })
	}

	pub fn path(&self) -> &Path {
		self.dir.path()
	}

	pub fn vector_root(&self) -> PathBuf {
		self.dir.path().join("vectors")
	}

	pub fn session_root(&self) -> PathBuf {
		self.dir.path().join("sessions")
	}

	/// Validated configuration whose storage roots point into this directory.
	pub fn config(&self) -> Result<Config> {
		self.config_with(|_| {})
	}

	/// Like [`TestRoots::config`], after `edit` has adjusted the raw TOML table.
	pub fn config_with<F>(&self, edit: F) -> Result<Config>
	where
		F: FnOnce(&mut Table),
	{
		let mut root: Table = toml::from_str(BASE_CONFIG_TOML)
			.map_err(|err| Error::Message(format!("Failed to parse base config: {err}.")))?;
		let storage = root
			.get_mut("storage")
			.and_then(Value::as_table_mut)
			.ok_or_else(|| Error::Message("Base config must include [storage].".to_string()))?;

		storage.insert("vector_root".to_string(), path_value(&self.vector_root())?);
		storage.insert("session_root".to_string(), path_value(&self.session_root())?);

		edit(&mut root);

		let raw = toml::to_string(&root)
			.map_err(|err| Error::Message(format!("Failed to render test config: {err}.")))?;

		Ok(anima_config::parse(&raw)?)
	}
}

/// Sets `section.key` in a raw config table, creating the section when missing.
pub fn set_value(root: &mut Table, section: &str, key: &str, value: impl Into<Value>) {
	let mut cursor = root;

	for part in section.split('.') {
		let entry = cursor.entry(part.to_string()).or_insert_with(|| Value::Table(Table::new()));

		if !entry.is_table() {
			*entry = Value::Table(Table::new());
		}

		let Value::Table(next) = entry else { return };

		cursor = next;
	}

	cursor.insert(key.to_string(), value.into());
}

fn path_value(path: &Path) -> Result<Value> {
	path.to_str()
		.map(|raw| Value::String(raw.to_string()))
		.ok_or_else(|| Error::Message(format!("Temporary path is not UTF-8: {path:?}.")))
}
