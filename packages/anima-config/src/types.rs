use std::path::PathBuf;

use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	#[serde(default)]
	pub retrieval: Retrieval,
	#[serde(default)]
	pub echo: Echo,
	#[serde(default)]
	pub security: Security,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	/// Prefix every HTTP route is nested under. Empty mounts at the root.
	#[serde(default)]
	pub mount_path: String,
	pub log_level: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Storage {
	pub vector_root: PathBuf,
	pub session_root: PathBuf,
	#[serde(default = "default_query_timeout_ms")]
	pub query_timeout_ms: u64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	/// Fallback key for requests that do not carry their own `apiConfig.key`.
	#[serde(default)]
	pub api_key: Option<String>,
	#[serde(default = "default_embedding_path")]
	pub path: String,
	pub model: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Retrieval {
	/// Multiplies every step's candidate count before the per-step coefficient.
	pub global_multiplier: f32,
	pub min_score: f32,
	/// Score band below `min_score` still accepted for structural steps.
	pub exemption_slack: f32,
	pub important_marker: String,
}
impl Default for Retrieval {
	fn default() -> Self {
		Self {
			global_multiplier: 1.0,
			min_score: 0.0,
			exemption_slack: 0.1,
			important_marker: "Important".to_string(),
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Echo {
	pub enabled: bool,
	pub base_life: i32,
	pub important_life: i32,
	/// Upper bound for live plus echoed results in one response.
	pub max_total: u32,
	pub important_tags: Vec<String>,
}
impl Default for Echo {
	fn default() -> Self {
		Self {
			enabled: true,
			base_life: 1,
			important_life: 3,
			max_total: 10,
			important_tags: vec!["Important".to_string()],
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Security {
	pub bind_localhost_only: bool,
}
impl Default for Security {
	fn default() -> Self {
		Self { bind_localhost_only: true }
	}
}

fn default_query_timeout_ms() -> u64 {
	10_000
}

fn default_embedding_path() -> String {
	"/embeddings".to_string()
}
