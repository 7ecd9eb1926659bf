pub mod archive;
pub mod delete;
pub mod echo;
pub mod fanout;
pub mod insert;
pub mod list;
pub mod merge;
pub mod query;
pub mod rebuild;
pub mod strategy;

mod error;
mod wire;

pub use archive::{ExportRequest, ExportResponse, ImportRequest, ImportResponse};
pub use delete::{
	DeleteBatchRequest, DeleteCollectionRequest, DeleteCollectionResponse, DeleteRequest,
	DeleteResponse,
};
pub use error::{Error, Result};
pub use insert::{InsertRequest, InsertResponse};
pub use list::{CollectionRequest, ExistsResponse, ViewItem, ViewResponse};
pub use merge::{MergeRequest, MergeResponse};
pub use query::{EchoOverrides, QueryItem, QueryRequest, QueryResponse, TrackContext};
pub use rebuild::{RebuildRequest, RebuildResponse, TestConnectionRequest, TestConnectionResponse};

use std::{future::Future, pin::Pin, sync::Arc};

use serde::Deserialize;

use anima_config::{Config, EmbeddingProviderConfig};
use anima_providers::embedding;
use anima_storage::{
	names, queue::WriteSerializer, registry::CollectionRegistry, sessions::SessionStore,
};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		text: &'a str,
	) -> BoxFuture<'a, anima_providers::Result<Vec<f32>>>;
}

/// Per-request embedding overrides. Absent fields fall back to `[providers.embedding]`.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ApiConfig {
	#[serde(default)]
	pub key: Option<String>,
	#[serde(default)]
	pub url: Option<String>,
	#[serde(default)]
	pub model: Option<String>,
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
}
impl Providers {
	pub fn new(embedding: Arc<dyn EmbeddingProvider>) -> Self {
		Self { embedding }
	}
}
impl Default for Providers {
	fn default() -> Self {
		Self { embedding: Arc::new(DefaultProviders) }
	}
}

pub struct AnimaService {
	pub cfg: Config,
	pub providers: Providers,
	pub registry: CollectionRegistry,
	pub sessions: SessionStore,
	/// Serializes mutations per collection.
	pub writes: WriteSerializer,
	/// Serializes echo cycles per conversation.
	pub session_writes: WriteSerializer,
}
impl AnimaService {
	pub fn new(cfg: Config) -> Self {
		Self::with_providers(cfg, Providers::default())
	}

	pub fn with_providers(cfg: Config, providers: Providers) -> Self {
		let registry = CollectionRegistry::new(cfg.storage.vector_root.clone());
		let sessions = SessionStore::new(cfg.storage.session_root.clone());

		Self {
			cfg,
			providers,
			registry,
			sessions,
			writes: WriteSerializer::new(),
			session_writes: WriteSerializer::new(),
		}
	}

	/// Configured embedding provider with request overrides applied.
	pub(crate) fn embedding_config(
		&self,
		api: Option<&ApiConfig>,
	) -> Result<EmbeddingProviderConfig> {
		let mut cfg = self.cfg.providers.embedding.clone();

		if let Some(api) = api {
			if let Some(key) = non_blank(api.key.as_deref()) {
				cfg.api_key = Some(key.to_string());
			}
			if let Some(url) = non_blank(api.url.as_deref()) {
				cfg.api_base = url.to_string();
			}
			if let Some(model) = non_blank(api.model.as_deref()) {
				cfg.model = model.to_string();
			}
		}

		if non_blank(cfg.api_key.as_deref()).is_none() {
			return Err(Error::invalid("Embedding API key is missing."));
		}

		Ok(cfg)
	}

	pub(crate) async fn embed(
		&self,
		cfg: &EmbeddingProviderConfig,
		text: &str,
	) -> Result<Vec<f32>> {
		let vector = self.providers.embedding.embed(cfg, text).await?;

		if vector.is_empty() {
			return Err(Error::Provider {
				message: "Embedding provider returned an empty vector.".to_string(),
			});
		}

		Ok(vector)
	}
}

struct DefaultProviders;

impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		text: &'a str,
	) -> BoxFuture<'a, anima_providers::Result<Vec<f32>>> {
		Box::pin(embedding::embed(cfg, text))
	}
}

/// Normalized collection name, rejecting blank ids.
pub(crate) fn collection_key(raw: &str) -> Result<String> {
	if raw.trim().is_empty() {
		return Err(Error::invalid("collectionId is required."));
	}

	Ok(names::safe_name(raw)?)
}

pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
	value.map(str::trim).filter(|value| !value.is_empty())
}

pub(crate) fn now_millis() -> i64 {
	(time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}
