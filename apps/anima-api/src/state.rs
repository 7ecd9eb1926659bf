use std::sync::Arc;

use anima_service::{AnimaService, Providers};

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<AnimaService>,
}
impl AppState {
	/// Creates the storage roots and the service.
	pub async fn new(config: anima_config::Config) -> color_eyre::Result<Self> {
		Self::with_providers(config, Providers::default()).await
	}

	pub async fn with_providers(
		config: anima_config::Config,
		providers: Providers,
	) -> color_eyre::Result<Self> {
		tokio::fs::create_dir_all(&config.storage.vector_root).await?;
		tokio::fs::create_dir_all(&config.storage.session_root).await?;

		let service = AnimaService::with_providers(config, providers);

		Ok(Self { service: Arc::new(service) })
	}
}
