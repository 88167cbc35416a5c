use std::sync::Arc;

use notemind_service::{Components, NotemindService, ServiceSettings};
use notemind_storage::db::Db;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<NotemindService>,
}
impl AppState {
	/// Connects to Postgres, bootstraps the schema, and starts the session registry.
	pub async fn new(config: notemind_config::Config) -> color_eyre::Result<Self> {
		let db = Db::connect(&config.storage.postgres).await?;

		db.ensure_schema().await?;

		let components = Components::postgres(&config, Arc::new(db));

		Self::from_components(ServiceSettings::from_config(&config), components).await
	}

	pub async fn from_components(
		settings: ServiceSettings,
		components: Components,
	) -> color_eyre::Result<Self> {
		let service = NotemindService::start(settings, components).await?;

		Ok(Self { service: Arc::new(service) })
	}
}
