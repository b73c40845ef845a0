mod app;
mod config;
mod models;
mod providers;
mod services;
mod ui;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use app::App;
use config::{ENV_API_KEY, SETTINGS_KEY};
use providers::HttpTransport;
use services::{AppSettings, Database, KeyValueStore, SettingsService};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let storage: Arc<dyn KeyValueStore> = Arc::new(Database::new()?);

    // Write the defaults out once so they can be edited in place
    if storage.get(SETTINGS_KEY)?.is_none() {
        SettingsService::save(storage.as_ref(), &AppSettings::default())?;
    }
    let settings = SettingsService::load(storage.as_ref()).with_env_overrides();
    settings.validate()?;

    let api_key = std::env::var(ENV_API_KEY)
        .with_context(|| format!("{} must be set to the endpoint's API key", ENV_API_KEY))?;
    let transport = Arc::new(HttpTransport::new(settings.endpoint.clone(), api_key));

    let mut app = App::new(storage, &settings, transport);
    app.run().await
}
