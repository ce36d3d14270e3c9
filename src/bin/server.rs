use std::fs::create_dir_all;
use std::process::exit;
use std::sync::Arc;

use anyhow::Context;
use mathbase::cache::DataCache;
use mathbase::cleanup::install_panic_hook;
use mathbase::config::Settings;
use mathbase::server::app::run_server;
use mathbase::store;
use mathbase::telemetry::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    install_panic_hook();
    let settings = Settings::load().context("Failed to read configuration")?;

    let Some(uri) = settings.db_uri.as_deref() else {
        tracing::error!("DB_URI is not set");
        exit(1);
    };
    let store = match store::open(uri, settings.db_cert_path.as_deref()) {
        Ok(store) => store,
        Err(e) => {
            tracing::error!("Cannot use DB_URI: {e}");
            exit(1);
        }
    };

    let static_dir = &settings.static_dir;
    if !static_dir.exists() {
        create_dir_all(static_dir).context("Failed to create directory for static content")?;
    }
    if !static_dir.is_dir() {
        anyhow::bail!("Variable STATIC_DIR should be a directory or not exist");
    }

    let cache = Arc::new(DataCache::new(store));
    if !cache.refresh(true).await {
        tracing::warn!("Initial load failed, starting with an empty snapshot");
    }
    run_server(cache, &settings).await
}
