//! Process termination handling.

use std::future::Future;
use std::sync::Arc;

use tokio::signal;

use crate::cache::DataCache;
use crate::telemetry::{Color, Logger};

const LOGGER: Logger = Logger::new("CleanUp", Color::Blue);

/// Resolves when the process is asked to stop, with the name of the signal.
pub async fn termination_signal() -> &'static str {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
        "SIGINT"
    };

    #[cfg(unix)]
    let other = async {
        use signal::unix::{signal, SignalKind};

        let mut terminate = signal(SignalKind::terminate()).expect("failed to install signal handler");
        let mut user1 = signal(SignalKind::user_defined1()).expect("failed to install signal handler");
        let mut user2 = signal(SignalKind::user_defined2()).expect("failed to install signal handler");
        tokio::select! {
            _ = terminate.recv() => "SIGTERM",
            _ = user1.recv() => "SIGUSR1",
            _ = user2.recv() => "SIGUSR2",
        }
    };

    #[cfg(not(unix))]
    let other = std::future::pending::<&'static str>();

    tokio::select! {
        name = ctrl_c => name,
        name = other => name,
    }
}

/// Waits for a termination signal, then closes the store connection.
/// Meant for `axum::serve(..).with_graceful_shutdown`.
pub async fn shutdown(cache: Arc<DataCache>) {
    shutdown_after(termination_signal(), cache).await
}

async fn shutdown_after(signal: impl Future<Output = &'static str>, cache: Arc<DataCache>) {
    let name = signal.await;
    LOGGER.log(format!("Received signal: {name}"));
    LOGGER.log("Cleaning up...");
    cache.close().await;
    LOGGER.log("Cleanup complete");
}

/// Exit with status 1 on any panic, after logging it.
pub fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        LOGGER.error("Uncaught panic:");
        default_hook(info);
        std::process::exit(1);
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, Store};

    #[tokio::test]
    async fn shutdown_closes_the_store() {
        let store = Arc::new(MemoryStore::default());
        let cache = Arc::new(DataCache::new(store.clone()));
        cache.connect().await.unwrap();
        assert!(store.is_connected());

        shutdown_after(async { "SIGTERM" }, cache.clone()).await;
        assert!(!store.is_connected());
    }
}
