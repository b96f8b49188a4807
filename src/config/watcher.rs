//! Configuration file watcher for hot-reload support
//!
//! Only key bindings are applied live; connection and parameter settings
//! take effect on the next start.

use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::AppConfig;

/// Delay before re-reading a modified file, so editors finish writing
const RELOAD_DEBOUNCE: Duration = Duration::from_millis(100);

/// Watches the config file and yields each successfully reloaded version
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<AppConfig>,
}

impl ConfigWatcher {
    /// Start watching `config_path`; the caller loads the initial version
    ///
    /// Must be called from within the tokio runtime.
    pub fn watch(config_path: String) -> Result<Self> {
        let (tx, rx) = mpsc::channel(10);

        let path_for_events = config_path.clone();

        // notify callbacks run on their own OS thread, outside the runtime
        let runtime_handle = tokio::runtime::Handle::current();

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    error!("Watch error: {}", e);
                    return;
                }
            };

            if !matches!(event.kind, EventKind::Modify(_)) {
                return;
            }
            debug!("Config file modified: {:?}", event.paths);

            let config_path = path_for_events.clone();
            let tx = tx.clone();

            runtime_handle.spawn(async move {
                tokio::time::sleep(RELOAD_DEBOUNCE).await;

                match AppConfig::load(&config_path).await {
                    Ok(new_config) => {
                        if let Err(e) = tx.send(new_config).await {
                            error!("Failed to send config update: {}", e);
                        }
                    }
                    Err(e) => {
                        warn!("Failed to reload config (keeping old config): {:#}", e);
                    }
                }
            });
        })?;

        watcher
            .watch(Path::new(&config_path), RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch config file: {}", config_path))?;

        info!("Config file watcher started for: {}", config_path);

        Ok(Self {
            _watcher: watcher,
            rx,
        })
    }

    /// Wait for the next reloaded config
    ///
    /// Returns None once the watcher has been dropped.
    pub async fn next_config(&mut self) -> Option<AppConfig> {
        self.rx.recv().await
    }
}
