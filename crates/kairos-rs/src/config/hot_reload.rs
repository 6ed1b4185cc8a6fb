//! Configuration hot-reload: zero-downtime topology swaps.
//!
//! A request never sees a lock held across I/O: it clones the current
//! `Arc<Topology>` once at the top of the pipeline and uses that snapshot
//! for its whole lifetime. Reload installs a new `Arc<Topology>` behind a
//! brief write lock and broadcasts the change to anyone subscribed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};
use tokio::sync::{broadcast, RwLock};
use tokio::time::interval;

use crate::config::validation::ConfigValidator;
use crate::models::settings::Settings;
use crate::models::topology::Topology;

/// One reload event: the freshly-compiled topology plus bookkeeping.
#[derive(Debug, Clone)]
pub struct TopologyUpdate {
    pub topology: Arc<Topology>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub version: u64,
}

/// Watches a configuration file for changes and swaps the live topology in
/// response, broadcasting the change to anyone subscribed.
pub struct TopologyWatcher {
    current: Arc<RwLock<TopologyUpdate>>,
    config_path: String,
    update_sender: broadcast::Sender<TopologyUpdate>,
    version_counter: Arc<AtomicU64>,
}

impl TopologyWatcher {
    pub fn new(initial: Settings, config_path: String) -> Result<Self, String> {
        let topology = compile_validated(initial)?;
        let (update_sender, _) = broadcast::channel(100);
        let initial_update = TopologyUpdate {
            topology: Arc::new(topology),
            timestamp: chrono::Utc::now(),
            version: 1,
        };
        Ok(Self {
            current: Arc::new(RwLock::new(initial_update)),
            config_path,
            update_sender,
            version_counter: Arc::new(AtomicU64::new(1)),
        })
    }

    /// Returns the live topology snapshot. Cheap: one `Arc` clone behind a
    /// read lock that is released immediately.
    pub async fn current_topology(&self) -> Arc<Topology> {
        self.current.read().await.topology.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TopologyUpdate> {
        self.update_sender.subscribe()
    }

    /// Spawns a background task that polls the config file's mtime every 5
    /// seconds and reloads when it changes.
    pub fn start_watching(&self) {
        let mut ticker = interval(Duration::from_secs(5));
        let config_path = self.config_path.clone();
        let current = self.current.clone();
        let update_sender = self.update_sender.clone();
        let version_counter = self.version_counter.clone();

        tokio::spawn(async move {
            let mut last_modified = file_modified_time(&config_path).await;

            loop {
                ticker.tick().await;

                match file_modified_time(&config_path).await {
                    Some(modified) if Some(modified) != last_modified => {
                        info!("configuration file changed, reloading");
                        match reload_from_path(&config_path).await {
                            Ok(topology) => {
                                let version = version_counter.fetch_add(1, Ordering::Relaxed) + 1;
                                let update = TopologyUpdate {
                                    topology: Arc::new(topology),
                                    timestamp: chrono::Utc::now(),
                                    version,
                                };
                                *current.write().await = update.clone();
                                if update_sender.send(update).is_err() {
                                    warn!("no subscribers for topology update (version {version})");
                                } else {
                                    info!("topology reloaded (version {version})");
                                }
                                last_modified = Some(modified);
                            }
                            Err(e) => {
                                error!("failed to reload configuration: {e}");
                            }
                        }
                    }
                    Some(_) => {}
                    None => warn!("could not stat config file: {config_path}"),
                }
            }
        });
    }

    /// Forces an immediate reload, bypassing mtime polling.
    pub async fn manual_reload(&self) -> Result<TopologyUpdate, String> {
        let topology = reload_from_path(&self.config_path).await?;
        let version = self.version_counter.fetch_add(1, Ordering::Relaxed) + 1;
        let update = TopologyUpdate {
            topology: Arc::new(topology),
            timestamp: chrono::Utc::now(),
            version,
        };
        *self.current.write().await = update.clone();
        let _ = self.update_sender.send(update.clone());
        info!("topology manually reloaded (version {version})");
        Ok(update)
    }
}

fn compile_validated(settings: Settings) -> Result<Topology, String> {
    let result = ConfigValidator::validate_comprehensive(&settings);
    if !result.is_valid {
        return Err(format!(
            "configuration validation failed: {}",
            result.errors.join(", ")
        ));
    }
    for warning in &result.warnings {
        warn!("config validation warning: {warning}");
    }
    Ok(settings.compile())
}

async fn reload_from_path(path: &str) -> Result<Topology, String> {
    let settings = crate::config::settings::load_settings_from_path(path)
        .map_err(|e| format!("failed to load config: {e}"))?;
    compile_validated(settings)
}

async fn file_modified_time(path: &str) -> Option<std::time::SystemTime> {
    tokio::fs::metadata(path).await.ok()?.modified().ok()
}
