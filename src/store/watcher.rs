//! Data file watcher for registry reloads.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

/// A watcher that monitors the store data file for changes.
///
/// The parent directory is watched rather than the file itself: persistence
/// replaces the file by rename, which would drop a per-file watch.
pub struct StoreWatcher {
    path: PathBuf,
    reload_tx: mpsc::UnboundedSender<()>,
}

impl StoreWatcher {
    /// Create a new StoreWatcher.
    ///
    /// Returns the watcher and a receiver of reload notifications.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<()>) {
        let (reload_tx, reload_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                reload_tx,
            },
            reload_rx,
        )
    }

    /// Start watching. The returned watcher must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.reload_tx.clone();
        let file_name = self.path.file_name().map(|n| n.to_os_string());
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let touches_file = event
                        .paths
                        .iter()
                        .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                    if touches_file && (event.kind.is_modify() || event.kind.is_create()) {
                        tracing::info!("Store data file change detected, scheduling reload");
                        let _ = tx.send(());
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Store watcher started");
        Ok(watcher)
    }
}
