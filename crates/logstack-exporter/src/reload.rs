//! Config hot reload
//!
//! Watches the config file and replaces the whole scrape target on every
//! change. A file that fails to parse or validate is logged and ignored; the
//! previous target stays active.

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::ScrapeConfig;
use crate::error::Result;
use crate::target::{ScrapeTarget, TargetHandle};
use crate::trigger::Shutdown;

/// Quiet period collapsing the burst of events a single save produces
pub const RELOAD_DEBOUNCE: Duration = Duration::from_millis(250);

/// Re-read the config file and swap in a new target
pub fn reload_target(path: &Path, handle: &TargetHandle) -> Result<()> {
    let config = ScrapeConfig::from_file(path)?;
    let target = ScrapeTarget::connect(config)?;
    let index = target.config.index.clone();

    let previous = handle.swap(target);

    tracing::info!(
        path = %path.display(),
        previous_index = %previous.config.index,
        index = %index,
        "Configuration reloaded"
    );
    Ok(())
}

/// Background watcher for one config file
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl ConfigWatcher {
    /// Start watching `path`; must be called inside a tokio runtime
    pub fn spawn(path: PathBuf, handle: Arc<TargetHandle>, shutdown: Shutdown) -> Result<Self> {
        let (sender, mut receiver) = mpsc::channel::<()>(16);
        let file_name = path.file_name().map(|name| name.to_os_string());

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) if is_relevant(&event, file_name.as_ref()) => {
                sender.try_send(()).ok();
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Config watch error"),
        })?;

        // Editors often replace the file instead of writing it, so watch the directory
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = %path.display(), "Watching config file for changes");

        let task = tokio::spawn(async move {
            let mut shutdown = shutdown;
            loop {
                tokio::select! {
                    _ = shutdown.wait() => break,
                    event = receiver.recv() => {
                        if event.is_none() {
                            break;
                        }
                        tokio::time::sleep(RELOAD_DEBOUNCE).await;
                        while receiver.try_recv().is_ok() {}

                        if let Err(e) = reload_target(&path, &handle) {
                            tracing::warn!(
                                path = %path.display(),
                                error = %e,
                                config_error = e.is_config_error(),
                                "Config reload failed, keeping previous configuration"
                            );
                        }
                    }
                }
            }
        });

        Ok(Self {
            _watcher: watcher,
            task,
        })
    }

    /// Wait for the watcher task to stop after shutdown
    pub async fn join(self) {
        self.task.await.ok();
    }
}

fn is_relevant(event: &Event, file_name: Option<&OsString>) -> bool {
    if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
        return false;
    }
    match file_name {
        Some(name) => event
            .paths
            .iter()
            .any(|p| p.file_name() == Some(name.as_os_str())),
        None => true,
    }
}
