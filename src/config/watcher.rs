//! Hot reload of the configuration file.
//!
//! The parent directory is watched rather than the file itself, so editors
//! that save by writing a temporary file and renaming it are still seen.
//! Only rewrite rules and the proxy toggles take effect live; listener and
//! timeout changes need a restart.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::{parse_config, ConfigError};
use crate::config::schema::ProxyConfig;

const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Reloads one configuration file and forwards each new revision.
struct Reloader {
    path: PathBuf,
    last: Mutex<Option<String>>,
    updates: mpsc::UnboundedSender<ProxyConfig>,
}

impl Reloader {
    /// Whether `event` touches the watched file.
    fn concerns(&self, event: &Event) -> bool {
        (event.kind.is_modify() || event.kind.is_create())
            && event
                .paths
                .iter()
                .any(|p| p.file_name() == self.path.file_name())
    }

    /// Re-read the file; returns `Ok(None)` when its contents are unchanged.
    fn reload(&self) -> Result<Option<ProxyConfig>, ConfigError> {
        let text = fs::read_to_string(&self.path)?;
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        if last.as_deref() == Some(text.as_str()) {
            return Ok(None);
        }
        let config = parse_config(&text)?;
        *last = Some(text);
        Ok(Some(config))
    }

    fn on_event(&self, res: notify::Result<Event>) {
        let event = match res {
            Ok(event) if self.concerns(&event) => event,
            Ok(_) => return,
            Err(e) => {
                tracing::error!(error = %e, "Config watch error");
                return;
            }
        };

        match self.reload() {
            Ok(Some(config)) => {
                tracing::info!(path = ?self.path, kind = ?event.kind, "Config file changed, reloading");
                let _ = self.updates.send(config);
            }
            Ok(None) => tracing::trace!(path = ?self.path, "Config file touched but unchanged"),
            Err(e) => tracing::error!(
                error = %e,
                "Failed to reload config, keeping current configuration"
            ),
        }
    }
}

/// Keeps the file watch alive; dropping it stops reloads.
pub struct ConfigWatch {
    _watcher: RecommendedWatcher,
}

/// Watch `path` and yield every valid new revision of it.
///
/// `initial` is the text the running configuration came from, so a spurious
/// event right after startup does not reload the same file.
pub fn watch_config(
    path: &Path,
    initial: Option<String>,
) -> Result<(ConfigWatch, mpsc::UnboundedReceiver<ProxyConfig>), notify::Error> {
    let (updates, update_rx) = mpsc::unbounded_channel();
    let reloader = Reloader {
        path: path.to_path_buf(),
        last: Mutex::new(initial),
        updates,
    };

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| reloader.on_event(res),
        Config::default().with_poll_interval(POLL_INTERVAL),
    )?;
    watcher.watch(&dir, RecursiveMode::NonRecursive)?;

    tracing::info!(path = ?path, "Config watcher started");
    Ok((ConfigWatch { _watcher: watcher }, update_rx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, EventKind, ModifyKind};

    fn reloader(name: &str) -> (Reloader, mpsc::UnboundedReceiver<ProxyConfig>) {
        let path = std::env::temp_dir().join(format!("rewrite-proxy-{}-{}.toml", name, std::process::id()));
        let (updates, rx) = mpsc::unbounded_channel();
        (
            Reloader {
                path,
                last: Mutex::new(None),
                updates,
            },
            rx,
        )
    }

    #[test]
    fn only_events_for_the_file_count() {
        let (reloader, _rx) = reloader("filter");
        let ours = Event::new(EventKind::Modify(ModifyKind::Any)).add_path(reloader.path.clone());
        let other = Event::new(EventKind::Create(CreateKind::File))
            .add_path(std::env::temp_dir().join("unrelated.toml"));
        let removal = Event::new(EventKind::Remove(notify::event::RemoveKind::File))
            .add_path(reloader.path.clone());

        assert!(reloader.concerns(&ours));
        assert!(!reloader.concerns(&other));
        assert!(!reloader.concerns(&removal));
    }

    #[test]
    fn unchanged_contents_are_skipped() {
        let (reloader, mut rx) = reloader("dedupe");
        fs::write(&reloader.path, "[proxy]\nuse_cache = true\n").unwrap();
        let event = Event::new(EventKind::Modify(ModifyKind::Any)).add_path(reloader.path.clone());

        reloader.on_event(Ok(event.clone()));
        reloader.on_event(Ok(event));

        let config = rx.try_recv().unwrap();
        assert!(config.proxy.use_cache);
        assert!(rx.try_recv().is_err());
        let _ = fs::remove_file(&reloader.path);
    }

    #[test]
    fn invalid_revision_is_not_forwarded() {
        let (reloader, mut rx) = reloader("invalid");
        fs::write(&reloader.path, "[[rewrite.request]]\npattern = \"(\"\nreplacement = \"x\"\n").unwrap();

        assert!(matches!(reloader.reload(), Err(ConfigError::Validation(_))));
        let event = Event::new(EventKind::Modify(ModifyKind::Any)).add_path(reloader.path.clone());
        reloader.on_event(Ok(event));
        assert!(rx.try_recv().is_err());
        let _ = fs::remove_file(&reloader.path);
    }
}
