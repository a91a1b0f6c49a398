use crate::scheduler::{ChangeEvent, ChangeScheduler};
use crate::source::relative_path;
use crate::{IndexerError, Result};
use flowlens_graph::Language;
use log::{debug, info, warn};
use notify::event::{ModifyKind, RenameMode};
use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Forwards file system changes under a workspace root to a
/// [`ChangeScheduler`]. Watching stops when the guard is dropped.
pub struct WorkspaceWatcher {
    _watcher: RecommendedWatcher,
    forward: JoinHandle<()>,
}

impl WorkspaceWatcher {
    pub fn start(
        root: impl AsRef<Path>,
        ignored_dirs: Vec<String>,
        scheduler: ChangeScheduler,
    ) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let (event_tx, mut event_rx) = mpsc::channel(1024);
        let watcher = create_fs_watcher(&root, event_tx, DEFAULT_POLL_INTERVAL)?;
        info!("Watching {}", root.display());

        let forward = tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                let event = match event {
                    Ok(event) => event,
                    Err(err) => {
                        warn!("Watcher error: {err}");
                        continue;
                    }
                };
                for change in change_events(&root, &ignored_dirs, &event) {
                    debug!("{:?} {}", change.kind, change.path);
                    if scheduler.notify(change).await.is_err() {
                        return;
                    }
                }
            }
        });

        Ok(Self {
            _watcher: watcher,
            forward,
        })
    }
}

impl Drop for WorkspaceWatcher {
    fn drop(&mut self) {
        self.forward.abort();
    }
}

fn create_fs_watcher(
    root: &Path,
    sender: mpsc::Sender<notify::Result<Event>>,
    poll_interval: Duration,
) -> Result<RecommendedWatcher> {
    let root = root.to_path_buf();
    let mut watcher = RecommendedWatcher::new(
        move |res| {
            let _ = sender.blocking_send(res);
        },
        NotifyConfig::default().with_poll_interval(poll_interval),
    )
    .map_err(|e| IndexerError::Other(format!("watcher init failed: {e}")))?;
    watcher
        .watch(&root, RecursiveMode::Recursive)
        .map_err(|e| IndexerError::Other(format!("failed to watch {}: {e}", root.display())))?;
    Ok(watcher)
}

/// Translate one notify event into engine change events
fn change_events(root: &Path, ignored_dirs: &[String], event: &Event) -> Vec<ChangeEvent> {
    let relevant = |path: &PathBuf| -> Option<String> {
        if !is_relevant_path(root, path, ignored_dirs) {
            return None;
        }
        relative_path(root, path)
    };

    let mut changes = Vec::new();
    match &event.kind {
        EventKind::Create(_) => {
            changes.extend(event.paths.iter().filter_map(&relevant).map(ChangeEvent::create));
        }
        EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            changes.extend(event.paths.iter().filter_map(&relevant).map(ChangeEvent::delete));
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            changes.extend(event.paths.iter().filter_map(&relevant).map(ChangeEvent::create));
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            if let [from, to] = event.paths.as_slice() {
                changes.extend(relevant(from).map(ChangeEvent::delete));
                changes.extend(relevant(to).map(ChangeEvent::create));
            }
        }
        EventKind::Modify(ModifyKind::Name(_)) => {
            // Platform did not say which side of the rename this is
            for path in &event.paths {
                if let Some(relative) = relevant(path) {
                    changes.push(if path.exists() {
                        ChangeEvent::create(relative)
                    } else {
                        ChangeEvent::delete(relative)
                    });
                }
            }
        }
        EventKind::Modify(_) => {
            changes.extend(event.paths.iter().filter_map(&relevant).map(ChangeEvent::modify));
        }
        EventKind::Access(_) | EventKind::Any | EventKind::Other => {}
    }
    changes
}

fn is_relevant_path(root: &Path, path: &Path, ignored_dirs: &[String]) -> bool {
    let Ok(relative) = path.strip_prefix(root) else {
        return false;
    };
    let in_ignored_dir = relative
        .parent()
        .into_iter()
        .flat_map(Path::components)
        .any(|c| {
            let name = c.as_os_str().to_string_lossy();
            ignored_dirs.iter().any(|d| *d == name)
        });

    !in_ignored_dir && Language::from_path(relative).is_supported()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::ChangeKind;
    use notify::event::{CreateKind, DataChange, RemoveKind};
    use pretty_assertions::assert_eq;

    fn ignored() -> Vec<String> {
        vec!["node_modules".to_string(), ".git".to_string()]
    }

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        let mut event = Event::new(kind);
        for path in paths {
            event = event.add_path(PathBuf::from(path));
        }
        event
    }

    #[test]
    fn maps_event_kinds() {
        let root = Path::new("/ws");
        let cases = [
            (EventKind::Create(CreateKind::File), ChangeKind::Create),
            (EventKind::Modify(ModifyKind::Data(DataChange::Content)), ChangeKind::Modify),
            (EventKind::Remove(RemoveKind::File), ChangeKind::Delete),
            (EventKind::Modify(ModifyKind::Name(RenameMode::From)), ChangeKind::Delete),
        ];

        for (kind, expected) in cases {
            let changes = change_events(root, &ignored(), &event(kind, &["/ws/src/agent.py"]));
            assert_eq!(changes, vec![ChangeEvent::new("src/agent.py", expected)]);
        }
    }

    #[test]
    fn rename_with_both_paths_is_delete_then_create() {
        let root = Path::new("/ws");
        let changes = change_events(
            root,
            &ignored(),
            &event(
                EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
                &["/ws/old.ts", "/ws/new.ts"],
            ),
        );

        assert_eq!(
            changes,
            vec![ChangeEvent::delete("old.ts"), ChangeEvent::create("new.ts")]
        );
    }

    #[test]
    fn skips_ignored_dirs_and_unsupported_files() {
        let root = Path::new("/ws");
        let modify = EventKind::Modify(ModifyKind::Data(DataChange::Content));
        let changes = change_events(
            root,
            &ignored(),
            &event(
                modify,
                &[
                    "/ws/node_modules/openai/index.js",
                    "/ws/README.md",
                    "/elsewhere/x.py",
                    "/ws/app/main.py",
                ],
            ),
        );

        assert_eq!(changes, vec![ChangeEvent::modify("app/main.py")]);
    }
}
