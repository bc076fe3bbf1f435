//! Polling watch mode
//!
//! One `PollWatcher` per stage feeds an unbounded channel. A consumer task
//! per stage logs every event and re-runs its stage; events queued while a
//! run was pending are folded into the next run.

use crate::build::build_all;
use crate::config::{BuildConfig, Stage, StageConfig};
use crate::error::BuildResult;
use crate::runner::run_stage;
use crate::util::file::{PatternSet, is_excluded};
use notify::event::RemoveKind;
use notify::{Config, Event, EventKind, PollWatcher, RecursiveMode, Watcher};
use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildEventKind {
    Added,
    Changed,
    Removed,
    DirectoryAdded,
    DirectoryRemoved,
}

impl BuildEventKind {
    pub fn is_directory(&self) -> bool {
        matches!(self, Self::DirectoryAdded | Self::DirectoryRemoved)
    }

    pub fn entity(&self) -> &'static str {
        if self.is_directory() { "directory" } else { "file" }
    }

    pub fn action(&self) -> &'static str {
        match self {
            Self::Added | Self::DirectoryAdded => "added",
            Self::Changed => "changed",
            Self::Removed | Self::DirectoryRemoved => "removed",
        }
    }
}

/// A filesystem change relevant to one stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildEvent {
    pub kind: BuildEventKind,
    pub path: PathBuf,
}

impl fmt::Display for BuildEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entity = if self.kind.is_directory() {
            "Directory"
        } else {
            "File"
        };
        write!(
            f,
            "{} {} was {}",
            entity,
            self.path.display(),
            self.kind.action()
        )
    }
}

/// Cancellable stream of one stage's build events.
///
/// Polling stops when the subscription is cancelled or dropped.
pub struct Subscription {
    stage: Stage,
    receiver: mpsc::UnboundedReceiver<BuildEvent>,
    roots: Vec<PathBuf>,
    watcher: PollWatcher,
}

impl Subscription {
    /// Start polling the roots of the stage's watch patterns. A root that
    /// does not exist yet is replaced by its nearest existing ancestor, so
    /// files show up once the directory is created.
    pub fn new(config: &StageConfig, interval: Duration) -> BuildResult<Self> {
        let patterns = PatternSet::new(&config.watch)?;
        let roots = poll_roots(config.stage, patterns.roots());

        let mut known_dirs = HashSet::new();
        for root in &roots {
            collect_dirs(root, &mut known_dirs);
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        let stage = config.stage;
        let exclude = config.exclude.clone();
        let handler = move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for build_event in classify(&event, &patterns, &exclude, &mut known_dirs) {
                    if sender.send(build_event).is_err() {
                        debug!("{} subscription closed, dropping event", stage);
                    }
                }
            }
            Err(e) => warn!(stage = %stage, "Watch error: {}", e),
        };

        let mut watcher =
            PollWatcher::new(handler, Config::default().with_poll_interval(interval))?;
        for root in &roots {
            watcher.watch(root, RecursiveMode::Recursive)?;
            debug!("Watching {:?} for {}", root, stage);
        }

        Ok(Self {
            stage,
            receiver,
            roots,
            watcher,
        })
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Wait for the next event. Ends only after `cancel`.
    pub async fn next(&mut self) -> Option<BuildEvent> {
        self.receiver.recv().await
    }

    /// Next event if one is already queued
    pub fn try_next(&mut self) -> Option<BuildEvent> {
        self.receiver.try_recv().ok()
    }

    /// Stop polling. Events already queued are still handed out by `next`,
    /// which then returns `None`.
    pub fn cancel(&mut self) {
        for root in self.roots.drain(..) {
            if let Err(e) = self.watcher.unwatch(&root) {
                debug!("Failed to unwatch {:?}: {}", root, e);
            }
        }
        self.receiver.close();
        debug!("Cancelled {} subscription", self.stage);
    }
}

/// Existing directories to poll for `roots`, falling back to the nearest
/// existing ancestor of a missing root
fn poll_roots(stage: Stage, roots: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut polled: Vec<PathBuf> = Vec::new();
    for root in roots {
        let root = if root.is_dir() {
            root
        } else {
            let ancestor = nearest_existing_dir(&root);
            warn!(
                stage = %stage,
                "Watch root {:?} does not exist yet, polling {:?}",
                root,
                ancestor
            );
            ancestor
        };
        if !polled.iter().any(|r| root.starts_with(r)) {
            polled.retain(|r| !r.starts_with(&root));
            polled.push(root);
        }
    }
    polled
}

fn nearest_existing_dir(path: &Path) -> PathBuf {
    path.ancestors()
        .map(|a| if a.as_os_str().is_empty() { Path::new(".") } else { a })
        .find(|a| a.is_dir())
        .unwrap_or(Path::new("."))
        .to_path_buf()
}

fn classify(
    event: &Event,
    patterns: &PatternSet,
    exclude: &[PathBuf],
    known_dirs: &mut HashSet<PathBuf>,
) -> Vec<BuildEvent> {
    let mut events = Vec::new();

    for path in &event.paths {
        if is_excluded(path, exclude) {
            continue;
        }

        let kind = match event.kind {
            EventKind::Create(_) if path.is_dir() => {
                known_dirs.insert(path.clone());
                BuildEventKind::DirectoryAdded
            }
            EventKind::Create(_) => BuildEventKind::Added,
            EventKind::Modify(_) if path.is_dir() => continue,
            EventKind::Modify(_) => BuildEventKind::Changed,
            EventKind::Remove(kind) => {
                if known_dirs.remove(path) || kind == RemoveKind::Folder {
                    BuildEventKind::DirectoryRemoved
                } else {
                    BuildEventKind::Removed
                }
            }
            _ => continue,
        };

        let relevant = if kind.is_directory() {
            patterns.matches_dir(path)
        } else {
            patterns.matches_file(path)
        };
        if relevant {
            events.push(BuildEvent {
                kind,
                path: path.clone(),
            });
        }
    }

    events
}

/// Record every directory below `root`, including `root` itself
fn collect_dirs(root: &Path, dirs: &mut HashSet<PathBuf>) {
    dirs.insert(root.to_path_buf());
    let Ok(entries) = std::fs::read_dir(root) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_dirs(&path, dirs);
        }
    }
}

/// Line logged when an event triggers a run
pub fn event_message(event: &BuildEvent) -> String {
    format!("{event}, running tasks...")
}

fn log_event(stage: Stage, event: &BuildEvent) {
    info!(
        stage = %stage,
        entity = event.kind.entity(),
        path = %event.path.display(),
        action = event.kind.action(),
        "{}",
        event_message(event)
    );
}

/// Log events and re-run the stage, one run per burst of queued events
async fn consume(mut subscription: Subscription, config: Arc<BuildConfig>) {
    let stage = subscription.stage();

    while let Some(event) = subscription.next().await {
        log_event(stage, &event);
        while let Some(pending) = subscription.try_next() {
            log_event(stage, &pending);
        }

        if let Err(e) = run_stage(config.stage(stage)).await {
            error!(stage = %stage, "Stage '{}' failed: {}", stage, e);
        }
    }
}

/// Build once, then rebuild stages on change until `shutdown` resolves
pub async fn watch_until<F>(config: Arc<BuildConfig>, shutdown: F) -> BuildResult<()>
where
    F: Future<Output = ()>,
{
    if let Err(e) = build_all(&config).await {
        error!("Initial build failed: {}", e);
    }

    // Subscribe every stage before consuming so setup errors stay fatal
    let mut subscriptions = Vec::with_capacity(Stage::ALL.len());
    for stage in config.stages() {
        subscriptions.push(Subscription::new(stage, config.poll_interval)?);
    }

    let handles: Vec<_> = subscriptions
        .into_iter()
        .map(|subscription| tokio::spawn(consume(subscription, Arc::clone(&config))))
        .collect();

    info!(
        "Watching for changes every {:?}, press Ctrl-C to stop",
        config.poll_interval
    );
    shutdown.await;

    for handle in handles {
        handle.abort();
    }
    info!("Stopped watching");
    Ok(())
}

/// Watch until Ctrl-C
pub async fn watch(config: Arc<BuildConfig>) -> BuildResult<()> {
    watch_until(config, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
        }
    })
    .await
}
