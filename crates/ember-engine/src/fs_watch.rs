//! Filesystem change watching.
//!
//! A notify backend forwards raw events over a channel to a worker thread,
//! which normalizes them into [`FileChange`] records and pushes them into a
//! bounded queue shared with the engine thread. The queue is the handoff
//! point between the watcher threads and the tick loop; sustained bursts
//! drop the oldest unprocessed changes.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{unbounded, Receiver};
use notify::{Event as NotifyEvent, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, warn};

use ember_common::{EmberError, EmberResult};
use ember_events::BoundedQueue;

/// Kind of filesystem change observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileChangeKind {
    /// A new file or directory appeared
    Created,
    /// Contents or metadata changed
    Modified,
    /// The path was removed
    Removed,
    /// Anything the backend reports that fits none of the above
    Other,
}

impl FileChangeKind {
    fn from_notify(kind: &EventKind) -> Self {
        match kind {
            EventKind::Create(_) => Self::Created,
            EventKind::Modify(_) => Self::Modified,
            EventKind::Remove(_) => Self::Removed,
            _ => Self::Other,
        }
    }
}

/// A normalized filesystem change record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    /// Affected path
    pub path: PathBuf,
    /// What happened to it
    pub kind: FileChangeKind,
}

/// Watches directories and queues normalized change records.
pub struct FileWatcher {
    /// Backend; dropping it closes the channel and stops the worker
    watcher: Option<RecommendedWatcher>,
    /// Worker normalizing backend events into the queue
    worker: Option<JoinHandle<()>>,
    /// Handoff queue drained by the engine tick
    queue: Arc<BoundedQueue<FileChange>>,
}

impl FileWatcher {
    /// Starts the watcher backend and its worker thread.
    ///
    /// `queue_capacity` bounds how many unprocessed changes are kept; older
    /// entries are dropped first under overflow.
    pub fn new(queue_capacity: usize) -> EmberResult<Self> {
        let (tx, rx) = unbounded::<notify::Result<NotifyEvent>>();
        let watcher = notify::recommended_watcher(move |result| {
            let _ = tx.send(result);
        })
        .map_err(|e| EmberError::Watch(e.to_string()))?;

        let queue = Arc::new(BoundedQueue::new(queue_capacity));
        let worker_queue = Arc::clone(&queue);
        let worker = std::thread::Builder::new()
            .name("ember-fs-watch".to_owned())
            .spawn(move || worker_loop(&rx, &worker_queue))
            .map_err(EmberError::Io)?;

        Ok(Self {
            watcher: Some(watcher),
            worker: Some(worker),
            queue,
        })
    }

    /// Adds a path to watch recursively.
    pub fn watch(&mut self, path: &Path) -> EmberResult<()> {
        match self.watcher.as_mut() {
            Some(watcher) => watcher
                .watch(path, RecursiveMode::Recursive)
                .map_err(|e| EmberError::Watch(e.to_string())),
            None => Err(EmberError::Watch("watcher already stopped".to_owned())),
        }
    }

    /// Drains every pending change, oldest first.
    pub fn poll(&self) -> Vec<FileChange> {
        let mut changes = Vec::new();
        while let Some(change) = self.queue.pop() {
            changes.push(change);
        }
        changes
    }

    /// Number of changes waiting to be polled.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

fn worker_loop(rx: &Receiver<notify::Result<NotifyEvent>>, queue: &BoundedQueue<FileChange>) {
    for result in rx {
        match result {
            Ok(event) => {
                let kind = FileChangeKind::from_notify(&event.kind);
                for path in event.paths {
                    debug!(path = %path.display(), ?kind, "file change");
                    queue.push(FileChange { path, kind });
                }
            }
            Err(e) => warn!("file watcher error: {e}"),
        }
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        // Dropping the backend closes the channel, which ends the worker.
        self.watcher = None;
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("file watch worker panicked");
            }
        }
    }
}
