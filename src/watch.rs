//! Passive change detection for the loaded config file.
//!
//! The watcher only bumps a generation counter. Nothing is re-read on the
//! watcher thread; the loader compares generations on the next `reload()`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{info, warn};

/// A running watch on one file. Dropping it stops the watch.
pub struct FileWatch {
    generation: Arc<AtomicU64>,
    _watcher: RecommendedWatcher,
}

impl FileWatch {
    /// Watch `path` for content changes.
    ///
    /// The parent directory is watched rather than the file itself, so editors
    /// that replace the file on save are still noticed.
    pub fn start(path: &Path) -> Result<Self, notify::Error> {
        let generation = Arc::new(AtomicU64::new(0));
        let target = path.to_path_buf();
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let counter = Arc::clone(&generation);
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if is_change(&event) && event.paths.iter().any(|p| p == &target) {
                        let generation = counter.fetch_add(1, Ordering::AcqRel) + 1;
                        info!(path = %target.display(), generation, "config file changed");
                    }
                }
                Err(e) => warn!(error = %e, "config watch error"),
            },
            notify::Config::default(),
        )?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        Ok(Self {
            generation,
            _watcher: watcher,
        })
    }

    /// Number of changes observed since the watch started.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}

fn is_change(event: &Event) -> bool {
    event.kind.is_modify() || event.kind.is_create()
}
