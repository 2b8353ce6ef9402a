//! Background page image loading.
//!
//! Every request bumps a generation counter. Completions carry the
//! generation they were issued under; anything older than the latest
//! request is dropped on receipt, so a slow load for a page the user has
//! already left never replaces the current one.

use image::DynamicImage;
use std::path::{Path, PathBuf};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::{LedgerError, LedgerResult};

#[derive(Debug)]
pub struct LoadedImage {
    pub page: usize,
    pub generation: u64,
    pub result: LedgerResult<DynamicImage>,
}

pub struct ImageLoader {
    asset_root: PathBuf,
    runtime: Handle,
    generation: u64,
    tx: mpsc::UnboundedSender<LoadedImage>,
    rx: mpsc::UnboundedReceiver<LoadedImage>,
}

impl ImageLoader {
    /// Loader bound to the current tokio runtime
    pub fn new(asset_root: impl Into<PathBuf>) -> Self {
        Self::with_runtime(asset_root, Handle::current())
    }

    pub fn with_runtime(asset_root: impl Into<PathBuf>, runtime: Handle) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            asset_root: asset_root.into(),
            runtime,
            generation: 0,
            tx,
            rx,
        }
    }

    /// Relative references resolve against the asset root
    pub fn resolve(&self, reference: &str) -> PathBuf {
        let path = Path::new(reference);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.asset_root.join(path)
        }
    }

    /// Start loading `reference` for `page`. A missing reference completes
    /// immediately with a resource error.
    pub fn request(&mut self, page: usize, reference: Option<&str>) -> u64 {
        self.generation += 1;
        let generation = self.generation;
        let tx = self.tx.clone();

        let Some(reference) = reference else {
            let _ = tx.send(LoadedImage {
                page,
                generation,
                result: Err(LedgerError::resource(
                    format!("page {}", page),
                    "no image reference for this page",
                )),
            });
            return generation;
        };

        let path = self.resolve(reference);
        debug!("Loading page {} image {} (generation {})", page, path.display(), generation);
        self.runtime.spawn_blocking(move || {
            let result = image::open(&path)
                .map_err(|e| LedgerError::resource(path.display().to_string(), e.to_string()));
            // Receiver gone means the viewer closed; nothing to report
            let _ = tx.send(LoadedImage {
                page,
                generation,
                result,
            });
        });
        generation
    }

    fn accept(&self, loaded: LoadedImage) -> Option<LoadedImage> {
        if loaded.generation != self.generation {
            debug!(
                "Discarding stale image for page {} (generation {} < {})",
                loaded.page, loaded.generation, self.generation
            );
            return None;
        }
        if let Err(err) = &loaded.result {
            warn!("Page {} image unavailable: {}", loaded.page, err);
        }
        Some(loaded)
    }

    /// Non-blocking poll for the latest completion, for frame loops
    pub fn poll(&mut self) -> Option<LoadedImage> {
        let mut latest = None;
        while let Ok(loaded) = self.rx.try_recv() {
            if let Some(current) = self.accept(loaded) {
                latest = Some(current);
            }
        }
        latest
    }

    /// Wait for the completion of the most recent request
    pub async fn next_current(&mut self) -> Option<LoadedImage> {
        while let Some(loaded) = self.rx.recv().await {
            if let Some(current) = self.accept(loaded) {
                return Some(current);
            }
        }
        None
    }
}
