//! Tile images read from disk on a pool of worker threads.

use std::io;
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};
use image::ImageError;
use tracing::{debug, trace};
use vista_core::Tile;

use crate::asset::ImageAsset;
use crate::completion::{CancelHandle, Completion};
use crate::error::{LoadError, StoreError};
use crate::source::Source;

struct LoadTask {
    path: PathBuf,
    completion: Completion<ImageAsset>,
}

/// A [`Source`] reading one image file per tile.
///
/// Paths come from a template relative to a root directory. The
/// placeholders `{z}`, `{f}`, `{x}` and `{y}` expand to the level, the cube
/// face letter (empty for single-surface geometries), the column and the
/// row, so `"{z}/{f}/{y}/{x}.jpg"` loads `2/b/0/1.jpg` for tile `b/1/0@2`.
pub struct FileSource {
    root: PathBuf,
    template: String,
    task_sender: Option<Sender<LoadTask>>,
    worker_handles: Vec<JoinHandle<()>>,
}

impl FileSource {
    /// Start a source with `workers` decoding threads (0 = one per core).
    pub fn new(
        root: impl Into<PathBuf>,
        template: impl Into<String>,
        workers: usize,
    ) -> Result<Self, StoreError> {
        let worker_count = if workers == 0 {
            num_cpus::get().max(1)
        } else {
            workers
        };
        let (task_tx, task_rx) = crossbeam_channel::unbounded::<LoadTask>();

        let mut worker_handles = Vec::with_capacity(worker_count);
        for index in 0..worker_count {
            let receiver = task_rx.clone();
            let handle = std::thread::Builder::new()
                .name(format!("vista-tile-loader-{index}"))
                .spawn(move || run_worker(&receiver))
                .map_err(StoreError::SpawnWorker)?;
            worker_handles.push(handle);
        }

        let root = root.into();
        let template = template.into();
        debug!(root = %root.display(), %template, worker_count, "Started file tile source");
        Ok(Self {
            root,
            template,
            task_sender: Some(task_tx),
            worker_handles,
        })
    }

    /// Path of the image for `tile`.
    pub fn tile_path(&self, tile: Tile) -> PathBuf {
        let face = tile.face.map(|face| face.as_char().to_string()).unwrap_or_default();
        let relative = self
            .template
            .replace("{z}", &tile.z.to_string())
            .replace("{f}", &face)
            .replace("{x}", &tile.x.to_string())
            .replace("{y}", &tile.y.to_string());
        self.root.join(relative)
    }

    pub fn worker_count(&self) -> usize {
        self.worker_handles.len()
    }

    /// Stop accepting loads and wait for the workers to drain the queue.
    /// Cancelled tasks in the queue are skipped without decoding.
    pub fn shutdown(&mut self) {
        self.task_sender.take();
        for handle in self.worker_handles.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Source for FileSource {
    type Asset = ImageAsset;

    fn load_asset(&mut self, tile: Tile, completion: Completion<ImageAsset>) -> CancelHandle {
        let handle = CancelHandle::from_token(completion.token());
        let path = self.tile_path(tile);
        let Some(sender) = &self.task_sender else {
            completion.fail(LoadError::Io("tile source is shut down".into()));
            return handle;
        };
        if let Err(err) = sender.send(LoadTask { path, completion }) {
            err.into_inner()
                .completion
                .fail(LoadError::Io("tile loader threads exited".into()));
        }
        handle
    }
}

impl Drop for FileSource {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(receiver: &Receiver<LoadTask>) {
    while let Ok(task) = receiver.recv() {
        if task.completion.is_cancelled() {
            trace!(tile = %task.completion.tile(), "Skipping cancelled tile load");
            continue;
        }
        let tile = task.completion.tile();
        let result = decode(&task.path);
        if task.completion.complete(result).is_err() {
            trace!(%tile, "Dropping tile decoded after cancel");
        }
    }
}

fn decode(path: &Path) -> Result<ImageAsset, LoadError> {
    match image::open(path) {
        Ok(image) => Ok(ImageAsset::new(image.to_rgba8())),
        Err(ImageError::IoError(err)) if err.kind() == io::ErrorKind::NotFound => {
            Err(LoadError::NotFound(path.display().to_string()))
        }
        Err(ImageError::IoError(err)) => Err(LoadError::Io(err.to_string())),
        Err(err) => Err(LoadError::Decode(err.to_string())),
    }
}
