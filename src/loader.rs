use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, Sender};

use anyhow::Context;

/// A parsed glTF file, still CPU-side. Mesh extraction and scene spawning
/// happen on the main thread once the event is drained.
pub struct GltfAsset {
    pub document: gltf::Document,
    pub buffers: Vec<gltf::buffer::Data>,
}

pub enum LoadEvent {
    MannequinLoaded(GltfAsset),
    MannequinFailed(anyhow::Error),
    AnimationLoaded(GltfAsset),
    AnimationFailed(anyhow::Error),
}

#[derive(Clone, Copy)]
enum AssetKind {
    Mannequin,
    Animation,
}

/// Loads glTF assets off the main thread and hands the results back
/// through a channel the frame loop drains. Dropping the loader aborts
/// blocking tasks that have not started running; a parse already in
/// flight runs to completion on the loader's runtime and its event is
/// discarded because the receiver is gone.
pub struct AssetLoader {
    runtime: tokio::runtime::Runtime,
    sender: Sender<LoadEvent>,
    receiver: Receiver<LoadEvent>,
    pending: Vec<tokio::task::JoinHandle<()>>,
}

impl AssetLoader {
    pub fn new() -> anyhow::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("asset-loader")
            .build()
            .context("Failed to create asset loader runtime")?;

        let (sender, receiver) = channel();

        Ok(Self {
            runtime,
            sender,
            receiver,
            pending: Vec::new(),
        })
    }

    pub fn request_mannequin(&mut self, path: impl Into<PathBuf>) {
        self.request(path.into(), AssetKind::Mannequin);
    }

    pub fn request_animation(&mut self, path: impl Into<PathBuf>) {
        self.request(path.into(), AssetKind::Animation);
    }

    fn request(&mut self, path: PathBuf, kind: AssetKind) {
        let sender = self.sender.clone();

        let handle = self.runtime.spawn_blocking(move || {
            let event = match load_gltf(&path) {
                Ok(asset) => match kind {
                    AssetKind::Mannequin => LoadEvent::MannequinLoaded(asset),
                    AssetKind::Animation => LoadEvent::AnimationLoaded(asset),
                },
                Err(error) => match kind {
                    AssetKind::Mannequin => LoadEvent::MannequinFailed(error),
                    AssetKind::Animation => LoadEvent::AnimationFailed(error),
                },
            };

            // The receiver is gone when the viewer has been torn down;
            // there is nobody left to notify.
            let _ = sender.send(event);
        });

        self.pending.push(handle);
    }

    /// Non-blocking; returns the next finished load, if any. The frame
    /// loop calls this once per frame and simply continues when no asset
    /// has arrived yet.
    pub fn try_next(&mut self) -> Option<LoadEvent> {
        self.pending.retain(|handle| !handle.is_finished());
        self.receiver.try_recv().ok()
    }
}

impl Drop for AssetLoader {
    fn drop(&mut self) {
        for handle in self.pending.drain(..) {
            handle.abort();
        }
    }
}

fn load_gltf(path: &Path) -> anyhow::Result<GltfAsset> {
    let (document, buffers, _images) = gltf::import(path)
        .with_context(|| format!("Failed to load glTF asset {}", path.display()))?;

    Ok(GltfAsset { document, buffers })
}
