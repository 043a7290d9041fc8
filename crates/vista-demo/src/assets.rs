//! File-system asset backends rooted at the configured asset directory.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};
use vista_scene::{AudioBackend, AudioBuffer, ImageLoader, LoadError, LoadFuture, PlaybackSettings, Texture};

fn read_error(src: &str, e: io::Error) -> LoadError {
    match e.kind() {
        io::ErrorKind::NotFound => LoadError::NotFound(src.to_string()),
        _ => LoadError::Io {
            src: src.to_string(),
            reason: e.to_string(),
        },
    }
}

fn decode_error(src: &str, e: image::ImageError) -> LoadError {
    let (src, reason) = (src.to_string(), e.to_string());
    match e {
        image::ImageError::Unsupported(_) => LoadError::Unsupported { src, reason },
        _ => LoadError::Decode { src, reason },
    }
}

/// Reads panorama images from disk and decodes them off the async threads.
pub struct FsImageLoader {
    root: PathBuf,
}

impl FsImageLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ImageLoader for FsImageLoader {
    fn load(&self, src: &str) -> LoadFuture<Texture> {
        let path = self.root.join(src);
        let src = src.to_string();
        Box::pin(async move {
            let bytes = tokio::fs::read(&path)
                .await
                .map_err(|e| read_error(&src, e))?;
            debug!(%src, bytes = bytes.len(), "decoding panorama");
            let decoded = tokio::task::spawn_blocking(move || {
                image::load_from_memory(&bytes).map(|image| image.to_rgba8())
            })
            .await
            .map_err(|_| LoadError::Cancelled(src.clone()))?
            .map_err(|e| decode_error(&src, e))?;
            let (width, height) = decoded.dimensions();
            Ok(Texture::rgba8(src, width, height, decoded.into_raw()))
        })
    }
}

/// Reads the background track from disk. Playback is simulated: the backend
/// only tracks whether it would be audible.
pub struct FsAudioBackend {
    root: PathBuf,
    playing: Arc<AtomicBool>,
}

impl FsAudioBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            playing: Arc::default(),
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Relaxed)
    }
}

impl AudioBackend for FsAudioBackend {
    fn load(&self, track: &str) -> LoadFuture<AudioBuffer> {
        let path = self.root.join(track);
        let track = track.to_string();
        Box::pin(async move {
            let bytes = tokio::fs::read(&path)
                .await
                .map_err(|e| read_error(&track, e))?;
            info!(%track, bytes = bytes.len(), "background track loaded");
            Ok(AudioBuffer {
                track,
                duration: Duration::ZERO,
                data: bytes.into(),
            })
        })
    }

    fn play(&self, buffer: &AudioBuffer, settings: PlaybackSettings) {
        self.playing.store(true, Ordering::Relaxed);
        info!(
            track = %buffer.track,
            volume = settings.volume,
            looping = settings.looping,
            "audio playing"
        );
    }

    fn pause(&self) {
        self.playing.store(false, Ordering::Relaxed);
        info!("audio paused");
    }

    fn stop(&self) {
        self.playing.store(false, Ordering::Relaxed);
        debug!("audio stopped");
    }

    fn release(&self) {
        debug!("audio buffer released");
    }
}
