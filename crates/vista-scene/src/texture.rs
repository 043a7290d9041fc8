//! Texture swap pipeline.
//!
//! Requested sources arrive on a `watch` channel. Requests are debounced,
//! identical consecutive sources are dropped, and each accepted request gets
//! a generation number. A load may finish in any order; only the newest
//! generation is ever written into the material.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

use crate::host::ImageLoader;
use crate::material::{ColorSpace, SharedMaterial, TextureMap};
use crate::signal::{DestroySignal, Observable};

pub struct TexturePipeline {
    loader: Arc<dyn ImageLoader>,
    material: SharedMaterial,
    loading: Observable<bool>,
    debounce: Duration,
}

impl TexturePipeline {
    pub fn new(
        loader: Arc<dyn ImageLoader>,
        material: SharedMaterial,
        loading: Observable<bool>,
        debounce: Duration,
    ) -> Self {
        Self {
            loader,
            material,
            loading,
            debounce,
        }
    }

    /// Consume `requests` until `destroy` fires. The value already in the
    /// channel is treated as the first request.
    pub async fn run(self, mut requests: watch::Receiver<String>, destroy: DestroySignal) {
        let mut accepted: Option<String> = None;
        let mut pending = true;
        loop {
            if !pending {
                tokio::select! {
                    biased;
                    _ = destroy.fired() => break,
                    changed = requests.changed() => if changed.is_err() { break },
                }
            }
            pending = false;

            // Restart the quiet window on every new request.
            loop {
                tokio::select! {
                    biased;
                    _ = destroy.fired() => return,
                    changed = requests.changed() => if changed.is_err() { return },
                    _ = tokio::time::sleep(self.debounce) => break,
                }
            }

            let src = requests.borrow_and_update().clone();
            if accepted.as_deref() == Some(src.as_str()) {
                trace!(%src, "texture already requested, skipping");
                continue;
            }
            accepted = Some(src.clone());
            self.begin(src, &destroy);
        }
        trace!("texture pipeline stopped");
    }

    fn begin(&self, src: String, destroy: &DestroySignal) {
        let generation = self.material.next_generation();
        self.loading.set(true);

        if src.is_empty() {
            debug!(generation, "empty texture source, blanking material");
            commit(&self.material, &self.loading, generation, TextureMap::Blank, destroy);
            return;
        }

        info!(%src, generation, "loading panorama texture");
        let load = self.loader.load(&src);
        let material = self.material.clone();
        let loading = self.loading.clone();
        let destroy = destroy.clone();
        tokio::spawn(async move {
            let result = tokio::select! {
                biased;
                _ = destroy.fired() => return,
                result = load => result,
            };
            let map = match result {
                Ok(texture) => TextureMap::Image(texture.with_color_space(ColorSpace::Srgb)),
                Err(e) => {
                    warn!(%src, "panorama texture failed to load: {e}");
                    TextureMap::Blank
                }
            };
            commit(&material, &loading, generation, map, &destroy);
        });
    }
}

/// Write `map` if `generation` is still the newest request. Returns whether
/// the material changed.
///
/// The flag is published after the slot lock is released, and only cleared
/// while `generation` is still the newest request.
fn commit(
    material: &SharedMaterial,
    loading: &Observable<bool>,
    generation: u64,
    map: TextureMap,
    destroy: &DestroySignal,
) -> bool {
    {
        let mut slot = material.lock();
        if destroy.is_fired() {
            return false;
        }
        if !material.is_current(generation) {
            debug!(generation, current = material.generation(), "discarding stale texture");
            return false;
        }
        slot.material.map = map;
        slot.material.version += 1;
    }
    loading.update(|&busy| busy && !material.is_current(generation));
    true
}
