//! Panorama textures and the material slot shared by loader and renderer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::signal::lock;

/// How texel values should be interpreted when sampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorSpace {
    #[default]
    Linear,
    Srgb,
}

/// A decoded RGBA8 image.
#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    pub source: String,
    pub width: u32,
    pub height: u32,
    pub color_space: ColorSpace,
    pub pixels: Arc<[u8]>,
}

impl Texture {
    pub fn rgba8(source: impl Into<String>, width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            source: source.into(),
            width,
            height,
            color_space: ColorSpace::Linear,
            pixels: pixels.into(),
        }
    }

    /// Mark the texels as sRGB-encoded.
    pub fn with_color_space(mut self, color_space: ColorSpace) -> Self {
        self.color_space = color_space;
        self
    }
}

/// What the panorama material currently samples.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum TextureMap {
    /// No request has been applied yet.
    #[default]
    Unset,
    /// Empty placeholder after a failed load or an empty source.
    Blank,
    Image(Texture),
}

impl TextureMap {
    pub fn source(&self) -> Option<&str> {
        match self {
            TextureMap::Image(texture) => Some(&texture.source),
            _ => None,
        }
    }
}

/// Which faces of the sphere are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Front,
    Back,
    Double,
}

/// Unlit material wrapped on the inside of the panorama sphere.
#[derive(Debug, Clone, PartialEq)]
pub struct PanoramaMaterial {
    pub map: TextureMap,
    pub color: [f32; 3],
    pub side: Side,
    /// Bumped each time `map` changes so renderers know to re-upload.
    pub version: u64,
}

impl Default for PanoramaMaterial {
    fn default() -> Self {
        Self {
            map: TextureMap::Unset,
            color: [1.0, 1.0, 1.0],
            side: Side::Back,
            version: 0,
        }
    }
}

/// The material as the renderer sees it.
#[derive(Debug, Default)]
pub struct MaterialSlot {
    pub material: PanoramaMaterial,
}

/// Shared handle to the material slot.
///
/// The texture pipeline writes through it and the renderer reads through it,
/// always under the same lock, so a frame never observes a half-applied map.
/// The generation of the newest texture request lives beside the slot so it
/// can be read without taking that lock.
#[derive(Debug, Clone, Default)]
pub struct SharedMaterial {
    slot: Arc<Mutex<MaterialSlot>>,
    generation: Arc<AtomicU64>,
}

impl SharedMaterial {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock(&self) -> MutexGuard<'_, MaterialSlot> {
        lock(&self.slot)
    }

    /// Copy of the current material.
    pub fn snapshot(&self) -> PanoramaMaterial {
        self.lock().material.clone()
    }

    /// Start a new request generation and return it.
    pub fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Generation of the newest request.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation() == generation
    }
}
