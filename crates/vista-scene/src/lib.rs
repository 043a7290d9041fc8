//! Reactive scene controller for a panoramic interior-style preview.
//!
//! A [`ViewportHost`] owns the drawing surface and, once its size settles,
//! initializes a [`PanoramaApp`]. The app wires four cooperating parts to the
//! host's destruction signal:
//!
//! - the command dispatcher, turning overlay toggles into control flags,
//! - the audio state machine, playing the background track while wanted,
//! - the texture pipeline, swapping panorama images newest-request-wins,
//! - the frame loop, compositing and turning the sphere at a capped rate.
//!
//! Platform services are reached only through the traits in [`host`].

pub mod app;
pub mod audio;
pub mod camera;
pub mod command;
pub mod error;
pub mod frame_loop;
pub mod host;
pub mod material;
pub mod scene;
pub mod signal;
pub mod sphere;
pub mod texture;
pub mod viewport;

#[cfg(test)]
pub(crate) mod testing;

pub use app::{Backends, PanoramaApp};
pub use audio::{AudioState, AudioStateMachine, Visibility};
pub use camera::{OrbitControls, PerspectiveCamera};
pub use command::{Command, ControlStatus, Fullscreen, reduce};
pub use error::{LoadError, RenderError, SceneError};
pub use frame_loop::{AnimationLoop, FrameThrottle};
pub use host::{
    AudioBackend, AudioBuffer, Container, Document, EntryPoint, FrameCallback, FrameHandle,
    FrameScheduler, ImageLoader, LoadFuture, PlaybackSettings, Renderer, RendererOptions, Surface,
    Vendor,
};
pub use material::{ColorSpace, PanoramaMaterial, SharedMaterial, Side, Texture, TextureMap};
pub use scene::{FrameView, PanoramaScene};
pub use signal::{DestroySignal, DestroyTrigger, Observable, Subscription, destroy_channel};
pub use sphere::{SphereGeometry, SphereMesh};
pub use texture::TexturePipeline;
pub use viewport::{Initializer, Mount, ViewportHost, ViewportSize};
