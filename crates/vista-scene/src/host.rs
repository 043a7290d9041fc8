//! Seams between the scene controller and the platform that hosts it.
//!
//! Everything the controller needs from the outside world goes through the
//! traits in this module: the drawing surface and its renderer, the container
//! element that can enter fullscreen, the document that can leave it and
//! reports page visibility, the per-display-refresh frame scheduler, and the
//! asset backends. Hosts in a browser bind these to DOM APIs; the demo binary
//! binds them to headless stand-ins.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{LoadError, RenderError};
use crate::material::Texture;
use crate::scene::FrameView;
use crate::signal::Observable;
use crate::viewport::ViewportSize;

/// Boxed future returned by the asset backends.
pub type LoadFuture<T> = Pin<Box<dyn Future<Output = Result<T, LoadError>> + Send + 'static>>;

/// A resolved platform entry point, e.g. the vendor-specific
/// `requestFullscreen` of the container.
pub type EntryPoint = Arc<dyn Fn() + Send + Sync>;

/// Callback run by the [`FrameScheduler`] with the display timestamp.
pub type FrameCallback = Box<dyn FnOnce(Duration) + Send>;

/// Identifies one requested frame so it can be cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(pub u64);

/// Vendor prefix under which a platform API may be exposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Vendor {
    Standard,
    Moz,
    Webkit,
    Ms,
    Opera,
}

/// Order in which fullscreen entry/exit points are tried.
pub const FULLSCREEN_DETECTION_ORDER: [Vendor; 4] =
    [Vendor::Standard, Vendor::Moz, Vendor::Webkit, Vendor::Ms];

/// Order in which page-visibility properties are tried.
pub const VISIBILITY_DETECTION_ORDER: [Vendor; 4] =
    [Vendor::Standard, Vendor::Ms, Vendor::Webkit, Vendor::Opera];

impl Vendor {
    /// Name of the container method that enters fullscreen.
    pub fn request_fullscreen_name(self) -> &'static str {
        match self {
            Vendor::Standard => "requestFullscreen",
            Vendor::Moz => "mozRequestFullScreen",
            Vendor::Webkit => "webkitRequestFullscreen",
            Vendor::Ms => "msRequestFullscreen",
            Vendor::Opera => "oRequestFullscreen",
        }
    }

    /// Name of the document method that leaves fullscreen.
    pub fn exit_fullscreen_name(self) -> &'static str {
        match self {
            Vendor::Standard => "exitFullscreen",
            Vendor::Moz => "mozCancelFullScreen",
            Vendor::Webkit => "webkitExitFullscreen",
            Vendor::Ms => "msExitFullscreen",
            Vendor::Opera => "oExitFullscreen",
        }
    }

    /// Name of the document property holding the hidden flag.
    pub fn hidden_property(self) -> &'static str {
        match self {
            Vendor::Standard => "hidden",
            Vendor::Moz => "mozHidden",
            Vendor::Webkit => "webkitHidden",
            Vendor::Ms => "msHidden",
            Vendor::Opera => "oHidden",
        }
    }

    /// Event fired when the hidden flag changes.
    pub fn visibility_event(self) -> &'static str {
        match self {
            Vendor::Standard => "visibilitychange",
            Vendor::Moz => "mozvisibilitychange",
            Vendor::Webkit => "webkitvisibilitychange",
            Vendor::Ms => "msvisibilitychange",
            Vendor::Opera => "ovisibilitychange",
        }
    }
}

/// Parameters handed to [`Surface::create_renderer`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RendererOptions {
    pub antialias: bool,
    pub size: ViewportSize,
    pub pixel_ratio: f64,
}

/// The drawing surface owned by the viewport host.
pub trait Surface: Send + Sync + 'static {
    /// Laid-out size of the surface element in CSS pixels.
    fn offset_size(&self) -> ViewportSize;

    /// Device pixel ratio of the display showing the surface.
    fn pixel_ratio(&self) -> f64 {
        1.0
    }

    fn create_renderer(&self, options: RendererOptions) -> Result<Box<dyn Renderer>, RenderError>;
}

/// Draws the panorama into a surface.
pub trait Renderer: Send {
    fn set_size(&mut self, size: ViewportSize);

    fn set_pixel_ratio(&mut self, ratio: f64);

    /// Composite one frame.
    fn render(&mut self, frame: &FrameView<'_>);

    /// Release GPU-side resources. Called once at teardown.
    fn dispose(&mut self) {}
}

/// The element that wraps the surface and can be made fullscreen.
pub trait Container: Send + Sync + 'static {
    /// Fullscreen entry point under `vendor`, if the platform exposes one.
    fn fullscreen_entry(&self, vendor: Vendor) -> Option<EntryPoint>;
}

/// The page document.
pub trait Document: Send + Sync + 'static {
    /// Fullscreen exit point under `vendor`, if exposed.
    fn fullscreen_exit(&self, vendor: Vendor) -> Option<EntryPoint>;

    /// Hidden flag under `vendor`, if exposed. `true` while the page is hidden.
    fn visibility(&self, vendor: Vendor) -> Option<Observable<bool>>;
}

/// Display-refresh frame source, the moral equivalent of `requestAnimationFrame`.
///
/// Callbacks must never run synchronously from inside `request_frame`.
pub trait FrameScheduler: Send + Sync + 'static {
    fn request_frame(&self, callback: FrameCallback) -> FrameHandle;

    /// Drop a pending frame. Unknown or already-run handles are ignored.
    fn cancel_frame(&self, handle: FrameHandle);
}

/// Fetches and decodes panorama images.
pub trait ImageLoader: Send + Sync + 'static {
    fn load(&self, src: &str) -> LoadFuture<Texture>;
}

/// Decoded background track.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub track: String,
    pub duration: Duration,
    pub data: Arc<[u8]>,
}

/// How a loaded buffer should play.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackSettings {
    pub looping: bool,
    pub volume: f32,
}

/// Audio output attached to the scene's listener.
pub trait AudioBackend: Send + Sync + 'static {
    fn load(&self, track: &str) -> LoadFuture<AudioBuffer>;

    fn play(&self, buffer: &AudioBuffer, settings: PlaybackSettings);

    fn pause(&self);

    fn stop(&self);

    /// Release the decoded buffer and detach from the listener.
    fn release(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_orders() {
        assert_eq!(FULLSCREEN_DETECTION_ORDER[0], Vendor::Standard);
        assert_eq!(VISIBILITY_DETECTION_ORDER[1], Vendor::Ms);
        assert!(!FULLSCREEN_DETECTION_ORDER.contains(&Vendor::Opera));
    }

    #[test]
    fn test_vendor_names() {
        assert_eq!(Vendor::Moz.request_fullscreen_name(), "mozRequestFullScreen");
        assert_eq!(Vendor::Webkit.exit_fullscreen_name(), "webkitExitFullscreen");
        assert_eq!(Vendor::Opera.hidden_property(), "oHidden");
        assert_eq!(Vendor::Ms.visibility_event(), "msvisibilitychange");
    }
}
