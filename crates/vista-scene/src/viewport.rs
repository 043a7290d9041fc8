//! Viewport host: owns the drawing surface, tracks its size and decides when
//! the scene may initialize and when it must be torn down.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, error, info, trace, warn};
use vista_config::ViewportConfig;

use crate::error::SceneError;
use crate::host::{Container, Surface};
use crate::signal::{DestroySignal, DestroyTrigger, Observable, destroy_channel, lock};

/// Integer content size of the viewport in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewportSize {
    pub width: u32,
    pub height: u32,
}

impl ViewportSize {
    /// Size reported before the first resize observation.
    pub const DEFAULT: Self = Self {
        width: 300,
        height: 150,
    };

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Floor a fractional content rectangle. Negative or NaN extents become 0.
    pub fn from_content_rect(width: f64, height: f64) -> Self {
        let floor = |v: f64| if v.is_finite() && v > 0.0 { v.floor() as u32 } else { 0 };
        Self {
            width: floor(width),
            height: floor(height),
        }
    }

    /// Width over height, treating a zero height as one pixel.
    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }
}

impl Default for ViewportSize {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<&ViewportConfig> for ViewportSize {
    fn from(config: &ViewportConfig) -> Self {
        Self::new(config.default_width, config.default_height)
    }
}

/// Everything an initializer receives once the viewport is ready.
#[derive(Clone)]
pub struct Mount {
    pub surface: Arc<dyn Surface>,
    /// Current size; replays to new subscribers.
    pub sizes: Observable<ViewportSize>,
    pub destroy: DestroySignal,
    pub container: Arc<dyn Container>,
}

/// Scene entry point invoked by the host once the surface is settled.
pub trait Initializer: Send + Sync + 'static {
    fn init(&self, mount: Mount) -> Result<(), SceneError>;
}

impl<F> Initializer for F
where
    F: Fn(Mount) -> Result<(), SceneError> + Send + Sync + 'static,
{
    fn init(&self, mount: Mount) -> Result<(), SceneError> {
        self(mount)
    }
}

#[derive(Default)]
struct PendingInit {
    generation: u64,
    initializer: Option<Arc<dyn Initializer>>,
    initialized: bool,
}

/// Owns one surface for its whole life. Single use: once unmounted it cannot
/// be mounted again.
pub struct ViewportHost {
    surface: Arc<dyn Surface>,
    container: Arc<dyn Container>,
    sizes: Observable<ViewportSize>,
    trigger: DestroyTrigger,
    observing: AtomicBool,
    pending: Arc<Mutex<PendingInit>>,
    init_debounce: Duration,
}

impl ViewportHost {
    /// Create the host and start observing the surface size.
    pub fn new(
        config: &ViewportConfig,
        surface: Arc<dyn Surface>,
        container: Arc<dyn Container>,
    ) -> Self {
        let (trigger, _signal) = destroy_channel();
        Self {
            surface,
            container,
            sizes: Observable::new(ViewportSize::from(config)),
            trigger,
            observing: AtomicBool::new(true),
            pending: Arc::new(Mutex::new(PendingInit::default())),
            init_debounce: config.init_debounce(),
        }
    }

    /// Request initialization with `initializer`.
    ///
    /// Calls within the debounce window collapse: only the last initializer
    /// runs, once, after the window has been quiet. Must be called from
    /// inside a tokio runtime.
    pub fn mount(&self, initializer: Arc<dyn Initializer>) {
        if self.trigger.is_fired() {
            warn!("mount requested on an unmounted viewport, ignoring");
            return;
        }
        let generation = {
            let mut pending = lock(&self.pending);
            if pending.initialized {
                debug!("viewport already initialized, ignoring mount");
                return;
            }
            pending.generation += 1;
            pending.initializer = Some(initializer);
            pending.generation
        };
        trace!(generation, "scheduling debounced init");

        let pending = Arc::clone(&self.pending);
        let destroy = self.trigger.signal();
        let mount = Mount {
            surface: Arc::clone(&self.surface),
            sizes: self.sizes.clone(),
            destroy: destroy.clone(),
            container: Arc::clone(&self.container),
        };
        let delay = self.init_debounce;
        tokio::spawn(async move {
            tokio::select! {
                _ = destroy.fired() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            let initializer = {
                let mut pending = lock(&pending);
                if pending.generation != generation || pending.initialized || destroy.is_fired() {
                    return;
                }
                pending.initialized = true;
                pending.initializer.take()
            };
            let Some(initializer) = initializer else {
                return;
            };
            info!(size = ?mount.sizes.get(), "initializing scene");
            if let Err(e) = initializer.init(mount) {
                error!("scene initialization failed: {e}");
            }
        });
    }

    /// Feed a resize-observer content rectangle. Ignored once unmounted.
    pub fn observe_resize(&self, width: f64, height: f64) {
        if !self.observing.load(Ordering::Acquire) {
            return;
        }
        let size = ViewportSize::from_content_rect(width, height);
        if self.sizes.set(size) {
            trace!(width = size.width, height = size.height, "viewport resized");
        }
    }

    /// Tear down: emit destruction, then stop observing the surface.
    ///
    /// Returns `false` if already unmounted.
    pub fn unmount(&self) -> bool {
        if !self.trigger.fire() {
            return false;
        }
        self.observing.store(false, Ordering::Release);
        lock(&self.pending).initializer = None;
        info!("viewport unmounted");
        true
    }

    pub fn size(&self) -> ViewportSize {
        self.sizes.get()
    }

    pub fn sizes(&self) -> Observable<ViewportSize> {
        self.sizes.clone()
    }

    pub fn destroy_signal(&self) -> DestroySignal {
        self.trigger.signal()
    }

    pub fn is_initialized(&self) -> bool {
        lock(&self.pending).initialized
    }

    pub fn is_unmounted(&self) -> bool {
        self.trigger.is_fired()
    }
}

impl Drop for ViewportHost {
    fn drop(&mut self) {
        self.unmount();
    }
}
