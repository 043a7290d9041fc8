//! Headless platform: a surface with a logging renderer, fullscreen and
//! visibility flags, and a timer-driven frame scheduler.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, trace};
use vista_scene::{
    Container, Document, EntryPoint, FrameCallback, FrameHandle, FrameScheduler, FrameView,
    Observable, RenderError, Renderer, RendererOptions, Surface, Vendor, ViewportSize,
};

/// Counters shared between the headless renderer and the session report.
#[derive(Debug, Default)]
pub struct RenderStats {
    frames: AtomicU64,
    material_version: AtomicU64,
    disposed: AtomicBool,
}

impl RenderStats {
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    pub fn material_version(&self) -> u64 {
        self.material_version.load(Ordering::Relaxed)
    }

    pub fn disposed(&self) -> bool {
        self.disposed.load(Ordering::Relaxed)
    }
}

pub struct HeadlessSurface {
    size: ViewportSize,
    pixel_ratio: f64,
    stats: Arc<RenderStats>,
}

impl HeadlessSurface {
    pub fn new(size: ViewportSize, pixel_ratio: f64) -> Self {
        Self {
            size,
            pixel_ratio,
            stats: Arc::default(),
        }
    }

    pub fn stats(&self) -> Arc<RenderStats> {
        Arc::clone(&self.stats)
    }
}

impl Surface for HeadlessSurface {
    fn offset_size(&self) -> ViewportSize {
        self.size
    }

    fn pixel_ratio(&self) -> f64 {
        self.pixel_ratio
    }

    fn create_renderer(&self, options: RendererOptions) -> Result<Box<dyn Renderer>, RenderError> {
        if options.size.width == 0 || options.size.height == 0 {
            return Err(RenderError::EmptySurface {
                width: options.size.width,
                height: options.size.height,
            });
        }
        info!(
            antialias = options.antialias,
            pixel_ratio = options.pixel_ratio,
            "headless renderer created"
        );
        Ok(Box::new(LogRenderer {
            stats: Arc::clone(&self.stats),
        }))
    }
}

struct LogRenderer {
    stats: Arc<RenderStats>,
}

impl Renderer for LogRenderer {
    fn set_size(&mut self, size: ViewportSize) {
        debug!(width = size.width, height = size.height, "renderer resized");
    }

    fn set_pixel_ratio(&mut self, ratio: f64) {
        debug!(ratio, "renderer pixel ratio");
    }

    fn render(&mut self, frame: &FrameView<'_>) {
        self.stats.frames.fetch_add(1, Ordering::Relaxed);
        let version = frame.material.version;
        if self.stats.material_version.swap(version, Ordering::Relaxed) != version {
            info!(
                source = frame.material.map.source().unwrap_or("<blank>"),
                version, "panorama texture uploaded"
            );
        }
        trace!(rotation = frame.rotation_y, aspect = frame.camera.aspect_ratio, "composite");
    }

    fn dispose(&mut self) {
        self.stats.disposed.store(true, Ordering::Relaxed);
        info!(frames = self.stats.frames(), "headless renderer disposed");
    }
}

/// Container exposing only the standard fullscreen entry point.
#[derive(Default)]
pub struct HeadlessContainer {
    fullscreen: Arc<AtomicBool>,
}

impl HeadlessContainer {
    pub fn fullscreen_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.fullscreen)
    }
}

impl Container for HeadlessContainer {
    fn fullscreen_entry(&self, vendor: Vendor) -> Option<EntryPoint> {
        if vendor != Vendor::Standard {
            return None;
        }
        let flag = Arc::clone(&self.fullscreen);
        Some(Arc::new(move || {
            flag.store(true, Ordering::Relaxed);
            info!("entered fullscreen");
        }))
    }
}

/// Document with standard fullscreen exit and a settable hidden flag.
pub struct HeadlessDocument {
    fullscreen: Arc<AtomicBool>,
    hidden: Observable<bool>,
}

impl HeadlessDocument {
    pub fn new(fullscreen: Arc<AtomicBool>) -> Self {
        Self {
            fullscreen,
            hidden: Observable::new(false),
        }
    }

    pub fn set_hidden(&self, hidden: bool) {
        if self.hidden.set(hidden) {
            info!(hidden, "page visibility changed");
        }
    }
}

impl Document for HeadlessDocument {
    fn fullscreen_exit(&self, vendor: Vendor) -> Option<EntryPoint> {
        if vendor != Vendor::Standard {
            return None;
        }
        let flag = Arc::clone(&self.fullscreen);
        Some(Arc::new(move || {
            flag.store(false, Ordering::Relaxed);
            info!("left fullscreen");
        }))
    }

    fn visibility(&self, vendor: Vendor) -> Option<Observable<bool>> {
        (vendor == Vendor::Standard).then(|| self.hidden.clone())
    }
}

/// Refresh rates are clamped into this range; NaN falls back to 60 Hz.
const REFRESH_HZ_RANGE: (f64, f64) = (1.0, 1000.0);

/// Tick period for `refresh_hz`, never zero.
fn refresh_period(refresh_hz: f64) -> Duration {
    let hz = if refresh_hz.is_nan() { 60.0 } else { refresh_hz };
    Duration::from_secs_f64(1.0 / hz.clamp(REFRESH_HZ_RANGE.0, REFRESH_HZ_RANGE.1))
}

#[derive(Default)]
struct SchedulerState {
    next_id: u64,
    pending: Vec<(FrameHandle, FrameCallback)>,
}

/// Fires pending frame callbacks on a fixed refresh interval.
pub struct IntervalScheduler {
    state: Mutex<SchedulerState>,
    origin: Instant,
}

impl IntervalScheduler {
    /// Start the refresh driver at `refresh_hz`.
    pub fn spawn(refresh_hz: f64) -> (Arc<Self>, JoinHandle<()>) {
        let scheduler = Arc::new(Self {
            state: Mutex::new(SchedulerState::default()),
            origin: Instant::now(),
        });
        let period = refresh_period(refresh_hz);
        let driver = Arc::clone(&scheduler);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                let now = ticker.tick().await;
                driver.fire(now.duration_since(driver.origin));
            }
        });
        info!(refresh_hz, ?period, "frame scheduler started");
        (scheduler, handle)
    }

    fn fire(&self, timestamp: Duration) {
        let due = std::mem::take(
            &mut self
                .state
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pending,
        );
        for (_, callback) in due {
            callback(timestamp);
        }
    }
}

impl FrameScheduler for IntervalScheduler {
    fn request_frame(&self, callback: FrameCallback) -> FrameHandle {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.next_id += 1;
        let handle = FrameHandle(state.next_id);
        state.pending.push((handle, callback));
        handle
    }

    fn cancel_frame(&self, handle: FrameHandle) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pending
            .retain(|(h, _)| *h != handle);
    }
}
