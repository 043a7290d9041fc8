//! In-memory platform doubles shared by the unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::{LoadError, RenderError};
use crate::host::{
    AudioBackend, AudioBuffer, Container, Document, EntryPoint, FrameCallback, FrameHandle,
    FrameScheduler, ImageLoader, LoadFuture, PlaybackSettings, Renderer, RendererOptions, Surface,
    Vendor,
};
use crate::material::Texture;
use crate::scene::FrameView;
use crate::signal::Observable;
use crate::viewport::ViewportSize;

#[derive(Debug, Clone, Default)]
pub struct RenderLog {
    pub last_size: Option<ViewportSize>,
    pub pixel_ratio: Option<f64>,
    pub renders: u64,
    pub last_material_version: Option<u64>,
    pub disposed: bool,
}

struct RecordingRenderer {
    log: Arc<Mutex<RenderLog>>,
}

impl Renderer for RecordingRenderer {
    fn set_size(&mut self, size: ViewportSize) {
        self.log.lock().unwrap().last_size = Some(size);
    }

    fn set_pixel_ratio(&mut self, ratio: f64) {
        self.log.lock().unwrap().pixel_ratio = Some(ratio);
    }

    fn render(&mut self, frame: &FrameView<'_>) {
        let mut log = self.log.lock().unwrap();
        log.renders += 1;
        log.last_material_version = Some(frame.material.version);
    }

    fn dispose(&mut self) {
        self.log.lock().unwrap().disposed = true;
    }
}

pub struct TestSurface {
    size: ViewportSize,
    fail: bool,
    log: Arc<Mutex<RenderLog>>,
}

impl Default for TestSurface {
    fn default() -> Self {
        Self::sized(300, 150)
    }
}

impl TestSurface {
    pub fn sized(width: u32, height: u32) -> Self {
        Self {
            size: ViewportSize::new(width, height),
            fail: false,
            log: Arc::default(),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn log(&self) -> RenderLog {
        self.log.lock().unwrap().clone()
    }
}

impl Surface for TestSurface {
    fn offset_size(&self) -> ViewportSize {
        self.size
    }

    fn create_renderer(&self, _options: RendererOptions) -> Result<Box<dyn Renderer>, RenderError> {
        if self.fail {
            return Err(RenderError::ContextUnavailable("test surface".to_string()));
        }
        Ok(Box::new(RecordingRenderer {
            log: Arc::clone(&self.log),
        }))
    }
}

fn counting_entry(counter: &Arc<AtomicUsize>) -> EntryPoint {
    let counter = Arc::clone(counter);
    Arc::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    })
}

pub struct TestContainer {
    vendors: Vec<Vendor>,
    entered: Arc<AtomicUsize>,
}

impl TestContainer {
    pub fn unsupported() -> Self {
        Self::with_entry(&[])
    }

    pub fn with_entry(vendors: &[Vendor]) -> Self {
        Self {
            vendors: vendors.to_vec(),
            entered: Arc::default(),
        }
    }

    pub fn entered(&self) -> usize {
        self.entered.load(Ordering::SeqCst)
    }
}

impl Container for TestContainer {
    fn fullscreen_entry(&self, vendor: Vendor) -> Option<EntryPoint> {
        self.vendors
            .contains(&vendor)
            .then(|| counting_entry(&self.entered))
    }
}

#[derive(Default)]
pub struct TestDocument {
    exit_vendors: Vec<Vendor>,
    exited: Arc<AtomicUsize>,
    visibility: Option<(Vendor, Observable<bool>)>,
}

impl TestDocument {
    pub fn with_exit(vendors: &[Vendor]) -> Self {
        Self {
            exit_vendors: vendors.to_vec(),
            ..Self::default()
        }
    }

    pub fn with_visibility(vendor: Vendor) -> Self {
        Self::default().visible_via(vendor)
    }

    pub fn visible_via(mut self, vendor: Vendor) -> Self {
        self.visibility = Some((vendor, Observable::new(false)));
        self
    }

    pub fn hidden(&self) -> Option<Observable<bool>> {
        self.visibility.as_ref().map(|(_, hidden)| hidden.clone())
    }

    pub fn set_hidden(&self, hidden: bool) {
        if let Some((_, flag)) = &self.visibility {
            flag.set(hidden);
        }
    }

    pub fn exited(&self) -> usize {
        self.exited.load(Ordering::SeqCst)
    }
}

impl Document for TestDocument {
    fn fullscreen_exit(&self, vendor: Vendor) -> Option<EntryPoint> {
        self.exit_vendors
            .contains(&vendor)
            .then(|| counting_entry(&self.exited))
    }

    fn visibility(&self, vendor: Vendor) -> Option<Observable<bool>> {
        match &self.visibility {
            Some((v, hidden)) if *v == vendor => Some(hidden.clone()),
            _ => None,
        }
    }
}

#[derive(Default)]
struct SchedulerState {
    next_id: u64,
    pending: Vec<(FrameHandle, FrameCallback)>,
    cancelled: usize,
}

/// Frame scheduler advanced by hand with [`tick`](Self::tick).
#[derive(Default)]
pub struct ManualScheduler {
    state: Mutex<SchedulerState>,
}

impl ManualScheduler {
    /// Run every pending callback with `timestamp`. Returns whether any ran.
    pub fn tick(&self, timestamp: Duration) -> bool {
        let due = std::mem::take(&mut self.state.lock().unwrap().pending);
        let ran = !due.is_empty();
        for (_, callback) in due {
            callback(timestamp);
        }
        ran
    }

    pub fn pending_count(&self) -> usize {
        self.state.lock().unwrap().pending.len()
    }

    pub fn cancelled(&self) -> usize {
        self.state.lock().unwrap().cancelled
    }
}

impl FrameScheduler for ManualScheduler {
    fn request_frame(&self, callback: FrameCallback) -> FrameHandle {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let handle = FrameHandle(state.next_id);
        state.pending.push((handle, callback));
        handle
    }

    fn cancel_frame(&self, handle: FrameHandle) {
        let mut state = self.state.lock().unwrap();
        let before = state.pending.len();
        state.pending.retain(|(h, _)| *h != handle);
        if state.pending.len() != before {
            state.cancelled += 1;
        }
    }
}

/// Image loader with scripted per-source delays and outcomes.
#[derive(Default)]
pub struct TestImageLoader {
    scripted: HashMap<String, (Duration, bool)>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl TestImageLoader {
    pub fn with_image(mut self, src: &str, delay: Duration) -> Self {
        self.scripted.insert(src.to_string(), (delay, true));
        self
    }

    pub fn with_failure(mut self, src: &str, delay: Duration) -> Self {
        self.scripted.insert(src.to_string(), (delay, false));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl ImageLoader for TestImageLoader {
    fn load(&self, src: &str) -> LoadFuture<Texture> {
        self.calls.lock().unwrap().push(src.to_string());
        let src = src.to_string();
        let scripted = self.scripted.get(&src).copied();
        Box::pin(async move {
            match scripted {
                Some((delay, ok)) => {
                    tokio::time::sleep(delay).await;
                    if ok {
                        Ok(Texture::rgba8(src, 2, 1, vec![255; 8]))
                    } else {
                        Err(LoadError::Decode {
                            src,
                            reason: "corrupt".to_string(),
                        })
                    }
                }
                None => Err(LoadError::NotFound(src)),
            }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioEvent {
    Load,
    Play,
    Pause,
    Stop,
    Release,
}

#[derive(Default)]
pub struct TestAudioBackend {
    delay: Duration,
    failing: AtomicBool,
    events: Mutex<Vec<AudioEvent>>,
    settings: Mutex<Option<PlaybackSettings>>,
}

impl TestAudioBackend {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        let backend = Self::default();
        backend.set_failing(true);
        backend
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<AudioEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn loads(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| **e == AudioEvent::Load)
            .count()
    }

    pub fn last_settings(&self) -> Option<PlaybackSettings> {
        *self.settings.lock().unwrap()
    }

    fn record(&self, event: AudioEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl AudioBackend for TestAudioBackend {
    fn load(&self, track: &str) -> LoadFuture<AudioBuffer> {
        self.record(AudioEvent::Load);
        let track = track.to_string();
        let delay = self.delay;
        let failing = self.failing.load(Ordering::SeqCst);
        Box::pin(async move {
            tokio::time::sleep(delay).await;
            if failing {
                return Err(LoadError::NotFound(track));
            }
            Ok(AudioBuffer {
                track,
                duration: Duration::from_secs(90),
                data: Arc::from(vec![0u8; 16]),
            })
        })
    }

    fn play(&self, _buffer: &AudioBuffer, settings: PlaybackSettings) {
        *self.settings.lock().unwrap() = Some(settings);
        self.record(AudioEvent::Play);
    }

    fn pause(&self) {
        self.record(AudioEvent::Pause);
    }

    fn stop(&self) {
        self.record(AudioEvent::Stop);
    }

    fn release(&self) {
        self.record(AudioEvent::Release);
    }
}
