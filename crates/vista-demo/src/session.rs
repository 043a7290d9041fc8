//! Scripted walkthrough: mount the scene, browse the catalog, exercise every
//! overlay toggle, then unmount.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use vista_catalog::{Browser, StyleCatalog};
use vista_config::Config;
use vista_scene::{AudioState, Backends, PanoramaApp, ViewportHost, ViewportSize};

use crate::assets::{FsAudioBackend, FsImageLoader};
use crate::headless::{HeadlessContainer, HeadlessDocument, HeadlessSurface, IntervalScheduler};

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub refresh_hz: f64,
    /// How long each panorama stays on screen.
    pub dwell: Duration,
    pub pixel_ratio: f64,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            refresh_hz: 60.0,
            dwell: Duration::from_millis(400),
            pixel_ratio: 1.0,
        }
    }
}

/// How often the frame-rate line is logged when `debug.show_fps` is set.
const FPS_REPORT_PERIOD: Duration = Duration::from_secs(2);

/// Display and composite rates over one reporting period.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FpsSample {
    pub display: f64,
    pub composite: f64,
}

/// Turns the scene's running frame counters into per-period rates.
#[derive(Debug, Default)]
struct FpsMeter {
    frames: u64,
    composites: u64,
}

impl FpsMeter {
    fn sample(&mut self, frames: u64, composites: u64, elapsed: Duration) -> Option<FpsSample> {
        let secs = elapsed.as_secs_f64();
        let sample = (secs > 0.0).then(|| FpsSample {
            display: frames.saturating_sub(self.frames) as f64 / secs,
            composite: composites.saturating_sub(self.composites) as f64 / secs,
        });
        self.frames = frames;
        self.composites = composites;
        sample
    }
}

fn spawn_fps_reporter(app: Arc<PanoramaApp>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut meter = FpsMeter::default();
        let mut last = ticker.tick().await;
        loop {
            let now = ticker.tick().await;
            let elapsed = now.duration_since(last);
            last = now;
            let Some((frames, composites)) = app.with_scene(|scene| {
                let throttle = scene.throttle();
                (throttle.frame_count(), throttle.composite_count())
            }) else {
                continue;
            };
            if let Some(fps) = meter.sample(frames, composites, elapsed) {
                info!(
                    display_fps = fps.display,
                    composite_fps = fps.composite,
                    "frame rate"
                );
            }
        }
    })
}

/// What the walkthrough observed.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub panoramas_requested: usize,
    pub frames: u64,
    pub final_source: Option<String>,
    pub audio_state: AudioState,
    pub audio_failed: bool,
    pub fullscreen: bool,
    pub renderer_disposed: bool,
}

pub async fn run(config: Config, catalog: StyleCatalog, options: SessionOptions) -> SessionReport {
    let root = config.texture.asset_root.clone();
    let surface = Arc::new(HeadlessSurface::new(
        ViewportSize::from(&config.viewport),
        options.pixel_ratio,
    ));
    let stats = surface.stats();
    let container = Arc::new(HeadlessContainer::default());
    let fullscreen = container.fullscreen_flag();
    let document = Arc::new(HeadlessDocument::new(container.fullscreen_flag()));
    let (scheduler, driver) = IntervalScheduler::spawn(options.refresh_hz);

    let app = Arc::new(PanoramaApp::new(
        config.clone(),
        Backends {
            document: document.clone(),
            scheduler,
            images: Arc::new(FsImageLoader::new(&root)),
            audio: Arc::new(FsAudioBackend::new(&root)),
        },
    ));
    let _loading = app.loading().subscribe(|loading| info!(loading, "loading indicator"));

    let fps_reporter = config
        .debug
        .show_fps
        .then(|| spawn_fps_reporter(app.clone(), FPS_REPORT_PERIOD));

    let host = ViewportHost::new(&config.viewport, surface, container);
    // A host framework may mount twice in quick succession; only one init runs.
    host.mount(app.clone());
    host.mount(app.clone());
    host.observe_resize(f64::from(config.window.width), f64::from(config.window.height));
    tokio::time::sleep(config.viewport.init_debounce() + Duration::from_millis(50)).await;
    if !app.is_mounted() {
        warn!("scene did not mount");
    }

    let mut browser = Browser::new(catalog);
    let styles: Vec<String> = browser
        .catalog()
        .styles()
        .iter()
        .map(|style| style.name.clone())
        .collect();
    let mut requested = 0;
    for style in &styles {
        browser.select_style(style);
        loop {
            info!(%style, page = %browser.page_label(), "showing panorama");
            app.update_texture(browser.current_source());
            requested += 1;
            tokio::time::sleep(options.dwell).await;
            let page = browser.page();
            if browser.step(1) == page {
                break;
            }
        }
    }

    app.on_click("toggleAudio", false);
    tokio::time::sleep(options.dwell).await;
    document.set_hidden(true);
    tokio::time::sleep(options.dwell / 2).await;
    document.set_hidden(false);
    tokio::time::sleep(options.dwell / 2).await;

    app.on_click("toggleFullscreen", true);
    app.orbit(120.0, -15.0);
    app.on_click("toggleRotation", true);
    tokio::time::sleep(options.dwell).await;
    app.on_click("toggleRotation", false);
    app.on_click("toggleFullscreen", false);
    tokio::time::sleep(options.dwell).await;

    let final_source = app.material().map.source().map(str::to_string);
    let audio_failed = app.audio_error().is_some();
    host.unmount();
    driver.abort();
    if let Some(reporter) = fps_reporter {
        reporter.abort();
    }

    let report = SessionReport {
        panoramas_requested: requested,
        frames: stats.frames(),
        final_source,
        audio_state: app.audio_state(),
        audio_failed,
        fullscreen: fullscreen.load(Ordering::Relaxed),
        renderer_disposed: stats.disposed(),
    };
    info!(?report, "session finished");
    report
}
