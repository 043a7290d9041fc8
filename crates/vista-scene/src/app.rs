//! The panorama application: owns the reactive state and wires every scene
//! component together when the viewport host initializes it.

use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};
use vista_config::Config;

use crate::audio::{AudioState, AudioStateMachine, Visibility};
use crate::command::{self, Command, ControlStatus, Fullscreen};
use crate::error::{LoadError, SceneError};
use crate::frame_loop::AnimationLoop;
use crate::host::{AudioBackend, Document, FrameScheduler, ImageLoader};
use crate::material::{PanoramaMaterial, SharedMaterial};
use crate::scene::PanoramaScene;
use crate::signal::{Observable, lock};
use crate::texture::TexturePipeline;
use crate::viewport::{Initializer, Mount};

/// Platform services the app needs besides what the viewport provides.
#[derive(Clone)]
pub struct Backends {
    pub document: Arc<dyn Document>,
    pub scheduler: Arc<dyn FrameScheduler>,
    pub images: Arc<dyn ImageLoader>,
    pub audio: Arc<dyn AudioBackend>,
}

/// Panoramic preview application.
///
/// Create it once, hand it to a [`ViewportHost`](crate::ViewportHost) as the
/// initializer, and drive it with texture requests and overlay commands.
/// Everything can be called before the scene is mounted; requests and
/// commands are queued until it is.
pub struct PanoramaApp {
    config: Config,
    backends: Backends,
    requests: watch::Sender<String>,
    commands: mpsc::UnboundedSender<Command>,
    pending_commands: Mutex<Option<mpsc::UnboundedReceiver<Command>>>,
    controls: Observable<ControlStatus>,
    loading: Observable<bool>,
    material: SharedMaterial,
    audio: Arc<AudioStateMachine>,
    scene: Mutex<Option<Arc<Mutex<PanoramaScene>>>>,
}

impl PanoramaApp {
    pub fn new(config: Config, backends: Backends) -> Self {
        let (requests, _) = watch::channel(String::new());
        let (commands, pending) = mpsc::unbounded_channel();
        let audio = Arc::new(AudioStateMachine::new(
            &config.audio,
            Arc::clone(&backends.audio),
        ));
        Self {
            config,
            backends,
            requests,
            commands,
            pending_commands: Mutex::new(Some(pending)),
            controls: Observable::new(ControlStatus::default()),
            loading: Observable::new(true),
            material: SharedMaterial::new(),
            audio,
            scene: Mutex::new(None),
        }
    }

    /// Request a panorama source. The newest request always wins.
    pub fn update_texture(&self, src: impl Into<String>) {
        let src = src.into();
        debug!(%src, "texture requested");
        self.requests.send_replace(src);
    }

    /// Overlay click handler: unknown tags are ignored.
    pub fn on_click(&self, tag: &str, status: bool) {
        match Command::parse(tag, status) {
            Some(command) => self.dispatch(command),
            None => debug!(tag, "ignoring unknown command"),
        }
    }

    pub fn dispatch(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!(tag = command.tag(), "scene torn down, dropping command");
        }
    }

    /// `true` while a texture request is in flight.
    pub fn loading(&self) -> Observable<bool> {
        self.loading.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.get()
    }

    /// Whether the background audio is switched off.
    pub fn mute(&self) -> bool {
        self.controls.get().audio_stopped
    }

    pub fn controls(&self) -> ControlStatus {
        self.controls.get()
    }

    pub fn control_changes(&self) -> Observable<ControlStatus> {
        self.controls.clone()
    }

    pub fn audio_state(&self) -> AudioState {
        self.audio.state()
    }

    pub fn audio_error(&self) -> Option<LoadError> {
        self.audio.last_error()
    }

    pub fn material(&self) -> PanoramaMaterial {
        self.material.snapshot()
    }

    /// Orbit the camera by a pointer drag. No-op until mounted.
    pub fn orbit(&self, delta_x: f32, delta_y: f32) -> bool {
        self.with_scene(|scene| scene.orbit(delta_x, delta_y))
            .unwrap_or(false)
    }

    /// Run `f` against the mounted scene.
    pub fn with_scene<R>(&self, f: impl FnOnce(&mut PanoramaScene) -> R) -> Option<R> {
        let scene = lock(&self.scene).clone()?;
        let mut scene = lock(&scene);
        Some(f(&mut scene))
    }

    pub fn is_mounted(&self) -> bool {
        lock(&self.scene).is_some()
    }

    fn mount(&self, mount: Mount) -> Result<(), SceneError> {
        let mut pending = lock(&self.pending_commands);
        if pending.is_none() {
            return Err(SceneError::AlreadyMounted);
        }
        let scene = PanoramaScene::new(&self.config.render, &*mount.surface, self.material.clone())?;
        let commands = pending.take().ok_or(SceneError::AlreadyMounted)?;
        drop(pending);

        let scene = Arc::new(Mutex::new(scene));
        let destroy = mount.destroy.clone();

        let size_subscription = mount.sizes.subscribe_current({
            let scene = Arc::clone(&scene);
            move |size| lock(&scene).resize(*size)
        });

        if self.config.render.auto_rotate {
            self.controls
                .update(|state| command::reduce(*state, &Command::ToggleRotation(false)));
        }

        let visibility = Visibility::detect(&*self.backends.document);
        self.audio
            .start(&self.controls, visibility, destroy.clone());

        let pipeline = TexturePipeline::new(
            Arc::clone(&self.backends.images),
            self.material.clone(),
            self.loading.clone(),
            self.config.texture.request_debounce(),
        );
        tokio::spawn(pipeline.run(self.requests.subscribe(), destroy.clone()));

        let fullscreen = Fullscreen::detect(&*mount.container, &*self.backends.document);
        tokio::spawn(command::run_dispatcher(
            commands,
            self.controls.clone(),
            fullscreen,
            destroy.clone(),
        ));

        let animation = AnimationLoop::start(Arc::clone(&self.backends.scheduler), {
            let scene = Arc::clone(&scene);
            let controls = self.controls.clone();
            move |timestamp| {
                let status = controls.get();
                lock(&scene).frame(timestamp, status);
            }
        });

        destroy.on_destroy({
            let scene = Arc::clone(&scene);
            move || {
                animation.stop();
                drop(size_subscription);
                let mut scene = lock(&scene);
                scene.dispose();
                info!(renders = scene.render_count(), "panorama scene destroyed");
            }
        });

        *lock(&self.scene) = Some(scene);
        info!("panorama scene mounted");
        Ok(())
    }
}

impl Initializer for PanoramaApp {
    fn init(&self, mount: Mount) -> Result<(), SceneError> {
        self.mount(mount).inspect_err(|e| warn!("panorama mount failed: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::Vendor;
    use crate::material::TextureMap;
    use crate::testing::{
        ManualScheduler, TestAudioBackend, TestContainer, TestDocument, TestImageLoader,
        TestSurface,
    };
    use crate::viewport::{ViewportHost, ViewportSize};
    use std::time::Duration;

    struct Rig {
        app: Arc<PanoramaApp>,
        host: ViewportHost,
        surface: Arc<TestSurface>,
        container: Arc<TestContainer>,
        document: Arc<TestDocument>,
        scheduler: Arc<ManualScheduler>,
        audio: Arc<TestAudioBackend>,
    }

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn rig_with(config: Config, images: TestImageLoader) -> Rig {
        let surface = Arc::new(TestSurface::default());
        let container = Arc::new(TestContainer::with_entry(&[Vendor::Standard]));
        let document = Arc::new(TestDocument::with_exit(&[Vendor::Standard]).visible_via(Vendor::Standard));
        let scheduler = Arc::new(ManualScheduler::default());
        let audio = Arc::new(TestAudioBackend::default());
        let app = Arc::new(PanoramaApp::new(
            config.clone(),
            Backends {
                document: document.clone(),
                scheduler: scheduler.clone(),
                images: Arc::new(images),
                audio: audio.clone(),
            },
        ));
        let host = ViewportHost::new(&config.viewport, surface.clone(), container.clone());
        Rig {
            app,
            host,
            surface,
            container,
            document,
            scheduler,
            audio,
        }
    }

    fn rig() -> Rig {
        rig_with(
            Config::default(),
            TestImageLoader::default()
                .with_image("a.jpg", ms(10))
                .with_image("b.jpg", ms(10)),
        )
    }

    async fn mounted() -> Rig {
        let rig = rig();
        rig.host.mount(rig.app.clone());
        tokio::time::sleep(ms(150)).await;
        assert!(rig.app.is_mounted());
        rig
    }

    /// Drive `frames` display frames at `hz`, starting at `start`.
    fn run_frames(scheduler: &ManualScheduler, start: Duration, hz: f64, frames: u32) -> Duration {
        let step = Duration::from_secs_f64(1.0 / hz);
        let mut t = start;
        for _ in 0..frames {
            scheduler.tick(t);
            t += step;
        }
        t
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_state_before_mount() {
        let rig = rig();
        assert!(rig.app.mute());
        assert!(rig.app.controls().disable_rotating);
        assert!(rig.app.is_loading());
        assert!(!rig.app.orbit(10.0, 0.0));
        assert_eq!(rig.app.material().map, TextureMap::Unset);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mount_enables_auto_rotation() {
        let rig = mounted().await;
        assert!(!rig.app.controls().disable_rotating);
        assert!(rig.app.mute());
        assert_eq!(rig.scheduler.pending_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_rotate_off_keeps_rotation_disabled() {
        let mut config = Config::default();
        config.render.auto_rotate = false;
        let rig = rig_with(config, TestImageLoader::default());
        rig.host.mount(rig.app.clone());
        tokio::time::sleep(ms(150)).await;
        assert!(rig.app.controls().disable_rotating);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_init_is_rejected() {
        let rig = mounted().await;
        let (_trigger, destroy) = crate::signal::destroy_channel();
        let mount = Mount {
            surface: rig.surface.clone(),
            sizes: Observable::new(ViewportSize::DEFAULT),
            destroy,
            container: rig.container.clone(),
        };
        assert!(matches!(rig.app.init(mount), Err(SceneError::AlreadyMounted)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_renderer_failure_leaves_app_mountable() {
        let rig = rig();
        let (_trigger, destroy) = crate::signal::destroy_channel();
        let failing = Mount {
            surface: Arc::new(TestSurface::failing()),
            sizes: Observable::new(ViewportSize::DEFAULT),
            destroy: destroy.clone(),
            container: rig.container.clone(),
        };
        assert!(matches!(rig.app.init(failing), Err(SceneError::Renderer(_))));
        assert!(!rig.app.is_mounted());

        let working = Mount {
            surface: rig.surface.clone(),
            sizes: Observable::new(ViewportSize::DEFAULT),
            destroy,
            container: rig.container.clone(),
        };
        assert!(rig.app.init(working).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_resize_reaches_camera_and_renderer() {
        let rig = mounted().await;
        rig.host.observe_resize(800.0, 600.0);
        let aspect = rig.app.with_scene(|scene| scene.camera().aspect_ratio).unwrap();
        assert!((aspect - 800.0 / 600.0).abs() < 1e-6);
        assert_eq!(rig.surface.log().last_size, Some(ViewportSize::new(800, 600)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rotation_speed_independent_of_refresh_rate() {
        let slow = mounted().await;
        run_frames(&slow.scheduler, Duration::ZERO, 60.0, 121);
        let fast = mounted().await;
        run_frames(&fast.scheduler, Duration::ZERO, 144.0, 289);

        let slow_angle = slow.app.with_scene(|s| s.rotation_y()).unwrap();
        let fast_angle = fast.app.with_scene(|s| s.rotation_y()).unwrap();
        assert!(slow_angle > 0.1);
        assert!((slow_angle - fast_angle).abs() <= 0.002 + 1e-5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle_rotation_freezes_sphere() {
        let rig = mounted().await;
        rig.app.on_click("toggleRotation", true);
        tokio::time::sleep(ms(1)).await;
        run_frames(&rig.scheduler, Duration::ZERO, 60.0, 60);
        assert_eq!(rig.app.with_scene(|s| s.rotation_y()), Some(0.0));
        assert!(rig.surface.log().renders > 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_texture_requests_latest_wins() {
        let rig = mounted().await;
        rig.app.update_texture("a.jpg");
        tokio::time::sleep(ms(20)).await;
        rig.app.update_texture("b.jpg");
        tokio::time::sleep(ms(300)).await;
        assert_eq!(rig.app.material().map.source(), Some("b.jpg"));
        assert!(!rig.app.is_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn test_texture_requested_before_mount_is_applied() {
        let rig = rig();
        rig.app.update_texture("a.jpg");
        rig.host.mount(rig.app.clone());
        tokio::time::sleep(ms(400)).await;
        assert_eq!(rig.app.material().map.source(), Some("a.jpg"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_loading_subscriber_reads_material_through_app() {
        let rig = rig();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let _sub = rig.app.loading().subscribe({
            let app = Arc::downgrade(&rig.app);
            let seen = Arc::clone(&seen);
            move |&busy| {
                if let Some(app) = app.upgrade() {
                    let source = app.material().map.source().map(str::to_string);
                    seen.lock().unwrap().push((busy, source));
                }
            }
        });
        rig.app.update_texture("a.jpg");
        rig.host.mount(rig.app.clone());
        tokio::time::sleep(ms(400)).await;

        assert_eq!(*seen.lock().unwrap(), vec![(false, Some("a.jpg".to_string()))]);
        assert!(!rig.app.is_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn test_audio_follows_commands_and_visibility() {
        let rig = mounted().await;
        rig.app.on_click("toggleAudio", false);
        tokio::time::sleep(ms(50)).await;
        assert!(!rig.app.mute());
        assert_eq!(rig.app.audio_state(), AudioState::Playing);

        rig.document.set_hidden(true);
        tokio::time::sleep(ms(10)).await;
        assert_eq!(rig.app.audio_state(), AudioState::Stopped);
        assert!(!rig.app.mute());

        rig.document.set_hidden(false);
        tokio::time::sleep(ms(10)).await;
        assert_eq!(rig.app.audio_state(), AudioState::Playing);
        assert_eq!(rig.audio.loads(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fullscreen_commands_reach_platform() {
        let rig = mounted().await;
        rig.app.on_click("toggleFullscreen", true);
        rig.app.on_click("toggleFullscreen", false);
        rig.app.on_click("toggleNothing", true);
        tokio::time::sleep(ms(1)).await;
        assert_eq!(rig.container.entered(), 1);
        assert_eq!(rig.document.exited(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_commands_before_mount_are_applied_at_mount() {
        let rig = rig();
        rig.app.on_click("toggleAudio", false);
        rig.host.mount(rig.app.clone());
        tokio::time::sleep(ms(200)).await;
        assert!(!rig.app.mute());
        assert_eq!(rig.app.audio_state(), AudioState::Playing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmount_stops_everything() {
        let rig = mounted().await;
        rig.app.on_click("toggleAudio", false);
        tokio::time::sleep(ms(50)).await;
        run_frames(&rig.scheduler, Duration::ZERO, 60.0, 10);
        let renders = rig.surface.log().renders;

        assert!(rig.host.unmount());
        assert_eq!(rig.scheduler.pending_count(), 0);
        assert_eq!(rig.scheduler.cancelled(), 1);
        assert!(rig.surface.log().disposed);
        assert_eq!(rig.app.audio_state(), AudioState::Stopped);
        assert_eq!(rig.document.hidden().unwrap().subscriber_count(), 0);

        run_frames(&rig.scheduler, ms(200), 60.0, 10);
        rig.app.update_texture("a.jpg");
        rig.app.on_click("toggleAudio", true);
        tokio::time::sleep(ms(300)).await;
        assert_eq!(rig.surface.log().renders, renders);
        assert_ne!(rig.app.material().map.source(), Some("a.jpg"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_orbit_after_mount() {
        let rig = mounted().await;
        assert!(rig.app.orbit(25.0, 5.0));
    }
}
