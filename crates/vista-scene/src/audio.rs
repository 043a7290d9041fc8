//! Background audio state machine.
//!
//! Playback follows a single derived flag, "desired": the user has not
//! stopped audio and the page is visible. The buffer is loaded lazily the
//! first time playback is desired and kept for later resumes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tracing::{debug, error, info, trace};
use vista_config::AudioConfig;

use crate::command::ControlStatus;
use crate::error::LoadError;
use crate::host::{AudioBackend, AudioBuffer, Document, PlaybackSettings, VISIBILITY_DETECTION_ORDER, Vendor};
use crate::signal::{DestroySignal, Observable, lock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioState {
    Stopped,
    Loading,
    Playing,
}

/// Page visibility as resolved at mount.
#[derive(Clone, Default)]
pub struct Visibility {
    vendor: Option<Vendor>,
    hidden: Option<Observable<bool>>,
}

impl Visibility {
    /// Use the first vendor whose hidden flag the document exposes.
    pub fn detect(document: &dyn Document) -> Self {
        let found = VISIBILITY_DETECTION_ORDER
            .iter()
            .find_map(|&vendor| document.visibility(vendor).map(|hidden| (vendor, hidden)));
        match found {
            Some((vendor, hidden)) => {
                debug!(event = vendor.visibility_event(), "page visibility available");
                Self {
                    vendor: Some(vendor),
                    hidden: Some(hidden),
                }
            }
            None => {
                debug!("page visibility unavailable, assuming visible");
                Self::default()
            }
        }
    }

    pub fn vendor(&self) -> Option<Vendor> {
        self.vendor
    }

    /// Without a visibility API the page counts as always visible.
    pub fn is_visible(&self) -> bool {
        self.hidden.as_ref().is_none_or(|hidden| !hidden.get())
    }
}

#[derive(Default)]
struct AudioInner {
    buffer: Option<AudioBuffer>,
    last_error: Option<LoadError>,
}

pub struct AudioStateMachine {
    backend: Arc<dyn AudioBackend>,
    track: String,
    settings: PlaybackSettings,
    state: Observable<AudioState>,
    inner: Mutex<AudioInner>,
    /// Set under `inner` by teardown; read without it when publishing state.
    released: AtomicBool,
}

fn desired(status: ControlStatus, visible: bool) -> bool {
    !status.audio_stopped && visible
}

impl AudioStateMachine {
    pub fn new(config: &AudioConfig, backend: Arc<dyn AudioBackend>) -> Self {
        Self {
            backend,
            track: config.track.clone(),
            settings: PlaybackSettings {
                looping: config.looping,
                volume: config.volume,
            },
            state: Observable::new(AudioState::Stopped),
            inner: Mutex::new(AudioInner::default()),
            released: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> AudioState {
        self.state.get()
    }

    pub fn states(&self) -> Observable<AudioState> {
        self.state.clone()
    }

    /// Most recent load failure, cleared once playback starts.
    pub fn last_error(&self) -> Option<LoadError> {
        lock(&self.inner).last_error.clone()
    }

    /// Follow `controls` and `visibility` until `destroy` fires, then tear down.
    pub fn start(
        self: &Arc<Self>,
        controls: &Observable<ControlStatus>,
        visibility: Visibility,
        destroy: DestroySignal,
    ) {
        let (tx, rx) = watch::channel(desired(controls.get(), visibility.is_visible()));
        let tx = Arc::new(tx);

        let mut subscriptions = Vec::with_capacity(2);
        subscriptions.push(controls.subscribe({
            let tx = Arc::clone(&tx);
            let visibility = visibility.clone();
            move |status| {
                let want = desired(*status, visibility.is_visible());
                tx.send_if_modified(|current| std::mem::replace(current, want) != want);
            }
        }));
        if let Some(hidden) = &visibility.hidden {
            subscriptions.push(hidden.subscribe({
                let tx = Arc::clone(&tx);
                let controls = controls.clone();
                move |hidden| {
                    trace!(hidden, "page visibility changed");
                    let want = desired(controls.get(), !hidden);
                    tx.send_if_modified(|current| std::mem::replace(current, want) != want);
                }
            }));
        }
        drop(tx);

        let machine = Arc::clone(self);
        destroy.on_destroy(move || {
            drop(subscriptions);
            machine.teardown();
        });
        tokio::spawn(Arc::clone(self).run(rx, destroy));
    }

    async fn run(self: Arc<Self>, mut desired: watch::Receiver<bool>, destroy: DestroySignal) {
        loop {
            let want = *desired.borrow_and_update();
            if want {
                self.resume(&desired, &destroy).await;
            } else {
                self.pause();
            }
            tokio::select! {
                biased;
                _ = destroy.fired() => break,
                changed = desired.changed() => if changed.is_err() { break },
            }
        }
        trace!("audio task stopped");
    }

    fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    /// Publish `state` unless teardown already happened. Never called with
    /// `inner` held, so subscribers may read back through the machine.
    fn publish(&self, state: AudioState) {
        self.state
            .update(|_| if self.is_released() { AudioState::Stopped } else { state });
    }

    async fn resume(&self, desired: &watch::Receiver<bool>, destroy: &DestroySignal) {
        if self.is_released() || self.state.get() == AudioState::Playing {
            return;
        }
        let cached = lock(&self.inner).buffer.clone();

        let buffer = match cached {
            Some(buffer) => buffer,
            None => {
                self.publish(AudioState::Loading);
                info!(track = %self.track, "loading background audio");
                let result = tokio::select! {
                    biased;
                    _ = destroy.fired() => return,
                    result = self.backend.load(&self.track) => result,
                };
                let loaded = {
                    let mut inner = lock(&self.inner);
                    if self.is_released() {
                        return;
                    }
                    match result {
                        Ok(buffer) => {
                            inner.buffer = Some(buffer.clone());
                            Ok(buffer)
                        }
                        Err(e) => {
                            error!(track = %self.track, "background audio failed to load: {e}");
                            inner.last_error = Some(e);
                            Err(())
                        }
                    }
                };
                match loaded {
                    Ok(buffer) => buffer,
                    Err(()) => {
                        self.publish(AudioState::Stopped);
                        return;
                    }
                }
            }
        };

        let started = {
            let mut inner = lock(&self.inner);
            if self.is_released() {
                return;
            }
            if *desired.borrow() {
                inner.last_error = None;
                self.backend.play(&buffer, self.settings);
                true
            } else {
                false
            }
        };
        if started {
            self.publish(AudioState::Playing);
            debug!("background audio playing");
        } else {
            debug!("audio no longer wanted after load");
            self.publish(AudioState::Stopped);
        }
    }

    fn pause(&self) {
        if self.state.get() != AudioState::Playing {
            return;
        }
        {
            let _inner = lock(&self.inner);
            if self.is_released() {
                return;
            }
            self.backend.pause();
        }
        self.publish(AudioState::Stopped);
        debug!("background audio paused");
    }

    /// Stop playback and release the buffer. Safe to call more than once.
    pub fn teardown(&self) {
        {
            let mut inner = lock(&self.inner);
            if self.released.swap(true, Ordering::SeqCst) {
                return;
            }
            inner.buffer = None;
            self.backend.stop();
            self.backend.release();
        }
        self.state.set(AudioState::Stopped);
        info!("background audio released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::{DestroyTrigger, destroy_channel};
    use crate::testing::{AudioEvent, TestAudioBackend, TestDocument};
    use std::time::Duration;

    struct Rig {
        machine: Arc<AudioStateMachine>,
        backend: Arc<TestAudioBackend>,
        controls: Observable<ControlStatus>,
        hidden: Observable<bool>,
        trigger: DestroyTrigger,
    }

    fn rig(backend: TestAudioBackend) -> Rig {
        let backend = Arc::new(backend);
        let machine = Arc::new(AudioStateMachine::new(
            &AudioConfig::default(),
            Arc::clone(&backend) as Arc<dyn AudioBackend>,
        ));
        let document = TestDocument::with_visibility(Vendor::Webkit);
        let hidden = document.hidden().unwrap();
        let controls = Observable::new(ControlStatus::default());
        let (trigger, signal) = destroy_channel();
        machine.start(&controls, Visibility::detect(&document), signal);
        Rig {
            machine,
            backend,
            controls,
            hidden,
            trigger,
        }
    }

    fn set_stopped(controls: &Observable<ControlStatus>, stopped: bool) {
        controls.update(|s| ControlStatus {
            audio_stopped: stopped,
            ..*s
        });
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_starts_stopped_without_loading() {
        let rig = rig(TestAudioBackend::default());
        settle().await;
        assert_eq!(rig.machine.state(), AudioState::Stopped);
        assert_eq!(rig.backend.loads(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmute_loads_and_plays() {
        let rig = rig(TestAudioBackend::with_delay(Duration::from_millis(20)));
        set_stopped(&rig.controls, false);
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(rig.machine.state(), AudioState::Loading);
        settle().await;
        assert_eq!(rig.machine.state(), AudioState::Playing);
        assert_eq!(rig.backend.events(), vec![AudioEvent::Load, AudioEvent::Play]);
        let settings = rig.backend.last_settings().unwrap();
        assert!(settings.looping);
        assert!((settings.volume - 0.3).abs() < f32::EPSILON);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hidden_page_pauses_and_resumes_without_reload() {
        let rig = rig(TestAudioBackend::default());
        set_stopped(&rig.controls, false);
        settle().await;
        assert_eq!(rig.machine.state(), AudioState::Playing);

        rig.hidden.set(true);
        settle().await;
        assert_eq!(rig.machine.state(), AudioState::Stopped);

        rig.hidden.set(false);
        settle().await;
        assert_eq!(rig.machine.state(), AudioState::Playing);
        assert_eq!(rig.backend.loads(), 1);
        assert_eq!(
            rig.backend.events(),
            vec![AudioEvent::Load, AudioEvent::Play, AudioEvent::Pause, AudioEvent::Play]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_hidden_page_blocks_unmute() {
        let rig = rig(TestAudioBackend::default());
        rig.hidden.set(true);
        set_stopped(&rig.controls, false);
        settle().await;
        assert_eq!(rig.machine.state(), AudioState::Stopped);
        assert_eq!(rig.backend.loads(), 0);

        rig.hidden.set(false);
        settle().await;
        assert_eq!(rig.machine.state(), AudioState::Playing);
        assert_eq!(rig.backend.events(), vec![AudioEvent::Load, AudioEvent::Play]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_subscriber_can_read_last_error() {
        let rig = rig(TestAudioBackend::failing());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let _sub = rig.machine.states().subscribe({
            let machine = Arc::downgrade(&rig.machine);
            let seen = Arc::clone(&seen);
            move |&state| {
                if let Some(machine) = machine.upgrade() {
                    seen.lock().unwrap().push((state, machine.last_error().is_some()));
                }
            }
        });

        set_stopped(&rig.controls, false);
        settle().await;
        assert_eq!(
            *seen.lock().unwrap(),
            vec![(AudioState::Loading, false), (AudioState::Stopped, true)]
        );

        rig.trigger.fire();
        assert_eq!(rig.machine.state(), AudioState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mute_during_load_does_not_play() {
        let rig = rig(TestAudioBackend::with_delay(Duration::from_millis(50)));
        set_stopped(&rig.controls, false);
        tokio::time::sleep(Duration::from_millis(10)).await;
        set_stopped(&rig.controls, true);
        settle().await;
        assert_eq!(rig.machine.state(), AudioState::Stopped);
        assert_eq!(rig.backend.events(), vec![AudioEvent::Load]);

        // The buffer is cached for the next unmute.
        set_stopped(&rig.controls, false);
        settle().await;
        assert_eq!(rig.machine.state(), AudioState::Playing);
        assert_eq!(rig.backend.loads(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_failure_is_recorded_and_retried() {
        let rig = rig(TestAudioBackend::failing());
        set_stopped(&rig.controls, false);
        settle().await;
        assert_eq!(rig.machine.state(), AudioState::Stopped);
        assert!(matches!(rig.machine.last_error(), Some(LoadError::NotFound(_))));

        rig.backend.set_failing(false);
        set_stopped(&rig.controls, true);
        set_stopped(&rig.controls, false);
        settle().await;
        assert_eq!(rig.machine.state(), AudioState::Playing);
        assert_eq!(rig.machine.last_error(), None);
        assert_eq!(rig.backend.loads(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_destroy_releases_and_detaches() {
        let rig = rig(TestAudioBackend::default());
        set_stopped(&rig.controls, false);
        settle().await;
        assert_eq!(rig.controls.subscriber_count(), 1);
        assert_eq!(rig.hidden.subscriber_count(), 1);

        rig.trigger.fire();
        settle().await;
        assert_eq!(rig.machine.state(), AudioState::Stopped);
        assert!(rig.backend.events().ends_with(&[AudioEvent::Stop, AudioEvent::Release]));
        assert_eq!(rig.controls.subscriber_count(), 0);
        assert_eq!(rig.hidden.subscriber_count(), 0);

        // Nothing reacts after teardown.
        set_stopped(&rig.controls, true);
        set_stopped(&rig.controls, false);
        settle().await;
        assert_eq!(rig.backend.loads(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_destroy_during_load_never_plays() {
        let rig = rig(TestAudioBackend::with_delay(Duration::from_millis(50)));
        set_stopped(&rig.controls, false);
        tokio::time::sleep(Duration::from_millis(10)).await;
        rig.trigger.fire();
        settle().await;
        assert!(!rig.backend.events().contains(&AudioEvent::Play));
        assert_eq!(rig.machine.state(), AudioState::Stopped);
    }

    #[test]
    fn test_missing_visibility_api_counts_as_visible() {
        let visibility = Visibility::detect(&TestDocument::default());
        assert!(visibility.is_visible());
        assert_eq!(visibility.vendor(), None);
    }

    #[test]
    fn test_visibility_detection_prefers_standard_then_ms() {
        let document = TestDocument::with_visibility(Vendor::Ms);
        assert_eq!(Visibility::detect(&document).vendor(), Some(Vendor::Ms));
    }
}
