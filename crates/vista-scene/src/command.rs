//! UI commands and the task that applies them to the mounted scene.

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::host::{Container, Document, EntryPoint, FULLSCREEN_DETECTION_ORDER, Vendor};
use crate::signal::{DestroySignal, Observable};

/// A toggle issued by the overlay controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `true` stops the background audio.
    ToggleAudio(bool),
    /// `true` enters fullscreen, `false` leaves it.
    ToggleFullscreen(bool),
    /// `true` freezes the automatic rotation.
    ToggleRotation(bool),
}

impl Command {
    pub const TOGGLE_AUDIO: &'static str = "toggleAudio";
    pub const TOGGLE_FULLSCREEN: &'static str = "toggleFullscreen";
    pub const TOGGLE_ROTATION: &'static str = "toggleRotation";

    /// Build a command from the tag/status pair emitted by the overlay.
    pub fn parse(tag: &str, status: bool) -> Option<Self> {
        match tag {
            Self::TOGGLE_AUDIO => Some(Command::ToggleAudio(status)),
            Self::TOGGLE_FULLSCREEN => Some(Command::ToggleFullscreen(status)),
            Self::TOGGLE_ROTATION => Some(Command::ToggleRotation(status)),
            _ => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Command::ToggleAudio(_) => Self::TOGGLE_AUDIO,
            Command::ToggleFullscreen(_) => Self::TOGGLE_FULLSCREEN,
            Command::ToggleRotation(_) => Self::TOGGLE_ROTATION,
        }
    }

    pub fn status(&self) -> bool {
        match *self {
            Command::ToggleAudio(s) | Command::ToggleFullscreen(s) | Command::ToggleRotation(s) => s,
        }
    }
}

/// Control flags read by the frame loop and the audio state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlStatus {
    pub audio_stopped: bool,
    pub disable_rotating: bool,
}

impl Default for ControlStatus {
    fn default() -> Self {
        Self {
            audio_stopped: true,
            disable_rotating: true,
        }
    }
}

/// Pure reducer over the control flags. Fullscreen leaves them untouched.
pub fn reduce(state: ControlStatus, command: &Command) -> ControlStatus {
    match *command {
        Command::ToggleAudio(stopped) => ControlStatus {
            audio_stopped: stopped,
            ..state
        },
        Command::ToggleRotation(disabled) => ControlStatus {
            disable_rotating: disabled,
            ..state
        },
        Command::ToggleFullscreen(_) => state,
    }
}

/// Fullscreen entry and exit points, resolved once per mount.
#[derive(Clone, Default)]
pub struct Fullscreen {
    enter: Option<(Vendor, EntryPoint)>,
    exit: Option<(Vendor, EntryPoint)>,
}

impl Fullscreen {
    /// Pick the first vendor exposing each entry point.
    pub fn detect(container: &dyn Container, document: &dyn Document) -> Self {
        let enter = FULLSCREEN_DETECTION_ORDER
            .iter()
            .find_map(|&vendor| container.fullscreen_entry(vendor).map(|f| (vendor, f)));
        let exit = FULLSCREEN_DETECTION_ORDER
            .iter()
            .find_map(|&vendor| document.fullscreen_exit(vendor).map(|f| (vendor, f)));
        match &enter {
            Some((v, _)) => debug!("fullscreen entry: {}", v.request_fullscreen_name()),
            None => warn!("fullscreen not supported by container"),
        }
        if let Some((v, _)) = &exit {
            debug!("fullscreen exit: {}", v.exit_fullscreen_name());
        }
        Self { enter, exit }
    }

    pub fn enter_vendor(&self) -> Option<Vendor> {
        self.enter.as_ref().map(|(v, _)| *v)
    }

    pub fn exit_vendor(&self) -> Option<Vendor> {
        self.exit.as_ref().map(|(v, _)| *v)
    }

    /// Enter (`true`) or leave fullscreen. Returns whether an entry point ran.
    pub fn set(&self, on: bool) -> bool {
        let target = if on { &self.enter } else { &self.exit };
        match target {
            Some((_, entry)) => {
                entry();
                true
            }
            None => {
                debug!(on, "no fullscreen entry point, ignoring");
                false
            }
        }
    }
}

/// Apply one command: reduce the flags, then run its side effect.
pub fn apply(command: &Command, controls: &Observable<ControlStatus>, fullscreen: &Fullscreen) {
    controls.update(|state| reduce(*state, command));
    if let Command::ToggleFullscreen(on) = *command {
        fullscreen.set(on);
    }
}

/// Drain `commands` until destruction or until every sender is gone.
pub(crate) async fn run_dispatcher(
    mut commands: mpsc::UnboundedReceiver<Command>,
    controls: Observable<ControlStatus>,
    fullscreen: Fullscreen,
    destroy: DestroySignal,
) {
    loop {
        tokio::select! {
            biased;
            _ = destroy.fired() => break,
            command = commands.recv() => match command {
                Some(command) => {
                    debug!(tag = command.tag(), status = command.status(), "command");
                    apply(&command, &controls, &fullscreen);
                }
                None => break,
            },
        }
    }
    info!("command dispatcher stopped");
}
