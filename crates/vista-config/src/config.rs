//! Configuration structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level viewer configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Host window settings.
    pub window: WindowConfig,
    /// Viewport host settings (mount debounce, seed size).
    pub viewport: ViewportConfig,
    /// Scene loop, camera and panorama sphere settings.
    pub render: RenderConfig,
    /// Texture swap pipeline settings.
    pub texture: TextureConfig,
    /// Background music settings.
    pub audio: AudioConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Window configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WindowConfig {
    /// Window width in logical pixels.
    pub width: u32,
    /// Window height in logical pixels.
    pub height: u32,
    /// Window title.
    pub title: String,
}

/// Viewport host configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ViewportConfig {
    /// Window in which repeated mount attempts collapse into one initialization.
    pub init_debounce_ms: u64,
    /// Width the size stream is seeded with before the first observation.
    pub default_width: u32,
    /// Height the size stream is seeded with before the first observation.
    pub default_height: u32,
}

/// Scene loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RenderConfig {
    /// Upper bound on composited frames per second, independent of display refresh.
    pub max_fps: u32,
    /// Angle in radians the panorama turns per composited frame.
    pub rotation_step_rad: f32,
    /// Enable auto-rotation when the scene mounts.
    pub auto_rotate: bool,
    /// Vertical field of view in degrees.
    pub fov_y_deg: f32,
    pub near: f32,
    pub far: f32,
    /// Camera eye position; the camera always looks at the origin.
    pub camera_position: [f32; 3],
    /// Radius of the panorama sphere.
    pub sphere_radius: f32,
    pub sphere_width_segments: u32,
    pub sphere_height_segments: u32,
    /// Request an antialiased drawing context from the surface.
    pub antialias: bool,
}

/// Texture swap pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TextureConfig {
    /// Quiet period a burst of texture requests must settle for before loading.
    pub request_debounce_ms: u64,
    /// Directory image sources are resolved against by filesystem loaders.
    pub asset_root: PathBuf,
}

/// Audio configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    /// Background track, resolved against the texture asset root.
    pub track: String,
    /// Playback volume (0.0 - 1.0).
    pub volume: f32,
    /// Loop the track forever.
    pub looping: bool,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log display and composite frame rates every couple of seconds.
    pub show_fps: bool,
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
}

// --- Default implementations ---

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            title: "Vista - Interior Style Preview".to_string(),
        }
    }
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            init_debounce_ms: 100,
            default_width: 300,
            default_height: 150,
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            max_fps: 30,
            rotation_step_rad: 0.002,
            auto_rotate: true,
            fov_y_deg: 60.0,
            near: 1.0,
            far: 1000.0,
            camera_position: [-0.87, 0.03, 0.4],
            sphere_radius: 25.0,
            sphere_width_segments: 50,
            sphere_height_segments: 50,
            antialias: true,
        }
    }
}

impl Default for TextureConfig {
    fn default() -> Self {
        Self {
            request_debounce_ms: 100,
            asset_root: PathBuf::from("assets"),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            track: "media/background.mp3".to_string(),
            volume: 0.3,
            looping: true,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            show_fps: false,
            log_level: "info".to_string(),
        }
    }
}

// --- Derived values ---

impl ViewportConfig {
    pub fn init_debounce(&self) -> Duration {
        Duration::from_millis(self.init_debounce_ms)
    }
}

impl RenderConfig {
    /// Minimum accumulated time between two composited frames.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.max_fps.max(1)))
    }
}

impl TextureConfig {
    pub fn request_debounce(&self) -> Duration {
        Duration::from_millis(self.request_debounce_ms)
    }
}

/// Platform config directory for the viewer, e.g. `~/.config/vista` on Linux.
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("vista")
}

// --- Load / Save / Reload ---

/// File name of the persisted configuration inside the config directory.
pub const CONFIG_FILE: &str = "config.ron";

/// Path of the config file inside `config_dir`.
pub fn config_path(config_dir: &Path) -> PathBuf {
    config_dir.join(CONFIG_FILE)
}

impl Config {
    /// Load `config.ron` from `config_dir`, writing the defaults there first
    /// when no file exists yet.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let path = config_path(config_dir);
        if !path.exists() {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Wrote default viewer config to {}", path.display());
            return Ok(config);
        }
        let config = Self::read_from(&path)?;
        log::info!("Viewer config loaded from {}", path.display());
        Ok(config)
    }

    /// Parse and validate a config file.
    pub fn read_from(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = ron::from_str(&text).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    /// Write this config to `config_dir/config.ron`, creating the directory.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);
        let text = ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;
        std::fs::write(config_path(config_dir), text).map_err(ConfigError::WriteError)
    }

    /// Re-read the file. `Some` only when the on-disk config differs from `self`.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let fresh = Self::read_from(&config_path(config_dir))?;
        if fresh == *self {
            return Ok(None);
        }
        log::info!("Viewer config changed on disk");
        Ok(Some(fresh))
    }

    /// Reject values the scene cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.render.max_fps == 0 {
            return Err(ConfigError::Invalid {
                field: "render.max_fps",
                reason: "must be at least 1".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.audio.volume) {
            return Err(ConfigError::Invalid {
                field: "audio.volume",
                reason: format!("{} is outside 0.0..=1.0", self.audio.volume),
            });
        }
        if self.render.near <= 0.0 || self.render.far <= self.render.near {
            return Err(ConfigError::Invalid {
                field: "render.far",
                reason: format!(
                    "clip planes must satisfy 0 < near < far (near {}, far {})",
                    self.render.near, self.render.far
                ),
            });
        }
        if self.viewport.default_width == 0 || self.viewport.default_height == 0 {
            return Err(ConfigError::Invalid {
                field: "viewport.default_width",
                reason: "seed size must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}
