//! Command-line argument parsing for the viewer.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;
use crate::error::ConfigError;

/// Vista command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "vista", about = "Panoramic interior style preview")]
pub struct CliArgs {
    /// Window width.
    #[arg(long)]
    pub width: Option<u32>,

    /// Window height.
    #[arg(long)]
    pub height: Option<u32>,

    /// Cap on composited frames per second.
    #[arg(long)]
    pub max_fps: Option<u32>,

    /// Start with auto-rotation enabled or disabled.
    #[arg(long)]
    pub auto_rotate: Option<bool>,

    /// Directory image and audio sources are resolved against.
    #[arg(long)]
    pub asset_root: Option<PathBuf>,

    /// Background music volume (0.0 - 1.0).
    #[arg(long)]
    pub volume: Option<f32>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides, then check the result is still usable.
    pub fn with_cli_overrides(mut self, args: &CliArgs) -> Result<Self, ConfigError> {
        self.apply_cli_overrides(args);
        self.validate()?;
        Ok(self)
    }

    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(w) = args.width {
            self.window.width = w;
        }
        if let Some(h) = args.height {
            self.window.height = h;
        }
        if let Some(fps) = args.max_fps {
            self.render.max_fps = fps;
        }
        if let Some(rotate) = args.auto_rotate {
            self.render.auto_rotate = rotate;
        }
        if let Some(ref root) = args.asset_root {
            self.texture.asset_root = root.clone();
        }
        if let Some(volume) = args.volume {
            self.audio.volume = volume;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}
