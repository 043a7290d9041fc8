//! Headless walkthrough of the Vista panorama preview.
//!
//! Configuration is loaded from `config.ron` and can be overridden via CLI flags.
//! Run with `cargo run -p vista-demo -- --catalog styles.json --asset-root ./assets`.

mod assets;
mod headless;
mod session;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};
use vista_catalog::StyleCatalog;
use vista_config::{CliArgs, Config, default_config_dir};

use crate::session::SessionOptions;

/// Catalog used when `--catalog` is not given.
const SAMPLE_CATALOG: &str = r#"[
    {
        "name": "Modern",
        "parts": [
            { "name": "Living room", "images": ["modern/living-1.jpg", "modern/living-2.jpg"] },
            { "name": "Bedroom", "images": ["modern/bedroom-1.jpg"] }
        ]
    },
    {
        "name": "Nordic",
        "parts": [
            { "name": "Kitchen", "images": ["nordic/kitchen-1.jpg"] }
        ]
    }
]"#;

#[derive(Parser, Debug)]
#[command(name = "vista-demo", about = "Headless walkthrough of the panorama preview")]
struct DemoArgs {
    #[command(flatten)]
    common: CliArgs,

    /// Style catalog JSON file.
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Simulated display refresh rate.
    #[arg(long, default_value_t = 60.0)]
    refresh_hz: f64,

    /// Milliseconds each panorama stays on screen.
    #[arg(long, default_value_t = 400)]
    dwell_ms: u64,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = DemoArgs::parse();

    let config_dir = args.common.config.clone().unwrap_or_else(default_config_dir);
    let loaded = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    let config = match loaded.with_cli_overrides(&args.common) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid command-line override: {e}");
            return ExitCode::FAILURE;
        }
    };

    let log_dir = config_dir.join("logs");
    vista_log::init_logging(Some(&log_dir), cfg!(debug_assertions), Some(&config));

    info!("Vista panorama preview (headless)");
    info!(
        "Viewport seed: {}x{} | Window: {}x{} | Max FPS: {}",
        config.viewport.default_width,
        config.viewport.default_height,
        config.window.width,
        config.window.height,
        config.render.max_fps
    );
    info!("Assets: {}", config.texture.asset_root.display());

    let catalog = match &args.catalog {
        Some(path) => match StyleCatalog::load(path) {
            Ok(catalog) => catalog,
            Err(e) => {
                error!("{e}");
                return ExitCode::FAILURE;
            }
        },
        None => match StyleCatalog::from_json_str(SAMPLE_CATALOG) {
            Ok(catalog) => catalog,
            Err(e) => {
                error!("built-in catalog is invalid: {e}");
                return ExitCode::FAILURE;
            }
        },
    };
    if catalog.is_empty() {
        error!("catalog has no styles");
        return ExitCode::FAILURE;
    }

    let options = SessionOptions {
        refresh_hz: args.refresh_hz,
        dwell: Duration::from_millis(args.dwell_ms),
        ..SessionOptions::default()
    };
    let report = session::run(config, catalog, options).await;

    info!(
        "Requested {} panoramas, composited {} frames, final texture: {}",
        report.panoramas_requested,
        report.frames,
        report.final_source.as_deref().unwrap_or("<blank>")
    );
    if report.audio_failed {
        info!("Background audio was unavailable");
    }
    ExitCode::SUCCESS
}
