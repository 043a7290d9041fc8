//! Structured logging for the Vista viewer.
//!
//! Installs a `tracing` subscriber with console output (uptime timestamps and
//! module paths) plus a JSON log file in debug builds. The filter honours
//! `RUST_LOG` first, then the `debug.log_level` config setting.

use std::path::Path;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use vista_config::Config;

/// Filter used when neither `RUST_LOG` nor the config says otherwise.
pub const DEFAULT_FILTER: &str = "info";

/// File name of the JSON log written in debug builds.
pub const LOG_FILE_NAME: &str = "vista.log";

/// Initialize the global tracing subscriber.
///
/// * `log_dir` - directory for the JSON log file (debug builds only)
/// * `debug_build` - whether file logging is enabled
/// * `config` - optional config whose `debug.log_level` overrides the default
///
/// Returns `false` if a global subscriber was already installed, which keeps
/// repeated initialization (tests, embedding hosts) harmless.
///
/// ```no_run
/// use vista_config::Config;
///
/// let config = Config::default();
/// vista_log::init_logging(Some(std::path::Path::new("./logs")), true, Some(&config));
/// ```
pub fn init_logging(log_dir: Option<&Path>, debug_build: bool, config: Option<&Config>) -> bool {
    let directive = filter_directive(config);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&directive));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_names(true)
        .with_level(true)
        .with_timer(fmt::time::uptime());

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    let log_path = log_dir
        .filter(|_| debug_build)
        .map(|dir| dir.join(LOG_FILE_NAME));
    let (log_file, file_error) = match log_path.as_deref().map(open_log_file) {
        Some(Ok(file)) => (Some(file), None),
        Some(Err(e)) => (None, Some(e)),
        None => (None, None),
    };
    let file_logging = log_file.is_some();

    let installed = match log_file {
        Some(file) => {
            let file_layer = fmt::layer()
                .with_writer(file)
                .with_ansi(false)
                .with_target(true)
                .with_timer(fmt::time::uptime())
                .json();
            subscriber.with(file_layer).try_init().is_ok()
        }
        None => subscriber.try_init().is_ok(),
    };
    if !installed {
        return false;
    }

    match (log_path, file_error) {
        (Some(path), Some(e)) => {
            tracing::warn!(file = %path.display(), "JSON log file unavailable: {e}");
        }
        (Some(path), None) if file_logging => {
            tracing::info!(filter = %directive, file = %path.display(), "logging initialized");
        }
        _ => tracing::info!(filter = %directive, "logging initialized"),
    }
    true
}

fn open_log_file(path: &Path) -> std::io::Result<std::fs::File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::File::create(path)
}

/// The filter directive the config asks for, falling back to [`DEFAULT_FILTER`].
pub fn filter_directive(config: Option<&Config>) -> String {
    config
        .map(|config| config.debug.log_level.trim())
        .filter(|level| !level.is_empty())
        .unwrap_or(DEFAULT_FILTER)
        .to_string()
}

/// An `EnvFilter` built from [`DEFAULT_FILTER`].
pub fn default_env_filter() -> EnvFilter {
    EnvFilter::new(DEFAULT_FILTER)
}
