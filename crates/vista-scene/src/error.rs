//! Error types for the scene crate.

/// Failure to fetch or decode an asset. Carried as data so a failed load can
/// be recorded and retried without holding I/O handles.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    /// No asset exists under this source.
    #[error("asset not found: {0}")]
    NotFound(String),

    /// The asset exists but could not be read.
    #[error("failed to read {src}: {reason}")]
    Io { src: String, reason: String },

    /// The bytes are corrupt for their format.
    #[error("failed to decode {src}: {reason}")]
    Decode { src: String, reason: String },

    /// The format is recognised as one the backend cannot handle.
    #[error("unsupported format for {src}: {reason}")]
    Unsupported { src: String, reason: String },

    /// The backend gave up before the load finished.
    #[error("load of {0} was cancelled")]
    Cancelled(String),
}

/// Failure to bring up the drawing backend.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("drawing context unavailable: {0}")]
    ContextUnavailable(String),

    #[error("surface has no usable size ({width}x{height})")]
    EmptySurface { width: u32, height: u32 },
}

/// Errors surfaced when mounting a panorama scene.
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    /// The app was already initialized against a mounted viewport.
    #[error("scene is already mounted")]
    AlreadyMounted,

    #[error("renderer setup failed: {0}")]
    Renderer(#[from] RenderError),
}
