//! Catalog error types.

use std::path::PathBuf;

/// Errors that can occur while loading a style catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// The catalog file could not be read.
    #[error("failed to read catalog {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The catalog is not valid JSON for the expected schema.
    #[error("failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),
}
