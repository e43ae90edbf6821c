//! Error types for catalog, configuration and resource setup

use thiserror::Error;

/// Main error type for the crate
///
/// Only setup paths return these. Resource loads driven by the cache never
/// propagate errors; they are logged and the resource stays absent.
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Mesh error: {0}")]
    Mesh(String),

    #[error("Config error: {0}")]
    Config(String),
}
