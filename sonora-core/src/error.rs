//! # Sonora Core Error Types
//!
//! Error taxonomy for the runtime half of the pipeline. Fetch and decode
//! failures do not surface as `Err` from the buffer-cache request methods —
//! `request_async`/`request_sync` resolve to `None` and emit
//! `SoundLoadError` instead. `SonoraError` exists for the operations that
//! *do* have a meaningful caller-facing error: loading the atlas.

use thiserror::Error;

/// Errors that can occur loading or parsing an atlas document.
#[derive(Error, Debug)]
pub enum SonoraError {
    /// Network or I/O failure while retrieving the atlas document.
    #[error("failed to fetch atlas: {0}")]
    AtlasFetch(String),

    /// The atlas document was retrieved but is not valid JSON, or its shape
    /// does not match `{ package: [[source_name, file_name, sample_count,
    /// language_tag], ...], ... }`.
    #[error("malformed atlas document: {0}")]
    AtlasMalformed(String),
}

impl From<serde_json::Error> for SonoraError {
    fn from(e: serde_json::Error) -> Self {
        SonoraError::AtlasMalformed(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SonoraError>;

/// Errors isolated to a single buffer-cache request. These never cross the
/// `request_async`/`request_sync` boundary as `Err` — they are logged and
/// turned into a `SoundLoadError` event plus a `None`/placeholder-stays
/// result, so one bad file never poisons the rest of a bulk load.
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    #[error("failed to fetch {file_name}: {message}")]
    Fetch { file_name: String, message: String },

    #[error("failed to decode {file_name}: {message}")]
    Decode { file_name: String, message: String },
}

impl CacheError {
    pub fn file_name(&self) -> &str {
        match self {
            CacheError::Fetch { file_name, .. } | CacheError::Decode { file_name, .. } => {
                file_name
            }
        }
    }
}
