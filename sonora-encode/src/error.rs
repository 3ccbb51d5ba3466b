//! Per-source and pipeline-level error taxonomy.
//!
//! `EncodeFailure` is recovered locally by logging, omitting the source from
//! the atlas, and continuing the run. `HashMismatch` is recovered locally
//! too, but further upstream: it's never returned from `encode_one` as a
//! failure, only logged at the point it's detected, because its recovery
//! (recompute and overwrite) just means falling through to a normal encode.
//! Every other kind is fatal to the source that produced it.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write {path}: {message}")]
    Write { path: String, message: String },
}

/// Per-source failure. Carried in the pipeline's aggregate failure report;
/// never aborts the whole run.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("{source_path}: not 48 kHz PCM and re-materialization was declined")]
    SourceNotConforming { source_path: String },

    #[error("{source_path}: external media tool exited with status {status}")]
    EncodeFailure { source_path: String, status: i32 },

    #[error("{source_path}: existing output's content-address disagrees with the freshly computed hash")]
    HashMismatch { source_path: String },

    #[error("{source_path}: failed to read source samples: {message}")]
    ReadFailure { source_path: String, message: String },

    #[error("{source_path}: failed to invoke external media tool: {message}")]
    ToolInvocation { source_path: String, message: String },
}
