//! # Sonora Runtime
//!
//! Ambient stack shared by `sonora-core` and `sonora-encode`: a typed
//! publish-subscribe event table and a `tracing`-backed logging setup with
//! the application's own log-level vocabulary layered on top.
//!
//! Neither module depends on the domain types in `sonora-core` —
//! `sonora-runtime` only provides the mechanism, not the event payloads.

pub mod error;
pub mod events;
#[cfg(feature = "logging")]
pub mod logging;

pub use error::{Error, Result};
pub use events::{EventBus, Subscription};
