//! # Sonora Core
//!
//! Runtime half of the sonora audio asset pipeline: loads an **atlas**
//! describing every encoded sound asset, resolves logical sound names scoped
//! by package and language, and serves decoded playback buffers backed by a
//! single-flight, placeholder-filling buffer cache.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────┐  load   ┌──────────┐  resolve   ┌────────────┐
//! │  SoundManager  ├────────>│  Atlas   │<───────────┤  Resolver  │
//! └───────┬───────┘         └──────────┘            └──────┬─────┘
//!         │ request_sync/request_async                    │ file_name
//!         ▼                                                ▼
//! ┌───────────────┐   fetch+decode (single-flight)  ┌────────────┐
//! │  BufferCache  ├─────────────────────────────────>│  Fetcher/  │
//! └───────────────┘                                  │  Decoder   │
//!                                                     └────────────┘
//! ```
//!
//! `SoundManager` is the only public facade a host application needs;
//! `Atlas`, `resolve`, and `BufferCache` are exposed separately because the
//! resolver in particular is pure and independently testable (see module
//! docs).
//!
//! ## Cross-Platform Support
//!
//! This crate builds natively (for host embedding and for the test suite)
//! and, behind the `wasm` feature, exposes a `wasm-bindgen` facade in
//! [`wasm`] for browser hosts.

pub mod atlas;
pub mod cache;
pub mod content_address;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod manager;
pub mod resolver;
pub mod traits;

#[cfg(feature = "wasm")]
pub mod wasm;

pub use atlas::{Atlas, AtlasItem, NO_LANGUAGE};
pub use cache::{AudioBufferData, Buffer, BufferCache, ResolvedFile};
pub use error::{CacheError, Result, SonoraError};
pub use events::SoundEvent;
pub use lifecycle::SoundManagerState;
pub use manager::SoundManager;
pub use resolver::resolve;
pub use traits::{AtlasSource, DecodedAudio, Decoder, Fetcher};
