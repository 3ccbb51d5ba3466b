//! # Platform Collaborator Traits
//!
//! `BufferCache` depends on two small seams instead of a concrete HTTP
//! client and a concrete audio decoder, separating the core logic layer's
//! traits from the platform-specific bridge traits used to satisfy them.
//! Native tests
//! implement both against in-memory fixtures; the `wasm` feature's facade
//! (see [`crate::wasm`]) implements them against `fetch` and
//! `AudioContext.decodeAudioData`.

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;

/// Decoded PCM audio, planar (one `Vec<f32>` per channel), matching the
/// shape a Web Audio `AudioBuffer` or equivalent host primitive expects —
/// `BufferCache::fill_in_place` copies directly out of this into the
/// cache's own buffer.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub channels: u16,
    pub sample_rate: u32,
    /// `channel_data[c]` holds `frames` samples for channel `c`.
    pub channel_data: Vec<Vec<f32>>,
}

impl DecodedAudio {
    pub fn frames(&self) -> usize {
        self.channel_data.first().map_or(0, Vec::len)
    }
}

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Retrieves the encoded bytes for a `file_name` at the configured load
/// path: `{load_path}{file_name}{extension}`, no additional normalization.
pub trait Fetcher: Send + Sync + 'static {
    fn fetch(&self, file_name: &str) -> BoxFuture<'_, Result<Bytes, String>>;

    /// Reconfigure the base load path future [`Fetcher::fetch`] calls
    /// resolve against. Default no-op for fetchers with a fixed path.
    fn set_load_path(&self, _path: &str) {}
}

/// Decodes encoded bytes (Opus-in-WebM, or AAC-in-MP4) into PCM. The
/// specific media container and codec are deliberately outside the
/// runtime's concern beyond this contract.
pub trait Decoder: Send + Sync + 'static {
    fn decode(&self, bytes: Bytes) -> BoxFuture<'_, Result<DecodedAudio, String>>;
}

/// Retrieves the atlas document's raw JSON text from a URL or path. Kept
/// separate from [`Fetcher`] since the atlas document doesn't live at a
/// content-addressed `file_name` and isn't itself an audio payload.
pub trait AtlasSource: Send + Sync + 'static {
    fn fetch_atlas(&self, url: &str) -> BoxFuture<'_, Result<String, String>>;
}
