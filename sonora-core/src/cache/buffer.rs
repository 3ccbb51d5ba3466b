//! Shared, in-place-mutable playback buffers.

use std::sync::{Arc, Mutex};

use crate::traits::DecodedAudio;

/// The actual sample data behind a [`Buffer`]. Not exposed directly —
/// always reached through the `Arc<Mutex<_>>` in `Buffer` so the cache and
/// every caller holding a clone observe the same in-place fill.
#[derive(Debug, Clone)]
pub struct AudioBufferData {
    pub channels: u16,
    pub sample_rate: u32,
    /// Per-channel sample data. Length is fixed at allocation time (to the
    /// atlas's authoritative `sample_count`) and never resized — only its
    /// contents change, from the placeholder's silence to decoded samples.
    pub channel_data: Vec<Vec<f32>>,
}

impl AudioBufferData {
    pub fn sample_count(&self) -> usize {
        self.channel_data.first().map_or(0, Vec::len)
    }

    fn silent(channels: u16, sample_count: usize, sample_rate: u32) -> Self {
        Self {
            channels,
            sample_rate,
            channel_data: vec![vec![0.0_f32; sample_count]; channels as usize],
        }
    }
}

/// A playback buffer shared between the cache and every caller that has
/// requested it. Deliberately a value-semantics exception: the cache
/// retains its own clone, so a decode completing after `request_sync`
/// returned mutates the same allocation the caller already installed into a
/// playback node, rather than requiring the caller to re-fetch.
#[derive(Debug, Clone)]
pub struct Buffer(Arc<Mutex<AudioBufferData>>);

impl Buffer {
    /// Allocate a silent placeholder of the shape the atlas item and parsed
    /// `file_name` imply: `(channels, sample_count, sample_rate)`.
    pub fn placeholder(channels: u16, sample_count: usize, sample_rate: u32) -> Self {
        Self(Arc::new(Mutex::new(AudioBufferData::silent(
            channels,
            sample_count,
            sample_rate,
        ))))
    }

    /// Allocate a buffer directly from a completed decode, sized by the
    /// atlas's `sample_count` — not the decoder's reported frame count —
    /// so that scheduling computations performed against the atlas stay
    /// exact.
    pub fn from_decoded(decoded: &DecodedAudio, atlas_sample_count: usize) -> Self {
        let buf = Self::placeholder(decoded.channels, atlas_sample_count, decoded.sample_rate);
        buf.fill_in_place(decoded);
        buf
    }

    /// Copy decoded channel data into this buffer in place, per channel, up
    /// to `min(target.len, decoded.len)` frames and `min(target.channels,
    /// decoded.channels)` channels. Leaves any remaining tail
    /// frames/channels untouched (silent, if this was a placeholder).
    pub fn fill_in_place(&self, decoded: &DecodedAudio) {
        let mut data = self.0.lock().unwrap();
        let channel_limit = (data.channels as usize).min(decoded.channel_data.len());
        for c in 0..channel_limit {
            let target = &mut data.channel_data[c];
            let source = &decoded.channel_data[c];
            let frame_limit = target.len().min(source.len());
            target[..frame_limit].copy_from_slice(&source[..frame_limit]);
        }
    }

    pub fn shape(&self) -> (u16, usize, u32) {
        let data = self.0.lock().unwrap();
        (data.channels, data.sample_count(), data.sample_rate)
    }

    /// True if the buffer's first frame is exactly silent. Used by tests
    /// asserting a placeholder's silence and its post-fill transition away
    /// from it; not meaningful as a general "is this decoded" check since a
    /// genuinely silent source is indistinguishable from an unfilled
    /// placeholder.
    pub fn first_frame_is_silent(&self) -> bool {
        let data = self.0.lock().unwrap();
        data.channel_data.iter().all(|ch| ch.first().copied().unwrap_or(0.0) == 0.0)
    }

    /// Same underlying allocation? The identity check behind "same buffer
    /// object" assertions across a placeholder and its later fill.
    pub fn ptr_eq(&self, other: &Buffer) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    #[cfg(test)]
    pub(crate) fn snapshot(&self) -> AudioBufferData {
        self.0.lock().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decoded(channels: u16, sample_rate: u32, frames: usize, value: f32) -> DecodedAudio {
        DecodedAudio {
            channels,
            sample_rate,
            channel_data: vec![vec![value; frames]; channels as usize],
        }
    }

    #[test]
    fn placeholder_is_silent_and_correctly_shaped() {
        let buf = Buffer::placeholder(2, 48000, 48000);
        assert_eq!(buf.shape(), (2, 48000, 48000));
        assert!(buf.first_frame_is_silent());
    }

    #[test]
    fn fill_in_place_mutates_shared_allocation() {
        let placeholder = Buffer::placeholder(1, 4, 48000);
        let alias = placeholder.clone();
        assert!(alias.ptr_eq(&placeholder));

        placeholder.fill_in_place(&decoded(1, 48000, 4, 0.5));

        assert!(!alias.first_frame_is_silent());
        assert_eq!(alias.snapshot().channel_data[0], vec![0.5, 0.5, 0.5, 0.5]);
    }

    #[test]
    fn fill_in_place_clamps_to_smaller_target_shape() {
        // atlas sample_count (2) is smaller than what decode reports (4):
        // the tail of the decode must be dropped, not overrun the buffer.
        let placeholder = Buffer::placeholder(1, 2, 48000);
        placeholder.fill_in_place(&decoded(1, 48000, 4, 0.5));
        assert_eq!(placeholder.snapshot().channel_data[0], vec![0.5, 0.5]);
    }

    #[test]
    fn fill_in_place_clamps_to_fewer_channels_than_decoded() {
        let placeholder = Buffer::placeholder(1, 2, 48000);
        let stereo = decoded(2, 48000, 2, 0.75);
        placeholder.fill_in_place(&stereo);
        assert_eq!(placeholder.snapshot().channel_data.len(), 1);
        assert_eq!(placeholder.snapshot().channel_data[0], vec![0.75, 0.75]);
    }

    #[test]
    fn from_decoded_uses_atlas_sample_count_not_decoder_length() {
        // decoder reports 10 frames, atlas says 5 — atlas wins.
        let buf = Buffer::from_decoded(&decoded(1, 48000, 10, 1.0), 5);
        assert_eq!(buf.shape().1, 5);
    }
}
