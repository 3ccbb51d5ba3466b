//! # Content-Address & File Naming
//!
//! `file_name := "{bitrate_kbps}k.{channels}ch.{hash}"`. This module is
//! shared between `sonora-core` (which needs to recover the channel count
//! from a `file_name` to size a placeholder buffer before any bytes have
//! been fetched) and `sonora-encode` (which composes the name at encode
//! time). Keeping the format logic in one place keeps runtime and encoder
//! from drifting apart on it.

use thiserror::Error;
use twox_hash::XxHash64;

/// The parsed fields of a content-addressed file name, minus the extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentAddress {
    pub bitrate_kbps: u32,
    pub channels: u16,
    pub hash: u64,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("file name {0:?} does not match \"{{bitrate}}k.{{channels}}ch.{{hash}}\"")]
    BadFormat(String),
}

impl ContentAddress {
    /// Compose the `file_name` (no extension) for this address.
    ///
    /// The `.{ch}ch.` field layout is load-bearing: `sonora-core` recovers
    /// the channel count from it to allocate placeholder buffers before the
    /// file has been fetched. This layout must not change without a
    /// migration for existing atlases.
    pub fn file_name(&self) -> String {
        format!("{}k.{}ch.{}", self.bitrate_kbps, self.channels, self.hash)
    }

    /// Parse a `file_name` (no extension) back into its fields.
    pub fn parse(file_name: &str) -> Result<Self, ParseError> {
        let err = || ParseError::BadFormat(file_name.to_string());

        let mut parts = file_name.splitn(3, '.');
        let bitrate_field = parts.next().ok_or_else(err)?;
        let channels_field = parts.next().ok_or_else(err)?;
        let hash_field = parts.next().ok_or_else(err)?;

        let bitrate_kbps = bitrate_field
            .strip_suffix('k')
            .ok_or_else(err)?
            .parse::<u32>()
            .map_err(|_| err())?;
        let channels = channels_field
            .strip_suffix("ch")
            .ok_or_else(err)?
            .parse::<u16>()
            .map_err(|_| err())?;
        let hash = hash_field.parse::<u64>().map_err(|_| err())?;

        Ok(ContentAddress {
            bitrate_kbps,
            channels,
            hash,
        })
    }

    /// Recover just the channel count, the one field the buffer cache needs
    /// before a fetch has happened, to size a placeholder.
    pub fn channels_from_file_name(file_name: &str) -> Result<u16, ParseError> {
        Self::parse(file_name).map(|ca| ca.channels)
    }
}

/// Seed for the content-address hash. Fixed so the same PCM payload hashes
/// identically across runs and platforms — it is not a secret, just a
/// constant.
const HASH_SEED: u64 = 0;

/// Hash the little-endian, channel-interleaved PCM payload at the target
/// channel count. Any fast non-cryptographic 64-bit hash with low collision
/// probability qualifies; `XxHash64` is the standard pure-Rust answer to
/// exactly that requirement.
pub fn hash_pcm_payload(interleaved_samples_le_bytes: &[u8]) -> u64 {
    XxHash64::oneshot(HASH_SEED, interleaved_samples_le_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composes_the_documented_layout() {
        let addr = ContentAddress {
            bitrate_kbps: 24,
            channels: 1,
            hash: 7,
        };
        assert_eq!(addr.file_name(), "24k.1ch.7");
    }

    #[test]
    fn round_trips_through_parse() {
        let addr = ContentAddress {
            bitrate_kbps: 128,
            channels: 2,
            hash: 18_446_744_073_709_551_615,
        };
        let parsed = ContentAddress::parse(&addr.file_name()).unwrap();
        assert_eq!(parsed, addr);
    }

    #[test]
    fn recovers_channels_without_full_parse() {
        assert_eq!(
            ContentAddress::channels_from_file_name("24k.1ch.7").unwrap(),
            1
        );
        assert_eq!(
            ContentAddress::channels_from_file_name("128k.2ch.999").unwrap(),
            2
        );
    }

    #[test]
    fn rejects_malformed_names() {
        assert!(ContentAddress::parse("not-a-file-name").is_err());
        assert!(ContentAddress::parse("24k.1ch").is_err());
        assert!(ContentAddress::parse("24.1ch.7").is_err());
    }

    // Same PCM bytes at the same (bitrate, channels) yield the same
    // file_name on every platform.
    #[test]
    fn hash_is_deterministic_over_identical_payloads() {
        let payload = vec![1u8, 2, 3, 4, 5, 6, 7, 8];
        assert_eq!(hash_pcm_payload(&payload), hash_pcm_payload(&payload));

        let other = vec![1u8, 2, 3, 4, 5, 6, 7, 9];
        assert_ne!(hash_pcm_payload(&payload), hash_pcm_payload(&other));
    }

    #[test]
    fn distinct_bitrate_overrides_yield_distinct_names_same_hash_field() {
        let hash = hash_pcm_payload(&[0u8; 16]);
        let low = ContentAddress {
            bitrate_kbps: 32,
            channels: 2,
            hash,
        };
        let high = ContentAddress {
            bitrate_kbps: 64,
            channels: 2,
            hash,
        };
        assert_ne!(low.file_name(), high.file_name());
        assert!(low.file_name().ends_with(&format!(".{hash}")));
        assert!(high.file_name().ends_with(&format!(".{hash}")));
    }
}
