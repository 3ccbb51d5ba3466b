//! # Source Validation & Re-materialization
//!
//! Every source must be 48 kHz integer PCM before it's hashed and encoded.
//! Sources that aren't get rewritten in place by the external media tool,
//! after a confirmation prompt unless the caller already said yes.

use std::io::{self, IsTerminal, Write};
use std::path::Path;

use hound::{SampleFormat, WavReader};
use tokio::process::Command;

use crate::error::SourceError;

const TARGET_SAMPLE_RATE: u32 = 48_000;

/// PCM payload read back from a (by now, conforming) source file.
pub struct SourceSamples {
    pub channels: u16,
    pub sample_rate: u32,
    /// Interleaved samples, one `i16` per channel per frame.
    pub interleaved: Vec<i16>,
}

impl SourceSamples {
    pub fn frame_count(&self) -> u64 {
        if self.channels == 0 {
            0
        } else {
            self.interleaved.len() as u64 / self.channels as u64
        }
    }
}

fn is_conforming(reader: &WavReader<io::BufReader<std::fs::File>>) -> bool {
    let spec = reader.spec();
    spec.sample_rate == TARGET_SAMPLE_RATE && spec.sample_format == SampleFormat::Int
}

/// Ensure `path` is 48 kHz integer PCM, re-materializing it via `ffmpeg` in
/// place if not. Prompts on stdin unless `assume_yes`; refuses to prompt (and
/// fails) when there's no interactive terminal to prompt on.
pub async fn ensure_conforming(path: &Path, ffmpeg: &Path, assume_yes: bool) -> Result<(), SourceError> {
    let source_path = path.display().to_string();

    let conforming = {
        let reader = WavReader::open(path).map_err(|e| SourceError::ReadFailure {
            source_path: source_path.clone(),
            message: e.to_string(),
        })?;
        is_conforming(&reader)
    };
    if conforming {
        return Ok(());
    }

    if !assume_yes {
        if !io::stdin().is_terminal() {
            return Err(SourceError::SourceNotConforming { source_path });
        }
        print!("{source_path} is not 48 kHz PCM; re-materialize in place? [y/N] ");
        io::stdout().flush().ok();
        let mut answer = String::new();
        io::stdin()
            .read_line(&mut answer)
            .map_err(|e| SourceError::ReadFailure { source_path: source_path.clone(), message: e.to_string() })?;
        if !matches!(answer.trim().to_lowercase().as_str(), "y" | "yes") {
            return Err(SourceError::SourceNotConforming { source_path });
        }
    }

    rematerialize(path, ffmpeg, &source_path).await
}

async fn rematerialize(path: &Path, ffmpeg: &Path, source_path: &str) -> Result<(), SourceError> {
    let temp = path.with_extension("rematerialize.wav");
    let status = Command::new(ffmpeg)
        .arg("-y")
        .arg("-i")
        .arg(path)
        .arg("-ar")
        .arg(TARGET_SAMPLE_RATE.to_string())
        .arg("-sample_fmt")
        .arg("s16")
        .arg(&temp)
        .status()
        .await
        .map_err(|e| SourceError::ToolInvocation { source_path: source_path.to_string(), message: e.to_string() })?;

    if !status.success() {
        let _ = std::fs::remove_file(&temp);
        return Err(SourceError::EncodeFailure {
            source_path: source_path.to_string(),
            status: status.code().unwrap_or(-1),
        });
    }

    std::fs::rename(&temp, path).map_err(|e| SourceError::ToolInvocation {
        source_path: source_path.to_string(),
        message: e.to_string(),
    })
}

/// Read interleaved `i16` PCM from an already-conforming source file.
pub fn read_pcm(path: &Path) -> Result<SourceSamples, SourceError> {
    let source_path = path.display().to_string();
    let mut reader = WavReader::open(path).map_err(|e| SourceError::ReadFailure {
        source_path: source_path.clone(),
        message: e.to_string(),
    })?;
    let spec = reader.spec();

    let interleaved = reader
        .samples::<i16>()
        .collect::<Result<Vec<i16>, _>>()
        .map_err(|e| SourceError::ReadFailure { source_path, message: e.to_string() })?;

    Ok(SourceSamples { channels: spec.channels, sample_rate: spec.sample_rate, interleaved })
}

/// Downmix/upmix interleaved PCM from `source_channels` to `target_channels`,
/// returning interleaved little-endian bytes ready for hashing and encode.
///
/// Downmix averages the source channels into each target channel. Upmix from
/// mono duplicates the single channel into every target channel. Equal
/// channel counts pass the bytes through unchanged.
pub fn to_target_channels_bytes(samples: &SourceSamples, target_channels: u16) -> Vec<u8> {
    let source_channels = samples.channels as usize;
    let target_channels = target_channels as usize;

    if source_channels == target_channels {
        return samples.interleaved.iter().flat_map(|s| s.to_le_bytes()).collect();
    }

    let frame_count = samples.frame_count() as usize;
    let mut out = Vec::with_capacity(frame_count * target_channels * 2);

    if target_channels == 1 {
        for frame in samples.interleaved.chunks_exact(source_channels) {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            let avg = (sum / source_channels as i32) as i16;
            out.extend_from_slice(&avg.to_le_bytes());
        }
    } else if source_channels == 1 {
        for &s in &samples.interleaved {
            for _ in 0..target_channels {
                out.extend_from_slice(&s.to_le_bytes());
            }
        }
    } else {
        for frame in samples.interleaved.chunks_exact(source_channels) {
            for c in 0..target_channels {
                let s = frame.get(c).copied().unwrap_or(0);
                out.extend_from_slice(&s.to_le_bytes());
            }
        }
    }

    out
}
