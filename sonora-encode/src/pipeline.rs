//! # Encode Pipeline
//!
//! Parameter selection, content-addressing, encode invocation, sample-count
//! reconciliation, and atlas accumulation — phases 3 through 7. Discovery
//! and source validation (phases 1-2) live in their own modules; `run`
//! stitches all of it together with a bounded pool of per-CPU workers.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use sonora_core::atlas::{Atlas, AtlasItem};
use tokio::process::Command;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::config::{PackageConfig, RawConfig};
use crate::discovery::{discover, DiscoveredSource};
use crate::error::SourceError;
use crate::source::{ensure_conforming, read_pcm, to_target_channels_bytes};

use sonora_core::content_address::{hash_pcm_payload, ContentAddress};

pub struct PipelineOptions {
    pub indir: PathBuf,
    pub outdir: PathBuf,
    pub default_bitrate: u32,
    pub selected_packages: Vec<String>,
    pub include_mp4: bool,
    pub assume_yes: bool,
    pub use_cache: bool,
    pub ffmpeg: PathBuf,
}

pub struct PipelineReport {
    pub atlas: Atlas,
    pub encoded: usize,
    pub skipped_cached: usize,
    pub failed: usize,
    pub failures: Vec<(String, String)>,
}

/// Resolve `(bitrate_kbps, channels)` for a source: per-source override >
/// per-package override > global default. Channels default to the source's
/// own channel count when nothing overrides it.
fn resolve_params(
    package_config: Option<&PackageConfig>,
    source_name: &str,
    global_bitrate: u32,
    source_channels: u16,
) -> (u32, u16) {
    let source_override = package_config.and_then(|p| p.sources.as_ref()).and_then(|s| s.get(source_name));

    let bitrate = source_override
        .and_then(|s| s.bitrate)
        .or_else(|| package_config.and_then(|p| p.bitrate))
        .unwrap_or(global_bitrate);

    let channels = source_override.and_then(|s| s.channels).unwrap_or(source_channels);

    (bitrate, channels)
}

struct EncodedSource {
    package: String,
    item: AtlasItem,
    was_cached: bool,
}

async fn encode_one(
    source: DiscoveredSource,
    package_config: Option<PackageConfig>,
    opts: Arc<PipelineOptions>,
) -> Result<EncodedSource, SourceError> {
    let source_path = source.path.display().to_string();

    ensure_conforming(&source.path, &opts.ffmpeg, opts.assume_yes).await?;
    let samples = read_pcm(&source.path)?;

    let (bitrate_kbps, channels) =
        resolve_params(package_config.as_ref(), &source.source_name, opts.default_bitrate, samples.channels);

    let payload = to_target_channels_bytes(&samples, channels);
    let hash = hash_pcm_payload(&payload);
    let address = ContentAddress { bitrate_kbps, channels, hash };
    let file_name = address.file_name();

    let webm_path = opts.outdir.join(format!("{file_name}.webm"));
    let already_encoded = if opts.use_cache && webm_path.is_file() {
        if existing_output_matches(&opts.ffmpeg, &webm_path, channels, hash).await {
            true
        } else {
            warn!(
                error = %SourceError::HashMismatch { source_path: source_path.clone() },
                path = %webm_path.display(),
                "recomputing and overwriting"
            );
            false
        }
    } else {
        false
    };

    if !already_encoded {
        std::fs::create_dir_all(&opts.outdir).map_err(|e| SourceError::ToolInvocation {
            source_path: source_path.clone(),
            message: e.to_string(),
        })?;
        run_ffmpeg_encode(&opts.ffmpeg, &source.path, &webm_path, bitrate_kbps, channels, "libopus").await?;
        if opts.include_mp4 {
            let mp4_path = opts.outdir.join(format!("{file_name}.mp4"));
            run_ffmpeg_encode(&opts.ffmpeg, &source.path, &mp4_path, bitrate_kbps, channels, "aac").await?;
        }
    }

    // Sample-count reconciliation: store the PCM-source frame count, not a
    // decoded count, since browser decoders may report a slightly different
    // length and the runtime corrects for that against this exact value.
    let sample_count = samples.frame_count();

    let item = AtlasItem::new(source.source_name.clone(), file_name, sample_count, source.language_tag.clone());
    Ok(EncodedSource { package: source.package, item, was_cached: already_encoded })
}

/// Decode an already-encoded output back to raw PCM and re-hash it the same
/// way `encode_one` hashed the source payload, to confirm the file on disk
/// still matches its own content-addressed name before trusting it as a
/// cache hit. Any decode failure or status error is treated as "can't
/// confirm it" rather than propagated, since the caller's fallback
/// (recompute and overwrite) is safe either way.
async fn existing_output_matches(ffmpeg: &Path, webm_path: &Path, channels: u16, expected_hash: u64) -> bool {
    let output = Command::new(ffmpeg)
        .arg("-i")
        .arg(webm_path)
        .arg("-f")
        .arg("s16le")
        .arg("-ar")
        .arg("48000")
        .arg("-ac")
        .arg(channels.to_string())
        .arg("pipe:1")
        .output()
        .await;

    match output {
        Ok(output) if output.status.success() => hash_pcm_payload(&output.stdout) == expected_hash,
        _ => false,
    }
}

async fn run_ffmpeg_encode(
    ffmpeg: &Path,
    input: &Path,
    output: &Path,
    bitrate_kbps: u32,
    channels: u16,
    codec: &str,
) -> Result<(), SourceError> {
    let source_path = input.display().to_string();
    let status = Command::new(ffmpeg)
        .arg("-y")
        .arg("-i")
        .arg(input)
        .arg("-ac")
        .arg(channels.to_string())
        .arg("-c:a")
        .arg(codec)
        .arg("-b:a")
        .arg(format!("{bitrate_kbps}k"))
        .arg(output)
        .status()
        .await
        .map_err(|e| SourceError::ToolInvocation { source_path: source_path.clone(), message: e.to_string() })?;

    if !status.success() {
        return Err(SourceError::EncodeFailure { source_path, status: status.code().unwrap_or(-1) });
    }
    Ok(())
}

/// Run phases 1-7 against an already-loaded config, returning the
/// accumulated atlas plus a tally of what happened.
pub async fn run(config: &RawConfig, opts: PipelineOptions) -> std::io::Result<PipelineReport> {
    let sources = discover(&opts.indir, &opts.selected_packages, &config.packages)?;
    info!(count = sources.len(), "discovered sources");

    let progress = ProgressBar::new(sources.len() as u64);
    progress.set_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let opts = Arc::new(opts);
    let atlas = Arc::new(Mutex::new(Atlas::new()));
    let semaphore = Arc::new(Semaphore::new(num_cpus::get().max(1)));
    let mut join_set = JoinSet::new();

    let encoded = Arc::new(Mutex::new(0usize));
    let skipped_cached = Arc::new(Mutex::new(0usize));
    let failures: Arc<Mutex<Vec<(String, String)>>> = Arc::new(Mutex::new(Vec::new()));
    let package_configs: HashMap<String, PackageConfig> = config.packages.clone();

    for source in sources {
        let opts = opts.clone();
        let atlas = atlas.clone();
        let encoded = encoded.clone();
        let skipped_cached = skipped_cached.clone();
        let failures = failures.clone();
        let semaphore = semaphore.clone();
        let progress = progress.clone();
        let package_config = package_configs.get(&source.package).cloned();

        join_set.spawn(async move {
            let permit = semaphore.acquire_owned().await.expect("semaphore not closed");
            let label = source.path.display().to_string();
            let result = encode_one(source, package_config, opts).await;
            drop(permit);

            match result {
                Ok(encoded_source) => {
                    atlas.lock().await.push_item(encoded_source.package, encoded_source.item);
                    if encoded_source.was_cached {
                        *skipped_cached.lock().await += 1;
                    } else {
                        *encoded.lock().await += 1;
                    }
                }
                Err(err) => {
                    warn!(source = %label, error = %err, "skipping source");
                    failures.lock().await.push((label, err.to_string()));
                }
            }
            progress.inc(1);
        });
    }

    while join_set.join_next().await.is_some() {}
    progress.finish_and_clear();

    let atlas = Arc::try_unwrap(atlas).expect("all workers finished").into_inner();
    let encoded = *encoded.lock().await;
    let skipped_cached = *skipped_cached.lock().await;
    let failures = Arc::try_unwrap(failures).expect("all workers finished").into_inner();
    let failed = failures.len();

    Ok(PipelineReport { atlas, encoded, skipped_cached, failed, failures })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceConfig;

    #[test]
    fn source_override_wins_over_package_and_global() {
        let mut sources = HashMap::new();
        sources.insert("hello".to_string(), SourceConfig { bitrate: Some(48), channels: Some(1) });
        let package = PackageConfig { bitrate: Some(32), sources: Some(sources), ..Default::default() };

        let (bitrate, channels) = resolve_params(Some(&package), "hello", 64, 2);
        assert_eq!(bitrate, 48);
        assert_eq!(channels, 1);
    }

    #[test]
    fn package_override_wins_over_global_default() {
        let package = PackageConfig { bitrate: Some(32), ..Default::default() };
        let (bitrate, channels) = resolve_params(Some(&package), "theme", 64, 2);
        assert_eq!(bitrate, 32);
        assert_eq!(channels, 2);
    }

    #[test]
    fn falls_back_to_global_default_and_source_channel_count() {
        let (bitrate, channels) = resolve_params(None, "theme", 64, 2);
        assert_eq!(bitrate, 64);
        assert_eq!(channels, 2);
    }
}
