//! `sonora-encode` — offline CLI that re-encodes 48 kHz PCM sources into
//! content-addressed Opus/AAC containers and emits the atlas.
//!
//! CLI flags override `scodefig.jsonc` values; the config file fills in
//! whatever a flag didn't set. See [`config`] for the recognized keys.

mod atlas_writer;
mod config;
mod discovery;
mod error;
mod pipeline;
mod source;

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::Parser;

use config::RawConfig;
use pipeline::PipelineOptions;
use sonora_runtime::logging::{self, LogLevel};

/// Re-encode 48 kHz PCM package sources into content-addressed Opus/AAC and
/// emit the atlas manifest that the runtime loads.
#[derive(Parser, Debug)]
#[command(name = "sonora-encode")]
struct Params {
    /// Path to `scodefig.jsonc`.
    #[arg(long = "config", default_value = "scodefig.jsonc")]
    config: PathBuf,

    /// Root of the package tree. Overrides the config's `indir`.
    #[arg(long)]
    indir: Option<PathBuf>,

    /// Destination directory. Overrides the config's `outdir`.
    #[arg(long)]
    outdir: Option<PathBuf>,

    /// Default per-channel bitrate in kbps. Overrides the config's `bitrate`.
    #[arg(long)]
    bitrate: Option<u32>,

    /// Restrict the run to these packages (repeatable); default is all
    /// packages found under `indir/packages/`.
    #[arg(long = "packages")]
    packages: Vec<String>,

    /// Also emit an AAC-in-MP4 file alongside the Opus-in-WebM one.
    #[arg(long, default_value_t = true)]
    include_mp4: bool,

    /// Answer to the confirmation prompt before re-encoding non-conforming
    /// sources (`--yes=true` skips it, `--yes=false` refuses without one).
    /// Overrides the config's `yes`.
    #[arg(long)]
    yes: Option<bool>,

    /// One of debug, perf, info, success, warn, error, silent. Overrides the
    /// config's `loglevel`.
    #[arg(long)]
    loglevel: Option<String>,

    /// Skip re-encoding a source whose output file already exists under its
    /// content-addressed name.
    #[arg(long, default_value_t = true)]
    use_cache: bool,

    /// Path to the external media tool.
    #[arg(long, default_value = "ffmpeg")]
    ffmpeg: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let params = Params::parse();
    let config = if params.config.is_file() {
        RawConfig::load(&params.config).with_context(|| format!("loading {}", params.config.display()))?
    } else {
        RawConfig::default()
    };

    let loglevel = params
        .loglevel
        .clone()
        .or_else(|| config.loglevel.clone())
        .unwrap_or_else(|| "info".to_string());
    logging::init(LogLevel::from_str(&loglevel).unwrap_or(LogLevel::Info))
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let indir = params
        .indir
        .clone()
        .or_else(|| config.indir.clone().map(PathBuf::from))
        .context("indir not set (pass --indir or set it in the config)")?;
    let outdir = params
        .outdir
        .clone()
        .or_else(|| config.outdir.clone().map(PathBuf::from))
        .context("outdir not set (pass --outdir or set it in the config)")?;
    let default_bitrate = params.bitrate.or(config.bitrate).unwrap_or(64);
    let assume_yes = params.yes.or(config.yes).unwrap_or(false);

    let opts = PipelineOptions {
        indir,
        outdir: outdir.clone(),
        default_bitrate,
        selected_packages: params.packages.clone(),
        include_mp4: params.include_mp4,
        assume_yes,
        use_cache: params.use_cache,
        ffmpeg: params.ffmpeg.clone(),
    };

    let report = pipeline::run(&config, opts).await.context("encode pipeline failed")?;
    atlas_writer::write_atlas(&outdir, &report.atlas).context("writing atlas")?;

    sonora_runtime::success!(
        encoded = report.encoded,
        skipped_cached = report.skipped_cached,
        failed = report.failed,
        "encode run finished"
    );

    if !report.failures.is_empty() {
        eprintln!("\n{} source(s) failed to encode:", report.failures.len());
        for (source_path, message) in &report.failures {
            eprintln!("  {source_path}: {message}");
        }
        anyhow::bail!("{} source(s) failed to encode", report.failed);
    }
    Ok(())
}
