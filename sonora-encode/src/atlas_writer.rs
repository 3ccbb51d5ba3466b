//! Atomic atlas writes: write to a temp file beside the destination, then
//! rename over it, so a crash mid-write never leaves a half-written
//! `.atlas.json` for the runtime to load.

use std::io::Write;
use std::path::Path;

use sonora_core::atlas::Atlas;

use crate::error::ConfigError;

pub fn write_atlas(outdir: &Path, atlas: &Atlas) -> Result<(), ConfigError> {
    let path = outdir.join(".atlas.json");
    let json = atlas
        .to_json()
        .map_err(|e| ConfigError::Write { path: path.display().to_string(), message: e.to_string() })?;

    let mut temp = tempfile::NamedTempFile::new_in(outdir).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    temp.write_all(json.as_bytes())
        .map_err(|source| ConfigError::Read { path: path.display().to_string(), source })?;
    temp.persist(&path)
        .map_err(|e| ConfigError::Write { path: path.display().to_string(), message: e.error.to_string() })?;

    Ok(())
}
