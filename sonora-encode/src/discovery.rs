//! # Discovery
//!
//! Walks `{indir}/packages/<package>/<sourcedir>/...`, grouping `.wav`
//! files by `(package, language_tag)`. A file directly under `sourcedir` is
//! unlocalized (`"_"`); one under a subdirectory takes that subdirectory's
//! name as its language tag, unless the package config's `languages` map
//! remaps it to a different tag.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::config::PackageConfig;

pub const NO_LANGUAGE: &str = "_";
const DEFAULT_SOURCEDIR: &str = "sounds";

#[derive(Debug, Clone)]
pub struct DiscoveredSource {
    pub package: String,
    pub language_tag: String,
    pub source_name: String,
    pub path: PathBuf,
}

/// Discover every `.wav` source under `indir/packages/`, restricted to
/// `selected_packages` if non-empty (an empty selection means "all
/// packages present on disk").
pub fn discover(
    indir: &Path,
    selected_packages: &[String],
    package_configs: &HashMap<String, PackageConfig>,
) -> std::io::Result<Vec<DiscoveredSource>> {
    let packages_root = indir.join("packages");
    let mut sources = Vec::new();

    for entry in std::fs::read_dir(&packages_root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let package = entry.file_name().to_string_lossy().into_owned();
        if !selected_packages.is_empty() && !selected_packages.contains(&package) {
            continue;
        }

        let sourcedir = package_configs
            .get(&package)
            .and_then(|cfg| cfg.sourcedir.clone())
            .unwrap_or_else(|| DEFAULT_SOURCEDIR.to_string());
        let languages = package_configs.get(&package).and_then(|cfg| cfg.languages.clone());
        let source_root = entry.path().join(&sourcedir);
        if !source_root.is_dir() {
            continue;
        }

        for file in WalkDir::new(&source_root).into_iter().filter_map(Result::ok) {
            if !file.file_type().is_file() {
                continue;
            }
            let path = file.path();
            if path.extension().and_then(|e| e.to_str()) != Some("wav") {
                continue;
            }

            let relative = path.strip_prefix(&source_root).unwrap();
            let language_tag = match relative.parent().and_then(|p| p.components().next()) {
                None => NO_LANGUAGE.to_string(),
                Some(component) => {
                    let subdir = component.as_os_str().to_string_lossy().into_owned();
                    if subdir == NO_LANGUAGE {
                        NO_LANGUAGE.to_string()
                    } else {
                        languages
                            .as_ref()
                            .and_then(|map| map.get(&subdir).cloned())
                            .unwrap_or(subdir)
                    }
                }
            };

            let source_name = path.file_stem().unwrap().to_string_lossy().into_owned();
            sources.push(DiscoveredSource {
                package: package.clone(),
                language_tag,
                source_name,
                path: path.to_path_buf(),
            });
        }
    }

    Ok(sources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn groups_unlocalized_and_localized_sources() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("packages/music/sounds/theme.wav"));
        touch(&root.join("packages/voice/sounds/en/hello.wav"));
        touch(&root.join("packages/voice/sounds/_/bye.wav"));

        let found = discover(root, &[], &HashMap::new()).unwrap();
        let mut tags: Vec<(&str, &str, &str)> = found
            .iter()
            .map(|s| (s.package.as_str(), s.language_tag.as_str(), s.source_name.as_str()))
            .collect();
        tags.sort();

        assert_eq!(
            tags,
            vec![
                ("music", "_", "theme"),
                ("voice", "_", "bye"),
                ("voice", "en", "hello"),
            ]
        );
    }

    #[test]
    fn package_selection_filters_discovery() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("packages/music/sounds/theme.wav"));
        touch(&root.join("packages/voice/sounds/hello.wav"));

        let found = discover(root, &["music".to_string()], &HashMap::new()).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].package, "music");
    }

    #[test]
    fn remaps_language_subdirectory_through_package_config() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("packages/voice/sounds/voiceover_en/hello.wav"));

        let mut languages = HashMap::new();
        languages.insert("voiceover_en".to_string(), "en".to_string());
        let mut configs = HashMap::new();
        configs.insert(
            "voice".to_string(),
            PackageConfig {
                languages: Some(languages),
                ..Default::default()
            },
        );

        let found = discover(root, &[], &configs).unwrap();
        assert_eq!(found[0].language_tag, "en");
    }
}
