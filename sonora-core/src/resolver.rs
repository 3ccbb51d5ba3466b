//! # Resolver
//!
//! Given `(source_name, package, language)`, produce the concrete
//! `file_name` using package/language fallback rules. Pure with respect to
//! the atlas and its arguments — no mutation, usable from both the runtime
//! and the encoder wherever file-name lookups are needed.

use crate::atlas::{Atlas, AtlasItem};

/// Resolve `source_name` within `package`, honoring `language`, falling
/// back across packages in atlas insertion order if `package` has no match.
///
/// Within `package`, the first item whose `source_name` matches and whose
/// `language_tag` is `"_"` or equals `language` wins — the `"_"` check is
/// listed first in the predicate so an unlocalized item that appears before
/// a localized variant of the same name takes precedence.
///
/// If `package` doesn't exist, or has no match, iterate every package in the
/// atlas in insertion order and apply the same rule. This lookup is
/// intentionally independent of which package is "current" — only the
/// starting `package` argument matters, never implicit state.
pub fn resolve(atlas: &Atlas, source_name: &str, package: &str, language: &str) -> Option<String> {
    resolve_item(atlas, source_name, package, language).map(|item| item.file_name.clone())
}

/// Same lookup as [`resolve`], but returns the whole matched item rather
/// than just its `file_name` — `SoundManager` needs the item's
/// `sample_count` too, to size a placeholder before anything has been
/// fetched.
pub fn resolve_item<'a>(
    atlas: &'a Atlas,
    source_name: &str,
    package: &str,
    language: &str,
) -> Option<&'a AtlasItem> {
    if let Some(items) = atlas.package(package) {
        if let Some(hit) = find_in(items, source_name, language) {
            return Some(hit);
        }
    }

    for (name, items) in atlas.packages() {
        if name == package {
            continue;
        }
        if let Some(hit) = find_in(items, source_name, language) {
            return Some(hit);
        }
    }

    None
}

fn find_in<'a>(items: &'a [AtlasItem], source_name: &str, language: &str) -> Option<&'a AtlasItem> {
    items
        .iter()
        .find(|item| item.source_name == source_name && item.matches_language(language))
}
