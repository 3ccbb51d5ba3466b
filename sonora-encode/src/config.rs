//! # Encoder Configuration
//!
//! Loads `scodefig.jsonc`: ordinary JSON plus `//` and `/* */` comments. No
//! `jsonc` crate appears anywhere nearby in spirit, and stripping comments
//! before handing the text to `serde_json` is a handful of lines, so that's
//! what this does rather than pulling in a new parser crate for it.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub bitrate: Option<u32>,
    pub channels: Option<u16>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PackageConfig {
    pub sourcedir: Option<String>,
    pub bitrate: Option<u32>,
    /// Subdirectory name → language tag, e.g. `{"voiceover_en": "en"}`. The
    /// `_` subdirectory is always the no-language sentinel regardless of
    /// whether it's listed here.
    pub languages: Option<HashMap<String, String>>,
    pub sources: Option<HashMap<String, SourceConfig>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawConfig {
    pub indir: Option<String>,
    pub outdir: Option<String>,
    pub bitrate: Option<u32>,
    pub yes: Option<bool>,
    pub loglevel: Option<String>,
    pub packages: HashMap<String, PackageConfig>,
}

impl RawConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let stripped = strip_jsonc_comments(&text);
        serde_json::from_str(&stripped).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}

/// Strip `//line` and `/* block */` comments outside of string literals.
/// Doesn't special-case escaped quotes inside strings beyond the standard
/// backslash-escape rule, which is all JSON string literals need.
fn strip_jsonc_comments(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut in_string = false;
    let mut escaped = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '/' if chars.peek() == Some(&'/') => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for c in chars.by_ref() {
                    if prev == '*' && c == '/' {
                        break;
                    }
                    prev = c;
                }
            }
            _ => out.push(c),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_line_and_block_comments() {
        let jsonc = r#"{
            // a line comment
            "indir": "packages", /* inline */
            "bitrate": 64
        }"#;
        let stripped = strip_jsonc_comments(jsonc);
        let parsed: RawConfig = serde_json::from_str(&stripped).unwrap();
        assert_eq!(parsed.indir.as_deref(), Some("packages"));
        assert_eq!(parsed.bitrate, Some(64));
    }

    #[test]
    fn leaves_comment_like_sequences_inside_strings_alone() {
        let jsonc = r#"{ "indir": "http://example.com/not-a-comment" }"#;
        let stripped = strip_jsonc_comments(jsonc);
        let parsed: RawConfig = serde_json::from_str(&stripped).unwrap();
        assert_eq!(parsed.indir.as_deref(), Some("http://example.com/not-a-comment"));
    }

    #[test]
    fn parses_nested_package_and_source_overrides() {
        let jsonc = r#"{
            "packages": {
                "voice": {
                    "bitrate": 32,
                    "languages": { "en": "en", "_": "_" },
                    "sources": {
                        "hello": { "bitrate": 48, "channels": 1 }
                    }
                }
            }
        }"#;
        let parsed: RawConfig = serde_json::from_str(&strip_jsonc_comments(jsonc)).unwrap();
        let voice = parsed.packages.get("voice").unwrap();
        assert_eq!(voice.bitrate, Some(32));
        let hello = voice.sources.as_ref().unwrap().get("hello").unwrap();
        assert_eq!(hello.bitrate, Some(48));
        assert_eq!(hello.channels, Some(1));
    }
}
