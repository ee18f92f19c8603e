//! Normalized module path identity
//!
//! Import specifiers reach the linker in several textual shapes (`../dom`,
//! `../dom.js`, `./dom.js`). Rather than matching each shape separately, every
//! relative specifier is resolved once against its importer into a
//! `ModulePath` and compared structurally with chunk file names.

use std::fmt;

/// Extensions stripped from the final segment when building an identity
const SCRIPT_EXTENSIONS: &[&str] = &[".js", ".mjs"];

/// Bundle-relative module identity: path segments with the script extension removed
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModulePath {
    segments: Vec<String>,
}

impl ModulePath {
    /// Build the identity of a chunk from its bundle file name
    pub fn from_file_name(file_name: &str) -> Self {
        let mut segments = Vec::new();
        push_segments(&mut segments, file_name);
        strip_extension(&mut segments);
        Self { segments }
    }

    /// Resolve a relative import specifier against the importing chunk.
    ///
    /// Returns `None` for bare or absolute specifiers, which never refer to a
    /// chunk of the bundle. `..` segments that would climb above the bundle
    /// root are clamped at the root, because bundlers emit the same relative
    /// prefix regardless of how deep the consuming entry ends up.
    pub fn resolve(importer: &str, specifier: &str) -> Option<Self> {
        if !is_relative(specifier) {
            return None;
        }

        let mut segments = Vec::new();
        push_segments(&mut segments, importer);
        // Drop the importer's own file name
        segments.pop();
        push_segments(&mut segments, specifier);
        strip_extension(&mut segments);
        Some(Self { segments })
    }

    /// Final path segment without extension (e.g. `dom` for `utils/dom.js`)
    pub fn stem(&self) -> &str {
        self.segments.last().map_or("", String::as_str)
    }
}

impl fmt::Display for ModulePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

/// Check whether a specifier is a `./` or `../` relative reference
pub fn is_relative(specifier: &str) -> bool {
    specifier.starts_with("./") || specifier.starts_with("../")
}

fn push_segments(segments: &mut Vec<String>, path: &str) {
    for part in path.split(['/', '\\']) {
        match part {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other.to_owned()),
        }
    }
}

fn strip_extension(segments: &mut [String]) {
    if let Some(last) = segments.last_mut() {
        for ext in SCRIPT_EXTENSIONS {
            if let Some(stem) = last.strip_suffix(ext) {
                *last = stem.to_owned();
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_extension_and_prefix_variants_share_identity() {
        let target = ModulePath::from_file_name("dom.js");
        for specifier in ["../dom", "../dom.js"] {
            assert_eq!(
                ModulePath::resolve("content/calendar.js", specifier),
                Some(target.clone()),
                "{specifier}"
            );
        }
        assert_eq!(ModulePath::resolve("calendar.js", "./dom.js"), Some(target));
    }

    #[test]
    fn test_parent_segments_clamp_at_root() {
        let resolved = ModulePath::resolve("calendar.js", "../dom").unwrap();
        assert_eq!(resolved.to_string(), "dom");
    }

    #[test]
    fn test_nested_resolution() {
        let resolved = ModulePath::resolve("content/calendar.js", "./shared/time.js").unwrap();
        assert_eq!(resolved.to_string(), "content/shared/time");
        assert_eq!(resolved.stem(), "time");
    }

    #[test]
    fn test_bare_specifiers_are_not_chunks() {
        assert_eq!(ModulePath::resolve("calendar.js", "lodash"), None);
        assert_eq!(ModulePath::resolve("calendar.js", "/abs/dom.js"), None);
    }
}
