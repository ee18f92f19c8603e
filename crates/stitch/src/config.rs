//! Build configuration
//!
//! Loaded from `stitch.toml`; every key is optional. Relative directories are
//! interpreted relative to the file they were read from.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use log::debug;
use serde::Deserialize;

use crate::linker::LinkOptions;

/// Name of the configuration file looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "stitch.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Directory holding the bundler's chunk output
    pub input_dir: PathBuf,
    /// Where linked entries are written; `None` rewrites `input_dir` in place
    pub output_dir: Option<PathBuf>,
    /// Entry chunk file names, relative to `input_dir`
    pub entries: Vec<String>,
    /// Treat an import of a name the shared chunk does not export as an error
    pub strict_aliases: bool,
    /// Run structural checks on the linked output
    pub verify: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("dist"),
            output_dir: None,
            entries: Vec::new(),
            strict_aliases: false,
            verify: true,
        }
    }
}

impl Config {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse configuration")
    }

    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file {}", path.display()))?;
        let mut config = Self::from_toml_str(&content)
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;

        if let Some(base) = path.parent() {
            config.input_dir = base.join(&config.input_dir);
            config.output_dir = config.output_dir.map(|dir| base.join(dir));
        }
        debug!("Loaded configuration from {}: {config:?}", path.display());
        Ok(config)
    }

    /// Load `stitch.toml` from `dir` if it exists, otherwise use defaults
    pub fn discover(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE_NAME);
        if path.is_file() {
            Self::load(&path)
        } else {
            debug!("No {CONFIG_FILE_NAME} in {}, using defaults", dir.display());
            Ok(Self::default())
        }
    }

    /// Directory the linked entries are written to
    pub fn output_dir(&self) -> &Path {
        self.output_dir.as_deref().unwrap_or(&self.input_dir)
    }

    /// Whether the build rewrites its input directory
    ///
    /// Paths that do not exist yet are compared as written.
    pub fn is_in_place(&self) -> bool {
        match (
            fs::canonicalize(self.output_dir()),
            fs::canonicalize(&self.input_dir),
        ) {
            (Ok(output), Ok(input)) => output == input,
            _ => self.output_dir() == self.input_dir,
        }
    }

    pub fn link_options(&self) -> LinkOptions {
        LinkOptions {
            strict_aliases: self.strict_aliases,
            verify: self.verify,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert!(config.verify);
        assert!(config.is_in_place());
    }

    #[test]
    fn test_parse_all_keys() {
        let config = Config::from_toml_str(
            r#"
input_dir = "build/chunks"
output_dir = "build/extension"
entries = ["content/calendar.js", "content/contact.js"]
strict_aliases = true
verify = false
"#,
        )
        .unwrap();

        assert_eq!(config.input_dir, PathBuf::from("build/chunks"));
        assert_eq!(config.output_dir(), Path::new("build/extension"));
        assert_eq!(config.entries.len(), 2);
        assert!(config.strict_aliases);
        assert!(!config.is_in_place());
        assert_eq!(
            config.link_options(),
            LinkOptions {
                strict_aliases: true,
                verify: false,
            }
        );
    }

    #[test]
    fn test_in_place_compares_resolved_paths() {
        let temp = TempDir::new().unwrap();
        let input_dir = temp.path().join("dist");
        fs::create_dir(&input_dir).unwrap();

        let config = Config {
            output_dir: Some(temp.path().join("dist/../dist")),
            input_dir,
            ..Default::default()
        };
        assert!(config.is_in_place());

        let elsewhere = temp.path().join("out");
        fs::create_dir(&elsewhere).unwrap();
        let config = Config {
            output_dir: Some(elsewhere),
            ..config
        };
        assert!(!config.is_in_place());
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        assert!(Config::from_toml_str("inputdir = \"x\"").is_err());
    }

    #[test]
    fn test_discover_resolves_relative_to_file() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join(CONFIG_FILE_NAME),
            "input_dir = \"dist\"\nentries = [\"a.js\"]\n",
        )
        .unwrap();

        let config = Config::discover(temp.path()).unwrap();
        assert_eq!(config.input_dir, temp.path().join("dist"));
        assert_eq!(config.entries, vec!["a.js"]);
    }

    #[test]
    fn test_discover_without_file_uses_defaults() {
        let temp = TempDir::new().unwrap();
        assert_eq!(Config::discover(temp.path()).unwrap(), Config::default());
    }
}
