//! Compiler options and the optional `js2f.toml` project file.
//!
//! Options come from three layers, later ones winning: built-in
//! defaults, a `js2f.toml` next to the input (or named explicitly), and
//! CLI flags.
//!
//! ```toml
//! [build]
//! out-dir = "build"
//! annotate = true
//! source-comments = false
//! debug-output = false
//! ```

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// File name looked up next to each input.
pub const PROJECT_CONFIG_FILE: &str = "js2f.toml";

/// Options controlling a single compilation.
#[derive(Debug, Clone)]
pub struct CompilerOptions {
    /// Run the stack annotator over the coalesced output.
    pub annotate: bool,
    /// Echo each statement's source text into the output as comments.
    pub source_comments: bool,
    /// On failure, dump whatever was emitted before the error next to
    /// the output file.
    pub debug_output: bool,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        CompilerOptions {
            annotate: true,
            source_comments: false,
            debug_output: false,
        }
    }
}

/// Parsed `js2f.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub build: BuildSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BuildSection {
    #[serde(default)]
    pub out_dir: Option<PathBuf>,
    #[serde(default)]
    pub annotate: Option<bool>,
    #[serde(default)]
    pub source_comments: Option<bool>,
    #[serde(default)]
    pub debug_output: Option<bool>,
}

impl ProjectConfig {
    /// Parse configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, String> {
        toml::from_str(toml_str).map_err(|e| format!("Failed to parse {}: {}", PROJECT_CONFIG_FILE, e))
    }

    /// Load the config file sitting next to `input`, if there is one.
    pub fn load_near(input: &Path) -> Result<Option<Self>, String> {
        let directory = input.parent().unwrap_or_else(|| Path::new("."));
        let path = directory.join(PROJECT_CONFIG_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        Self::from_toml(&content).map(Some)
    }

    /// Compiler options with this config applied over the defaults.
    pub fn options(&self) -> CompilerOptions {
        let defaults = CompilerOptions::default();
        CompilerOptions {
            annotate: self.build.annotate.unwrap_or(defaults.annotate),
            source_comments: self
                .build
                .source_comments
                .unwrap_or(defaults.source_comments),
            debug_output: self.build.debug_output.unwrap_or(defaults.debug_output),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = CompilerOptions::default();
        assert!(options.annotate);
        assert!(!options.source_comments);
        assert!(!options.debug_output);
    }

    #[test]
    fn test_from_toml() {
        let config = ProjectConfig::from_toml(
            r#"
            [build]
            out-dir = "build"
            annotate = false
            source-comments = true
            "#,
        )
        .unwrap();
        assert_eq!(config.build.out_dir, Some(PathBuf::from("build")));
        assert_eq!(config.build.annotate, Some(false));
        assert_eq!(config.build.source_comments, Some(true));
        assert_eq!(config.build.debug_output, None);
    }

    #[test]
    fn test_empty_toml_keeps_defaults() {
        let config = ProjectConfig::from_toml("").unwrap();
        let options = config.options();
        assert!(options.annotate);
        assert!(!options.source_comments);
    }

    #[test]
    fn test_options_merge_over_defaults() {
        let config = ProjectConfig::from_toml("[build]\nannotate = false\n").unwrap();
        let options = config.options();
        assert!(!options.annotate);
        assert!(!options.source_comments);
    }

    #[test]
    fn test_bad_toml_is_an_error() {
        let error = ProjectConfig::from_toml("[build\n").unwrap_err();
        assert!(error.contains("js2f.toml"));
    }

    #[test]
    fn test_load_near_missing_file() {
        let directory = tempfile::tempdir().unwrap();
        let input = directory.path().join("game.js");
        assert!(ProjectConfig::load_near(&input).unwrap().is_none());
    }

    #[test]
    fn test_load_near_reads_sibling_config() {
        let directory = tempfile::tempdir().unwrap();
        std::fs::write(
            directory.path().join(PROJECT_CONFIG_FILE),
            "[build]\nsource-comments = true\n",
        )
        .unwrap();
        let input = directory.path().join("game.js");
        let config = ProjectConfig::load_near(&input).unwrap().unwrap();
        assert_eq!(config.build.source_comments, Some(true));
    }
}
