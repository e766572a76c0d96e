use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analysis::extractor::{DEFAULT_TEXT_SAMPLE_LEN, ExtractOptions};
use crate::analysis::filter::FilterCondition;
use crate::error::FieldScopeError;

pub const CONFIG_FILE_NAME: &str = ".fieldscope.toml";

/// Settings read from `.fieldscope.toml`. Command-line flags override them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize,)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Literal prefix removed from every element name before analysis, e.g. `ns:`.
    pub strip_prefix:    Option<String,>,
    pub recursive:       bool,
    pub text_sample_len: usize,
    pub filters:         Vec<FilterCondition,>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            strip_prefix:    None,
            recursive:       false,
            text_sample_len: DEFAULT_TEXT_SAMPLE_LEN,
            filters:         Vec::new(),
        }
    }
}

impl AnalysisConfig {
    pub fn extract_options(&self,) -> ExtractOptions {
        ExtractOptions {
            text_sample_len: self.text_sample_len,
        }
    }
}

pub fn parse_config(contents: &str, path: &Path,) -> Result<AnalysisConfig, FieldScopeError,> {
    let config: AnalysisConfig =
        toml::from_str(contents,).map_err(|e| FieldScopeError::ConfigError {
            path:    path.to_path_buf(),
            message: e.to_string(),
        },)?;
    if config.text_sample_len == 0 {
        return Err(FieldScopeError::ConfigError {
            path:    path.to_path_buf(),
            message: "text_sample_len must be at least 1".to_string(),
        },);
    }
    Ok(config,)
}

fn read_config(path: &Path,) -> Result<AnalysisConfig, FieldScopeError,> {
    let contents = std::fs::read_to_string(path,).map_err(|e| FieldScopeError::FileReadError {
        path:   path.to_path_buf(),
        source: e,
    },)?;
    let config = parse_config(&contents, path,)?;
    debug!("loaded config from {}", path.display());
    Ok(config,)
}

/// Loads `explicit` when given, else `.fieldscope.toml` in `dir` when present, else defaults.
pub fn load_config(explicit: Option<&Path,>, dir: &Path,) -> Result<AnalysisConfig, FieldScopeError,> {
    if let Some(path,) = explicit {
        return read_config(path,);
    }
    let candidate: PathBuf = dir.join(CONFIG_FILE_NAME,);
    if candidate.is_file() {
        read_config(&candidate,)
    } else {
        debug!("no {} in {}, using defaults", CONFIG_FILE_NAME, dir.display());
        Ok(AnalysisConfig::default(),)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config = parse_config(
            r#"
            strip_prefix = "ns:"
            recursive = true
            text_sample_len = 20

            [[filters]]
            field = "Status"
            value = "open*"

            [[filters]]
            field = "Id"
            value = "A-1"
            case_sensitive = true
            "#,
            Path::new("test.toml",),
        )
        .unwrap();
        assert_eq!(config.strip_prefix.as_deref(), Some("ns:"));
        assert!(config.recursive);
        assert_eq!(config.extract_options().text_sample_len, 20);
        assert_eq!(config.filters.len(), 2);
        assert!(!config.filters[0].case_sensitive);
        assert!(config.filters[1].case_sensitive);
    }

    #[test]
    fn test_empty_config_is_default() {
        let config = parse_config("", Path::new("empty.toml",),).unwrap();
        assert_eq!(config, AnalysisConfig::default());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        assert!(matches!(
            parse_config("recursive = \"yes\"", Path::new("bad.toml")),
            Err(FieldScopeError::ConfigError { .. })
        ));
        assert!(matches!(
            parse_config("unknown_key = 1", Path::new("bad.toml")),
            Err(FieldScopeError::ConfigError { .. })
        ));
        assert!(matches!(
            parse_config("text_sample_len = 0", Path::new("bad.toml")),
            Err(FieldScopeError::ConfigError { .. })
        ));
    }

    #[test]
    fn test_missing_default_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load_config(None, dir.path()).unwrap(), AnalysisConfig::default());
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "recursive = true",).unwrap();
        assert!(load_config(None, dir.path()).unwrap().recursive);
    }
}
