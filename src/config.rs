use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_MAX_CALL_DEPTH: usize = 10_000;

/// Interpreter settings. Every field may be omitted from a config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Calls nested deeper than this fail with a stack overflow error.
    pub max_call_depth: usize,
    /// Directory that import paths are resolved against.
    pub src_root: Option<PathBuf>,
    /// Function run by `run_main`.
    pub entry: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            src_root: None,
            entry: "main".to_string(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::io::Write;

    #[test]
    fn test_missing_fields_take_defaults() {
        let config = Config::from_json(r#"{ "max_call_depth": 64 }"#).unwrap();
        assert_eq!(config.max_call_depth, 64);
        assert_eq!(config.entry, "main");
        assert_eq!(config.src_root, None);
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let err = Config::from_json(r#"{ "max_depth": 1 }"#).unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "src_root": "testgo/src", "entry": "Start" }}"#).unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.src_root, Some(PathBuf::from("testgo/src")));
        assert_eq!(config.entry, "Start");
        assert_eq!(config.max_call_depth, DEFAULT_MAX_CALL_DEPTH);
    }
}
