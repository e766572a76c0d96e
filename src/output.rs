use std::fmt;
use std::path::Path;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, ValueEnum, Serialize, Deserialize, Default, PartialEq, Eq,)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Yaml,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_,>,) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Yaml => write!(f, "yaml"),
        }
    }
}

impl OutputFormat {
    pub fn from_extension(path: &Path,) -> Option<OutputFormat,> {
        path.extension()
            .and_then(|ext| ext.to_str(),)
            .and_then(|ext_str| match ext_str.to_lowercase().as_str() {
                "json" => Some(OutputFormat::Json,),
                "yaml" | "yml" => Some(OutputFormat::Yaml,),
                "txt" => Some(OutputFormat::Text,),
                _ => None,
            },)
    }

    /// Serializes `value` for the structured formats. `Text` has no generic rendering and
    /// yields `None`.
    pub fn serialize<T: Serialize,>(&self, value: &T,) -> Option<String,> {
        match self {
            OutputFormat::Json => Some(
                serde_json::to_string_pretty(value,)
                    .unwrap_or_else(|e| format!("Error serializing to JSON: {}", e),),
            ),
            OutputFormat::Yaml => Some(
                serde_yaml::to_string(value,)
                    .unwrap_or_else(|e| format!("Error serializing to YAML: {}", e),),
            ),
            OutputFormat::Text => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(OutputFormat::from_extension(Path::new("r.JSON")), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::from_extension(Path::new("r.yml")), Some(OutputFormat::Yaml));
        assert_eq!(OutputFormat::from_extension(Path::new("r.txt")), Some(OutputFormat::Text));
        assert_eq!(OutputFormat::from_extension(Path::new("r.csv")), None);
    }

    #[test]
    fn test_text_has_no_structured_serialization() {
        assert!(OutputFormat::Text.serialize(&vec![1, 2]).is_none());
        assert_eq!(OutputFormat::Json.serialize(&vec![1]).unwrap(), "[\n  1\n]");
    }
}
