use std::{
    fs, io,
    path::{Path, PathBuf},
};

use component_manifest::keys;
use serde_json::{Map, Value};

use crate::diagnostics::{Diagnostic, DiagnosticKind, Severity};

/// Manifests larger than this are rejected unread.
pub const MAX_MANIFEST_BYTES: u64 = 1024 * 1024;

type DecodeError = Box<dyn std::error::Error + Send + Sync>;

/// Reasons a single manifest file is kept out of the registry.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("failed to read manifest {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("manifest {} is {size} bytes (max {max})", .path.display())]
    TooLarge { path: PathBuf, size: u64, max: u64 },
    #[error("failed to decode manifest {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: DecodeError,
    },
    #[error("manifest {} is missing required keys: {}", .path.display(), .keys.join(", "))]
    MissingRequired { path: PathBuf, keys: Vec<String> },
    #[error("manifest {} has an invalid `{key}`: {reason}", .path.display())]
    InvalidField {
        path: PathBuf,
        key: String,
        reason: String,
    },
}

impl ManifestError {
    pub fn path(&self) -> &Path {
        match self {
            ManifestError::Read { path, .. }
            | ManifestError::TooLarge { path, .. }
            | ManifestError::Decode { path, .. }
            | ManifestError::MissingRequired { path, .. }
            | ManifestError::InvalidField { path, .. } => path,
        }
    }

    pub fn kind(&self) -> DiagnosticKind {
        match self {
            ManifestError::Read { .. } => DiagnosticKind::ReadFailed,
            ManifestError::TooLarge { .. } => DiagnosticKind::TooLarge,
            ManifestError::Decode { .. } => DiagnosticKind::DecodeFailed,
            ManifestError::MissingRequired { .. } => DiagnosticKind::MissingRequired,
            ManifestError::InvalidField { .. } => DiagnosticKind::InvalidField,
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        let diagnostic =
            Diagnostic::new(Severity::Warning, self.kind(), self.to_string()).at(self.path());
        match self {
            ManifestError::MissingRequired { keys, .. } => diagnostic.with("keys", keys.join(",")),
            ManifestError::InvalidField { key, .. } => diagnostic.with("key", key),
            _ => diagnostic,
        }
    }
}

/// Document syntax, chosen from the manifest suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    Yaml,
    Json,
    Toml,
}

impl ManifestFormat {
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        let ext = suffix.rsplit('.').next()?;
        match ext.to_ascii_lowercase().as_str() {
            "yml" | "yaml" => Some(Self::Yaml),
            "json" => Some(Self::Json),
            "toml" => Some(Self::Toml),
            _ => None,
        }
    }

    pub fn decode(self, raw: &str) -> Result<Value, DecodeError> {
        let value = match self {
            ManifestFormat::Yaml => serde_yaml::from_str::<Value>(raw)?,
            ManifestFormat::Json => serde_json::from_str::<Value>(raw)?,
            ManifestFormat::Toml => toml::from_str::<Value>(raw)?,
        };
        Ok(value)
    }
}

/// Reads, decodes and validates one manifest file into a normalised key map.
#[derive(Debug, Clone, Copy)]
pub struct ManifestParser {
    format: ManifestFormat,
}

impl ManifestParser {
    pub fn new(format: ManifestFormat) -> Self {
        Self { format }
    }

    pub fn for_suffix(suffix: &str) -> Option<Self> {
        ManifestFormat::from_suffix(suffix).map(Self::new)
    }

    pub fn format(&self) -> ManifestFormat {
        self.format
    }

    pub fn parse(&self, path: &Path) -> Result<Map<String, Value>, ManifestError> {
        let size = fs::metadata(path)
            .map_err(|source| ManifestError::Read {
                path: path.to_path_buf(),
                source,
            })?
            .len();
        if size > MAX_MANIFEST_BYTES {
            return Err(ManifestError::TooLarge {
                path: path.to_path_buf(),
                size,
                max: MAX_MANIFEST_BYTES,
            });
        }
        let raw = fs::read_to_string(path).map_err(|source| {
            if source.kind() == io::ErrorKind::InvalidData {
                ManifestError::Decode {
                    path: path.to_path_buf(),
                    source: "manifest is not valid UTF-8".into(),
                }
            } else {
                ManifestError::Read {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        self.parse_str(&raw, path)
    }

    /// Decodes `raw` as if read from `path`. Null-valued keys are dropped so
    /// that they fall back to defaults.
    pub fn parse_str(&self, raw: &str, path: &Path) -> Result<Map<String, Value>, ManifestError> {
        let decoded = self
            .format
            .decode(raw)
            .map_err(|source| ManifestError::Decode {
                path: path.to_path_buf(),
                source,
            })?;
        let mut document = match decoded {
            Value::Object(map) => map,
            other => {
                return Err(ManifestError::Decode {
                    path: path.to_path_buf(),
                    source: format!("expected a mapping at the top level, found {}", kind_of(&other))
                        .into(),
                })
            }
        };
        document.retain(|_, value| !value.is_null());
        keys::normalize_keys(&mut document);
        validate(path, &document)?;
        Ok(document)
    }
}

fn validate(path: &Path, document: &Map<String, Value>) -> Result<(), ManifestError> {
    let mut missing = Vec::new();
    for key in keys::REQUIRED {
        match document.get(key) {
            None => missing.push(key.to_string()),
            Some(Value::String(text)) if text.trim().is_empty() => missing.push(key.to_string()),
            Some(Value::String(_)) => {}
            Some(other) => return Err(invalid(path, key, other)),
        }
    }
    if !missing.is_empty() {
        return Err(ManifestError::MissingRequired {
            path: path.to_path_buf(),
            keys: missing,
        });
    }

    match document.get(keys::TYPE) {
        None => {}
        Some(Value::String(tag)) if !tag.trim().is_empty() => {}
        Some(other) => return Err(invalid(path, keys::TYPE, other)),
    }
    Ok(())
}

fn invalid(path: &Path, key: &str, found: &Value) -> ManifestError {
    ManifestError::InvalidField {
        path: path.to_path_buf(),
        key: key.to_string(),
        reason: format!("expected a non-empty string, found {}", kind_of(found)),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}
