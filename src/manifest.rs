//! Version manifest as a flat key-value document.
//!
//! Info.plist files (XML or binary) and JSON manifests are supported. Only the
//! version and build keys are read or written; every other entry is carried
//! through untouched.

use std::io::Cursor;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ManifestConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManifestError {
    #[error("manifest is not a valid {format} document: {message}")]
    Parse {
        format: &'static str,
        message: String,
    },

    #[error("manifest has no string value for `{0}`")]
    MissingKey(String),

    #[error("failed to serialize manifest: {0}")]
    Encode(String),
}

/// On-disk format of the manifest file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManifestFormat {
    /// Pick by file extension: `.json` is JSON, anything else a property list
    #[default]
    Auto,
    Plist,
    Json,
}

impl ManifestFormat {
    /// Resolve `Auto` against the manifest path.
    pub fn resolve(self, path: &str) -> Self {
        match self {
            ManifestFormat::Auto => {
                if path.to_ascii_lowercase().ends_with(".json") {
                    ManifestFormat::Json
                } else {
                    ManifestFormat::Plist
                }
            }
            other => other,
        }
    }

    fn name(self) -> &'static str {
        match self {
            ManifestFormat::Auto => "auto",
            ManifestFormat::Plist => "property list",
            ManifestFormat::Json => "JSON",
        }
    }
}

#[derive(Debug, Clone)]
enum Document {
    Plist(plist::Dictionary),
    Json(serde_json::Map<String, serde_json::Value>),
}

/// A decoded manifest fetched from a branch. Immutable: applying a release
/// produces new bytes and leaves the snapshot as it was.
#[derive(Debug, Clone)]
pub struct ManifestSnapshot {
    document: Document,
    version_key: String,
    build_key: String,
    current_version: String,
    current_build_number: String,
}

impl ManifestSnapshot {
    pub fn decode(bytes: &[u8], config: &ManifestConfig) -> Result<Self, ManifestError> {
        let format = config.format.resolve(&config.path);
        let document = match format {
            ManifestFormat::Json => {
                let value: serde_json::Value =
                    serde_json::from_slice(bytes).map_err(|e| ManifestError::Parse {
                        format: format.name(),
                        message: e.to_string(),
                    })?;
                match value {
                    serde_json::Value::Object(map) => Document::Json(map),
                    _ => {
                        return Err(ManifestError::Parse {
                            format: format.name(),
                            message: "top level is not an object".to_string(),
                        })
                    }
                }
            }
            _ => {
                let value = plist::Value::from_reader(Cursor::new(bytes)).map_err(|e| {
                    ManifestError::Parse {
                        format: format.name(),
                        message: e.to_string(),
                    }
                })?;
                let dict = value.into_dictionary().ok_or_else(|| ManifestError::Parse {
                    format: format.name(),
                    message: "top level is not a dictionary".to_string(),
                })?;
                Document::Plist(dict)
            }
        };

        let current_version = lookup(&document, &config.version_key)?;
        let current_build_number = lookup(&document, &config.build_key)?;

        Ok(Self {
            document,
            version_key: config.version_key.clone(),
            build_key: config.build_key.clone(),
            current_version,
            current_build_number,
        })
    }

    pub fn current_version(&self) -> &str {
        &self.current_version
    }

    pub fn current_build_number(&self) -> &str {
        &self.current_build_number
    }

    /// Serialized manifest with the version and build number replaced.
    pub fn with_release(&self, version: &str, build_number: &str) -> Result<Vec<u8>, ManifestError> {
        match &self.document {
            Document::Plist(dict) => {
                let mut dict = dict.clone();
                dict.insert(self.version_key.clone(), plist::Value::String(version.to_string()));
                dict.insert(
                    self.build_key.clone(),
                    plist::Value::String(build_number.to_string()),
                );
                let mut buf = Vec::new();
                plist::Value::Dictionary(dict)
                    .to_writer_xml(&mut buf)
                    .map_err(|e| ManifestError::Encode(e.to_string()))?;
                buf.push(b'\n');
                Ok(buf)
            }
            Document::Json(map) => {
                let mut map = map.clone();
                map.insert(
                    self.version_key.clone(),
                    serde_json::Value::String(version.to_string()),
                );
                map.insert(
                    self.build_key.clone(),
                    serde_json::Value::String(build_number.to_string()),
                );
                let mut buf = serde_json::to_vec_pretty(&map)
                    .map_err(|e| ManifestError::Encode(e.to_string()))?;
                buf.push(b'\n');
                Ok(buf)
            }
        }
    }
}

fn lookup(document: &Document, key: &str) -> Result<String, ManifestError> {
    let value = match document {
        Document::Plist(dict) => dict.get(key).and_then(|v| v.as_string()),
        Document::Json(map) => map.get(key).and_then(|v| v.as_str()),
    };
    value
        .map(str::to_string)
        .ok_or_else(|| ManifestError::MissingKey(key.to_string()))
}
