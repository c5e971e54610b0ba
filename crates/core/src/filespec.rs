// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File specifications: a file named either by a filesystem path or by an
//! inline (filename, contents) pair.
//!
//! The JSON object form is discriminated by its key set: `{"path": ...}`
//! for on-disk files, `{"filename": ..., "contents": ...}` for inline
//! content. Any other shape is invalid.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::{json, Value};
use thiserror::Error;

/// Errors from file-specification I/O.
#[derive(Debug, Error)]
pub enum FileSpecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("file specification is invalid")]
    Invalid,

    #[error("file specification has no filename")]
    NoFilename,
}

/// A file given either as a path on disk or as inline content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSpecification {
    /// The file lives on disk at this path.
    Path(PathBuf),
    /// The file exists only as a name plus UTF-8 contents.
    Contents { filename: String, contents: String },
    /// Anything that did not match either shape.
    Invalid,
}

impl FileSpecification {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        FileSpecification::Path(path.into())
    }

    pub fn from_contents(filename: impl Into<String>, contents: impl Into<String>) -> Self {
        FileSpecification::Contents {
            filename: filename.into(),
            contents: contents.into(),
        }
    }

    /// Build from the JSON object form. The key set is the discriminant.
    pub fn from_json(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return FileSpecification::Invalid;
        };

        if obj.len() == 1 {
            if let Some(path) = obj.get("path").and_then(Value::as_str) {
                return FileSpecification::Path(PathBuf::from(path));
            }
        }
        if obj.len() == 2 {
            if let (Some(filename), Some(contents)) = (
                obj.get("filename").and_then(Value::as_str),
                obj.get("contents").and_then(Value::as_str),
            ) {
                return FileSpecification::Contents {
                    filename: filename.to_string(),
                    contents: contents.to_string(),
                };
            }
        }
        FileSpecification::Invalid
    }

    /// The JSON object form. Invalid specifications serialize to `null`.
    pub fn to_json(&self) -> Value {
        match self {
            FileSpecification::Path(path) => json!({ "path": path.to_string_lossy() }),
            FileSpecification::Contents { filename, contents } => {
                json!({ "filename": filename, "contents": contents })
            }
            FileSpecification::Invalid => Value::Null,
        }
    }

    pub fn is_valid(&self) -> bool {
        !matches!(self, FileSpecification::Invalid)
    }

    /// Leaf name of the file, whichever form it is in.
    pub fn filename(&self) -> Option<String> {
        match self {
            FileSpecification::Path(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned()),
            FileSpecification::Contents { filename, .. } => Some(filename.clone()),
            FileSpecification::Invalid => None,
        }
    }

    /// Leaf name with the final extension removed.
    pub fn file_base_name(&self) -> Option<String> {
        self.filename().map(|name| match name.rfind('.') {
            Some(dot) if dot > 0 => name[..dot].to_string(),
            _ => name,
        })
    }

    /// Final extension, without the dot.
    pub fn file_extension(&self) -> Option<String> {
        self.filename().and_then(|name| match name.rfind('.') {
            Some(dot) if dot > 0 && dot + 1 < name.len() => Some(name[dot + 1..].to_string()),
            _ => None,
        })
    }

    /// File contents; reads from disk for the path form.
    pub fn contents(&self) -> Result<String, FileSpecError> {
        match self {
            FileSpecification::Path(path) => Ok(fs::read_to_string(path)?),
            FileSpecification::Contents { contents, .. } => Ok(contents.clone()),
            FileSpecification::Invalid => Err(FileSpecError::Invalid),
        }
    }

    /// The on-disk path, if any. Content-form specifications have none.
    pub fn filepath(&self) -> Option<&Path> {
        match self {
            FileSpecification::Path(path) => Some(path.as_path()),
            _ => None,
        }
    }

    /// Whether the named file currently exists on disk. Always false for
    /// the content form.
    pub fn file_exists(&self) -> bool {
        match self {
            FileSpecification::Path(path) => path.exists(),
            _ => false,
        }
    }

    /// Materialize the file inside `dir`, optionally under a different
    /// leaf name. Path-form files are copied; content-form files are
    /// written out. Returns the path written.
    pub fn write_file(
        &self,
        dir: &Path,
        override_name: Option<&str>,
    ) -> Result<PathBuf, FileSpecError> {
        let name = match override_name {
            Some(name) => name.to_string(),
            None => self.filename().ok_or(FileSpecError::NoFilename)?,
        };
        let target = dir.join(name);

        match self {
            FileSpecification::Path(source) => {
                fs::copy(source, &target)?;
            }
            FileSpecification::Contents { contents, .. } => {
                let mut file = fs::File::create(&target)?;
                file.write_all(contents.as_bytes())?;
            }
            FileSpecification::Invalid => return Err(FileSpecError::Invalid),
        }
        Ok(target)
    }
}

impl Default for FileSpecification {
    fn default() -> Self {
        FileSpecification::Invalid
    }
}

// Serialize/deserialize through the JSON object form so JobData's wire
// hash embeds the discriminated shape directly.
impl serde::Serialize for FileSpecification {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> serde::Deserialize<'de> for FileSpecification {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(FileSpecification::from_json(&value))
    }
}

#[cfg(test)]
#[path = "filespec_tests.rs"]
mod tests;
