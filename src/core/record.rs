/// Record loading: file → templated text → structured, name-bearing record.

use indexmap::IndexMap;
use rand::RngCore;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::stochastic::StochasticEvaluator;
use crate::core::template::TemplateError;
use crate::schema::value::Value;

/// File-level failures. Every variant carries the path, since no record
/// name is known yet.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("{path}: cannot read file: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}: template error: {source}")]
    Template {
        path: PathBuf,
        #[source]
        source: TemplateError,
    },
    #[error("{path}: {format} parse error: {message}")]
    Parse {
        path: PathBuf,
        format: ContentFormat,
        message: String,
    },
    #[error("{path}: {reason}")]
    MissingName { path: PathBuf, reason: String },
}

impl RecordError {
    pub fn path(&self) -> &Path {
        match self {
            Self::Io { path, .. }
            | Self::Template { path, .. }
            | Self::Parse { path, .. }
            | Self::MissingName { path, .. } => path,
        }
    }
}

/// Structured format of a content file, chosen by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentFormat {
    Json,
    Ron,
}

impl ContentFormat {
    /// `.json` files are JSON; everything else is RON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|s| s.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Ron,
        }
    }

    pub fn parse(self, text: &str) -> Result<Value, String> {
        match self {
            Self::Json => serde_json::from_str(text).map_err(|e| e.to_string()),
            Self::Ron => ron::from_str(text).map_err(|e| e.to_string()),
        }
    }
}

impl std::fmt::Display for ContentFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json => f.write_str("JSON"),
            Self::Ron => f.write_str("RON"),
        }
    }
}

/// A validated record: a top-level mapping with a non-empty text `name`.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    name: String,
    fields: IndexMap<String, Value>,
}

impl Record {
    /// Validate a parsed value as a record.
    pub fn from_value(value: Value) -> Result<Record, String> {
        let Value::Map(fields) = value else {
            return Err(format!("top-level value is a {}, expected a mapping", value.kind()));
        };
        let name = match fields.get("name") {
            Some(Value::String(name)) if !name.trim().is_empty() => name.clone(),
            Some(Value::String(_)) => return Err("\"name\" field is empty".to_string()),
            Some(other) => {
                return Err(format!("\"name\" field is {}, expected text", other.kind()))
            }
            None => return Err("missing \"name\" field".to_string()),
        };
        Ok(Record { name, fields })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn fields(&self) -> &IndexMap<String, Value> {
        &self.fields
    }

    pub fn into_fields(self) -> IndexMap<String, Value> {
        self.fields
    }
}

/// Reads content files through the template evaluator.
#[derive(Debug, Clone, Default)]
pub struct RecordLoader {
    evaluator: StochasticEvaluator,
}

impl RecordLoader {
    pub fn new(evaluator: StochasticEvaluator) -> Self {
        Self { evaluator }
    }

    pub fn evaluator(&self) -> &StochasticEvaluator {
        &self.evaluator
    }

    /// Load one file: read, render macros, parse, validate `name`.
    pub fn load(&self, path: &Path, rng: &mut dyn RngCore) -> Result<Record, RecordError> {
        let contents = std::fs::read_to_string(path).map_err(|source| RecordError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.load_str(&contents, ContentFormat::from_path(path), path, rng)
    }

    /// Same as [`RecordLoader::load`] for text already in memory; `origin` is
    /// only used for diagnostics.
    pub fn load_str(
        &self,
        contents: &str,
        format: ContentFormat,
        origin: &Path,
        rng: &mut dyn RngCore,
    ) -> Result<Record, RecordError> {
        let rendered = self
            .evaluator
            .process(contents, rng)
            .map_err(|source| RecordError::Template {
                path: origin.to_path_buf(),
                source,
            })?;
        let value = format.parse(&rendered).map_err(|message| RecordError::Parse {
            path: origin.to_path_buf(),
            format,
            message,
        })?;
        Record::from_value(value).map_err(|reason| RecordError::MissingName {
            path: origin.to_path_buf(),
            reason,
        })
    }
}
