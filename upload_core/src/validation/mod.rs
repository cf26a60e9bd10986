//! Validator pipeline: stateless rules run by the control after every mutation

pub mod patterns;
pub mod validators;

pub use patterns::{parse_accept, AcceptPattern};
pub use validators::*;

use std::sync::Arc;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::{Result, UploadError};
use crate::files::FileHandle;

/// Error keys produced by the built-in validators.
pub mod keys {
    pub const FILE_SIZE: &str = "fileSize";
    pub const SIZE_RANGE: &str = "sizeRange";
    pub const SIZE_LIMIT: &str = "sizeLimit";
    pub const FILES_LIMIT: &str = "filesLimit";
    pub const FILE_TYPES: &str = "fileTypes";
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum ErrorDetail {
    Size {
        max_size: Option<u64>,
        min_size: u64,
        actual: u64,
    },
    Count {
        max: usize,
        actual: usize,
    },
    AllowedTypes {
        allowed_types: Vec<String>,
        actual: Option<String>,
    },
    NotAllowedTypes {
        not_allowed_types: Vec<String>,
        actual: Option<String>,
    },
}

/// One violation. `file` is set when the violation can be pinned on a
/// single file.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ValidationError {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<FileHandle>,
    #[serde(flatten)]
    pub detail: ErrorDetail,
}

impl ValidationError {
    pub fn for_file(file: &FileHandle, detail: ErrorDetail) -> Self {
        Self {
            file: Some(file.clone()),
            detail,
        }
    }

    pub fn aggregate(detail: ErrorDetail) -> Self {
        Self { file: None, detail }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum Violations {
    PerFile(Vec<ValidationError>),
    Aggregate(ValidationError),
}

impl Violations {
    pub fn iter(&self) -> std::slice::Iter<'_, ValidationError> {
        match self {
            Violations::PerFile(errors) => errors.iter(),
            Violations::Aggregate(error) => std::slice::from_ref(error).iter(),
        }
    }

    pub fn len(&self) -> usize {
        self.iter().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The result of one validator: a key naming the rule and its violations.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationErrors {
    pub key: String,
    pub violations: Violations,
}

impl ValidationErrors {
    pub fn per_file(key: impl Into<String>, errors: Vec<ValidationError>) -> Self {
        Self {
            key: key.into(),
            violations: Violations::PerFile(errors),
        }
    }

    pub fn aggregate(key: impl Into<String>, error: ValidationError) -> Self {
        Self {
            key: key.into(),
            violations: Violations::Aggregate(error),
        }
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.key == key
    }
}

impl Serialize for ValidationErrors {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.key, &self.violations)?;
        map.end()
    }
}

pub trait Validator: Send + Sync {
    fn validate(&self, files: &[FileHandle]) -> Option<ValidationErrors>;
}

impl<F> Validator for F
where
    F: Fn(&[FileHandle]) -> Option<ValidationErrors> + Send + Sync,
{
    fn validate(&self, files: &[FileHandle]) -> Option<ValidationErrors> {
        self(files)
    }
}

pub type ValidatorFn = Arc<dyn Validator>;

/// Wraps a closure as a shareable validator.
pub fn validator_fn<F>(f: F) -> ValidatorFn
where
    F: Fn(&[FileHandle]) -> Option<ValidationErrors> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// A form field value as seen by validators attached to arbitrary fields.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Empty,
    Files(Vec<FileHandle>),
    Other(serde_json::Value),
}

impl FieldValue {
    pub fn files(&self) -> Result<&[FileHandle]> {
        match self {
            FieldValue::Empty => Ok(&[]),
            FieldValue::Files(files) => Ok(files),
            FieldValue::Other(value) => Err(UploadError::wrong_value_type(value)),
        }
    }
}

impl From<Vec<FileHandle>> for FieldValue {
    fn from(files: Vec<FileHandle>) -> Self {
        FieldValue::Files(files)
    }
}

impl From<serde_json::Value> for FieldValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => FieldValue::Empty,
            other => FieldValue::Other(other),
        }
    }
}

/// Runs a validator against a dynamic field value. Anything other than a
/// file list (or nothing) is a caller error.
pub fn validate_field<V>(validator: &V, value: &FieldValue) -> Result<Option<ValidationErrors>>
where
    V: Validator + ?Sized,
{
    let files = value.files()?;
    Ok(validator.validate(files))
}
