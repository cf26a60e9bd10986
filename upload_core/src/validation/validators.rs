//! Built-in validator factories

use crate::files::{file_extension, resolve_type, FileHandle};
use crate::size::total_size;
use super::patterns::AcceptPattern;
use super::{keys, validator_fn, ErrorDetail, ValidationError, ValidationErrors, ValidatorFn};

/// Bounds for [`size_range`]. A missing `max_size` means no upper bound.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SizeRange {
    pub min_size: u64,
    pub max_size: Option<u64>,
}

fn check_file_size(actual: u64, max_size: Option<u64>, min_size: u64) -> Option<ErrorDetail> {
    let too_large = max_size.map_or(false, |max| actual > max);
    if too_large || actual < min_size {
        Some(ErrorDetail::Size {
            max_size,
            min_size,
            actual,
        })
    } else {
        None
    }
}

fn per_file_sizes(files: &[FileHandle], max_size: Option<u64>, min_size: u64) -> Vec<ValidationError> {
    files
        .iter()
        .filter_map(|file| {
            check_file_size(file.size(), max_size, min_size)
                .map(|detail| ValidationError::for_file(file, detail))
        })
        .collect()
}

fn non_empty(key: &str, errors: Vec<ValidationError>) -> Option<ValidationErrors> {
    if errors.is_empty() {
        None
    } else {
        Some(ValidationErrors::per_file(key, errors))
    }
}

/// Flags every file larger than `max_size` bytes. `None` means no upper bound.
pub fn file_size(max_size: impl Into<Option<u64>>) -> ValidatorFn {
    let max_size = max_size.into();
    validator_fn(move |files: &[FileHandle]| {
        non_empty(keys::FILE_SIZE, per_file_sizes(files, max_size, 0))
    })
}

/// Flags every file outside `[min_size, max_size]`.
pub fn size_range(range: SizeRange) -> ValidatorFn {
    validator_fn(move |files: &[FileHandle]| {
        non_empty(keys::SIZE_RANGE, per_file_sizes(files, range.max_size, range.min_size))
    })
}

/// Compares the summed size of all files against `max_size`. The sum
/// saturates, so a set too large to count is always over a finite limit.
pub fn size_limit(max_size: impl Into<Option<u64>>) -> ValidatorFn {
    let max_size = max_size.into();
    validator_fn(move |files: &[FileHandle]| {
        if files.is_empty() {
            return None;
        }

        check_file_size(total_size(files), max_size, 0).map(|detail| {
            ValidationErrors::aggregate(keys::SIZE_LIMIT, ValidationError::aggregate(detail))
        })
    })
}

/// Allows at most `max` files. Every file past the limit gets an entry.
pub fn files_limit(max: usize) -> ValidatorFn {
    validator_fn(move |files: &[FileHandle]| {
        if files.len() <= max {
            return None;
        }

        let errors = files[max..]
            .iter()
            .map(|file| {
                ValidationError::for_file(
                    file,
                    ErrorDetail::Count {
                        max,
                        actual: files.len(),
                    },
                )
            })
            .collect();

        Some(ValidationErrors::per_file(keys::FILES_LIMIT, errors))
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CheckType {
    Allowed,
    NotAllowed,
}

struct TypeRule {
    tokens: Vec<String>,
    patterns: Vec<AcceptPattern>,
    check: CheckType,
}

impl TypeRule {
    fn new<I, S>(tokens: I, check: CheckType) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tokens: Vec<String> = tokens.into_iter().map(Into::into).collect();
        let patterns = tokens.iter().map(|token| AcceptPattern::parse(token)).collect();
        Self {
            tokens,
            patterns,
            check,
        }
    }

    fn check_file(&self, file: &FileHandle) -> Option<ValidationError> {
        let extension = file_extension(file.name());
        let file_type = resolve_type(file);

        let found = self
            .patterns
            .iter()
            .any(|pattern| pattern.matches(extension.as_deref(), file_type.as_deref()));

        let detail = match (self.check, found) {
            (CheckType::Allowed, false) => ErrorDetail::AllowedTypes {
                allowed_types: self.tokens.clone(),
                actual: file_type,
            },
            (CheckType::NotAllowed, true) => ErrorDetail::NotAllowedTypes {
                not_allowed_types: self.tokens.clone(),
                actual: file_type,
            },
            _ => return None,
        };

        Some(ValidationError::for_file(file, detail))
    }

    fn into_validator(self) -> ValidatorFn {
        validator_fn(move |files: &[FileHandle]| {
            let errors = files.iter().filter_map(|file| self.check_file(file)).collect();
            non_empty(keys::FILE_TYPES, errors)
        })
    }
}

/// Only lets through files matching at least one pattern.
///
/// Patterns are `.ext` file extensions or media type expressions such as
/// `audio/*`, `video/*`, `image/*` or a full media type like `application/pdf`.
///
/// ```
/// use upload_core::validation::{accept, Validator};
/// use upload_core::FileHandle;
///
/// let validator = accept([".png", "audio/*"]);
/// assert!(validator.validate(&[FileHandle::new("song.mp3", 10, None)]).is_none());
/// assert!(validator.validate(&[FileHandle::new("notes.txt", 10, None)]).is_some());
/// ```
pub fn accept<I, S>(allowed_types: I) -> ValidatorFn
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    TypeRule::new(allowed_types, CheckType::Allowed).into_validator()
}

/// Flags files matching any of the patterns. Same grammar as [`accept`].
pub fn reject<I, S>(rejected_types: I) -> ValidatorFn
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    TypeRule::new(rejected_types, CheckType::NotAllowed).into_validator()
}
