//! Core library for file upload form controls: the selected file set, its
//! validators and the change channels views subscribe to.

pub mod config;
pub mod control;
pub mod error;
pub mod files;
pub mod size;
pub mod validation;

pub use config::{ControlSettings, RuleSettings};
pub use control::{Channel, ControlConfig, FileEvent, FileUploadControl, Status, Subscription};
pub use error::{Result, UploadError};
pub use files::{collect_files, FileHandle};
pub use size::{format_size, parse_size, total_size};
pub use validation::{
    FieldValue, SizeRange, ValidationError, ValidationErrors, Validator, ValidatorFn, Violations,
};
