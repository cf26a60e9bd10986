//! The upload control: file selection state, validity and change channels

pub mod channel;

pub use channel::{Channel, Subscription};

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, UploadError};
use crate::files::FileHandle;
use crate::validation::{FieldValue, ValidationError, ValidationErrors, ValidatorFn, Violations};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Valid,
    Invalid,
    Disabled,
}

/// UI intents forwarded to whatever view renders the control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileEvent {
    Click,
    Focus,
    Blur,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    pub multiple: bool,
    pub disabled: bool,
    pub accept: Option<Vec<String>>,
    pub discard_invalid: bool,
    pub list_visible: bool,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            multiple: true,
            disabled: false,
            accept: None,
            discard_invalid: false,
            list_visible: true,
        }
    }
}

pub struct FileUploadControl {
    files: Vec<FileHandle>,
    /// Membership index over `files`; the `Vec` keeps insertion order.
    index: HashSet<FileHandle>,
    list_visible: bool,
    status: Status,
    errors: Vec<ValidationErrors>,
    validators: Vec<ValidatorFn>,
    multiple_enabled: bool,
    accept: Option<String>,
    discard: bool,

    value_changes: Channel<Vec<FileHandle>>,
    status_changes: Channel<Status>,
    accept_changes: Channel<Option<String>>,
    multiple_changes: Channel<bool>,
    list_visibility_changes: Channel<bool>,
    discarded_value_changes: Channel<Vec<ValidationError>>,
    events_changes: Channel<FileEvent>,
}

impl Default for FileUploadControl {
    fn default() -> Self {
        Self::new(ControlConfig::default(), Vec::new())
    }
}

impl FileUploadControl {
    pub fn new(config: ControlConfig, validators: Vec<ValidatorFn>) -> Self {
        let accept = config
            .accept
            .as_ref()
            .filter(|patterns| !patterns.is_empty())
            .map(|patterns| patterns.join(","));

        let status = if config.disabled {
            Status::Disabled
        } else {
            Status::Valid
        };

        Self {
            files: Vec::new(),
            index: HashSet::new(),
            list_visible: config.list_visible,
            status,
            errors: Vec::new(),
            validators,
            multiple_enabled: config.multiple,
            accept: accept.clone(),
            discard: config.discard_invalid,
            value_changes: Channel::replay(Vec::new()),
            status_changes: Channel::replay(status),
            accept_changes: Channel::replay(accept),
            multiple_changes: Channel::replay(config.multiple),
            list_visibility_changes: Channel::replay(config.list_visible),
            discarded_value_changes: Channel::forward_only(),
            events_changes: Channel::forward_only(),
        }
    }

    pub fn with_validators(validators: Vec<ValidatorFn>) -> Self {
        Self::new(ControlConfig::default(), validators)
    }

    /// Replaces the validator list and validates the current value against it.
    pub fn set_validators(&mut self, validators: Vec<ValidatorFn>) -> &mut Self {
        self.validators = validators;
        self.validate();
        self
    }

    pub fn add_file(&mut self, file: FileHandle) -> &mut Self {
        self.add_batch(vec![file])
    }

    /// Adds every file in one step. In single mode only the first one is kept.
    pub fn add_files<I>(&mut self, files: I) -> &mut Self
    where
        I: IntoIterator<Item = FileHandle>,
    {
        self.add_batch(files.into_iter().collect())
    }

    pub fn remove_file(&mut self, file: &FileHandle) -> &mut Self {
        if self.disabled() {
            debug!("Ignoring removal of {} on a disabled control", file.name());
            return self;
        }

        if self.index.remove(file) {
            self.files.retain(|existing| existing != file);
        }
        self.validate();
        self.emit_value();
        self
    }

    pub fn set_value<I>(&mut self, files: I) -> &mut Self
    where
        I: IntoIterator<Item = FileHandle>,
    {
        self.clear_files();
        self.add_batch(files.into_iter().collect())
    }

    /// Like [`set_value`](Self::set_value) for values coming from untyped form
    /// plumbing. Anything but a file list is rejected and the control is left
    /// untouched.
    pub fn try_set_value(&mut self, value: FieldValue) -> Result<&mut Self> {
        match value {
            FieldValue::Files(files) => Ok(self.set_value(files)),
            FieldValue::Empty => Err(UploadError::wrong_value_type(&serde_json::Value::Null)),
            FieldValue::Other(other) => Err(UploadError::wrong_value_type(&other)),
        }
    }

    pub fn clear(&mut self) -> &mut Self {
        self.clear_files();
        self.validate();
        self.emit_value();
        self
    }

    pub fn set_list_visibility(&mut self, is_visible: bool) -> &mut Self {
        self.list_visible = is_visible;
        self.list_visibility_changes.emit(is_visible);
        self
    }

    pub fn enable(&mut self, is_enabled: bool) -> &mut Self {
        self.set_disabled(!is_enabled);
        self
    }

    pub fn disable(&mut self, is_disabled: bool) -> &mut Self {
        self.set_disabled(is_disabled);
        self
    }

    pub fn click(&mut self) -> &mut Self {
        self.events_changes.emit(FileEvent::Click);
        self
    }

    pub fn focus(&mut self) -> &mut Self {
        self.events_changes.emit(FileEvent::Focus);
        self
    }

    pub fn blur(&mut self) -> &mut Self {
        self.events_changes.emit(FileEvent::Blur);
        self
    }

    /// Advertises the accepted types, e.g. `"audio/*,video/*,image/*"`.
    ///
    /// This only updates the attribute views render; filtering needs an
    /// [`accept`](crate::validation::accept) validator.
    pub fn accept_files(&mut self, accept: impl Into<String>) -> &mut Self {
        self.accept = Some(accept.into());
        self.accept_changes.emit(self.accept.clone());
        self
    }

    pub fn accept_all(&mut self) -> &mut Self {
        self.accept = None;
        self.accept_changes.emit(None);
        self
    }

    /// Switching to single mode does not trim files already present; the
    /// limit applies from the next add.
    pub fn multiple(&mut self, is_enabled: bool) -> &mut Self {
        self.multiple_enabled = is_enabled;
        self.multiple_changes.emit(is_enabled);
        self
    }

    /// Takes effect on the next add; files already present are not re-checked.
    pub fn discard_invalid(&mut self, discard: bool) -> &mut Self {
        self.discard = discard;
        self
    }

    pub fn value(&self) -> Vec<FileHandle> {
        self.files.clone()
    }

    pub fn files(&self) -> &[FileHandle] {
        &self.files
    }

    pub fn size(&self) -> usize {
        self.files.len()
    }

    pub fn contains(&self, file: &FileHandle) -> bool {
        self.index.contains(file)
    }

    pub fn valid(&self) -> bool {
        self.errors.is_empty() && self.status != Status::Disabled
    }

    pub fn invalid(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn disabled(&self) -> bool {
        self.status == Status::Disabled
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn get_error(&self) -> &[ValidationErrors] {
        &self.errors
    }

    pub fn has_error(&self, key: &str) -> bool {
        self.errors.iter().any(|error| error.has_key(key))
    }

    pub fn is_multiple(&self) -> bool {
        self.multiple_enabled
    }

    pub fn is_list_visible(&self) -> bool {
        self.list_visible
    }

    pub fn is_discarding(&self) -> bool {
        self.discard
    }

    pub fn accept(&self) -> Option<&str> {
        self.accept.as_deref()
    }

    /// Current file list after every change. Replays the current value.
    pub fn value_changes(&self) -> &Channel<Vec<FileHandle>> {
        &self.value_changes
    }

    /// `VALID`, `INVALID` or `DISABLED`. Replays the current status.
    pub fn status_changes(&self) -> &Channel<Status> {
        &self.status_changes
    }

    pub fn accept_changes(&self) -> &Channel<Option<String>> {
        &self.accept_changes
    }

    pub fn multiple_changes(&self) -> &Channel<bool> {
        &self.multiple_changes
    }

    pub fn list_visibility_changes(&self) -> &Channel<bool> {
        &self.list_visibility_changes
    }

    /// Batches of files dropped by discard mode, with the violation that
    /// removed each of them. No replay.
    pub fn discarded_value_changes(&self) -> &Channel<Vec<ValidationError>> {
        &self.discarded_value_changes
    }

    /// Click, focus and blur requests. No replay.
    pub fn events_changes(&self) -> &Channel<FileEvent> {
        &self.events_changes
    }

    fn add_batch(&mut self, files: Vec<FileHandle>) -> &mut Self {
        if self.multiple_enabled {
            for file in files {
                self.insert(file);
            }
        } else if let Some(first) = files.into_iter().next() {
            self.clear_files();
            self.insert(first);
        }

        if self.discard && !self.disabled() {
            self.discard_invalid_files();
        } else {
            self.validate();
        }

        self.emit_value();
        self
    }

    fn insert(&mut self, file: FileHandle) {
        if self.index.insert(file.clone()) {
            self.files.push(file);
        }
    }

    fn clear_files(&mut self) {
        self.files.clear();
        self.index.clear();
    }

    fn run_validators(&self) -> Vec<ValidationErrors> {
        self.validators
            .iter()
            .filter_map(|validator| validator.validate(&self.files))
            .collect()
    }

    fn validate(&mut self) {
        if self.disabled() {
            self.errors.clear();
            return;
        }

        let was_valid = self.valid();
        self.errors = self.run_validators();
        self.refresh_status(was_valid);
    }

    /// Validates while removing every file a validator can pin a violation
    /// on. Violations without a file stay as errors.
    fn discard_invalid_files(&mut self) {
        let was_valid = self.valid();
        let validators = self.validators.clone();
        let mut errors = Vec::new();
        let mut discarded = Vec::new();

        for validator in &validators {
            let result = match validator.validate(&self.files) {
                Some(result) => result,
                None => continue,
            };

            let mut remaining = Vec::new();
            let before = discarded.len();
            for violation in result.violations.iter() {
                match &violation.file {
                    Some(file) if self.index.remove(file) => discarded.push(violation.clone()),
                    _ => remaining.push(violation.clone()),
                }
            }

            if discarded.len() != before {
                let index = &self.index;
                self.files.retain(|existing| index.contains(existing));
            }

            if remaining.is_empty() {
                continue;
            }

            let violations = match result.violations {
                Violations::Aggregate(_) if remaining.len() == 1 => Violations::Aggregate(remaining.remove(0)),
                _ => Violations::PerFile(remaining),
            };
            errors.push(ValidationErrors {
                key: result.key,
                violations,
            });
        }

        self.errors = errors;
        self.refresh_status(was_valid);

        if !discarded.is_empty() {
            debug!("Discarded {} invalid files", discarded.len());
            self.discarded_value_changes.emit(discarded);
        }
    }

    fn refresh_status(&mut self, was_valid: bool) {
        self.status = if self.errors.is_empty() {
            Status::Valid
        } else {
            Status::Invalid
        };

        if was_valid != self.valid() {
            debug!("Control status changed to {:?}", self.status);
            self.status_changes.emit(self.status);
        }
    }

    fn set_disabled(&mut self, disabled: bool) {
        if disabled {
            self.status = Status::Disabled;
            self.errors.clear();
        } else {
            self.errors = self.run_validators();
            self.status = if self.errors.is_empty() {
                Status::Valid
            } else {
                Status::Invalid
            };
        }

        debug!("Control status set to {:?}", self.status);
        self.status_changes.emit(self.status);
    }

    fn emit_value(&self) {
        self.value_changes.emit(self.files.clone());
    }
}

impl fmt::Debug for FileUploadControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileUploadControl")
            .field("files", &self.files)
            .field("status", &self.status)
            .field("errors", &self.errors)
            .field("validators", &self.validators.len())
            .field("multiple", &self.multiple_enabled)
            .field("accept", &self.accept)
            .field("discard", &self.discard)
            .field("list_visible", &self.list_visible)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::{accept, file_size, files_limit, keys};
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn text_file(size: u64) -> FileHandle {
        FileHandle::new("filename.txt", size, Some("text/plain"))
    }

    fn record<T: Clone + Send + 'static>(channel: &Channel<T>) -> Arc<Mutex<Vec<T>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        channel.subscribe(move |value: &T| sink.lock().push(value.clone()));
        seen
    }

    #[test]
    fn test_initial_state() {
        let control = FileUploadControl::default();

        assert!(control.valid());
        assert!(!control.invalid());
        assert!(!control.disabled());
        assert!(control.is_multiple());
        assert!(control.is_list_visible());
        assert_eq!(control.size(), 0);
        assert_eq!(control.accept(), None);
        assert_eq!(control.status(), Status::Valid);
    }

    #[test]
    fn test_configuration_is_applied() {
        let config = ControlConfig {
            multiple: false,
            disabled: true,
            accept: Some(vec!["image/*".to_string(), ".pdf".to_string()]),
            discard_invalid: true,
            list_visible: false,
        };
        let control = FileUploadControl::new(config, Vec::new());

        assert!(!control.is_multiple());
        assert!(control.disabled());
        assert!(!control.valid());
        assert!(control.is_discarding());
        assert!(!control.is_list_visible());
        assert_eq!(control.accept(), Some("image/*,.pdf"));
        assert_eq!(control.accept_changes().current(), Some(Some("image/*,.pdf".to_string())));
    }

    #[test]
    fn test_add_new_files() {
        let mut control = FileUploadControl::default();
        control.add_file(text_file(10)).add_file(text_file(10)).add_file(text_file(10));

        assert!(control.valid());
        assert!(control.get_error().is_empty());
        assert_eq!(control.size(), 3);
        assert_eq!(control.value().len(), 3);
    }

    #[test]
    fn test_same_handle_is_added_once() {
        let mut control = FileUploadControl::default();
        let file = text_file(10);

        control.add_file(file.clone()).add_file(file.clone());
        control.add_files(vec![file.clone(), file]);

        assert_eq!(control.size(), 1);
    }

    #[test]
    fn test_validate_files() {
        let mut control = FileUploadControl::default();
        control.add_file(text_file(46));
        control.set_validators(vec![
            files_limit(1),
            file_size(100),
            accept([".png", "text/*", "audio/*", ".mp3"]),
        ]);
        assert!(control.valid());

        control.add_file(text_file(46));
        assert!(!control.valid());
        assert!(control.has_error(keys::FILES_LIMIT));
        assert_eq!(control.status(), Status::Invalid);
    }

    #[test]
    fn test_value_changes_once_per_batch() {
        let mut control = FileUploadControl::default();
        let seen = record(control.value_changes());

        control.set_value(vec![text_file(1), text_file(2), text_file(3)]);

        assert_eq!(seen.lock().len(), 2);
        assert_eq!(control.size(), 3);
    }

    #[test]
    fn test_status_changes_on_disable() {
        let mut control = FileUploadControl::default();
        let seen = record(control.status_changes());

        control.disable(true);

        assert!(control.disabled());
        assert_eq!(*seen.lock(), vec![Status::Valid, Status::Disabled]);
    }

    #[test]
    fn test_disable_clears_errors_and_enable_revalidates() {
        let mut control = FileUploadControl::with_validators(vec![file_size(10)]);
        control.add_file(text_file(50));
        assert!(control.invalid());

        control.disable(true);
        assert!(control.get_error().is_empty());
        assert!(!control.invalid());
        assert!(!control.valid());

        control.add_file(text_file(500));
        assert!(control.get_error().is_empty());

        let seen = record(control.status_changes());
        control.enable(true);
        assert!(control.invalid());
        assert_eq!(control.get_error().len(), 1);
        assert_eq!(*seen.lock(), vec![Status::Disabled, Status::Invalid]);

        control.disable(false);
        assert_eq!(control.status(), Status::Invalid);
    }

    #[test]
    fn test_remove_file() {
        let mut control = FileUploadControl::with_validators(vec![file_size(10)]);
        let big = text_file(50);
        control.add_files(vec![text_file(1), big.clone()]);
        assert!(control.invalid());

        control.remove_file(&big);
        assert_eq!(control.size(), 1);
        assert!(control.valid());
    }

    #[test]
    fn test_index_tracks_file_list() {
        let mut control = FileUploadControl::with_validators(vec![file_size(10)]);
        control.discard_invalid(true);

        let kept = text_file(1);
        let dropped = text_file(50);
        control.add_files(vec![kept.clone(), dropped.clone(), kept.clone()]);

        assert_eq!(control.value(), vec![kept.clone()]);
        assert!(control.contains(&kept));
        assert!(!control.contains(&dropped));

        control.add_file(dropped.clone());
        assert_eq!(control.size(), 1);

        control.remove_file(&kept);
        assert!(!control.contains(&kept));
        control.add_file(kept.clone());
        assert!(control.contains(&kept));

        control.clear();
        assert!(!control.contains(&kept));
        assert_eq!(control.size(), 0);
    }

    #[test]
    fn test_large_batches_keep_order_and_dedupe() {
        let mut control = FileUploadControl::default();
        let files: Vec<FileHandle> = (0..5000).map(text_file).collect();

        control.add_files(files.iter().cloned().chain(files.iter().cloned()));

        assert_eq!(control.size(), files.len());
        assert_eq!(control.value(), files);
    }

    #[test]
    fn test_remove_file_on_disabled_control_is_ignored() {
        let mut control = FileUploadControl::default();
        let file = text_file(1);
        control.add_file(file.clone()).disable(true);

        let seen = record(control.value_changes());
        control.remove_file(&file);

        assert_eq!(control.size(), 1);
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn test_clear_works_when_disabled() {
        let mut control = FileUploadControl::default();
        control.add_file(text_file(1)).disable(true).clear();

        assert_eq!(control.size(), 0);
    }

    #[test]
    fn test_single_mode() {
        let mut control = FileUploadControl::default();
        control.multiple(false);
        assert!(!control.is_multiple());

        let first = text_file(1);
        let second = text_file(1);

        control.set_value(vec![first.clone(), second.clone()]);
        assert_eq!(control.size(), 1);
        assert_eq!(control.value()[0], first);

        control.add_file(second.clone());
        assert_eq!(control.size(), 1);
        assert_eq!(control.value()[0], second);
    }

    #[test]
    fn test_single_mode_is_not_retroactive() {
        let mut control = FileUploadControl::default();
        control.add_files(vec![text_file(1), text_file(2)]);
        control.multiple(false);
        assert_eq!(control.size(), 2);

        let last = text_file(3);
        control.add_file(last.clone());
        assert_eq!(control.value(), vec![last]);
    }

    #[test]
    fn test_single_mode_empty_batch_keeps_file() {
        let mut control = FileUploadControl::new(
            ControlConfig { multiple: false, ..ControlConfig::default() },
            Vec::new(),
        );
        control.add_file(text_file(1));
        control.add_files(Vec::new());

        assert_eq!(control.size(), 1);
    }

    #[test]
    fn test_try_set_value_rejects_non_lists() {
        let mut control = FileUploadControl::default();
        control.add_file(text_file(1));

        let result = control.try_set_value(FieldValue::Other(serde_json::json!("file.txt")));
        assert!(matches!(result, Err(UploadError::InvalidArgument(_))));
        assert!(control.try_set_value(FieldValue::Empty).is_err());
        assert_eq!(control.size(), 1);

        control.try_set_value(FieldValue::Files(vec![text_file(2), text_file(3)])).unwrap();
        assert_eq!(control.size(), 2);
    }

    #[test]
    fn test_accept_channel() {
        let mut control = FileUploadControl::default();
        let seen = record(control.accept_changes());

        control.accept_files("image/*,.pdf").accept_all();

        assert_eq!(
            *seen.lock(),
            vec![None, Some("image/*,.pdf".to_string()), None]
        );
    }

    #[test]
    fn test_accept_string_does_not_filter() {
        let mut control = FileUploadControl::default();
        control.accept_files("image/*").add_file(text_file(1));

        assert!(control.valid());
        assert_eq!(control.size(), 1);
    }

    #[test]
    fn test_list_visibility_and_multiple_channels() {
        let mut control = FileUploadControl::default();
        let visibility = record(control.list_visibility_changes());
        let multiple = record(control.multiple_changes());

        control.set_list_visibility(false).multiple(false);

        assert_eq!(*visibility.lock(), vec![true, false]);
        assert_eq!(*multiple.lock(), vec![true, false]);
        assert!(!control.is_list_visible());
    }

    #[test]
    fn test_ui_events_are_forward_only() {
        let mut control = FileUploadControl::default();
        control.click();

        let seen = record(control.events_changes());
        control.focus().blur();

        assert_eq!(*seen.lock(), vec![FileEvent::Focus, FileEvent::Blur]);
    }

    #[test]
    fn test_discard_mode_toggle_is_not_retroactive() {
        let mut control = FileUploadControl::with_validators(vec![file_size(10)]);
        control.add_file(text_file(50));
        control.discard_invalid(true);

        assert_eq!(control.size(), 1);
        assert!(control.invalid());

        control.add_file(text_file(5));
        assert_eq!(control.size(), 1);
        assert!(control.valid());
    }

    #[test]
    fn test_set_validators_revalidates() {
        let mut control = FileUploadControl::default();
        control.add_file(text_file(50));
        let seen = record(control.status_changes());

        control.set_validators(vec![file_size(10)]);
        assert!(control.invalid());

        control.set_validators(Vec::new());
        assert!(control.valid());

        assert_eq!(*seen.lock(), vec![Status::Valid, Status::Invalid, Status::Valid]);
    }
}
