use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::control::{ControlConfig, FileUploadControl};
use crate::size::parse_size;
use crate::validation::{self, parse_accept, SizeRange, ValidatorFn};

const DEFAULT_FILE: &str = "upload";
const ENV_PREFIX: &str = "UPLOAD";

/// Settings for one upload control, as read from `upload.toml` and
/// `UPLOAD_*` environment variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlSettings {
    pub multiple: bool,
    pub disabled: bool,
    /// Advertised accept attribute, comma separated.
    pub accept: Option<String>,
    pub discard_invalid: bool,
    pub list_visible: bool,
    pub rules: RuleSettings,
}

/// Declarative validators. Sizes take plain bytes or a unit (`"10 MB"`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleSettings {
    pub file_size: Option<String>,
    pub min_size: Option<String>,
    pub max_size: Option<String>,
    pub size_limit: Option<String>,
    pub files_limit: Option<usize>,
    pub accept: Option<String>,
    pub reject: Option<String>,
}

impl Default for ControlSettings {
    fn default() -> Self {
        let control = ControlConfig::default();
        Self {
            multiple: control.multiple,
            disabled: control.disabled,
            accept: None,
            discard_invalid: control.discard_invalid,
            list_visible: control.list_visible,
            rules: RuleSettings::default(),
        }
    }
}

impl ControlSettings {
    /// Defaults, then `upload.toml` when present, then the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = Config::builder().add_source(Config::try_from(&ControlSettings::default())?);

        if Path::new("upload.toml").exists() {
            builder = builder.add_source(File::with_name(DEFAULT_FILE));
        }

        Self::finish(builder.add_source(environment()))
    }

    /// Defaults, then the given file (which must exist), then the environment.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(Config::try_from(&ControlSettings::default())?)
            .add_source(File::from(path.as_ref()).required(true))
            .add_source(environment());

        Self::finish(builder)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(Config::try_from(&ControlSettings::default())?)
            .add_source(File::from_str(contents, FileFormat::Toml));

        Self::finish(builder)
    }

    fn finish(builder: config::ConfigBuilder<config::builder::DefaultState>) -> Result<Self, ConfigError> {
        let settings: ControlSettings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let rules = &self.rules;

        let sizes = [
            ("file_size", &rules.file_size),
            ("min_size", &rules.min_size),
            ("max_size", &rules.max_size),
            ("size_limit", &rules.size_limit),
        ];
        for (name, value) in sizes {
            if let Some(value) = value {
                parse_size(value).map_err(|e| {
                    ConfigError::Message(format!("Rule {} is not a size: {}", name, e))
                })?;
            }
        }

        if let (Some(min), Some(max)) = (&rules.min_size, &rules.max_size) {
            if parse_size(min).ok() > parse_size(max).ok() {
                return Err(ConfigError::Message(
                    "Rule min_size cannot be larger than max_size".to_string(),
                ));
            }
        }

        if let Some(accept) = &rules.accept {
            if parse_accept(accept).is_empty() {
                return Err(ConfigError::Message("Rule accept has no patterns".to_string()));
            }
        }

        if let Some(reject) = &rules.reject {
            if parse_accept(reject).is_empty() {
                return Err(ConfigError::Message("Rule reject has no patterns".to_string()));
            }
        }

        if self.discard_invalid && rules.is_empty() {
            tracing::warn!("discard_invalid is set but no rules are configured; nothing will be discarded");
        }

        Ok(())
    }

    pub fn control_config(&self) -> ControlConfig {
        ControlConfig {
            multiple: self.multiple,
            disabled: self.disabled,
            accept: self.accept.as_deref().map(parse_accept),
            discard_invalid: self.discard_invalid,
            list_visible: self.list_visible,
        }
    }

    pub fn build_control(&self) -> crate::Result<FileUploadControl> {
        let validators = self.rules.validators()?;
        Ok(FileUploadControl::new(self.control_config(), validators))
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

impl RuleSettings {
    pub fn is_empty(&self) -> bool {
        *self == RuleSettings::default()
    }

    /// Builds validators in a fixed order: per-file size, total size, file
    /// count, accepted types, rejected types.
    ///
    /// `min_size`/`max_size` produce a `sizeRange` rule, with `max_size`
    /// taking precedence over `file_size` as the upper bound. A lone
    /// `file_size` produces a `fileSize` rule.
    pub fn validators(&self) -> crate::Result<Vec<ValidatorFn>> {
        let mut validators = Vec::new();

        let file_size = self.file_size.as_deref().map(parse_size).transpose()?;
        let max_size = self.max_size.as_deref().map(parse_size).transpose()?;
        let min_size = self.min_size.as_deref().map(parse_size).transpose()?;

        if min_size.is_some() || max_size.is_some() {
            validators.push(validation::size_range(SizeRange {
                min_size: min_size.unwrap_or(0),
                max_size: max_size.or(file_size),
            }));
        } else if let Some(max) = file_size {
            validators.push(validation::file_size(max));
        }

        if let Some(limit) = self.size_limit.as_deref().map(parse_size).transpose()? {
            validators.push(validation::size_limit(limit));
        }

        if let Some(limit) = self.files_limit {
            validators.push(validation::files_limit(limit));
        }

        if let Some(accept) = &self.accept {
            validators.push(validation::accept(parse_accept(accept)));
        }

        if let Some(reject) = &self.reject {
            validators.push(validation::reject(parse_accept(reject)));
        }

        Ok(validators)
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}
