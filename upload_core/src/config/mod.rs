pub mod settings;

pub use settings::{ControlSettings, RuleSettings};
