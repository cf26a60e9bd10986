//! Accept-pattern grammar
//!
//! A pattern list is comma separated. Each token is either a file extension
//! starting with a dot (`.png`, compared case-insensitively with the file's
//! final suffix) or a media type pattern (`audio/*`, `image/png`) that is
//! evaluated as a regular expression against the resolved MIME type.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref FILE_EXT_REGEX: Regex = Regex::new(r"^\.\w*$").unwrap();
}

const WILDCARDS: [&str; 3] = ["*", "*/*", ".*"];

#[derive(Debug, Clone)]
pub enum AcceptPattern {
    Extension(String),
    Wildcard,
    MediaType(Regex),
    Literal(String),
}

impl AcceptPattern {
    pub fn parse(token: &str) -> Self {
        let token = token.trim();

        if WILDCARDS.contains(&token) {
            return AcceptPattern::Wildcard;
        }

        if FILE_EXT_REGEX.is_match(token) {
            return AcceptPattern::Extension(token[1..].to_lowercase());
        }

        match Regex::new(token) {
            Ok(regex) => AcceptPattern::MediaType(regex),
            Err(e) => {
                tracing::warn!("Accept pattern {:?} is not a valid expression, matching literally: {}", token, e);
                AcceptPattern::Literal(token.to_lowercase())
            }
        }
    }

    /// `extension` is the lowercased suffix, `file_type` the resolved MIME
    /// type. Unknown types only match wildcards.
    pub fn matches(&self, extension: Option<&str>, file_type: Option<&str>) -> bool {
        match self {
            AcceptPattern::Wildcard => true,
            AcceptPattern::Extension(ext) => extension == Some(ext.as_str()),
            AcceptPattern::MediaType(regex) => file_type.map_or(false, |t| regex.is_match(t)),
            AcceptPattern::Literal(literal) => file_type == Some(literal.as_str()),
        }
    }
}

/// Splits an accept attribute (`"audio/*,video/*,.png"`) into trimmed tokens.
pub fn parse_accept(accept: &str) -> Vec<String> {
    accept
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(String::from)
        .collect()
}
