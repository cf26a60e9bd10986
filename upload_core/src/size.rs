//! Human readable byte sizes

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{Result, UploadError};
use crate::files::FileHandle;

const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

lazy_static! {
    static ref SIZE_REGEX: Regex = Regex::new(r"(?i)^(\d+) *(B|KB|MB|GB)?$").unwrap();
}

/// Parses `"830000"`, `"123MB"` or `"12 kb"` into bytes. Units are powers of 1024.
pub fn parse_size(input: &str) -> Result<u64> {
    let input = input.trim();
    let captures = SIZE_REGEX
        .captures(input)
        .ok_or_else(|| UploadError::InvalidSize(input.to_string()))?;

    let value: u64 = captures[1]
        .parse()
        .map_err(|_| UploadError::InvalidSize(input.to_string()))?;

    let exponent = captures
        .get(2)
        .and_then(|unit| {
            let unit = unit.as_str().to_uppercase();
            UNITS.iter().position(|candidate| *candidate == unit)
        })
        .unwrap_or(0);

    value
        .checked_mul(1024u64.pow(exponent as u32))
        .ok_or_else(|| UploadError::InvalidSize(input.to_string()))
}

/// Summed size of `files`, saturating at `u64::MAX`.
pub fn total_size(files: &[FileHandle]) -> u64 {
    files
        .iter()
        .fold(0u64, |total, file| total.saturating_add(file.size()))
}

/// Formats a byte count with the largest unit that keeps the value below 1024.
pub fn format_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    let mut unit = 0;

    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    let rounded = (size * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[unit])
}
