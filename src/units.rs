//! Byte-size parsing and human-readable formatting.
//!
//! Shared infrastructure consumed by the retention policy engine and by
//! any external front end that needs to accept sizes like `"512M"` on a
//! command line.

use once_cell::sync::Lazy;
use regex::Regex;

static SIZE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([0-9]+)([kKmMgGtT]?)$").unwrap());

#[derive(Debug, thiserror::Error)]
pub enum ByteSizeError {
    #[error("'{0}' is not a valid byte size (expected digits with an optional k/m/g/t suffix)")]
    Malformed(String),
    #[error("'{0}' overflows a 64-bit byte count")]
    Overflow(String),
}

/// Parse strings matching `/^[0-9]+[kKmMgGtT]?$/` as multiples of 1024.
pub fn parse_byte_size(input: &str) -> Result<u64, ByteSizeError> {
    let captures = SIZE_PATTERN
        .captures(input)
        .ok_or_else(|| ByteSizeError::Malformed(input.to_string()))?;
    let digits = &captures[1];
    let suffix = &captures[2];
    let value: u64 = digits
        .parse()
        .map_err(|_| ByteSizeError::Overflow(input.to_string()))?;
    let multiplier: u64 = match suffix.to_ascii_lowercase().as_str() {
        "" => 1,
        "k" => 1024,
        "m" => 1024 * 1024,
        "g" => 1024 * 1024 * 1024,
        "t" => 1024u64 * 1024 * 1024 * 1024,
        _ => unreachable!("regex only matches k/m/g/t"),
    };
    value
        .checked_mul(multiplier)
        .ok_or_else(|| ByteSizeError::Overflow(input.to_string()))
}

/// Format bytes as a human-readable string with two decimal places.
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    const TB: u64 = GB * 1024;

    if bytes >= TB {
        format!("{:.2} TB", bytes as f64 / TB as f64)
    } else if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_bytes() {
        assert_eq!(parse_byte_size("512").unwrap(), 512);
    }

    #[test]
    fn parses_suffixes() {
        assert_eq!(parse_byte_size("1k").unwrap(), 1024);
        assert_eq!(parse_byte_size("1K").unwrap(), 1024);
        assert_eq!(parse_byte_size("2m").unwrap(), 2 * 1024 * 1024);
        assert_eq!(parse_byte_size("3G").unwrap(), 3 * 1024 * 1024 * 1024);
        assert_eq!(parse_byte_size("1T").unwrap(), 1024u64 * 1024 * 1024 * 1024);
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(parse_byte_size("abc").is_err());
        assert!(parse_byte_size("10x").is_err());
        assert!(parse_byte_size("").is_err());
        assert!(parse_byte_size("-5").is_err());
    }

    #[test]
    fn rejects_overflow() {
        assert!(parse_byte_size("99999999999999999999T").is_err());
    }

    #[test]
    fn formats_bytes() {
        assert_eq!(format_bytes(500), "500 B");
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(1048576), "1.00 MB");
        assert_eq!(format_bytes(1073741824), "1.00 GB");
    }
}
