//! Memory quota parsing.
//!
//! Manifests write memory either as a bare integer (already megabytes) or as
//! a string with an `M`/`MB`/`G`/`GB` suffix. A suffix with no numeric prefix
//! is a hard error; the deployment would otherwise silently get the default.

use serde_yaml::Value;

use crate::error::{Error, Result};

/// Parse a manifest memory value into megabytes.
pub fn parse_memory(value: &Value) -> Result<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| Error::InvalidMemorySpec(n.to_string())),
        Value::String(s) => parse_memory_str(s),
        other => Err(Error::InvalidMemorySpec(format!("{:?}", other))),
    }
}

/// Parse a memory string such as `512M`, `2G`, `256mb` or `1024` into
/// megabytes. Suffixes are case-insensitive; `G`/`GB` multiply by 1024.
pub fn parse_memory_str(spec: &str) -> Result<i64> {
    let trimmed = spec.trim();
    let lower = trimmed.to_ascii_lowercase();

    let (prefix, multiplier) = if let Some(p) = lower.strip_suffix("gb") {
        (p, 1024)
    } else if let Some(p) = lower.strip_suffix("g") {
        (p, 1024)
    } else if let Some(p) = lower.strip_suffix("mb") {
        (p, 1)
    } else if let Some(p) = lower.strip_suffix("m") {
        (p, 1)
    } else {
        (lower.as_str(), 1)
    };

    let prefix = prefix.trim();
    if prefix.is_empty() {
        return Err(Error::InvalidMemorySpec(spec.to_string()));
    }

    let number: i64 = prefix
        .parse()
        .map_err(|_| Error::InvalidMemorySpec(spec.to_string()))?;

    Ok(number * multiplier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gigabytes_multiply() {
        assert_eq!(parse_memory_str("2G").unwrap(), 2048);
        assert_eq!(parse_memory_str("1g").unwrap(), 1024);
        assert_eq!(parse_memory_str("2GB").unwrap(), 2048);
    }

    #[test]
    fn megabytes_pass_through() {
        assert_eq!(parse_memory_str("512M").unwrap(), 512);
        assert_eq!(parse_memory_str("256mb").unwrap(), 256);
    }

    #[test]
    fn bare_number_is_megabytes() {
        assert_eq!(parse_memory_str("1024").unwrap(), 1024);
        assert_eq!(parse_memory(&Value::from(1024)).unwrap(), 1024);
    }

    #[test]
    fn suffix_without_number_fails() {
        assert!(matches!(
            parse_memory_str("G"),
            Err(Error::InvalidMemorySpec(_))
        ));
        assert!(matches!(
            parse_memory_str("MB"),
            Err(Error::InvalidMemorySpec(_))
        ));
    }

    #[test]
    fn garbage_prefix_fails() {
        assert!(matches!(
            parse_memory_str("lotsM"),
            Err(Error::InvalidMemorySpec(_))
        ));
        assert!(matches!(
            parse_memory_str(""),
            Err(Error::InvalidMemorySpec(_))
        ));
    }

    #[test]
    fn whitespace_is_tolerated() {
        assert_eq!(parse_memory_str(" 512M ").unwrap(), 512);
    }
}
