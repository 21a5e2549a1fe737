//! Topic Names - Canonical Version Identifiers
//!
//! A dataset version is addressed everywhere by its topic name,
//! `<storeName>_v<versionNumber>`. Store names may themselves contain
//! underscores (`user_profiles_v3` is version 3 of store `user_profiles`),
//! so parsing splits on the *last* `_v` whose suffix is all digits.
//!
//! ## Example
//!
//! ```
//! use keyhouse_core::topic;
//!
//! let name = topic::compose("user_profiles", 3);
//! assert_eq!(name, "user_profiles_v3");
//! assert_eq!(topic::parse_store(&name).unwrap(), "user_profiles");
//! assert_eq!(topic::parse_version(&name).unwrap(), 3);
//! ```

use crate::error::{Error, Result};

/// Separator between the store name and the version number.
pub const VERSION_SEPARATOR: &str = "_v";

/// Compose the topic name for a store version.
pub fn compose(store_name: &str, version_number: u32) -> String {
    format!("{store_name}{VERSION_SEPARATOR}{version_number}")
}

/// Extract the store name from a topic name.
pub fn parse_store(topic: &str) -> Result<&str> {
    split(topic).map(|(store, _)| store)
}

/// Extract the version number from a topic name.
pub fn parse_version(topic: &str) -> Result<u32> {
    split(topic).map(|(_, version)| version)
}

fn split(topic: &str) -> Result<(&str, u32)> {
    let index = topic
        .rfind(VERSION_SEPARATOR)
        .ok_or_else(|| Error::MalformedTopic(topic.to_string()))?;

    let store = &topic[..index];
    let suffix = &topic[index + VERSION_SEPARATOR.len()..];

    if store.is_empty() || suffix.is_empty() {
        return Err(Error::MalformedTopic(topic.to_string()));
    }

    let version = suffix
        .parse::<u32>()
        .map_err(|_| Error::MalformedTopic(topic.to_string()))?;

    Ok((store, version))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose() {
        assert_eq!(compose("orders", 1), "orders_v1");
        assert_eq!(compose("user_profiles", 42), "user_profiles_v42");
    }

    #[test]
    fn test_parse_roundtrip() {
        let topic = compose("clickstream", 7);
        assert_eq!(parse_store(&topic).unwrap(), "clickstream");
        assert_eq!(parse_version(&topic).unwrap(), 7);
    }

    #[test]
    fn test_store_name_with_underscores() {
        let topic = compose("user_profiles_eu", 12);
        assert_eq!(topic, "user_profiles_eu_v12");
        assert_eq!(parse_store(&topic).unwrap(), "user_profiles_eu");
        assert_eq!(parse_version(&topic).unwrap(), 12);
    }

    #[test]
    fn test_store_name_containing_version_separator() {
        // "metrics_v2" is a legal store name; its version 5 topic must still
        // parse back to the full store name.
        let topic = compose("metrics_v2", 5);
        assert_eq!(topic, "metrics_v2_v5");
        assert_eq!(parse_store(&topic).unwrap(), "metrics_v2");
        assert_eq!(parse_version(&topic).unwrap(), 5);
    }

    #[test]
    fn test_missing_separator_is_malformed() {
        assert!(matches!(
            parse_store("orders"),
            Err(Error::MalformedTopic(_))
        ));
    }

    #[test]
    fn test_non_numeric_version_is_malformed() {
        assert!(matches!(
            parse_version("orders_version"),
            Err(Error::MalformedTopic(_))
        ));
    }

    #[test]
    fn test_empty_version_is_malformed() {
        assert!(matches!(
            parse_version("orders_v"),
            Err(Error::MalformedTopic(_))
        ));
    }

    #[test]
    fn test_empty_store_is_malformed() {
        assert!(matches!(parse_store("_v3"), Err(Error::MalformedTopic(_))));
    }

    #[test]
    fn test_version_zero() {
        assert_eq!(parse_version("s_v0").unwrap(), 0);
    }
}
