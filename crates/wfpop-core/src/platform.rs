use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Upstream source a record was harvested from.
///
/// The serialized tags (`youtube`, `forum`, `google`) are the values stored
/// in the `workflows.platform` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Youtube,
    Forum,
    Google,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::Youtube, Platform::Forum, Platform::Google];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Youtube => "youtube",
            Platform::Forum => "forum",
            Platform::Google => "google",
        }
    }

    /// Whether harvests for this platform fan out over the configured regions.
    ///
    /// The forum has no regional search, so its records are always `GLOBAL`.
    #[must_use]
    pub fn is_region_aware(self) -> bool {
        !matches!(self, Platform::Forum)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "youtube" => Ok(Platform::Youtube),
            "forum" => Ok(Platform::Forum),
            "google" => Ok(Platform::Google),
            _ => Err(CoreError::UnknownPlatform(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("YouTube".parse::<Platform>().unwrap(), Platform::Youtube);
        assert_eq!(" FORUM ".parse::<Platform>().unwrap(), Platform::Forum);
        assert_eq!("google".parse::<Platform>().unwrap(), Platform::Google);
    }

    #[test]
    fn rejects_unknown_tag() {
        let err = "tiktok".parse::<Platform>().unwrap_err();
        assert!(matches!(err, CoreError::UnknownPlatform(ref s) if s == "tiktok"));
    }

    #[test]
    fn only_forum_ignores_regions() {
        assert!(Platform::Youtube.is_region_aware());
        assert!(Platform::Google.is_region_aware());
        assert!(!Platform::Forum.is_region_aware());
    }

    #[test]
    fn serializes_as_storage_tag() {
        let json = serde_json::to_string(&Platform::Google).unwrap();
        assert_eq!(json, "\"google\"");
    }
}
