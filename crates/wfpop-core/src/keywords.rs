//! Keyword seed loading.

use std::collections::HashSet;
use std::path::Path;

use crate::ConfigError;

const FALLBACK_KEYWORDS: [&str; 3] = ["n8n workflow", "n8n automation", "n8n tutorial"];

/// Keywords used when the seed file is missing or unreadable.
#[must_use]
pub fn default_keywords() -> Vec<String> {
    FALLBACK_KEYWORDS.iter().map(ToString::to_string).collect()
}

/// Load the keyword seed file: a JSON array of strings.
///
/// The result is trimmed and deduplicated, keeping first-seen order.
///
/// # Errors
///
/// Returns [`ConfigError::KeywordSeed`] if the file cannot be read or is not
/// a JSON array of strings.
pub fn load_keyword_seed(path: &Path) -> Result<Vec<String>, ConfigError> {
    let seed_error = |reason: String| ConfigError::KeywordSeed {
        path: path.display().to_string(),
        reason,
    };

    let raw = std::fs::read_to_string(path).map_err(|e| seed_error(e.to_string()))?;
    let entries: Vec<Option<String>> =
        serde_json::from_str(&raw).map_err(|e| seed_error(e.to_string()))?;

    Ok(normalize_keywords(entries.into_iter().flatten()))
}

/// Trim, drop blanks and deduplicate while preserving first-seen order.
pub fn normalize_keywords<I, S>(keywords: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    keywords
        .into_iter()
        .filter_map(|k| {
            let trimmed = k.as_ref().trim();
            (!trimmed.is_empty() && seen.insert(trimmed.to_string())).then(|| trimmed.to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn seed_file(contents: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir();
        let path = dir.join(format!(
            "wfpop-seed-{}-{}.json",
            std::process::id(),
            contents.len()
        ));
        let mut file = std::fs::File::create(&path).expect("create seed file");
        file.write_all(contents.as_bytes()).expect("write seed file");
        path
    }

    #[test]
    fn normalize_trims_dedupes_and_keeps_order() {
        let out = normalize_keywords(["  slack bot", "crm sync", "slack bot ", "", "   "]);
        assert_eq!(out, vec!["slack bot".to_string(), "crm sync".to_string()]);
    }

    #[test]
    fn loads_json_array_and_skips_nulls() {
        let path = seed_file(r#"["email parser", null, " email parser", "rss digest"]"#);
        let out = load_keyword_seed(&path).expect("load seed");
        assert_eq!(out, vec!["email parser", "rss digest"]);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn missing_file_is_a_seed_error() {
        let result = load_keyword_seed(Path::new("/definitely/not/here.json"));
        assert!(matches!(result, Err(ConfigError::KeywordSeed { .. })));
    }

    #[test]
    fn corrupt_file_is_a_seed_error() {
        let path = seed_file("{not json");
        let result = load_keyword_seed(&path);
        assert!(matches!(result, Err(ConfigError::KeywordSeed { .. })));
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn defaults_are_non_empty() {
        assert_eq!(default_keywords().len(), 3);
    }
}
