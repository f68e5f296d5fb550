//! Read-side filter normalization for `GET /workflows`.

/// Normalized `platform` / `country` filters.
///
/// Platform tags are stored lower-case and countries upper-case, so both
/// filters are folded before comparison. Upper-casing also makes `global`
/// match the stored `GLOBAL` literal. Blank values mean "no filter".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkflowFilter {
    pub platform: Option<String>,
    pub country: Option<String>,
}

impl WorkflowFilter {
    #[must_use]
    pub fn new(platform: Option<&str>, country: Option<&str>) -> Self {
        Self {
            platform: non_blank(platform).map(str::to_lowercase),
            country: non_blank(country).map(str::to_uppercase),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
