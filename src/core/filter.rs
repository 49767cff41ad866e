// logtail - core/filter.rs
//
// Keyword filter applied to decoded lines during a scan.
// Core layer: pure logic, no I/O.

/// Case-insensitive substring filter. An empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeywordFilter {
    /// Lower-cased keyword; `None` = no filter.
    needle: Option<String>,
}

impl KeywordFilter {
    /// Build a filter from an optional keyword. Empty strings disable it.
    pub fn new(keyword: Option<&str>) -> Self {
        Self {
            needle: keyword.filter(|k| !k.is_empty()).map(str::to_lowercase),
        }
    }

    /// Returns true if no keyword is set.
    pub fn is_empty(&self) -> bool {
        self.needle.is_none()
    }

    /// Whether `line` should count toward the line limit.
    pub fn matches(&self, line: &str) -> bool {
        match &self.needle {
            None => true,
            Some(needle) => line.to_lowercase().contains(needle.as_str()),
        }
    }

    /// Number of non-overlapping keyword occurrences in `line`.
    /// Zero when no keyword is set.
    pub fn count_matches(&self, line: &str) -> usize {
        match &self.needle {
            None => 0,
            Some(needle) => line.to_lowercase().matches(needle.as_str()).count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_filter_matches_all() {
        let f = KeywordFilter::new(None);
        assert!(f.is_empty());
        assert!(f.matches("anything"));
        assert!(KeywordFilter::new(Some("")).is_empty());
    }

    #[test]
    fn test_case_insensitive_match() {
        let f = KeywordFilter::new(Some("Error"));
        assert!(f.matches("2024-01-01 ERROR disk full"));
        assert!(f.matches("error: x"));
        assert!(!f.matches("all good"));
    }

    #[test]
    fn test_count_matches() {
        let f = KeywordFilter::new(Some("ab"));
        assert_eq!(f.count_matches("AB ab aB xx"), 3);
        assert_eq!(KeywordFilter::new(None).count_matches("ab"), 0);
    }
}
