use crate::error::FilterError;
use crate::filter::{FilterMode, MatchType, UrlFilter};
use regex::Regex;
use tracing::{debug, warn};
use url::Url;

/// Evaluate `filter` against `url`.
///
/// Invalid patterns are skipped (an invalid exclude never excludes, an
/// invalid include never includes). Nothing is cached between calls.
pub fn matches(filter: &UrlFilter, url: &str) -> bool {
    CompiledFilter::compile_lenient(filter).matches(url)
}

/// Extract the comparison string from `url`, following `window.location`:
/// `query` keeps its `?` and `hash` its `#`, both empty when absent.
/// A URL that does not parse is compared as given.
pub fn extract(match_type: MatchType, url: &str) -> String {
    if match_type == MatchType::FullUrl {
        return url.to_string();
    }

    let parsed = match Url::parse(url) {
        Ok(parsed) => parsed,
        Err(e) => {
            debug!(url = %url, error = %e, "URL did not parse, matching raw string");
            return url.to_string();
        }
    };

    let hash = match parsed.fragment() {
        Some(f) if !f.is_empty() => format!("#{}", f),
        _ => String::new(),
    };

    match match_type {
        MatchType::FullUrl => url.to_string(),
        MatchType::Path => format!("{}{}", parsed.path(), hash),
        MatchType::Domain => parsed.host_str().unwrap_or_default().to_string(),
        MatchType::Query => match parsed.query() {
            Some(q) if !q.is_empty() => format!("?{}", q),
            _ => String::new(),
        },
        MatchType::Hash => hash,
    }
}

/// Anchored regular expression for a glob
pub fn glob_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 2);
    out.push('^');
    for c in pattern.chars() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            other => out.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }
    out.push('$');
    out
}

fn compile_pattern(mode: FilterMode, pattern: &str) -> Result<Regex, FilterError> {
    let source = match mode {
        FilterMode::Simple => glob_to_regex(pattern),
        FilterMode::Regex => pattern.to_string(),
    };
    Regex::new(&source).map_err(|e| FilterError::invalid_pattern(pattern, e.to_string()))
}

/// A filter with its patterns compiled, reusable across navigations
#[derive(Debug, Clone)]
pub struct CompiledFilter {
    match_type: MatchType,
    include: Vec<Regex>,
    exclude: Vec<Regex>,
    /// Every include pattern was invalid
    include_unusable: bool,
}

impl CompiledFilter {
    /// Compile every pattern, failing on the first invalid one
    pub fn compile(filter: &UrlFilter) -> Result<Self, FilterError> {
        let compile_all = |patterns: &[String]| {
            patterns
                .iter()
                .map(|p| compile_pattern(filter.mode, p))
                .collect::<Result<Vec<_>, _>>()
        };

        Ok(Self {
            match_type: filter.match_type,
            include: compile_all(&filter.include)?,
            exclude: compile_all(&filter.exclude)?,
            include_unusable: false,
        })
    }

    /// Compile, dropping invalid patterns with a warning.
    ///
    /// A filter whose includes are all invalid matches nothing rather than
    /// everything.
    pub fn compile_lenient(filter: &UrlFilter) -> Self {
        let compile_valid = |patterns: &[String]| -> Vec<Regex> {
            patterns
                .iter()
                .filter_map(|p| match compile_pattern(filter.mode, p) {
                    Ok(re) => Some(re),
                    Err(e) => {
                        warn!(error = %e, "Skipping invalid URL pattern");
                        None
                    }
                })
                .collect()
        };

        let include = compile_valid(&filter.include);
        Self {
            match_type: filter.match_type,
            exclude: compile_valid(&filter.exclude),
            include_unusable: include.is_empty() && !filter.include.is_empty(),
            include,
        }
    }

    pub fn match_type(&self) -> MatchType {
        self.match_type
    }

    pub fn matches(&self, url: &str) -> bool {
        let target = extract(self.match_type, url);

        if self.include_unusable || self.exclude.iter().any(|re| re.is_match(&target)) {
            return false;
        }
        if self.include.is_empty() {
            return true;
        }
        self.include.iter().any(|re| re.is_match(&target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_escapes_metacharacters() {
        assert_eq!(glob_to_regex("/a.b/*"), r"^/a\.b/.*$");
        assert_eq!(glob_to_regex("?x+"), r"^.x\+$");
    }

    #[test]
    fn test_extract_parts() {
        let url = "https://shop.test:8080/products/1?color=red#reviews";
        assert_eq!(extract(MatchType::FullUrl, url), url);
        assert_eq!(extract(MatchType::Path, url), "/products/1#reviews");
        assert_eq!(extract(MatchType::Domain, url), "shop.test");
        assert_eq!(extract(MatchType::Query, url), "?color=red");
        assert_eq!(extract(MatchType::Hash, url), "#reviews");
    }

    #[test]
    fn test_extract_absent_parts_are_empty() {
        let url = "https://shop.test/";
        assert_eq!(extract(MatchType::Path, url), "/");
        assert_eq!(extract(MatchType::Query, url), "");
        assert_eq!(extract(MatchType::Hash, url), "");
    }

    #[test]
    fn test_unparseable_url_compared_raw() {
        assert_eq!(extract(MatchType::Path, "/relative/path"), "/relative/path");
    }

    #[test]
    fn test_strict_compile_reports_bad_regex() {
        let filter = UrlFilter::include(["(unclosed"]).with_mode(FilterMode::Regex);
        let err = CompiledFilter::compile(&filter).unwrap_err();
        assert!(matches!(err, FilterError::InvalidPattern { ref pattern, .. } if pattern == "(unclosed"));
    }

    #[test]
    fn test_lenient_compile_with_only_bad_includes_matches_nothing() {
        let filter = UrlFilter::include(["(unclosed"]).with_mode(FilterMode::Regex);
        assert!(!matches(&filter, "https://shop.test/anything"));
    }
}
