// Tue Jan 13 2026 - Alex

use crate::pattern::canonical::canonicalize_pattern;
use crate::pattern::PatternError;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use fancy_regex::Regex;
use std::collections::HashMap;

static GLOBAL_CACHE: Lazy<RegexCache> = Lazy::new(|| RegexCache::new(4096));

/// Compiled regexes keyed by the source the author wrote. Many extensions
/// share fragments like `\i\.jsx\)`, and every lookup replay recompiles
/// otherwise.
pub struct RegexCache {
    cache: RwLock<HashMap<String, Regex>>,
    max_size: usize,
}

impl RegexCache {
    pub fn new(max_size: usize) -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
            max_size,
        }
    }

    pub fn global() -> &'static RegexCache {
        &GLOBAL_CACHE
    }

    pub fn get(&self, source: &str) -> Option<Regex> {
        self.cache.read().get(source).cloned()
    }

    pub fn compile(&self, source: &str) -> Result<Regex, PatternError> {
        if let Some(regex) = self.get(source) {
            return Ok(regex);
        }

        let canonical = canonicalize_pattern(source);
        let regex = Regex::new(&canonical).map_err(|e| PatternError::InvalidPattern {
            pattern: source.to_string(),
            reason: e.to_string(),
        })?;

        let mut cache = self.cache.write();
        if cache.len() >= self.max_size {
            cache.clear();
        }
        cache.insert(source.to_string(), regex.clone());

        Ok(regex)
    }

    pub fn clear(&self) {
        self.cache.write().clear();
    }

    pub fn size(&self) -> usize {
        self.cache.read().len()
    }
}

impl Default for RegexCache {
    fn default() -> Self {
        Self::new(1024)
    }
}

/// Compiles through the process-wide cache.
pub fn compile(source: &str) -> Result<Regex, PatternError> {
    RegexCache::global().compile(source)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_caches_by_source() {
        let cache = RegexCache::new(8);
        let a = cache.compile(r"\i\.foo").unwrap();
        assert_eq!(cache.size(), 1);
        let b = cache.compile(r"\i\.foo").unwrap();
        assert_eq!(a.as_str(), b.as_str());
        assert_eq!(cache.size(), 1);
    }

    #[test]
    fn test_invalid_pattern_reports_source() {
        let cache = RegexCache::new(8);
        let err = cache.compile("(unclosed").unwrap_err();
        match err {
            PatternError::InvalidPattern { pattern, .. } => assert_eq!(pattern, "(unclosed"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(cache.size(), 0);
    }

    #[test]
    fn test_look_around_compiles() {
        let cache = RegexCache::new(8);
        let re = cache.compile(r"(?<=\i\.)isDev(?!\w)").unwrap();
        assert!(re.is_match("e.isDev;").unwrap());
        assert!(!re.is_match("e.isDeveloper").unwrap());
        assert!(!re.is_match("isDev").unwrap());
    }

    #[test]
    fn test_cache_clears_when_full() {
        let cache = RegexCache::new(2);
        cache.compile("a").unwrap();
        cache.compile("b").unwrap();
        cache.compile("c").unwrap();
        assert_eq!(cache.size(), 1);
    }
}
