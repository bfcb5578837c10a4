use crate::url::normalize::origin_key;
use url::Url;

/// The region of a site a crawl is allowed to visit
///
/// Derived once from the seed URL: the seed's origin plus a base path subtree.
///
/// | Seed path | Scope root |
/// |-----------|------------|
/// | `/docs/en/` | `/docs/en` |
/// | `/docs/en/intro` | `/docs/en` |
/// | `/docs` | `/docs` |
/// | `/` | `/` |
///
/// A single-segment seed path keeps itself as the scope root rather than
/// widening to the whole site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlScope {
    origin: String,
    base_path: String,
}

impl CrawlScope {
    /// Derives the scope from a (normalized) seed URL
    pub fn from_seed(seed: &Url) -> Self {
        Self {
            origin: origin_key(seed),
            base_path: base_path_for(seed.path()),
        }
    }

    /// Origin as `scheme://host[:port]`
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Root of the path subtree, without a trailing separator (except `/`)
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Returns true if `url` shares the scope's origin
    pub fn same_origin(&self, url: &Url) -> bool {
        origin_key(url) == self.origin
    }

    /// Returns true if `path` is the scope root or lies beneath it
    ///
    /// Matching respects segment boundaries: `/docs` contains `/docs/api`
    /// but not `/docs-old`.
    pub fn contains_path(&self, path: &str) -> bool {
        if self.base_path == "/" {
            return true;
        }
        match path.strip_prefix(self.base_path.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }

    /// Returns true if `url` is inside both the origin and the path subtree
    pub fn contains(&self, url: &Url) -> bool {
        self.same_origin(url) && self.contains_path(url.path())
    }
}

fn base_path_for(path: &str) -> String {
    if path.is_empty() || path == "/" {
        return "/".to_string();
    }

    if let Some(dir) = path.strip_suffix('/') {
        return dir.to_string();
    }

    let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
    if segments.len() == 1 {
        return path.to_string();
    }

    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => path[..idx].to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope(seed: &str) -> CrawlScope {
        CrawlScope::from_seed(&Url::parse(seed).unwrap())
    }

    #[test]
    fn test_seed_without_trailing_separator_uses_parent() {
        let scope = scope("https://h/docs/en/sub");
        assert_eq!(scope.base_path(), "/docs/en");
        assert!(scope.contains(&Url::parse("https://h/docs/en/x").unwrap()));
        assert!(!scope.contains(&Url::parse("https://h/blog").unwrap()));
    }

    #[test]
    fn test_seed_with_trailing_separator_is_its_own_root() {
        let scope = scope("https://h/docs/en/");
        assert_eq!(scope.base_path(), "/docs/en");
        assert!(scope.contains_path("/docs/en/guide/setup"));
        assert!(!scope.contains_path("/docs/fr/guide"));
    }

    #[test]
    fn test_single_segment_seed_kept_as_root() {
        let scope = scope("https://h/docs");
        assert_eq!(scope.base_path(), "/docs");
        assert!(scope.contains_path("/docs"));
        assert!(scope.contains_path("/docs/api"));
        assert!(!scope.contains_path("/blog"));
    }

    #[test]
    fn test_root_seed_admits_whole_site() {
        let scope = scope("https://h/");
        assert_eq!(scope.base_path(), "/");
        assert!(scope.contains_path("/anything/at/all"));

        let scope = CrawlScope::from_seed(&Url::parse("https://h").unwrap());
        assert_eq!(scope.base_path(), "/");
    }

    #[test]
    fn test_segment_boundary_respected() {
        let scope = scope("https://h/docs/");
        assert!(!scope.contains_path("/docs-old/page"));
        assert!(!scope.contains_path("/doc"));
    }

    #[test]
    fn test_other_origin_rejected() {
        let scope = scope("https://h/docs/");
        assert!(!scope.contains(&Url::parse("https://other/docs/a").unwrap()));
        assert!(!scope.contains(&Url::parse("http://h/docs/a").unwrap()));
        assert!(!scope.contains(&Url::parse("https://h:8443/docs/a").unwrap()));
    }
}
