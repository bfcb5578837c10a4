use crate::ConfigError;
use globset::{GlobBuilder, GlobMatcher};

/// Include/exclude glob rules for URL paths
///
/// Exclude patterns are checked first and always win. Include patterns are
/// OR-combined; an empty include list admits everything not excluded.
///
/// Paths are matched without their leading `/`. `*` stays inside one path
/// segment and `**` crosses any number of segments. A pattern without a `/`
/// is matched against the path's base name, so it applies at any depth.
///
/// # Examples
///
/// ```
/// use quarry::url::FilterSpec;
///
/// let filter = FilterSpec::new(&["docs/**".to_string()], &["*.pdf".to_string()]).unwrap();
/// assert!(filter.is_allowed("docs/api.md"));
/// assert!(!filter.is_allowed("src/x.js"));
/// assert!(!filter.is_allowed("docs/manual.pdf"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct FilterSpec {
    include: Vec<GlobRule>,
    exclude: Vec<GlobRule>,
}

#[derive(Debug, Clone)]
struct GlobRule {
    pattern: String,
    matcher: GlobMatcher,
    base_name: bool,
}

impl GlobRule {
    fn compile(raw: &str) -> Result<Self, ConfigError> {
        let pattern = raw.trim().trim_start_matches('/').to_string();
        if pattern.is_empty() {
            return Err(ConfigError::InvalidPattern(format!(
                "'{}' is empty after trimming",
                raw
            )));
        }

        let glob = GlobBuilder::new(&pattern)
            .literal_separator(true)
            .build()
            .map_err(|e| ConfigError::InvalidPattern(format!("'{}': {}", raw, e)))?;

        Ok(Self {
            base_name: !pattern.contains('/'),
            matcher: glob.compile_matcher(),
            pattern,
        })
    }

    fn is_match(&self, path: &str) -> bool {
        if self.base_name {
            let name = path.rsplit('/').next().unwrap_or(path);
            self.matcher.is_match(name)
        } else {
            self.matcher.is_match(path)
        }
    }

    /// Conservative check: could anything beneath `dir_segments` match?
    fn could_match_below(&self, dir_segments: &[&str]) -> bool {
        if self.base_name {
            return true;
        }

        for (pattern_segment, dir_segment) in self.pattern.split('/').zip(dir_segments) {
            if has_glob_meta(pattern_segment) {
                return true;
            }
            if pattern_segment != *dir_segment {
                return false;
            }
        }

        true
    }
}

fn has_glob_meta(segment: &str) -> bool {
    segment.contains(['*', '?', '[', '{'])
}

fn relative(path: &str) -> &str {
    path.trim_start_matches('/')
}

impl FilterSpec {
    /// Compiles include and exclude patterns
    ///
    /// # Returns
    ///
    /// * `Ok(FilterSpec)` - All patterns compiled
    /// * `Err(ConfigError::InvalidPattern)` - The first pattern that failed
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self, ConfigError> {
        Ok(Self {
            include: include
                .iter()
                .map(|p| GlobRule::compile(p))
                .collect::<Result<_, _>>()?,
            exclude: exclude
                .iter()
                .map(|p| GlobRule::compile(p))
                .collect::<Result<_, _>>()?,
        })
    }

    /// Returns true when no patterns are configured
    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    /// Returns true if the path is excluded by any exclude pattern
    pub fn is_excluded(&self, path: &str) -> bool {
        let path = relative(path);
        self.exclude.iter().any(|rule| rule.is_match(path))
    }

    /// Returns true if the path passes the filter
    pub fn is_allowed(&self, path: &str) -> bool {
        let path = relative(path);

        if self.exclude.iter().any(|rule| rule.is_match(path)) {
            return false;
        }

        self.include.is_empty() || self.include.iter().any(|rule| rule.is_match(path))
    }

    /// Returns true if a directory may hold something the include rules admit
    ///
    /// Never prunes a subtree that could contain a match; it may keep some
    /// that end up yielding nothing.
    pub fn should_explore(&self, dir: &str) -> bool {
        if self.include.is_empty() {
            return true;
        }

        let dir = relative(dir).trim_end_matches('/');
        if dir.is_empty() {
            return true;
        }

        let segments: Vec<&str> = dir.split('/').collect();
        self.include
            .iter()
            .any(|rule| rule.could_match_below(&segments))
    }
}
