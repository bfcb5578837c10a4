//! URL frontier and scope guard
//!
//! Every candidate URL passes through [`Frontier::admit`] before it can be
//! fetched. Admitted URLs drain in FIFO order.

use crate::robots::RobotsRuleset;
use crate::state::EntryState;
use crate::url::{is_non_document_path, normalize_url, resolve_url, CrawlScope, FilterSpec};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use url::Url;

/// Dropped-URL count between two "frontier full" notices
const DROP_NOTICE_INTERVAL: usize = 100;

/// Why a candidate was not admitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectReason {
    /// Could not be parsed or resolved to an http(s) URL
    Unparseable,
    /// Different scheme, host or port than the seed
    OutsideOrigin,
    /// Outside the seed's path subtree
    OutsideScope,
    /// Path carries a non-document extension
    NonDocument,
    /// Rejected by include/exclude globs
    Filtered,
    /// Denied by robots.txt
    RobotsDisallowed,
    /// Already pending, in flight or visited
    Duplicate,
    /// Frontier at capacity
    QueueFull,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unparseable => "unparseable",
            Self::OutsideOrigin => "outside-origin",
            Self::OutsideScope => "outside-scope",
            Self::NonDocument => "non-document",
            Self::Filtered => "filtered",
            Self::RobotsDisallowed => "robots-disallowed",
            Self::Duplicate => "duplicate",
            Self::QueueFull => "queue-full",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of an admission attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// Inserted as pending
    Admitted(Url),
    /// Dropped before entering the frontier
    Rejected(RejectReason),
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Self::Admitted(_))
    }
}

/// Pending/in-flight/visited bookkeeping plus the admission checks
#[derive(Debug)]
pub struct Frontier {
    queue: VecDeque<Url>,
    states: HashMap<String, EntryState>,
    scope: CrawlScope,
    filter: FilterSpec,
    capacity: usize,
    capacity_warned: bool,
    dropped: usize,
}

impl Frontier {
    /// Creates an empty frontier
    ///
    /// # Arguments
    ///
    /// * `scope` - Origin and path subtree candidates must lie in
    /// * `filter` - Include/exclude globs applied to candidate paths
    /// * `capacity` - Maximum number of pending URLs
    pub fn new(scope: CrawlScope, filter: FilterSpec, capacity: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            states: HashMap::new(),
            scope,
            filter,
            capacity,
            capacity_warned: false,
            dropped: 0,
        }
    }

    /// Admits the crawl seed
    ///
    /// The seed goes through every check except the glob filter, so an
    /// include pattern never prevents the crawl from starting.
    pub fn admit_seed(&mut self, url: &str, robots: Option<&RobotsRuleset>) -> Admission {
        match normalize_url(url) {
            Ok(url) => self.admit_resolved(url, robots, false),
            Err(e) => {
                tracing::trace!("Rejecting {}: {}", url, e);
                Admission::Rejected(RejectReason::Unparseable)
            }
        }
    }

    /// Resolves `candidate` against `source` and admits it if every check passes
    ///
    /// Checks run in order: origin, path subtree, non-document extension,
    /// glob filter, robots rules (skipped when `robots` is `None`), duplicate,
    /// capacity. Re-admitting a known URL is a no-op.
    pub fn admit(
        &mut self,
        candidate: &str,
        source: &Url,
        robots: Option<&RobotsRuleset>,
    ) -> Admission {
        match resolve_url(candidate, source) {
            Ok(url) => self.admit_resolved(url, robots, true),
            Err(e) => {
                tracing::trace!("Rejecting {}: {}", candidate, e);
                Admission::Rejected(RejectReason::Unparseable)
            }
        }
    }

    fn admit_resolved(
        &mut self,
        url: Url,
        robots: Option<&RobotsRuleset>,
        apply_filter: bool,
    ) -> Admission {
        if let Some(reason) = self.check(&url, robots, apply_filter) {
            tracing::trace!("Rejecting {} ({})", url, reason);
            return Admission::Rejected(reason);
        }

        if self.queue.len() >= self.capacity {
            self.note_drop(&url);
            return Admission::Rejected(RejectReason::QueueFull);
        }

        self.states.insert(url.to_string(), EntryState::Pending);
        self.queue.push_back(url.clone());
        tracing::trace!("Admitted {}", url);
        Admission::Admitted(url)
    }

    fn check(
        &self,
        url: &Url,
        robots: Option<&RobotsRuleset>,
        apply_filter: bool,
    ) -> Option<RejectReason> {
        if !self.scope.same_origin(url) {
            return Some(RejectReason::OutsideOrigin);
        }
        if !self.scope.contains_path(url.path()) {
            return Some(RejectReason::OutsideScope);
        }
        if is_non_document_path(url.path()) {
            return Some(RejectReason::NonDocument);
        }
        if apply_filter && !self.filter.is_allowed(url.path()) {
            return Some(RejectReason::Filtered);
        }
        if robots.is_some_and(|rules| !rules.is_url_allowed(url)) {
            return Some(RejectReason::RobotsDisallowed);
        }
        if self.states.contains_key(url.as_str()) {
            return Some(RejectReason::Duplicate);
        }
        None
    }

    fn note_drop(&mut self, url: &Url) {
        self.dropped += 1;
        if !self.capacity_warned {
            self.capacity_warned = true;
            tracing::warn!(
                "Frontier reached its capacity of {} URLs; newly discovered URLs will be dropped",
                self.capacity
            );
        } else if self.dropped % DROP_NOTICE_INTERVAL == 0 {
            tracing::info!(
                "Frontier full: {} URLs dropped so far ({} pending)",
                self.dropped,
                self.queue.len()
            );
        }
        tracing::trace!("Dropped {} (frontier full)", url);
    }

    /// Removes the oldest pending URL and marks it in flight
    pub fn take(&mut self) -> Option<Url> {
        let url = self.queue.pop_front()?;
        self.states.insert(url.to_string(), EntryState::InFlight);
        Some(url)
    }

    /// Marks an in-flight URL as visited
    ///
    /// Returns false if the URL was not in flight.
    pub fn complete(&mut self, url: &Url) -> bool {
        match self.states.get_mut(url.as_str()) {
            Some(state) if state.can_transition_to(EntryState::Visited) => {
                *state = EntryState::Visited;
                true
            }
            _ => false,
        }
    }

    pub fn state(&self, url: &str) -> Option<EntryState> {
        self.states.get(url).copied()
    }

    pub fn pending_len(&self) -> usize {
        self.queue.len()
    }

    pub fn has_pending(&self) -> bool {
        !self.queue.is_empty()
    }

    pub fn visited_count(&self) -> usize {
        self.states
            .values()
            .filter(|state| state.is_terminal())
            .count()
    }

    pub fn in_flight_count(&self) -> usize {
        self.states
            .values()
            .filter(|state| **state == EntryState::InFlight)
            .count()
    }

    /// Number of URLs dropped because the frontier was full
    pub fn dropped_count(&self) -> usize {
        self.dropped
    }

    pub fn scope(&self) -> &CrawlScope {
        &self.scope
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
