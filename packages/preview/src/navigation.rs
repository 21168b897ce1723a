//! # Navigation Watcher
//!
//! Single-page apps change the URL without reloading. On every history
//! event the watcher re-evaluates each active variant's URL filter against
//! the new location and suspends or resumes the variant accordingly.

use crate::controller::PreviewController;
use crate::report::PreviewReport;
use abkit_editor::{Owner, Page};
use abkit_url_filter::{CompiledFilter, UrlFilter};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info, instrument};

/// History API call or browser event that changed the URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationKind {
    PushState,
    ReplaceState,
    PopState,
    HashChange,
}

impl NavigationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NavigationKind::PushState => "pushState",
            NavigationKind::ReplaceState => "replaceState",
            NavigationKind::PopState => "popstate",
            NavigationKind::HashChange => "hashchange",
        }
    }
}

impl fmt::Display for NavigationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationEvent {
    pub kind: NavigationKind,
    /// The location after the event
    pub url: String,
}

impl NavigationEvent {
    pub fn new(kind: NavigationKind, url: impl Into<String>) -> Self {
        Self {
            kind,
            url: url.into(),
        }
    }

    pub fn push_state(url: impl Into<String>) -> Self {
        Self::new(NavigationKind::PushState, url)
    }

    pub fn replace_state(url: impl Into<String>) -> Self {
        Self::new(NavigationKind::ReplaceState, url)
    }

    pub fn pop_state(url: impl Into<String>) -> Self {
        Self::new(NavigationKind::PopState, url)
    }

    pub fn hash_change(url: impl Into<String>) -> Self {
        Self::new(NavigationKind::HashChange, url)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    /// Applied, and the URL no longer matches
    Suspended,
    /// Suspended, and the URL matches again
    Resumed,
}

/// One variant changing state because of a navigation
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub owner: Owner,
    pub kind: TransitionKind,
    pub report: PreviewReport,
}

#[derive(Debug)]
struct CachedFilter {
    source: UrlFilter,
    compiled: CompiledFilter,
}

/// Keeps active variants in step with the page URL
#[derive(Debug, Default)]
pub struct NavigationWatcher {
    /// One entry per registered variant that has a filter
    filters: HashMap<Owner, CachedFilter>,
}

impl NavigationWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the page to the event's URL and re-evaluate every variant
    #[instrument(skip_all, fields(kind = %event.kind, url = %event.url))]
    pub fn handle(
        &mut self,
        event: &NavigationEvent,
        controller: &mut PreviewController,
        page: &mut Page,
    ) -> Vec<Transition> {
        page.set_url(event.url.as_str());
        self.sync(controller, page)
    }

    /// Evaluate the page's current URL, no event needed (initial load)
    pub fn sync(&mut self, controller: &mut PreviewController, page: &mut Page) -> Vec<Transition> {
        let url = page.url().to_string();
        self.filters.retain(|owner, _| controller.contains(owner));

        let decisions: Vec<(Owner, bool, bool)> = controller
            .variants()
            .map(|(owner, set)| {
                let in_scope = self.in_scope(owner, set.url_filter.as_ref(), &url);
                (owner.clone(), controller.is_applied(owner), in_scope)
            })
            .collect();

        let mut transitions = Vec::new();
        for (owner, applied, in_scope) in decisions {
            let (kind, report) = match (applied, in_scope) {
                (true, false) => (TransitionKind::Suspended, controller.suspend(&owner, page)),
                (false, true) => (TransitionKind::Resumed, controller.resume(&owner, page)),
                _ => continue,
            };
            let Some(report) = report else {
                continue;
            };
            info!(owner = %owner, transition = ?kind, url = %url, "Variant transition");
            transitions.push(Transition {
                owner,
                kind,
                report,
            });
        }
        transitions
    }

    /// Number of compiled filters held
    pub fn cached_filters(&self) -> usize {
        self.filters.len()
    }

    fn in_scope(&mut self, owner: &Owner, filter: Option<&UrlFilter>, url: &str) -> bool {
        let Some(filter) = filter else {
            self.filters.remove(owner);
            return true;
        };

        let stale = self
            .filters
            .get(owner)
            .map(|cached| cached.source != *filter)
            .unwrap_or(true);
        if stale {
            debug!(owner = %owner, "Compiling URL filter");
            self.filters.insert(
                owner.clone(),
                CachedFilter {
                    source: filter.clone(),
                    compiled: CompiledFilter::compile_lenient(filter),
                },
            );
        }

        self.filters
            .get(owner)
            .map(|cached| cached.compiled.matches(url))
            .unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use abkit_changes::{ChangeRecord, VariantChangeSet};
    use abkit_editor::EngineConfig;
    use abkit_url_filter::MatchType;

    const PAGE: &str = r#"<body><h1 id="title">Sale</h1><p class="note">Ships free</p></body>"#;

    fn page(url: &str) -> Page {
        Page::parse(PAGE, url, &EngineConfig::default()).unwrap()
    }

    fn product_set() -> VariantChangeSet {
        VariantChangeSet::new("exp", "b")
            .unwrap()
            .with_change(ChangeRecord::text("#title", "Deal").unwrap())
            .with_change(ChangeRecord::style(".note", [("color", "red")]).unwrap())
            .with_url_filter(UrlFilter::include(["/products/*"]))
    }

    #[test]
    fn test_push_state_out_of_scope_removes_markers() {
        let mut page = page("https://shop.test/products/1");
        let before = page.to_html();
        let mut controller = PreviewController::new();
        let mut watcher = NavigationWatcher::new();
        controller.activate(&product_set(), &mut page).unwrap();

        let transitions = watcher.sync(&mut controller, &mut page);
        assert_eq!(transitions.len(), 1);
        assert_eq!(transitions[0].kind, TransitionKind::Resumed);
        assert!(page.markers().any_present(page.document()));

        let transitions = watcher.handle(
            &NavigationEvent::push_state("https://shop.test/checkout"),
            &mut controller,
            &mut page,
        );
        assert_eq!(transitions[0].kind, TransitionKind::Suspended);
        assert!(!page.markers().any_present(page.document()));
        assert_eq!(page.to_html(), before);
        assert!(controller.is_active("exp", "b"));
    }

    #[test]
    fn test_pop_state_back_into_scope_resumes() {
        let mut page = page("https://shop.test/products/1");
        let mut controller = PreviewController::new();
        let mut watcher = NavigationWatcher::new();
        controller.activate(&product_set(), &mut page).unwrap();
        watcher.sync(&mut controller, &mut page);
        let applied = page.to_html();

        watcher.handle(
            &NavigationEvent::push_state("https://shop.test/cart"),
            &mut controller,
            &mut page,
        );
        let transitions = watcher.handle(
            &NavigationEvent::pop_state("https://shop.test/products/1"),
            &mut controller,
            &mut page,
        );
        assert_eq!(transitions[0].kind, TransitionKind::Resumed);
        assert!(controller.is_enabled("exp", "b"));
        assert_eq!(page.to_html(), applied);
    }

    #[test]
    fn test_matching_navigation_is_a_no_op() {
        let mut page = page("https://shop.test/products/1");
        let mut controller = PreviewController::new();
        let mut watcher = NavigationWatcher::new();
        controller.activate(&product_set(), &mut page).unwrap();
        watcher.sync(&mut controller, &mut page);

        let transitions = watcher.handle(
            &NavigationEvent::replace_state("https://shop.test/products/2"),
            &mut controller,
            &mut page,
        );
        assert!(transitions.is_empty());
        assert_eq!(page.url(), "https://shop.test/products/2");
    }

    #[test]
    fn test_variant_without_filter_always_matches() {
        let mut page = page("https://shop.test/anything");
        let mut controller = PreviewController::new();
        let mut watcher = NavigationWatcher::new();
        let set = VariantChangeSet::new("exp", "a")
            .unwrap()
            .with_change(ChangeRecord::text("#title", "Everywhere").unwrap());
        controller.activate(&set, &mut page).unwrap();

        watcher.sync(&mut controller, &mut page);
        let transitions = watcher.handle(
            &NavigationEvent::push_state("https://other.test/"),
            &mut controller,
            &mut page,
        );
        assert!(transitions.is_empty());
        assert!(controller.is_enabled("exp", "a"));
        assert_eq!(watcher.cached_filters(), 0);
    }

    #[test]
    fn test_hash_change_with_hash_filter() {
        let mut page = page("https://shop.test/app#/home");
        let mut controller = PreviewController::new();
        let mut watcher = NavigationWatcher::new();
        let set = VariantChangeSet::new("exp", "h")
            .unwrap()
            .with_change(ChangeRecord::text("#title", "Promo").unwrap())
            .with_url_filter(UrlFilter::include(["#/promo*"]).with_match_type(MatchType::Hash));
        controller.activate(&set, &mut page).unwrap();

        assert!(watcher.sync(&mut controller, &mut page).is_empty());
        assert!(!controller.is_enabled("exp", "h"));

        let transitions = watcher.handle(
            &NavigationEvent::hash_change("https://shop.test/app#/promo/spring"),
            &mut controller,
            &mut page,
        );
        assert_eq!(transitions.len(), 1);
        assert!(controller.is_enabled("exp", "h"));
    }

    #[test]
    fn test_disabled_variant_drops_cached_filter() {
        let mut page = page("https://shop.test/products/1");
        let mut controller = PreviewController::new();
        let mut watcher = NavigationWatcher::new();
        let set = product_set();
        controller.activate(&set, &mut page).unwrap();
        watcher.sync(&mut controller, &mut page);
        assert_eq!(watcher.cached_filters(), 1);

        controller.disable(&set, &mut page).unwrap();
        watcher.handle(
            &NavigationEvent::push_state("https://shop.test/products/3"),
            &mut controller,
            &mut page,
        );
        assert_eq!(watcher.cached_filters(), 0);
        assert!(!page.markers().any_present(page.document()));
    }
}
