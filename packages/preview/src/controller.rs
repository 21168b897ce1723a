//! # Preview Controller
//!
//! Applies or reverts every record of a variant in one go, independently of
//! any edit history.
//!
//! Each registered variant is "meant to be active". Whether its records are
//! on the page right now is tracked separately, so navigation can suspend a
//! variant (URL out of scope) and later resume it without the caller
//! re-enabling it.

use crate::errors::PreviewResult;
use crate::report::{PreviewReport, RecordStatus};
use abkit_changes::VariantChangeSet;
use abkit_editor::{Owner, Page};
use indexmap::IndexMap;
use std::collections::BTreeSet;
use tracing::{debug, info, instrument, warn};

#[derive(Debug)]
struct VariantPreview {
    set: VariantChangeSet,
    applied: bool,
    /// Indices into `set.changes` in the order they first took effect
    applied_order: Vec<usize>,
    /// `waitForElement` records that have not matched anything yet
    pending: BTreeSet<usize>,
}

impl VariantPreview {
    fn new(set: VariantChangeSet) -> Self {
        Self {
            set,
            applied: false,
            applied_order: Vec::new(),
            pending: BTreeSet::new(),
        }
    }
}

/// Variant-level preview toggling
#[derive(Debug, Default)]
pub struct PreviewController {
    variants: IndexMap<Owner, VariantPreview>,
}

impl PreviewController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `set` as meant to be active.
    ///
    /// A new variant is not applied here; the navigation watcher applies it
    /// once the URL is in scope. If the variant is applied and `set` carries
    /// a different payload, the old records come off the page now and the
    /// new ones go on at the next sync.
    pub fn activate(&mut self, set: &VariantChangeSet, page: &mut Page) -> PreviewResult<Owner> {
        let owner = Owner::new(&set.experiment_id, &set.variant_id)?;
        match self.variants.get_mut(&owner) {
            Some(state) if state.set == *set => {}
            Some(state) => {
                if state.applied {
                    debug!(owner = %owner, "Payload changed, reverting previous records");
                    revert_all(&owner, state, page);
                }
                state.set = set.clone();
            }
            None => {
                self.variants
                    .insert(owner.clone(), VariantPreview::new(set.clone()));
            }
        }
        Ok(owner)
    }

    /// Apply every record of `set`. Calling it again is harmless.
    #[instrument(skip_all, fields(experiment = %set.experiment_id, variant = %set.variant_id))]
    pub fn enable(&mut self, set: &VariantChangeSet, page: &mut Page) -> PreviewResult<PreviewReport> {
        let owner = Owner::new(&set.experiment_id, &set.variant_id)?;

        // A changed payload replaces whatever the old one left behind
        if let Some(existing) = self.variants.get_mut(&owner) {
            if existing.set != *set && existing.applied {
                debug!("Payload changed, reverting previous records");
                revert_all(&owner, existing, page);
            }
            existing.set = set.clone();
        } else {
            self.variants
                .insert(owner.clone(), VariantPreview::new(set.clone()));
        }

        let report = match self.variants.get_mut(&owner) {
            Some(state) => apply_all(&owner, state, page),
            None => PreviewReport::new(owner),
        };
        info!(
            applied = report.applied_count(),
            failed = report.failures().count(),
            "Variant enabled"
        );
        Ok(report)
    }

    /// Revert every record of `set` and forget the variant.
    ///
    /// Works for variants this controller never enabled: any marker left on
    /// the page for the variant is removed.
    #[instrument(skip_all, fields(experiment = %set.experiment_id, variant = %set.variant_id))]
    pub fn disable(&mut self, set: &VariantChangeSet, page: &mut Page) -> PreviewResult<PreviewReport> {
        let owner = Owner::new(&set.experiment_id, &set.variant_id)?;
        let mut state = self
            .variants
            .shift_remove(&owner)
            .unwrap_or_else(|| VariantPreview::new(set.clone()));
        if state.set != *set {
            // Records of both payloads may be on the page
            let stale = revert_all(&owner, &mut state, page);
            state.set = set.clone();
            let mut report = revert_all(&owner, &mut state, page);
            report.records.extend(stale.records);
            report.swept.merge(stale.swept);
            return Ok(report);
        }

        let report = revert_all(&owner, &mut state, page);
        info!(reverted = report.reverted_count(), "Variant disabled");
        Ok(report)
    }

    /// Take the variant off the page but keep it meant to be active
    pub fn suspend(&mut self, owner: &Owner, page: &mut Page) -> Option<PreviewReport> {
        let state = self.variants.get_mut(owner)?;
        if !state.applied {
            return None;
        }
        Some(revert_all(owner, state, page))
    }

    /// Re-apply a suspended variant
    pub fn resume(&mut self, owner: &Owner, page: &mut Page) -> Option<PreviewReport> {
        let state = self.variants.get_mut(owner)?;
        if state.applied {
            return None;
        }
        Some(apply_all(owner, state, page))
    }

    /// Try the `waitForElement` records that matched nothing so far.
    ///
    /// Only applied variants are retried; one report per variant that had
    /// something pending.
    pub fn retry_pending(&mut self, page: &mut Page) -> Vec<PreviewReport> {
        let mut reports = Vec::new();
        for (owner, state) in self.variants.iter_mut() {
            if !state.applied || state.pending.is_empty() {
                continue;
            }
            let mut report = PreviewReport::new(owner.clone());
            let pending: Vec<usize> = state.pending.iter().copied().collect();
            for index in pending {
                let Some(record) = state.set.changes.get(index) else {
                    state.pending.remove(&index);
                    continue;
                };
                let status = match page.apply(owner, record) {
                    Ok(outcome) if outcome.applied_count > 0 => {
                        debug!(record = %record.id(), "Pending record matched");
                        state.pending.remove(&index);
                        if !state.applied_order.contains(&index) {
                            state.applied_order.push(index);
                        }
                        RecordStatus::Applied(outcome)
                    }
                    Ok(_) => RecordStatus::Pending,
                    Err(err) => {
                        warn!(record = %record.id(), error = %err, "Pending record failed");
                        state.pending.remove(&index);
                        RecordStatus::Failed(err)
                    }
                };
                report.push(record.id(), status);
            }
            reports.push(report);
        }
        reports
    }

    /// True if the variant's records are currently applied
    pub fn is_enabled(&self, experiment_id: &str, variant_id: &str) -> bool {
        self.find(experiment_id, variant_id)
            .map(|state| state.applied)
            .unwrap_or(false)
    }

    /// True if the variant is registered, applied or suspended
    pub fn is_active(&self, experiment_id: &str, variant_id: &str) -> bool {
        self.find(experiment_id, variant_id).is_some()
    }

    pub fn is_applied(&self, owner: &Owner) -> bool {
        self.variants.get(owner).map(|s| s.applied).unwrap_or(false)
    }

    pub fn contains(&self, owner: &Owner) -> bool {
        self.variants.contains_key(owner)
    }

    /// Registered variants in registration order
    pub fn variants(&self) -> impl Iterator<Item = (&Owner, &VariantChangeSet)> {
        self.variants.iter().map(|(owner, state)| (owner, &state.set))
    }

    fn find(&self, experiment_id: &str, variant_id: &str) -> Option<&VariantPreview> {
        self.variants
            .iter()
            .find(|(owner, _)| owner.experiment_id == experiment_id && owner.variant_id == variant_id)
            .map(|(_, state)| state)
    }
}

fn apply_all(owner: &Owner, state: &mut VariantPreview, page: &mut Page) -> PreviewReport {
    let mut report = PreviewReport::new(owner.clone());
    for (index, record) in state.set.changes.iter().enumerate() {
        if !record.is_enabled() {
            report.push(record.id(), RecordStatus::Disabled);
            continue;
        }
        let status = match page.apply(owner, record) {
            Ok(outcome) => {
                if outcome.applied_count > 0 && !state.applied_order.contains(&index) {
                    state.applied_order.push(index);
                }
                let matched = outcome.applied_count + outcome.skipped_count > 0;
                if !matched && record.waits_for_element() {
                    state.pending.insert(index);
                    RecordStatus::Pending
                } else {
                    state.pending.remove(&index);
                    RecordStatus::Applied(outcome)
                }
            }
            Err(err) => {
                warn!(record = %record.id(), error = %err, "Record failed to apply");
                RecordStatus::Failed(err)
            }
        };
        report.push(record.id(), status);
    }
    state.applied = true;
    report
}

/// Revert newest record first, then sweep whatever is left of the owner
fn revert_all(owner: &Owner, state: &mut VariantPreview, page: &mut Page) -> PreviewReport {
    let mut report = PreviewReport::new(owner.clone());
    let count = state.set.changes.len();
    let mut order: Vec<usize> = state.applied_order.iter().rev().copied().collect();
    let rest: Vec<usize> = (0..count).rev().filter(|i| !order.contains(i)).collect();
    order.extend(rest);

    for index in order {
        let Some(record) = state.set.changes.get(index) else {
            continue;
        };
        let outcome = page.revert(owner, record);
        let status = if outcome == Default::default() {
            RecordStatus::NotPresent
        } else {
            RecordStatus::Reverted(outcome)
        };
        report.push(record.id(), status);
    }
    report.swept = page.revert_owner(owner);

    state.applied = false;
    state.applied_order.clear();
    state.pending.clear();
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use abkit_changes::{ChangeRecord, Position};
    use abkit_editor::EngineConfig;

    const PAGE: &str = r#"<body><h1 id="title">Sale</h1><a id="cta" class="btn">Buy</a></body>"#;

    fn page() -> Page {
        Page::parse(PAGE, "https://shop.test/", &EngineConfig::default()).unwrap()
    }

    fn set() -> VariantChangeSet {
        VariantChangeSet::new("exp", "b")
            .unwrap()
            .with_change(ChangeRecord::text("#title", "Big sale").unwrap())
            .with_change(ChangeRecord::class("#cta", ["btn-lg"], Vec::<&str>::new()).unwrap())
    }

    #[test]
    fn test_enable_then_disable_restores_page() {
        let mut page = page();
        let before = page.to_html();
        let mut controller = PreviewController::new();
        let set = set();

        let report = controller.enable(&set, &mut page).unwrap();
        assert_eq!(report.applied_count(), 2);
        assert!(controller.is_enabled("exp", "b"));

        let report = controller.disable(&set, &mut page).unwrap();
        assert_eq!(report.reverted_count(), 2);
        assert_eq!(page.to_html(), before);
        assert!(!controller.is_enabled("exp", "b"));
        assert!(!controller.is_active("exp", "b"));
    }

    #[test]
    fn test_enable_and_disable_are_idempotent() {
        let mut page = page();
        let before = page.to_html();
        let mut controller = PreviewController::new();
        let set = set();

        controller.enable(&set, &mut page).unwrap();
        let enabled = page.to_html();
        let again = controller.enable(&set, &mut page).unwrap();
        assert_eq!(again.applied_count(), 0);
        assert_eq!(page.to_html(), enabled);

        controller.disable(&set, &mut page).unwrap();
        let again = controller.disable(&set, &mut page).unwrap();
        assert_eq!(again.reverted_count(), 0);
        assert!(again
            .records
            .iter()
            .all(|r| r.status == RecordStatus::NotPresent));
        assert_eq!(page.to_html(), before);
    }

    #[test]
    fn test_failing_record_does_not_stop_siblings() {
        let mut page = page();
        let mut controller = PreviewController::new();
        let set = VariantChangeSet::new("exp", "b")
            .unwrap()
            .with_change(ChangeRecord::move_to("#title", "#title", Position::FirstChild).unwrap())
            .with_change(ChangeRecord::text("#cta", "Now").unwrap());

        let report = controller.enable(&set, &mut page).unwrap();
        assert_eq!(report.failures().count(), 1);
        assert_eq!(report.applied_count(), 1);
        let cta = page.document().get_element_by_id("cta").unwrap();
        assert_eq!(page.document().text_content(cta), "Now");
    }

    #[test]
    fn test_pending_record_applies_once_element_appears() {
        let mut page = page();
        let mut controller = PreviewController::new();
        let set = VariantChangeSet::new("exp", "b")
            .unwrap()
            .with_change(
                ChangeRecord::text("#late", "Hi")
                    .unwrap()
                    .with_wait_for_element(true),
            );

        let report = controller.enable(&set, &mut page).unwrap();
        assert_eq!(report.pending().count(), 1);
        assert!(controller.retry_pending(&mut page)[0].pending().count() == 1);

        let body = page.document().body().unwrap();
        let doc = page.document_mut();
        let late = doc.create_element("div");
        doc.set_attr(late, "id", "late").unwrap();
        doc.append_child(body, late).unwrap();

        let reports = controller.retry_pending(&mut page);
        assert_eq!(reports[0].applied_count(), 1);
        assert!(controller.retry_pending(&mut page).is_empty());
        assert_eq!(page.document().text_content(late), "Hi");
    }

    #[test]
    fn test_suspend_keeps_variant_active() {
        let mut page = page();
        let before = page.to_html();
        let mut controller = PreviewController::new();
        let owner = controller.activate(&set(), &mut page).unwrap();
        assert!(!controller.is_enabled("exp", "b"));

        controller.resume(&owner, &mut page).unwrap();
        assert!(controller.is_enabled("exp", "b"));
        assert!(controller.resume(&owner, &mut page).is_none());

        controller.suspend(&owner, &mut page).unwrap();
        assert_eq!(page.to_html(), before);
        assert!(controller.is_active("exp", "b"));
        assert!(!controller.is_enabled("exp", "b"));
    }

    #[test]
    fn test_changed_payload_replaces_previous_records() {
        let mut page = page();
        let before = page.to_html();
        let mut controller = PreviewController::new();
        controller.enable(&set(), &mut page).unwrap();

        let replacement = VariantChangeSet::new("exp", "b")
            .unwrap()
            .with_change(ChangeRecord::text("#cta", "Go").unwrap());
        controller.enable(&replacement, &mut page).unwrap();

        let title = page.document().get_element_by_id("title").unwrap();
        assert_eq!(page.document().text_content(title), "Sale");

        controller.disable(&replacement, &mut page).unwrap();
        assert_eq!(page.to_html(), before);
    }

    #[test]
    fn test_activate_with_new_payload_replaces_applied_records() {
        let mut page = page();
        let mut controller = PreviewController::new();
        let v1 = VariantChangeSet::new("exp", "b")
            .unwrap()
            .with_change(ChangeRecord::text("#title", "V1").unwrap());
        let v2 = VariantChangeSet::new("exp", "b")
            .unwrap()
            .with_change(ChangeRecord::text("#title", "V2").unwrap());
        let title = page.document().get_element_by_id("title").unwrap();

        let owner = controller.activate(&v1, &mut page).unwrap();
        controller.resume(&owner, &mut page).unwrap();
        assert_eq!(page.document().text_content(title), "V1");

        controller.activate(&v2, &mut page).unwrap();
        assert_eq!(page.document().text_content(title), "Sale");
        assert!(controller.is_active("exp", "b"));
        assert!(!controller.is_enabled("exp", "b"));

        controller.resume(&owner, &mut page).unwrap();
        assert_eq!(page.document().text_content(title), "V2");

        // Same payload again leaves the page alone
        let applied = page.to_html();
        controller.activate(&v2, &mut page).unwrap();
        assert!(controller.is_enabled("exp", "b"));
        assert_eq!(page.to_html(), applied);
    }
}
