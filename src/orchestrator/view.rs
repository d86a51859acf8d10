//! Snapshot of the review workflow handed to presentation layers.
//!
//! Everything a front-end needs to draw the dialog is derived here so the
//! TUI and text mode agree on wording.

use super::notify::Notification;
use crate::model::{ChangeKind, ProposedChange};
use crate::telemetry::ErrorPhase;
use serde::Serialize;

/// How many applied labels the applied panel lists before summarizing.
const APPLIED_PREVIEW: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Status {
    Loading,
    HasChanges,
    Empty,
    Failed,
    Applying,
    Applied,
}

impl Status {
    /// A remote operation is in flight; apply and retry triggers are disabled.
    pub fn is_busy(self) -> bool {
        matches!(self, Status::Loading | Status::Applying)
    }

    pub fn step(self) -> Step {
        match self {
            Status::Loading | Status::Failed => Step::Run,
            Status::HasChanges | Status::Empty => Step::Review,
            Status::Applying | Status::Applied => Step::Apply,
        }
    }

    pub fn shows_review_list(self) -> bool {
        matches!(self, Status::HasChanges | Status::Applying | Status::Applied)
    }

    pub fn label(self) -> &'static str {
        match self {
            Status::Loading => "Analyzing",
            Status::HasChanges => "Review",
            Status::Empty => "All clear",
            Status::Failed => "Failed",
            Status::Applying => "Applying",
            Status::Applied => "Applied",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Step {
    Run,
    Review,
    Apply,
}

impl Step {
    pub const ALL: [Step; 3] = [Step::Run, Step::Review, Step::Apply];

    pub fn label(self) -> &'static str {
        match self {
            Step::Run => "Run",
            Step::Review => "Review",
            Step::Apply => "Apply",
        }
    }
}

/// Changes of one kind, in result order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section<'a> {
    pub kind: ChangeKind,
    pub title: &'static str,
    pub changes: Vec<&'a ProposedChange>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedSummary {
    pub title: String,
    pub preview: Vec<String>,
    pub remaining: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewView {
    pub status: Status,
    pub busy: bool,
    pub context_summary: String,
    /// Every change of the current result, in result order.
    pub changes: Vec<ProposedChange>,
    /// The selected subset of `changes`, in result order.
    pub selected: Vec<ProposedChange>,
    pub applied_ids: Vec<String>,
    pub applied_labels: Vec<String>,
    pub error: Option<String>,
    /// Which operation produced `error`.
    pub failed_phase: Option<ErrorPhase>,
    pub notification: Option<Notification>,
    pub plan_id: Option<String>,
    pub zero_reason: Option<String>,
    pub suggestions: Vec<String>,
}

impl ReviewView {
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selected.iter().any(|c| c.id == id)
    }

    pub fn is_applied(&self, id: &str) -> bool {
        self.applied_ids.iter().any(|a| a == id)
    }

    /// A failed apply keeps the result and selection, so the list stays up for
    /// another attempt.
    pub fn show_review_list(&self) -> bool {
        self.status.shows_review_list() || self.apply_failed()
    }

    pub fn apply_failed(&self) -> bool {
        self.status == Status::Failed && self.failed_phase == Some(ErrorPhase::Apply)
    }

    pub fn failure_title(&self) -> &'static str {
        if self.apply_failed() {
            "Apply failed"
        } else {
            "Planner run failed"
        }
    }

    pub fn step(&self) -> Step {
        self.status.step()
    }

    /// Steps are shown as completed only once an apply went through.
    pub fn step_completed(&self, step: Step) -> bool {
        self.status == Status::Applied && step <= self.step()
    }

    pub fn footer_hint(&self) -> String {
        if self.has_changes() {
            format!("{} selected", self.selected.len())
        } else {
            "0 of 0 approved".to_string()
        }
    }

    pub fn apply_label(&self) -> String {
        match self.status {
            Status::Applying => "Applying…".to_string(),
            _ => format!("Apply {} Changes", self.selected.len()),
        }
    }

    pub fn empty_message(&self) -> &str {
        self.zero_reason
            .as_deref()
            .unwrap_or("No conflicts or deficits in the selected window.")
    }

    /// Changes grouped by kind in add/move/resize/cancel order; empty groups skipped.
    pub fn sections(&self) -> Vec<Section<'_>> {
        ChangeKind::ALL
            .iter()
            .filter_map(|&kind| {
                let changes: Vec<_> = self.changes.iter().filter(|c| c.kind == kind).collect();
                (!changes.is_empty()).then(|| Section {
                    kind,
                    title: kind.section_title(),
                    changes,
                })
            })
            .collect()
    }

    pub fn applied_summary(&self) -> AppliedSummary {
        let count = self.applied_ids.len();
        let preview: Vec<String> = self
            .applied_labels
            .iter()
            .take(APPLIED_PREVIEW)
            .cloned()
            .collect();
        AppliedSummary {
            title: format!("Applied {} {}", count, plural(count, "change")),
            remaining: count.saturating_sub(preview.len()),
            preview,
        }
    }
}

/// `change` / `changes` by count.
pub fn plural(count: usize, word: &str) -> String {
    if count == 1 {
        word.to_string()
    } else {
        format!("{word}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(id: &str, kind: ChangeKind) -> ProposedChange {
        ProposedChange {
            id: id.into(),
            kind,
            label: format!("label {id}"),
            when: None,
            before: None,
            after: None,
            child: None,
            subject: None,
            plan_id: None,
        }
    }

    fn view(status: Status, changes: Vec<ProposedChange>) -> ReviewView {
        ReviewView {
            status,
            busy: status.is_busy(),
            context_summary: String::new(),
            selected: changes.clone(),
            changes,
            applied_ids: vec![],
            applied_labels: vec![],
            error: None,
            failed_phase: None,
            notification: None,
            plan_id: None,
            zero_reason: None,
            suggestions: vec![],
        }
    }

    #[test]
    fn review_list_visible_whenever_changes_are_up_for_review() {
        assert!(Status::HasChanges.shows_review_list());
        assert!(Status::Applying.shows_review_list());
        assert!(Status::Applied.shows_review_list());
        assert!(!Status::Loading.shows_review_list());
        assert!(!Status::Empty.shows_review_list());
        assert!(!Status::Failed.shows_review_list());
    }

    #[test]
    fn failed_apply_keeps_the_list_but_failed_run_does_not() {
        let mut v = view(Status::Failed, vec![change("a", ChangeKind::Add)]);
        v.failed_phase = Some(ErrorPhase::Run);
        assert!(!v.show_review_list());
        assert_eq!(v.failure_title(), "Planner run failed");

        v.failed_phase = Some(ErrorPhase::Apply);
        assert!(v.show_review_list());
        assert_eq!(v.failure_title(), "Apply failed");
    }

    #[test]
    fn sections_follow_kind_order_and_skip_empty_kinds() {
        let v = view(
            Status::HasChanges,
            vec![
                change("c", ChangeKind::Cancel),
                change("a1", ChangeKind::Add),
                change("a2", ChangeKind::Add),
            ],
        );
        let sections = v.sections();
        let titles: Vec<_> = sections.iter().map(|s| s.title).collect();
        assert_eq!(titles, vec!["Adds", "Cancels"]);
        let add_ids: Vec<_> = sections[0].changes.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(add_ids, vec!["a1", "a2"]);
    }

    #[test]
    fn footer_and_apply_label() {
        let mut v = view(Status::HasChanges, vec![change("a", ChangeKind::Add)]);
        assert_eq!(v.footer_hint(), "1 selected");
        assert_eq!(v.apply_label(), "Apply 1 Changes");
        v.status = Status::Applying;
        assert_eq!(v.apply_label(), "Applying…");

        let empty = view(Status::Empty, vec![]);
        assert_eq!(empty.footer_hint(), "0 of 0 approved");
        assert_eq!(
            empty.empty_message(),
            "No conflicts or deficits in the selected window."
        );
    }

    #[test]
    fn applied_summary_previews_five_labels() {
        let mut v = view(Status::Applied, vec![]);
        v.applied_ids = (0..7).map(|i| format!("id{i}")).collect();
        v.applied_labels = (0..7).map(|i| format!("label {i}")).collect();
        let summary = v.applied_summary();
        assert_eq!(summary.title, "Applied 7 changes");
        assert_eq!(summary.preview.len(), 5);
        assert_eq!(summary.remaining, 2);

        v.applied_ids.truncate(1);
        v.applied_labels.truncate(1);
        assert_eq!(v.applied_summary().title, "Applied 1 change");
        assert_eq!(v.applied_summary().remaining, 0);
    }

    #[test]
    fn steps_complete_only_after_apply() {
        let mut v = view(Status::Applied, vec![]);
        assert!(v.step_completed(Step::Run));
        assert!(v.step_completed(Step::Apply));
        v.status = Status::HasChanges;
        assert_eq!(v.step(), Step::Review);
        assert!(!v.step_completed(Step::Run));
    }
}
