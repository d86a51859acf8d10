//! Text rendering of review snapshots for line-oriented output.
//!
//! This module formats human-readable lines for text mode.

use crate::orchestrator::{NotificationKind, ReviewView, Status, Step};

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

fn stepper(view: &ReviewView) -> String {
    Step::ALL
        .iter()
        .map(|&step| {
            let mark = if view.step_completed(step) {
                "✓"
            } else if step == view.step() {
                "●"
            } else {
                "○"
            };
            format!("{mark} {}", step.label())
        })
        .collect::<Vec<_>>()
        .join(" ─ ")
}

/// Build the full text block for one snapshot.
pub(crate) fn build_text_summary(title: &str, view: &ReviewView) -> TextSummary {
    let mut lines = vec![
        format!("== {title} =="),
        view.context_summary.clone(),
        stepper(view),
    ];
    if view.busy {
        lines.push("Planner is working…".to_string());
    }

    match view.status {
        Status::Loading => lines.push("Analyzing schedule and capacity…".to_string()),
        Status::Failed => {
            lines.push(view.failure_title().to_string());
            lines.push(view.error.clone().unwrap_or_else(|| {
                "Something went wrong while running the planner. Please try again.".to_string()
            }));
            if view.apply_failed() {
                lines.push("(your selection is kept; type `apply` to try again)".to_string());
            } else {
                lines.push("(type `retry` to run again)".to_string());
            }
        }
        Status::Empty => {
            lines.push("Everything's already balanced.".to_string());
            lines.push(view.empty_message().to_string());
            for s in &view.suggestions {
                lines.push(format!("  tip: {s}"));
            }
        }
        Status::HasChanges | Status::Applying | Status::Applied => {}
    }

    if view.status == Status::Applied || (!view.applied_ids.is_empty() && view.show_review_list()) {
        let summary = view.applied_summary();
        lines.push(summary.title);
        for label in summary.preview {
            lines.push(format!("  • {label}"));
        }
        if summary.remaining > 0 {
            lines.push(format!("  • and {} more…", summary.remaining));
        }
    }

    if view.show_review_list() {
        lines.extend(review_lines(view));
    }

    lines.push(format!("{} | {}", view.footer_hint(), view.apply_label()));
    if let Some(n) = view.notification.as_ref() {
        let tag = match n.kind {
            NotificationKind::Info => "info",
            NotificationKind::Success => "ok",
            NotificationKind::Error => "error",
        };
        lines.push(format!("[{tag}] {}", n.message));
    }

    TextSummary { lines }
}

fn review_lines(view: &ReviewView) -> Vec<String> {
    let mut lines = Vec::new();
    for section in view.sections() {
        lines.push(format!("{} ({})", section.title, section.changes.len()));
        for change in section.changes {
            let mark = if view.is_applied(&change.id) {
                "[✓]"
            } else if view.is_selected(&change.id) {
                "[x]"
            } else {
                "[ ]"
            };
            lines.push(format!("  {mark} {} ({})", change.label, change.id));
            let meta = change.meta_line();
            if !meta.is_empty() {
                lines.push(format!("        {meta}"));
            }
            if let Some(span) = change.span_line() {
                lines.push(format!("        {span}"));
            }
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChangeKind, ProposedChange};
    use crate::orchestrator::Notification;
    use crate::telemetry::ErrorPhase;
    use std::time::Duration;

    fn change(id: &str, kind: ChangeKind) -> ProposedChange {
        ProposedChange {
            id: id.into(),
            kind,
            label: format!("Change {id}"),
            when: Some("Mon".into()),
            before: Some("9:00".into()),
            after: Some("10:00".into()),
            child: Some("Ada".into()),
            subject: None,
            plan_id: None,
        }
    }

    fn view(status: Status) -> ReviewView {
        let changes = vec![change("a", ChangeKind::Move), change("b", ChangeKind::Add)];
        ReviewView {
            status,
            busy: status.is_busy(),
            context_summary: "2024-09-02 → 2024-09-16 • Ada".into(),
            selected: vec![changes[0].clone()],
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
    fn review_snapshot_lists_sections_and_marks() {
        let summary = build_text_summary("AI plan", &view(Status::HasChanges));
        let text = summary.lines.join("\n");
        assert!(text.contains("○ Run ─ ● Review ─ ○ Apply"));
        assert!(text.contains("Adds (1)"));
        assert!(text.contains("Moves (1)"));
        assert!(text.contains("[x] Change a (a)"));
        assert!(text.contains("[ ] Change b (b)"));
        assert!(text.contains("9:00 → 10:00"));
        assert!(text.contains("1 selected | Apply 1 Changes"));
        // Adds come before moves regardless of result order.
        assert!(text.find("Adds").unwrap_or(usize::MAX) < text.find("Moves").unwrap_or(0));
    }

    #[test]
    fn failed_apply_keeps_review_list_visible() {
        let mut v = view(Status::Failed);
        v.error = Some("conflict".into());
        v.failed_phase = Some(ErrorPhase::Apply);
        let text = build_text_summary("AI plan", &v).lines.join("\n");
        assert!(text.contains("Apply failed\nconflict"));
        assert!(text.contains("type `apply` to try again"));
        assert!(!text.contains("Planner run failed"));
        assert!(text.contains("[x] Change a (a)"));
        assert!(text.contains("[ ] Change b (b)"));
        assert!(text.contains("1 selected | Apply 1 Changes"));
    }

    #[test]
    fn failed_snapshot_shows_error_and_notification() {
        let mut v = view(Status::Failed);
        v.changes.clear();
        v.selected.clear();
        v.error = Some("network down".into());
        v.failed_phase = Some(ErrorPhase::Run);
        v.notification = Some(Notification {
            kind: NotificationKind::Error,
            message: "network down".into(),
            duration: Duration::from_millis(2800),
        });
        let text = build_text_summary("AI plan", &v).lines.join("\n");
        assert!(text.contains("Planner run failed\nnetwork down"));
        assert!(text.contains("[error] network down"));
        assert!(text.contains("0 of 0 approved"));
        assert!(!text.contains("Adds"));
    }
}
