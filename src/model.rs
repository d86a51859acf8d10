use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewConfig {
    pub base_url: String,
    pub context: ReviewContext,
    #[serde(with = "humantime_serde")]
    pub min_loading: Duration,
    #[serde(with = "humantime_serde")]
    pub notification_duration: Duration,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    #[serde(default)]
    pub telemetry_url: Option<String>,
    pub user_agent: String,
}

/// Time window and people a planner run is scoped to. Captured once when the
/// review session starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewContext {
    pub window_start: String,
    pub window_end: String,
    #[serde(default)]
    pub people: Vec<String>,
}

impl ReviewContext {
    /// One-line summary for headers, e.g. `2024-09-02 → 2024-09-16 • Ada, Max`.
    pub fn summary(&self) -> String {
        let names = if self.people.is_empty() {
            "Everyone".to_string()
        } else {
            self.people.join(", ")
        };
        format!("{} → {} • {}", self.window_start, self.window_end, names)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Add,
    Move,
    Resize,
    Cancel,
}

impl ChangeKind {
    /// Display order used when grouping changes into sections.
    pub const ALL: [ChangeKind; 4] = [
        ChangeKind::Add,
        ChangeKind::Move,
        ChangeKind::Resize,
        ChangeKind::Cancel,
    ];

    pub fn section_title(self) -> &'static str {
        match self {
            ChangeKind::Add => "Adds",
            ChangeKind::Move => "Moves",
            ChangeKind::Resize => "Resizes",
            ChangeKind::Cancel => "Cancels",
        }
    }

    /// Whether the change carries a before/after pair worth rendering.
    pub fn shows_span(self) -> bool {
        matches!(self, ChangeKind::Move | ChangeKind::Resize)
    }
}

/// One candidate mutation to the schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposedChange {
    pub id: String,
    pub kind: ChangeKind,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,
}

impl ProposedChange {
    /// Secondary line: `child • subject • when`, skipping missing parts.
    pub fn meta_line(&self) -> String {
        [&self.child, &self.subject, &self.when]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" • ")
    }

    /// `before → after` for moves and resizes, `None` otherwise.
    pub fn span_line(&self) -> Option<String> {
        if !self.kind.shows_span() {
            return None;
        }
        Some(format!(
            "{} → {}",
            self.before.as_deref().unwrap_or("—"),
            self.after.as_deref().unwrap_or("—")
        ))
    }

    /// Copy of this change carrying `plan_id` unless it already names a plan.
    pub fn stamped(&self, plan_id: Option<&str>) -> ProposedChange {
        let mut change = self.clone();
        if change.plan_id.is_none() {
            change.plan_id = plan_id.map(str::to_string);
        }
        change
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utilization_pct: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle_blocks: Option<Vec<String>>,
}

/// Outcome of one planner run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    #[serde(default)]
    pub change_count: usize,
    #[serde(default)]
    pub changes: Vec<ProposedChange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<Diagnostics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zero_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,
}

impl RunResult {
    /// A run "has changes" only when it actually carries some; a positive
    /// `change_count` with an empty list is treated as empty.
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.changes.iter().map(|c| c.id.as_str())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.changes.iter().any(|c| c.id == id)
    }
}

/// Outcome of one apply call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyResult {
    pub applied: usize,
    pub failed: usize,
    /// Ids actually committed. When absent, every submitted id counts as committed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<String>>,
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

    #[test]
    fn context_summary_defaults_to_everyone() {
        let mut ctx = ReviewContext {
            window_start: "2024-09-02".into(),
            window_end: "2024-09-16".into(),
            people: vec![],
        };
        assert_eq!(ctx.summary(), "2024-09-02 → 2024-09-16 • Everyone");
        ctx.people = vec!["Ada".into(), "Max".into()];
        assert_eq!(ctx.summary(), "2024-09-02 → 2024-09-16 • Ada, Max");
    }

    #[test]
    fn stamping_keeps_existing_plan_id() {
        let mut own = change("a", ChangeKind::Add);
        own.plan_id = Some("own".into());
        assert_eq!(own.stamped(Some("active")).plan_id.as_deref(), Some("own"));

        let bare = change("b", ChangeKind::Add);
        assert_eq!(bare.stamped(Some("active")).plan_id.as_deref(), Some("active"));
        assert_eq!(bare.stamped(None).plan_id, None);
    }

    #[test]
    fn meta_and_span_lines() {
        let mut c = change("m", ChangeKind::Move);
        c.child = Some("Ada".into());
        c.when = Some("Mon 9:00".into());
        c.after = Some("Tue 9:00".into());
        assert_eq!(c.meta_line(), "Ada • Mon 9:00");
        assert_eq!(c.span_line().as_deref(), Some("— → Tue 9:00"));
        assert_eq!(change("x", ChangeKind::Cancel).span_line(), None);
    }

    #[test]
    fn run_result_decodes_camel_case_wire_format() {
        let raw = r#"{
            "changeCount": 1,
            "changes": [{"id": "c1", "kind": "resize", "label": "Math longer", "planId": "p0"}],
            "zeroReason": null,
            "planId": "p1",
            "diagnostics": {"utilizationPct": 72.5}
        }"#;
        let parsed: RunResult = serde_json::from_str(raw).expect("decode");
        assert_eq!(parsed.change_count, 1);
        assert_eq!(parsed.changes[0].kind, ChangeKind::Resize);
        assert_eq!(parsed.changes[0].plan_id.as_deref(), Some("p0"));
        assert_eq!(parsed.plan_id.as_deref(), Some("p1"));
        assert!(parsed.has_changes());
    }

    #[test]
    fn count_without_changes_is_not_has_changes() {
        let r = RunResult {
            change_count: 3,
            ..Default::default()
        };
        assert!(!r.has_changes());
    }
}
