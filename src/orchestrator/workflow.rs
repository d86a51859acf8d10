//! Review workflow state machine.
//!
//! Pure state: no tasks, no sleeping. The driver in `controller` starts the
//! planner calls and feeds their outcomes back through `finish_run` and
//! `finish_apply`.

use super::notify::{NotificationChannel, NotificationKind};
use super::selection::SelectionSet;
use super::view::{plural, ReviewView, Status};
use crate::error::ReviewError;
use crate::model::{ApplyResult, ProposedChange, ReviewContext, RunResult};
use crate::planner::PlannerError;
use crate::telemetry::{ErrorPhase, Telemetry, TelemetryEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

const ANALYZING_DURATION: Duration = Duration::from_millis(1400);
const RESCAN_DURATION: Duration = Duration::from_millis(1600);

/// Why a run is being started. Decides which notification announces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunReason {
    Open,
    Retry,
    Rescan,
    /// Refresh after a successful apply; the apply's success message stays up.
    AfterApply,
}

/// What the driver should do after the operator pressed Apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyRequest {
    /// Busy; the trigger is disabled.
    Ignored,
    /// Nothing selected: dismiss without calling the planner.
    Close,
    Submit(Vec<ProposedChange>),
}

pub struct WorkflowController {
    status: Status,
    context: ReviewContext,
    result: Option<RunResult>,
    error: Option<ReviewError>,
    selection: SelectionSet,
    applied_ids: Vec<String>,
    applied_labels: Vec<String>,
    plan_id: Option<String>,
    submitted: Vec<ProposedChange>,
    has_run: bool,
    notifications: NotificationChannel,
    notification_duration: Duration,
    telemetry: Arc<dyn Telemetry>,
}

impl WorkflowController {
    pub fn new(
        context: ReviewContext,
        notification_duration: Duration,
        telemetry: Arc<dyn Telemetry>,
    ) -> Self {
        Self {
            status: Status::Loading,
            context,
            result: None,
            error: None,
            selection: SelectionSet::default(),
            applied_ids: Vec::new(),
            applied_labels: Vec::new(),
            plan_id: None,
            submitted: Vec::new(),
            has_run: false,
            notifications: NotificationChannel::default(),
            notification_duration,
            telemetry,
        }
    }

    #[cfg(test)]
    pub fn status(&self) -> Status {
        self.status
    }

    #[cfg(test)]
    pub fn result(&self) -> Option<&RunResult> {
        self.result.as_ref()
    }

    #[cfg(test)]
    pub fn error(&self) -> Option<&ReviewError> {
        self.error.as_ref()
    }

    #[cfg(test)]
    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    #[cfg(test)]
    pub fn applied_ids(&self) -> &[String] {
        &self.applied_ids
    }

    pub fn plan_id(&self) -> Option<&str> {
        self.plan_id.as_deref()
    }

    #[cfg(test)]
    pub fn notification(&self) -> Option<&super::notify::Notification> {
        self.notifications.current()
    }

    pub fn notification_deadline(&self) -> Option<Instant> {
        self.notifications.deadline()
    }

    pub fn expire_notification(&mut self, now: Instant) -> bool {
        self.notifications.expire(now)
    }

    /// Retry re-runs the planner, so it is only offered after a failed run.
    /// A failed apply is retried by applying again.
    pub fn can_retry(&self) -> bool {
        self.status == Status::Failed
            && self.error.as_ref().map(ReviewError::phase) == Some(ErrorPhase::Run)
    }

    pub fn can_rescan(&self) -> bool {
        matches!(self.status, Status::HasChanges | Status::Empty)
    }

    /// Enter `Loading`, dropping the previous result, selection and plan id.
    pub fn begin_run(&mut self, reason: RunReason) {
        tracing::debug!(?reason, from = ?self.status, "run started");
        self.status = Status::Loading;
        self.result = None;
        self.error = None;
        self.selection.clear();
        self.plan_id = None;
        match reason {
            RunReason::Open | RunReason::Retry => {
                self.notify(NotificationKind::Info, "Analyzing planner…", ANALYZING_DURATION);
            }
            RunReason::Rescan => {
                self.notify(NotificationKind::Info, "Re-running planner…", RESCAN_DURATION);
            }
            RunReason::AfterApply => {}
        }
    }

    pub fn finish_run(&mut self, outcome: Result<RunResult, PlannerError>) {
        let first_run = !self.has_run;
        self.has_run = true;
        match outcome {
            Ok(result) => {
                tracing::info!(
                    change_count = result.changes.len(),
                    plan_id = result.plan_id.as_deref().unwrap_or("-"),
                    "run completed"
                );
                self.telemetry.track(TelemetryEvent::RunCompleted {
                    change_count: result.change_count,
                });
                self.plan_id = result.plan_id.clone();
                if result.has_changes() {
                    self.selection.replace_with(result.ids());
                    self.status = Status::HasChanges;
                    if !first_run {
                        self.notify_default(NotificationKind::Success, "New plan generated!");
                    }
                } else {
                    self.selection.clear();
                    self.status = Status::Empty;
                    let msg = if first_run {
                        "Great news, nothing needs to move."
                    } else {
                        "Still all clear!"
                    };
                    self.notify_default(NotificationKind::Info, msg);
                }
                self.result = Some(result);
            }
            Err(e) => {
                self.result = None;
                self.selection.clear();
                self.fail(ReviewError::run(&e));
            }
        }
    }

    /// Flip selection of a change in the current result. Ignored while busy,
    /// for unknown ids, and for changes the last apply already committed.
    pub fn toggle(&mut self, id: &str) -> bool {
        if self.status.is_busy() || self.applied_ids.iter().any(|a| a == id) {
            return false;
        }
        let known = self.result.as_ref().is_some_and(|r| r.contains(id));
        if !known {
            return false;
        }
        let on = self.selection.toggle(id);
        tracing::debug!(id, selected = on, count = self.selection.len(), "toggled change");
        true
    }

    /// Selected changes in result order, stamped with the active plan id.
    pub fn selected_changes(&self) -> Vec<ProposedChange> {
        let plan_id = self.plan_id.as_deref();
        self.result
            .iter()
            .flat_map(|r| r.changes.iter())
            .filter(|c| self.selection.contains(&c.id))
            .map(|c| c.stamped(plan_id))
            .collect()
    }

    pub fn request_apply(&mut self) -> ApplyRequest {
        if self.status.is_busy() {
            return ApplyRequest::Ignored;
        }
        if self.selection.is_empty() {
            tracing::debug!("apply with empty selection, closing");
            return ApplyRequest::Close;
        }
        let changes = self.selected_changes();
        if changes.is_empty() {
            tracing::debug!("apply with empty selection, closing");
            return ApplyRequest::Close;
        }
        tracing::debug!(count = changes.len(), "apply started");
        self.status = Status::Applying;
        self.error = None;
        self.submitted = changes.clone();
        ApplyRequest::Submit(changes)
    }

    /// Record the apply outcome. Returns true when a follow-up run is due.
    pub fn finish_apply(&mut self, outcome: Result<ApplyResult, PlannerError>) -> bool {
        let submitted = std::mem::take(&mut self.submitted);
        match outcome {
            Ok(res) => {
                tracing::info!(applied = res.applied, failed = res.failed, "apply completed");
                let ids = res
                    .ids
                    .clone()
                    .unwrap_or_else(|| submitted.iter().map(|c| c.id.clone()).collect());
                self.applied_labels = ids
                    .iter()
                    .filter_map(|id| submitted.iter().find(|c| &c.id == id))
                    .map(|c| c.label.clone())
                    .collect();
                self.applied_ids = ids;
                self.status = Status::Applied;
                self.notify_default(
                    NotificationKind::Success,
                    format!("Scheduled {} {}.", res.applied, plural(res.applied, "change")),
                );
                self.telemetry.track(TelemetryEvent::ApplyCompleted {
                    applied: res.applied,
                    failed: res.failed,
                });
                true
            }
            Err(e) => {
                self.fail(ReviewError::apply(&e));
                false
            }
        }
    }

    /// Close is refused while an apply is in flight.
    pub fn request_close(&self) -> bool {
        self.status != Status::Applying
    }

    pub fn view(&self) -> ReviewView {
        let (changes, zero_reason, suggestions) = match &self.result {
            Some(r) => (
                r.changes.clone(),
                r.zero_reason.clone(),
                r.suggestions.clone().unwrap_or_default(),
            ),
            None => (Vec::new(), None, Vec::new()),
        };
        let selected = changes
            .iter()
            .filter(|c| self.selection.contains(&c.id))
            .cloned()
            .collect();
        ReviewView {
            status: self.status,
            busy: self.status.is_busy(),
            context_summary: self.context.summary(),
            changes,
            selected,
            applied_ids: self.applied_ids.clone(),
            applied_labels: self.applied_labels.clone(),
            error: self.error.as_ref().map(ToString::to_string),
            failed_phase: self.error.as_ref().map(ReviewError::phase),
            notification: self.notifications.current().cloned(),
            plan_id: self.plan_id.clone(),
            zero_reason,
            suggestions,
        }
    }

    fn fail(&mut self, err: ReviewError) {
        tracing::warn!(phase = ?err.phase(), error = %err, "review operation failed");
        self.telemetry.track(TelemetryEvent::Error {
            phase: err.phase(),
            message: err.message().to_string(),
        });
        self.notify_default(NotificationKind::Error, err.message().to_string());
        self.error = Some(err);
        self.status = Status::Failed;
    }

    fn notify(&mut self, kind: NotificationKind, message: impl Into<String>, duration: Duration) {
        self.notifications.show(kind, message, duration);
    }

    fn notify_default(&mut self, kind: NotificationKind, message: impl Into<String>) {
        let duration = self.notification_duration;
        self.notify(kind, message, duration);
    }
}
