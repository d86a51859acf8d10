//! Review session driver.
//!
//! Owns the workflow state machine for one dialog lifetime and sequences
//! planner calls, the minimum loading floor, notification expiry and UI
//! commands on a single task. Presentation layers only see `ReviewEvent`s.

use super::view::ReviewView;
use super::workflow::{ApplyRequest, RunReason, WorkflowController};
use crate::model::{ApplyResult, ProposedChange, ReviewConfig, RunResult};
use crate::planner::{Planner, PlannerError};
use crate::telemetry::Telemetry;
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Commands emitted by UI layers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum UiCommand {
    Toggle(String),
    /// Retry after a failure.
    Run,
    /// Ask the planner again from the review or all-clear screen.
    Rescan,
    Apply,
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The operator closed the dialog.
    Dismissed,
    /// Apply was pressed with nothing selected.
    NothingToApply,
    /// Every command sender went away.
    Disconnected,
}

#[derive(Debug, Clone)]
pub enum ReviewEvent {
    Updated(Box<ReviewView>),
    /// Sent exactly once, as the last event of a session.
    Closed(CloseReason),
}

/// Internal handle for an in-flight run.
struct RunCtx {
    started: Instant,
    handle: Option<JoinHandle<Result<RunResult, PlannerError>>>,
    /// Outcome held back until the loading floor has elapsed.
    settled: Option<Result<RunResult, PlannerError>>,
}

/// Spawn a planner run and return its handle.
fn start_run(planner: &Arc<dyn Planner>) -> RunCtx {
    let planner = planner.clone();
    let handle = tokio::spawn(async move { planner.run().await });
    RunCtx {
        started: Instant::now(),
        handle: Some(handle),
        settled: None,
    }
}

fn start_apply(
    planner: &Arc<dyn Planner>,
    plan_id: Option<String>,
    changes: Vec<ProposedChange>,
) -> JoinHandle<Result<ApplyResult, PlannerError>> {
    let planner = planner.clone();
    tokio::spawn(async move { planner.apply(plan_id, changes).await })
}

fn publish(event_tx: &UnboundedSender<ReviewEvent>, wf: &WorkflowController) {
    let _ = event_tx.send(ReviewEvent::Updated(Box::new(wf.view())));
}

/// Drive one review session until it closes.
///
/// A run starts immediately. When the session closes, in-flight planner
/// tasks are detached rather than aborted: their outcome is simply never
/// observed. The loading floor and notification timers die with the loop.
pub(crate) async fn run_controller(
    cfg: &ReviewConfig,
    planner: Arc<dyn Planner>,
    telemetry: Arc<dyn Telemetry>,
    event_tx: UnboundedSender<ReviewEvent>,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
) -> CloseReason {
    let mut wf = WorkflowController::new(
        cfg.context.clone(),
        cfg.notification_duration,
        telemetry,
    );
    wf.begin_run(RunReason::Open);
    let mut run_ctx = Some(start_run(&planner));
    let mut apply_handle: Option<JoinHandle<Result<ApplyResult, PlannerError>>> = None;
    publish(&event_tx, &wf);

    let reason = loop {
        // Deadlines are read up front so the select branches don't borrow state
        // that the handlers mutate.
        let floor_at = run_ctx
            .as_ref()
            .filter(|ctx| ctx.settled.is_some())
            .map(|ctx| ctx.started + cfg.min_loading);
        let hide_at = wf.notification_deadline();

        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(UiCommand::Toggle(id)) => {
                        wf.toggle(&id);
                    }
                    Some(UiCommand::Run) => {
                        if wf.can_retry() {
                            wf.begin_run(RunReason::Retry);
                            run_ctx = Some(start_run(&planner));
                        }
                    }
                    Some(UiCommand::Rescan) => {
                        if wf.can_rescan() {
                            wf.begin_run(RunReason::Rescan);
                            run_ctx = Some(start_run(&planner));
                        }
                    }
                    Some(UiCommand::Apply) => match wf.request_apply() {
                        ApplyRequest::Ignored => {}
                        ApplyRequest::Close => break CloseReason::NothingToApply,
                        ApplyRequest::Submit(changes) => {
                            let plan_id = wf.plan_id().map(str::to_string);
                            apply_handle = Some(start_apply(&planner, plan_id, changes));
                        }
                    },
                    Some(UiCommand::Close) => {
                        if wf.request_close() {
                            break CloseReason::Dismissed;
                        }
                        tracing::debug!("close ignored while applying");
                    }
                    None => break CloseReason::Disconnected,
                }
            }
            // Do not take the JoinHandle before this branch wins; otherwise it can be dropped
            // if another select branch is chosen, and we'll never observe completion.
            maybe_done = async {
                if let Some(ctx) = &mut run_ctx {
                    if let Some(h) = ctx.handle.as_mut() {
                        return Some(h.await);
                    }
                }
                futures::future::pending().await
            } => {
                if let (Some(join_res), Some(ctx)) = (maybe_done, run_ctx.as_mut()) {
                    ctx.handle.take();
                    ctx.settled = Some(join_res.map_err(PlannerError::from).and_then(|r| r));
                }
                // Nothing visible changed yet; the floor branch publishes.
                continue;
            }
            _ = async {
                match floor_at {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => futures::future::pending().await,
                }
            } => {
                if let Some(outcome) = run_ctx.take().and_then(|ctx| ctx.settled) {
                    wf.finish_run(outcome);
                }
            }
            done = async {
                match apply_handle.as_mut() {
                    Some(h) => h.await,
                    None => futures::future::pending().await,
                }
            } => {
                apply_handle = None;
                let outcome = done.map_err(PlannerError::from).and_then(|r| r);
                if wf.finish_apply(outcome) {
                    // Let presenters see the applied state before the refresh starts.
                    publish(&event_tx, &wf);
                    wf.begin_run(RunReason::AfterApply);
                    run_ctx = Some(start_run(&planner));
                }
            }
            _ = async {
                match hide_at {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => futures::future::pending().await,
                }
            } => {
                wf.expire_notification(Instant::now());
            }
        }

        publish(&event_tx, &wf);
    };

    tracing::info!(?reason, "review session closed");
    let _ = event_tx.send(ReviewEvent::Closed(reason));
    reason
}
