//! Review workflow orchestration.
//!
//! This module owns the review state machine, its selection and notification
//! state, and the driver that sequences planner calls for one dialog session.
//! UI/CLI layers send `UiCommand`s in and render the `ReviewView` snapshots
//! that come back.

mod controller;
mod notify;
mod selection;
mod view;
mod workflow;

pub(crate) use controller::{run_controller, CloseReason, ReviewEvent, UiCommand};
#[cfg(test)]
pub(crate) use notify::Notification;
pub use notify::{NotificationKind, DEFAULT_NOTIFICATION_DURATION};
pub use view::{ReviewView, Status, Step};
