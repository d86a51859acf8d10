//! Best-effort usage events.
//!
//! `track` never blocks and never reports failure back to the caller; a lost
//! event is not something the review workflow can observe.

use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPhase {
    Run,
    Apply,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelemetryEvent {
    RunCompleted { change_count: usize },
    ApplyCompleted { applied: usize, failed: usize },
    Error { phase: ErrorPhase, message: String },
}

impl TelemetryEvent {
    pub fn name(&self) -> &'static str {
        match self {
            TelemetryEvent::RunCompleted { .. } => "ai_modal_run_complete",
            TelemetryEvent::ApplyCompleted { .. } => "ai_modal_apply_complete",
            TelemetryEvent::Error { .. } => "ai_modal_error",
        }
    }

    pub fn props(&self) -> Value {
        match self {
            TelemetryEvent::RunCompleted { change_count } => json!({ "change_count": change_count }),
            TelemetryEvent::ApplyCompleted { applied, failed } => {
                json!({ "applied": applied, "failed": failed })
            }
            TelemetryEvent::Error { phase, message } => json!({ "phase": phase, "message": message }),
        }
    }
}

pub trait Telemetry: Send + Sync {
    fn track(&self, event: TelemetryEvent);
}

/// Writes events to the log. Used when no collector endpoint is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTelemetry;

impl Telemetry for TracingTelemetry {
    fn track(&self, event: TelemetryEvent) {
        tracing::info!(
            target: "plan_review::telemetry",
            event = event.name(),
            props = %event.props(),
            "track"
        );
    }
}

/// Posts events to a collector endpoint from a detached task.
pub struct BeaconTelemetry {
    http: Client,
    url: String,
}

impl BeaconTelemetry {
    pub fn new(http: Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }
}

/// `{event, props}` envelope with a millisecond timestamp merged into props.
fn envelope(event: &TelemetryEvent) -> Value {
    let mut props = event.props();
    if let Some(map) = props.as_object_mut() {
        let now_ms = time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
        map.insert("timestamp".into(), json!(now_ms as i64));
    }
    json!({ "event": event.name(), "props": props })
}

impl Telemetry for BeaconTelemetry {
    fn track(&self, event: TelemetryEvent) {
        let Ok(rt) = tokio::runtime::Handle::try_current() else {
            tracing::debug!(event = event.name(), "no runtime, telemetry event dropped");
            return;
        };
        let payload = envelope(&event);
        let http = self.http.clone();
        let url = self.url.clone();
        rt.spawn(async move {
            if let Err(e) = http.post(&url).json(&payload).send().await {
                tracing::debug!(%e, "telemetry post failed");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_names_and_props() {
        let ev = TelemetryEvent::Error {
            phase: ErrorPhase::Apply,
            message: "boom".into(),
        };
        assert_eq!(ev.name(), "ai_modal_error");
        assert_eq!(ev.props(), json!({"phase": "apply", "message": "boom"}));

        let ev = TelemetryEvent::RunCompleted { change_count: 3 };
        assert_eq!(ev.props()["change_count"], 3);
    }

    #[test]
    fn envelope_carries_timestamp() {
        let env = envelope(&TelemetryEvent::ApplyCompleted {
            applied: 1,
            failed: 0,
        });
        assert_eq!(env["event"], "ai_modal_apply_complete");
        assert!(env["props"]["timestamp"].as_i64().unwrap_or_default() > 0);
        assert_eq!(env["props"]["applied"], 1);
    }

    #[test]
    fn beacon_outside_runtime_drops_silently() {
        let sink = BeaconTelemetry::new(Client::new(), "http://127.0.0.1:9/telemetry");
        sink.track(TelemetryEvent::RunCompleted { change_count: 0 });
    }
}
