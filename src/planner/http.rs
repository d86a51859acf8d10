use super::{Planner, PlannerError};
use crate::model::{ApplyResult, ProposedChange, ReviewConfig, ReviewContext, RunResult};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ApplyRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    plan_id: Option<&'a str>,
    changes: &'a [ProposedChange],
}

/// Planner service reached over JSON/HTTP.
///
/// `POST {base}/run` receives the review context and answers with a run
/// result; `POST {base}/apply` receives the plan id and the selected changes.
pub struct HttpPlanner {
    http: Client,
    base_url: String,
    context: ReviewContext,
}

impl HttpPlanner {
    pub fn new(cfg: &ReviewConfig) -> Result<Self, PlannerError> {
        let http = Client::builder()
            .user_agent(cfg.user_agent.clone())
            .timeout(cfg.request_timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            context: cfg.context.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, PlannerError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        tracing::debug!(%url, "planner request");
        let resp = self.http.post(&url).json(body).send().await?;
        decode(resp).await
    }
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, PlannerError> {
    let status = resp.status();
    let body = resp.text().await?;
    if !status.is_success() {
        return Err(error_from_body(status.as_u16(), &body));
    }
    Ok(serde_json::from_str(&body)?)
}

/// Pull a message out of an error response: JSON `detail` or `error`, else the
/// raw body, else just the status.
fn error_from_body(status: u16, body: &str) -> PlannerError {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        let field = ["detail", "error"]
            .iter()
            .find_map(|key| value.get(*key).and_then(|v| v.as_str()))
            .filter(|s| !s.trim().is_empty());
        if let Some(msg) = field {
            return PlannerError::rejected(msg);
        }
    }
    let body = body.trim();
    if body.is_empty() {
        PlannerError::Status { status }
    } else {
        PlannerError::rejected(body)
    }
}

#[async_trait]
impl Planner for HttpPlanner {
    async fn run(&self) -> Result<RunResult, PlannerError> {
        self.post("run", &self.context).await
    }

    async fn apply(
        &self,
        plan_id: Option<String>,
        changes: Vec<ProposedChange>,
    ) -> Result<ApplyResult, PlannerError> {
        let body = ApplyRequest {
            plan_id: plan_id.as_deref(),
            changes: &changes,
        };
        self.post("apply", &body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChangeKind;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: String) -> ReviewConfig {
        ReviewConfig {
            base_url,
            context: ReviewContext {
                window_start: "2024-09-02".into(),
                window_end: "2024-09-16".into(),
                people: vec!["Ada".into()],
            },
            min_loading: Duration::from_millis(450),
            notification_duration: Duration::from_millis(2800),
            request_timeout: Duration::from_secs(5),
            telemetry_url: None,
            user_agent: "plan-review/test".into(),
        }
    }

    #[test]
    fn error_body_prefers_detail_then_error_then_text() {
        let e = error_from_body(500, r#"{"detail": "Failed to suggest plan"}"#);
        assert_eq!(e.to_string(), "Failed to suggest plan");
        let e = error_from_body(400, r#"{"error": "bad window"}"#);
        assert_eq!(e.to_string(), "bad window");
        let e = error_from_body(502, "upstream down\n");
        assert_eq!(e.to_string(), "upstream down");
        let e = error_from_body(503, "");
        assert_eq!(e.to_string(), "HTTP 503");
    }

    #[tokio::test]
    async fn run_posts_context_and_decodes_result() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ai/run"))
            .and(body_partial_json(serde_json::json!({
                "windowStart": "2024-09-02",
                "people": ["Ada"],
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "changeCount": 1,
                "changes": [{"id": "c1", "kind": "add", "label": "Add reading"}],
                "planId": "p1",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let planner = HttpPlanner::new(&config(format!("{}/ai/", server.uri()))).expect("client");
        let result = planner.run().await.expect("run");
        assert_eq!(result.change_count, 1);
        assert_eq!(result.changes[0].kind, ChangeKind::Add);
        assert_eq!(result.plan_id.as_deref(), Some("p1"));
    }

    #[tokio::test]
    async fn apply_sends_plan_id_with_changes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/apply"))
            .and(body_partial_json(serde_json::json!({
                "planId": "p1",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "applied": 1,
                "failed": 0,
                "ids": ["a"],
            })))
            .expect(1)
            .mount(&server)
            .await;

        let change = ProposedChange {
            id: "a".into(),
            kind: ChangeKind::Add,
            label: "A".into(),
            when: None,
            before: None,
            after: None,
            child: None,
            subject: None,
            plan_id: Some("p1".into()),
        };
        let planner = HttpPlanner::new(&config(server.uri())).expect("client");
        let res = planner
            .apply(Some("p1".into()), vec![change])
            .await
            .expect("apply");
        assert_eq!(res.applied, 1);
        assert_eq!(res.ids, Some(vec!["a".to_string()]));
    }

    #[tokio::test]
    async fn apply_rejection_surfaces_server_detail() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/apply"))
            .respond_with(
                ResponseTemplate::new(500)
                    .set_body_json(serde_json::json!({"detail": "Failed to approve changes: conflict"})),
            )
            .mount(&server)
            .await;

        let planner = HttpPlanner::new(&config(server.uri())).expect("client");
        let err = planner.apply(None, Vec::new()).await.expect_err("should reject");
        assert_eq!(
            err.message().as_deref(),
            Some("Failed to approve changes: conflict")
        );
    }
}
