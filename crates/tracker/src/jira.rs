use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, warn};

use taskrelay_core::config::TrackerConfig;
use taskrelay_core::domain::issue::{CreatedIssue, Epic, EpicCatalog, IssueRequest};
use taskrelay_core::tracker::{IssueTracker, TrackerError};

use crate::payload::{CreateIssueBody, CreatedIssueResponse, ErrorBody, SearchResponse};

const DETAIL_LIMIT: usize = 300;

/// Jira Cloud REST v3 client. `api_base_url` points at `.../rest/api/3`.
#[derive(Clone, Debug)]
pub struct JiraClient {
    http: Client,
    api_base_url: String,
    project_key: String,
    issue_type: String,
    auth_token: SecretString,
}

impl JiraClient {
    pub fn from_config(config: &TrackerConfig) -> Result<Self, TrackerError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| TrackerError::Setup(error.to_string()))?;

        Ok(Self {
            http,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            project_key: config.project_key.clone(),
            issue_type: config.issue_type.clone(),
            auth_token: config.auth_token.clone(),
        })
    }

    fn epic_query(&self) -> String {
        format!("project = \"{}\" AND issuetype = Epic", self.project_key)
    }

    fn authorization(&self) -> String {
        format!("Basic {}", self.auth_token.expose_secret())
    }
}

#[async_trait]
impl IssueTracker for JiraClient {
    async fn list_epics(&self) -> Result<EpicCatalog, TrackerError> {
        let url = format!("{}/search", self.api_base_url);
        let jql = self.epic_query();

        let response = self
            .http
            .get(&url)
            .header(AUTHORIZATION, self.authorization())
            .header(ACCEPT, "application/json")
            .query(&[("jql", jql.as_str()), ("fields", "summary")])
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let error = status_error(status, response).await;
            warn!(
                event_name = "tracker.search_rejected",
                status = status.as_u16(),
                error = %error,
                "epic search was rejected"
            );
            return Err(error);
        }

        let body: SearchResponse =
            response.json().await.map_err(|error| TrackerError::Decode(error.to_string()))?;
        let catalog = EpicCatalog::from_epics(
            body.issues.into_iter().map(|issue| Epic::new(issue.id, issue.fields.summary)),
        );

        debug!(
            event_name = "tracker.search_completed",
            project_key = %self.project_key,
            epic_count = catalog.len(),
            "epic search completed"
        );
        Ok(catalog)
    }

    async fn create_issue(&self, request: &IssueRequest) -> Result<CreatedIssue, TrackerError> {
        let url = format!("{}/issue", self.api_base_url);
        let body = CreateIssueBody::new(&self.project_key, &self.issue_type, request);

        let response = self
            .http
            .post(&url)
            .header(AUTHORIZATION, self.authorization())
            .header(ACCEPT, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status != StatusCode::CREATED {
            let error = status_error(status, response).await;
            warn!(
                event_name = "tracker.create_rejected",
                status = status.as_u16(),
                error = %error,
                "issue creation was rejected"
            );
            return Err(error);
        }

        let created: CreatedIssueResponse =
            response.json().await.map_err(|error| TrackerError::Decode(error.to_string()))?;
        if created.key.trim().is_empty() {
            return Err(TrackerError::Decode("created issue has an empty key".to_string()));
        }

        debug!(event_name = "tracker.create_completed", issue_key = %created.key, "issue created");
        Ok(CreatedIssue { key: created.key })
    }
}

fn transport_error(error: reqwest::Error) -> TrackerError {
    // reqwest errors carry the URL, which never holds credentials here.
    TrackerError::Transport(error.to_string())
}

async fn status_error(status: StatusCode, response: Response) -> TrackerError {
    let raw = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorBody>(&raw)
        .ok()
        .and_then(|body| body.summarize())
        .unwrap_or_else(|| raw.chars().take(DETAIL_LIMIT).collect());

    TrackerError::UnexpectedStatus { status: status.as_u16(), detail }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use axum::extract::{Query, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use taskrelay_core::config::TrackerConfig;
    use taskrelay_core::domain::issue::{EpicId, IssueRequest};
    use taskrelay_core::tracker::{IssueTracker, TrackerError};

    use super::JiraClient;

    #[derive(Clone, Default)]
    struct Recorded {
        queries: Arc<Mutex<Vec<HashMap<String, String>>>>,
        bodies: Arc<Mutex<Vec<Value>>>,
        auth_headers: Arc<Mutex<Vec<String>>>,
    }

    impl Recorded {
        fn note_auth(&self, headers: &HeaderMap) {
            let value = headers
                .get("authorization")
                .and_then(|value| value.to_str().ok())
                .unwrap_or_default()
                .to_string();
            self.auth_headers.lock().expect("lock").push(value);
        }
    }

    async fn spawn_fake(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let address = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("fake tracker");
        });
        format!("http://{address}/rest/api/3/")
    }

    fn config(api_base_url: String, timeout_secs: u64) -> TrackerConfig {
        TrackerConfig {
            api_base_url,
            web_base_url: "https://acme.atlassian.net".to_string(),
            project_key: "PROJ".to_string(),
            issue_type: "Task".to_string(),
            auth_token: "dXNlckBleGFtcGxlLmNvbTp0b2tlbg==".to_string().into(),
            timeout_secs,
        }
    }

    fn request() -> IssueRequest {
        IssueRequest {
            summary: "Fix login bug".to_owned(),
            description: "Button disabled on Safari".to_owned(),
            assignee_id: "acc-me".to_owned(),
            epic_id: EpicId("10".to_owned()),
        }
    }

    fn fake_tracker(recorded: Recorded, search_status: StatusCode, create_status: StatusCode) -> Router {
        Router::new()
            .route(
                "/rest/api/3/search",
                get(
                    move |State(recorded): State<Recorded>,
                          headers: HeaderMap,
                          Query(query): Query<HashMap<String, String>>| async move {
                        recorded.note_auth(&headers);
                        recorded.queries.lock().expect("lock").push(query);
                        let body = if search_status.is_success() {
                            json!({ "issues": [
                                { "id": "10", "key": "PROJ-1", "fields": { "summary": "Q3 Platform" } },
                                { "id": "11", "key": "PROJ-2", "fields": { "summary": "Billing" } },
                                { "id": "12", "key": "PROJ-3", "fields": {} }
                            ]})
                        } else {
                            json!({ "errorMessages": ["The value 'PROJ' does not exist"] })
                        };
                        (search_status, Json(body))
                    },
                ),
            )
            .route(
                "/rest/api/3/issue",
                post(
                    move |State(recorded): State<Recorded>,
                          headers: HeaderMap,
                          Json(body): Json<Value>| async move {
                        recorded.note_auth(&headers);
                        recorded.bodies.lock().expect("lock").push(body);
                        let reply = if create_status == StatusCode::CREATED {
                            json!({ "id": "10007", "key": "PROJ-7" })
                        } else {
                            json!({ "errors": { "assignee": "User cannot be assigned" } })
                        };
                        (create_status, Json(reply))
                    },
                ),
            )
            .with_state(recorded)
    }

    #[tokio::test]
    async fn list_epics_queries_project_epics_with_basic_auth() {
        let recorded = Recorded::default();
        let base =
            spawn_fake(fake_tracker(recorded.clone(), StatusCode::OK, StatusCode::CREATED)).await;
        let client = JiraClient::from_config(&config(base, 5)).expect("client");

        let epics = client.list_epics().await.expect("epics");

        assert_eq!(epics.len(), 3);
        assert_eq!(epics.title(&EpicId("10".to_owned())), Some("Q3 Platform"));
        assert_eq!(epics.title(&EpicId("12".to_owned())), Some("12"));
        let queries = recorded.queries.lock().expect("lock").clone();
        assert_eq!(
            queries[0].get("jql").map(String::as_str),
            Some("project = \"PROJ\" AND issuetype = Epic")
        );
        assert_eq!(queries[0].get("fields").map(String::as_str), Some("summary"));
        assert_eq!(
            recorded.auth_headers.lock().expect("lock")[0],
            "Basic dXNlckBleGFtcGxlLmNvbTp0b2tlbg=="
        );
    }

    #[tokio::test]
    async fn list_epics_maps_non_success_status_to_failure() {
        let recorded = Recorded::default();
        let base = spawn_fake(fake_tracker(recorded, StatusCode::BAD_REQUEST, StatusCode::CREATED))
            .await;
        let client = JiraClient::from_config(&config(base, 5)).expect("client");

        let error = client.list_epics().await.expect_err("search should fail");

        assert_eq!(
            error,
            TrackerError::UnexpectedStatus {
                status: 400,
                detail: "The value 'PROJ' does not exist".to_owned()
            }
        );
    }

    #[tokio::test]
    async fn create_issue_posts_structured_payload_and_returns_key() {
        let recorded = Recorded::default();
        let base =
            spawn_fake(fake_tracker(recorded.clone(), StatusCode::OK, StatusCode::CREATED)).await;
        let client = JiraClient::from_config(&config(base, 5)).expect("client");

        let created = client.create_issue(&request()).await.expect("created");

        assert_eq!(created.key, "PROJ-7");
        assert_eq!(
            created.browse_url("https://acme.atlassian.net"),
            "https://acme.atlassian.net/browse/PROJ-7"
        );
        let bodies = recorded.bodies.lock().expect("lock").clone();
        assert_eq!(bodies.len(), 1);
        let fields = &bodies[0]["fields"];
        assert_eq!(fields["project"]["key"], "PROJ");
        assert_eq!(fields["summary"], "Fix login bug");
        assert_eq!(
            fields["description"]["content"][0]["content"][0]["text"],
            "Button disabled on Safari"
        );
        assert_eq!(fields["issuetype"]["name"], "Task");
        assert_eq!(fields["assignee"]["id"], "acc-me");
        assert_eq!(fields["parent"]["id"], "10");
    }

    #[tokio::test]
    async fn create_issue_treats_any_status_but_created_as_failure() {
        for status in [StatusCode::OK, StatusCode::BAD_REQUEST, StatusCode::INTERNAL_SERVER_ERROR] {
            let recorded = Recorded::default();
            let base = spawn_fake(fake_tracker(recorded, StatusCode::OK, status)).await;
            let client = JiraClient::from_config(&config(base, 5)).expect("client");

            let error = client.create_issue(&request()).await.expect_err("create should fail");

            assert!(
                matches!(error, TrackerError::UnexpectedStatus { status: code, .. } if code == status.as_u16()),
                "unexpected error for {status}: {error:?}"
            );
        }
    }

    #[tokio::test]
    async fn unreachable_tracker_is_a_transport_failure() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let address = listener.local_addr().expect("local addr");
        drop(listener);
        let client = JiraClient::from_config(&config(format!("http://{address}/rest/api/3"), 5))
            .expect("client");

        let error = client.list_epics().await.expect_err("nothing is listening");

        assert!(matches!(error, TrackerError::Transport(_)), "got {error:?}");
    }

    #[tokio::test]
    async fn slow_tracker_is_bounded_by_the_configured_timeout() {
        let router = Router::new().route(
            "/rest/api/3/search",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!({ "issues": [] }))
            }),
        );
        let base = spawn_fake(router).await;
        let client = JiraClient::from_config(&config(base, 1)).expect("client");

        let error = client.list_epics().await.expect_err("request should time out");

        assert!(matches!(error, TrackerError::Transport(_)), "got {error:?}");
    }

    #[test]
    fn debug_output_hides_the_credential() {
        let client =
            JiraClient::from_config(&config("https://acme.atlassian.net/rest/api/3".into(), 5))
                .expect("client");
        let rendered = format!("{client:?}");
        assert!(!rendered.contains("dXNlckBleGFtcGxlLmNvbTp0b2tlbg=="));
    }
}
