use std::sync::Arc;
use std::thread;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::Value;

use crate::logging;
use crate::metrics::Metrics;
use crate::paginate::{IssueSource, SubResource};
use crate::schema::RequestPlan;

#[derive(Debug, thiserror::Error)]
pub enum JiraError {
    #[error("jira request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("jira returned HTTP {status}: {body}")]
    Http {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("failed to decode jira response: {source}; body: {body}")]
    Decode {
        source: serde_json::Error,
        body: String,
    },
    #[error("invalid JIRA_BASE_URL '{0}'")]
    InvalidBaseUrl(String),
}

/// Credentials attached to every request, passed through unexamined.
#[derive(Clone, PartialEq, Eq)]
pub enum Auth {
    Anonymous,
    Basic { email: String, api_token: String },
    Bearer(String),
}

impl Auth {
    fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        match self {
            Auth::Anonymous => request,
            Auth::Basic { email, api_token } => request.basic_auth(email, Some(api_token)),
            Auth::Bearer(token) => request.bearer_auth(token),
        }
    }
}

impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Auth::Anonymous => f.write_str("Anonymous"),
            Auth::Basic { email, .. } => write!(f, "Basic({email}, ***)"),
            Auth::Bearer(_) => f.write_str("Bearer(***)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct JiraClient {
    pub base_url: String,
    pub auth: Auth,
    pub http: Client,
    max_retries: usize,
    metrics: Arc<Metrics>,
}

impl JiraClient {
    pub fn new(base_url: String, auth: Auth) -> Result<Self, JiraError> {
        Self::new_with_metrics(base_url, auth, Arc::new(Metrics::new()))
    }

    pub fn new_with_metrics(
        base_url: String,
        auth: Auth,
        metrics: Arc<Metrics>,
    ) -> Result<Self, JiraError> {
        let http = Client::builder().build()?;
        let normalized_base_url = normalize_base_url(&base_url)?;
        Ok(Self {
            base_url: normalized_base_url,
            auth,
            http,
            max_retries: 3,
            metrics,
        })
    }

    fn request_with_retry<F>(&self, mut send: F) -> Result<Response, JiraError>
    where
        F: FnMut() -> Result<Response, reqwest::Error>,
    {
        for attempt in 0..=self.max_retries {
            self.metrics.inc_api_request();
            let response = match send() {
                Ok(resp) => resp,
                Err(err) => {
                    logging::warn(format!(
                        "jira request transport error on attempt {}: {}",
                        attempt + 1,
                        err
                    ));
                    return Err(JiraError::Request(err));
                }
            };

            if !is_retryable(response.status()) || attempt == self.max_retries {
                if !response.status().is_success() {
                    logging::warn(format!(
                        "jira request completed with status {} after {} attempt(s)",
                        response.status(),
                        attempt + 1
                    ));
                }
                return Ok(response);
            }

            let wait = retry_after_or_backoff(&response, attempt);
            logging::debug(format!(
                "jira retryable status {} attempt {} waiting {:?}",
                response.status(),
                attempt + 1,
                wait
            ));
            self.metrics.inc_retry();
            thread::sleep(wait);
        }

        unreachable!("retry loop should always return");
    }

    fn get_json<T, Q>(&self, url: &str, query: &Q) -> Result<T, JiraError>
    where
        T: serde::de::DeserializeOwned,
        Q: serde::Serialize + ?Sized,
    {
        let response = self.request_with_retry(|| {
            self.auth
                .apply(self.http.get(url))
                .query(query)
                .send()
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(JiraError::Http { status, body });
        }

        let body = response.text()?;
        serde_json::from_str(&body).map_err(|source| {
            let short_body = if body.len() > 1000 {
                format!("{}...", truncate_at_char_boundary(&body, 1000))
            } else {
                body.clone()
            };
            logging::warn(format!("failed decoding jira response from {}: {}", url, short_body));
            JiraError::Decode {
                source,
                body: short_body,
            }
        })
    }

    pub fn search_issues(
        &self,
        jql: &str,
        plan: &RequestPlan,
        start_at: usize,
        max_results: usize,
    ) -> Result<Vec<Value>, JiraError> {
        let url = format!("{}/rest/api/2/search", self.base_url);
        let mut query = vec![
            ("jql", jql.to_string()),
            ("startAt", start_at.to_string()),
            ("maxResults", max_results.to_string()),
        ];
        if !plan.fields.is_empty() {
            query.push(("fields", plan.fields_param()));
        }
        if !plan.expand.is_empty() {
            query.push(("expand", plan.expand_param()));
        }

        let payload: SearchResponse = self.get_json(&url, &query)?;
        self.metrics.add_records_fetched(payload.issues.len() as u64);
        Ok(payload.issues)
    }

    pub fn get_worklogs(&self, issue_key: &str) -> Result<Vec<Value>, JiraError> {
        let url = format!("{}/rest/api/2/issue/{}/worklog", self.base_url, issue_key);
        let payload: WorklogResponse = self.get_json(&url, &[] as &[(&str, &str)])?;
        self.metrics.inc_sub_resource_fetch();
        Ok(payload.worklogs)
    }

    /// SLA overview from the Time to SLA add-on REST service.
    pub fn get_sla_overview(&self, issue_key: &str) -> Result<Vec<Value>, JiraError> {
        let url = format!(
            "{}/rest/tts-api/latest/sla/overview/{}",
            self.base_url, issue_key
        );
        let payload: Vec<Value> = self.get_json(&url, &[] as &[(&str, &str)])?;
        self.metrics.inc_sub_resource_fetch();
        Ok(payload)
    }
}

impl IssueSource for JiraClient {
    fn search(
        &self,
        query: &str,
        plan: &RequestPlan,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Value>, JiraError> {
        self.search_issues(query, plan, offset, limit)
    }

    fn fetch_sub_resource(
        &self,
        issue_key: &str,
        kind: SubResource,
    ) -> Result<Vec<Value>, JiraError> {
        match kind {
            SubResource::Worklogs => self.get_worklogs(issue_key),
            SubResource::SlaOverview => self.get_sla_overview(issue_key),
        }
    }
}

fn truncate_at_char_boundary(body: &str, max: usize) -> &str {
    let mut end = max.min(body.len());
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}

fn normalize_base_url(raw: &str) -> Result<String, JiraError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(JiraError::InvalidBaseUrl(raw.to_string()));
    }

    let mut candidate = trimmed.to_string();

    if candidate.starts_with("https://https//") {
        candidate = candidate.replacen("https://https//", "https://", 1);
    } else if candidate.starts_with("http://http//") {
        candidate = candidate.replacen("http://http//", "http://", 1);
    }

    if candidate.starts_with("https//") {
        candidate = format!("https://{}", candidate.trim_start_matches("https//"));
    } else if candidate.starts_with("http//") {
        candidate = format!("http://{}", candidate.trim_start_matches("http//"));
    } else if !candidate.starts_with("https://") && !candidate.starts_with("http://") {
        candidate = format!("https://{candidate}");
    }

    let parsed =
        reqwest::Url::parse(&candidate).map_err(|_| JiraError::InvalidBaseUrl(raw.to_string()))?;
    Ok(parsed.as_str().trim_end_matches('/').to_string())
}

fn is_retryable(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn retry_after_or_backoff(response: &Response, attempt: usize) -> Duration {
    if let Some(header) = response.headers().get("Retry-After") {
        if let Ok(value) = header.to_str() {
            if let Ok(seconds) = value.parse::<u64>() {
                return Duration::from_secs(seconds.min(30));
            }
        }
    }

    let seconds = 1_u64 << attempt.min(4);
    Duration::from_secs(seconds)
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    issues: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct WorklogResponse {
    #[serde(default)]
    worklogs: Vec<Value>,
}
