//! GraphQL execution with retry, rate-limit handling, and pagination.

use std::sync::Mutex;
use std::time::Duration;

use serde_json::{Map, Value, json};
use tracing::{debug, info};

use crate::error::GithubError;
use crate::find::find_object_with_key_mut;
use crate::query::query_synopsis;
use crate::rate_limit::{RateLimitHistory, RateLimitSnapshot};

/// How many rate-limit observations to retain per client.
const RATE_LIMIT_HISTORY: usize = 50;

/// Upstream error types the user can fix themselves, with the hint we give.
const USER_FIXABLE: &[(&str, &str)] = &[("INSUFFICIENT_SCOPES", "Insufficient GitHub token scope.")];

/// Retry knobs. Defaults match observed GitHub behavior: 403s are an ad-hoc
/// unreported rate limit and 502s are flakiness; both go away if waited out.
#[derive(Debug, Clone)]
pub struct Tuning {
    /// Attempt budget for retryable HTTP statuses. Treated as at least 1;
    /// every request gets one attempt regardless.
    pub max_attempts: u32,
    /// Fixed pause between retryable-status attempts.
    pub retry_pause: Duration,
    /// Slack added on top of the upstream-reported rate-limit reset time.
    pub rate_limit_buffer: Duration,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            max_attempts: 200,
            retry_pause: Duration::from_secs(5),
            rate_limit_buffer: Duration::from_secs(10),
        }
    }
}

/// A GitHub GraphQL client bound to one endpoint and token.
///
/// Owns a bounded history of rate-limit observations; a rate-limit backoff
/// sleeps requests issued through this instance without affecting others.
#[derive(Debug)]
pub struct GithubClient {
    endpoint: String,
    token: String,
    http: reqwest::Client,
    tuning: Tuning,
    history: Mutex<RateLimitHistory>,
}

impl GithubClient {
    /// Create a client with default [`Tuning`].
    ///
    /// # Panics
    ///
    /// Panics if the underlying `reqwest::Client` fails to build.
    #[must_use]
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>) -> Self {
        Self::with_tuning(endpoint, token, Tuning::default())
    }

    /// Create a client with explicit retry knobs.
    ///
    /// # Panics
    ///
    /// Panics if the underlying `reqwest::Client` fails to build.
    #[must_use]
    pub fn with_tuning(
        endpoint: impl Into<String>,
        token: impl Into<String>,
        tuning: Tuning,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            token: token.into(),
            http: reqwest::Client::builder()
                .user_agent("skiff/0.1")
                .build()
                .expect("reqwest client should build"),
            tuning,
            history: Mutex::new(RateLimitHistory::new(RATE_LIMIT_HISTORY)),
        }
    }

    /// The most recent rate-limit observation, if any request has completed.
    #[must_use]
    pub fn last_rate_limit(&self) -> Option<RateLimitSnapshot> {
        self.history.lock().expect("rate-limit history lock").last().cloned()
    }

    /// Execute one query, with retrying and error triage.
    ///
    /// Retries 403/502 responses up to the attempt budget and waits out
    /// body-level `RATE_LIMITED` errors indefinitely. Other upstream errors
    /// surface per the [`GithubError`] taxonomy.
    ///
    /// # Errors
    ///
    /// See [`GithubError`]; 401 is fatal immediately.
    pub async fn execute(
        &self,
        query: &str,
        variables: &Map<String, Value>,
    ) -> Result<Value, GithubError> {
        debug!(query = %query_synopsis(query, variables), "execute");
        let body = json!({ "query": query, "variables": variables });
        loop {
            let data = self.raw_execute(&body).await?;
            if Self::is_rate_limited(&data) {
                let wait = self.rate_limit_wait();
                if let Some(snapshot) = self.last_rate_limit() {
                    info!(reset_when = %snapshot.reset_when, "waiting for rate limit to reset");
                }
                tokio::time::sleep(wait).await;
                continue;
            }
            return triage(data);
        }
    }

    /// Execute a query and follow pagination, accumulating every page's
    /// nodes.
    ///
    /// Returns the last raw response (for container-level metadata, with its
    /// node list cleared) and the accumulated nodes. `stop` is evaluated on
    /// each page's node list and short-circuits pagination when it returns
    /// true; useful when items arrive newest-first and the tail falls outside
    /// the wanted window.
    ///
    /// # Errors
    ///
    /// [`GithubError::NoPagination`] when no `pageInfo`-bearing object exists
    /// in the response; otherwise anything [`execute`](Self::execute) raises.
    pub async fn nodes(
        &self,
        query: &str,
        variables: &Map<String, Value>,
        stop: Option<&(dyn Fn(&[Value]) -> bool + Sync)>,
    ) -> Result<(Value, Vec<Value>), GithubError> {
        let mut variables = variables.clone();
        let mut nodes: Vec<Value> = Vec::new();
        loop {
            let mut data = self.execute(query, &variables).await?;

            let mut page_nodes: Vec<Value> = Vec::new();
            let (has_next, end_cursor) = {
                let Some(container) = find_object_with_key_mut(&mut data, "pageInfo") else {
                    return Err(GithubError::NoPagination {
                        synopsis: query_synopsis(query, &variables),
                    });
                };
                if let Some(Value::Array(arr)) = container.get_mut("nodes") {
                    // Taking the array both collects the page and clears the
                    // node list from the returned raw response.
                    page_nodes = std::mem::take(arr);
                }
                let page_info = container.get("pageInfo").cloned().unwrap_or(Value::Null);
                (
                    page_info
                        .get("hasNextPage")
                        .and_then(Value::as_bool)
                        .unwrap_or(false),
                    page_info.get("endCursor").cloned().unwrap_or(Value::Null),
                )
            };

            let stop_now = stop.is_some_and(|f| f(&page_nodes));
            nodes.extend(page_nodes);
            if !has_next || stop_now {
                return Ok((data, nodes));
            }
            variables.insert("after".into(), end_cursor);
        }
    }

    async fn raw_execute(&self, body: &Value) -> Result<Value, GithubError> {
        let mut total_wait = Duration::ZERO;
        let budget = self.tuning.max_attempts.max(1);
        for attempt in 1..=budget {
            let response = self
                .http
                .post(&self.endpoint)
                .bearer_auth(&self.token)
                .json(body)
                .send()
                .await?;
            let status = response.status();
            if status.as_u16() == 401 {
                return Err(GithubError::Unauthorized);
            }
            if matches!(status.as_u16(), 403 | 502) {
                if attempt == budget {
                    return Err(GithubError::RetriesExhausted {
                        status: status.as_u16(),
                        attempts: attempt,
                    });
                }
                debug!(status = status.as_u16(), waited = ?total_wait, "waiting out a retryable status");
                tokio::time::sleep(self.tuning.retry_pause).await;
                total_wait += self.tuning.retry_pause;
                continue;
            }
            if !status.is_success() {
                return Err(GithubError::Status {
                    status: status.as_u16(),
                    message: response.text().await.unwrap_or_default(),
                });
            }
            if let Some(snapshot) = RateLimitSnapshot::from_headers(response.headers()) {
                self.history
                    .lock()
                    .expect("rate-limit history lock")
                    .record(snapshot);
            }
            return Ok(response.json().await?);
        }
        unreachable!("attempt loop always returns")
    }

    fn is_rate_limited(data: &Value) -> bool {
        data.get("errors")
            .and_then(Value::as_array)
            .and_then(|errors| errors.first())
            .and_then(|err| err.get("type"))
            .and_then(Value::as_str)
            == Some("RATE_LIMITED")
    }

    /// How long to sleep before retrying a rate-limited query: time until the
    /// upstream-reported reset, plus a slack buffer.
    fn rate_limit_wait(&self) -> Duration {
        let until_reset = self
            .last_rate_limit()
            .map_or(0, |snapshot| snapshot.seconds_until_reset().max(0));
        Duration::from_secs(u64::try_from(until_reset).unwrap_or(0)) + self.tuning.rate_limit_buffer
    }
}

/// Surface upstream error payloads as typed errors; pass clean data through.
fn triage(data: Value) -> Result<Value, GithubError> {
    if let Some(message) = data.get("message").and_then(Value::as_str) {
        return Err(GithubError::Query(message.to_owned()));
    }
    if let Some(err) = data
        .get("errors")
        .and_then(Value::as_array)
        .and_then(|errors| errors.first())
    {
        let message = err
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_owned();
        let err_type = err.get("type").and_then(Value::as_str);
        if let Some((_, hint)) = USER_FIXABLE.iter().find(|(t, _)| Some(*t) == err_type) {
            return Err(GithubError::TokenScope { hint, message });
        }
        let mut text = message;
        if let Some(path) = err.get("path").and_then(Value::as_array) {
            let joined = path
                .iter()
                .map(|p| p.as_str().map_or_else(|| p.to_string(), str::to_owned))
                .collect::<Vec<_>>()
                .join(".");
            text.push_str(&format!(" @{joined}"));
        }
        if let Some(loc) = err
            .get("locations")
            .and_then(Value::as_array)
            .and_then(|locs| locs.first())
        {
            let line = loc.get("line").and_then(Value::as_u64).unwrap_or(0);
            let column = loc.get("column").and_then(Value::as_u64).unwrap_or(0);
            text.push_str(&format!(", line {line} column {column}"));
        }
        return Err(GithubError::Query(text));
    }
    if data.get("data").is_some_and(Value::is_null) {
        return Err(GithubError::NullData);
    }
    Ok(data)
}
