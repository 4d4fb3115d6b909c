use crate::errors::MetricsError;
use crate::models::sprint::RawSprint;
use crate::models::ticket::RawTicket;
use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Jira caps agile and search pages at 50 results.
pub const PAGE_SIZE: usize = 50;

pub struct JiraClient {
    client: Client,
    base_url: String,
    email: String,
    api_token: String,
}

impl JiraClient {
    pub fn new(base_url: String, email: String, api_token: String) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            email,
            api_token,
        }
    }

    pub async fn closed_sprints(&self, board: i64) -> Result<Vec<RawSprint>> {
        let path = format!("/rest/agile/1.0/board/{}/sprint?state=closed", board);
        self.paginate(&path, "values").await
    }

    /// Done tickets of one sprint on a board.
    pub async fn sprint_tickets(&self, board: i64, sprint: i64) -> Result<Vec<RawTicket>> {
        let path = format!(
            "/rest/agile/1.0/board/{}/sprint/{}/issue?jql={}",
            board,
            sprint,
            urlencoding::encode("status = Done")
        );
        self.paginate(&path, "issues").await
    }

    pub async fn backlog_tickets(&self, board: i64) -> Result<Vec<RawTicket>> {
        let path = format!("/rest/agile/1.0/board/{}/backlog", board);
        self.paginate(&path, "issues").await
    }

    /// Runs a JQL search, following pages until a short one comes back.
    pub async fn search(&self, jql: &str) -> Result<Vec<RawTicket>> {
        let url = format!("{}/rest/api/3/search", self.base_url);
        let mut tickets = Vec::new();
        let mut start_at = 0;

        loop {
            let body = serde_json::json!({
                "startAt": start_at,
                "maxResults": PAGE_SIZE,
                "validateQuery": "strict",
                "jql": jql,
            });
            let request = self.client.post(&url).json(&body);
            let page: Vec<RawTicket> = self.fetch_page(request, "issues").await?;

            let fetched = page.len();
            tickets.extend(page);
            start_at += PAGE_SIZE;

            if fetched < PAGE_SIZE {
                break;
            }
        }

        Ok(tickets)
    }

    async fn paginate<T: DeserializeOwned>(&self, path: &str, key: &str) -> Result<Vec<T>> {
        let separator = if path.contains('?') { '&' } else { '?' };
        let mut items = Vec::new();
        let mut start_at = 0;

        loop {
            let url = format!(
                "{}{}{}startAt={}&maxResults={}",
                self.base_url, path, separator, start_at, PAGE_SIZE
            );
            let page: Vec<T> = self.fetch_page(self.client.get(&url), key).await?;

            let fetched = page.len();
            items.extend(page);
            start_at += PAGE_SIZE;

            if fetched < PAGE_SIZE {
                break;
            }
        }

        Ok(items)
    }

    async fn fetch_page<T: DeserializeOwned>(&self, request: RequestBuilder, key: &str) -> Result<Vec<T>> {
        let response = request
            .basic_auth(&self.email, Some(&self.api_token))
            .send()
            .await
            .context("Failed to send request to Jira")?;
        let response = check_status(response).await?;

        let mut body = response
            .json::<Value>()
            .await
            .context("Failed to parse Jira response")?;

        let items = body
            .get_mut(key)
            .map(Value::take)
            .with_context(|| format!("Jira response has no '{}' list", key))?;

        serde_json::from_value(items).with_context(|| format!("Unexpected shape of Jira '{}'", key))
    }
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    if status.as_u16() == 401 || status.as_u16() == 403 {
        return Err(MetricsError::JiraAuthFailed(status.as_u16()).into());
    }
    Err(MetricsError::JiraApiError(status.as_u16(), text).into())
}
