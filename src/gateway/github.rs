//! GitHub REST client for approval checklist issues.

use std::time::Duration;

use async_trait::async_trait;
use preorder_kernel::settings::{GatewaySettings, GithubSettings};
use serde::Deserialize;
use serde_json::json;
use time::OffsetDateTime;

use super::{error_body, http_client, ApprovalIssue, ApprovalTracker, GatewayError, NewIssue};

const SERVICE: &str = "github";
const PER_PAGE: usize = 100;
const ACCEPT: &str = "application/vnd.github+json";

pub struct GithubTracker {
    client: reqwest::Client,
    issues_url: String,
    token: String,
    label: String,
    timeout: Duration,
}

impl GithubTracker {
    pub fn new(github: &GithubSettings, gateway: &GatewaySettings) -> Result<Self, GatewayError> {
        let (Some(token), Some(repository)) = (&github.token, &github.repository) else {
            return Err(GatewayError::NotConfigured {
                service: SERVICE,
                missing: "github.token and github.repository",
            });
        };

        let Some((owner, repo)) = repository
            .trim()
            .split_once('/')
            .filter(|(owner, repo)| !owner.is_empty() && !repo.is_empty() && !repo.contains('/'))
        else {
            return Err(GatewayError::NotConfigured {
                service: SERVICE,
                missing: "github.repository in owner/repo form",
            });
        };

        let issues_url = format!(
            "{}/repos/{owner}/{repo}/issues",
            github.api_base.trim_end_matches('/')
        );
        tracing::info!(repository = %repository, label = %github.approval_label, "github tracker configured");

        Ok(Self {
            client: http_client(SERVICE, gateway.timeout())?,
            issues_url,
            token: token.clone(),
            label: github.approval_label.clone(),
            timeout: gateway.timeout(),
        })
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header(reqwest::header::ACCEPT, ACCEPT)
            .bearer_auth(&self.token)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, GatewayError> {
        let response = request
            .send()
            .await
            .map_err(|err| GatewayError::from_reqwest(SERVICE, self.timeout, err))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = error_body(response).await;
            tracing::warn!(status, body = %body, "github request rejected");
            return Err(GatewayError::Rejected {
                service: SERVICE,
                status,
                body,
            });
        }
        Ok(response)
    }

    async fn decode<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, GatewayError> {
        response
            .json()
            .await
            .map_err(|err| GatewayError::from_reqwest(SERVICE, self.timeout, err))
    }
}

#[async_trait]
impl ApprovalTracker for GithubTracker {
    async fn list_open_issues(&self) -> Result<Vec<ApprovalIssue>, GatewayError> {
        let mut issues = Vec::new();
        let per_page = PER_PAGE.to_string();

        for page in 1.. {
            let page_number = page.to_string();
            let request = self.request(reqwest::Method::GET, &self.issues_url).query(&[
                ("state", "open"),
                ("labels", self.label.as_str()),
                ("per_page", per_page.as_str()),
                ("page", page_number.as_str()),
            ]);
            let batch: Vec<IssuePayload> = self.decode(self.send(request).await?).await?;
            let batch_len = batch.len();

            issues.extend(
                batch
                    .into_iter()
                    .filter(|issue| issue.pull_request.is_none())
                    .map(IssuePayload::into_issue),
            );

            if batch_len < PER_PAGE {
                break;
            }
        }

        tracing::info!(count = issues.len(), label = %self.label, "github approval issues listed");
        Ok(issues)
    }

    async fn create_issue(&self, issue: &NewIssue) -> Result<ApprovalIssue, GatewayError> {
        let request = self
            .request(reqwest::Method::POST, &self.issues_url)
            .json(&json!({
                "title": issue.title,
                "body": issue.body,
                "labels": issue.labels,
            }));
        let created: IssuePayload = self.decode(self.send(request).await?).await?;

        tracing::info!(number = created.number, title = %created.title, "github issue created");
        Ok(created.into_issue())
    }

    async fn comment(&self, number: u64, body: &str) -> Result<(), GatewayError> {
        let url = format!("{}/{number}/comments", self.issues_url);
        let request = self
            .request(reqwest::Method::POST, &url)
            .json(&json!({ "body": body }));
        self.send(request).await?;

        tracing::info!(number, "github issue commented");
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct IssuePayload {
    number: u64,
    title: String,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    html_url: String,
    #[serde(default)]
    state: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    created_at: Option<OffsetDateTime>,
    #[serde(default)]
    pull_request: Option<serde_json::Value>,
}

impl IssuePayload {
    fn into_issue(self) -> ApprovalIssue {
        ApprovalIssue {
            number: self.number,
            title: self.title,
            body: self.body.unwrap_or_default(),
            url: self.html_url,
            state: self.state,
            created_at: self.created_at,
        }
    }
}
