use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::StatusCode;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

use super::ProjectBoard;
use crate::config::GitHubConfig;
use crate::model::project::{ItemsPage, ProjectItem, ProjectRef, SchemaField, UpdateCommand};

pub const DEFAULT_API_URL: &str = "https://api.github.com/graphql";

#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("api returned {status}: {body}")]
    Api {
        status: StatusCode,
        body: String,
        retry_after: Option<Duration>,
    },
    #[error("graphql errors: {}", .messages.join("; "))]
    GraphQl {
        messages: Vec<String>,
        rate_limited: bool,
    },
    #[error("{0} not found")]
    NotFound(String),
    #[error("response carried no data")]
    MissingData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorClass {
    Auth,
    RateLimit,
    Transient,
    Permanent,
}

impl GitHubError {
    pub fn classification(&self) -> Option<ApiErrorClass> {
        match self {
            GitHubError::Api { status, body, .. } => Some(classify_api_status(*status, body)),
            GitHubError::GraphQl {
                rate_limited: true, ..
            } => Some(ApiErrorClass::RateLimit),
            GitHubError::Request(err) if err.is_timeout() || err.is_connect() => {
                Some(ApiErrorClass::Transient)
            }
            _ => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self.classification(),
            Some(ApiErrorClass::RateLimit | ApiErrorClass::Transient)
        )
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            GitHubError::Api { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

fn classify_api_status(status: StatusCode, body: &str) -> ApiErrorClass {
    if status == StatusCode::TOO_MANY_REQUESTS
        || (status == StatusCode::FORBIDDEN && body.to_lowercase().contains("rate limit"))
    {
        ApiErrorClass::RateLimit
    } else if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        ApiErrorClass::Auth
    } else if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
        ApiErrorClass::Transient
    } else {
        ApiErrorClass::Permanent
    }
}

/// GraphQL client for GitHub Projects.
#[derive(Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    api_url: String,
    token: String,
    max_retries: u32,
    retry_delay: Duration,
}

impl GitHubClient {
    pub fn new(config: &GitHubConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("project-keeper/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            api_url: config.api_url.clone(),
            token: config.token.clone(),
            max_retries: config.max_retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        })
    }

    /// Runs a query, retrying rate-limited and transient failures with
    /// exponential backoff.
    async fn graphql<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: Value,
    ) -> Result<T, GitHubError> {
        let mut attempt = 0u32;
        loop {
            match self.post(query, &variables).await {
                Err(err) if err.is_retryable() && attempt < self.max_retries => {
                    let delay = err
                        .retry_after()
                        .unwrap_or_else(|| self.retry_delay.saturating_mul(1 << attempt.min(16)));
                    warn!(%err, attempt, ?delay, "retrying GitHub request");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                outcome => return outcome,
            }
        }
    }

    async fn post<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: &Value,
    ) -> Result<T, GitHubError> {
        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.token)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            let body = response.text().await.unwrap_or_default();
            return Err(GitHubError::Api {
                status,
                body,
                retry_after,
            });
        }

        let gql: GqlResponse<T> = response.json().await?;
        if let Some(errors) = gql.errors.filter(|e| !e.is_empty()) {
            let rate_limited = errors
                .iter()
                .any(|e| e.kind.as_deref() == Some("RATE_LIMITED"));
            return Err(GitHubError::GraphQl {
                messages: errors.into_iter().map(|e| e.message).collect(),
                rate_limited,
            });
        }
        gql.data.ok_or(GitHubError::MissingData)
    }

    /// Resolves `projectV2` under the configured owner.
    async fn project<P: DeserializeOwned>(
        &self,
        project: &ProjectRef,
        template: &str,
        mut variables: Value,
    ) -> Result<P, GitHubError> {
        let query = template.replace("OWNER_FIELD", project.owner_type.graphql_field());
        variables["owner"] = json!(project.owner);
        variables["number"] = json!(project.number);

        let data: OwnerData<P> = self.graphql(&query, variables).await?;
        let not_found =
            || GitHubError::NotFound(format!("project {}/{}", project.owner, project.number));
        data.owner
            .ok_or_else(not_found)?
            .project_v2
            .ok_or_else(not_found)
    }
}

const PROJECT_ID_QUERY: &str = r#"
query projectId($owner: String!, $number: Int!) {
  OWNER_FIELD(login: $owner) {
    projectV2(number: $number) { id }
  }
}"#;

const PROJECT_FIELDS_QUERY: &str = r#"
query projectFields($owner: String!, $number: Int!) {
  OWNER_FIELD(login: $owner) {
    projectV2(number: $number) {
      fields(first: 100) {
        nodes { ... on ProjectV2FieldCommon { id name dataType } }
      }
    }
  }
}"#;

const PROJECT_ITEMS_QUERY: &str = r#"
query projectItems($owner: String!, $number: Int!, $first: Int!, $after: String) {
  OWNER_FIELD(login: $owner) {
    projectV2(number: $number) {
      items(first: $first, after: $after) {
        pageInfo { hasNextPage endCursor }
        nodes {
          id
          fieldValues(first: 100) {
            nodes {
              __typename
              ... on ProjectV2ItemFieldDateValue { date field { ...fieldCommon } }
              ... on ProjectV2ItemFieldNumberValue { field { ...fieldCommon } }
              ... on ProjectV2ItemFieldSingleSelectValue { field { ...fieldCommon } }
              ... on ProjectV2ItemFieldTextValue { text field { ...fieldCommon } }
            }
          }
          content {
            __typename
            ... on DraftIssue {
              createdAt updatedAt
              author: creator { login }
            }
            ... on Issue {
              createdAt updatedAt closedAt
              author { login }
              comments(last: 1) { nodes { author { login } } }
            }
            ... on PullRequest {
              createdAt updatedAt closedAt mergedAt
              author { login }
              mergedBy { login }
              comments(last: 1) { nodes { author { login } } }
            }
          }
        }
      }
    }
  }
}

fragment fieldCommon on ProjectV2FieldConfiguration {
  ... on ProjectV2FieldCommon { id name dataType }
}"#;

const UPDATE_FIELD_MUTATION: &str = r#"
mutation updateProjectItemField($input: UpdateProjectV2ItemFieldValueInput!) {
  updateProjectV2ItemFieldValue(input: $input) { projectV2Item { id } }
}"#;

const CLEAR_FIELD_MUTATION: &str = r#"
mutation clearProjectItemField($input: ClearProjectV2ItemFieldValueInput!) {
  clearProjectV2ItemFieldValue(input: $input) { projectV2Item { id } }
}"#;

#[derive(Deserialize)]
struct GqlResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GqlError>>,
}

#[derive(Deserialize)]
struct GqlError {
    message: String,
    #[serde(rename = "type")]
    kind: Option<String>,
}

#[derive(Deserialize)]
struct OwnerData<P> {
    #[serde(rename = "organization", alias = "user")]
    owner: Option<Owner<P>>,
}

#[derive(Deserialize)]
struct Owner<P> {
    #[serde(rename = "projectV2")]
    project_v2: Option<P>,
}

#[derive(Deserialize)]
struct ProjectId {
    id: String,
}

#[derive(Deserialize)]
struct Nodes<T> {
    #[serde(default = "Vec::new")]
    nodes: Vec<Option<T>>,
}

#[derive(Deserialize)]
struct ProjectFields {
    fields: Nodes<SchemaField>,
}

#[derive(Deserialize)]
struct ProjectItems {
    items: ItemConnection,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemConnection {
    page_info: PageInfo,
    #[serde(default = "Vec::new")]
    nodes: Vec<Option<ProjectItem>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    has_next_page: bool,
    end_cursor: Option<String>,
}

#[async_trait]
impl ProjectBoard for GitHubClient {
    fn name(&self) -> &str {
        "GitHub"
    }

    async fn resolve_project_id(&self, project: &ProjectRef) -> Result<String> {
        let found: ProjectId = self
            .project(project, PROJECT_ID_QUERY, json!({}))
            .await
            .context("GitHub project lookup failed")?;
        Ok(found.id)
    }

    async fn fetch_field_schema(&self, project: &ProjectRef) -> Result<Vec<SchemaField>> {
        let found: ProjectFields = self
            .project(project, PROJECT_FIELDS_QUERY, json!({}))
            .await
            .context("GitHub project fields request failed")?;
        Ok(found.fields.nodes.into_iter().flatten().collect())
    }

    async fn fetch_items_page(
        &self,
        project: &ProjectRef,
        cursor: Option<&str>,
        page_size: u32,
    ) -> Result<ItemsPage> {
        let found: ProjectItems = self
            .project(
                project,
                PROJECT_ITEMS_QUERY,
                json!({ "first": page_size, "after": cursor }),
            )
            .await
            .context("GitHub project items request failed")?;

        let connection = found.items;
        Ok(ItemsPage {
            items: connection.nodes.into_iter().flatten().collect(),
            end_cursor: connection.page_info.end_cursor,
            has_next_page: connection.page_info.has_next_page,
        })
    }

    async fn update_item_field_value(&self, update: &UpdateCommand) -> Result<()> {
        let (mutation, input) = if update.input.is_clear() {
            (
                CLEAR_FIELD_MUTATION,
                json!({
                    "projectId": update.project_id,
                    "itemId": update.item_id,
                    "fieldId": update.field_id,
                }),
            )
        } else {
            (
                UPDATE_FIELD_MUTATION,
                json!({
                    "projectId": update.project_id,
                    "itemId": update.item_id,
                    "fieldId": update.field_id,
                    "value": update.input,
                }),
            )
        };

        let _: IgnoredAny = self
            .graphql(mutation, json!({ "input": input }))
            .await
            .with_context(|| {
                format!(
                    "GitHub update of '{}' on item {} failed",
                    update.field_name, update.item_id
                )
            })?;
        debug!(item = %update.item_id, field = %update.field_name, "field updated");
        Ok(())
    }
}
