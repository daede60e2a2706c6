use chrono::{DateTime, NaiveDate, Utc};

use crate::model::project::{Actor, Comment, ItemContent, ProjectItem};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Reduces an RFC 3339 timestamp to its UTC calendar day (`YYYY-MM-DD`).
///
/// Strings that already are a plain date are returned unchanged, so the
/// function can be applied to its own output.
pub fn normalize_date(value: &str) -> Option<String> {
    let value = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(value, DATE_FORMAT) {
        return Some(date.format(DATE_FORMAT).to_string());
    }
    match DateTime::parse_from_rfc3339(value) {
        Ok(ts) => Some(ts.with_timezone(&Utc).format(DATE_FORMAT).to_string()),
        Err(err) => {
            tracing::warn!(value, %err, "ignoring unparseable timestamp");
            None
        }
    }
}

pub fn created_at(item: &ProjectItem) -> Option<String> {
    let ts = match item.content.as_ref()? {
        ItemContent::Issue(c) => c.created_at.as_deref(),
        ItemContent::PullRequest(c) => c.created_at.as_deref(),
        ItemContent::DraftIssue(c) => c.created_at.as_deref(),
        ItemContent::Unknown => None,
    };
    ts.and_then(normalize_date)
}

pub fn updated_at(item: &ProjectItem) -> Option<String> {
    let ts = match item.content.as_ref()? {
        ItemContent::Issue(c) => c.updated_at.as_deref(),
        ItemContent::PullRequest(c) => c.updated_at.as_deref(),
        ItemContent::DraftIssue(c) => c.updated_at.as_deref(),
        ItemContent::Unknown => None,
    };
    ts.and_then(normalize_date)
}

pub fn closed_at(item: &ProjectItem) -> Option<String> {
    let ts = match item.content.as_ref()? {
        ItemContent::Issue(c) => c.closed_at.as_deref(),
        ItemContent::PullRequest(c) => c.closed_at.as_deref(),
        _ => None,
    };
    ts.and_then(normalize_date)
}

pub fn merged_at(item: &ProjectItem) -> Option<String> {
    match item.content.as_ref()? {
        ItemContent::PullRequest(c) => c.merged_at.as_deref().and_then(normalize_date),
        _ => None,
    }
}

pub fn created_by(item: &ProjectItem) -> Option<String> {
    let author = match item.content.as_ref()? {
        ItemContent::Issue(c) => c.author.as_ref(),
        ItemContent::PullRequest(c) => c.author.as_ref(),
        ItemContent::DraftIssue(c) => c.author.as_ref(),
        ItemContent::Unknown => None,
    };
    login(author)
}

pub fn merged_by(item: &ProjectItem) -> Option<String> {
    match item.content.as_ref()? {
        ItemContent::PullRequest(c) => login(c.merged_by.as_ref()),
        _ => None,
    }
}

pub fn last_commenter(item: &ProjectItem) -> Option<String> {
    let comments = match item.content.as_ref()? {
        ItemContent::Issue(c) => &c.comments,
        ItemContent::PullRequest(c) => &c.comments,
        _ => return None,
    };
    comments.last().and_then(|c: &Comment| login(c.author.as_ref()))
}

fn login(actor: Option<&Actor>) -> Option<String> {
    actor.map(|a| a.login.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::project::{DraftIssueContent, IssueContent, PullRequestContent};

    fn item(content: ItemContent) -> ProjectItem {
        ProjectItem {
            id: "PVTI_1".into(),
            content: Some(content),
            field_values: vec![],
        }
    }

    fn actor(login: &str) -> Option<Actor> {
        Some(Actor {
            login: login.into(),
        })
    }

    #[test]
    fn normalizes_timestamp_to_utc_day() {
        assert_eq!(
            normalize_date("2024-03-01T10:15:00Z").as_deref(),
            Some("2024-03-01")
        );
        assert_eq!(
            normalize_date("2024-03-01T23:30:00-02:00").as_deref(),
            Some("2024-03-02")
        );
    }

    #[test]
    fn normalization_is_idempotent() {
        let once = normalize_date("2023-12-31T23:59:59Z").unwrap();
        let twice = normalize_date(&once).unwrap();
        assert_eq!(once, "2023-12-31");
        assert_eq!(once, twice);
    }

    #[test]
    fn garbage_timestamp_is_null() {
        assert_eq!(normalize_date("yesterday"), None);
    }

    #[test]
    fn draft_issue_has_no_merge_data() {
        let draft = item(ItemContent::DraftIssue(DraftIssueContent {
            author: actor("alice"),
            created_at: Some("2024-01-01T00:00:00Z".into()),
            updated_at: None,
        }));
        assert_eq!(merged_at(&draft), None);
        assert_eq!(merged_by(&draft), None);
        assert_eq!(closed_at(&draft), None);
        assert_eq!(last_commenter(&draft), None);
        assert_eq!(created_by(&draft).as_deref(), Some("alice"));
        assert_eq!(created_at(&draft).as_deref(), Some("2024-01-01"));
    }

    #[test]
    fn merged_pull_request_reports_merge_fields() {
        let pr = item(ItemContent::PullRequest(PullRequestContent {
            merged_at: Some("2024-05-06T07:08:09Z".into()),
            merged_by: actor("carol"),
            closed_at: Some("2024-05-06T07:08:09Z".into()),
            ..Default::default()
        }));
        assert_eq!(merged_at(&pr).as_deref(), Some("2024-05-06"));
        assert_eq!(merged_by(&pr).as_deref(), Some("carol"));
        assert_eq!(closed_at(&pr).as_deref(), Some("2024-05-06"));
    }

    #[test]
    fn deleted_author_is_null() {
        let issue = item(ItemContent::Issue(IssueContent::default()));
        assert_eq!(created_by(&issue), None);
    }

    #[test]
    fn last_commenter_uses_most_recent_comment() {
        let issue = item(ItemContent::Issue(IssueContent {
            comments: vec![
                Comment {
                    author: actor("dave"),
                },
                Comment {
                    author: actor("erin"),
                },
            ],
            ..Default::default()
        }));
        assert_eq!(last_commenter(&issue).as_deref(), Some("erin"));

        let quiet = item(ItemContent::Issue(IssueContent::default()));
        assert_eq!(last_commenter(&quiet), None);
    }

    #[test]
    fn missing_content_yields_nulls() {
        let mut redacted = item(ItemContent::Unknown);
        assert_eq!(created_at(&redacted), None);
        redacted.content = None;
        assert_eq!(created_by(&redacted), None);
        assert_eq!(updated_at(&redacted), None);
    }
}
