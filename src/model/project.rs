use serde::{Deserialize, Deserializer, Serialize};

/// Which kind of account owns the project board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OwnerType {
    #[default]
    Organization,
    User,
}

impl OwnerType {
    /// Root field of the GraphQL query that resolves this owner.
    pub fn graphql_field(self) -> &'static str {
        match self {
            OwnerType::Organization => "organization",
            OwnerType::User => "user",
        }
    }
}

impl std::str::FromStr for OwnerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "organization" | "org" => Ok(OwnerType::Organization),
            "user" => Ok(OwnerType::User),
            other => Err(format!("unknown owner type '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectRef {
    pub owner: String,
    pub number: u64,
    pub owner_type: OwnerType,
}

/// A column configured on the board.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaField {
    pub id: String,
    pub name: String,
    pub data_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Actor {
    pub login: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Comment {
    pub author: Option<Actor>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueContent {
    pub author: Option<Actor>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub closed_at: Option<String>,
    /// Only the most recent comment is requested.
    #[serde(default, deserialize_with = "nodes")]
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestContent {
    pub author: Option<Actor>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub closed_at: Option<String>,
    pub merged_at: Option<String>,
    pub merged_by: Option<Actor>,
    #[serde(default, deserialize_with = "nodes")]
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftIssueContent {
    pub author: Option<Actor>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

/// The issue, pull request or draft a project item stands for.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "__typename")]
pub enum ItemContent {
    Issue(IssueContent),
    PullRequest(PullRequestContent),
    DraftIssue(DraftIssueContent),
    #[serde(other)]
    Unknown,
}

/// A typed value an item holds for one schema field. Number and
/// single-select values are only decoded far enough to know their field.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "__typename")]
pub enum FieldValue {
    #[serde(rename = "ProjectV2ItemFieldDateValue")]
    Date {
        date: Option<String>,
        field: Option<SchemaField>,
    },
    #[serde(rename = "ProjectV2ItemFieldNumberValue")]
    Number { field: Option<SchemaField> },
    #[serde(rename = "ProjectV2ItemFieldSingleSelectValue")]
    SingleSelect { field: Option<SchemaField> },
    #[serde(rename = "ProjectV2ItemFieldTextValue")]
    Text {
        text: Option<String>,
        field: Option<SchemaField>,
    },
    #[serde(other)]
    Other,
}

impl FieldValue {
    pub fn field(&self) -> Option<&SchemaField> {
        match self {
            FieldValue::Date { field, .. }
            | FieldValue::Number { field, .. }
            | FieldValue::SingleSelect { field, .. }
            | FieldValue::Text { field, .. } => field.as_ref(),
            FieldValue::Other => None,
        }
    }

    pub fn date(&self) -> Option<&str> {
        match self {
            FieldValue::Date { date, .. } => date.as_deref(),
            _ => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            FieldValue::Text { text, .. } => text.as_deref(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectItem {
    pub id: String,
    /// Null when the viewer cannot access the underlying content.
    pub content: Option<ItemContent>,
    #[serde(default, deserialize_with = "nodes")]
    pub field_values: Vec<FieldValue>,
}

/// One page of the board's item connection.
#[derive(Debug, Clone, Default)]
pub struct ItemsPage {
    pub items: Vec<ProjectItem>,
    pub end_cursor: Option<String>,
    pub has_next_page: bool,
}

/// Value input of the field update mutation: `{"date": ..}` or `{"text": ..}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldInput {
    Date(Option<String>),
    Text(Option<String>),
}

impl FieldInput {
    pub fn value(&self) -> Option<&str> {
        match self {
            FieldInput::Date(v) | FieldInput::Text(v) => v.as_deref(),
        }
    }

    /// A null value cannot be written, it has to be cleared.
    pub fn is_clear(&self) -> bool {
        self.value().is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateCommand {
    pub project_id: String,
    pub item_id: String,
    pub field_id: String,
    pub field_name: String,
    pub input: FieldInput,
}

/// Flattens a GraphQL connection (`{ nodes: [..] }`) into its non-null nodes.
fn nodes<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(Deserialize)]
    struct Connection<T> {
        #[serde(default = "Vec::new")]
        nodes: Vec<Option<T>>,
    }

    Ok(Option::<Connection<T>>::deserialize(deserializer)?
        .map(|c| c.nodes.into_iter().flatten().collect())
        .unwrap_or_default())
}
