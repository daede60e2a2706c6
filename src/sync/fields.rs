use std::fmt;

use crate::model::project::{FieldInput, FieldValue, ProjectItem, SchemaField};

use super::extract;

/// Declared data type of a derived field, compared case-insensitively
/// against the board's `dataType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Date,
    Text,
}

impl FieldKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FieldKind::Date => "date",
            FieldKind::Text => "text",
        }
    }

    /// Stored dates are reduced to their day, like the derived ones.
    fn stored(self, value: &FieldValue) -> Option<String> {
        match self {
            FieldKind::Date => value.date().and_then(extract::normalize_date),
            FieldKind::Text => value.text().map(String::from),
        }
    }

    fn input(self, expected: Option<String>) -> FieldInput {
        match self {
            FieldKind::Date => FieldInput::Date(expected),
            FieldKind::Text => FieldInput::Text(expected),
        }
    }
}

/// A board field whose value can be derived from the item's content.
pub struct FieldDefinition {
    /// Lower-case substring looked up in the board field's name.
    pub label: &'static str,
    pub kind: FieldKind,
    extract: fn(&ProjectItem) -> Option<String>,
}

impl fmt::Debug for FieldDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDefinition")
            .field("label", &self.label)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl FieldDefinition {
    pub fn matches(&self, field: &SchemaField) -> bool {
        field.name.to_lowercase().contains(self.label)
            && field.data_type.to_lowercase() == self.kind.as_str()
    }

    pub fn expected(&self, item: &ProjectItem) -> Option<String> {
        (self.extract)(item)
    }

    pub fn stored(&self, value: &FieldValue) -> Option<String> {
        self.kind.stored(value)
    }

    pub fn input(&self, expected: Option<String>) -> FieldInput {
        self.kind.input(expected)
    }
}

pub static SUPPORTED_FIELDS: &[FieldDefinition] = &[
    FieldDefinition {
        label: "created at",
        kind: FieldKind::Date,
        extract: extract::created_at,
    },
    FieldDefinition {
        label: "created by",
        kind: FieldKind::Text,
        extract: extract::created_by,
    },
    FieldDefinition {
        label: "updated at",
        kind: FieldKind::Date,
        extract: extract::updated_at,
    },
    FieldDefinition {
        label: "closed at",
        kind: FieldKind::Date,
        extract: extract::closed_at,
    },
    FieldDefinition {
        label: "merged at",
        kind: FieldKind::Date,
        extract: extract::merged_at,
    },
    FieldDefinition {
        label: "merged by",
        kind: FieldKind::Text,
        extract: extract::merged_by,
    },
    FieldDefinition {
        label: "last commenter",
        kind: FieldKind::Text,
        extract: extract::last_commenter,
    },
];

/// A catalog entry bound to the board field it was found on.
#[derive(Debug, Clone)]
pub struct MatchedField {
    pub definition: &'static FieldDefinition,
    pub field: SchemaField,
}

/// Pairs each catalog entry with the first board field it matches.
///
/// Entries without a matching board field are skipped: the board simply
/// does not track them. When several board fields match one entry, the
/// first one in schema order wins and the others are left alone.
pub fn match_fields(
    catalog: &'static [FieldDefinition],
    schema: &[SchemaField],
) -> Vec<MatchedField> {
    catalog
        .iter()
        .filter_map(|definition| {
            schema
                .iter()
                .find(|field| definition.matches(field))
                .map(|field| MatchedField {
                    definition,
                    field: field.clone(),
                })
        })
        .collect()
}
