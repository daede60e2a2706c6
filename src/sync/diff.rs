use crate::model::project::{ProjectItem, UpdateCommand};

use super::fields::MatchedField;

/// Compares every managed field of `item` with the value derived from its
/// content and returns one update per field that drifted.
///
/// The stored value is located by the same name/type rule used to match the
/// board schema rather than by field id, so a recreated field is still found.
pub fn diff_item(
    project_id: &str,
    item: &ProjectItem,
    fields: &[MatchedField],
) -> Vec<UpdateCommand> {
    fields
        .iter()
        .filter_map(|matched| {
            let definition = matched.definition;
            let stored = item
                .field_values
                .iter()
                .find(|value| value.field().is_some_and(|f| definition.matches(f)))
                .and_then(|value| definition.stored(value));
            let expected = definition.expected(item);

            if stored == expected {
                return None;
            }

            Some(UpdateCommand {
                project_id: project_id.to_string(),
                item_id: item.id.clone(),
                field_id: matched.field.id.clone(),
                field_name: matched.field.name.clone(),
                input: definition.input(expected),
            })
        })
        .collect()
}
