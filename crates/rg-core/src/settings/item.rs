//! Change-tracked settings items: filters, aggregates and highlights

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::error::{GridError, GridResult};

/// Change state of a settings entry relative to the last server copy.
///
/// This is the only input to the diff step: entries that are `Unchanged`
/// never leave the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Change {
    #[default]
    #[serde(rename = "none")]
    Unchanged,
    #[serde(rename = "insert")]
    Inserted,
    #[serde(rename = "update")]
    Updated,
    #[serde(rename = "delete")]
    Deleted,
}

impl Change {
    pub fn is_unchanged(&self) -> bool {
        matches!(self, Change::Unchanged)
    }

    /// Tag an entry carries after a local edit of its payload
    pub fn after_update(self) -> Change {
        match self {
            Change::Unchanged | Change::Updated => Change::Updated,
            Change::Inserted => Change::Inserted,
            Change::Deleted => Change::Deleted,
        }
    }
}

/// Accepts an absent, `null` or `"none"` operation as unchanged
pub(crate) fn change_or_unchanged<'de, D>(deserializer: D) -> Result<Change, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Change>::deserialize(deserializer)?.unwrap_or_default())
}

/// Anything carrying a change tag
pub trait Tracked {
    fn change(&self) -> Change;

    fn set_change(&mut self, change: Change);

    fn mark_updated(&mut self) {
        let next = self.change().after_update();
        self.set_change(next);
    }

    /// Deleted entries stay in the document until synced but are not shown
    fn is_live(&self) -> bool {
        self.change() != Change::Deleted
    }
}

/// Stable handle to a settings item.
///
/// Persisted items are addressed by their server id; pending inserts have no
/// id yet and are addressed by a client-side key that is never sent.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ItemRef {
    Id(String),
    Pending(Uuid),
}

impl From<&str> for ItemRef {
    fn from(value: &str) -> Self {
        ItemRef::Id(value.to_string())
    }
}

fn default_enabled() -> bool {
    true
}

/// One entry of a settings list with its payload flattened on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingItem<T> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(
        default,
        deserialize_with = "change_or_unchanged",
        skip_serializing_if = "Change::is_unchanged"
    )]
    pub operation: Change,

    #[serde(default = "default_enabled")]
    pub is_enabled: bool,

    #[serde(flatten)]
    pub payload: T,

    #[serde(skip)]
    pending_key: Option<Uuid>,
}

impl<T> SettingItem<T> {
    /// A new, not yet persisted item
    pub fn pending(payload: T) -> Self {
        Self {
            id: None,
            operation: Change::Inserted,
            is_enabled: true,
            payload,
            pending_key: Some(Uuid::new_v4()),
        }
    }

    /// An item as the server returned it
    pub fn persisted(id: impl Into<String>, payload: T) -> Self {
        Self {
            id: Some(id.into()),
            operation: Change::Unchanged,
            is_enabled: true,
            payload,
            pending_key: None,
        }
    }

    pub fn item_ref(&self) -> Option<ItemRef> {
        match (&self.id, self.pending_key) {
            (Some(id), _) => Some(ItemRef::Id(id.clone())),
            (None, Some(key)) => Some(ItemRef::Pending(key)),
            (None, None) => None,
        }
    }

    pub fn matches(&self, item: &ItemRef) -> bool {
        match item {
            ItemRef::Id(id) => self.id.as_deref() == Some(id.as_str()),
            ItemRef::Pending(key) => self.pending_key == Some(*key),
        }
    }
}

impl<T> Tracked for SettingItem<T> {
    fn change(&self) -> Change {
        self.operation
    }

    fn set_change(&mut self, change: Change) {
        self.operation = change;
    }
}

/// Append a pending insert and return its handle
pub fn insert_item<T>(items: &mut Vec<SettingItem<T>>, payload: T) -> ItemRef {
    let key = Uuid::new_v4();
    items.push(SettingItem {
        pending_key: Some(key),
        ..SettingItem::pending(payload)
    });
    ItemRef::Pending(key)
}

/// Replace the payload of a live item and tag it as updated
pub fn update_item<T>(items: &mut [SettingItem<T>], item: &ItemRef, payload: T) -> GridResult<()> {
    let entry = find_live_mut(items, item)?;
    entry.payload = payload;
    entry.mark_updated();
    Ok(())
}

/// Flip the enabled flag of a live item
pub fn set_item_enabled<T>(items: &mut [SettingItem<T>], item: &ItemRef, enabled: bool) -> GridResult<()> {
    let entry = find_live_mut(items, item)?;
    if entry.is_enabled != enabled {
        entry.is_enabled = enabled;
        entry.mark_updated();
    }
    Ok(())
}

/// Delete an item. Pending inserts vanish; persisted items are tagged.
pub fn delete_item<T>(items: &mut Vec<SettingItem<T>>, item: &ItemRef) -> GridResult<()> {
    let position = items
        .iter()
        .position(|entry| entry.is_live() && entry.matches(item))
        .ok_or_else(|| GridError::UnknownSetting(format!("{:?}", item)))?;

    if items[position].operation == Change::Inserted {
        items.remove(position);
    } else {
        items[position].operation = Change::Deleted;
    }
    Ok(())
}

fn find_live_mut<'a, T>(items: &'a mut [SettingItem<T>], item: &ItemRef) -> GridResult<&'a mut SettingItem<T>> {
    items
        .iter_mut()
        .find(|entry| entry.is_live() && entry.matches(item))
        .ok_or_else(|| GridError::UnknownSetting(format!("{:?}", item)))
}

/// Row filters search all columns; column filters apply an operator to one column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    Row,
    Column,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterOperator {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
    NotContains,
    StartsWith,
    In,
    NotIn,
    Between,
    IsNull,
    IsNotNull,
}

impl FilterOperator {
    pub fn requires_value(&self) -> bool {
        !matches!(self, FilterOperator::IsNull | FilterOperator::IsNotNull)
    }
}

/// Filter payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Filter {
    #[serde(rename = "type")]
    pub kind: FilterKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<FilterOperator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_case_sensitive: bool,
}

impl Filter {
    /// A row filter matching `value` anywhere in the record
    pub fn row(value: impl Into<String>) -> Self {
        Self {
            kind: FilterKind::Row,
            column_id: None,
            operator: None,
            value: Some(value.into()),
            is_case_sensitive: false,
        }
    }

    pub fn column(column_id: impl Into<String>, operator: FilterOperator, value: Option<String>) -> Self {
        Self {
            kind: FilterKind::Column,
            column_id: Some(column_id.into()),
            operator: Some(operator),
            value,
            is_case_sensitive: false,
        }
    }

    pub fn validate(&self) -> GridResult<()> {
        let has_value = self.value.as_deref().is_some_and(|v| !v.trim().is_empty());
        match self.kind {
            FilterKind::Row if !has_value => {
                Err(GridError::Validation("row filter requires a search value".into()))
            }
            FilterKind::Row => Ok(()),
            FilterKind::Column => {
                if self.column_id.as_deref().map_or(true, str::is_empty) {
                    return Err(GridError::Validation("column filter requires a column".into()));
                }
                let operator = self
                    .operator
                    .ok_or_else(|| GridError::Validation("column filter requires an operator".into()))?;
                if operator.requires_value() && !has_value {
                    return Err(GridError::Validation(format!(
                        "operator {:?} requires a value",
                        operator
                    )));
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AggregateFunction {
    Sum,
    Avg,
    Count,
    CountDistinct,
    Min,
    Max,
    Median,
}

/// Aggregate payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Aggregate {
    pub function: AggregateFunction,
    pub column_id: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub show_grand_total: bool,
}

impl Aggregate {
    pub fn new(function: AggregateFunction, column_id: impl Into<String>) -> Self {
        Self {
            function,
            column_id: column_id.into(),
            show_grand_total: false,
        }
    }

    pub fn validate(&self) -> GridResult<()> {
        if self.column_id.trim().is_empty() {
            return Err(GridError::Validation("aggregate requires a column".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HighlightScope {
    Row,
    Column,
}

/// Highlight payload: a condition plus the colors applied when it matches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Highlight {
    pub name: String,
    pub highlight_type: HighlightScope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<FilterOperator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_color: Option<String>,
}

impl Highlight {
    pub fn validate(&self) -> GridResult<()> {
        if self.name.trim().is_empty() {
            return Err(GridError::Validation("highlight requires a name".into()));
        }
        if self.highlight_type == HighlightScope::Column
            && self.column_id.as_deref().map_or(true, str::is_empty)
        {
            return Err(GridError::Validation("column highlight requires a column".into()));
        }
        if self.background_color.is_none() && self.text_color.is_none() {
            return Err(GridError::Validation("highlight requires a color".into()));
        }
        for color in [&self.background_color, &self.text_color].into_iter().flatten() {
            if !is_hex_color(color) {
                return Err(GridError::Validation(format!("invalid color '{}'", color)));
            }
        }
        if let Some(operator) = self.operator {
            if operator.requires_value() && self.value.as_deref().map_or(true, str::is_empty) {
                return Err(GridError::Validation(format!(
                    "operator {:?} requires a value",
                    operator
                )));
            }
        }
        Ok(())
    }
}

fn is_hex_color(color: &str) -> bool {
    let Some(hex) = color.strip_prefix('#') else {
        return false;
    };
    matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pending_filter_wire_shape() {
        let item = SettingItem::pending(Filter::row("ACME"));
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(
            value,
            json!({"operation": "insert", "isEnabled": true, "type": "row", "value": "ACME"})
        );
    }

    #[test]
    fn test_missing_or_none_operation_is_unchanged() {
        let absent: SettingItem<Filter> =
            serde_json::from_value(json!({"id": "F1", "type": "row", "value": "x"})).unwrap();
        let none: SettingItem<Filter> =
            serde_json::from_value(json!({"id": "F1", "operation": "none", "type": "row", "value": "x"}))
                .unwrap();
        let null: SettingItem<Filter> =
            serde_json::from_value(json!({"id": "F1", "operation": null, "type": "row", "value": "x"}))
                .unwrap();
        assert_eq!(absent.operation, Change::Unchanged);
        assert_eq!(none.operation, Change::Unchanged);
        assert_eq!(null.operation, Change::Unchanged);
        assert!(absent.is_enabled);
    }

    #[test]
    fn test_delete_pending_removes_and_persisted_tags() {
        let mut items = vec![SettingItem::persisted("F1", Filter::row("a"))];
        let pending = insert_item(&mut items, Filter::row("b"));

        delete_item(&mut items, &pending).unwrap();
        assert_eq!(items.len(), 1);

        delete_item(&mut items, &ItemRef::from("F1")).unwrap();
        assert_eq!(items[0].operation, Change::Deleted);
        assert!(!items[0].is_live());

        // A deleted item can no longer be addressed
        assert!(delete_item(&mut items, &ItemRef::from("F1")).is_err());
    }

    #[test]
    fn test_update_keeps_insert_tag() {
        let mut items = Vec::new();
        let pending = insert_item(&mut items, Filter::row("a"));
        update_item(&mut items, &pending, Filter::row("b")).unwrap();
        assert_eq!(items[0].operation, Change::Inserted);

        let mut persisted = vec![SettingItem::persisted("F1", Filter::row("a"))];
        update_item(&mut persisted, &ItemRef::from("F1"), Filter::row("b")).unwrap();
        assert_eq!(persisted[0].operation, Change::Updated);
    }

    #[test]
    fn test_set_enabled_is_noop_when_unchanged() {
        let mut items = vec![SettingItem::persisted("F1", Filter::row("a"))];
        set_item_enabled(&mut items, &ItemRef::from("F1"), true).unwrap();
        assert_eq!(items[0].operation, Change::Unchanged);
        set_item_enabled(&mut items, &ItemRef::from("F1"), false).unwrap();
        assert_eq!(items[0].operation, Change::Updated);
    }

    #[test]
    fn test_filter_validation() {
        assert!(Filter::row("  ").validate().is_err());
        assert!(Filter::column("SAL", FilterOperator::Gt, None).validate().is_err());
        assert!(Filter::column("SAL", FilterOperator::IsNull, None).validate().is_ok());
        assert!(Filter::column("SAL", FilterOperator::Gt, Some("10".into())).validate().is_ok());
    }

    #[test]
    fn test_highlight_validation() {
        let mut highlight = Highlight {
            name: "Late".into(),
            highlight_type: HighlightScope::Row,
            column_id: None,
            operator: Some(FilterOperator::Eq),
            value: Some("LATE".into()),
            background_color: Some("#ffcc00".into()),
            text_color: None,
        };
        assert!(highlight.validate().is_ok());

        highlight.background_color = Some("yellow".into());
        assert!(highlight.validate().is_err());

        highlight.background_color = None;
        assert!(highlight.validate().is_err());
    }
}
