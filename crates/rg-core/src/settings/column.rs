//! Per-view column layout: order, visibility, width, sort and control break

use serde::{Deserialize, Serialize};

use super::item::{change_or_unchanged, Change, Tracked};

fn default_visible() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Nulls {
    First,
    #[default]
    Last,
}

/// Sort applied to a column; `order` is 1-based across the view's sorts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortSetting {
    pub order: u32,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default)]
    pub nulls: Nulls,
}

/// Control break on a column; `order` is 1-based across the view's breaks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakSetting {
    pub order: u32,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default)]
    pub nulls: Nulls,
    #[serde(default = "default_visible")]
    pub is_enabled: bool,
}

/// Layout of one column within a view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSetting {
    #[serde(
        default,
        deserialize_with = "change_or_unchanged",
        skip_serializing_if = "Change::is_unchanged"
    )]
    pub operation: Change,
    pub column_id: String,
    #[serde(default)]
    pub seq: u32,
    #[serde(default = "default_visible")]
    pub is_visible: bool,
    #[serde(default)]
    pub is_frozen: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortSetting>,
    #[serde(default, rename = "break", skip_serializing_if = "Option::is_none")]
    pub control_break: Option<BreakSetting>,
}

impl ColumnSetting {
    pub fn new(column_id: impl Into<String>, seq: u32) -> Self {
        Self {
            operation: Change::Unchanged,
            column_id: column_id.into(),
            seq,
            is_visible: true,
            is_frozen: false,
            width: None,
            sort: None,
            control_break: None,
        }
    }
}

impl Tracked for ColumnSetting {
    fn change(&self) -> Change {
        self.operation
    }

    fn set_change(&mut self, change: Change) {
        self.operation = change;
    }
}
