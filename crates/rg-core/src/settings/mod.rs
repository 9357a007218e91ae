//! Report settings document
//!
//! One document describes a report: filters, flashback and the per-view
//! layout. It arrives from the server with default-valued fields omitted;
//! serde defaults plus [`SettingsDocument::normalize`] fill them in, and the
//! same rules run at startup, after every sync and after a report switch.

mod column;
pub mod diff;
mod flashback;
mod item;
pub mod order;
mod view;

pub use column::{BreakSetting, ColumnSetting, Direction, Nulls, SortSetting};
pub use flashback::Flashback;
pub use item::{
    Aggregate, AggregateFunction, Change, Filter, FilterKind, FilterOperator, Highlight,
    HighlightScope, ItemRef, SettingItem, Tracked,
};
pub use view::ViewSettings;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{GridError, GridResult};

/// Identifier of a view ("grid", "icon", "detail", "chart", ...)
pub type ViewId = String;

pub const DEFAULT_ROWS_PER_PAGE: u32 = 50;

fn default_rows_per_page() -> u32 {
    DEFAULT_ROWS_PER_PAGE
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportType {
    #[default]
    Primary,
    Alternative,
    Private,
    Public,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AreaState {
    #[default]
    Expanded,
    Collapsed,
}

/// Full configuration of one report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsDocument {
    pub id: String,
    /// Set only for session-derived copies of a saved report
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_report_id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub report_type: ReportType,
    #[serde(default)]
    pub is_read_only: bool,
    #[serde(default = "default_rows_per_page")]
    pub rows_per_page: u32,
    #[serde(default)]
    pub current_view: ViewId,
    #[serde(default)]
    pub report_settings_area_state: AreaState,
    #[serde(default)]
    pub filters: Vec<SettingItem<Filter>>,
    #[serde(default)]
    pub flashback: Flashback,
    #[serde(default)]
    pub views: IndexMap<ViewId, ViewSettings>,
}

impl SettingsDocument {
    pub fn new(id: impl Into<String>, current_view: impl Into<ViewId>) -> Self {
        Self {
            id: id.into(),
            base_report_id: None,
            name: String::new(),
            report_type: ReportType::Primary,
            is_read_only: false,
            rows_per_page: DEFAULT_ROWS_PER_PAGE,
            current_view: current_view.into(),
            report_settings_area_state: AreaState::Expanded,
            filters: Vec::new(),
            flashback: Flashback::Off,
            views: IndexMap::new(),
        }
    }

    /// Parse a server payload and apply the load-time defaulting rules
    pub fn from_value(value: Value, declared_views: &[ViewId]) -> GridResult<Self> {
        let mut document: SettingsDocument = serde_json::from_value(value)?;
        document.normalize(declared_views);
        Ok(document)
    }

    /// Number every view's ordered sequences 1..N, drop settings of views the
    /// host does not declare and make sure the current view names a declared
    /// view.
    pub fn normalize(&mut self, declared_views: &[ViewId]) {
        for view in self.views.values_mut() {
            view.compact_orders();
        }
        if declared_views.is_empty() {
            return;
        }
        self.views.retain(|id, _| declared_views.contains(id));
        if self.rows_per_page == 0 {
            self.rows_per_page = DEFAULT_ROWS_PER_PAGE;
        }
        if !declared_views.contains(&self.current_view) {
            self.current_view = declared_views[0].clone();
        }
    }

    pub fn is_session_copy(&self) -> bool {
        self.base_report_id.as_deref().is_some_and(|id| !id.is_empty())
    }

    pub fn view(&self, view_id: &str) -> Option<&ViewSettings> {
        self.views.get(view_id)
    }

    pub fn view_mut(&mut self, view_id: &str) -> GridResult<&mut ViewSettings> {
        self.views
            .get_mut(view_id)
            .ok_or_else(|| GridError::UnknownView(view_id.to_string()))
    }

    pub fn live_filters(&self) -> impl Iterator<Item = &SettingItem<Filter>> {
        self.filters.iter().filter(|f| f.is_live())
    }

    pub fn add_filter(&mut self, filter: Filter) -> GridResult<ItemRef> {
        filter.validate()?;
        Ok(item::insert_item(&mut self.filters, filter))
    }

    pub fn update_filter(&mut self, item: &ItemRef, filter: Filter) -> GridResult<()> {
        filter.validate()?;
        item::update_item(&mut self.filters, item, filter)
    }

    pub fn delete_filter(&mut self, item: &ItemRef) -> GridResult<()> {
        item::delete_item(&mut self.filters, item)
    }

    pub fn set_filter_enabled(&mut self, item: &ItemRef, enabled: bool) -> GridResult<()> {
        item::set_item_enabled(&mut self.filters, item, enabled)
    }

    pub fn set_flashback(&mut self, flashback: Flashback) -> GridResult<()> {
        flashback.validate()?;
        self.flashback = flashback;
        Ok(())
    }

    pub fn set_rows_per_page(&mut self, rows: u32) -> GridResult<()> {
        if rows == 0 {
            return Err(GridError::Validation("rows per page must be positive".into()));
        }
        self.rows_per_page = rows;
        Ok(())
    }

    /// Whether any list entry carries a change not yet sent to the server
    pub fn has_pending_changes(&self) -> bool {
        self.filters.iter().any(|f| !f.change().is_unchanged())
            || self.views.values().any(ViewSettings::has_pending_changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn declared() -> Vec<ViewId> {
        vec!["grid".to_string(), "icon".to_string(), "chart".to_string()]
    }

    #[test]
    fn test_sparse_payload_gets_defaults() {
        let document = SettingsDocument::from_value(
            json!({"id": "R1", "views": {"grid": {}, "legacy": {}}}),
            &declared(),
        )
        .unwrap();

        assert_eq!(document.rows_per_page, DEFAULT_ROWS_PER_PAGE);
        assert_eq!(document.current_view, "grid");
        assert_eq!(document.report_type, ReportType::Primary);
        assert_eq!(document.flashback, Flashback::Off);
        assert!(document.views.contains_key("grid"));
        assert!(!document.views.contains_key("legacy"));
        assert!(!document.is_session_copy());
    }

    #[test]
    fn test_load_numbers_columns_without_seq() {
        let document = SettingsDocument::from_value(
            json!({"id": "R1", "views": {"grid": {"columns": [{"columnId": "A"}, {"columnId": "B"}]}}}),
            &declared(),
        )
        .unwrap();
        let grid = document.view("grid").unwrap();
        assert_eq!(grid.column("A").unwrap().seq, 1);
        assert_eq!(grid.column("B").unwrap().seq, 2);
        assert!(!document.has_pending_changes());
    }

    #[test]
    fn test_session_copy_detection() {
        let document = SettingsDocument::from_value(
            json!({"id": "S1", "baseReportId": "R1", "type": "private"}),
            &declared(),
        )
        .unwrap();
        assert!(document.is_session_copy());
        assert_eq!(document.report_type, ReportType::Private);
    }

    #[test]
    fn test_filter_roundtrip_through_wire_form() {
        let mut document = SettingsDocument::new("R1", "grid");
        document.add_filter(Filter::row("ACME")).unwrap();
        let value = serde_json::to_value(&document).unwrap();
        assert_eq!(value["filters"][0]["operation"], json!("insert"));
        assert_eq!(value["type"], json!("primary"));
        assert!(document.has_pending_changes());
    }

    #[test]
    fn test_invalid_filter_never_lands() {
        let mut document = SettingsDocument::new("R1", "grid");
        assert!(document.add_filter(Filter::row("")).is_err());
        assert!(document.filters.is_empty());
    }
}
