//! Host configuration for one grid region

use std::path::Path;
use std::time::Duration;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{GridError, GridResult};
use crate::settings::ViewId;

fn default_true() -> bool {
    true
}

fn default_settle_ms() -> u64 {
    300
}

fn default_page_size() -> u32 {
    50
}

fn default_view() -> ViewId {
    "grid".to_string()
}

fn default_discard_message() -> String {
    "This action will discard your unsaved changes. Continue?".to_string()
}

/// Features the host enables for the whole region.
///
/// A view capability only turns into an enabled action when the matching
/// host feature is on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureFlags {
    #[serde(default = "default_true")]
    pub filter: bool,
    #[serde(default = "default_true")]
    pub sort: bool,
    #[serde(default = "default_true")]
    pub control_break: bool,
    #[serde(default = "default_true")]
    pub aggregate: bool,
    #[serde(default = "default_true")]
    pub highlight: bool,
    #[serde(default = "default_true")]
    pub flashback: bool,
    #[serde(default = "default_true")]
    pub download: bool,
    #[serde(default = "default_true")]
    pub change_rows_per_page: bool,
    #[serde(default = "default_true")]
    pub save_report: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            filter: true,
            sort: true,
            control_break: true,
            aggregate: true,
            highlight: true,
            flashback: true,
            download: true,
            change_rows_per_page: true,
            save_report: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FetchMode {
    #[default]
    Paginated,
    Scroll,
}

/// Region-wide defaults merged into every model's options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDefaults {
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default)]
    pub fetch_mode: FetchMode,
    /// Field holding the record identity when no override names one
    #[serde(default)]
    pub identity_field: Option<String>,
}

impl Default for ModelDefaults {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            fetch_mode: FetchMode::Paginated,
            identity_field: None,
        }
    }
}

/// Per-field overrides applied on top of a view's field definitions
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldOverride {
    #[serde(default)]
    pub is_identity: Option<bool>,
    #[serde(default)]
    pub meta: Option<String>,
    #[serde(default)]
    pub data_type: Option<String>,
    #[serde(default)]
    pub seq: Option<u32>,
}

/// Configuration of one grid region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridConfig {
    pub region_id: String,
    /// Whether the host requires record editing
    #[serde(default)]
    pub editable: bool,
    /// View that edits records; picked automatically when exactly one view can edit
    #[serde(default)]
    pub editable_view: Option<ViewId>,
    #[serde(default = "default_view")]
    pub default_view: ViewId,
    #[serde(default)]
    pub features: FeatureFlags,
    #[serde(default)]
    pub model_defaults: ModelDefaults,
    #[serde(default)]
    pub field_overrides: AHashMap<String, FieldOverride>,
    /// Region whose selection drives this region's data
    #[serde(default)]
    pub master_region_id: Option<String>,
    #[serde(default = "default_settle_ms")]
    pub detail_settle_ms: u64,
    #[serde(default = "default_discard_message")]
    pub discard_message: String,
}

impl GridConfig {
    pub fn new(region_id: impl Into<String>) -> Self {
        Self {
            region_id: region_id.into(),
            editable: false,
            editable_view: None,
            default_view: default_view(),
            features: FeatureFlags::default(),
            model_defaults: ModelDefaults::default(),
            field_overrides: AHashMap::new(),
            master_region_id: None,
            detail_settle_ms: default_settle_ms(),
            discard_message: default_discard_message(),
        }
    }

    pub fn from_json_str(json: &str) -> GridResult<Self> {
        let config: GridConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> GridResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Check the settings that would make the component unusable
    pub fn validate(&self) -> GridResult<()> {
        if self.region_id.trim().is_empty() {
            return Err(GridError::Config("regionId is required".into()));
        }
        if self.default_view.trim().is_empty() {
            return Err(GridError::Config("defaultView must not be empty".into()));
        }
        if self.model_defaults.page_size == 0 {
            return Err(GridError::Config("modelDefaults.pageSize must be positive".into()));
        }
        if self.master_region_id.as_deref() == Some(self.region_id.as_str()) {
            return Err(GridError::Config("a region cannot be its own master".into()));
        }
        Ok(())
    }

    pub fn is_detail(&self) -> bool {
        self.master_region_id.is_some()
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.detail_settle_ms)
    }
}
