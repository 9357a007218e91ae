//! Model collaborator interface

use std::sync::Arc;

use async_trait::async_trait;
use rg_core::config::FetchMode;
use rg_core::{GridConfig, ModelKey, Record, RecordId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field definition a view contributes to its model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDef {
    pub name: String,
    #[serde(default)]
    pub data_type: Option<String>,
    #[serde(default)]
    pub is_identity: bool,
    #[serde(default)]
    pub meta: Option<String>,
    #[serde(default)]
    pub seq: u32,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, seq: u32) -> Self {
        Self {
            name: name.into(),
            data_type: None,
            is_identity: false,
            meta: None,
            seq,
        }
    }

    pub fn identity(mut self) -> Self {
        self.is_identity = true;
        self
    }
}

/// Link from a detail model to the master record it shows
#[derive(Debug, Clone, PartialEq)]
pub struct ParentLink {
    pub region_id: String,
    pub record_id: RecordId,
    /// Snapshot of the master record's fields, sent with every fetch
    pub parent_values: Map<String, Value>,
}

/// Options a model is created with
#[derive(Debug, Clone, PartialEq)]
pub struct ModelOptions {
    pub report_id: String,
    pub page_size: u32,
    pub fetch_mode: FetchMode,
    pub identity_field: Option<String>,
    pub fields: Vec<FieldDef>,
    pub editable: bool,
    pub parent: Option<ParentLink>,
    /// A null model never fetches; detail regions use it when no single master record is selected
    pub is_null: bool,
}

impl ModelOptions {
    /// Merge host defaults, the view's fields, per-field overrides and editability
    pub fn merge(
        config: &GridConfig,
        report_id: &str,
        view_fields: &[FieldDef],
        view_can_edit: bool,
    ) -> Self {
        let mut fields: Vec<FieldDef> = view_fields
            .iter()
            .map(|field| {
                let mut field = field.clone();
                if let Some(over) = config.field_overrides.get(&field.name) {
                    if let Some(is_identity) = over.is_identity {
                        field.is_identity = is_identity;
                    }
                    if over.meta.is_some() {
                        field.meta = over.meta.clone();
                    }
                    if over.data_type.is_some() {
                        field.data_type = over.data_type.clone();
                    }
                    if let Some(seq) = over.seq {
                        field.seq = seq;
                    }
                }
                field
            })
            .collect();
        fields.sort_by_key(|field| field.seq);

        let identity_field = fields
            .iter()
            .find(|field| field.is_identity)
            .map(|field| field.name.clone())
            .or_else(|| config.model_defaults.identity_field.clone());

        Self {
            report_id: report_id.to_string(),
            page_size: config.model_defaults.page_size,
            fetch_mode: config.model_defaults.fetch_mode,
            identity_field,
            fields,
            editable: config.editable && view_can_edit,
            parent: None,
            is_null: false,
        }
    }

    pub fn with_parent(mut self, parent: ParentLink) -> Self {
        self.parent = Some(parent);
        self.is_null = false;
        self
    }

    /// Options for the placeholder model shown while no single master record is selected
    pub fn into_null(mut self) -> Self {
        self.parent = None;
        self.is_null = true;
        self
    }
}

/// Record storage for one view binding
#[async_trait]
pub trait Model: Send + Sync {
    fn key(&self) -> &ModelKey;

    fn options(&self) -> &ModelOptions;

    /// Drop cached records; the next fetch reloads them
    fn clear_data(&self);

    /// Whether the model holds edits that were not saved
    fn is_changed(&self) -> bool;

    fn can_revert_record(&self, record: &Record) -> bool;

    fn allow_delete(&self, record: &Record) -> bool;

    /// Tell the model which view is displaying it
    fn set_current_view(&self, view_id: &str);

    /// Leave edit mode, dropping in-progress field state
    fn cancel_edits(&self);

    /// Currently cached records
    fn records(&self) -> Vec<Record>;

    async fn fetch(&self) -> anyhow::Result<Vec<Record>>;

    async fn save(&self) -> anyhow::Result<()>;
}

pub type ModelHandle = Arc<dyn Model>;

/// Creates and releases models. Views never call this directly.
pub trait ModelStore: Send + Sync {
    fn create(
        &self,
        key: ModelKey,
        options: ModelOptions,
        initial: Option<Vec<Record>>,
    ) -> anyhow::Result<ModelHandle>;

    fn get(&self, key: &ModelKey) -> Option<ModelHandle>;

    /// Release a model. Releasing an unknown key is a no-op.
    fn release(&self, key: &ModelKey);
}
