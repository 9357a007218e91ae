//! Record and model identity types shared by views, models and events

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::settings::ViewId;

/// Identity of a record within a model
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(pub String);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        RecordId(value.to_string())
    }
}

/// A single record as exposed to views and selection observers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl Record {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: RecordId(id.into()),
            fields: Map::new(),
        }
    }

    /// Builder-style field setter
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

/// Composite key identifying one model instance: region + view + optional instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelKey {
    pub region_id: String,
    pub view_id: ViewId,
    pub instance_id: Option<String>,
}

impl ModelKey {
    pub fn new(region_id: impl Into<String>, view_id: impl Into<ViewId>) -> Self {
        Self {
            region_id: region_id.into(),
            view_id: view_id.into(),
            instance_id: None,
        }
    }

    pub fn with_instance(mut self, instance_id: impl Into<String>) -> Self {
        self.instance_id = Some(instance_id.into());
        self
    }
}

impl fmt::Display for ModelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.instance_id {
            Some(instance) => write!(f, "{}_{}_{}", self.region_id, self.view_id, instance),
            None => write!(f, "{}_{}", self.region_id, self.view_id),
        }
    }
}
