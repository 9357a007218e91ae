//! In-memory record models

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ahash::{AHashMap, AHashSet};
use anyhow::bail;
use async_trait::async_trait;
use parking_lot::RwLock;
use rg_core::{ModelKey, Record, RecordId};
use serde_json::Value;
use tracing::debug;

use crate::model::{Model, ModelHandle, ModelOptions, ModelStore};

/// Model over a fixed set of rows
pub struct MemoryModel {
    key: ModelKey,
    options: ModelOptions,
    source: Arc<Vec<Record>>,
    /// Cached records, `None` until fetched
    records: RwLock<Option<Vec<Record>>>,
    edited: RwLock<AHashSet<RecordId>>,
    current_view: RwLock<Option<String>>,
    fetches: AtomicUsize,
    clears: AtomicUsize,
}

impl MemoryModel {
    pub fn new(key: ModelKey, options: ModelOptions, source: Arc<Vec<Record>>, initial: Option<Vec<Record>>) -> Self {
        Self {
            key,
            options,
            source,
            records: RwLock::new(initial),
            edited: RwLock::new(AHashSet::new()),
            current_view: RwLock::new(None),
            fetches: AtomicUsize::new(0),
            clears: AtomicUsize::new(0),
        }
    }

    /// Change a field of a cached record, leaving it unsaved
    pub fn edit(&self, record_id: &RecordId, field: &str, value: impl Into<Value>) -> anyhow::Result<()> {
        if !self.options.editable {
            bail!("model {} is not editable", self.key);
        }
        let mut records = self.records.write();
        let record = records
            .as_mut()
            .and_then(|records| records.iter_mut().find(|r| &r.id == record_id));
        let Some(record) = record else {
            bail!("record {} is not loaded in {}", record_id, self.key);
        };
        record.fields.insert(field.to_string(), value.into());
        self.edited.write().insert(record_id.clone());
        Ok(())
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn clear_count(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }

    pub fn current_view(&self) -> Option<String> {
        self.current_view.read().clone()
    }

    fn matches_parent(&self, record: &Record) -> bool {
        match &self.options.parent {
            Some(parent) => parent
                .parent_values
                .iter()
                .filter(|(name, _)| record.fields.contains_key(name.as_str()))
                .all(|(name, value)| record.field(name) == Some(value)),
            None => true,
        }
    }
}

#[async_trait]
impl Model for MemoryModel {
    fn key(&self) -> &ModelKey {
        &self.key
    }

    fn options(&self) -> &ModelOptions {
        &self.options
    }

    fn clear_data(&self) {
        self.clears.fetch_add(1, Ordering::SeqCst);
        *self.records.write() = None;
        self.edited.write().clear();
    }

    fn is_changed(&self) -> bool {
        !self.edited.read().is_empty()
    }

    fn can_revert_record(&self, record: &Record) -> bool {
        self.edited.read().contains(&record.id)
    }

    fn allow_delete(&self, _record: &Record) -> bool {
        self.options.editable
    }

    fn set_current_view(&self, view_id: &str) {
        *self.current_view.write() = Some(view_id.to_string());
    }

    fn cancel_edits(&self) {
        if self.is_changed() {
            debug!("Cancelling edits in {}", self.key);
            self.edited.write().clear();
            *self.records.write() = None;
        }
    }

    fn records(&self) -> Vec<Record> {
        self.records.read().clone().unwrap_or_default()
    }

    async fn fetch(&self) -> anyhow::Result<Vec<Record>> {
        if self.options.is_null {
            return Ok(Vec::new());
        }
        if let Some(records) = self.records.read().clone() {
            return Ok(records);
        }

        self.fetches.fetch_add(1, Ordering::SeqCst);
        let page: Vec<Record> = self
            .source
            .iter()
            .filter(|record| self.matches_parent(record))
            .take(self.options.page_size as usize)
            .cloned()
            .collect();
        debug!("Fetched {} records into {}", page.len(), self.key);
        *self.records.write() = Some(page.clone());
        Ok(page)
    }

    async fn save(&self) -> anyhow::Result<()> {
        if !self.is_changed() {
            return Ok(());
        }
        if !self.options.editable {
            bail!("model {} is not editable", self.key);
        }
        self.edited.write().clear();
        Ok(())
    }
}

/// Model store keeping every live model in a map, one row set per region
pub struct MemoryModelStore {
    rows: RwLock<AHashMap<String, Arc<Vec<Record>>>>,
    models: RwLock<AHashMap<ModelKey, Arc<MemoryModel>>>,
    created: AtomicUsize,
}

impl MemoryModelStore {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(AHashMap::new()),
            models: RwLock::new(AHashMap::new()),
            created: AtomicUsize::new(0),
        }
    }

    /// Rows served to every model of `region_id`
    pub fn set_rows(&self, region_id: &str, rows: Vec<Record>) {
        self.rows.write().insert(region_id.to_string(), Arc::new(rows));
    }

    /// Concrete model behind a key, for edits and counters
    pub fn model(&self, key: &ModelKey) -> Option<Arc<MemoryModel>> {
        self.models.read().get(key).cloned()
    }

    pub fn live_keys(&self) -> Vec<ModelKey> {
        self.models.read().keys().cloned().collect()
    }

    /// Number of models created over the store's lifetime
    pub fn created_count(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl Default for MemoryModelStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelStore for MemoryModelStore {
    fn create(
        &self,
        key: ModelKey,
        options: ModelOptions,
        initial: Option<Vec<Record>>,
    ) -> anyhow::Result<ModelHandle> {
        let mut models = self.models.write();
        if models.contains_key(&key) {
            bail!("model {} already exists", key);
        }
        let source = self
            .rows
            .read()
            .get(&key.region_id)
            .cloned()
            .unwrap_or_default();
        let model = Arc::new(MemoryModel::new(key.clone(), options, source, initial));
        models.insert(key, model.clone());
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(model)
    }

    fn get(&self, key: &ModelKey) -> Option<ModelHandle> {
        self.models
            .read()
            .get(key)
            .map(|model| model.clone() as ModelHandle)
    }

    fn release(&self, key: &ModelKey) {
        self.models.write().remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ParentLink;
    use rg_core::GridConfig;
    use serde_json::{json, Map};

    fn rows() -> Vec<Record> {
        vec![
            Record::new("7369").with_field("ENAME", "SMITH").with_field("DEPTNO", 20),
            Record::new("7499").with_field("ENAME", "ALLEN").with_field("DEPTNO", 30),
            Record::new("7566").with_field("ENAME", "JONES").with_field("DEPTNO", 20),
        ]
    }

    fn options(editable: bool) -> ModelOptions {
        let mut config = GridConfig::new("emp");
        config.editable = editable;
        ModelOptions::merge(&config, "R1", &[], true)
    }

    #[tokio::test]
    async fn test_fetch_caches_until_cleared() {
        let store = MemoryModelStore::new();
        store.set_rows("emp", rows());
        let key = ModelKey::new("emp", "grid");
        let model = store.create(key.clone(), options(false), None).unwrap();

        assert_eq!(model.fetch().await.unwrap().len(), 3);
        model.fetch().await.unwrap();
        let concrete = store.model(&key).unwrap();
        assert_eq!(concrete.fetch_count(), 1);

        model.clear_data();
        assert!(model.records().is_empty());
        model.fetch().await.unwrap();
        assert_eq!(concrete.fetch_count(), 2);
        assert_eq!(concrete.clear_count(), 1);
    }

    #[tokio::test]
    async fn test_parent_values_restrict_rows() {
        let store = MemoryModelStore::new();
        store.set_rows("emp", rows());
        let mut parent_values = Map::new();
        parent_values.insert("DEPTNO".into(), json!(20));
        let opts = options(false).with_parent(ParentLink {
            region_id: "dept".into(),
            record_id: RecordId::from("20"),
            parent_values,
        });
        let model = store
            .create(ModelKey::new("emp", "grid").with_instance("20"), opts, None)
            .unwrap();
        let records = model.fetch().await.unwrap();
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn test_null_model_never_fetches() {
        let store = MemoryModelStore::new();
        store.set_rows("emp", rows());
        let key = ModelKey::new("emp", "grid");
        let model = store.create(key.clone(), options(false).into_null(), None).unwrap();
        assert!(model.fetch().await.unwrap().is_empty());
        assert_eq!(store.model(&key).unwrap().fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_edits_mark_changed_until_saved_or_cancelled() {
        let store = MemoryModelStore::new();
        store.set_rows("emp", rows());
        let key = ModelKey::new("emp", "grid");
        let model = store.create(key.clone(), options(true), None).unwrap();
        model.fetch().await.unwrap();
        let concrete = store.model(&key).unwrap();

        concrete.edit(&RecordId::from("7369"), "ENAME", "SMYTHE").unwrap();
        assert!(model.is_changed());
        assert!(model.can_revert_record(&Record::new("7369")));
        assert!(!model.can_revert_record(&Record::new("7499")));
        model.save().await.unwrap();
        assert!(!model.is_changed());

        concrete.edit(&RecordId::from("7499"), "ENAME", "ALLAN").unwrap();
        model.cancel_edits();
        assert!(!model.is_changed());
    }

    #[test]
    fn test_release_is_idempotent() {
        let store = MemoryModelStore::new();
        let key = ModelKey::new("emp", "grid");
        store.create(key.clone(), options(false), None).unwrap();
        assert!(store.create(key.clone(), options(false), None).is_err());
        store.release(&key);
        store.release(&key);
        assert!(store.get(&key).is_none());
        assert_eq!(store.created_count(), 1);
    }

    #[test]
    fn test_read_only_model_rejects_edits() {
        let store = MemoryModelStore::new();
        store.set_rows("emp", rows());
        let key = ModelKey::new("emp", "grid");
        store
            .create(key.clone(), options(false), Some(rows()))
            .unwrap();
        let concrete = store.model(&key).unwrap();
        assert!(concrete.edit(&RecordId::from("7369"), "ENAME", "X").is_err());
        assert!(!concrete.allow_delete(&Record::new("7369")));
    }
}
