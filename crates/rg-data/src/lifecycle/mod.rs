//! Ownership of the model bindings of one region

use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::RwLock;
use rg_core::{GridError, GridResult, ModelKey, Record, ViewId};
use tracing::{debug, info};

use crate::cascade::DetailTarget;
use crate::model::{Model, ModelHandle, ModelOptions, ModelStore, ParentLink};

/// Creates, shares and releases the models of one region.
///
/// At most one binding exists per (view, instance); binding again under the
/// same key releases the previous model first.
pub struct ModelLifecycleManager {
    store: Arc<dyn ModelStore>,
    region_id: String,
    bindings: RwLock<AHashMap<ModelKey, ModelHandle>>,
}

impl ModelLifecycleManager {
    pub fn new(store: Arc<dyn ModelStore>, region_id: impl Into<String>) -> Self {
        Self {
            store,
            region_id: region_id.into(),
            bindings: RwLock::new(AHashMap::new()),
        }
    }

    pub fn region_id(&self) -> &str {
        &self.region_id
    }

    pub fn key_for(&self, view_id: &str, instance_id: Option<&str>) -> ModelKey {
        let key = ModelKey::new(self.region_id.clone(), view_id);
        match instance_id {
            Some(instance) => key.with_instance(instance),
            None => key,
        }
    }

    /// Bind a fresh model for a view, replacing any model under the same key
    pub fn bind(
        &self,
        view_id: &str,
        instance_id: Option<&str>,
        options: ModelOptions,
        initial: Option<Vec<Record>>,
    ) -> GridResult<ModelHandle> {
        let key = self.key_for(view_id, instance_id);
        let mut bindings = self.bindings.write();
        if bindings.remove(&key).is_some() {
            debug!("Releasing model {} before rebinding", key);
            self.store.release(&key);
        }

        let model = self
            .store
            .create(key.clone(), options, initial)
            .map_err(GridError::Model)?;
        info!("Bound model {}", key);
        bindings.insert(key, model.clone());
        Ok(model)
    }

    /// Bind the detail model for a settled master selection.
    ///
    /// Every earlier binding of the view is released, so a detail region never
    /// holds models for two master records at once.
    pub fn bind_detail(
        &self,
        view_id: &str,
        master_region_id: &str,
        target: &DetailTarget,
        options: ModelOptions,
    ) -> GridResult<ModelHandle> {
        self.release_view(view_id);
        match target {
            DetailTarget::Record {
                record_id,
                parent_values,
            } => {
                let options = options.with_parent(ParentLink {
                    region_id: master_region_id.to_string(),
                    record_id: record_id.clone(),
                    parent_values: parent_values.clone(),
                });
                self.bind(view_id, Some(&record_id.0), options, None)
            }
            DetailTarget::Null => self.bind(view_id, None, options.into_null(), None),
        }
    }

    /// The model bound to a view, if any instance is bound
    pub fn model_for(&self, view_id: &str) -> Option<ModelHandle> {
        self.bindings
            .read()
            .iter()
            .find(|(key, _)| key.view_id == view_id)
            .map(|(_, model)| model.clone())
    }

    pub fn get(&self, view_id: &str, instance_id: Option<&str>) -> Option<ModelHandle> {
        self.bindings
            .read()
            .get(&self.key_for(view_id, instance_id))
            .cloned()
    }

    pub fn release(&self, view_id: &str, instance_id: Option<&str>) {
        let key = self.key_for(view_id, instance_id);
        if self.bindings.write().remove(&key).is_some() {
            debug!("Released model {}", key);
        }
        self.store.release(&key);
    }

    /// Release every instance bound for a view
    pub fn release_view(&self, view_id: &str) {
        let keys: Vec<ModelKey> = self
            .bindings
            .read()
            .keys()
            .filter(|key| key.view_id == view_id)
            .cloned()
            .collect();
        let mut bindings = self.bindings.write();
        for key in keys {
            bindings.remove(&key);
            self.store.release(&key);
            debug!("Released model {}", key);
        }
    }

    /// Tear down every binding, e.g. before a report switch
    pub fn release_all(&self) {
        let drained: Vec<ModelKey> = self.bindings.write().drain().map(|(key, _)| key).collect();
        for key in &drained {
            self.store.release(key);
        }
        info!("Released {} models of region {}", drained.len(), self.region_id);
    }

    /// Clear cached records of one view's models without releasing them
    pub fn invalidate(&self, view_id: &str) {
        for (key, model) in self.bindings.read().iter() {
            if key.view_id == view_id {
                model.clear_data();
            }
        }
    }

    pub fn invalidate_all(&self) {
        for model in self.bindings.read().values() {
            model.clear_data();
        }
    }

    pub fn bound_views(&self) -> Vec<ViewId> {
        let mut views: Vec<ViewId> = self
            .bindings
            .read()
            .keys()
            .map(|key| key.view_id.clone())
            .collect();
        views.sort();
        views.dedup();
        views
    }

    pub fn binding_count(&self) -> usize {
        self.bindings.read().len()
    }
}
