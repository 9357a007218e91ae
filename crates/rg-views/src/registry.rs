//! Registered views of one region

use indexmap::IndexMap;
use rg_core::{GridConfig, GridError, GridResult, SettingsDocument, ViewId};
use tracing::{debug, info};

use crate::descriptor::ViewDescriptor;

/// A registered view and whether it has been built
pub(crate) struct ViewSlot {
    pub(crate) descriptor: Box<dyn ViewDescriptor>,
    /// Built by `init_view`; independent of visibility
    pub(crate) created: bool,
    pub(crate) visible: bool,
}

/// Views by id. Registration order carries no meaning beyond iteration order.
#[derive(Default)]
pub struct ViewRegistry {
    views: IndexMap<ViewId, ViewSlot>,
}

impl ViewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a view; ids must be unique
    pub fn register(&mut self, mut view: Box<dyn ViewDescriptor>) -> GridResult<()> {
        let id = view.internal_identifier().to_string();
        if self.views.contains_key(&id) {
            return Err(GridError::Config(format!("view '{}' is registered twice", id)));
        }
        view.init();
        debug!("Registered view {}", id);
        self.views.insert(
            id,
            ViewSlot {
                descriptor: view,
                created: false,
                visible: false,
            },
        );
        Ok(())
    }

    /// Builder-style registration
    pub fn with(mut self, view: Box<dyn ViewDescriptor>) -> GridResult<Self> {
        self.register(view)?;
        Ok(self)
    }

    pub fn contains(&self, view_id: &str) -> bool {
        self.views.contains_key(view_id)
    }

    pub fn ids(&self) -> Vec<ViewId> {
        self.views.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    pub fn get(&self, view_id: &str) -> GridResult<&dyn ViewDescriptor> {
        self.views
            .get(view_id)
            .map(|slot| slot.descriptor.as_ref())
            .ok_or_else(|| GridError::UnknownView(view_id.to_string()))
    }

    pub fn is_created(&self, view_id: &str) -> bool {
        self.views.get(view_id).is_some_and(|slot| slot.created)
    }

    /// Views currently shown; at most one outside of a switch
    pub fn visible_ids(&self) -> Vec<ViewId> {
        self.views
            .iter()
            .filter(|(_, slot)| slot.visible)
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub(crate) fn slot_mut(&mut self, view_id: &str) -> GridResult<&mut ViewSlot> {
        self.views
            .get_mut(view_id)
            .ok_or_else(|| GridError::UnknownView(view_id.to_string()))
    }

    pub(crate) fn slots_mut(&mut self) -> impl Iterator<Item = (&ViewId, &mut ViewSlot)> {
        self.views.iter_mut()
    }

    /// View whose settings and model a view uses
    pub fn settings_view(&self, view_id: &str) -> GridResult<ViewId> {
        let view = self.get(view_id)?;
        Ok(view.model_owner().unwrap_or(view_id).to_string())
    }

    pub fn is_configured(&self, view_id: &str, document: &SettingsDocument) -> GridResult<bool> {
        Ok(self.get(view_id)?.is_configured(document))
    }

    /// First configured view, preferring `preferred`
    pub fn first_configured(&self, preferred: &str, document: &SettingsDocument) -> Option<ViewId> {
        if self.is_configured(preferred, document).unwrap_or(false) {
            return Some(preferred.to_string());
        }
        self.views
            .iter()
            .find(|(_, slot)| slot.descriptor.is_configured(document))
            .map(|(id, _)| id.clone())
    }

    /// The single view allowed to edit records.
    ///
    /// A named view must exist and be edit capable. Without a name, exactly one
    /// edit-capable view is picked; ambiguity, or no candidate when editing is
    /// required, is a configuration error.
    pub fn resolve_editable(&self, config: &GridConfig) -> GridResult<Option<ViewId>> {
        if let Some(named) = &config.editable_view {
            let view = self
                .get(named)
                .map_err(|_| GridError::Config(format!("editable view '{}' is not registered", named)))?;
            if !view.capabilities().edit {
                return Err(GridError::Config(format!("view '{}' cannot edit records", named)));
            }
            return Ok(Some(named.clone()));
        }

        let candidates: Vec<&ViewId> = self
            .views
            .iter()
            .filter(|(_, slot)| slot.descriptor.capabilities().edit)
            .map(|(id, _)| id)
            .collect();

        match (candidates.as_slice(), config.editable) {
            ([only], _) => {
                info!("Using {} as the editable view", only);
                Ok(Some((*only).clone()))
            }
            ([], true) => Err(GridError::Config(
                "editing is enabled but no view can edit records".into(),
            )),
            ([], false) => Ok(None),
            (_, true) => Err(GridError::Config(format!(
                "{} views can edit records; set editableView",
                candidates.len()
            ))),
            (_, false) => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::views::{ChartView, RecordView};
    use rg_core::ViewSettings;

    fn registry() -> ViewRegistry {
        ViewRegistry::new()
            .with(Box::new(RecordView::grid(Vec::new())))
            .unwrap()
            .with(Box::new(RecordView::icon(Vec::new())))
            .unwrap()
            .with(Box::new(ChartView::new()))
            .unwrap()
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let mut registry = registry();
        let result = registry.register(Box::new(RecordView::grid(Vec::new())));
        assert!(matches!(result, Err(GridError::Config(_))));
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_unknown_view_lookup() {
        let registry = registry();
        assert!(matches!(registry.get("map"), Err(GridError::UnknownView(_))));
    }

    #[test]
    fn test_editable_view_resolution() {
        let registry = registry();
        let mut config = GridConfig::new("emp");
        config.editable = true;
        assert_eq!(registry.resolve_editable(&config).unwrap(), Some("grid".to_string()));

        config.editable_view = Some("icon".into());
        assert!(matches!(registry.resolve_editable(&config), Err(GridError::Config(_))));

        config.editable_view = Some("missing".into());
        assert!(matches!(registry.resolve_editable(&config), Err(GridError::Config(_))));
    }

    #[test]
    fn test_editing_required_without_candidate_is_fatal() {
        let registry = ViewRegistry::new()
            .with(Box::new(RecordView::icon(Vec::new())))
            .unwrap();
        let mut config = GridConfig::new("emp");
        config.editable = true;
        let err = registry.resolve_editable(&config).unwrap_err();
        assert!(err.is_fatal());

        config.editable = false;
        assert_eq!(registry.resolve_editable(&config).unwrap(), None);
    }

    #[test]
    fn test_first_configured_prefers_requested_view() {
        let registry = registry();
        let mut document = SettingsDocument::new("R1", "chart");
        document.views.insert("icon".into(), ViewSettings::default());
        document.views.insert("grid".into(), ViewSettings::default());

        assert_eq!(registry.first_configured("chart", &document), Some("grid".to_string()));
        assert_eq!(registry.first_configured("icon", &document), Some("icon".to_string()));
        assert!(!registry.is_configured("chart", &document).unwrap());
    }
}
