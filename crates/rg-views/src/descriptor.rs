//! View descriptor - the interface every pluggable view implements

use rg_core::{Record, RecordId, SettingsDocument, ViewSettings};
use rg_data::{FieldDef, ModelHandle};

use crate::actions::ActionState;
use crate::capabilities::Capabilities;

/// A pluggable presentation of the region's records.
///
/// Views receive read-only projections of the settings document and never
/// create or release models themselves.
pub trait ViewDescriptor: Send + Sync {
    /// Id the view is registered and persisted under
    fn internal_identifier(&self) -> &str;

    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    /// Fields this view contributes to its model
    fn fields(&self) -> Vec<FieldDef> {
        Vec::new()
    }

    /// View whose model and settings this view shares
    fn model_owner(&self) -> Option<&str> {
        None
    }

    /// Whether the document holds settings for this view
    fn is_configured(&self, document: &SettingsDocument) -> bool {
        let settings_view = self.model_owner().unwrap_or(self.internal_identifier());
        document.views.contains_key(settings_view)
    }

    /// Derive column definitions from the view's settings
    fn set_column_config(&mut self, _settings: &ViewSettings) {
        // Default implementation does nothing
    }

    /// Called once when the view is registered
    fn init(&mut self) {}

    /// Called the first time the view becomes active
    fn init_view(&mut self, _model: &ModelHandle) {}

    /// Shown or hidden by a view switch
    fn view_changed(&mut self, _visible: bool) {}

    /// Adjust the computed action state
    fn update_actions(&self, _actions: &mut ActionState) {}

    /// Report-wide options such as rows per page
    fn set_report_options(&mut self, _document: &SettingsDocument) {}

    /// Records fetched from the view's model
    fn set_records(&mut self, _records: &[Record]) {}

    /// Tear down what `init_view` built; the view may be initialized again
    fn destroy_view(&mut self) {}

    /// Final teardown
    fn destroy(&mut self) {}

    fn selected_records(&self) -> Vec<Record> {
        Vec::new()
    }

    fn set_selected_records(&mut self, _records: &[Record]) {}

    fn active_record_id(&self) -> Option<RecordId> {
        None
    }

    /// Move the cell focus. Returns false when the view has no such cell.
    fn goto_cell(&mut self, _record_id: &RecordId, _column_id: &str) -> bool {
        false
    }
}
