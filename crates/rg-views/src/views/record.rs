//! Record-oriented views: grid, icon, detail and single row

use rg_core::{ColumnSetting, Record, RecordId, SettingsDocument, ViewSettings};
use rg_data::{FieldDef, ModelHandle};

use crate::actions::{Action, ActionState};
use crate::capabilities::Capabilities;
use crate::descriptor::ViewDescriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordPreset {
    Grid,
    Icon,
    Detail,
    /// One record at a time, sharing the grid's model and settings
    SingleRow,
}

impl RecordPreset {
    pub fn view_id(&self) -> &'static str {
        match self {
            RecordPreset::Grid => "grid",
            RecordPreset::Icon => "icon",
            RecordPreset::Detail => "detail",
            RecordPreset::SingleRow => "single_row",
        }
    }

    fn capabilities(&self) -> Capabilities {
        match self {
            RecordPreset::Grid => Capabilities::all(),
            RecordPreset::Icon => Capabilities {
                selection: true,
                filter: true,
                sort: true,
                change_rows_per_page: true,
                download: true,
                ..Capabilities::default()
            },
            RecordPreset::Detail => Capabilities {
                selection: true,
                control_break: true,
                filter: true,
                sort: true,
                change_rows_per_page: true,
                download: true,
                ..Capabilities::default()
            },
            RecordPreset::SingleRow => Capabilities {
                cell_selection: true,
                ..Capabilities::default()
            },
        }
    }
}

/// View over the records of its model
pub struct RecordView {
    preset: RecordPreset,
    fields: Vec<FieldDef>,
    columns: Vec<ColumnSetting>,
    records: Vec<Record>,
    selection: Vec<RecordId>,
    active_cell: Option<(RecordId, String)>,
    rows_per_page: u32,
    visible: bool,
    initialized: bool,
}

impl RecordView {
    pub fn new(preset: RecordPreset, fields: Vec<FieldDef>) -> Self {
        Self {
            preset,
            fields,
            columns: Vec::new(),
            records: Vec::new(),
            selection: Vec::new(),
            active_cell: None,
            rows_per_page: 0,
            visible: false,
            initialized: false,
        }
    }

    pub fn grid(fields: Vec<FieldDef>) -> Self {
        Self::new(RecordPreset::Grid, fields)
    }

    pub fn icon(fields: Vec<FieldDef>) -> Self {
        Self::new(RecordPreset::Icon, fields)
    }

    pub fn detail(fields: Vec<FieldDef>) -> Self {
        Self::new(RecordPreset::Detail, fields)
    }

    pub fn single_row(fields: Vec<FieldDef>) -> Self {
        Self::new(RecordPreset::SingleRow, fields)
    }

    /// Visible columns in display order
    pub fn visible_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.is_visible)
            .map(|c| c.column_id.as_str())
            .collect()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn rows_per_page(&self) -> u32 {
        self.rows_per_page
    }
}

impl ViewDescriptor for RecordView {
    fn internal_identifier(&self) -> &str {
        self.preset.view_id()
    }

    fn capabilities(&self) -> Capabilities {
        self.preset.capabilities()
    }

    fn fields(&self) -> Vec<FieldDef> {
        self.fields.clone()
    }

    fn model_owner(&self) -> Option<&str> {
        match self.preset {
            RecordPreset::SingleRow => Some(RecordPreset::Grid.view_id()),
            _ => None,
        }
    }

    fn set_column_config(&mut self, settings: &ViewSettings) {
        self.columns = settings.ordered_columns().into_iter().cloned().collect();
    }

    fn init_view(&mut self, _model: &ModelHandle) {
        self.initialized = true;
    }

    fn view_changed(&mut self, visible: bool) {
        self.visible = visible;
    }

    fn update_actions(&self, actions: &mut ActionState) {
        if self.preset == RecordPreset::SingleRow {
            actions.disable(Action::SingleRowView);
        }
    }

    fn set_report_options(&mut self, document: &SettingsDocument) {
        self.rows_per_page = match self.preset {
            RecordPreset::SingleRow => 1,
            _ => document.rows_per_page,
        };
    }

    fn set_records(&mut self, records: &[Record]) {
        self.records = records.to_vec();
        let loaded = &self.records;
        self.selection.retain(|id| loaded.iter().any(|r| &r.id == id));
        let active_gone = self
            .active_cell
            .as_ref()
            .is_some_and(|(id, _)| !loaded.iter().any(|r| &r.id == id));
        if active_gone {
            self.active_cell = None;
        }
    }

    fn destroy_view(&mut self) {
        self.records.clear();
        self.selection.clear();
        self.active_cell = None;
        self.visible = false;
        self.initialized = false;
    }

    fn selected_records(&self) -> Vec<Record> {
        self.records
            .iter()
            .filter(|r| self.selection.contains(&r.id))
            .cloned()
            .collect()
    }

    fn set_selected_records(&mut self, records: &[Record]) {
        if self.preset == RecordPreset::SingleRow {
            self.selection = records.first().map(|r| r.id.clone()).into_iter().collect();
            return;
        }
        self.selection = records.iter().map(|r| r.id.clone()).collect();
    }

    fn active_record_id(&self) -> Option<RecordId> {
        self.active_cell
            .as_ref()
            .map(|(id, _)| id.clone())
            .or_else(|| self.selection.first().cloned())
    }

    fn goto_cell(&mut self, record_id: &RecordId, column_id: &str) -> bool {
        if !self.capabilities().cell_selection {
            return false;
        }
        let known_record = self.records.iter().any(|r| &r.id == record_id);
        let known_column = self.columns.iter().any(|c| c.column_id == column_id && c.is_visible);
        if !known_record || !known_column {
            return false;
        }
        self.active_cell = Some((record_id.clone(), column_id.to_string()));
        self.selection = vec![record_id.clone()];
        true
    }
}
