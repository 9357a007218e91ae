//! Chart view

use rg_core::{Record, SettingsDocument, ViewSettings};
use rg_data::ModelHandle;
use serde_json::Value;

use crate::capabilities::Capabilities;
use crate::descriptor::ViewDescriptor;

pub const CHART_VIEW: &str = "chart";

/// Chart over the region's records. Needs a one-time setup before first use.
#[derive(Default)]
pub struct ChartView {
    definition: Option<Value>,
    points: usize,
    visible: bool,
}

impl ChartView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn definition(&self) -> Option<&Value> {
        self.definition.as_ref()
    }

    /// Number of records plotted
    pub fn points(&self) -> usize {
        self.points
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }
}

impl ViewDescriptor for ChartView {
    fn internal_identifier(&self) -> &str {
        CHART_VIEW
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            filter: true,
            download: true,
            ..Capabilities::default()
        }
    }

    fn is_configured(&self, document: &SettingsDocument) -> bool {
        document
            .view(CHART_VIEW)
            .is_some_and(|settings| settings.chart.is_some())
    }

    fn set_column_config(&mut self, settings: &ViewSettings) {
        self.definition = settings.chart.clone();
    }

    fn init_view(&mut self, _model: &ModelHandle) {
        self.points = 0;
    }

    fn view_changed(&mut self, visible: bool) {
        self.visible = visible;
    }

    fn set_records(&mut self, records: &[Record]) {
        self.points = records.len();
    }

    fn destroy_view(&mut self) {
        self.points = 0;
        self.visible = false;
    }
}
