//! Built-in views

mod chart;
mod record;

pub use chart::{ChartView, CHART_VIEW};
pub use record::{RecordPreset, RecordView};
