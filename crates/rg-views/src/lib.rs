//! Views and the view coordinator for the report grid

mod actions;
mod capabilities;
pub mod coordinator;
mod descriptor;
mod gate;
mod host;
mod registry;
pub mod views;

pub use actions::{Action, ActionState, SelectionSummary};
pub use capabilities::Capabilities;
pub use coordinator::{Hosts, MutationOptions, Outcome, Phase, SettingKind, ViewCoordinator};
pub use descriptor::ViewDescriptor;
pub use gate::{DirtyGate, GateDecision};
pub use host::{ActionHost, DialogHost};
pub use registry::ViewRegistry;
pub use views::{ChartView, RecordPreset, RecordView};
