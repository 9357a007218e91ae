//! Enabled state of the host's named commands

use std::fmt;

use indexmap::IndexMap;
use rg_core::{FeatureFlags, Record, SettingsDocument};
use rg_data::{Model, ModelHandle};

use crate::capabilities::Capabilities;
use crate::host::ActionHost;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Filter,
    Sort,
    ControlBreak,
    Aggregate,
    Highlight,
    Flashback,
    Columns,
    RowsPerPage,
    Download,
    SaveReport,
    Edit,
    Revert,
    Delete,
    SingleRowView,
}

impl Action {
    pub const ALL: [Action; 14] = [
        Action::Filter,
        Action::Sort,
        Action::ControlBreak,
        Action::Aggregate,
        Action::Highlight,
        Action::Flashback,
        Action::Columns,
        Action::RowsPerPage,
        Action::Download,
        Action::SaveReport,
        Action::Edit,
        Action::Revert,
        Action::Delete,
        Action::SingleRowView,
    ];

    /// Command name known to the host
    pub fn name(&self) -> &'static str {
        match self {
            Action::Filter => "filter",
            Action::Sort => "sort",
            Action::ControlBreak => "controlBreak",
            Action::Aggregate => "aggregate",
            Action::Highlight => "highlight",
            Action::Flashback => "flashback",
            Action::Columns => "columns",
            Action::RowsPerPage => "changeRowsPerPage",
            Action::Download => "download",
            Action::SaveReport => "saveReport",
            Action::Edit => "edit",
            Action::Revert => "revertRecord",
            Action::Delete => "deleteRecord",
            Action::SingleRowView => "singleRowView",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Selection facts that drive the record actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SelectionSummary {
    pub count: usize,
    pub any_revertible: bool,
    pub all_deletable: bool,
}

impl SelectionSummary {
    pub fn of(selection: &[Record], model: Option<&ModelHandle>) -> Self {
        let Some(model) = model else {
            return Self {
                count: selection.len(),
                ..Self::default()
            };
        };
        Self {
            count: selection.len(),
            any_revertible: selection.iter().any(|r| model.can_revert_record(r)),
            all_deletable: !selection.is_empty() && selection.iter().all(|r| model.allow_delete(r)),
        }
    }
}

/// Visible and enabled state of every action
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ActionState {
    states: IndexMap<Action, (bool, bool)>,
}

impl ActionState {
    /// View capabilities intersected with host features, document and selection state
    pub fn compute(
        caps: &Capabilities,
        features: &FeatureFlags,
        document: &SettingsDocument,
        editing: bool,
        selection: &SelectionSummary,
    ) -> Self {
        let mut state = Self::default();
        state.set(Action::Filter, caps.filter, caps.filter && features.filter);
        state.set(Action::Sort, caps.sort, caps.sort && features.sort);
        state.set(
            Action::ControlBreak,
            caps.control_break,
            caps.control_break && features.control_break,
        );
        state.set(
            Action::Aggregate,
            caps.aggregation,
            caps.aggregation && features.aggregate,
        );
        state.set(Action::Highlight, caps.highlight, caps.highlight && features.highlight);
        state.set(Action::Flashback, true, features.flashback);
        state.set(Action::Columns, caps.configurable_columns, caps.configurable_columns);
        state.set(
            Action::RowsPerPage,
            caps.change_rows_per_page,
            caps.change_rows_per_page && features.change_rows_per_page,
        );
        state.set(Action::Download, caps.download, caps.download && features.download);
        state.set(
            Action::SaveReport,
            true,
            features.save_report && !document.is_read_only,
        );

        let edit = caps.edit && editing;
        state.set(Action::Edit, caps.edit, edit);
        state.set(Action::Revert, caps.edit, edit && selection.any_revertible);
        state.set(Action::Delete, caps.edit, edit && selection.all_deletable);
        state.set(
            Action::SingleRowView,
            caps.single_row_view,
            caps.single_row_view && selection.count == 1,
        );
        state
    }

    pub fn set(&mut self, action: Action, visible: bool, enabled: bool) {
        self.states.insert(action, (visible, enabled && visible));
    }

    pub fn disable(&mut self, action: Action) {
        if let Some(state) = self.states.get_mut(&action) {
            state.1 = false;
        }
    }

    pub fn is_enabled(&self, action: Action) -> bool {
        self.states.get(&action).is_some_and(|(_, enabled)| *enabled)
    }

    pub fn is_visible(&self, action: Action) -> bool {
        self.states.get(&action).is_some_and(|(visible, _)| *visible)
    }

    pub fn enabled(&self) -> Vec<Action> {
        Action::ALL
            .into_iter()
            .filter(|action| self.is_enabled(*action))
            .collect()
    }

    /// Push the state to the host
    pub fn apply(&self, host: &dyn ActionHost) {
        for action in Action::ALL {
            host.set_visible(action, self.is_visible(action));
            host.set_enabled(action, self.is_enabled(action));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document() -> SettingsDocument {
        SettingsDocument::new("R1", "grid")
    }

    #[test]
    fn test_capabilities_intersect_features() {
        let mut features = FeatureFlags::default();
        features.filter = false;
        let state = ActionState::compute(
            &Capabilities::all(),
            &features,
            &document(),
            false,
            &SelectionSummary::default(),
        );
        assert!(!state.is_enabled(Action::Filter));
        assert!(state.is_visible(Action::Filter));
        assert!(state.is_enabled(Action::Sort));
        assert!(!state.is_enabled(Action::Edit));
    }

    #[test]
    fn test_missing_capability_hides_action() {
        let state = ActionState::compute(
            &Capabilities::default(),
            &FeatureFlags::default(),
            &document(),
            true,
            &SelectionSummary::default(),
        );
        assert!(!state.is_visible(Action::Aggregate));
        assert!(!state.is_enabled(Action::Aggregate));
        assert!(state.is_enabled(Action::Flashback));
    }

    #[test]
    fn test_selection_derived_actions() {
        let caps = Capabilities::all();
        let features = FeatureFlags::default();
        let single = SelectionSummary {
            count: 1,
            any_revertible: true,
            all_deletable: true,
        };
        let state = ActionState::compute(&caps, &features, &document(), true, &single);
        assert!(state.is_enabled(Action::Revert));
        assert!(state.is_enabled(Action::Delete));
        assert!(state.is_enabled(Action::SingleRowView));

        let many = SelectionSummary {
            count: 2,
            any_revertible: false,
            all_deletable: false,
        };
        let state = ActionState::compute(&caps, &features, &document(), true, &many);
        assert!(!state.is_enabled(Action::Revert));
        assert!(!state.is_enabled(Action::Delete));
        assert!(!state.is_enabled(Action::SingleRowView));
    }

    #[test]
    fn test_read_only_report_cannot_be_saved() {
        let mut document = document();
        document.is_read_only = true;
        let state = ActionState::compute(
            &Capabilities::all(),
            &FeatureFlags::default(),
            &document,
            false,
            &SelectionSummary::default(),
        );
        assert!(!state.is_enabled(Action::SaveReport));
    }
}
