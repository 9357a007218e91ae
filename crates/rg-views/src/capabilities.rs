use serde::{Deserialize, Serialize};

/// What a view supports. Everything is off unless a view opts in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    pub edit: bool,
    pub selection: bool,
    pub cell_selection: bool,
    pub highlight: bool,
    pub control_break: bool,
    pub aggregation: bool,
    pub single_row_view: bool,
    pub configurable_columns: bool,
    pub filter: bool,
    pub sort: bool,
    pub change_rows_per_page: bool,
    pub download: bool,
}

impl Capabilities {
    /// Everything a full grid offers
    pub fn all() -> Self {
        Self {
            edit: true,
            selection: true,
            cell_selection: true,
            highlight: true,
            control_break: true,
            aggregation: true,
            single_row_view: true,
            configurable_columns: true,
            filter: true,
            sort: true,
            change_rows_per_page: true,
            download: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_baseline_is_conservative() {
        let caps = Capabilities::default();
        assert!(!caps.edit && !caps.selection && !caps.filter && !caps.download);
        assert_ne!(caps, Capabilities::all());
    }
}
