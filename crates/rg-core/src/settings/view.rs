//! Settings owned by a single view

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::column::{BreakSetting, ColumnSetting, Direction, Nulls, SortSetting};
use super::item::{self, Aggregate, Change, Highlight, ItemRef, SettingItem, Tracked};
use super::order::{self, Sequence};
use crate::error::{GridError, GridResult};

/// Per-view layout and grid-family settings
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewSettings {
    #[serde(default)]
    pub columns: Vec<ColumnSetting>,
    #[serde(default)]
    pub aggregations: Vec<SettingItem<Aggregate>>,
    #[serde(default)]
    pub highlights: Vec<SettingItem<Highlight>>,
    #[serde(default)]
    pub stretch_columns: bool,
    /// Opaque chart definition, only present for chart views
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart: Option<Value>,
}

impl ViewSettings {
    pub fn with_columns<I, S>(column_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns = column_ids
            .into_iter()
            .enumerate()
            .map(|(idx, id)| ColumnSetting::new(id, idx as u32 + 1))
            .collect();
        Self {
            columns,
            ..Self::default()
        }
    }

    /// Number display, sort and break order 1..N as loaded, leaving change
    /// tags alone
    pub fn compact_orders(&mut self) {
        for sequence in [Sequence::Columns, Sequence::Sorts, Sequence::Breaks] {
            order::compact(&mut self.columns, sequence);
        }
    }

    pub fn column(&self, column_id: &str) -> Option<&ColumnSetting> {
        self.columns.iter().find(|c| c.column_id == column_id)
    }

    /// Column entry for `column_id`, appended as a pending insert if the
    /// server omitted it.
    fn column_entry(&mut self, column_id: &str) -> &mut ColumnSetting {
        let position = match self.columns.iter().position(|c| c.column_id == column_id) {
            Some(position) => position,
            None => {
                let seq = order::next_position(&self.columns, Sequence::Columns);
                let mut column = ColumnSetting::new(column_id, seq);
                column.operation = Change::Inserted;
                self.columns.push(column);
                order::renumber(&mut self.columns, Sequence::Columns);
                self.columns.len() - 1
            }
        };
        &mut self.columns[position]
    }

    fn existing_column(&mut self, column_id: &str) -> GridResult<&mut ColumnSetting> {
        self.columns
            .iter_mut()
            .find(|c| c.column_id == column_id)
            .ok_or_else(|| GridError::UnknownSetting(format!("column '{}'", column_id)))
    }

    /// Columns in display order
    pub fn ordered_columns(&self) -> Vec<&ColumnSetting> {
        order::ordered_indices(&self.columns, Sequence::Columns)
            .into_iter()
            .map(|idx| &self.columns[idx])
            .collect()
    }

    /// Sorted columns in sort order
    pub fn sorts(&self) -> Vec<&ColumnSetting> {
        order::ordered_indices(&self.columns, Sequence::Sorts)
            .into_iter()
            .map(|idx| &self.columns[idx])
            .collect()
    }

    /// Break columns in break order
    pub fn control_breaks(&self) -> Vec<&ColumnSetting> {
        order::ordered_indices(&self.columns, Sequence::Breaks)
            .into_iter()
            .map(|idx| &self.columns[idx])
            .collect()
    }

    pub fn live_aggregations(&self) -> impl Iterator<Item = &SettingItem<Aggregate>> {
        self.aggregations.iter().filter(|a| a.is_live())
    }

    pub fn live_highlights(&self) -> impl Iterator<Item = &SettingItem<Highlight>> {
        self.highlights.iter().filter(|h| h.is_live())
    }

    pub fn add_aggregate(&mut self, aggregate: Aggregate) -> GridResult<ItemRef> {
        aggregate.validate()?;
        let duplicate = self.live_aggregations().any(|a| {
            a.payload.function == aggregate.function && a.payload.column_id == aggregate.column_id
        });
        if duplicate {
            return Err(GridError::Validation(format!(
                "{:?} of '{}' already exists",
                aggregate.function, aggregate.column_id
            )));
        }
        Ok(item::insert_item(&mut self.aggregations, aggregate))
    }

    pub fn update_aggregate(&mut self, item: &ItemRef, aggregate: Aggregate) -> GridResult<()> {
        aggregate.validate()?;
        item::update_item(&mut self.aggregations, item, aggregate)
    }

    pub fn delete_aggregate(&mut self, item: &ItemRef) -> GridResult<()> {
        item::delete_item(&mut self.aggregations, item)
    }

    pub fn set_aggregate_enabled(&mut self, item: &ItemRef, enabled: bool) -> GridResult<()> {
        item::set_item_enabled(&mut self.aggregations, item, enabled)
    }

    pub fn add_highlight(&mut self, highlight: Highlight) -> GridResult<ItemRef> {
        highlight.validate()?;
        Ok(item::insert_item(&mut self.highlights, highlight))
    }

    pub fn update_highlight(&mut self, item: &ItemRef, highlight: Highlight) -> GridResult<()> {
        highlight.validate()?;
        item::update_item(&mut self.highlights, item, highlight)
    }

    pub fn delete_highlight(&mut self, item: &ItemRef) -> GridResult<()> {
        item::delete_item(&mut self.highlights, item)
    }

    pub fn set_highlight_enabled(&mut self, item: &ItemRef, enabled: bool) -> GridResult<()> {
        item::set_item_enabled(&mut self.highlights, item, enabled)
    }

    /// Add a control break on `column_id` after the existing breaks
    pub fn add_control_break(&mut self, column_id: &str, direction: Direction) -> GridResult<()> {
        let order = order::next_position(&self.columns, Sequence::Breaks);
        let column = self.column_entry(column_id);
        if column.control_break.is_some() {
            return Err(GridError::Validation(format!(
                "column '{}' already has a control break",
                column_id
            )));
        }
        column.control_break = Some(BreakSetting {
            order,
            direction,
            nulls: Nulls::Last,
            is_enabled: true,
        });
        column.mark_updated();
        order::renumber(&mut self.columns, Sequence::Breaks);
        Ok(())
    }

    pub fn update_control_break(
        &mut self,
        column_id: &str,
        direction: Direction,
        is_enabled: bool,
    ) -> GridResult<()> {
        let column = self.existing_column(column_id)?;
        let brk = column
            .control_break
            .as_mut()
            .ok_or_else(|| GridError::UnknownSetting(format!("control break on '{}'", column_id)))?;
        if brk.direction != direction || brk.is_enabled != is_enabled {
            brk.direction = direction;
            brk.is_enabled = is_enabled;
            column.mark_updated();
        }
        Ok(())
    }

    pub fn delete_control_break(&mut self, column_id: &str) -> GridResult<()> {
        let column = self.existing_column(column_id)?;
        if column.control_break.take().is_none() {
            return Err(GridError::UnknownSetting(format!("control break on '{}'", column_id)));
        }
        column.mark_updated();
        order::renumber(&mut self.columns, Sequence::Breaks);
        Ok(())
    }

    pub fn move_control_break(&mut self, column_id: &str, position: usize) -> GridResult<()> {
        order::move_to(&mut self.columns, Sequence::Breaks, column_id, position)
    }

    /// Sort on `column_id`; an existing sort keeps its position
    pub fn set_sort(&mut self, column_id: &str, direction: Direction, nulls: Nulls) -> GridResult<()> {
        let next = order::next_position(&self.columns, Sequence::Sorts);
        let column = self.column_entry(column_id);
        match column.sort.as_mut() {
            Some(sort) if sort.direction == direction && sort.nulls == nulls => return Ok(()),
            Some(sort) => {
                sort.direction = direction;
                sort.nulls = nulls;
            }
            None => {
                column.sort = Some(SortSetting {
                    order: next,
                    direction,
                    nulls,
                });
            }
        }
        column.mark_updated();
        order::renumber(&mut self.columns, Sequence::Sorts);
        Ok(())
    }

    pub fn clear_sort(&mut self, column_id: &str) -> GridResult<()> {
        let column = self.existing_column(column_id)?;
        if column.sort.take().is_none() {
            return Err(GridError::UnknownSetting(format!("sort on '{}'", column_id)));
        }
        column.mark_updated();
        order::renumber(&mut self.columns, Sequence::Sorts);
        Ok(())
    }

    pub fn move_sort(&mut self, column_id: &str, position: usize) -> GridResult<()> {
        order::move_to(&mut self.columns, Sequence::Sorts, column_id, position)
    }

    pub fn move_column(&mut self, column_id: &str, position: usize) -> GridResult<()> {
        order::move_to(&mut self.columns, Sequence::Columns, column_id, position)
    }

    pub fn set_column_width(&mut self, column_id: &str, width: u32) -> GridResult<()> {
        if width == 0 {
            return Err(GridError::Validation("column width must be positive".into()));
        }
        let column = self.column_entry(column_id);
        if column.width != Some(width) {
            column.width = Some(width);
            column.mark_updated();
        }
        Ok(())
    }

    pub fn set_column_visible(&mut self, column_id: &str, visible: bool) -> GridResult<()> {
        let column = self.column_entry(column_id);
        if column.is_visible != visible {
            column.is_visible = visible;
            column.mark_updated();
        }
        Ok(())
    }

    pub fn set_column_frozen(&mut self, column_id: &str, frozen: bool) -> GridResult<()> {
        let column = self.column_entry(column_id);
        if column.is_frozen != frozen {
            column.is_frozen = frozen;
            column.mark_updated();
        }
        Ok(())
    }

    pub fn has_pending_changes(&self) -> bool {
        self.columns.iter().any(|c| !c.change().is_unchanged())
            || self.aggregations.iter().any(|a| !a.change().is_unchanged())
            || self.highlights.iter().any(|h| !h.change().is_unchanged())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::item::AggregateFunction;

    #[test]
    fn test_control_break_lifecycle_keeps_order_contiguous() {
        let mut view = ViewSettings::with_columns(["DEPTNO", "JOB", "ENAME"]);
        view.add_control_break("DEPTNO", Direction::Asc).unwrap();
        view.add_control_break("JOB", Direction::Desc).unwrap();
        view.add_control_break("ENAME", Direction::Asc).unwrap();

        view.delete_control_break("DEPTNO").unwrap();
        let orders: Vec<(String, u32)> = view
            .control_breaks()
            .iter()
            .map(|c| (c.column_id.clone(), c.control_break.as_ref().unwrap().order))
            .collect();
        assert_eq!(orders, vec![("JOB".to_string(), 1), ("ENAME".to_string(), 2)]);
        assert!(order::is_contiguous(&view.columns, Sequence::Breaks));
    }

    #[test]
    fn test_duplicate_break_is_rejected() {
        let mut view = ViewSettings::with_columns(["DEPTNO"]);
        view.add_control_break("DEPTNO", Direction::Asc).unwrap();
        assert!(matches!(
            view.add_control_break("DEPTNO", Direction::Asc),
            Err(GridError::Validation(_))
        ));
    }

    #[test]
    fn test_sort_on_unlisted_column_inserts_entry() {
        let mut view = ViewSettings::with_columns(["A"]);
        view.set_sort("B", Direction::Desc, Nulls::First).unwrap();
        let column = view.column("B").unwrap();
        assert_eq!(column.operation, Change::Inserted);
        assert_eq!(column.seq, 2);
        assert_eq!(column.sort.as_ref().unwrap().order, 1);
    }

    #[test]
    fn test_implicit_column_closes_gapped_seq() {
        let mut view: ViewSettings = serde_json::from_value(serde_json::json!({
            "columns": [{"columnId": "A", "seq": 1}, {"columnId": "B", "seq": 5}]
        }))
        .unwrap();
        view.set_column_width("C", 80).unwrap();

        let seqs: Vec<(String, u32)> = view
            .ordered_columns()
            .iter()
            .map(|c| (c.column_id.clone(), c.seq))
            .collect();
        assert_eq!(
            seqs,
            vec![("A".to_string(), 1), ("B".to_string(), 2), ("C".to_string(), 3)]
        );
        assert_eq!(view.column("B").unwrap().operation, Change::Updated);
        assert_eq!(view.column("C").unwrap().operation, Change::Inserted);
        assert!(order::is_contiguous(&view.columns, Sequence::Columns));
    }

    #[test]
    fn test_sort_after_missing_seq_stays_contiguous() {
        let mut view: ViewSettings = serde_json::from_value(serde_json::json!({
            "columns": [{"columnId": "A"}, {"columnId": "B"}]
        }))
        .unwrap();
        view.set_sort("C", Direction::Asc, Nulls::Last).unwrap();

        let seqs: Vec<u32> = view.columns.iter().map(|c| c.seq).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
        assert!(order::is_contiguous(&view.columns, Sequence::Columns));
    }

    #[test]
    fn test_compact_orders_leaves_tags_alone() {
        let mut view: ViewSettings = serde_json::from_value(serde_json::json!({
            "columns": [{"columnId": "A", "seq": 3}, {"columnId": "B", "seq": 7}]
        }))
        .unwrap();
        view.compact_orders();
        assert_eq!(view.column("A").unwrap().seq, 1);
        assert_eq!(view.column("B").unwrap().seq, 2);
        assert!(!view.has_pending_changes());
    }

    #[test]
    fn test_unchanged_width_does_not_tag() {
        let mut view = ViewSettings::with_columns(["A"]);
        view.set_column_width("A", 120).unwrap();
        view.columns[0].operation = Change::Unchanged;
        view.set_column_width("A", 120).unwrap();
        assert!(!view.has_pending_changes());
    }

    #[test]
    fn test_duplicate_aggregate_is_rejected() {
        let mut view = ViewSettings::with_columns(["SAL"]);
        view.add_aggregate(Aggregate::new(AggregateFunction::Sum, "SAL")).unwrap();
        assert!(view
            .add_aggregate(Aggregate::new(AggregateFunction::Sum, "SAL"))
            .is_err());
        assert!(view
            .add_aggregate(Aggregate::new(AggregateFunction::Avg, "SAL"))
            .is_ok());
    }
}
