//! Contiguous 1..N numbering of column order, sorts and control breaks
//!
//! Gaps are not a valid "unchanged" signal for the diff step, so every insert,
//! delete or move renumbers the remaining entries and tags each entry whose
//! number moved as updated.

use super::column::ColumnSetting;
use super::item::Tracked;
use crate::error::{GridError, GridResult};

/// One of the ordered sequences carried by a view's columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sequence {
    /// Display order (`seq`), every column takes part
    Columns,
    /// Sort order, only sorted columns take part
    Sorts,
    /// Control break order, only break columns take part
    Breaks,
}

impl Sequence {
    fn get(self, column: &ColumnSetting) -> Option<u32> {
        match self {
            Sequence::Columns => Some(column.seq),
            Sequence::Sorts => column.sort.as_ref().map(|sort| sort.order),
            Sequence::Breaks => column.control_break.as_ref().map(|brk| brk.order),
        }
    }

    fn set(self, column: &mut ColumnSetting, value: u32) {
        match self {
            Sequence::Columns => column.seq = value,
            Sequence::Sorts => {
                if let Some(sort) = column.sort.as_mut() {
                    sort.order = value;
                }
            }
            Sequence::Breaks => {
                if let Some(brk) = column.control_break.as_mut() {
                    brk.order = value;
                }
            }
        }
    }
}

/// Indices of the columns taking part in `sequence`, in their current order.
/// Ties keep document order.
pub fn ordered_indices(columns: &[ColumnSetting], sequence: Sequence) -> Vec<usize> {
    let mut keyed: Vec<(u32, usize)> = columns
        .iter()
        .enumerate()
        .filter_map(|(idx, column)| sequence.get(column).map(|order| (order, idx)))
        .collect();
    keyed.sort();
    keyed.into_iter().map(|(_, idx)| idx).collect()
}

/// Number after the highest one in use, for appending
pub fn next_position(columns: &[ColumnSetting], sequence: Sequence) -> u32 {
    columns.iter().filter_map(|c| sequence.get(c)).max().unwrap_or(0) + 1
}

/// Renumber to 1..N without tagging anything, for payloads as they arrive
/// from the server.
pub fn compact(columns: &mut [ColumnSetting], sequence: Sequence) {
    let order = ordered_indices(columns, sequence);
    for (pos, idx) in order.into_iter().enumerate() {
        sequence.set(&mut columns[idx], pos as u32 + 1);
    }
}

fn assign(columns: &mut [ColumnSetting], order: &[usize], sequence: Sequence) -> usize {
    let mut changed = 0;
    for (pos, &idx) in order.iter().enumerate() {
        let number = pos as u32 + 1;
        if sequence.get(&columns[idx]) != Some(number) {
            sequence.set(&mut columns[idx], number);
            columns[idx].mark_updated();
            changed += 1;
        }
    }
    changed
}

/// Close gaps and duplicates. Returns how many entries were renumbered.
pub fn renumber(columns: &mut [ColumnSetting], sequence: Sequence) -> usize {
    let order = ordered_indices(columns, sequence);
    assign(columns, &order, sequence)
}

/// Move `column_id` to the 1-based `position` within `sequence`, then renumber.
/// Positions past the end clamp to the last slot.
pub fn move_to(
    columns: &mut [ColumnSetting],
    sequence: Sequence,
    column_id: &str,
    position: usize,
) -> GridResult<()> {
    let mut order = ordered_indices(columns, sequence);
    let current = order
        .iter()
        .position(|&idx| columns[idx].column_id == column_id)
        .ok_or_else(|| {
            GridError::UnknownSetting(format!("column '{}' is not in the {:?} order", column_id, sequence))
        })?;

    let idx = order.remove(current);
    let target = position.saturating_sub(1).min(order.len());
    order.insert(target, idx);
    assign(columns, &order, sequence);
    Ok(())
}

/// Whether the numbers of `sequence` are exactly 1..N
pub fn is_contiguous(columns: &[ColumnSetting], sequence: Sequence) -> bool {
    let mut numbers: Vec<u32> = columns.iter().filter_map(|c| sequence.get(c)).collect();
    numbers.sort_unstable();
    numbers
        .iter()
        .enumerate()
        .all(|(pos, &number)| number == pos as u32 + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::column::{Direction, Nulls, SortSetting};
    use crate::settings::item::Change;

    fn sorted(column_id: &str, order: u32) -> ColumnSetting {
        let mut column = ColumnSetting::new(column_id, order);
        column.sort = Some(SortSetting {
            order,
            direction: Direction::Asc,
            nulls: Nulls::Last,
        });
        column
    }

    fn sort_orders(columns: &[ColumnSetting]) -> Vec<(String, u32)> {
        ordered_indices(columns, Sequence::Sorts)
            .into_iter()
            .map(|idx| (columns[idx].column_id.clone(), columns[idx].sort.as_ref().unwrap().order))
            .collect()
    }

    #[test]
    fn test_move_last_sort_to_front() {
        let mut columns = vec![sorted("A", 1), sorted("B", 2), sorted("C", 3)];
        move_to(&mut columns, Sequence::Sorts, "C", 1).unwrap();

        assert_eq!(
            sort_orders(&columns),
            vec![("C".to_string(), 1), ("A".to_string(), 2), ("B".to_string(), 3)]
        );
        assert!(columns.iter().all(|c| c.operation == Change::Updated));
    }

    #[test]
    fn test_renumber_closes_gap_after_delete() {
        let mut columns = vec![sorted("A", 1), sorted("B", 2), sorted("C", 3)];
        columns[1].sort = None;
        columns[1].mark_updated();

        assert_eq!(renumber(&mut columns, Sequence::Sorts), 1);
        assert!(is_contiguous(&columns, Sequence::Sorts));
        assert_eq!(columns[0].operation, Change::Unchanged);
        assert_eq!(columns[2].sort.as_ref().unwrap().order, 2);
        assert_eq!(columns[2].operation, Change::Updated);
    }

    #[test]
    fn test_renumber_resolves_duplicates_in_document_order() {
        let mut columns = vec![sorted("A", 2), sorted("B", 2), sorted("C", 5)];
        renumber(&mut columns, Sequence::Sorts);
        assert_eq!(
            sort_orders(&columns),
            vec![("A".to_string(), 1), ("B".to_string(), 2), ("C".to_string(), 3)]
        );
    }

    #[test]
    fn test_contiguous_sequence_is_untouched() {
        let mut columns = vec![ColumnSetting::new("A", 1), ColumnSetting::new("B", 2)];
        assert_eq!(renumber(&mut columns, Sequence::Columns), 0);
        assert!(columns.iter().all(|c| c.operation == Change::Unchanged));
    }

    #[test]
    fn test_compact_numbers_missing_seq_without_tagging() {
        let mut columns = vec![ColumnSetting::new("A", 0), ColumnSetting::new("B", 0), sorted("C", 4)];
        compact(&mut columns, Sequence::Columns);
        compact(&mut columns, Sequence::Sorts);

        let seqs: Vec<u32> = columns.iter().map(|c| c.seq).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
        assert_eq!(columns[2].sort.as_ref().unwrap().order, 1);
        assert!(columns.iter().all(|c| c.operation == Change::Unchanged));
    }

    #[test]
    fn test_next_position_follows_highest_number() {
        let columns = vec![ColumnSetting::new("A", 1), ColumnSetting::new("B", 5)];
        assert_eq!(next_position(&columns, Sequence::Columns), 6);
        assert_eq!(next_position(&columns, Sequence::Sorts), 1);
    }

    #[test]
    fn test_move_clamps_and_rejects_unknown() {
        let mut columns = vec![ColumnSetting::new("A", 1), ColumnSetting::new("B", 2)];
        move_to(&mut columns, Sequence::Columns, "A", 99).unwrap();
        assert_eq!(columns[0].seq, 2);
        assert_eq!(columns[1].seq, 1);
        assert!(move_to(&mut columns, Sequence::Sorts, "A", 1).is_err());
    }
}
