//! Embedding child query results into their parent's rows.
//!
//! Each child adds one column to the parent. When merging is enabled and
//! the two tables share some (but not all) of the parent's column names,
//! every parent row receives the child rows whose shared columns hold the
//! same values. Otherwise the whole child table is embedded once, in the
//! first parent row, the way a drop-down's reference data is delivered.

use crate::table::{Cell, TypedTable};

/// A child's result and how to merge it.
#[derive(Debug, Clone)]
pub struct ChildResult {
    pub table: TypedTable,
    pub merge_field: Option<String>,
    pub merge: bool,
}

impl ChildResult {
    pub fn new(table: TypedTable, merge_field: Option<String>, merge: bool) -> Self {
        Self {
            table,
            merge_field,
            merge,
        }
    }
}

fn embed_in_first_row(parent: &mut TypedTable, column: usize, child: TypedTable) {
    if parent.rows.is_empty() {
        parent.rows.push(vec![Cell::Null; parent.columns.len()]);
    }
    parent.rows[0][column] = Cell::Table(child);
}

/// Pairs of (parent column, child column) whose names match
/// case-insensitively, over the first `parent_columns` parent columns.
fn matching_columns(
    parent: &TypedTable,
    parent_columns: usize,
    child: &TypedTable,
) -> Vec<(usize, usize)> {
    parent.columns[..parent_columns]
        .iter()
        .enumerate()
        .filter_map(|(p, name)| {
            let name = name.to_lowercase();
            child
                .columns
                .iter()
                .position(|c| c.to_lowercase() == name)
                .map(|c| (p, c))
        })
        .collect()
}

fn rows_match(parent_row: &[Cell], child_row: &[Cell], pairs: &[(usize, usize)]) -> bool {
    pairs.iter().all(|&(p, c)| {
        match (
            parent_row.get(p).and_then(Cell::match_key),
            child_row.get(c).and_then(Cell::match_key),
        ) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    })
}

/// Merges every child into `parent`, in order.
///
/// Child `k` (1-based) is placed in a new column named by its merge field
/// or `childAction<k>`.
pub fn merge_children(mut parent: TypedTable, children: Vec<ChildResult>) -> TypedTable {
    // synthetic merge columns never take part in matching
    let parent_columns = parent.columns.len();

    for (i, child) in children.into_iter().enumerate() {
        let name = child
            .merge_field
            .filter(|f| !f.is_empty())
            .unwrap_or_else(|| format!("childAction{}", i + 1));
        let column = parent.columns.len();
        parent.columns.push(name);
        for row in parent.rows.iter_mut() {
            row.resize(column + 1, Cell::Null);
        }

        if !child.merge {
            embed_in_first_row(&mut parent, column, child.table);
            continue;
        }

        let pairs = matching_columns(&parent, parent_columns, &child.table);
        if pairs.is_empty() || pairs.len() == parent_columns {
            embed_in_first_row(&mut parent, column, child.table);
            continue;
        }

        for row in parent.rows.iter_mut() {
            let current: &[Cell] = row;
            let subset: Vec<Vec<Cell>> = child
                .table
                .rows
                .iter()
                .filter(|child_row| rows_match(current, child_row, &pairs))
                .cloned()
                .collect();
            row[column] = if subset.is_empty() {
                Cell::Null
            } else {
                Cell::Table(TypedTable::with_rows(child.table.columns.clone(), subset))
            };
        }
    }

    parent
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(columns: &[&str], rows: Vec<Vec<Cell>>) -> TypedTable {
        TypedTable::with_rows(columns.iter().map(|c| c.to_string()).collect(), rows)
    }

    fn parent() -> TypedTable {
        table(
            &["id", "name"],
            vec![
                vec![Cell::Int(1), Cell::from("A")],
                vec![Cell::Int(2), Cell::from("B")],
            ],
        )
    }

    fn items() -> TypedTable {
        table(
            &["id", "qty"],
            vec![
                vec![Cell::Int(1), Cell::Int(5)],
                vec![Cell::Int(1), Cell::Int(7)],
                vec![Cell::Int(2), Cell::Int(3)],
            ],
        )
    }

    #[test]
    fn test_correlated_merge() {
        let merged = merge_children(
            parent(),
            vec![ChildResult::new(items(), Some("items".to_string()), true)],
        );
        assert_eq!(merged.columns, vec!["id", "name", "items"]);

        let first = merged.rows[0][2].as_table().unwrap();
        assert_eq!(first.columns, vec!["id", "qty"]);
        assert_eq!(
            first.rows,
            vec![
                vec![Cell::Int(1), Cell::Int(5)],
                vec![Cell::Int(1), Cell::Int(7)]
            ]
        );

        let second = merged.rows[1][2].as_table().unwrap();
        assert_eq!(second.rows, vec![vec![Cell::Int(2), Cell::Int(3)]]);
    }

    #[test]
    fn test_match_is_case_insensitive_and_coerced() {
        let child = table(
            &["ID", "qty"],
            vec![
                vec![Cell::from("1"), Cell::Int(5)],
                vec![Cell::Float(2.0), Cell::Int(3)],
            ],
        );
        let merged = merge_children(parent(), vec![ChildResult::new(child, None, true)]);
        assert_eq!(merged.columns[2], "childAction1");
        assert_eq!(merged.rows[0][2].as_table().unwrap().rows.len(), 1);
        assert_eq!(merged.rows[1][2].as_table().unwrap().rows.len(), 1);
    }

    #[test]
    fn test_unmatched_parent_row_gets_null() {
        let mut p = parent();
        p.rows.push(vec![Cell::Int(3), Cell::from("C")]);
        p.rows.push(vec![Cell::Null, Cell::from("D")]);
        let merged = merge_children(p, vec![ChildResult::new(items(), None, true)]);
        assert!(merged.rows[2][2].is_null());
        assert!(merged.rows[3][2].is_null());
    }

    #[test]
    fn test_no_overlap_embeds_once() {
        let lookup = table(
            &["code", "label"],
            vec![
                vec![Cell::from("x"), Cell::from("X")],
                vec![Cell::from("y"), Cell::from("Y")],
            ],
        );
        let merged = merge_children(
            parent(),
            vec![ChildResult::new(lookup.clone(), Some("codes".to_string()), true)],
        );
        assert_eq!(merged.rows[0][2], Cell::Table(lookup));
        assert!(merged.rows[1][2].is_null());
    }

    #[test]
    fn test_full_overlap_embeds_once() {
        let p = table(&["id"], vec![vec![Cell::Int(1)], vec![Cell::Int(2)]]);
        let merged = merge_children(p, vec![ChildResult::new(items(), None, true)]);
        assert_eq!(merged.rows[0][1], Cell::Table(items()));
        assert!(merged.rows[1][1].is_null());
    }

    #[test]
    fn test_disabled_merge_embeds_once() {
        let merged = merge_children(
            parent(),
            vec![ChildResult::new(items(), Some("all".to_string()), false)],
        );
        assert_eq!(merged.rows[0][2], Cell::Table(items()));
        assert!(merged.rows[1][2].is_null());
    }

    #[test]
    fn test_empty_parent_gets_a_row() {
        let p = table(&["id", "name"], vec![]);
        let merged = merge_children(p, vec![ChildResult::new(items(), None, false)]);
        assert_eq!(merged.rows.len(), 1);
        assert_eq!(merged.rows[0][0], Cell::Null);
        assert_eq!(merged.rows[0][2], Cell::Table(items()));
    }

    #[test]
    fn test_second_child_ignores_first_merge_column() {
        let first = table(&["id", "qty"], vec![vec![Cell::Int(1), Cell::Int(5)]]);
        let second = table(
            &["childAction1", "name", "note"],
            vec![vec![Cell::Null, Cell::from("A"), Cell::from("hello")]],
        );
        let merged = merge_children(
            parent(),
            vec![
                ChildResult::new(first, None, true),
                ChildResult::new(second, None, true),
            ],
        );
        assert_eq!(merged.columns, vec!["id", "name", "childAction1", "childAction2"]);
        let note = merged.rows[0][3].as_table().unwrap();
        assert_eq!(note.rows.len(), 1);
        assert!(merged.rows[1][3].is_null());
    }
}
