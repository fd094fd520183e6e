use std::collections::HashMap;

use crate::error::ColumnNotFoundError;
use crate::table::{CellValue, Table};

/// The rows of the table which share the same value in the key column, in their original order.
#[derive(Debug, Clone, PartialEq)]
pub struct Group<'a> {
    pub key: &'a CellValue,
    pub rows: Vec<&'a [CellValue]>,
    /// The positions of `rows` in the source table.
    pub row_indices: Vec<usize>,
}

impl<'a> Group<'a> {
    /// The name of the entity the group describes, which is the text of its key.
    pub fn entity_name(&self) -> String {
        self.key.display_text().unwrap_or_default()
    }
}

/// Partitions the rows of the table by the distinct values of the key column. Groups come out
/// in the order in which their key first appears, rows with a missing key belong to no group.
pub fn group_rows<'a>(table: &'a Table, key_column: &str) -> Result<Vec<Group<'a>>, ColumnNotFoundError> {
    let key_index = table
        .column_index(key_column)
        .ok_or_else(|| ColumnNotFoundError {
            requested_column: key_column.to_string(),
            available_columns: table.columns().to_vec(),
        })?;

    let mut groups: Vec<Group<'a>> = Vec::new();
    let mut group_positions: HashMap<&'a CellValue, usize> = HashMap::new();

    for (row_index, row) in table.rows().iter().enumerate() {
        let key = &row[key_index];
        if key.is_empty() {
            continue;
        }

        let position = *group_positions.entry(key).or_insert_with(|| {
            groups.push(Group {
                key,
                rows: Vec::new(),
                row_indices: Vec::new(),
            });
            groups.len() - 1
        });
        groups[position].rows.push(row.as_slice());
        groups[position].row_indices.push(row_index);
    }

    log::debug!(
        "Grouped {} rows into {} groups by the column {:?}",
        table.rows().len(),
        groups.len(),
        key_column
    );

    Ok(groups)
}
