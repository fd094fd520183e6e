use std::hash::{Hash, Hasher};

/// The content of a single cell of the source table.
#[derive(Debug, Clone)]
pub enum CellValue {
    /// The cell is missing, either because it was empty in the source or because the row was short.
    Empty,
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
}

impl CellValue {
    /// Builds a text cell, normalizing the empty string to a missing value.
    pub fn text<S: Into<String>>(text: S) -> CellValue {
        let text = text.into();
        if text.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(text)
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// The textual rendition of the cell, `None` when the cell is missing.
    pub fn display_text(&self) -> Option<String> {
        match self {
            CellValue::Empty => None,
            CellValue::Text(text) => Some(text.clone()),
            CellValue::Integer(integer) => Some(integer.to_string()),
            CellValue::Float(float) => Some(format_float(*float)),
            CellValue::Boolean(true) => Some("True".into()),
            CellValue::Boolean(false) => Some("False".into()),
        }
    }
}

// Floats are compared bitwise, NaN included.
impl PartialEq for CellValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (CellValue::Empty, CellValue::Empty) => true,
            (CellValue::Text(left), CellValue::Text(right)) => left == right,
            (CellValue::Integer(left), CellValue::Integer(right)) => left == right,
            (CellValue::Float(left), CellValue::Float(right)) => left.to_bits() == right.to_bits(),
            (CellValue::Boolean(left), CellValue::Boolean(right)) => left == right,
            _ => false,
        }
    }
}

impl Eq for CellValue {}

impl Hash for CellValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            CellValue::Empty => {}
            CellValue::Text(text) => text.hash(state),
            CellValue::Integer(integer) => integer.hash(state),
            CellValue::Float(float) => float.to_bits().hash(state),
            CellValue::Boolean(boolean) => boolean.hash(state),
        }
    }
}

/// Whole floats are written without their decimals (`30` rather than `30.0`).
fn format_float(float: f64) -> String {
    if float.is_finite() && float.fract() == 0.0 && float.abs() < 1e15 {
        format!("{}", float as i64)
    } else {
        format!("{}", float)
    }
}

static EMPTY_CELL: CellValue = CellValue::Empty;

/// An immutable table made of named columns and rows of cells. Every row has exactly
/// as many cells as there are columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

impl Table {
    /// Builds a table from its header and rows. Short rows are padded with missing cells
    /// and long rows are truncated to the header width.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<CellValue>>) -> Table {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, CellValue::Empty);
                row
            })
            .collect();

        Table { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn column_index(&self, column_name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == column_name)
    }

    /// Iterates over the cells of a single column, top to bottom.
    pub fn column_cells(&self, column_index: usize) -> impl Iterator<Item = &CellValue> + '_ {
        self.rows
            .iter()
            .map(move |row| row.get(column_index).unwrap_or(&EMPTY_CELL))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_floats_lose_their_decimals() {
        assert_eq!(CellValue::Float(30.0).display_text().as_deref(), Some("30"));
        assert_eq!(CellValue::Float(2.5).display_text().as_deref(), Some("2.5"));
        assert_eq!(CellValue::Empty.display_text(), None);
    }

    #[test]
    fn empty_text_is_a_missing_value() {
        assert!(CellValue::text("").is_empty());
        assert_eq!(CellValue::text(" "), CellValue::Text(" ".into()));
    }

    #[test]
    fn ragged_rows_are_fitted_to_the_header() {
        let table = Table::new(
            vec!["a".into(), "b".into()],
            vec![
                vec![CellValue::Integer(1)],
                vec![
                    CellValue::Integer(2),
                    CellValue::Integer(3),
                    CellValue::Integer(4),
                ],
            ],
        );

        assert!(table.rows().iter().all(|row| row.len() == 2));
        assert_eq!(
            table.column_cells(1).cloned().collect::<Vec<_>>(),
            vec![CellValue::Empty, CellValue::Integer(3)]
        );
    }

    #[test]
    fn integer_and_text_keys_are_distinct() {
        assert_ne!(CellValue::Integer(1), CellValue::Text("1".into()));
        assert_eq!(CellValue::Float(f64::NAN), CellValue::Float(f64::NAN));
    }
}
