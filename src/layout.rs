use crate::pdf::{millimeters_to_points, Color, Font};
use crate::shaping::TextShaper;
use crate::table::CellValue;

/// Above this number of columns the record is laid out vertically, one column per row.
pub const VERTICAL_LAYOUT_THRESHOLD: usize = 10;

/// The text written in place of a missing value.
pub const MISSING_VALUE_TEXT: &str = "-";

/// Size and margins of a page, in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSetup {
    pub width: f32,
    pub height: f32,
    pub margin: f32,
}

impl PageSetup {
    pub fn a4_landscape() -> PageSetup {
        PageSetup {
            width: millimeters_to_points(297.0),
            height: millimeters_to_points(210.0),
            margin: 30.0,
        }
    }

    /// The width available to the content between the margins.
    pub fn frame_width(&self) -> f32 {
        self.width - 2.0 * self.margin
    }

    /// The highest position the content can reach.
    pub fn frame_top(&self) -> f32 {
        self.height - self.margin
    }

    /// The lowest position the content can reach.
    pub fn frame_bottom(&self) -> f32 {
        self.margin
    }
}

impl Default for PageSetup {
    fn default() -> Self {
        PageSetup::a4_landscape()
    }
}

/// How the values of a record are arranged in the table of its document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyLayout {
    /// One row per column, made of the value followed by the column name.
    Vertical,
    /// A row of column names over a row of values, both reversed so that the first column is on the right.
    Horizontal,
}

impl BodyLayout {
    pub fn for_column_count(column_count: usize) -> BodyLayout {
        if column_count > VERTICAL_LAYOUT_THRESHOLD {
            BodyLayout::Vertical
        } else {
            BodyLayout::Horizontal
        }
    }

    /// Builds the shaped text of every cell of the table. The values are taken from `record`,
    /// which is `None` when there is no record to take them from.
    pub fn table_rows(
        &self,
        columns: &[String],
        record: Option<&[CellValue]>,
        shaper: &TextShaper,
    ) -> Vec<Vec<String>> {
        let shaped_values: Vec<String> = (0..columns.len())
            .map(|column_index| {
                let value_text = record
                    .and_then(|record| record.get(column_index))
                    .and_then(CellValue::display_text)
                    .unwrap_or_else(|| MISSING_VALUE_TEXT.to_string());
                shaper.shape_str(&value_text)
            })
            .collect();
        let shaped_columns = columns.iter().map(|column| shaper.shape_str(column));

        match self {
            BodyLayout::Vertical => shaped_values
                .into_iter()
                .zip(shaped_columns)
                .map(|(shaped_value, shaped_column)| vec![shaped_value, shaped_column])
                .collect(),
            BodyLayout::Horizontal => {
                let mut header_row: Vec<String> = shaped_columns.collect();
                let mut value_row = shaped_values;
                header_row.reverse();
                value_row.reverse();
                vec![header_row, value_row]
            }
        }
    }
}

/// Colors, font sizes and paddings of the data table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableStyle {
    pub header_background: Color,
    pub header_text_color: Color,
    pub header_font_size: f32,
    pub header_bottom_padding: f32,
    /// Backgrounds of the body rows, alternating from the first one.
    pub body_backgrounds: [Color; 2],
    pub body_text_color: Color,
    pub body_font_size: f32,
    pub grid_color: Color,
    pub grid_width: f32,
    pub horizontal_padding: f32,
    pub vertical_padding: f32,
    /// Line height as a multiple of the font size.
    pub leading: f32,
}

impl Default for TableStyle {
    fn default() -> Self {
        TableStyle {
            header_background: [0.5, 0.5, 0.5],
            header_text_color: [0.96, 0.96, 0.96],
            header_font_size: 12.0,
            header_bottom_padding: 12.0,
            body_backgrounds: [[1.0, 1.0, 1.0], [0.83, 0.83, 0.83]],
            body_text_color: [0.0, 0.0, 0.0],
            body_font_size: 10.0,
            grid_color: [0.0, 0.0, 0.0],
            grid_width: 1.0,
            horizontal_padding: 6.0,
            vertical_padding: 3.0,
            leading: 1.2,
        }
    }
}

impl TableStyle {
    /// The row at index 0 is the header band, every other row belongs to the body.
    pub fn font_size(&self, row_index: usize) -> f32 {
        if row_index == 0 {
            self.header_font_size
        } else {
            self.body_font_size
        }
    }

    pub fn background(&self, row_index: usize) -> Color {
        if row_index == 0 {
            self.header_background
        } else {
            self.body_backgrounds[(row_index - 1) % 2]
        }
    }

    pub fn text_color(&self, row_index: usize) -> Color {
        if row_index == 0 {
            self.header_text_color
        } else {
            self.body_text_color
        }
    }

    pub fn bottom_padding(&self, row_index: usize) -> f32 {
        if row_index == 0 {
            self.header_bottom_padding
        } else {
            self.vertical_padding
        }
    }

    pub fn row_height(&self, row_index: usize) -> f32 {
        self.vertical_padding
            + self.font_size(row_index) * self.leading
            + self.bottom_padding(row_index)
    }
}

/// The measured geometry of a table, independent of where it is drawn.
#[derive(Debug, Clone, PartialEq)]
pub struct TableLayout {
    pub column_widths: Vec<f32>,
    pub row_heights: Vec<f32>,
}

impl TableLayout {
    /// Fits every column to its widest cell, scaling all of them down proportionally when
    /// the table would not fit in the available width.
    pub fn measure(rows: &[Vec<String>], style: &TableStyle, font: &Font, available_width: f32) -> TableLayout {
        let column_count = rows.iter().map(Vec::len).max().unwrap_or(0);
        let minimum_width = 2.0 * style.horizontal_padding;

        let mut column_widths = vec![minimum_width; column_count];
        for (row_index, row) in rows.iter().enumerate() {
            let font_size = style.font_size(row_index);
            for (column_index, cell) in row.iter().enumerate() {
                let cell_width = font.text_width(cell, font_size) + 2.0 * style.horizontal_padding;
                column_widths[column_index] = column_widths[column_index].max(cell_width);
            }
        }

        let total_width: f32 = column_widths.iter().sum();
        if total_width > available_width && total_width > 0.0 {
            let scaling = available_width / total_width;
            log::debug!("Scaling the table columns down by {:.3} to fit the page", scaling);
            column_widths.iter_mut().for_each(|width| *width *= scaling);
        }

        let row_heights = (0..rows.len()).map(|row_index| style.row_height(row_index)).collect();

        TableLayout {
            column_widths,
            row_heights,
        }
    }

    pub fn width(&self) -> f32 {
        self.column_widths.iter().sum()
    }

    /// The position of the right edge of every column, starting from the left edge of the table.
    pub fn column_right_edges(&self, table_left: f32) -> Vec<f32> {
        self.column_widths
            .iter()
            .scan(table_left, |edge, width| {
                *edge += width;
                Some(*edge)
            })
            .collect()
    }
}

/// Splits the rows of a table across pages. The first page has `first_page_height` points
/// available, the next ones `page_height`, and every page after the first starts again with
/// the header band (row 0). A row taller than a page still gets a page of its own.
pub fn paginate(row_heights: &[f32], first_page_height: f32, page_height: f32) -> Vec<Vec<usize>> {
    let mut pages: Vec<Vec<usize>> = Vec::new();
    let mut current_page: Vec<usize> = Vec::new();
    let mut remaining_height = first_page_height;
    // Number of rows of the current page which are repeated from the previous ones
    let mut repeated_rows = 0;

    for (row_index, row_height) in row_heights.iter().enumerate() {
        let has_own_rows = current_page.len() > repeated_rows;
        if *row_height > remaining_height && has_own_rows {
            pages.push(std::mem::take(&mut current_page));
            remaining_height = page_height;
            repeated_rows = 0;
            if row_index > 0 {
                current_page.push(0);
                remaining_height -= row_heights[0];
                repeated_rows = 1;
            }
        }
        current_page.push(row_index);
        remaining_height -= row_height;
    }
    if !current_page.is_empty() {
        pages.push(current_page);
    }

    pages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shaping::ShapingCapability;

    fn identity_shaper() -> TextShaper {
        TextShaper::new(ShapingCapability::Unavailable)
    }

    fn columns(count: usize) -> Vec<String> {
        (0..count).map(|index| format!("column {}", index)).collect()
    }

    #[test]
    fn layout_switches_above_ten_columns() {
        assert_eq!(BodyLayout::for_column_count(0), BodyLayout::Horizontal);
        assert_eq!(BodyLayout::for_column_count(10), BodyLayout::Horizontal);
        assert_eq!(BodyLayout::for_column_count(11), BodyLayout::Vertical);
    }

    #[test]
    fn horizontal_rows_are_reversed() {
        let record = [CellValue::text("Alice"), CellValue::Integer(30), CellValue::Empty];
        let rows = BodyLayout::Horizontal.table_rows(
            &["name".to_string(), "age".to_string(), "city".to_string()],
            Some(&record),
            &identity_shaper(),
        );

        similar_asserts::assert_eq!(
            rows,
            vec![vec!["city", "age", "name"], vec!["-", "30", "Alice"]]
        );
    }

    #[test]
    fn vertical_rows_put_the_value_before_the_column_name() {
        let column_names = columns(11);
        let record: Vec<CellValue> = (0..11).map(CellValue::Integer).collect();
        let rows = BodyLayout::Vertical.table_rows(&column_names, Some(&record), &identity_shaper());

        assert_eq!(rows.len(), 11);
        assert_eq!(rows[0], vec!["0", "column 0"]);
        assert_eq!(rows[10], vec!["10", "column 10"]);
    }

    #[test]
    fn missing_record_renders_dashes() {
        let rows = BodyLayout::Horizontal.table_rows(&columns(2), None, &identity_shaper());

        assert_eq!(rows[1], vec!["-", "-"]);
    }

    #[test]
    fn row_heights_follow_the_style() {
        let style = TableStyle::default();

        assert!((style.row_height(0) - (3.0 + 14.4 + 12.0)).abs() < 1e-4);
        assert!((style.row_height(1) - (3.0 + 12.0 + 3.0)).abs() < 1e-4);
        assert_eq!(style.background(1), [1.0, 1.0, 1.0]);
        assert_eq!(style.background(2), [0.83, 0.83, 0.83]);
        assert_eq!(style.background(3), [1.0, 1.0, 1.0]);
    }

    #[test]
    fn wide_tables_are_scaled_to_the_frame() {
        let style = TableStyle::default();
        let font = Font::helvetica();
        let wide_row: Vec<String> = (0..10).map(|_| "W".repeat(40)).collect();
        let rows = vec![wide_row.clone(), wide_row];

        let layout = TableLayout::measure(&rows, &style, &font, 500.0);

        assert!((layout.width() - 500.0).abs() < 1e-2, "{}", layout.width());
        assert_eq!(layout.row_heights.len(), 2);
    }

    #[test]
    fn narrow_tables_keep_their_natural_width() {
        let style = TableStyle::default();
        let font = Font::helvetica();
        let rows = vec![vec!["age".to_string(), "name".to_string()], vec!["30".to_string(), "Alice".to_string()]];

        let layout = TableLayout::measure(&rows, &style, &font, 500.0);

        let expected_first = font.text_width("age", 12.0) + 12.0;
        assert!((layout.column_widths[0] - expected_first).abs() < 1e-4);
        let edges = layout.column_right_edges(100.0);
        assert!((edges[1] - (100.0 + layout.width())).abs() < 1e-4);
    }

    #[test]
    fn rows_fitting_one_page_are_not_split() {
        assert_eq!(paginate(&[20.0, 10.0, 10.0], 100.0, 200.0), vec![vec![0, 1, 2]]);
        assert!(paginate(&[], 100.0, 200.0).is_empty());
    }

    #[test]
    fn header_band_is_repeated_on_new_pages() {
        let row_heights = [20.0, 10.0, 10.0, 10.0, 10.0, 10.0];

        let pages = paginate(&row_heights, 45.0, 40.0);

        similar_asserts::assert_eq!(pages, vec![vec![0, 1, 2], vec![0, 3, 4], vec![0, 5]]);
    }

    #[test]
    fn oversized_rows_still_get_a_page() {
        let pages = paginate(&[20.0, 500.0, 10.0], 100.0, 100.0);

        assert_eq!(pages, vec![vec![0], vec![0, 1], vec![0, 2]]);
    }
}
