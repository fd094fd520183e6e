#![deny(clippy::unwrap_used, clippy::expect_used)]

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash as _, Hasher as _};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;

use crate::error::{ContextError, RenderError};
use crate::grouping::Group;
use crate::layout::{paginate, BodyLayout, PageSetup, TableLayout, TableStyle};
use crate::pdf::{Font, FontSource, PdfDocument};
use crate::shaping::reshaper::is_harakah;
use crate::shaping::TextShaper;
use crate::table::CellValue;

/// The label of the document title, followed by the name of the entity.
pub const REPORT_TITLE: &str = "گزارش اطلاعات";
/// The label of the generation timestamp.
pub const REPORT_DATE_LABEL: &str = "تاریخ تولید گزارش";

const TITLE_FONT_SIZE: f32 = 18.0;
const TITLE_LEADING: f32 = 24.0;
const TITLE_SPACE_AFTER: f32 = 30.0 + 36.0;
const TIMESTAMP_FONT_SIZE: f32 = 10.0;
const TIMESTAMP_LEADING: f32 = 14.0;
const TIMESTAMP_SPACE_AFTER: f32 = 21.6;

/// Everything needed in order to render the document of a single entity.
#[derive(Debug, Clone)]
pub struct RenderRequest<'a> {
    pub entity_name: String,
    /// The rows of the entity, all of them sharing the columns of the source table.
    pub rows: &'a [&'a [CellValue]],
    pub columns: &'a [String],
}

impl<'a> RenderRequest<'a> {
    pub fn from_group(group: &'a Group<'_>, columns: &'a [String]) -> RenderRequest<'a> {
        RenderRequest {
            entity_name: group.entity_name(),
            rows: &group.rows,
            columns,
        }
    }

    /// Only the first row of an entity is written to its document.
    pub fn first_row(&self) -> Option<&'a [CellValue]> {
        self.rows.first().copied()
    }

    pub fn layout(&self) -> BodyLayout {
        BodyLayout::for_column_count(self.columns.len())
    }
}

/// Something able to turn a `RenderRequest` into a document inside the output directory,
/// returning the path of the document it produced.
pub trait DocumentRenderer {
    fn render(&self, request: &RenderRequest<'_>, output_directory: &Path) -> Result<PathBuf, RenderError>;
}

/// Renders every request as an A4 landscape PDF made of a title, a timestamp and the data table.
#[derive(Debug, Clone)]
pub struct PdfRenderer {
    font: Font,
    shaper: TextShaper,
    page_setup: PageSetup,
    table_style: TableStyle,
    clock: fn() -> OffsetDateTime,
}

impl PdfRenderer {
    /// Without a font source the documents are written with Helvetica, which cannot display
    /// the characters outside of Latin-1.
    pub fn new(font_source: Option<&FontSource>, shaper: TextShaper) -> Result<PdfRenderer, ContextError> {
        let font = match font_source {
            Some(font_source) => Font::from_source(font_source)?,
            None => {
                log::warn!("No font has been provided, falling back to Helvetica");
                Font::helvetica()
            }
        };

        Ok(PdfRenderer {
            font,
            shaper,
            page_setup: PageSetup::a4_landscape(),
            table_style: TableStyle::default(),
            clock: local_now,
        })
    }

    /// Replaces the source of the generation timestamp written in the documents.
    pub fn with_clock(mut self, clock: fn() -> OffsetDateTime) -> PdfRenderer {
        self.clock = clock;
        self
    }

    pub fn shaper(&self) -> &TextShaper {
        &self.shaper
    }

    fn compose(&self, request: &RenderRequest<'_>, output_path: &Path) -> Result<(), ContextError> {
        let mut composer = DocumentComposer::new(self, &request.entity_name);
        composer.compose_header(&request.entity_name, (self.clock)())?;
        composer.compose_body(request)?;
        composer.serialize(output_path)
    }
}

impl DocumentRenderer for PdfRenderer {
    fn render(&self, request: &RenderRequest<'_>, output_directory: &Path) -> Result<PathBuf, RenderError> {
        let output_path = output_directory.join(format!("{}.pdf", sanitize_file_name(&request.entity_name)));

        self.compose(request, &output_path)
            .map_err(|cause| RenderError::new(request.entity_name.as_str(), cause))?;
        log::info!("Created the document {:?}", output_path);

        Ok(output_path)
    }
}

/// The stages a document goes through, each of them reachable only from the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositionStage {
    Initialized,
    HeaderComposed,
    BodyComposed,
    Serialized,
}

struct DocumentComposer<'r> {
    renderer: &'r PdfRenderer,
    stage: CompositionStage,
    pdf_document: PdfDocument,
    font_index: usize,
    page_index: usize,
    /// The vertical position below which the next element is placed.
    cursor: f32,
}

impl<'r> DocumentComposer<'r> {
    fn new(renderer: &'r PdfRenderer, entity_name: &str) -> DocumentComposer<'r> {
        let mut pdf_document = PdfDocument::new(document_identifier(entity_name));
        pdf_document.title = entity_name.to_string();
        let page_setup = renderer.page_setup;
        let page_index = pdf_document.add_page(page_setup.width, page_setup.height);
        let font_index = pdf_document.add_font(renderer.font.clone());

        DocumentComposer {
            renderer,
            stage: CompositionStage::Initialized,
            pdf_document,
            font_index,
            page_index,
            cursor: page_setup.frame_top(),
        }
    }

    fn compose_header(&mut self, entity_name: &str, timestamp: OffsetDateTime) -> Result<(), ContextError> {
        self.ensure_stage(CompositionStage::Initialized, CompositionStage::HeaderComposed)?;
        let renderer = self.renderer;
        let shaper = &renderer.shaper;
        let font = &renderer.font;
        let page_setup = renderer.page_setup;

        let title = format!("{}: {}", shaper.shape_str(REPORT_TITLE), shaper.shape_str(entity_name));
        let title_width = font.text_width(&title, TITLE_FONT_SIZE);
        let title_position = [
            (page_setup.width - title_width) / 2.0,
            self.cursor - TITLE_FONT_SIZE,
        ];
        self.pdf_document.write_text_to_page(
            self.page_index,
            [0.0, 0.0, 0.0],
            &title,
            self.font_index,
            TITLE_FONT_SIZE,
            title_position,
        )?;
        self.cursor -= TITLE_LEADING + TITLE_SPACE_AFTER;

        let timestamp_text = format!(
            "{}: {}",
            shaper.shape_str(REPORT_DATE_LABEL),
            format_timestamp(&timestamp)
        );
        let timestamp_width = font.text_width(&timestamp_text, TIMESTAMP_FONT_SIZE);
        let timestamp_position = [
            page_setup.width - page_setup.margin - timestamp_width,
            self.cursor - TIMESTAMP_FONT_SIZE,
        ];
        self.pdf_document.write_text_to_page(
            self.page_index,
            [0.0, 0.0, 0.0],
            &timestamp_text,
            self.font_index,
            TIMESTAMP_FONT_SIZE,
            timestamp_position,
        )?;
        self.cursor -= TIMESTAMP_LEADING + TIMESTAMP_SPACE_AFTER;

        self.pdf_document.creation_date = timestamp;
        self.advance(CompositionStage::HeaderComposed);
        Ok(())
    }

    fn compose_body(&mut self, request: &RenderRequest<'_>) -> Result<(), ContextError> {
        self.ensure_stage(CompositionStage::HeaderComposed, CompositionStage::BodyComposed)?;
        let renderer = self.renderer;
        let page_setup = renderer.page_setup;
        let style = &renderer.table_style;

        let body_layout = request.layout();
        let rows = body_layout.table_rows(request.columns, request.first_row(), &renderer.shaper);
        let table_layout = TableLayout::measure(&rows, style, &renderer.font, page_setup.frame_width());
        log::debug!(
            "Laying out {} rows of {} columns for {:?} with the {:?} layout",
            rows.len(),
            table_layout.column_widths.len(),
            request.entity_name,
            body_layout
        );

        let table_left = page_setup.margin + (page_setup.frame_width() - table_layout.width()) / 2.0;
        let pages = paginate(
            &table_layout.row_heights,
            self.cursor - page_setup.frame_bottom(),
            page_setup.frame_top() - page_setup.frame_bottom(),
        );

        for (page_number, page_rows) in pages.iter().enumerate() {
            if page_number > 0 {
                self.page_index = self.pdf_document.add_page(page_setup.width, page_setup.height);
                self.cursor = page_setup.frame_top();
            }
            self.draw_rows(&rows, page_rows, &table_layout, table_left)?;
        }

        self.advance(CompositionStage::BodyComposed);
        Ok(())
    }

    /// Draws the given rows of the table from the cursor downwards, then the grid around them.
    fn draw_rows(
        &mut self,
        rows: &[Vec<String>],
        page_rows: &[usize],
        table_layout: &TableLayout,
        table_left: f32,
    ) -> Result<(), ContextError> {
        let renderer = self.renderer;
        let style = &renderer.table_style;
        let table_width = table_layout.width();
        let column_right_edges = table_layout.column_right_edges(table_left);
        let table_top = self.cursor;
        let mut row_boundaries = vec![table_top];

        for row_index in page_rows.iter().copied() {
            let row_height = table_layout.row_heights[row_index];
            let row_bottom = self.cursor - row_height;
            self.pdf_document.fill_rectangle_in_page(
                self.page_index,
                style.background(row_index),
                [table_left, row_bottom, table_width, row_height],
            )?;

            let font_size = style.font_size(row_index);
            let baseline = row_bottom + style.bottom_padding(row_index) + font_size * (style.leading - 1.0);
            for (cell, right_edge) in rows[row_index].iter().zip(&column_right_edges) {
                if cell.is_empty() {
                    continue;
                }
                let text_width = renderer.font.text_width(cell, font_size);
                self.pdf_document.write_text_to_page(
                    self.page_index,
                    style.text_color(row_index),
                    cell,
                    self.font_index,
                    font_size,
                    [right_edge - style.horizontal_padding - text_width, baseline],
                )?;
            }

            self.cursor = row_bottom;
            row_boundaries.push(row_bottom);
        }

        let table_bottom = self.cursor;
        for boundary in row_boundaries {
            self.pdf_document.stroke_line_in_page(
                self.page_index,
                style.grid_color,
                style.grid_width,
                [table_left, boundary],
                [table_left + table_width, boundary],
            )?;
        }
        for edge in std::iter::once(table_left).chain(column_right_edges) {
            self.pdf_document.stroke_line_in_page(
                self.page_index,
                style.grid_color,
                style.grid_width,
                [edge, table_top],
                [edge, table_bottom],
            )?;
        }

        Ok(())
    }

    fn serialize(&mut self, output_path: &Path) -> Result<(), ContextError> {
        self.ensure_stage(CompositionStage::BodyComposed, CompositionStage::Serialized)?;

        let instance_id = self.pdf_document.identifier.clone();
        self.pdf_document.write_all(instance_id)?;
        self.pdf_document.save_to_path(output_path)?;

        self.advance(CompositionStage::Serialized);
        Ok(())
    }

    fn ensure_stage(&self, expected: CompositionStage, next: CompositionStage) -> Result<(), ContextError> {
        if self.stage != expected {
            return Err(ContextError::with_context(format!(
                "Cannot move the document to the stage {:?} from the stage {:?}",
                next, self.stage
            )));
        }
        Ok(())
    }

    fn advance(&mut self, next: CompositionStage) {
        log::trace!("Document {:?} moved from {:?} to {:?}", self.pdf_document.title, self.stage, next);
        self.stage = next;
    }
}

/// Keeps the alphanumeric characters, spaces, hyphens and underscores of the name, trimming the
/// surrounding whitespace. Harakat are dropped. A name left empty becomes `unnamed`.
pub fn sanitize_file_name(entity_name: &str) -> String {
    let sanitized: String = entity_name
        .chars()
        .filter(|character| !is_harakah(*character))
        .filter(|character| character.is_alphanumeric() || matches!(character, ' ' | '-' | '_'))
        .collect();
    let sanitized = sanitized.trim();

    if sanitized.is_empty() {
        "unnamed".to_string()
    } else {
        sanitized.to_string()
    }
}

/// Formats the time as `YYYY-MM-DD HH:MM`.
pub fn format_timestamp(timestamp: &OffsetDateTime) -> String {
    format!(
        "{:04}-{:02}-{:02} {:02}:{:02}",
        timestamp.year(),
        u8::from(timestamp.month()),
        timestamp.day(),
        timestamp.hour(),
        timestamp.minute()
    )
}

/// The local time when the offset can be determined, the UTC time otherwise.
fn local_now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

fn document_identifier(entity_name: &str) -> String {
    let mut hasher = DefaultHasher::new();
    entity_name.hash(&mut hasher);
    let first_half = hasher.finish();
    env!("CARGO_PKG_VERSION").hash(&mut hasher);
    let second_half = hasher.finish();

    format!("{:016x}{:016x}", first_half, second_half)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shaping::ShapingCapability;

    fn fixed_clock() -> OffsetDateTime {
        OffsetDateTime::UNIX_EPOCH
    }

    fn helvetica_renderer() -> PdfRenderer {
        PdfRenderer::new(None, TextShaper::new(ShapingCapability::Unavailable))
            .unwrap()
            .with_clock(fixed_clock)
    }

    const TEST_FONT_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fonts/DejaVuSans.ttf");

    fn page_text(document: &lopdf::Document, page_number: u32) -> String {
        let page_id = document.get_pages()[&page_number];
        String::from_utf8_lossy(&document.get_page_content(page_id).unwrap()).into_owned()
    }

    #[test]
    fn sanitized_names_keep_only_safe_characters() {
        assert_eq!(sanitize_file_name("Alice"), "Alice");
        assert_eq!(sanitize_file_name("  Dr. Bob/Smith?  "), "Dr BobSmith");
        assert_eq!(sanitize_file_name("علی رضایی"), "علی رضایی");
        assert_eq!(sanitize_file_name("a_b-c"), "a_b-c");
        assert_eq!(sanitize_file_name("../.."), "unnamed");
        assert_eq!(sanitize_file_name(""), "unnamed");
        assert_eq!(sanitize_file_name("بَت"), "بت");
        assert_eq!(sanitize_file_name("\u{064E}\u{0650}"), "unnamed");

        for name in ["x/y\\z", " \t", "<>:\"|?*", "ok name "] {
            let sanitized = sanitize_file_name(name);
            assert_eq!(sanitized, sanitize_file_name(name));
            assert_eq!(sanitized.trim(), sanitized);
            assert!(sanitized
                .chars()
                .all(|character| character.is_alphanumeric() || matches!(character, ' ' | '-' | '_')));
        }
    }

    #[test]
    fn timestamp_has_minute_precision() {
        let timestamp = OffsetDateTime::from_unix_timestamp(1_709_622_599).unwrap();

        assert_eq!(format_timestamp(&timestamp), "2024-03-05 07:09");
    }

    #[test]
    fn request_uses_the_first_row_of_the_group() {
        let key = CellValue::text("Alice");
        let first_row = [key.clone(), CellValue::Integer(30)];
        let second_row = [key.clone(), CellValue::Integer(31)];
        let group = Group {
            key: &key,
            rows: vec![&first_row[..], &second_row[..]],
            row_indices: vec![0, 2],
        };
        let columns = vec!["name".to_string(), "age".to_string()];

        let request = RenderRequest::from_group(&group, &columns);

        assert_eq!(request.entity_name, "Alice");
        assert_eq!(request.first_row(), Some(&first_row[..]));
        assert_eq!(request.layout(), BodyLayout::Horizontal);
    }

    #[test]
    fn rendered_document_contains_the_first_record() {
        let directory = tempfile::tempdir().unwrap();
        let first_row = [CellValue::text("Alice"), CellValue::Integer(30), CellValue::text("NY")];
        let second_row = [CellValue::text("Alice"), CellValue::Integer(31), CellValue::text("SF")];
        let rows: Vec<&[CellValue]> = vec![&first_row[..], &second_row[..]];
        let columns = vec!["name".to_string(), "age".to_string(), "city".to_string()];
        let request = RenderRequest {
            entity_name: "Alice".into(),
            rows: &rows,
            columns: &columns,
        };

        let output_path = helvetica_renderer().render(&request, directory.path()).unwrap();

        assert_eq!(output_path, directory.path().join("Alice.pdf"));
        let document = lopdf::Document::load(&output_path).unwrap();
        assert_eq!(document.get_pages().len(), 1);
        let content = page_text(&document, 1);
        assert!(content.contains("(NY)"), "{}", content);
        assert!(content.contains("(30)"), "{}", content);
        assert!(!content.contains("(SF)"), "{}", content);
        assert!(content.contains("1970-01-01 00:00"), "{}", content);
    }

    #[test]
    fn truetype_fonts_are_embedded_with_their_unicode_map() {
        let directory = tempfile::tempdir().unwrap();
        let font_source = FontSource::File(PathBuf::from(TEST_FONT_PATH));
        let renderer = PdfRenderer::new(Some(&font_source), TextShaper::new(ShapingCapability::Available))
            .unwrap()
            .with_clock(fixed_clock);
        let first_row = [CellValue::text("سلام"), CellValue::Integer(30), CellValue::text("تهران")];
        let rows: Vec<&[CellValue]> = vec![&first_row[..]];
        let columns = vec!["نام".to_string(), "سن".to_string(), "شهر".to_string()];
        let request = RenderRequest {
            entity_name: "سلام".into(),
            rows: &rows,
            columns: &columns,
        };

        let output_path = renderer.render(&request, directory.path()).unwrap();

        assert_eq!(output_path, directory.path().join("سلام.pdf"));
        let document = lopdf::Document::load(&output_path).unwrap();
        let dictionaries: Vec<&lopdf::Dictionary> = document
            .objects
            .values()
            .filter_map(|object| object.as_dict().ok())
            .collect();
        let type0_font = dictionaries
            .iter()
            .find(|dictionary| {
                dictionary
                    .get(b"Subtype")
                    .and_then(lopdf::Object::as_name)
                    .is_ok_and(|subtype| subtype == b"Type0")
            })
            .unwrap();
        assert!(type0_font.has(b"DescendantFonts"));
        assert!(type0_font.has(b"ToUnicode"));
        assert!(dictionaries.iter().any(|dictionary| dictionary.has(b"FontFile2")));
        assert!(!dictionaries.iter().any(|dictionary| dictionary
            .get(b"BaseFont")
            .and_then(lopdf::Object::as_name)
            .is_ok_and(|base_font| base_font == b"Helvetica")));

        let document_bytes = std::fs::read(&output_path).unwrap();
        let document_text = String::from_utf8_lossy(&document_bytes);
        for marker in ["/FontFile2", "/ToUnicode", "/Type0", "/DescendantFonts", "/CIDFontType2"] {
            assert!(document_text.contains(marker), "{}", marker);
        }
        let content = page_text(&document, 1);
        assert!(!content.contains("(?"), "{}", content);
    }

    #[test]
    fn long_vertical_tables_repeat_the_header_band() {
        let directory = tempfile::tempdir().unwrap();
        let columns: Vec<String> = (0..60).map(|index| format!("field{}", index)).collect();
        let record: Vec<CellValue> = (0..60).map(|index| CellValue::Integer(index * 100)).collect();
        let rows: Vec<&[CellValue]> = vec![record.as_slice()];
        let request = RenderRequest {
            entity_name: "Many fields".into(),
            rows: &rows,
            columns: &columns,
        };

        let output_path = helvetica_renderer().render(&request, directory.path()).unwrap();

        let document = lopdf::Document::load(&output_path).unwrap();
        let page_count = document.get_pages().len() as u32;
        assert!(page_count >= 2, "{}", page_count);
        for page_number in 1..=page_count {
            assert!(page_text(&document, page_number).contains("(field0)"));
        }
        assert!(page_text(&document, page_count).contains("(field59)"));
    }

    #[test]
    fn stages_cannot_be_skipped() {
        let renderer = helvetica_renderer();
        let columns = vec!["name".to_string()];
        let request = RenderRequest {
            entity_name: "Alice".into(),
            rows: &[],
            columns: &columns,
        };
        let mut composer = DocumentComposer::new(&renderer, "Alice");

        assert!(composer.compose_body(&request).is_err());
        composer.compose_header("Alice", fixed_clock()).unwrap();
        assert!(composer.compose_header("Alice", fixed_clock()).is_err());
        let directory = tempfile::tempdir().unwrap();
        assert!(composer.serialize(&directory.path().join("early.pdf")).is_err());
        composer.compose_body(&request).unwrap();
        composer.serialize(&directory.path().join("done.pdf")).unwrap();
        assert_eq!(composer.stage, CompositionStage::Serialized);
    }

    #[test]
    fn unwritable_output_is_a_render_error() {
        let directory = tempfile::tempdir().unwrap();
        let missing_directory = directory.path().join("missing");
        let columns = vec!["name".to_string()];
        let request = RenderRequest {
            entity_name: "Bob".into(),
            rows: &[],
            columns: &columns,
        };

        let error = helvetica_renderer().render(&request, &missing_directory).unwrap_err();

        assert_eq!(error.entity_name, "Bob");
        assert!(error.to_string().contains("Bob"), "{}", error);
    }
}
