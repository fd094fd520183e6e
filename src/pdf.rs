#![deny(clippy::unwrap_used, clippy::expect_used)]

use lopdf::content::Operation;
use lopdf::{Object, StringFormat};
use owned_ttf_parser::{AsFaceRef as _, Face, OwnedFace};
use std::{
    collections::{BTreeMap, HashMap},
    io::BufWriter,
    mem,
    path::{Path, PathBuf},
    sync::Arc,
};
use time::OffsetDateTime;
use unicode_normalization::UnicodeNormalization as _;

use crate::error::ContextError;

/// An RGB color whose components range from 0 to 1.
pub type Color = [f32; 3];

/// The (insofar) relevant vertical metrics of a font.
#[derive(Clone, Copy, Debug, Default)]
pub struct FontMetrics {
    /// The ascent of the font.
    pub ascent: i16,
    /// The descent of the font.
    pub descent: i16,
    /// The number of units per em of the font.
    pub units_per_em: u16,
}

/// The (insofar) relevant metrics associated to a single glyph of a font.
#[derive(Clone, Copy, Debug, Default)]
pub struct GlyphMetrics {
    /// The width of the glyph.
    pub width: u32,
    /// The height of the glyph.
    pub height: u32,
}

/// A font face loaded from a TTF font, together with its measure of units per em.
#[derive(Clone, Debug)]
struct TtfFontFace {
    /// The underlying font face which is represented through the `ttf_parser` crate.
    inner: Arc<OwnedFace>,
    /// The number of units per em of the font face.
    units_per_em: u16,
}

impl TtfFontFace {
    /// Retrieve the font metrics from the associated font face.
    fn font_metrics(&self) -> FontMetrics {
        FontMetrics {
            ascent: self.face().ascender(),
            descent: self.face().descender(),
            units_per_em: self.units_per_em,
        }
    }

    /// Retrieve the glyph ID of a specific codepoint.
    fn glyph_id(&self, codepoint: char) -> Option<u16> {
        self.face()
            .glyph_index(codepoint)
            .map(|glyph_id| glyph_id.0)
    }

    /// Retrieve the mapping between the glyph IDs and the characters of all the unicode subtables of the font.
    fn glyph_ids(&self) -> HashMap<u16, char> {
        let font_subtables = self.face().tables().cmap.map(|cmap| {
            cmap.subtables
                .into_iter()
                .filter(|font_subtable| font_subtable.is_unicode())
        });
        let Some(font_subtables) = font_subtables else {
            return HashMap::new();
        };

        let mut gid_to_codepoint_map =
            HashMap::with_capacity(self.face().number_of_glyphs().into());
        for font_subtable in font_subtables {
            font_subtable.codepoints(|codepoint| {
                if let Ok(character) = char::try_from(codepoint) {
                    // Only the positive glyph indices are kept, zero being the missing glyph
                    if let Some(glyph_index) = font_subtable
                        .glyph_index(codepoint)
                        .filter(|index| index.0 > 0)
                    {
                        gid_to_codepoint_map
                            .entry(glyph_index.0)
                            .or_insert(character);
                    }
                }
            })
        }

        gid_to_codepoint_map
    }

    fn glyph_count(&self) -> u16 {
        self.face().number_of_glyphs()
    }

    /// Attempt to calculate the metrics of a glyph from its glyph ID.
    fn glyph_metrics(&self, glyph_id: u16) -> Option<GlyphMetrics> {
        let glyph_id = owned_ttf_parser::GlyphId(glyph_id);

        let width = self.face().glyph_hor_advance(glyph_id)? as u32;
        // The height is corrected by the descender, which holds for horizontally-laid fonts
        let height = self
            .face()
            .glyph_bounding_box(glyph_id)
            .map(|bounding_box| bounding_box.y_max - bounding_box.y_min - self.face().descender())
            .unwrap_or(1000) as u32;

        Some(GlyphMetrics { width, height })
    }

    /// Constructs a font face from the raw data of a TTF font file.
    fn from_bytes(data: &[u8]) -> Result<Self, ContextError> {
        let face = OwnedFace::from_vec(data.to_vec(), 0)
            .map_err(|error| ContextError::with_error("Failed to parse font", &error))?;
        let units_per_em = face.as_face_ref().units_per_em();

        Ok(Self {
            inner: Arc::new(face),
            units_per_em,
        })
    }

    fn face(&self) -> &Face<'_> {
        self.inner.as_face_ref()
    }
}

/// Where the bytes of a TrueType font come from.
#[derive(Debug, Clone, PartialEq)]
pub enum FontSource {
    File(PathBuf),
    Bytes(Vec<u8>),
}

/// A font which can be used to write text into a `PdfDocument`.
#[derive(Debug, Clone)]
pub struct Font {
    kind: FontKind,
}

#[derive(Debug, Clone)]
enum FontKind {
    /// A TrueType font, embedded as a whole into the documents which use it.
    TrueType {
        bytes: Arc<Vec<u8>>,
        ttf_face: TtfFontFace,
    },
    /// One of the standard fonts every PDF reader provides. It only covers the Latin-1 characters.
    Helvetica,
}

impl Font {
    pub fn helvetica() -> Font {
        Font {
            kind: FontKind::Helvetica,
        }
    }

    /// Parses the bytes of a TTF font, or either of an OTF font which is a wrapper around a TTF font.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Font, ContextError> {
        let ttf_face = TtfFontFace::from_bytes(&bytes)?;

        Ok(Font {
            kind: FontKind::TrueType {
                bytes: Arc::new(bytes),
                ttf_face,
            },
        })
    }

    pub fn from_source(font_source: &FontSource) -> Result<Font, ContextError> {
        match font_source {
            FontSource::File(font_path) => {
                let font_bytes = std::fs::read(font_path).map_err(|error| {
                    ContextError::with_error(format!("Failed to read the font {:?}", font_path), &error)
                })?;
                Font::from_bytes(font_bytes).map_err(|error| {
                    ContextError::with_error(format!("Failed to load the font {:?}", font_path), &error)
                })
            }
            FontSource::Bytes(font_bytes) => Font::from_bytes(font_bytes.clone()),
        }
    }

    pub fn is_embedded(&self) -> bool {
        matches!(self.kind, FontKind::TrueType { .. })
    }

    /// The width in points of the text when written at the given font size.
    pub fn text_width(&self, text: &str, font_size: f32) -> f32 {
        let width_in_thousandths: f32 = match &self.kind {
            FontKind::TrueType { ttf_face, .. } => {
                let scaling = 1000.0 / ttf_face.units_per_em as f32;
                text.nfc()
                    .filter_map(|character| ttf_face.glyph_id(character))
                    .filter_map(|glyph_id| ttf_face.glyph_metrics(glyph_id))
                    .map(|glyph_metrics| glyph_metrics.width as f32 * scaling)
                    .sum()
            }
            FontKind::Helvetica => text.nfc().map(helvetica_character_width).sum(),
        };

        width_in_thousandths * font_size / 1000.0
    }

    /// Encodes the text as the operand of a text showing operator.
    fn encode_text(&self, text: &str) -> Object {
        match &self.kind {
            FontKind::TrueType { ttf_face, .. } => {
                let mut glyph_id_bytes = Vec::new();
                for character in text.nfc() {
                    match ttf_face.glyph_id(character) {
                        Some(glyph_id) => glyph_id_bytes.extend(glyph_id.to_be_bytes()),
                        None => log::warn!("Unable to find the character {:?} in the font", character),
                    }
                }
                Object::String(glyph_id_bytes, StringFormat::Hexadecimal)
            }
            FontKind::Helvetica => {
                let latin_bytes = text
                    .nfc()
                    .map(|character| match u8::try_from(u32::from(character)) {
                        Ok(byte) if byte >= 0x20 => byte,
                        _ => b'?',
                    })
                    .collect();
                Object::String(latin_bytes, StringFormat::Literal)
            }
        }
    }

    /// Inserts the font into the PDF document, returning the associated font dictionary.
    fn insert_into_document(
        &self,
        face_identifier: &str,
        inner_document: &mut lopdf::Document,
    ) -> lopdf::Dictionary {
        use lopdf::Object::*;

        let (bytes, ttf_face) = match &self.kind {
            FontKind::Helvetica => {
                return lopdf::Dictionary::from_iter(vec![
                    ("Type", Name("Font".into())),
                    ("Subtype", Name("Type1".into())),
                    ("BaseFont", Name("Helvetica".into())),
                    ("Encoding", Name("WinAnsiEncoding".into())),
                ]);
            }
            FontKind::TrueType { bytes, ttf_face } => (bytes, ttf_face),
        };
        let face_metrics = ttf_face.font_metrics();

        let font_stream = lopdf::Stream::new(
            lopdf::Dictionary::from_iter(vec![("Length1", Integer(bytes.len() as i64))]),
            bytes.to_vec(),
        )
        .with_compression(false);

        let mut font_vector: Vec<(::std::string::String, lopdf::Object)> = vec![
            ("Type".into(), Name("Font".into())),
            ("Subtype".into(), Name("Type0".into())),
            ("BaseFont".into(), Name(face_identifier.as_bytes().to_vec())),
            // `Identity-H` is used for horizontal writing
            ("Encoding".into(), Name("Identity-H".into())),
        ];

        let mut font_descriptor_vector: Vec<(::std::string::String, lopdf::Object)> = vec![
            ("Type".into(), Name("FontDescriptor".into())),
            ("FontName".into(), Name(face_identifier.as_bytes().to_vec())),
            ("Ascent".into(), Integer(i64::from(face_metrics.ascent))),
            ("Descent".into(), Integer(i64::from(face_metrics.descent))),
            ("CapHeight".into(), Integer(i64::from(face_metrics.ascent))),
            ("ItalicAngle".into(), Integer(0)),
            // Nonsymbolic font
            ("Flags".into(), Integer(32)),
            ("StemV".into(), Integer(80)),
        ];

        let mut maximum_character_height = 0;
        let mut total_width = 0;

        // Glyph IDs associated to their character, width and height
        let mut gid_to_glyph_properties_map = BTreeMap::<u32, (u32, u32, u32)>::new();
        gid_to_glyph_properties_map.insert(0, (0, 1000, 1000));

        for (glyph_id, character) in ttf_face.glyph_ids() {
            if let Some(glyph_metrics) = ttf_face.glyph_metrics(glyph_id) {
                maximum_character_height = maximum_character_height.max(glyph_metrics.height);
                total_width += glyph_metrics.width;
                gid_to_glyph_properties_map.insert(
                    glyph_id as u32,
                    (character as u32, glyph_metrics.width, glyph_metrics.height),
                );
            }
        }

        // The glyph IDs of a bfchar block must share their first byte and a block holds at most 100 entries
        let mut current_first_byte: u16 = 0;
        let mut all_gid_to_character_blocks = Vec::new();
        let mut current_gid_to_character_block = Vec::new();
        for (glyph_id, (character, _glyph_width, _glyph_height)) in gid_to_glyph_properties_map.iter() {
            if (*glyph_id >> 8) as u16 != current_first_byte
                || current_gid_to_character_block.len() >= 100
            {
                all_gid_to_character_blocks.push(mem::take(&mut current_gid_to_character_block));
                current_first_byte = (*glyph_id >> 8) as u16;
            }
            current_gid_to_character_block.push((*glyph_id, *character));
        }
        all_gid_to_character_blocks.push(current_gid_to_character_block);

        let cid_to_unicode_map =
            generate_cid_to_unicode_map(face_identifier, all_gid_to_character_blocks);
        let cid_to_unicode_map_stream = lopdf::Stream::new(
            lopdf::Dictionary::new(),
            cid_to_unicode_map.as_bytes().to_vec(),
        );
        let cid_to_unicode_map_stream_id = inner_document.add_object(cid_to_unicode_map_stream);

        // The widths are written as runs of consecutive glyph IDs, e.g. `20 [21 99 34]` gives
        // the widths of the glyphs 20, 21 and 22 (see page 439 in the PDF 1.7 reference)
        let mut width_objects = Vec::<Object>::new();
        let mut current_lower_gid = 0;
        let mut current_upper_gid = 0;
        let mut current_widths_vector = Vec::<Object>::new();

        // The widths are expressed in thousandths of the text space unit
        let percentage_font_scaling = 1000.0 / (face_metrics.units_per_em as f32);

        for glyph_id in 0..ttf_face.glyph_count() {
            let Some(GlyphMetrics { width, .. }) = ttf_face.glyph_metrics(glyph_id) else {
                log::trace!("Glyph ID {} of the font {:?} has no width", glyph_id, face_identifier);
                continue;
            };
            if glyph_id != current_upper_gid {
                width_objects.push(Integer(current_lower_gid as i64));
                width_objects.push(Array(mem::take(&mut current_widths_vector)));
                current_lower_gid = glyph_id;
            }
            current_widths_vector.push(Integer((width as f32 * percentage_font_scaling) as i64));
            current_upper_gid = glyph_id + 1;
        }
        width_objects.push(Integer(current_lower_gid as i64));
        width_objects.push(Array(mem::take(&mut current_widths_vector)));

        let mut font_descriptors = lopdf::Dictionary::from_iter(vec![
            ("Type", Name("Font".into())),
            ("Subtype", Name("CIDFontType2".into())),
            ("BaseFont", Name(face_identifier.as_bytes().to_vec())),
            (
                "CIDSystemInfo",
                Dictionary(lopdf::Dictionary::from_iter(vec![
                    ("Registry", String("Adobe".into(), StringFormat::Literal)),
                    ("Ordering", String("Identity".into(), StringFormat::Literal)),
                    ("Supplement", Integer(0)),
                ])),
            ),
            ("W", Array(width_objects)),
            ("DW", Integer(1000)),
        ]);

        let font_bounding_box = vec![
            Integer(0),
            Integer(maximum_character_height as i64),
            Integer(total_width as i64),
            Integer(maximum_character_height as i64),
        ];
        font_descriptor_vector.push((
            "FontFile2".into(),
            Reference(inner_document.add_object(font_stream)),
        ));
        // Not required by the format, but Adobe Reader needs it
        font_descriptor_vector.push(("FontBBox".into(), Array(font_bounding_box)));

        let font_descriptor_vector_id =
            inner_document.add_object(lopdf::Dictionary::from_iter(font_descriptor_vector));
        font_descriptors.set("FontDescriptor", Reference(font_descriptor_vector_id));

        font_vector.push((
            "DescendantFonts".into(),
            Array(vec![Dictionary(font_descriptors)]),
        ));
        font_vector.push(("ToUnicode".into(), Reference(cid_to_unicode_map_stream_id)));

        lopdf::Dictionary::from_iter(font_vector)
    }
}

/// Approximate advance widths of Helvetica, in thousandths of the font size.
fn helvetica_character_width(character: char) -> f32 {
    match character {
        ' ' | '!' | ',' | '.' | '/' | ':' | ';' | 'I' | '[' | ']' | '\\' | 'f' | 't' => 278.0,
        'i' | 'j' | 'l' | '\'' | '|' => 222.0,
        '-' | '(' | ')' | '`' | 'r' => 333.0,
        'm' => 833.0,
        'M' => 833.0,
        'W' => 944.0,
        'w' => 722.0,
        'A'..='Z' => 667.0,
        _ => 556.0,
    }
}

/// Converts millimeters to points, the unit of the PDF user space.
pub fn millimeters_to_points(millimeters: f32) -> f32 {
    millimeters * 2.834646
}

/// A page of the document, whose content is a single stream of operations.
#[derive(Debug, Clone)]
pub struct PdfPage {
    /// Page width in points.
    pub width: f32,
    /// Page height in points.
    pub height: f32,
    operations: Vec<Operation>,
}

/// A high-level interface to the underlying `lopdf::Document`, holding the pages and the
/// fonts of the document until they are all written with `write_all`.
pub struct PdfDocument {
    /// The fonts of the document with their identifier and the ID of the object they will be written to.
    fonts: Vec<(String, lopdf::ObjectId, Font)>,
    /// The underlying PDF document: this is a low-level interface and shouldn't be directly interacted with
    /// unless strictly necessary.
    pub inner_document: lopdf::Document,
    /// The identifier of the document, it is used in order to set the PDF `ID` tag.
    pub identifier: String,
    /// The title written in the document information.
    pub title: String,
    /// The creation date written in the document information.
    pub creation_date: OffsetDateTime,
    pages: Vec<PdfPage>,
}

impl PdfDocument {
    /// Create a new `PdfDocument` following version 1.5 of the PDF specification.
    pub fn new(pdf_document_identifier: String) -> Self {
        PdfDocument {
            fonts: Vec::new(),
            inner_document: lopdf::Document::with_version("1.5"),
            identifier: pdf_document_identifier,
            title: String::new(),
            creation_date: OffsetDateTime::UNIX_EPOCH,
            pages: Vec::new(),
        }
    }

    /// Adds an empty page of the given width and height in points, returning its index.
    pub fn add_page(&mut self, page_width: f32, page_height: f32) -> usize {
        self.pages.push(PdfPage {
            width: page_width,
            height: page_height,
            operations: Vec::new(),
        });

        self.pages.len() - 1
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Registers the font in the document, returning the index by which text can be written with it.
    pub fn add_font(&mut self, font: Font) -> usize {
        let face_identifier = format!("F{}", self.fonts.len());
        let font_object_id = self.inner_document.new_object_id();
        self.fonts.push((face_identifier, font_object_id, font));

        self.fonts.len() - 1
    }

    /// Writes the text with the specified font, size and color, its baseline starting at the given position in points.
    #[allow(clippy::too_many_arguments)]
    pub fn write_text_to_page(
        &mut self,
        page_index: usize,
        color: Color,
        text: &str,
        font_index: usize,
        font_size: f32,
        position: [f32; 2],
    ) -> Result<(), ContextError> {
        let (face_identifier, _, font) = self.fonts.get(font_index).ok_or_else(|| {
            ContextError::with_context(format!("Failed to find the font with index {}", font_index))
        })?;
        let face_identifier = face_identifier.clone();
        let encoded_text = font.encode_text(text);
        let [x, y] = position;
        let [r, g, b] = color;

        self.add_operations_to_page(
            page_index,
            vec![
                Operation::new("BT", vec![]),
                Operation::new(
                    "Tf",
                    vec![Object::Name(face_identifier.into_bytes()), font_size.into()],
                ),
                Operation::new("Td", vec![x.into(), y.into()]),
                Operation::new("rg", vec![r.into(), g.into(), b.into()]),
                Operation::new("Tj", vec![encoded_text]),
                Operation::new("ET", vec![]),
            ],
        )
    }

    /// Fills the rectangle whose lower-left corner is at `(x, y)` with the given color.
    pub fn fill_rectangle_in_page(
        &mut self,
        page_index: usize,
        color: Color,
        rectangle: [f32; 4],
    ) -> Result<(), ContextError> {
        let [x, y, width, height] = rectangle;
        let [r, g, b] = color;

        self.add_operations_to_page(
            page_index,
            vec![
                Operation::new("q", vec![]),
                Operation::new("rg", vec![r.into(), g.into(), b.into()]),
                Operation::new("re", vec![x.into(), y.into(), width.into(), height.into()]),
                Operation::new("f", vec![]),
                Operation::new("Q", vec![]),
            ],
        )
    }

    /// Strokes a straight line between the two points.
    pub fn stroke_line_in_page(
        &mut self,
        page_index: usize,
        color: Color,
        line_width: f32,
        from: [f32; 2],
        to: [f32; 2],
    ) -> Result<(), ContextError> {
        let [r, g, b] = color;

        self.add_operations_to_page(
            page_index,
            vec![
                Operation::new("q", vec![]),
                Operation::new("RG", vec![r.into(), g.into(), b.into()]),
                Operation::new("w", vec![line_width.into()]),
                Operation::new("m", vec![from[0].into(), from[1].into()]),
                Operation::new("l", vec![to[0].into(), to[1].into()]),
                Operation::new("S", vec![]),
                Operation::new("Q", vec![]),
            ],
        )
    }

    /// Writes the pages and fonts so far specified into the underlying document and finalizes it.
    /// The instance ID is the second half of the PDF `ID` tag.
    pub fn write_all(&mut self, instance_id: String) -> Result<(), ContextError> {
        use lopdf::Object::*;
        use lopdf::StringFormat::*;

        let pdf_timestamp = to_pdf_timestamp_format(&self.creation_date);
        let document_info = lopdf::Dictionary::from_iter(vec![
            ("Trapped", Name("False".into())),
            ("CreationDate", String(pdf_timestamp.clone().into_bytes(), Literal)),
            ("ModDate", String(pdf_timestamp.into_bytes(), Literal)),
            ("Title", String(utf16_text_string(&self.title), Hexadecimal)),
            ("Producer", String(env!("CARGO_PKG_NAME").as_bytes().to_vec(), Literal)),
            ("Identifier", String(self.identifier.clone().into_bytes(), Literal)),
        ]);
        let document_info_id = self.inner_document.add_object(Dictionary(document_info));

        let pages_id = self.inner_document.new_object_id();
        let catalog = lopdf::Dictionary::from_iter(vec![
            ("Type", Name("Catalog".into())),
            ("PageLayout", Name("OneColumn".into())),
            ("PageMode", Name("UseNone".into())),
            ("Pages", Reference(pages_id)),
        ]);
        let catalog_id = self.inner_document.add_object(catalog);

        self.inner_document.trailer.set("Root", Reference(catalog_id));
        self.inner_document.trailer.set("Info", Reference(document_info_id));
        self.inner_document.trailer.set(
            "ID",
            Array(vec![
                String(self.identifier.clone().into_bytes(), Literal),
                String(instance_id.into_bytes(), Literal),
            ]),
        );

        let fonts_dictionary = self.insert_fonts_into_document();
        let fonts_dictionary_id = self.inner_document.add_object(fonts_dictionary);

        let mut page_ids = Vec::<Object>::with_capacity(self.pages.len());
        for page in mem::take(&mut self.pages) {
            let page_box: Object = vec![
                Integer(0),
                Integer(0),
                Real(page.width),
                Real(page.height),
            ]
            .into();

            let content = lopdf::content::Content {
                operations: page.operations,
            };
            let content_bytes = content.encode().map_err(|error| {
                ContextError::with_error("Failed to encode the content of a page", &error)
            })?;
            // Page contents are not compressed
            let content_id = self
                .inner_document
                .add_object(lopdf::Stream::new(lopdf::Dictionary::new(), content_bytes).with_compression(false));

            let resources = lopdf::Dictionary::from_iter(vec![("Font", Reference(fonts_dictionary_id))]);
            let page_dictionary = lopdf::Dictionary::from_iter(vec![
                ("Type", Name("Page".into())),
                ("Rotate", Integer(0)),
                ("MediaBox", page_box.clone()),
                ("CropBox", page_box.clone()),
                ("TrimBox", page_box),
                ("Resources", Dictionary(resources)),
                ("Contents", Reference(content_id)),
                ("Parent", Reference(pages_id)),
            ]);
            page_ids.push(Reference(self.inner_document.add_object(page_dictionary)));
        }

        let pages = lopdf::Dictionary::from_iter(vec![
            ("Type", Name("Pages".into())),
            ("Count", Integer(page_ids.len() as i64)),
            ("Kids", Array(page_ids)),
        ]);
        self.inner_document.objects.insert(pages_id, Dictionary(pages));

        Ok(())
    }

    /// Save the `PdfDocument` to bytes in order for it to be written to a file or further processed.
    pub fn save_to_bytes(&mut self) -> Result<Vec<u8>, ContextError> {
        let mut pdf_document_bytes = Vec::new();
        let mut writer = BufWriter::new(&mut pdf_document_bytes);
        self.inner_document.save_to(&mut writer).map_err(|error| {
            ContextError::with_error("Error while saving the PDF document to bytes", &error)
        })?;
        mem::drop(writer);

        Ok(pdf_document_bytes)
    }

    /// Save the `PdfDocument` to the file at the given path, replacing it if it exists.
    pub fn save_to_path(&mut self, path: &Path) -> Result<(), ContextError> {
        let pdf_document_bytes = self.save_to_bytes()?;
        std::fs::write(path, pdf_document_bytes).map_err(|error| {
            ContextError::with_error(format!("Failed to write the PDF document to {:?}", path), &error)
        })
    }

    /// Converts the fonts into a dictionary keyed by their identifiers, inserting them into the document.
    fn insert_fonts_into_document(&mut self) -> lopdf::Dictionary {
        let mut font_dictionary = lopdf::Dictionary::new();

        for (face_identifier, font_object_id, font) in self.fonts.iter() {
            let collected_font_dictionary =
                font.insert_into_document(face_identifier, &mut self.inner_document);
            self.inner_document
                .objects
                .insert(*font_object_id, Object::Dictionary(collected_font_dictionary));
            font_dictionary.set(face_identifier.clone(), Object::Reference(*font_object_id));
        }

        font_dictionary
    }

    fn add_operations_to_page(
        &mut self,
        page_index: usize,
        operations: Vec<Operation>,
    ) -> Result<(), ContextError> {
        let pdf_page = self.pages.get_mut(page_index).ok_or_else(|| {
            ContextError::with_context(format!("Failed to find the page with index {}", page_index))
        })?;
        pdf_page.operations.extend(operations);

        Ok(())
    }
}

type GlyphId = u32;
type UnicodeCodePoint = u32;
type CmapBlock = Vec<(GlyphId, UnicodeCodePoint)>;

const CMAP_BEGINNING: &str = "/CIDInit /ProcSet findresource begin\n\
12 dict begin\n\
begincmap\n\
/CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n";

const CMAP_END: &str = "endcmap\n\
CMapName currentdict /CMap defineresource pop\n\
end\n\
end\n";

/// Generates the `ToUnicode` character map from the cmap blocks, which must not exceed 100 elements in length.
fn generate_cid_to_unicode_map(face_name: &str, all_cmap_blocks: Vec<CmapBlock>) -> String {
    let mut cid_to_unicode_map = String::from(CMAP_BEGINNING);
    cid_to_unicode_map.push_str(&format!(
        "/CMapName /{face_name}-UCS def\n/CMapType 2 def\n1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n"
    ));

    for cmap_block in all_cmap_blocks.into_iter().filter(|block| !block.is_empty()) {
        cid_to_unicode_map.push_str(&format!("{} beginbfchar\r\n", cmap_block.len()));
        for (glyph_id, unicode) in cmap_block {
            cid_to_unicode_map.push_str(&format!("<{glyph_id:04x}> <{}>\n", utf16_hex(unicode)));
        }
        cid_to_unicode_map.push_str("endbfchar\r\n");
    }

    cid_to_unicode_map.push_str(CMAP_END);
    cid_to_unicode_map
}

/// Characters beyond the basic multilingual plane are written as UTF-16 surrogate pairs.
fn utf16_hex(codepoint: UnicodeCodePoint) -> String {
    let Some(character) = char::from_u32(codepoint) else {
        return format!("{codepoint:04x}");
    };
    let mut buffer = [0u16; 2];
    character
        .encode_utf16(&mut buffer)
        .iter()
        .map(|unit| format!("{unit:04x}"))
        .collect()
}

/// A text string readable by any PDF reader: UTF-16BE preceded by its byte order mark.
fn utf16_text_string(text: &str) -> Vec<u8> {
    let mut bytes = vec![0xFE, 0xFF];
    bytes.extend(text.encode_utf16().flat_map(|unit| unit.to_be_bytes()));
    bytes
}

/// Formats the given time so that it matches what the PDF specification expects.
/// An example of it is the following: D:20170505150224+02'00'.
fn to_pdf_timestamp_format(date: &OffsetDateTime) -> String {
    let offset = date.offset();
    let offset_sign = if offset.is_negative() { '-' } else { '+' };
    format!(
        "D:{:04}{:02}{:02}{:02}{:02}{:02}{offset_sign}{:02}'{:02}'",
        date.year(),
        u8::from(date.month()),
        date.day(),
        date.hour(),
        date.minute(),
        date.second(),
        offset.whole_hours().abs(),
        offset.minutes_past_hour().abs(),
    )
}
