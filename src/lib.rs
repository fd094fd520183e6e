//! Sheet2pdf turns the rows of a spreadsheet into PDF reports, one for every distinct value
//! (the entity) of a chosen key column. Each report carries a title with the name of the entity,
//! the time at which it was generated and a table with the values of the entity's first row.
//!
//! Reports are meant to be read in Persian or Arabic, so all the text written into them goes first
//! through a `TextShaper`, which joins the letters of right-to-left scripts into their contextual
//! forms and reorders them visually. The PDF documents themselves are written with the `PdfDocument`
//! struct, which offers a high-level interface for direct PDF manipulation on top of `lopdf`.
//!
//! The whole conversion is run by the functions of the `batch` module: `run_batch` on the current
//! thread, or `spawn_batch` on a background worker which streams its progress over a channel.

/// The loading of the source file into a `Table`.
///
/// Workbooks (`xlsx`, `xlsm`, `xlsb`, `xls` and `ods`) are read with `calamine`, of which only the
/// first worksheet is considered, while comma and tab separated files are read with `csv`. Files
/// with any other extension are sniffed and read as a workbook if possible.
pub mod source;

/// The in-memory representation of the source file, made of named columns and rows of `CellValue`s.
pub mod table;

/// The partitioning of the rows of a table by the distinct values of a key column.
pub mod grouping;

/// The shaping of right-to-left text.
///
/// # Introduction
///
/// PDF renderers lay glyphs out one after the other from left to right, without any knowledge about the
/// contextual forms of the Arabic script. The `TextShaper` therefore replaces every letter by its
/// presentation form (isolated, initial, medial or final), forms the lam-alef and rial ligatures, and finally
/// reorders the text with the Unicode bidirectional algorithm so that it can be written as is.
///
/// Whether shaping is performed at all is decided once by a `ShapingCapability`, which depends on the
/// `shaping` cargo feature and on the configuration. Shaping never fails: text which cannot be shaped is
/// written as it was read.
pub mod shaping;

/// The geometry of the documents: page setup, choice of the table layout, measurement of the columns and
/// pagination of the rows.
pub mod layout;

/// The `DocumentRenderer` trait and the `PdfRenderer` which implements it.
///
/// A document is composed in stages (header, body and finally serialization) which can only be performed
/// in this order. The name of the produced file is derived from the name of the entity with `sanitize_file_name`.
pub mod render;

/// The batch worker which drives the loading, the grouping and the rendering of every entity, collecting
/// the outcome of each of them into a `ConversionResult`.
pub mod batch;

/// The `ConversionConfiguration`, which can be read from a JSON file.
pub mod configuration;

/// This module contains the error types used throughout this library.
///
/// All of them are built on top of the `ContextError` type, which uniforms the error reporting by pairing
/// a description of what failed with the message of the propagated error, if any. Errors which abort a batch
/// (`LoadError` and `ColumnNotFoundError`) are gathered into `BatchError`, while a `RenderError` only concerns
/// the document of a single entity.
pub mod error;

/// The module were the `PdfDocument` interface for working with PDF documents is presented.
///
/// # Disclaimer
///
/// This work was partially adapted from the one of [fschutt](https://github.com/fschutt) for the crate [printpdf](https://github.com/fschutt/printpdf).
/// Contrary to `printpdf`, the PDF identifier is passed by the caller and the creation date is explicit,
/// so that the same input always produces the same document.
///
/// # Introduction
///
/// The main component of this module is the struct `PdfDocument`. For it, there are convenience functions
/// such as `add_page`, `add_font`, `write_text_to_page`, `fill_rectangle_in_page`, `write_all` and `save_to_path`
/// which allow the end user to interact with a PDF document in a meaningful way. Fonts are either TrueType fonts,
/// embedded with their `ToUnicode` map so that the text can be extracted, or the standard Helvetica font.
pub mod pdf;

pub use batch::{convert_table, run_batch, spawn_batch, BatchEvent, ConversionResult, GroupOutcome, ProgressEvent};
pub use configuration::ConversionConfiguration;
pub use error::{BatchError, ColumnNotFoundError, ContextError, LoadError, RenderError};
pub use render::{DocumentRenderer, PdfRenderer, RenderRequest};
pub use shaping::{ShapingCapability, TextShaper};
