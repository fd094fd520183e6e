#![deny(clippy::unwrap_used, clippy::expect_used)]

use calamine::{Data, Reader as _};
use std::io::{Cursor, Read as _, Seek};
use std::path::Path;

use crate::error::{ContextError, LoadError};
use crate::table::{CellValue, Table};

/// How a source file is going to be read, decided from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// A spreadsheet workbook (`xlsx`, `xlsm`, `xlsb`, `xls`, `ods`), of which only the first worksheet is read.
    Workbook,
    /// A delimited text file with the given field delimiter.
    Delimited(u8),
    /// Anything else: the workbook format is sniffed from the content of the file.
    Unknown,
}

impl SourceFormat {
    pub fn from_path(path: &Path) -> SourceFormat {
        let extension = path
            .extension()
            .and_then(|extension| extension.to_str())
            .map(|extension| extension.to_ascii_lowercase());

        match extension.as_deref() {
            Some("xlsx" | "xlsm" | "xlsb" | "xls" | "ods") => SourceFormat::Workbook,
            Some("csv") => SourceFormat::Delimited(b','),
            Some("tsv") => SourceFormat::Delimited(b'\t'),
            _ => SourceFormat::Unknown,
        }
    }
}

/// Reads the tabular source file at the given path into a `Table`. The first row of the
/// source is taken as the header, every other row as a record.
pub fn load_table(path: &Path) -> Result<Table, LoadError> {
    let source_format = SourceFormat::from_path(path);
    log::debug!("Loading {:?} as {:?}", path, source_format);

    let table = match source_format {
        SourceFormat::Workbook => {
            let mut workbook = calamine::open_workbook_auto(path).map_err(|error| {
                ContextError::with_error(format!("Failed to open the workbook {:?}", path), &error)
            })?;
            read_first_worksheet(&mut workbook, path)?
        }
        SourceFormat::Delimited(delimiter) => read_delimited(path, delimiter)?,
        SourceFormat::Unknown => {
            let mut source_bytes = Vec::new();
            std::fs::File::open(path)
                .and_then(|mut file| file.read_to_end(&mut source_bytes))
                .map_err(|error| {
                    ContextError::with_error(format!("Failed to read the file {:?}", path), &error)
                })?;
            let mut workbook = calamine::open_workbook_auto_from_rs(Cursor::new(source_bytes))
                .map_err(|error| {
                    ContextError::with_error(
                        format!("Unable to recognize the format of the file {:?}", path),
                        &error,
                    )
                })?;
            read_first_worksheet(&mut workbook, path)?
        }
    };

    log::debug!(
        "Loaded {} rows with the columns {:?} from {:?}",
        table.rows().len(),
        table.columns(),
        path
    );

    Ok(table)
}

fn read_first_worksheet<RS>(
    workbook: &mut calamine::Sheets<RS>,
    path: &Path,
) -> Result<Table, LoadError>
where
    RS: std::io::Read + Seek,
{
    let sheet_name = workbook
        .sheet_names()
        .into_iter()
        .next()
        .ok_or_else(|| {
            ContextError::with_context(format!("The workbook {:?} contains no worksheet", path))
        })?;
    let range = workbook.worksheet_range(&sheet_name).map_err(|error| {
        ContextError::with_error(
            format!("Failed to read the worksheet {:?} of {:?}", sheet_name, path),
            &error,
        )
    })?;

    let mut rows = range.rows();
    let columns = match rows.next() {
        Some(header) => header_names(header.iter().map(cell_from_data)),
        None => Vec::new(),
    };
    let records = rows
        .map(|row| row.iter().map(cell_from_data).collect())
        .collect();

    Ok(Table::new(columns, records))
}

fn read_delimited(path: &Path, delimiter: u8) -> Result<Table, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|error| {
            ContextError::with_error(format!("Failed to open the file {:?}", path), &error)
        })?;

    let mut records = reader.records();
    let columns = match records.next() {
        Some(header) => {
            let header = header.map_err(|error| {
                ContextError::with_error(format!("Failed to read the header of {:?}", path), &error)
            })?;
            header_names(header.iter().enumerate().map(|(index, field)| {
                if index == 0 {
                    CellValue::text(field.trim_start_matches('\u{feff}'))
                } else {
                    CellValue::text(field)
                }
            }))
        }
        None => Vec::new(),
    };

    let mut rows = Vec::new();
    for (line_index, record) in records.enumerate() {
        let record = record.map_err(|error| {
            ContextError::with_error(
                format!("Failed to read the record {} of {:?}", line_index + 1, path),
                &error,
            )
        })?;
        rows.push(record.iter().map(cell_from_field).collect());
    }

    Ok(Table::new(columns, rows))
}

/// Turns the header cells into column names, naming the empty ones after their position.
fn header_names(header: impl Iterator<Item = CellValue>) -> Vec<String> {
    header
        .enumerate()
        .map(|(index, cell)| {
            cell.display_text()
                .unwrap_or_else(|| format!("Unnamed: {}", index))
        })
        .collect()
}

fn cell_from_data(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::String(text) => CellValue::text(text.as_str()),
        Data::Int(integer) => CellValue::Integer(*integer),
        Data::Float(float) => CellValue::Float(*float),
        Data::Bool(boolean) => CellValue::Boolean(*boolean),
        Data::DateTime(date_time) if date_time.is_duration() => CellValue::Float(date_time.as_f64()),
        Data::DateTime(date_time) => excel_serial_text(date_time.as_f64())
            .map(CellValue::Text)
            .unwrap_or(CellValue::Float(date_time.as_f64())),
        other => CellValue::text(other.to_string()),
    }
}

/// Formats an Excel serial date (days since 1899-12-30, the fraction being the time of day)
/// as `YYYY-MM-DD HH:MM:SS`, rounded to the second.
fn excel_serial_text(serial: f64) -> Option<String> {
    if !serial.is_finite() {
        return None;
    }
    let epoch = time::Date::from_calendar_date(1899, time::Month::December, 30)
        .ok()?
        .midnight();
    let date_time = epoch.checked_add(time::Duration::seconds((serial * 86_400.0).round() as i64))?;

    Some(format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
        date_time.year(),
        u8::from(date_time.month()),
        date_time.day(),
        date_time.hour(),
        date_time.minute(),
        date_time.second()
    ))
}

/// Delimited files carry no types, so numbers are recognized the way spreadsheet readers do.
fn cell_from_field(field: &str) -> CellValue {
    if field.is_empty() {
        return CellValue::Empty;
    }
    if let Ok(integer) = field.parse::<i64>() {
        return CellValue::Integer(integer);
    }
    match field.parse::<f64>() {
        Ok(float) if float.is_finite() && field.bytes().any(|byte| byte.is_ascii_digit()) => {
            CellValue::Float(float)
        }
        _ => CellValue::Text(field.to_string()),
    }
}
