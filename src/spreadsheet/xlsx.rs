use crate::error::ResultMessage;
use crate::error::SheetError;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlReader;
use crate::helpers::xml::XmlTextContextHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::excel;
use crate::spreadsheet::excel::PackageReader;
use crate::spreadsheet::reference::index_to_reference;
use crate::spreadsheet::reference::reference_to_index;
use crate::spreadsheet::SpreadsheetError;
use crate::table::Table;
use crate::table::Value;
use quick_xml::events::Event;
use std::borrow::Cow;
use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;
use std::path::PathBuf;
use tracing::debug;
use zip::ZipArchive;

// Local tag names used by the SpreadsheetML parts
const TAG_CUSTOM_FORMATS: &[u8] = b"numFmts"; // Custom number formats container
const TAG_CUSTOM_FORMAT: &[u8] = b"numFmt"; // Individual custom number format
const TAG_FORMAT_INDEXES: &[u8] = b"cellXfs"; // Cell format indexes container
const TAG_FORMAT_INDEX: &[u8] = b"xf"; // Individual cell format index
const TAG_SHARED_STRING_ITEM: &[u8] = b"si"; // Shared string table item
const TAG_PHONETIC_TEXT: &[u8] = b"rPh"; // Phonetic text for Asian languages
const TAG_TEXT: &[u8] = b"t"; // Text content within strings
const TAG_WORKBOOK_PROPERTIES: &[u8] = b"workbookPr";
const TAG_SHEET: &[u8] = b"sheet";
const TAG_ROW: &[u8] = b"row";
const TAG_CELL: &[u8] = b"c";
const TAG_INLINE_STRING: &[u8] = b"is";
const TAG_VALUE: &[u8] = b"v";

/// An opened `.xlsx` workbook
pub(crate) struct XlsxWorkbook {
    /// Path of the workbook file
    pub(crate) path: PathBuf,
    /// ZIP archive containing the package parts
    pub(crate) zip: ZipArchive<PackageReader>,
    /// Cell type of every `cellXfs` style id
    pub(crate) number_formats: Vec<CellType>,
    /// Worksheets as (name, zip_path) pairs in workbook order
    pub(crate) sheets: Vec<(String, String)>,
    /// Whether serial dates count from 1904
    pub(crate) is_1904: bool,
}

impl XlsxWorkbook {
    /// Opens a workbook and loads its sheet list and number formats
    pub(crate) fn open(path: &Path) -> Result<XlsxWorkbook, SheetError> {
        let mut zip = excel::open_package(path)?;
        let (sheets, is_1904) = load_workbook(&mut zip)?;
        if sheets.is_empty() {
            Err(SpreadsheetError::SpreadsheetEmptyError(path.display().to_string()))?
        }
        let number_formats = load_number_formats(&mut zip, is_1904)?;
        debug!(path = %path.display(), sheets = sheets.len(), is_1904, "opened workbook");
        Ok(XlsxWorkbook {
            path: path.to_owned(),
            zip,
            number_formats,
            sheets,
            is_1904,
        })
    }

    /// Zip path of the first worksheet
    pub(crate) fn first_sheet_path(&self) -> Result<String, SheetError> {
        let (_, zip_path) = self.sheets.first()
            .ok_or_else(|| SpreadsheetError::SpreadsheetEmptyError(self.path.display().to_string()))?;
        self.zip.entry_name(zip_path)
            .ok_or_else(|| SpreadsheetError::FileError(zip_path.to_owned()).into())
    }

    /// Loads the shared string table, empty when the part is absent
    pub(crate) fn load_shared_strings(&mut self) -> Result<Vec<String>, SheetError> {
        let mut shared_strings = Vec::<String>::new();
        let mut reader = match self.zip.xml_reader("xl/sharedStrings.xml")? {
            Some(reader) => reader,
            None => return Ok(shared_strings),
        };
        match_xml_events!(reader => {
            Event::Start(event) if event.local_name().as_ref() == TAG_SHARED_STRING_ITEM => {
                shared_strings.push(read_string_value(&mut reader, TAG_SHARED_STRING_ITEM, false)?);
            }
        });
        Ok(shared_strings)
    }

    /// Reads the first worksheet into a table.
    ///
    /// The first row holding any value is the header; every later row up to the
    /// last non-empty one becomes a data row, blank rows in between included.
    pub(crate) fn read_first_sheet(&mut self) -> Result<Table, SheetError> {
        let shared_strings = self.load_shared_strings()?;
        let sheet_name = self.sheets[0].0.to_owned();
        let zip_path = self.first_sheet_path()?;
        let file_name = self.path.display().to_string();
        let mut collector = RowCollector::default();

        let mut reader = self.zip.xml_reader(&zip_path)?
            .ok_or_else(|| SpreadsheetError::FileError(zip_path.to_owned()))?;
        let mut row_count = 0usize;
        let mut col_count = 0usize;
        let mut position = (0usize, 0usize);
        let mut kind = CellType::default();
        let mut value = String::new();
        match_xml_events!(reader => {
            Event::Start(event) if event.local_name().as_ref() == TAG_ROW => {
                if let Some(row) = event.parse_attribute_value::<usize>("r")? {
                    row_count = row.saturating_sub(1);
                }
                col_count = 0;
            }
            Event::End(event) if event.local_name().as_ref() == TAG_ROW => {
                row_count += 1;
            }
            Event::Start(event) if event.local_name().as_ref() == TAG_CELL => {
                position = event.get_attribute_value("r")?
                    .and_then(|reference| reference_to_index(&reference))
                    .unwrap_or((row_count, col_count));
                col_count = position.1 + 1;
                kind = CellType::from_type_attribute(event.get_attribute_value("t")?.as_deref());
                if kind == CellType::Number {
                    if let Some(style) = event.parse_attribute_value::<usize>("s")? {
                        kind = self.number_formats.get(style).copied().unwrap_or(CellType::Number);
                    }
                }
                value.clear();
            }
            Event::Start(event) if event.local_name().as_ref() == TAG_INLINE_STRING => {
                value = read_string_value(&mut reader, TAG_INLINE_STRING, false)?;
            }
            Event::Start(event) if event.local_name().as_ref() == TAG_VALUE => {
                value = read_string_value(&mut reader, TAG_VALUE, true)?;
            }
            Event::End(event) if event.local_name().as_ref() == TAG_CELL => {
                let decoded = kind.decode(&value, &shared_strings).map_err(|raw| {
                    SpreadsheetError::CellValueError(
                        file_name.to_owned(),
                        sheet_name.to_owned(),
                        index_to_reference(position.0, position.1),
                        raw,
                    )
                })?;
                collector.push(position.0, position.1, decoded);
                value.clear();
            }
        });

        let table = collector.into_table();
        debug!(file = %file_name, sheet = %sheet_name, rows = table.len(), columns = table.columns().len(), "read worksheet");
        Ok(table)
    }
}

/// Gathers sparse cells and turns them into a dense table
#[derive(Default)]
struct RowCollector {
    rows: Vec<(usize, Vec<(usize, Value)>)>,
}

impl RowCollector {
    fn push(&mut self, row: usize, col: usize, value: Value) {
        if value == Value::Empty {
            return;
        }
        match self.rows.last_mut() {
            Some((last, cells)) if *last == row => cells.push((col, value)),
            _ => self.rows.push((row, vec![(col, value)])),
        }
    }

    fn into_table(mut self) -> Table {
        self.rows.sort_by_key(|(row, _)| *row);
        let mut rows = self.rows.into_iter();
        let (header_row, header_cells) = match rows.next() {
            Some(header) => header,
            None => return Table::default(),
        };

        // Data cells right of the last header cell widen the table under positional names
        let width = rows
            .as_slice()
            .iter()
            .flat_map(|(_, cells)| cells.iter())
            .chain(header_cells.iter())
            .map(|(col, _)| col + 1)
            .max()
            .unwrap_or(0);
        let mut names = vec![String::new(); width];
        for (col, value) in header_cells {
            names[col] = value.to_string();
        }
        let mut table = Table::new(header_names(names));

        let mut next_row = header_row + 1;
        for (row, cells) in rows {
            while next_row < row {
                table.push_row(Vec::new());
                next_row += 1;
            }
            let mut values = vec![Value::Empty; width];
            for (col, value) in cells {
                values[col] = value;
            }
            table.push_row(values);
            next_row = row + 1;
        }
        table
    }
}

/// Fills blank header names positionally and disambiguates duplicates with `.1`, `.2`...
fn header_names(names: Vec<String>) -> Vec<String> {
    let mut seen = HashMap::<String, usize>::new();
    names
        .into_iter()
        .enumerate()
        .map(|(index, name)| {
            let name = if name.trim().is_empty() { format!("Unnamed: {index}") } else { name };
            let count = seen.entry(name.to_owned()).or_insert(0);
            *count += 1;
            if *count == 1 {
                name
            } else {
                format!("{}.{}", name, *count - 1)
            }
        })
        .collect()
}

/// Loads the sheet list and the date system from `xl/workbook.xml`
fn load_workbook(zip: &mut ZipArchive<PackageReader>) -> Result<(Vec<(String, String)>, bool), SheetError> {
    let relationships = excel::load_relationships(zip, "xl/_rels/workbook.xml.rels", "/worksheet")?;
    let mut reader = zip.xml_reader("xl/workbook.xml")?
        .ok_or_else(|| SpreadsheetError::FileError("xl/workbook.xml".to_string()))?;
    let mut sheets: Vec<(String, String)> = Vec::new();
    let mut is_1904 = false;
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_SHEET => {
            let mut name = None::<Cow<str>>;
            let mut id = None::<Cow<str>>;
            for result in event.attributes() {
                let attribute = result?;
                let key = attribute.key.local_name();
                if key.as_ref() == b"name" {
                    name = Some(attribute.unescape_value()?);
                } else if key.as_ref() == b"id" {
                    id = Some(attribute.unescape_value()?);
                }
            }
            if let Some((name, id)) = name.zip(id) {
                if let Some(path) = relationships.get(id.as_ref()) {
                    sheets.push((name.to_string(), path.to_owned()));
                }
            }
        }
        Event::Start(event) if event.local_name().as_ref() == TAG_WORKBOOK_PROPERTIES => {
            is_1904 = event.get_attribute_value("date1904")?
                .map(|value| value == "1" || value == "true")
                .unwrap_or(false);
        }
    });
    Ok((sheets, is_1904))
}

/// Loads `cellXfs` number formats from `xl/styles.xml`
fn load_number_formats(zip: &mut ZipArchive<PackageReader>, is_1904: bool) -> Result<Vec<CellType>, SheetError> {
    let mut reader = match zip.xml_reader("xl/styles.xml")? {
        Some(reader) => reader,
        None => return Ok(Vec::new()),
    };

    let mut custom_formats_context = false;
    let mut custom_formats = HashMap::<String, CellType>::new();
    let mut format_indexes_context = false;
    let mut format_indexes = Vec::<String>::new();

    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_CUSTOM_FORMATS => custom_formats_context = true,
        Event::End(event) if event.local_name().as_ref() == TAG_CUSTOM_FORMATS => custom_formats_context = false,
        Event::Start(event) if custom_formats_context && event.local_name().as_ref() == TAG_CUSTOM_FORMAT => {
            let id = event.get_attribute_value("numFmtId")?;
            let format = event.get_attribute_value("formatCode")?;
            if let Some((id, format)) = id.zip(format) {
                custom_formats.insert(id.to_string(), CellType::parse_custom_number_format(&format, is_1904));
            }
        }
        Event::Start(event) if event.local_name().as_ref() == TAG_FORMAT_INDEXES => format_indexes_context = true,
        Event::End(event) if event.local_name().as_ref() == TAG_FORMAT_INDEXES => break,
        Event::Start(event) if format_indexes_context && event.local_name().as_ref() == TAG_FORMAT_INDEX => {
            let id = event.get_attribute_value("numFmtId")?;
            format_indexes.push(id.map(|id| id.to_string()).unwrap_or_else(|| "0".to_owned()));
        }
    });

    Ok(excel::load_number_formats(format_indexes, custom_formats, is_1904))
}

/// Reads string content up to `end_tag`, skipping phonetic runs
///
/// # Arguments
/// * `reader` - XML reader positioned after the opening tag
/// * `end_tag` - Local name of the element that closes the string
/// * `is_text_content` - Whether text is collected before any `<t>` is seen
fn read_string_value<R: BufRead>(
    reader: &mut XmlReader<R>,
    end_tag: &[u8],
    is_text_content: bool,
) -> Result<String, SheetError> {
    let mut is_phonetic_text = false;
    let mut is_text = is_text_content;
    let mut text = String::new();
    match_xml_events!(reader => {
        Event::End(event) if event.local_name().as_ref() == end_tag => break,
        Event::Start(event) if event.local_name().as_ref() == TAG_PHONETIC_TEXT => is_phonetic_text = true,
        Event::End(event) if event.local_name().as_ref() == TAG_PHONETIC_TEXT => is_phonetic_text = false,
        Event::Start(event) if !is_phonetic_text && event.local_name().as_ref() == TAG_TEXT => is_text = true,
        Event::End(event) if is_text && event.local_name().as_ref() == TAG_TEXT => is_text = false,
        Event::Text(event) if is_text => text.push_str(&event.xml_content()?),
        Event::CData(event) if is_text => text.push_str(&event.xml_content()?),
        Event::GeneralRef(event) if is_text => text.push_bytes_ref(&event)?,
    });
    Ok(text)
}

/// Reads the first worksheet of the workbook at `path`
pub(crate) fn read_first_sheet(path: &Path) -> Result<Table, SheetError> {
    let mut workbook = XlsxWorkbook::open(path)?;
    workbook.read_first_sheet().with_prefix(&workbook.first_sheet_path()?)
}
