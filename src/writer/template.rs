//! Writes a merged table into a copy of a template workbook.
//!
//! Every package part of the template is copied unchanged except the first
//! worksheet, which is streamed through: sheet properties, column widths,
//! views and page setup survive, the header row keeps its styles, and the
//! template's data rows are replaced by the table rows.

use crate::error::SheetError;
use crate::helpers::xml::name_prefix;
use crate::helpers::xml::qualify;
use crate::helpers::xml::write_start;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlReader;
use crate::helpers::zip::deflated;
use crate::helpers::zip::ZipHelper;
use crate::progress::ProgressReporter;
use crate::progress::Stage;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::reference::index_to_reference;
use crate::spreadsheet::reference::reference_to_index;
use crate::spreadsheet::xlsx::XlsxWorkbook;
use crate::table::Table;
use crate::table::Value;
use crate::writer::cells::RowWriter;
use crate::writer::persist_atomically;
use quick_xml::events::BytesEnd;
use quick_xml::events::BytesStart;
use quick_xml::events::Event;
use quick_xml::Writer;
use std::io::BufRead;
use std::io::BufReader;
use std::io::Write;
use std::path::Path;
use tracing::debug;
use zip::ZipWriter;

const CALC_CHAIN: &str = "xl/calcChain.xml";
const CONTENT_TYPES: &str = "[Content_Types].xml";
const WORKBOOK_RELS: &str = "xl/_rels/workbook.xml.rels";

/// Styles and row formatting captured from the template's `<sheetData>`
#[derive(Debug, Default)]
struct TemplateLayout {
    /// `<row>` attributes of the header row other than `r` and `spans`
    header_attributes: Vec<(String, String)>,
    /// Style id of each header cell
    header_styles: Vec<Option<usize>>,
    /// Style id of each cell in the first data row
    data_styles: Vec<Option<usize>>,
}

impl TemplateLayout {
    fn record(styles: &mut Vec<Option<usize>>, col: usize, style: Option<usize>) {
        if styles.len() <= col {
            styles.resize(col + 1, None);
        }
        styles[col] = style;
    }
}

/// Writes `table` to `output` using the first sheet of `template` as the visual template.
///
/// # Arguments
/// * `template` - Workbook whose formatting is reused
/// * `table` - Header and rows to write
/// * `output` - Destination path, replaced atomically
/// * `interval` - Emit write progress every `interval` rows
/// * `reporter` - Receives `Stage::Write` progress
pub(crate) fn write_with_template(
    template: &Path,
    table: &Table,
    output: &Path,
    interval: usize,
    reporter: &dyn ProgressReporter,
) -> Result<(), SheetError> {
    let mut workbook = XlsxWorkbook::open(template)?;
    let sheet_path = workbook.first_sheet_path()?;
    let has_calc_chain = workbook.zip.entry_name(CALC_CHAIN).is_some();
    debug!(template = %template.display(), sheet = %sheet_path, has_calc_chain, "writing from template");

    persist_atomically(output, |file| {
        let mut zip = ZipWriter::new(file);
        for index in 0..workbook.zip.len() {
            let name = workbook.zip.by_index(index)?.name().to_owned();
            if name == sheet_path {
                zip.start_file(name.as_str(), deflated())?;
                let source = BufReader::new(workbook.zip.by_index(index)?);
                let sheet = SheetRewrite {
                    table,
                    formats: &workbook.number_formats,
                    is_1904: workbook.is_1904,
                    interval,
                    reporter,
                };
                sheet.rewrite(source, &mut zip)?;
            } else if has_calc_chain && name.eq_ignore_ascii_case(CALC_CHAIN) {
                continue;
            } else if has_calc_chain && (name.eq_ignore_ascii_case(CONTENT_TYPES) || name.eq_ignore_ascii_case(WORKBOOK_RELS)) {
                zip.start_file(name.as_str(), deflated())?;
                let source = BufReader::new(workbook.zip.by_index(index)?);
                copy_without_calc_chain(source, &mut zip)?;
            } else {
                zip.raw_copy_file(workbook.zip.by_index(index)?)?;
            }
        }
        zip.finish()?;
        Ok(())
    })
}

/// Streams one worksheet part, replacing its rows
struct SheetRewrite<'a> {
    table: &'a Table,
    formats: &'a [CellType],
    is_1904: bool,
    interval: usize,
    reporter: &'a dyn ProgressReporter,
}

impl SheetRewrite<'_> {
    fn rewrite<R: BufRead, W: Write>(&self, source: R, destination: W) -> Result<(), SheetError> {
        let mut reader = XmlReader::verbatim(source);
        let mut writer = Writer::new(destination);
        while let Some(event) = reader.next()? {
            match event {
                Event::Empty(element) if element.local_name().as_ref() == b"dimension" => {
                    let name = String::from_utf8_lossy(element.name().as_ref()).into_owned();
                    let dimension = self.dimension();
                    write_start(&mut writer, &name, &[("ref", dimension.as_str())], true)?;
                }
                Event::Start(element) if element.local_name().as_ref() == b"sheetData" => {
                    let prefix = name_prefix(element.name())?;
                    writer.write_event(Event::Start(element))?;
                    let layout = scan_template_rows(&mut reader)?;
                    self.write_rows(&mut writer, &prefix, &layout)?;
                    writer.write_event(Event::End(BytesEnd::new(qualify(&prefix, "sheetData"))))?;
                }
                Event::Empty(element) if element.local_name().as_ref() == b"sheetData" => {
                    let prefix = name_prefix(element.name())?;
                    let name = qualify(&prefix, "sheetData");
                    writer.write_event(Event::Start(BytesStart::new(name.as_str())))?;
                    self.write_rows(&mut writer, &prefix, &TemplateLayout::default())?;
                    writer.write_event(Event::End(BytesEnd::new(name)))?;
                }
                Event::Start(element) if element.local_name().as_ref() == b"mergeCells" => {
                    let prefix = name_prefix(element.name())?;
                    let kept = header_merges(&mut reader)?;
                    if !kept.is_empty() {
                        let count = kept.len().to_string();
                        write_start(&mut writer, &qualify(&prefix, "mergeCells"), &[("count", count.as_str())], false)?;
                        for range in &kept {
                            write_start(&mut writer, &qualify(&prefix, "mergeCell"), &[("ref", range.as_str())], true)?;
                        }
                        writer.write_event(Event::End(BytesEnd::new(qualify(&prefix, "mergeCells"))))?;
                    }
                }
                Event::Empty(element) if element.local_name().as_ref() == b"mergeCells" => (),
                event => writer.write_event(event)?,
            }
        }
        Ok(())
    }

    fn dimension(&self) -> String {
        let width = self.table.columns().len().max(1);
        format!("A1:{}", index_to_reference(self.table.len(), width - 1))
    }

    fn write_rows<W: Write>(&self, writer: &mut Writer<W>, prefix: &str, layout: &TemplateLayout) -> Result<(), SheetError> {
        let rows = RowWriter::new(prefix, self.formats, self.is_1904);
        let header: Vec<Value> = self.table.columns().iter().map(|name| Value::from(name.as_str())).collect();
        rows.write_row(writer, 0, &header, &layout.header_styles, &layout.header_attributes)?;

        let total = self.table.len();
        for (index, values) in self.table.rows().iter().enumerate() {
            rows.write_row(writer, index + 1, values, &layout.data_styles, &[])?;
            let written = index + 1;
            if written % self.interval.max(1) == 0 || written == total {
                self.reporter.report(Stage::Write, written, total, &format!("Writing row {written} / {total}"));
            }
        }
        Ok(())
    }
}

/// Consumes the template's `<sheetData>` content up to its end tag,
/// keeping only the formatting of the header row and the first data row.
fn scan_template_rows<R: BufRead>(reader: &mut XmlReader<R>) -> Result<TemplateLayout, SheetError> {
    let mut layout = TemplateLayout::default();
    let mut row = 0usize;
    let mut col = 0usize;
    let mut header_row = None::<usize>;
    let mut data_row = None::<usize>;
    while let Some(event) = reader.next()? {
        match event {
            Event::End(element) if element.local_name().as_ref() == b"sheetData" => break,
            Event::Start(element) if element.local_name().as_ref() == b"row" => {
                if let Some(number) = element.parse_attribute_value::<usize>("r")? {
                    row = number.saturating_sub(1);
                }
                col = 0;
                if header_row.is_none() {
                    header_row = Some(row);
                    layout.header_attributes = element.owned_attributes(&["r", "spans"])?;
                } else if data_row.is_none() && header_row != Some(row) {
                    data_row = Some(row);
                }
            }
            Event::Empty(element) if element.local_name().as_ref() == b"row" => {
                if let Some(number) = element.parse_attribute_value::<usize>("r")? {
                    row = number.saturating_sub(1);
                }
                if header_row.is_none() {
                    header_row = Some(row);
                    layout.header_attributes = element.owned_attributes(&["r", "spans"])?;
                }
                row += 1;
            }
            Event::End(element) if element.local_name().as_ref() == b"row" => row += 1,
            Event::Start(element) | Event::Empty(element) if element.local_name().as_ref() == b"c" => {
                let (_, cell_col) = element.get_attribute_value("r")?
                    .and_then(|reference| reference_to_index(&reference))
                    .unwrap_or((row, col));
                col = cell_col + 1;
                let style = element.parse_attribute_value::<usize>("s")?;
                if header_row == Some(row) {
                    TemplateLayout::record(&mut layout.header_styles, cell_col, style);
                } else if data_row == Some(row) {
                    TemplateLayout::record(&mut layout.data_styles, cell_col, style);
                }
            }
            _ => (),
        }
    }
    Ok(layout)
}

/// Consumes `<mergeCells>` and returns the ranges that lie entirely in row 1.
fn header_merges<R: BufRead>(reader: &mut XmlReader<R>) -> Result<Vec<String>, SheetError> {
    let mut kept = Vec::new();
    while let Some(event) = reader.next()? {
        match event {
            Event::End(element) if element.local_name().as_ref() == b"mergeCells" => break,
            Event::Start(element) | Event::Empty(element) if element.local_name().as_ref() == b"mergeCell" => {
                if let Some(range) = element.get_attribute_value("ref")? {
                    let in_header = range
                        .split(':')
                        .all(|reference| reference_to_index(reference).is_some_and(|(row, _)| row == 0));
                    if in_header {
                        kept.push(range.into_owned());
                    }
                }
            }
            _ => (),
        }
    }
    Ok(kept)
}

/// Copies a content-types or relationships part, dropping references to the calculation chain.
fn copy_without_calc_chain<R: BufRead, W: Write>(source: R, destination: W) -> Result<(), SheetError> {
    let mut reader = XmlReader::verbatim(source);
    let mut writer = Writer::new(destination);
    let mut skipping = None::<Vec<u8>>;
    while let Some(event) = reader.next()? {
        if let Some(name) = &skipping {
            if matches!(&event, Event::End(element) if element.name().as_ref() == name.as_slice()) {
                skipping = None;
            }
            continue;
        }
        match event {
            Event::Empty(element) if references_calc_chain(&element)? => (),
            Event::Start(element) if references_calc_chain(&element)? => {
                skipping = Some(element.name().as_ref().to_vec());
            }
            event => writer.write_event(event)?,
        }
    }
    Ok(())
}

fn references_calc_chain(element: &BytesStart) -> Result<bool, SheetError> {
    for key in ["PartName", "Target"] {
        if let Some(value) = element.get_attribute_value(key)? {
            if value.to_ascii_lowercase().ends_with("calcchain.xml") {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spreadsheet::read_table;
    use crate::test_utils::write_package;
    use std::io::Read;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use zip::ZipArchive;

    const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/calcChain.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.calcChain+xml"/></Types>"#;
    const WORKBOOK: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Report" sheetId="1" r:id="rId1"/></sheets></workbook>"#;
    const RELS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/><Relationship Id="rId9" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/calcChain" Target="calcChain.xml"/></Relationships>"#;
    const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><cellXfs count="3"><xf numFmtId="0"/><xf numFmtId="0" fontId="1"/><xf numFmtId="14"/></cellXfs></styleSheet>"#;
    const SHEET: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><dimension ref="A1:B3"/><cols><col min="1" max="1" width="30.5" customWidth="1"/></cols><sheetData><row r="1" spans="1:2" ht="24" customHeight="1"><c r="A1" s="1" t="inlineStr"><is><t>Old A</t></is></c><c r="B1" s="1" t="inlineStr"><is><t>Old B</t></is></c></row><row r="2"><c r="A2"><v>1</v></c><c r="B2" s="2"><v>45000</v></c></row><row r="3"><c r="A3"><v>2</v></c></row></sheetData><mergeCells count="2"><mergeCell ref="A1:B1"/><mergeCell ref="A2:A3"/></mergeCells><pageMargins left="0.7" right="0.7" top="0.75" bottom="0.75" header="0.3" footer="0.3"/></worksheet>"#;

    fn template(dir: &Path) -> PathBuf {
        let path = dir.join("template.xlsx");
        write_package(&path, &[
            ("[Content_Types].xml", CONTENT_TYPES_XML),
            ("xl/workbook.xml", WORKBOOK),
            ("xl/_rels/workbook.xml.rels", RELS),
            ("xl/styles.xml", STYLES),
            ("xl/worksheets/sheet1.xml", SHEET),
            ("xl/calcChain.xml", r#"<calcChain><c r="A3" i="1"/></calcChain>"#),
        ]);
        path
    }

    fn merged_table(rows: usize) -> Table {
        let mut table = Table::new(vec!["id".to_owned(), "date".to_owned()]);
        let datetime = chrono::NaiveDate::from_ymd_opt(2024, 1, 2).unwrap().and_hms_opt(0, 0, 0).unwrap();
        for index in 0..rows {
            table.push_row(vec![Value::Number(index as f64), Value::DateTime(datetime)]);
        }
        table
    }

    fn part(path: &Path, name: &str) -> Option<String> {
        let mut zip = ZipArchive::new(std::fs::File::open(path).unwrap()).unwrap();
        let mut file = zip.file(name).unwrap()?;
        let mut text = String::new();
        file.read_to_string(&mut text).unwrap();
        Some(text)
    }

    #[test]
    fn keeps_template_formatting_and_replaces_rows() {
        let dir = tempfile::tempdir().unwrap();
        let template = template(dir.path());
        let output = dir.path().join("out.xlsx");
        let table = merged_table(3);

        write_with_template(&template, &table, &output, 500, &crate::progress::SilentReporter).unwrap();

        let sheet = part(&output, "xl/worksheets/sheet1.xml").unwrap();
        assert!(sheet.contains(r#"<cols><col min="1" max="1" width="30.5" customWidth="1"/></cols>"#), "{}", sheet);
        assert!(sheet.contains(r#"<dimension ref="A1:B4"/>"#), "{}", sheet);
        assert!(sheet.contains(r#"<row r="1" ht="24" customHeight="1"><c r="A1" s="1" t="inlineStr">"#), "{}", sheet);
        assert!(sheet.contains(r#"<c r="B4" s="2"><v>45293</v></c>"#), "{}", sheet);
        assert!(sheet.contains(r#"<mergeCells count="1"><mergeCell ref="A1:B1"/></mergeCells>"#), "{}", sheet);
        assert!(sheet.contains("<pageMargins"), "{}", sheet);
        assert!(!sheet.contains("Old A"));

        assert!(part(&output, "xl/calcChain.xml").is_none());
        assert!(!part(&output, "[Content_Types].xml").unwrap().contains("calcChain"));
        assert!(!part(&output, "xl/_rels/workbook.xml.rels").unwrap().contains("calcChain"));
        assert!(part(&output, "xl/styles.xml").unwrap().contains("fontId=\"1\""));

        let read_back = read_table(&output).unwrap();
        assert_eq!(read_back, table);
    }

    #[test]
    fn reports_every_interval_and_last_row() {
        let dir = tempfile::tempdir().unwrap();
        let template = template(dir.path());
        let output = dir.path().join("out.xlsx");
        let events = Mutex::new(Vec::new());
        let reporter = |stage: Stage, current: usize, total: usize, _: &str| {
            events.lock().unwrap().push((stage, current, total));
        };

        write_with_template(&template, &merged_table(5), &output, 2, &reporter).unwrap();

        let events = events.into_inner().unwrap();
        assert_eq!(events, vec![(Stage::Write, 2, 5), (Stage::Write, 4, 5), (Stage::Write, 5, 5)]);
    }

    #[test]
    fn failed_write_leaves_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.xlsx");
        let missing = dir.path().join("missing.xlsx");
        assert!(write_with_template(&missing, &merged_table(1), &output, 500, &crate::progress::SilentReporter).is_err());
        assert!(!output.exists());
    }
}
