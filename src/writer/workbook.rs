//! Builds a standalone single-sheet workbook for report output.

use crate::error::SheetError;
use crate::helpers::xml::write_start;
use crate::helpers::zip::deflated;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::reference::index_to_reference;
use crate::table::Table;
use crate::table::Value;
use crate::writer::cells::RowWriter;
use crate::writer::persist_atomically;
use quick_xml::events::BytesDecl;
use quick_xml::events::BytesEnd;
use quick_xml::events::Event;
use quick_xml::Writer;
use std::io::Write;
use std::path::Path;
use tracing::debug;
use zip::ZipWriter;

const SHEET_NAME: &str = "Sheet1";

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/><Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/></Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#;

// xf 0: default, xf 1: date time, xf 2: bold bordered header
const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><numFmts count="1"><numFmt numFmtId="164" formatCode="yyyy-mm-dd hh:mm:ss"/></numFmts><fonts count="2"><font><sz val="11"/><name val="Calibri"/></font><font><b/><sz val="11"/><name val="Calibri"/></font></fonts><fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills><borders count="2"><border><left/><right/><top/><bottom/><diagonal/></border><border><left style="thin"/><right style="thin"/><top style="thin"/><bottom style="thin"/><diagonal/></border></borders><cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs><cellXfs count="3"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/><xf numFmtId="164" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/><xf numFmtId="0" fontId="1" fillId="0" borderId="1" xfId="0" applyFont="1" applyBorder="1"/></cellXfs><cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles></styleSheet>"#;

/// Cell type of each `cellXfs` entry in [`STYLES`]
const FORMATS: [CellType; 3] = [CellType::Number, CellType::SerialDate1900, CellType::Number];
const HEADER_STYLE: usize = 2;

const NS_MAIN: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const NS_RELATIONSHIPS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Writes `table` as the only sheet of a new workbook at `path`.
pub(crate) fn write_workbook(path: &Path, table: &Table) -> Result<(), SheetError> {
    persist_atomically(path, |file| {
        let mut zip = ZipWriter::new(file);
        for (name, content) in [
            ("[Content_Types].xml", CONTENT_TYPES),
            ("_rels/.rels", ROOT_RELS),
            ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS),
            ("xl/styles.xml", STYLES),
        ] {
            zip.start_file(name, deflated())?;
            zip.write_all(content.as_bytes())?;
        }

        zip.start_file("xl/workbook.xml", deflated())?;
        write_workbook_part(&mut zip)?;

        zip.start_file("xl/worksheets/sheet1.xml", deflated())?;
        write_sheet_part(&mut zip, table)?;

        zip.finish()?;
        Ok(())
    })?;
    debug!(path = %path.display(), rows = table.len(), "wrote workbook");
    Ok(())
}

fn write_workbook_part<W: Write>(destination: W) -> Result<(), SheetError> {
    let mut writer = Writer::new(destination);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
    write_start(&mut writer, "workbook", &[("xmlns", NS_MAIN), ("xmlns:r", NS_RELATIONSHIPS)], false)?;
    write_start(&mut writer, "sheets", &[], false)?;
    write_start(&mut writer, "sheet", &[("name", SHEET_NAME), ("sheetId", "1"), ("r:id", "rId1")], true)?;
    writer.write_event(Event::End(BytesEnd::new("sheets")))?;
    writer.write_event(Event::End(BytesEnd::new("workbook")))?;
    Ok(())
}

fn write_sheet_part<W: Write>(destination: W, table: &Table) -> Result<(), SheetError> {
    let mut writer = Writer::new(destination);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
    write_start(&mut writer, "worksheet", &[("xmlns", NS_MAIN), ("xmlns:r", NS_RELATIONSHIPS)], false)?;

    let width = table.columns().len().max(1);
    let dimension = format!("A1:{}", index_to_reference(table.len(), width - 1));
    write_start(&mut writer, "dimension", &[("ref", dimension.as_str())], true)?;

    write_start(&mut writer, "sheetData", &[], false)?;
    let rows = RowWriter::new("", &FORMATS, false);
    let header: Vec<Value> = table.columns().iter().map(|name| Value::from(name.as_str())).collect();
    let header_styles = vec![Some(HEADER_STYLE); header.len()];
    rows.write_row(&mut writer, 0, &header, &header_styles, &[])?;
    for (index, values) in table.rows().iter().enumerate() {
        rows.write_row(&mut writer, index + 1, values, &[], &[])?;
    }
    writer.write_event(Event::End(BytesEnd::new("sheetData")))?;

    writer.write_event(Event::End(BytesEnd::new("worksheet")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::zip::ZipHelper;
    use crate::spreadsheet::read_table;
    use crate::spreadsheet::xlsx::XlsxWorkbook;
    use chrono::NaiveDate;
    use std::io::Read;

    fn report() -> Table {
        let mut table = Table::new(vec!["销售凭证".to_owned(), "Eq.PE".to_owned(), "日期".to_owned()]);
        let datetime = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap().and_hms_opt(8, 30, 0).unwrap();
        table.push_row(vec![Value::Number(1001.0), Value::from("PE & Co"), Value::DateTime(datetime)]);
        table.push_row(vec![Value::from("A-2"), Value::Empty, Value::Bool(true)]);
        table
    }

    #[test]
    fn written_workbook_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("PE_ICL抽取结果.xlsx");
        let table = report();

        write_workbook(&path, &table).unwrap();

        assert_eq!(read_table(&path).unwrap(), table);
        let workbook = XlsxWorkbook::open(&path).unwrap();
        assert_eq!(workbook.sheets, vec![("Sheet1".to_owned(), "xl/worksheets/sheet1.xml".to_owned())]);
    }

    #[test]
    fn header_is_styled_and_dimension_set() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.xlsx");
        write_workbook(&path, &report()).unwrap();

        let mut zip = zip::ZipArchive::new(std::fs::File::open(&path).unwrap()).unwrap();
        let mut sheet = String::new();
        zip.file("xl/worksheets/sheet1.xml").unwrap().unwrap().read_to_string(&mut sheet).unwrap();
        assert!(sheet.contains(r#"<dimension ref="A1:C3"/>"#), "{}", sheet);
        assert!(sheet.contains(r#"<c r="A1" s="2" t="inlineStr">"#), "{}", sheet);
        assert!(sheet.contains(r#"<c r="C2" s="1">"#), "{}", sheet);
    }

    #[test]
    fn empty_table_still_has_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.xlsx");
        let table = Table::new(vec!["a".to_owned(), "b".to_owned()]);
        write_workbook(&path, &table).unwrap();
        let read_back = read_table(&path).unwrap();
        assert_eq!(read_back.columns(), &["a", "b"]);
        assert!(read_back.is_empty());
    }
}
