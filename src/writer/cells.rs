//! Encoding of table rows as SpreadsheetML `<row>`/`<c>` elements.

use crate::error::SheetError;
use crate::helpers::xml::qualify;
use crate::helpers::xml::write_start;
use crate::spreadsheet::cell::datetime_to_serial;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::reference::index_to_reference;
use crate::table::Value;
use quick_xml::events::BytesEnd;
use quick_xml::events::BytesText;
use quick_xml::events::Event;
use quick_xml::Writer;
use std::io::Write;

/// Writes rows for one worksheet, choosing style ids per column.
pub(crate) struct RowWriter<'a> {
    /// Namespace prefix of the worksheet's SpreadsheetML elements
    prefix: &'a str,
    /// Cell type of every `cellXfs` style id
    formats: &'a [CellType],
    /// First style id with a date format, used when a column has none
    date_style: Option<usize>,
    is_1904: bool,
}

impl<'a> RowWriter<'a> {
    pub(crate) fn new(prefix: &'a str, formats: &'a [CellType], is_1904: bool) -> Self {
        RowWriter {
            prefix,
            formats,
            date_style: formats.iter().position(CellType::is_date),
            is_1904,
        }
    }

    /// Writes one `<row>`; `row` is 0-based, empty values produce no `<c>`.
    ///
    /// # Arguments
    /// * `writer` - Destination of the worksheet XML
    /// * `row` - Row index within the sheet
    /// * `values` - Cell values, one per column
    /// * `styles` - Style id for each column, `None` for the default style
    /// * `row_attributes` - Extra `<row>` attributes such as `ht`
    pub(crate) fn write_row<W: Write>(
        &self,
        writer: &mut Writer<W>,
        row: usize,
        values: &[Value],
        styles: &[Option<usize>],
        row_attributes: &[(String, String)],
    ) -> Result<(), SheetError> {
        let row_name = qualify(self.prefix, "row");
        let number = (row + 1).to_string();
        let mut attributes = vec![("r", number.as_str())];
        attributes.extend(row_attributes.iter().map(|(key, value)| (key.as_str(), value.as_str())));
        write_start(writer, &row_name, &attributes, false)?;
        for (col, value) in values.iter().enumerate() {
            self.write_cell(writer, row, col, value, styles.get(col).copied().flatten())?;
        }
        writer.write_event(Event::End(BytesEnd::new(row_name)))?;
        Ok(())
    }

    fn write_cell<W: Write>(
        &self,
        writer: &mut Writer<W>,
        row: usize,
        col: usize,
        value: &Value,
        style: Option<usize>,
    ) -> Result<(), SheetError> {
        let (kind, style, content) = match value {
            Value::Empty => return Ok(()),
            Value::Number(number) if !number.is_finite() => return Ok(()),
            Value::Number(number) => (None, style, number.to_string()),
            Value::Bool(flag) => (Some("b"), style, if *flag { "1" } else { "0" }.to_owned()),
            Value::Text(text) => (Some("inlineStr"), style, sanitize(text)),
            Value::DateTime(datetime) => {
                let date_style = style
                    .filter(|style| self.formats.get(*style).is_some_and(CellType::is_date))
                    .or(self.date_style);
                match date_style {
                    Some(date_style) => (None, Some(date_style), datetime_to_serial(*datetime, self.is_1904).to_string()),
                    None => (Some("inlineStr"), style, value.to_string()),
                }
            }
        };

        let reference = index_to_reference(row, col);
        let style = style.map(|style| style.to_string());
        let mut attributes = vec![("r", reference.as_str())];
        if let Some(style) = style.as_deref() {
            attributes.push(("s", style));
        }
        if let Some(kind) = kind {
            attributes.push(("t", kind));
        }

        let cell_name = qualify(self.prefix, "c");
        write_start(writer, &cell_name, &attributes, false)?;
        if kind == Some("inlineStr") {
            let inline_name = qualify(self.prefix, "is");
            let text_name = qualify(self.prefix, "t");
            write_start(writer, &inline_name, &[], false)?;
            write_start(writer, &text_name, &[("xml:space", "preserve")], false)?;
            writer.write_event(Event::Text(BytesText::new(&content)))?;
            writer.write_event(Event::End(BytesEnd::new(text_name)))?;
            writer.write_event(Event::End(BytesEnd::new(inline_name)))?;
        } else {
            let value_name = qualify(self.prefix, "v");
            write_start(writer, &value_name, &[], false)?;
            writer.write_event(Event::Text(BytesText::new(&content)))?;
            writer.write_event(Event::End(BytesEnd::new(value_name)))?;
        }
        writer.write_event(Event::End(BytesEnd::new(cell_name)))?;
        Ok(())
    }
}

/// Drops control characters that XML 1.0 cannot carry.
fn sanitize(text: &str) -> String {
    text.chars()
        .filter(|character| !character.is_control() || matches!(character, '\t' | '\n' | '\r'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn render(formats: &[CellType], values: &[Value], styles: &[Option<usize>]) -> String {
        let mut writer = Writer::new(Vec::new());
        RowWriter::new("", formats, false)
            .write_row(&mut writer, 1, values, styles, &[("ht".to_owned(), "20".to_owned())])
            .unwrap();
        String::from_utf8(writer.into_inner()).unwrap()
    }

    #[test]
    fn typed_cells() {
        let xml = render(
            &[],
            &[Value::from("a<b"), Value::Number(2.5), Value::Empty, Value::Bool(false)],
            &[Some(3)],
        );
        assert_eq!(
            xml,
            concat!(
                r#"<row r="2" ht="20">"#,
                r#"<c r="A2" s="3" t="inlineStr"><is><t xml:space="preserve">a&lt;b</t></is></c>"#,
                r#"<c r="B2"><v>2.5</v></c>"#,
                r#"<c r="D2" t="b"><v>0</v></c>"#,
                "</row>"
            )
        );
    }

    #[test]
    fn dates_use_a_date_style() {
        let datetime = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap().and_hms_opt(12, 0, 0).unwrap();
        let formats = [CellType::Number, CellType::Number, CellType::SerialDate1900];

        let xml = render(&formats, &[Value::DateTime(datetime)], &[Some(1)]);
        assert!(xml.contains(r#"<c r="A2" s="2"><v>44927.5</v></c>"#), "{}", xml);

        let xml = render(&[], &[Value::DateTime(datetime)], &[]);
        assert!(xml.contains("2023-01-01 12:00:00"), "{}", xml);
    }

    #[test]
    fn control_characters_are_removed() {
        assert_eq!(sanitize("a\u{1}b\tc\n"), "ab\tc\n");
    }
}
