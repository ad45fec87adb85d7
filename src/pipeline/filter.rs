//! Selection of recent, not yet inspected records.

use crate::error::ColumnPurpose;
use crate::error::ReportError;
use crate::table::Table;
use crate::table::Value;
use chrono::Duration;
use chrono::Local;
use chrono::NaiveDate;
use chrono::NaiveDateTime;

/// Layouts accepted for dates stored as text
const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y/%m/%d %H:%M:%S", "%Y.%m.%d %H:%M:%S"];
const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d", "%Y%m%d"];

/// Half-open day range `[start, end)`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DateWindow {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateWindow {
    /// The `days` days before `today`, `today` itself excluded.
    pub fn trailing(today: NaiveDate, days: u32) -> Self {
        DateWindow {
            start: today - Duration::days(i64::from(days)),
            end: today,
        }
    }

    /// [`DateWindow::trailing`] relative to the local calendar day.
    pub fn ending_today(days: u32) -> Self {
        Self::trailing(Local::now().date_naive(), days)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end
    }
}

/// Keeps rows whose `date_column` falls in `window` and whose `check_column` is empty.
///
/// Values that are neither dates nor date-like text never match.
///
/// # Errors
///
/// [`ReportError::ColumnMissing`] naming every absent column.
pub fn filter_recent_unchecked(
    table: &Table,
    date_column: &str,
    check_column: &str,
    window: DateWindow,
) -> Result<Table, ReportError> {
    let missing = table.missing_columns(&[date_column, check_column]);
    let (date_index, check_index) = match (table.column_index(date_column), table.column_index(check_column)) {
        (Some(date_index), Some(check_index)) => (date_index, check_index),
        _ => {
            return Err(ReportError::ColumnMissing {
                purpose: ColumnPurpose::Filter,
                columns: missing,
            })
        }
    };

    Ok(table.select_rows(|row| {
        let in_window = row.get(date_index).and_then(to_date).is_some_and(|date| window.contains(date));
        in_window && row.get(check_index).map_or(true, Value::is_blank)
    }))
}

/// Calendar day of a cell value, `None` when it cannot be read as a date.
fn to_date(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::DateTime(datetime) => Some(datetime.date()),
        Value::Text(text) => parse_date_text(text.trim()),
        _ => None,
    }
}

fn parse_date_text(text: &str) -> Option<NaiveDate> {
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|datetime| datetime.date())
        .or_else(|| DATE_FORMATS.iter().find_map(|format| NaiveDate::parse_from_str(text, format).ok()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATE: &str = "3000:二次确认(AD)";
    const CHECK: &str = "7600:SAIS首检(AD)";

    fn day(offset: i64) -> NaiveDate {
        today() - Duration::days(offset)
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    fn at(offset: i64) -> Value {
        Value::DateTime(day(offset).and_hms_opt(9, 15, 0).unwrap())
    }

    fn table(rows: Vec<(Value, Value)>) -> Table {
        let mut table = Table::new(vec!["id".to_owned(), DATE.to_owned(), CHECK.to_owned()]);
        for (index, (date, check)) in rows.into_iter().enumerate() {
            table.push_row(vec![Value::Number(index as f64), date, check]);
        }
        table
    }

    fn ids(table: &Table) -> Vec<String> {
        table.rows().iter().map(|row| row[0].to_string()).collect()
    }

    #[test]
    fn window_boundaries() {
        let window = DateWindow::trailing(today(), 7);
        assert_eq!(window.start(), day(7));
        assert_eq!(window.end(), today());
        assert!(window.contains(day(7)));
        assert!(window.contains(day(1)));
        assert!(!window.contains(today()));
        assert!(!window.contains(day(8)));
    }

    #[test]
    fn window_ending_today() {
        let window = DateWindow::ending_today(7);
        assert_eq!(window.end() - window.start(), Duration::days(7));
        assert!(window.end() >= today());
    }

    #[test]
    fn keeps_recent_unchecked_rows() {
        let input = table(vec![
            (at(3), Value::Empty),
            (at(0), Value::Empty),
            (at(7), Value::Empty),
            (at(8), Value::Empty),
            (at(2), Value::from("2024-06-14")),
            (at(1), Value::from("  ")),
            (Value::Empty, Value::Empty),
            (Value::from("2024/06/10"), Value::Empty),
            (Value::from("not a date"), Value::Empty),
            (Value::Number(45450.0), Value::Empty),
        ]);

        let filtered = filter_recent_unchecked(&input, DATE, CHECK, DateWindow::trailing(today(), 7)).unwrap();

        assert_eq!(ids(&filtered), vec!["0", "2", "5", "7"]);
        assert_eq!(filtered.columns(), input.columns());
    }

    #[test]
    fn filtering_is_idempotent() {
        let input = table(vec![(at(3), Value::Empty), (at(9), Value::Empty), (at(1), Value::Bool(true))]);
        let window = DateWindow::trailing(today(), 7);
        let once = filter_recent_unchecked(&input, DATE, CHECK, window).unwrap();
        let twice = filter_recent_unchecked(&once, DATE, CHECK, window).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn no_match_is_not_an_error() {
        let input = table(vec![(at(30), Value::Empty)]);
        let filtered = filter_recent_unchecked(&input, DATE, CHECK, DateWindow::trailing(today(), 7)).unwrap();
        assert!(filtered.is_empty());
    }

    #[test]
    fn missing_columns_are_all_named() {
        let input = Table::new(vec!["id".to_owned()]);
        match filter_recent_unchecked(&input, DATE, CHECK, DateWindow::trailing(today(), 7)) {
            Err(ReportError::ColumnMissing { purpose, columns }) => {
                assert_eq!(purpose, ColumnPurpose::Filter);
                assert_eq!(columns, vec![DATE.to_owned(), CHECK.to_owned()]);
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn text_dates() {
        assert_eq!(parse_date_text("2024-06-10 13:45:00"), NaiveDate::from_ymd_opt(2024, 6, 10));
        assert_eq!(parse_date_text("2024.06.10"), NaiveDate::from_ymd_opt(2024, 6, 10));
        assert_eq!(parse_date_text("20240610"), NaiveDate::from_ymd_opt(2024, 6, 10));
        assert_eq!(parse_date_text("10/06/2024"), None);
    }
}
