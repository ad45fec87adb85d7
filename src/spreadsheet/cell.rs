use crate::table::Value;
use chrono::Duration;
use chrono::NaiveDate;
use chrono::NaiveDateTime;

const MILLIS_PER_DAY: f64 = 86_400_000f64;

/// Storage kind of a worksheet cell, derived from its `t` attribute and style.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub(crate) enum CellType {
    #[default]
    Empty,
    /// Boolean values (`t="b"`)
    Boolean,
    /// Plain numeric values
    Number,
    /// Serial numbers with a date/time number format, 1900 date system
    SerialDate1900,
    /// Serial numbers with a date/time number format, 1904 date system
    SerialDate1904,
    /// ISO 8601 date/time strings (`t="d"`)
    IsoDateTime,
    /// Inline strings and cached formula strings
    InlineString,
    /// Shared string table references
    SharedString,
    /// Error values such as `#N/A`
    Error,
}

impl CellType {
    fn serial_date(is_1904: bool) -> Self {
        if is_1904 {
            Self::SerialDate1904
        } else {
            Self::SerialDate1900
        }
    }

    /// True when numeric cells with this style are calendar values.
    pub(crate) fn is_date(&self) -> bool {
        matches!(self, Self::SerialDate1900 | Self::SerialDate1904)
    }

    /// Maps the `t` attribute of a `<c>` element.
    pub(crate) fn from_type_attribute(kind: Option<&str>) -> Self {
        match kind {
            Some("inlineStr") | Some("str") => Self::InlineString,
            Some("s") => Self::SharedString,
            Some("d") => Self::IsoDateTime,
            Some("b") => Self::Boolean,
            Some("e") => Self::Error,
            _ => Self::Number,
        }
    }

    /// Built-in number format ids that render as dates or times.
    pub(crate) fn parse_builtin_number_format_id(id: &str, is_1904: bool) -> Option<Self> {
        match id {
            "14" | "15" | "16" | "17" | "18" | "19" | "20" | "21" | "22" | "45" | "46" | "47" => {
                Some(Self::serial_date(is_1904))
            }
            _ => None,
        }
    }

    /// Scans a custom format code for date/time tokens outside literals and brackets.
    pub(crate) fn parse_custom_number_format(format: &str, is_1904: bool) -> Self {
        let mut is_escaped = false;
        let mut is_literal = false;
        let mut is_bracket = false;
        let mut is_date = false;
        for character in format.chars() {
            match character {
                _ if is_escaped => is_escaped = false,
                '_' | '\\' => is_escaped = true,

                '"' => is_literal = !is_literal,
                _ if is_literal => (),

                '[' => is_bracket = true,
                ']' => is_bracket = false,
                _ if is_bracket => (),

                'Y' | 'y' | 'D' | 'd' | 'H' | 'h' | 'S' | 's' => is_date = true,
                _ => (),
            }
        }

        if is_date {
            Self::serial_date(is_1904)
        } else {
            Self::Number
        }
    }

    /// Decodes the raw `<v>`/`<is>` text of a cell into a typed value.
    ///
    /// # Arguments
    /// * `raw` - Text content of the cell
    /// * `shared_strings` - Shared string table of the workbook
    ///
    /// # Returns
    /// The typed value, or `Err` with the raw text when a number cannot be parsed
    pub(crate) fn decode(&self, raw: &str, shared_strings: &[String]) -> Result<Value, String> {
        let value = match self {
            _ if raw.is_empty() && *self != Self::InlineString => Value::Empty,
            Self::Empty | Self::Error => Value::Empty,
            Self::Boolean => Value::Bool(raw == "1" || raw.eq_ignore_ascii_case("true")),
            Self::InlineString => Value::Text(raw.to_owned()),
            Self::SharedString => {
                let index = raw.trim().parse::<usize>().map_err(|_| raw.to_owned())?;
                match shared_strings.get(index) {
                    Some(text) => Value::Text(text.to_owned()),
                    None => Err(raw.to_owned())?,
                }
            }
            Self::Number => Value::Number(parse_number(raw)?),
            Self::SerialDate1900 | Self::SerialDate1904 => {
                let serial = parse_number(raw)?;
                match serial_to_datetime(serial, *self == Self::SerialDate1904) {
                    Some(datetime) => Value::DateTime(datetime),
                    None => Value::Number(serial),
                }
            }
            Self::IsoDateTime => parse_iso_datetime(raw)
                .map(Value::DateTime)
                .unwrap_or_else(|| Value::Text(raw.to_owned())),
        };
        Ok(value)
    }
}

fn parse_number(raw: &str) -> Result<f64, String> {
    raw.trim().parse::<f64>().map_err(|_| raw.to_owned())
}

fn parse_iso_datetime(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

fn epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1899, 12, 30)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .expect("NaiveDate Literal")
}

/// Converts an Excel serial number to a date/time.
/// Serials below 60 in the 1900 system are shifted by one day (Lotus 1-2-3 leap year bug).
/// The time of day is rounded to whole milliseconds.
pub(crate) fn serial_to_datetime(serial: f64, is_1904: bool) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 || serial > 2_958_465.0 {
        return None;
    }
    let days = serial.trunc() as i64;
    let offset = if is_1904 {
        1_462
    } else if days < 60 {
        1
    } else {
        0
    };
    let millis = (serial.fract() * MILLIS_PER_DAY).round() as i64;
    epoch()
        .checked_add_signed(Duration::days(days + offset))?
        .checked_add_signed(Duration::milliseconds(millis))
}

/// Converts a date/time to an Excel serial number, inverse of [`serial_to_datetime`].
pub(crate) fn datetime_to_serial(datetime: NaiveDateTime, is_1904: bool) -> f64 {
    let elapsed = datetime - epoch();
    let days = elapsed.num_days();
    let fraction = (elapsed - Duration::days(days)).num_milliseconds() as f64 / MILLIS_PER_DAY;
    let serial_days = if is_1904 {
        days - 1_462
    } else if days < 61 {
        days - 1
    } else {
        days
    };
    serial_days as f64 + fraction
}
