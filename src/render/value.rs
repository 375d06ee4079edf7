//! Cell-value to text conversion, including date-serial rendering.

use crate::model::{CellData, CellValue, DateEpoch};
use crate::shared_strings::SharedStrings;
use crate::styles::StylesRegistry;

/// Days between 1899-12-31 (serial day 0 of the 1900 system) and 1970-01-01.
const DAYS_TO_UNIX_EPOCH: i64 = 25_568;

/// Offset added to 1904-system serials to express them in 1900-system days.
const EPOCH_1904_OFFSET: f64 = 1462.0;

/// Render a cell to its output text.
///
/// Shared-string indices resolve against the pool here; unknown indices
/// degrade to an empty field. Numeric cells consult the styles registry to
/// decide between number and calendar rendering.
pub(crate) fn render_value(
    cell: &CellData,
    shared: &SharedStrings,
    styles: &StylesRegistry,
    epoch: DateEpoch,
) -> String {
    match &cell.value {
        CellValue::Empty => String::new(),
        CellValue::Boolean(true) => "TRUE".to_string(),
        CellValue::Boolean(false) => "FALSE".to_string(),
        CellValue::Error(code) => {
            if code.is_empty() {
                "#N/A".to_string()
            } else {
                code.clone()
            }
        }
        CellValue::InlineString(text) | CellValue::String(text) => text.clone(),
        CellValue::SharedString(index) => shared
            .try_get(*index as usize)
            .map(|s| s.into_owned())
            .unwrap_or_default(),
        CellValue::Number(value) => {
            if styles.is_date_time_style(cell.style_index) {
                serial_to_text(*value, epoch)
            } else {
                format_number(*value)
            }
        }
    }
}

/// Render a plain number.
pub(crate) fn format_number(value: f64) -> String {
    if value.is_nan() {
        return "#NUM!".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 {
            "#DIV/0!".to_string()
        } else {
            "-#DIV/0!".to_string()
        };
    }

    if value == value.floor() && value.abs() < 1e15 {
        return format!("{}", value as i64);
    }

    let mut text = format!("{:.6}", value);
    while text.ends_with('0') {
        text.pop();
    }
    if text.ends_with('.') {
        text.pop();
    }
    text
}

/// Render a date serial as an ISO-8601 calendar value.
///
/// The integer part counts days since the epoch, the fractional part the
/// time of day. Serial 60 of the 1900 system is the phantom 1900-02-29;
/// serials at or past it shift back one day.
pub(crate) fn serial_to_text(serial: f64, epoch: DateEpoch) -> String {
    if serial <= 0.0 {
        return "1900-01-01".to_string();
    }

    let mut adjusted = serial;
    if epoch == DateEpoch::Epoch1904 {
        adjusted += EPOCH_1904_OFFSET;
    }
    if epoch == DateEpoch::Epoch1900 && serial >= 60.0 {
        adjusted -= 1.0;
    }

    let days = adjusted.floor() as i64 - DAYS_TO_UNIX_EPOCH;
    let (year, month, day) = civil_from_days(days);

    let fraction = adjusted.fract();
    let hours_fraction = fraction * 24.0;
    let hours = hours_fraction as u32;
    let minutes_fraction = (hours_fraction - f64::from(hours)) * 60.0;
    let minutes = minutes_fraction as u32;
    let seconds = ((minutes_fraction - f64::from(minutes)) * 60.0) as u32;

    let has_time = fraction > 0.001;
    let has_date = fraction < 0.999;

    if has_date && has_time {
        format!(
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}",
            year, month, day, hours, minutes, seconds
        )
    } else if has_time {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:04}-{:02}-{:02}", year, month, day)
    }
}

/// Proleptic-Gregorian date from a day count relative to 1970-01-01.
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let day_of_era = (z - era * 146_097) as u64;
    let year_of_era =
        (day_of_era - day_of_era / 1460 + day_of_era / 36_524 - day_of_era / 146_096) / 365;
    let year = year_of_era as i64 + era * 400;
    let day_of_year = day_of_era - (365 * year_of_era + year_of_era / 4 - year_of_era / 100);
    let mp = (5 * day_of_year + 2) / 153;
    let day = (day_of_year - (153 * mp + 2) / 5 + 1) as u32;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;

    (if month <= 2 { year + 1 } else { year }, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CellCoordinate;

    #[test]
    fn test_format_number_integers() {
        assert_eq!(format_number(42.0), "42");
        assert_eq!(format_number(-17.0), "-17");
        assert_eq!(format_number(0.0), "0");
        assert_eq!(format_number(999_999_999_999_999.0), "999999999999999");
    }

    #[test]
    fn test_format_number_decimals() {
        assert_eq!(format_number(3.14), "3.14");
        assert_eq!(format_number(2.5), "2.5");
        assert_eq!(format_number(0.333_333_333), "0.333333");
        assert_eq!(format_number(-1.230_000_1), "-1.23");
    }

    #[test]
    fn test_format_number_specials() {
        assert_eq!(format_number(f64::NAN), "#NUM!");
        assert_eq!(format_number(f64::INFINITY), "#DIV/0!");
        assert_eq!(format_number(f64::NEG_INFINITY), "-#DIV/0!");
    }

    #[test]
    fn test_serial_epoch_start() {
        assert_eq!(serial_to_text(1.0, DateEpoch::Epoch1900), "1900-01-01");
        assert_eq!(serial_to_text(2.0, DateEpoch::Epoch1900), "1900-01-02");
        assert_eq!(serial_to_text(0.0, DateEpoch::Epoch1900), "1900-01-01");
        assert_eq!(serial_to_text(-5.0, DateEpoch::Epoch1900), "1900-01-01");
    }

    #[test]
    fn test_serial_phantom_leap_day() {
        assert_eq!(serial_to_text(59.0, DateEpoch::Epoch1900), "1900-02-28");
        // serial 60 is the phantom 1900-02-29, squashed onto the 28th
        assert_eq!(serial_to_text(60.0, DateEpoch::Epoch1900), "1900-02-28");
        assert_eq!(serial_to_text(61.0, DateEpoch::Epoch1900), "1900-03-01");
    }

    #[test]
    fn test_serial_modern_dates() {
        assert_eq!(serial_to_text(44_927.0, DateEpoch::Epoch1900), "2023-01-01");
        assert_eq!(serial_to_text(44_197.0, DateEpoch::Epoch1900), "2021-01-01");
        assert_eq!(serial_to_text(25_569.0, DateEpoch::Epoch1900), "1970-01-01");
    }

    #[test]
    fn test_serial_with_time() {
        assert_eq!(
            serial_to_text(44_197.5, DateEpoch::Epoch1900),
            "2021-01-01T12:00:00"
        );
        assert_eq!(
            serial_to_text(44_197.25, DateEpoch::Epoch1900),
            "2021-01-01T06:00:00"
        );
    }

    #[test]
    fn test_serial_epoch_1904() {
        assert_eq!(serial_to_text(1.0, DateEpoch::Epoch1904), "1904-01-02");
        // 1904 serials do not carry the phantom-day correction
        assert_eq!(serial_to_text(60.0, DateEpoch::Epoch1904), "1904-03-01");
    }

    #[test]
    fn test_render_value_variants() {
        let shared = SharedStrings::default();
        let styles = StylesRegistry::default();

        let cell = |value| CellData {
            coordinate: CellCoordinate::new(1, 1),
            value,
            style_index: 0,
        };
        let render =
            |value| render_value(&cell(value), &shared, &styles, DateEpoch::Epoch1900);

        assert_eq!(render(CellValue::Empty), "");
        assert_eq!(render(CellValue::Boolean(true)), "TRUE");
        assert_eq!(render(CellValue::Boolean(false)), "FALSE");
        assert_eq!(render(CellValue::Error("#REF!".to_string())), "#REF!");
        assert_eq!(render(CellValue::Error(String::new())), "#N/A");
        assert_eq!(render(CellValue::String("result".to_string())), "result");
        assert_eq!(render(CellValue::InlineString("inline".to_string())), "inline");
        assert_eq!(render(CellValue::Number(7.0)), "7");
        // out-of-range shared string resolves to an empty field
        assert_eq!(render(CellValue::SharedString(3)), "");
    }
}
