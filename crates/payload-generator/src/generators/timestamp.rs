//! Date, time and timestamp generators.
//!
//! Missing bounds default to a window of one month either side of now for
//! timestamps and dates, and to the whole day for times.

use crate::error::GenerateError;
use chrono::{DateTime, Duration, Months, NaiveDate, NaiveTime, Utc};
use rand::Rng;
use std::fmt::{Display, Write};

/// Generate a timestamp in `[from, to]` with millisecond resolution.
pub fn generate_datetime<R: Rng + ?Sized>(
    rng: &mut R,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
    format: &str,
) -> Result<String, GenerateError> {
    let now = Utc::now();
    let start = from.unwrap_or_else(|| now.checked_sub_months(Months::new(1)).unwrap_or(now));
    let end = to.unwrap_or_else(|| now.checked_add_months(Months::new(1)).unwrap_or(now));
    let (start, end) = ordered(start, end);

    let span = (end - start).num_milliseconds();
    let value = start + Duration::milliseconds(offset(rng, span));
    render(value.format(format), format)
}

/// Generate a calendar date in `[from, to]`.
pub fn generate_date<R: Rng + ?Sized>(
    rng: &mut R,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    format: &str,
) -> Result<String, GenerateError> {
    let today = Utc::now().date_naive();
    let start = from.unwrap_or_else(|| today.checked_sub_months(Months::new(1)).unwrap_or(today));
    let end = to.unwrap_or_else(|| today.checked_add_months(Months::new(1)).unwrap_or(today));
    let (start, end) = ordered(start, end);

    let span = (end - start).num_days();
    let value = start + Duration::days(offset(rng, span));
    render(value.format(format), format)
}

/// Generate a time of day in `[from, to]` with millisecond resolution.
pub fn generate_time<R: Rng + ?Sized>(
    rng: &mut R,
    from: Option<NaiveTime>,
    to: Option<NaiveTime>,
    format: &str,
) -> Result<String, GenerateError> {
    let start = from.unwrap_or(NaiveTime::MIN);
    let end = to.unwrap_or_else(|| {
        NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN)
    });
    let (start, end) = ordered(start, end);

    let span = (end - start).num_milliseconds();
    let (value, _) = start.overflowing_add_signed(Duration::milliseconds(offset(rng, span)));
    render(value.format(format), format)
}

fn ordered<T: PartialOrd>(a: T, b: T) -> (T, T) {
    if b < a {
        (b, a)
    } else {
        (a, b)
    }
}

/// Uniform offset in `[0, span]`.
fn offset<R: Rng + ?Sized>(rng: &mut R, span: i64) -> i64 {
    if span <= 0 {
        0
    } else {
        rng.gen_range(0..=span)
    }
}

/// Write a delayed chrono format into a string. An invalid format string
/// surfaces as a `fmt::Error`, which is reported instead of panicking.
fn render(value: impl Display, format: &str) -> Result<String, GenerateError> {
    let mut out = String::new();
    write!(out, "{value}").map_err(|_| GenerateError::InvalidFormat(format.to_string()))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_generate_datetime_in_range() {
        let mut rng = StdRng::seed_from_u64(42);
        let from = DateTime::parse_from_rfc3339("2020-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let to = DateTime::parse_from_rfc3339("2024-12-31T23:59:59Z")
            .unwrap()
            .with_timezone(&Utc);

        for _ in 0..50 {
            let value = generate_datetime(&mut rng, Some(from), Some(to), "%Y").unwrap();
            let year: i32 = value.parse().unwrap();
            assert!((2020..=2024).contains(&year));
        }
    }

    #[test]
    fn test_generate_datetime_default_format() {
        let mut rng = StdRng::seed_from_u64(42);
        let value = generate_datetime(&mut rng, None, None, "%Y-%m-%dT%H:%M:%S%.3fZ").unwrap();

        assert!(value.ends_with('Z'));
        assert_eq!(value.len(), "2024-01-01T00:00:00.000Z".len());
    }

    #[test]
    fn test_generate_date_swapped_bounds() {
        let mut rng = StdRng::seed_from_u64(42);
        let early = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let late = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();

        for _ in 0..30 {
            let value = generate_date(&mut rng, Some(late), Some(early), "%Y-%m-%d").unwrap();
            let parsed = NaiveDate::parse_from_str(&value, "%Y-%m-%d").unwrap();
            assert!(parsed >= early && parsed <= late);
        }
    }

    #[test]
    fn test_generate_date_single_day() {
        let mut rng = StdRng::seed_from_u64(1);
        let day = NaiveDate::from_ymd_opt(2023, 6, 15).unwrap();

        let value = generate_date(&mut rng, Some(day), Some(day), "%d/%m/%Y").unwrap();
        assert_eq!(value, "15/06/2023");
    }

    #[test]
    fn test_generate_time_in_range() {
        let mut rng = StdRng::seed_from_u64(42);
        let from = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        let to = NaiveTime::from_hms_opt(10, 0, 0).unwrap();

        for _ in 0..50 {
            let value = generate_time(&mut rng, Some(from), Some(to), "%H:%M:%S").unwrap();
            let parsed = NaiveTime::parse_from_str(&value, "%H:%M:%S").unwrap();
            assert!(parsed >= from && parsed <= to);
        }
    }

    #[test]
    fn test_invalid_format_is_error() {
        let mut rng = StdRng::seed_from_u64(42);
        let result = generate_time(&mut rng, None, None, "%H:%");

        assert!(matches!(result, Err(GenerateError::InvalidFormat(_))));
    }
}
