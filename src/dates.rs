use time::macros::format_description;
use time::{Date, Month, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};

/// Parses a business date the way reps type them: `M/D`, `M/D/YY`, or
/// `YYYY-MM-DD`. `M/D` assumes the current year.
pub fn parse_business_date(raw: &str, today: Date) -> Option<Date> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if raw.contains('-') {
        let format = format_description!("[year]-[month]-[day]");
        return Date::parse(raw, format).ok();
    }
    let parts: Vec<&str> = raw.split('/').collect();
    match parts.as_slice() {
        [month, day] => calendar_date(today.year(), month, day),
        [month, day, year] => {
            let year: i32 = year.parse().ok()?;
            let year = if year < 100 { 2000 + year } else { year };
            calendar_date(year, month, day)
        }
        _ => None,
    }
}

fn calendar_date(year: i32, month: &str, day: &str) -> Option<Date> {
    let month: u8 = month.parse().ok()?;
    let day: u8 = day.parse().ok()?;
    Date::from_calendar_date(year, Month::try_from(month).ok()?, day).ok()
}

/// Unix seconds of local midnight on `date` in the given offset.
pub fn midnight_ts(date: Date, offset: UtcOffset) -> i64 {
    PrimitiveDateTime::new(date, Time::MIDNIGHT)
        .assume_offset(offset)
        .unix_timestamp()
}

pub fn local_today(offset: UtcOffset) -> Date {
    OffsetDateTime::now_utc().to_offset(offset).date()
}

/// Display form used in listings and CSV cells.
pub fn format_ts(ts: i64, offset: UtcOffset) -> String {
    let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    OffsetDateTime::from_unix_timestamp(ts)
        .map(|dt| dt.to_offset(offset))
        .ok()
        .and_then(|dt| dt.format(format).ok())
        .unwrap_or_else(|| ts.to_string())
}
