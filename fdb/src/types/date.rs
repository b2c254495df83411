//! Date-derived value types.

use chrono::{Datelike, Duration, NaiveDate, Utc};

use error::{ErrorKind, Result};

static MONTHS: [&str; 12] = [
	"jan", "feb", "mar", "apr", "may", "jun",
	"jul", "aug", "sep", "oct", "nov", "dec",
];

fn bad(keyword: &str, value: &str, msg: &str) -> ::error::Error {
	ErrorKind::InvalidValue(keyword.into(), value.into(), msg.into()).into()
}

fn parse_date(keyword: &str, value: &str) -> Result<NaiveDate> {
	NaiveDate::parse_from_str(value, "%Y%m%d")
		.or_else(|_| NaiveDate::parse_from_str(value, "%Y-%m-%d"))
		.map_err(|_| bad(keyword, value, "expected a date"))
}

/// `YYYYMMDD`, `YYYY-MM-DD` or a relative day count (`0` today, `-1`
/// yesterday) to canonical `YYYYMMDD`.
pub fn canonicalise_date(keyword: &str, value: &str) -> Result<String> {
	if value.is_empty() {
		return Err(bad(keyword, value, "empty date"));
	}

	// relative dates start with '0' or '-' and resolve against today
	if value.starts_with('0') || value.starts_with('-') {
		if let Ok(n) = value.parse::<i64>() {
			if n <= 0 {
				let date = Utc::now().date_naive()
					.checked_add_signed(Duration::days(n))
					.ok_or_else(|| bad(keyword, value, "date out of range"))?;
				return Ok(date.format("%Y%m%d").to_string());
			}
		}
	}

	Ok(parse_date(keyword, value)?.format("%Y%m%d").to_string())
}

/// A year, either bare (`2021`) or the year of a full date.
pub fn canonicalise_year(keyword: &str, value: &str) -> Result<String> {
	if value.len() >= 6 {
		return Ok(parse_date(keyword, value)?.year().to_string());
	}
	value.parse::<i32>()
		.map(|y| y.to_string())
		.map_err(|_| bad(keyword, value, "expected a year"))
}

fn month_number(keyword: &str, value: &str) -> Result<u32> {
	if value.chars().next().map(|c| c.is_digit(10)).unwrap_or(false) {
		if let Ok(n) = value.parse::<u32>() {
			if n >= 1 && n <= 12 {
				return Ok(n);
			}
		}
		return Ok(parse_date(keyword, value)?.month());
	}

	let name = value.to_lowercase();
	for (i, month) in MONTHS.iter().enumerate() {
		if name == *month {
			return Ok(i as u32 + 1);
		}
	}

	Err(bad(keyword, value, "expected a month"))
}

/// A month, by number, name or full date, to its number.
pub fn canonicalise_month(keyword: &str, value: &str) -> Result<String> {
	Ok(month_number(keyword, value)?.to_string())
}

/// The month of a full date.
pub fn canonicalise_month_of_date(keyword: &str, value: &str) -> Result<String> {
	Ok(parse_date(keyword, value)?.month().to_string())
}

/// A climatology day: a full date or a `mon-dd` form, kept as given.
pub fn canonicalise_climate_daily(keyword: &str, value: &str) -> Result<String> {
	if value.chars().next().map(|c| c.is_digit(10)).unwrap_or(false) {
		return canonicalise_date(keyword, value);
	}
	let lower = value.to_lowercase();
	month_day(keyword, &lower)?;
	Ok(lower)
}

// month * 100 + day, the year-independent ordinal of a climatology day
fn month_day(keyword: &str, value: &str) -> Result<u32> {
	if value.chars().next().map(|c| c.is_digit(10)).unwrap_or(false) {
		if value.len() == 4 {
			// already in MMDD key form
			if let Ok(n) = value.parse::<u32>() {
				let (m, d) = (n / 100, n % 100);
				if m >= 1 && m <= 12 && d >= 1 && d <= 31 {
					return Ok(n);
				}
			}
		}
		let date = parse_date(keyword, value)?;
		return Ok(date.month() * 100 + date.day());
	}

	let mut parts = value.splitn(2, '-');
	let month = parts.next().unwrap_or("");
	let day = parts.next()
		.ok_or_else(|| bad(keyword, value, "expected a climatology day"))?;

	let m = month_number(keyword, month)?;
	let d: u32 = day.parse().map_err(|_| bad(keyword, value, "expected a day number"))?;
	if d < 1 || d > 31 {
		return Err(bad(keyword, value, "day out of range"));
	}

	Ok(m * 100 + d)
}

/// On-disk form of a climatology day: zero-padded `MMDD`.
pub fn climate_daily_key(value: &str) -> Result<String> {
	Ok(format!("{:04}", month_day("date", value)?))
}

/// Climatology days are equal when month and day agree, whatever the year.
pub fn climate_daily_match(v1: &str, v2: &str) -> bool {
	match (month_day("date", v1), month_day("date", v2)) {
		(Ok(a), Ok(b)) => a == b,
		_ => v1 == v2,
	}
}

/// On-disk form of a climatology month: the month number.
pub fn climate_monthly_key(value: &str) -> Result<String> {
	Ok(month_number("date", value)?.to_string())
}

/// Climatology months are equal when the month number agrees.
pub fn climate_monthly_match(v1: &str, v2: &str) -> bool {
	match (month_number("date", v1), month_number("date", v2)) {
		(Ok(a), Ok(b)) => a == b,
		_ => v1 == v2,
	}
}
