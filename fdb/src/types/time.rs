//! Time-of-day canonicalisation.

use error::{ErrorKind, Result};

fn bad(keyword: &str, value: &str, msg: &str) -> ::error::Error {
	ErrorKind::InvalidValue(keyword.into(), value.into(), msg.into()).into()
}

// accepts H, HH, HMM, HHMM and HH:MM[:SS]; seconds are validated and dropped
fn parse_time(keyword: &str, value: &str) -> Result<(u32, u32)> {
	if value.is_empty() {
		return Err(bad(keyword, value, "empty time"));
	}

	if value.contains(':') {
		let parts: Vec<&str> = value.split(':').collect();
		if parts.len() > 3 {
			return Err(bad(keyword, value, "too many components"));
		}
		let mut numbers = Vec::with_capacity(parts.len());
		for part in &parts {
			if part.is_empty() || part.len() > 2 || !part.chars().all(|c| c.is_digit(10)) {
				return Err(bad(keyword, value, "expected HH:MM[:SS]"));
			}
			numbers.push(part.parse::<u32>().expect("all digits; qed"));
		}

		let hours = numbers[0];
		let minutes = *numbers.get(1).unwrap_or(&0);
		let seconds = *numbers.get(2).unwrap_or(&0);

		if hours > 23 || minutes > 59 || seconds > 59 {
			return Err(bad(keyword, value, "component out of range"));
		}

		return Ok((hours, minutes));
	}

	if value.len() > 4 || !value.chars().all(|c| c.is_digit(10)) {
		return Err(bad(keyword, value, "expected HHMM"));
	}

	let n = value.parse::<u32>().expect("all digits; qed");
	let (hours, minutes) = if value.len() <= 2 { (n, 0) } else { (n / 100, n % 100) };

	if hours > 23 || minutes > 59 {
		return Err(bad(keyword, value, "component out of range"));
	}

	Ok((hours, minutes))
}

/// Canonical `HHMM` form of a time of day.
pub fn canonicalise_time(keyword: &str, value: &str) -> Result<String> {
	let (hours, minutes) = parse_time(keyword, value)?;
	Ok(format!("{:02}{:02}", hours, minutes))
}

#[cfg(test)]
mod tests {
	use super::canonicalise_time;

	#[test]
	fn test_valid_times() {
		assert_eq!(canonicalise_time("time", "0").unwrap(), "0000");
		assert_eq!(canonicalise_time("time", "00").unwrap(), "0000");
		assert_eq!(canonicalise_time("time", "6").unwrap(), "0600");
		assert_eq!(canonicalise_time("time", "12").unwrap(), "1200");
		assert_eq!(canonicalise_time("time", "123").unwrap(), "0123");
		assert_eq!(canonicalise_time("time", "1200").unwrap(), "1200");
		assert_eq!(canonicalise_time("time", "1:23").unwrap(), "0123");
		assert_eq!(canonicalise_time("time", "06:21").unwrap(), "0621");
		assert_eq!(canonicalise_time("time", "00:18:00").unwrap(), "0018");
		assert_eq!(canonicalise_time("time", "00:00:00").unwrap(), "0000");
	}

	#[test]
	fn test_invalid_times() {
		for bad in &["7700", "12:99", "12am", "12:aa", "01::23::45", ":01:23:45:", "01:23:45:67", ""] {
			assert!(canonicalise_time("time", bad).is_err(), "{} should be rejected", bad);
		}
	}
}
