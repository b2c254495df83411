use std::cell::Cell;

use request::Request;
use types::WindNotify;

/// Which wind-related parameters a request asked for.
///
/// When the parameter expansion substitutes vorticity and divergence for
/// a requested wind component, the notifier records it so the caller can
/// synthesise U/V from VO/D after the retrieval.
#[derive(Debug, Default)]
pub struct Winds {
	/// The request names the U wind component.
	pub want_u: bool,
	/// The request names the V wind component.
	pub want_v: bool,
	/// The request names vorticity.
	pub want_vo: bool,
	/// The request names divergence.
	pub want_d: bool,
	notified: Cell<usize>,
}

fn param_number(value: &str) -> u64 {
	let number = value.split('.').next().unwrap_or(value);
	number.parse().unwrap_or(0)
}

impl Winds {
	/// Inspects the `param` values of a request.
	pub fn from_request(request: &Request) -> Winds {
		let mut winds = Winds::default();
		for param in request.values("param") {
			match param_number(param) {
				131 => winds.want_u = true,
				132 => winds.want_v = true,
				138 => winds.want_vo = true,
				155 => winds.want_d = true,
				_ => {}
			}
		}
		winds
	}

	/// How many expansions substituted VO/D for a wind component.
	pub fn conversions(&self) -> usize {
		self.notified.get()
	}

	/// True when the caller has to reconstruct wind components.
	pub fn wanted(&self) -> bool {
		self.notified.get() > 0
	}
}

impl WindNotify for Winds {
	fn notify_winds(&self) {
		self.notified.set(self.notified.get() + 1);
	}
}

#[cfg(test)]
mod tests {
	use request::Request;
	use types::WindNotify;
	use super::Winds;

	#[test]
	fn test_from_request() {
		let request = Request::parse("param=131.128/138.128,step=0").unwrap();
		let winds = Winds::from_request(&request);
		assert!(winds.want_u);
		assert!(!winds.want_v);
		assert!(winds.want_vo);
		assert!(!winds.want_d);
		assert!(!winds.wanted());
	}

	#[test]
	fn test_notification_counts() {
		let winds = Winds::default();
		winds.notify_winds();
		assert!(winds.wanted());
		assert_eq!(winds.conversions(), 1);
	}
}
