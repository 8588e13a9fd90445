//! Prometheus style durations (`30s`, `1h30m`, `1w`) used by the timing
//! options of notification policies.
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::Error;

#[allow(clippy::expect_used)]
static DURATION_RE: Lazy<Regex> = Lazy::new(|| {
	Regex::new(r"^(?:(\d+)y)?(?:(\d+)w)?(?:(\d+)d)?(?:(\d+)h)?(?:(\d+)m)?(?:(\d+)s)?(?:(\d+)ms)?$")
		.expect("duration regex is valid")
});

/// milliseconds per unit, in the order the units appear in [DURATION_RE]
const UNIT_MILLIS: [u64; 7] = [
	365 * 24 * 60 * 60 * 1000,
	7 * 24 * 60 * 60 * 1000,
	24 * 60 * 60 * 1000,
	60 * 60 * 1000,
	60 * 1000,
	1000,
	1,
];

/// Parses a Prometheus duration. Units have to appear in descending order
/// and `0` is the only unit-less value accepted.
pub fn parse_duration(input: &str) -> Result<Duration, Error> {
	let invalid = || Error::InvalidDuration(input.to_owned());

	if input == "0" {
		return Ok(Duration::ZERO);
	}
	if input.is_empty() {
		return Err(invalid());
	}

	let captures = DURATION_RE.captures(input).ok_or_else(invalid)?;

	let mut millis: u64 = 0;
	for (index, unit) in UNIT_MILLIS.iter().enumerate() {
		if let Some(amount) = captures.get(index + 1) {
			let amount: u64 = amount.as_str().parse().map_err(|_| invalid())?;
			millis = amount
				.checked_mul(*unit)
				.and_then(|part| millis.checked_add(part))
				.ok_or_else(invalid)?;
		}
	}

	Ok(Duration::from_millis(millis))
}
