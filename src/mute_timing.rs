//! Mute timings: named schedules during which notifications of the policies
//! referencing them are suppressed.
//!
//! Every axis of a [TimeInterval] (time of day, weekday, day of month, month,
//! year) is optional and an absent axis doesn't restrict anything. Ranges use
//! Alertmanager's `start:end` encoding, e.g. `monday:friday` or `1:7`.

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Timelike};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use crate::error::Error;

const WEEKDAYS: [&str; 7] = ["monday", "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday"];

const MONTHS: [&str; 12] = [
	"january",
	"february",
	"march",
	"april",
	"may",
	"june",
	"july",
	"august",
	"september",
	"october",
	"november",
	"december",
];

/// minutes since midnight of `24:00`
const END_OF_DAY: u32 = 24 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
	/// `HH:MM`, inclusive
	pub start_time: String,
	/// `HH:MM`, exclusive. `24:00` is the end of the day
	pub end_time: String,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeInterval {
	pub times: Option<Vec<TimeRange>>,
	pub weekdays: Option<Vec<String>>,
	pub days_of_month: Option<Vec<String>>,
	pub months: Option<Vec<String>>,
	pub years: Option<Vec<String>>,
	/// IANA time zone name the interval was written for
	pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MuteTiming {
	pub name: String,
	#[serde(default)]
	pub time_intervals: Vec<TimeInterval>,
}

impl MuteTiming {
	/// Checks every interval for malformed times and ranges.
	pub fn validate(&self) -> Result<(), Error> {
		for interval in &self.time_intervals {
			interval
				.validate()
				.map_err(|reason| Error::InvalidTimeInterval { timing: self.name.clone(), reason })?;
		}
		Ok(())
	}

	/// True if any of the intervals covers `at`. Intervals are evaluated in
	/// the time zone of `at`.
	pub fn is_active_at<Tz: TimeZone>(&self, at: &DateTime<Tz>) -> bool {
		self.time_intervals.iter().any(|interval| interval.contains(at))
	}
}

/// Renders a mute timing as a short human readable summary, e.g.
/// `Mon-Fri 09:00-17:00`. Intervals are separated by `; `.
pub fn render_time_intervals(timing: &MuteTiming) -> String {
	timing
		.time_intervals
		.iter()
		.map(TimeInterval::render)
		.filter(|rendered| !rendered.is_empty())
		.collect::<Vec<_>>()
		.join("; ")
}

impl TimeInterval {
	/// Renders the interval's restrictions in the order weekdays, times,
	/// days of month, months, years, location. Absent axes are left out.
	pub fn render(&self) -> String {
		let mut parts = Vec::new();

		if let Some(weekdays) = non_empty(&self.weekdays) {
			parts.push(render_list(weekdays, render_weekday));
		}
		if let Some(times) = non_empty(&self.times) {
			let times: Vec<_> =
				times.iter().map(|range| format!("{}-{}", range.start_time, range.end_time)).collect();
			parts.push(times.join(", "));
		}
		if let Some(days) = non_empty(&self.days_of_month) {
			parts.push(format!("days {}", render_list(days, str::to_owned)));
		}
		if let Some(months) = non_empty(&self.months) {
			parts.push(render_list(months, render_month));
		}
		if let Some(years) = non_empty(&self.years) {
			parts.push(render_list(years, str::to_owned));
		}
		if let Some(location) = self.location.as_deref().filter(|location| !location.is_empty()) {
			parts.push(format!("({location})"));
		}

		parts.join(" ")
	}

	/// true if every present axis covers `at`
	pub fn contains<Tz: TimeZone>(&self, at: &DateTime<Tz>) -> bool {
		let minute = at.hour() * 60 + at.minute();
		let weekday = at.weekday().num_days_from_monday();
		let day = at.day();
		let month_length = days_in_month(at.year(), at.month());

		let in_times = non_empty(&self.times).map_or(true, |times| {
			times.iter().any(|range| {
				matches!(
					(parse_clock(&range.start_time), parse_clock(&range.end_time)),
					(Some(start), Some(end)) if start <= minute && minute < end
				)
			})
		});

		let in_weekdays = covers(&self.weekdays, weekday, |entry| parse_range(entry, weekday_index));
		let in_days = covers(&self.days_of_month, day, |entry| day_range(entry, month_length));
		let in_months = covers(&self.months, at.month(), |entry| parse_range(entry, month_number));
		let in_years = covers(&self.years, at.year(), |entry| parse_range(entry, parse_year));

		in_times && in_weekdays && in_days && in_months && in_years
	}

	fn validate(&self) -> Result<(), String> {
		for range in self.times.iter().flatten() {
			let start = parse_clock(&range.start_time)
				.filter(|start| *start < END_OF_DAY)
				.ok_or_else(|| format!("invalid start time {:?}", range.start_time))?;
			let end = parse_clock(&range.end_time)
				.ok_or_else(|| format!("invalid end time {:?}", range.end_time))?;

			if start >= end {
				return Err(format!(
					"start time {} is not before end time {}",
					range.start_time, range.end_time
				));
			}
		}

		for entry in self.weekdays.iter().flatten() {
			parse_range(entry, weekday_index).ok_or_else(|| format!("invalid weekday range {entry:?}"))?;
		}
		for entry in self.days_of_month.iter().flatten() {
			let (start, end) = split_range(entry);
			match (parse_day(start), parse_day(end)) {
				// a negative start with a positive end is empty in every month
				(Some(start), Some(end)) if (start > 0 && end < 0) || (start.signum() == end.signum() && start <= end) => {}
				_ => return Err(format!("invalid day of month range {entry:?}")),
			}
		}
		for entry in self.months.iter().flatten() {
			parse_range(entry, month_number).ok_or_else(|| format!("invalid month range {entry:?}"))?;
		}
		for entry in self.years.iter().flatten() {
			parse_range(entry, parse_year).ok_or_else(|| format!("invalid year range {entry:?}"))?;
		}

		Ok(())
	}
}

fn non_empty<T>(entries: &Option<Vec<T>>) -> Option<&[T]> {
	entries.as_deref().filter(|entries| !entries.is_empty())
}

/// true if the axis is absent or one of its ranges contains `value`.
/// malformed ranges contain nothing
fn covers<T: PartialOrd + Copy>(
	entries: &Option<Vec<String>>,
	value: T,
	range: impl Fn(&str) -> Option<(T, T)>,
) -> bool {
	non_empty(entries).map_or(true, |entries| {
		entries.iter().any(|entry| range(entry).map_or(false, |(start, end)| start <= value && value <= end))
	})
}

/// splits `start:end`. a single value is a range of one
fn split_range(entry: &str) -> (&str, &str) {
	match entry.split_once(':') {
		Some((start, end)) => (start.trim(), end.trim()),
		None => (entry.trim(), entry.trim()),
	}
}

/// parses both ends of a range, which has to be ascending
fn parse_range<T: PartialOrd + Copy>(entry: &str, parse: impl Fn(&str) -> Option<T>) -> Option<(T, T)> {
	let (start, end) = split_range(entry);
	let (start, end) = (parse(start)?, parse(end)?);
	(start <= end).then(|| (start, end))
}

fn render_list(entries: &[String], render: impl Fn(&str) -> String) -> String {
	entries
		.iter()
		.map(|entry| match entry.split_once(':') {
			Some((start, end)) => format!("{}-{}", render(start.trim()), render(end.trim())),
			None => render(entry.trim()),
		})
		.collect::<Vec<_>>()
		.join(", ")
}

/// `monday` -> `Mon`
fn abbreviate(name: &str) -> String {
	format!("{}{}", name[..1].to_uppercase(), &name[1..3])
}

fn render_weekday(value: &str) -> String {
	weekday_index(value).map_or_else(|| value.to_owned(), |index| abbreviate(WEEKDAYS[index as usize]))
}

fn render_month(value: &str) -> String {
	month_number(value).map_or_else(|| value.to_owned(), |month| abbreviate(MONTHS[month as usize - 1]))
}

/// days since monday
fn weekday_index(value: &str) -> Option<u32> {
	let value = value.to_lowercase();
	WEEKDAYS.iter().position(|weekday| *weekday == value).map(|index| index as u32)
}

/// 1 based month, from a number or a month name
fn month_number(value: &str) -> Option<u32> {
	if let Ok(number) = value.parse::<u32>() {
		return (1..=12).contains(&number).then(|| number);
	}
	let value = value.to_lowercase();
	MONTHS.iter().position(|month| *month == value).map(|index| index as u32 + 1)
}

fn parse_year(value: &str) -> Option<i32> {
	value.parse::<i32>().ok().filter(|year| *year > 0)
}

/// day of month, negative days count from the end of the month
fn parse_day(value: &str) -> Option<i32> {
	value.parse::<i32>().ok().filter(|day| (1..=31).contains(day) || (-31..=-1).contains(day))
}

/// a day of month range resolved against a month of `month_length` days
fn day_range(entry: &str, month_length: u32) -> Option<(u32, u32)> {
	let resolve = |day: i32| -> u32 {
		let day = if day < 0 { month_length as i32 + 1 + day } else { day };
		day.clamp(1, month_length as i32) as u32
	};

	let (start, end) = split_range(entry);
	let (start, end) = (resolve(parse_day(start)?), resolve(parse_day(end)?));
	(start <= end).then(|| (start, end))
}

/// `HH:MM` as minutes since midnight, `24:00` included
fn parse_clock(value: &str) -> Option<u32> {
	let (hours, minutes) = value.split_once(':')?;
	if hours.len() != 2 || minutes.len() != 2 {
		return None;
	}

	let (hours, minutes) = (hours.parse::<u32>().ok()?, minutes.parse::<u32>().ok()?);
	let clock = hours * 60 + minutes;

	(minutes < 60 && clock <= END_OF_DAY).then(|| clock)
}

fn days_in_month(year: i32, month: u32) -> u32 {
	let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };

	NaiveDate::from_ymd_opt(next_year, next_month, 1)
		.and_then(|first| first.pred_opt())
		.map_or(31, |last| last.day())
}
