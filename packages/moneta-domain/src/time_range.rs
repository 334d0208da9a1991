use time::{Duration, OffsetDateTime, Time, macros::time};

/// Inclusive time window resolved from a question's relative-time phrase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
	pub start: OffsetDateTime,
	pub end: OffsetDateTime,
}

const END_OF_DAY: Time = time!(23:59:59);

// Ordered: earlier phrases win, and the month/week phrases must be checked
// before their "today"/"yesterday" substrings could ever shadow them.
const RANGE_PHRASES: [&str; 6] =
	["last month", "this month", "last week", "this week", "yesterday", "today"];

// Superset of RANGE_PHRASES used for the recency fallback.
const TIME_KEYWORDS: [&str; 8] = [
	"last month",
	"this month",
	"yesterday",
	"today",
	"last week",
	"this week",
	"recent",
	"lately",
];

/// Maps a question to an explicit date range, if it names one.
///
/// Pure substring matching, no tokenization; `now` is always injected so the
/// resolver stays deterministic.
pub fn resolve(question: &str, now: OffsetDateTime) -> Option<DateRange> {
	let q = question.to_lowercase();

	RANGE_PHRASES.iter().find(|phrase| q.contains(*phrase)).and_then(|phrase| range_for(phrase, now))
}

/// True when the question carries any broad time keyword, including the
/// generic "recent"/"lately" that map to no exact range.
pub fn mentions_time(question: &str) -> bool {
	let q = question.to_lowercase();

	TIME_KEYWORDS.iter().any(|keyword| q.contains(keyword))
}

fn range_for(phrase: &str, now: OffsetDateTime) -> Option<DateRange> {
	match phrase {
		"last month" => {
			let first_of_this = now.date().replace_day(1).ok()?;
			let last_of_prev = first_of_this.previous_day()?;
			let first_of_prev = last_of_prev.replace_day(1).ok()?;

			Some(DateRange {
				start: first_of_prev.with_time(Time::MIDNIGHT).assume_offset(now.offset()),
				end: last_of_prev.with_time(END_OF_DAY).assume_offset(now.offset()),
			})
		},
		"this month" => {
			let first = now.date().replace_day(1).ok()?;
			let last = first.replace_day(now.month().length(now.year())).ok()?;

			Some(DateRange {
				start: first.with_time(Time::MIDNIGHT).assume_offset(now.offset()),
				end: last.with_time(END_OF_DAY).assume_offset(now.offset()),
			})
		},
		// The week windows end at `now` itself, not at an end-of-day boundary.
		"last week" => Some(DateRange {
			start: (now - Duration::days(7)).replace_time(Time::MIDNIGHT),
			end: now,
		}),
		"this week" => {
			let since_sunday = i64::from(now.date().weekday().number_days_from_sunday());

			Some(DateRange {
				start: (now - Duration::days(since_sunday)).replace_time(Time::MIDNIGHT),
				end: now,
			})
		},
		"yesterday" => {
			let yesterday = now - Duration::days(1);

			Some(DateRange {
				start: yesterday.replace_time(Time::MIDNIGHT),
				end: yesterday.replace_time(END_OF_DAY),
			})
		},
		"today" => Some(DateRange { start: now.replace_time(Time::MIDNIGHT), end: now }),
		_ => None,
	}
}
