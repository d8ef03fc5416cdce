//! Resolves the date phrases collected from the chat ("this weekend",
//! "next Friday 9am-5pm", "June 20th") into a concrete `DateRange`.
//!
//! Anything that cannot be pinned to a calendar day is rejected rather than
//! guessed.

use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Weekday};

use crate::models::booking::end_of_day;
use crate::models::DateRange;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DateError {
    #[error("no date was given")]
    Missing,

    #[error("\"{0}\" does not name a specific date")]
    Ambiguous(String),

    #[error("end {end} is not after start {start}")]
    EndBeforeStart { start: String, end: String },
}

/// Words that make a phrase too vague to book against.
const VAGUE_WORDS: &[&str] = &[
    "or", "sometime", "soon", "later", "maybe", "few", "couple", "week", "weeks", "month",
    "months", "days", "asap",
];

pub fn resolve_dates(
    start_phrase: Option<&str>,
    end_phrase: Option<&str>,
    today: NaiveDate,
) -> Result<DateRange, DateError> {
    let start_phrase = start_phrase
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(DateError::Missing)?;

    let start = scan(start_phrase, today, None)?;
    let first_day = start
        .days
        .first()
        .copied()
        .ok_or_else(|| DateError::Ambiguous(start_phrase.to_string()))?;

    let end = match end_phrase.map(str::trim).filter(|s| !s.is_empty()) {
        Some(phrase) => {
            let anchor = start.days.last().map(|d| d.start);
            let scanned = scan(phrase, today, anchor)?;
            if scanned.days.is_empty() && scanned.times.is_empty() {
                return Err(DateError::Ambiguous(phrase.to_string()));
            }
            Some(scanned)
        }
        None => None,
    };

    let last_start_day = start.days.last().copied().unwrap_or(first_day);
    let start_time = start.times.first().copied().unwrap_or(NaiveTime::MIN);
    let trailing_start_time = (start.times.len() >= 2).then(|| start.times[start.times.len() - 1]);

    let (end_date, end_time) = match &end {
        Some(e) => (
            e.days.last().copied().unwrap_or(last_start_day).end,
            e.times.last().copied().or(trailing_start_time),
        ),
        None => (last_start_day.end, trailing_start_time),
    };

    // "to midnight" means the end of that day.
    let end_time = match end_time {
        Some(t) if t != NaiveTime::MIN => t,
        _ => end_of_day(),
    };

    let range = DateRange {
        start_date: first_day.start,
        end_date,
        start_time,
        end_time,
    };

    if range.end() <= range.start() {
        return Err(DateError::EndBeforeStart {
            start: range.start().format("%Y-%m-%d %H:%M").to_string(),
            end: range.end().format("%Y-%m-%d %H:%M").to_string(),
        });
    }

    Ok(range)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DaySpan {
    start: NaiveDate,
    end: NaiveDate,
}

impl DaySpan {
    fn single(day: NaiveDate) -> Self {
        Self { start: day, end: day }
    }
}

#[derive(Debug, Default)]
struct Scan {
    days: Vec<DaySpan>,
    times: Vec<NaiveTime>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Modifier {
    This,
    Next,
}

/// `anchor` is the day a follow-on phrase continues from; plain weekdays
/// after it resolve on or after it.
fn scan(phrase: &str, today: NaiveDate, anchor: Option<NaiveDate>) -> Result<Scan, DateError> {
    let tokens = tokenize(phrase);
    let ambiguous = || DateError::Ambiguous(phrase.to_string());

    let mut out = Scan::default();
    let mut modifier: Option<Modifier> = None;
    let mut i = 0;

    while i < tokens.len() {
        let tok = tokens[i].as_str();
        let next = tokens.get(i + 1).map(String::as_str);

        match tok {
            "this" | "coming" => {
                modifier = Some(Modifier::This);
                i += 1;
                continue;
            }
            "next" => {
                modifier = Some(Modifier::Next);
                i += 1;
                continue;
            }
            _ => {}
        }

        if VAGUE_WORDS.contains(&tok) {
            return Err(ambiguous());
        }

        let mut consumed = 1;
        if tok == "today" || tok == "tonight" {
            out.days.push(DaySpan::single(today));
        } else if tok == "tomorrow" {
            out.days
                .push(DaySpan::single(add_days(today, 1).ok_or_else(ambiguous)?));
        } else if tok == "weekend" || tok == "weekends" {
            out.days.push(weekend(today, modifier).ok_or_else(ambiguous)?);
        } else if let Some(weekday) = parse_weekday(tok) {
            let base = out.days.last().map(|d| d.start).or(anchor);
            let day = match (modifier, base) {
                (None, Some(base)) => add_days(base, days_ahead(base, weekday)),
                (Some(Modifier::Next), _) => {
                    let ahead = days_ahead(today, weekday);
                    add_days(today, if ahead == 0 { 7 } else { ahead })
                }
                _ => add_days(today, days_ahead(today, weekday)),
            };
            out.days.push(DaySpan::single(day.ok_or_else(ambiguous)?));
        } else if let Some(month) = parse_month(tok) {
            if let Some(day) = next.and_then(parse_day_number) {
                out.days.push(DaySpan::single(
                    calendar_day(today, month, day).ok_or_else(ambiguous)?,
                ));
                consumed = 2;
            }
        } else if let (Some(day), Some(month)) =
            (parse_day_number(tok), next.and_then(parse_month))
        {
            out.days.push(DaySpan::single(
                calendar_day(today, month, day).ok_or_else(ambiguous)?,
            ));
            consumed = 2;
        } else if let Ok(date) = NaiveDate::parse_from_str(tok, "%Y-%m-%d") {
            out.days.push(DaySpan::single(date));
        } else if let Some(pm) = is_bare_clock(tok)
            .then(|| following_meridiem(&tokens[i + 1..]))
            .flatten()
        {
            // "5-7pm": the hour takes the meridiem of the one after it.
            let time = clock_12(tok, pm)
                .or_else(|| parse_time(tok, None).map(|(t, _)| t))
                .ok_or_else(ambiguous)?;
            out.times.push(time);
        } else if let Some((time, used)) = parse_time(tok, next) {
            out.times.push(time);
            consumed = used;
        } else if tok.chars().any(|c| c.is_ascii_digit()) {
            // A number that names neither a day nor a time.
            return Err(ambiguous());
        }

        modifier = None;
        i += consumed;
    }

    Ok(out)
}

fn tokenize(phrase: &str) -> Vec<String> {
    let normalized = phrase
        .to_lowercase()
        .replace("a.m.", "am")
        .replace("p.m.", "pm")
        .replace(['–', '—'], "-")
        .replace([',', ';', '!', '?', '(', ')'], " ");

    let mut tokens = Vec::new();
    for word in normalized.split_whitespace() {
        let word = word.trim_end_matches('.');
        if NaiveDate::parse_from_str(word, "%Y-%m-%d").is_ok() {
            tokens.push(word.to_string());
            continue;
        }
        // "9am-5pm" becomes "9am to 5pm".
        for (n, part) in word.split('-').filter(|p| !p.is_empty()).enumerate() {
            if n > 0 {
                tokens.push("to".to_string());
            }
            tokens.push(part.to_string());
        }
    }
    tokens
}

fn days_ahead(from: NaiveDate, target: Weekday) -> i64 {
    let from = from.weekday().num_days_from_monday() as i64;
    let target = target.num_days_from_monday() as i64;
    (target - from + 7) % 7
}

fn add_days(day: NaiveDate, days: i64) -> Option<NaiveDate> {
    day.checked_add_signed(Duration::days(days))
}

/// Saturday through Sunday. On a weekend day "this weekend" starts today.
fn weekend(today: NaiveDate, modifier: Option<Modifier>) -> Option<DaySpan> {
    let saturday = match (modifier, today.weekday()) {
        (Some(Modifier::Next), _) => {
            let ahead = days_ahead(today, Weekday::Sat);
            add_days(today, if ahead == 0 { 7 } else { ahead })?
        }
        (_, Weekday::Sat) => today,
        (_, Weekday::Sun) => {
            return Some(DaySpan::single(today));
        }
        _ => add_days(today, days_ahead(today, Weekday::Sat))?,
    };
    Some(DaySpan {
        start: saturday,
        end: add_days(saturday, 1)?,
    })
}

fn parse_weekday(tok: &str) -> Option<Weekday> {
    let tok = tok.strip_suffix('s').filter(|t| t.ends_with("day")).unwrap_or(tok);
    match tok {
        "mon" | "monday" => Some(Weekday::Mon),
        "tue" | "tues" | "tuesday" => Some(Weekday::Tue),
        "wed" | "wednesday" => Some(Weekday::Wed),
        "thu" | "thur" | "thurs" | "thursday" => Some(Weekday::Thu),
        "fri" | "friday" => Some(Weekday::Fri),
        "sat" | "saturday" => Some(Weekday::Sat),
        "sun" | "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}

fn parse_month(tok: &str) -> Option<u32> {
    let month = match tok {
        "jan" | "january" => 1,
        "feb" | "february" => 2,
        "mar" | "march" => 3,
        "apr" | "april" => 4,
        "may" => 5,
        "jun" | "june" => 6,
        "jul" | "july" => 7,
        "aug" | "august" => 8,
        "sep" | "sept" | "september" => 9,
        "oct" | "october" => 10,
        "nov" | "november" => 11,
        "dec" | "december" => 12,
        _ => return None,
    };
    Some(month)
}

fn parse_day_number(tok: &str) -> Option<u32> {
    let digits = ["st", "nd", "rd", "th"]
        .iter()
        .find_map(|suffix| tok.strip_suffix(suffix))
        .unwrap_or(tok);
    digits.parse().ok().filter(|d| (1..=31).contains(d))
}

/// Month/day without a year is the next occurrence on or after today.
fn calendar_day(today: NaiveDate, month: u32, day: u32) -> Option<NaiveDate> {
    let this_year = NaiveDate::from_ymd_opt(today.year(), month, day)?;
    if this_year >= today {
        Some(this_year)
    } else {
        NaiveDate::from_ymd_opt(today.year() + 1, month, day)
    }
}

fn parse_time(tok: &str, next: Option<&str>) -> Option<(NaiveTime, usize)> {
    match tok {
        "noon" | "midday" => return NaiveTime::from_hms_opt(12, 0, 0).map(|t| (t, 1)),
        "midnight" => return Some((NaiveTime::MIN, 1)),
        _ => {}
    }
    if let Some(rest) = tok.strip_suffix("am") {
        return clock_12(rest, false).map(|t| (t, 1));
    }
    if let Some(rest) = tok.strip_suffix("pm") {
        return clock_12(rest, true).map(|t| (t, 1));
    }
    match next {
        Some("am") => return clock_12(tok, false).map(|t| (t, 2)),
        Some("pm") => return clock_12(tok, true).map(|t| (t, 2)),
        _ => {}
    }
    if tok.contains(':') {
        let (h, m) = split_hours_minutes(tok)?;
        return NaiveTime::from_hms_opt(h, m, 0).map(|t| (t, 1));
    }
    None
}

/// Words allowed between the two ends of a time range.
const RANGE_WORDS: &[&str] = &["to", "until", "till", "til", "through", "thru"];

fn is_bare_clock(tok: &str) -> bool {
    tok.starts_with(|c: char| c.is_ascii_digit())
        && tok.chars().all(|c| c.is_ascii_digit() || c == ':')
}

/// Meridiem of the time that closes a range starting at the current token,
/// e.g. `pm` for "5 to 7pm" or "5-7 pm".
fn following_meridiem(rest: &[String]) -> Option<bool> {
    let mut words = rest.iter().map(String::as_str);
    if !RANGE_WORDS.contains(&words.next()?) {
        return None;
    }
    let hour = words.next()?;
    let (digits, pm) = if let Some(h) = hour.strip_suffix("am") {
        (h, false)
    } else if let Some(h) = hour.strip_suffix("pm") {
        (h, true)
    } else {
        match words.next()? {
            "am" => (hour, false),
            "pm" => (hour, true),
            _ => return None,
        }
    };
    clock_12(digits, pm).map(|_| pm)
}

fn clock_12(s: &str, pm: bool) -> Option<NaiveTime> {
    let (h, m) = split_hours_minutes(s)?;
    if !(1..=12).contains(&h) {
        return None;
    }
    let hour = match (h, pm) {
        (12, false) => 0,
        (12, true) => 12,
        (h, false) => h,
        (h, true) => h + 12,
    };
    NaiveTime::from_hms_opt(hour, m, 0)
}

fn split_hours_minutes(s: &str) -> Option<(u32, u32)> {
    match s.split_once(':') {
        Some((h, m)) => Some((h.parse().ok()?, m.parse().ok()?)),
        None => Some((s.parse().ok()?, 0)),
    }
}
