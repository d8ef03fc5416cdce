use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: String,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub service_id: Option<String>,
    #[serde(default)]
    pub service_rate_id: Option<String>,
    #[serde(default)]
    pub professional_id: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub status: BookingStatus,
    #[serde(default)]
    pub booking_pets: Vec<BookingPet>,
}

impl Booking {
    /// Bookings with unparseable dates are never treated as overlapping.
    pub fn range(&self) -> Option<DateRange> {
        let start_date = parse_date(self.start_date.as_deref()?)?;
        let end_date = self
            .end_date
            .as_deref()
            .and_then(parse_date)
            .unwrap_or(start_date);
        let start_time = self
            .start_time
            .as_deref()
            .and_then(parse_time)
            .unwrap_or(NaiveTime::MIN);
        let end_time = self
            .end_time
            .as_deref()
            .and_then(parse_time)
            .unwrap_or_else(end_of_day);
        Some(DateRange {
            start_date,
            end_date,
            start_time,
            end_time,
        })
    }

    pub fn pet_ids(&self) -> Vec<&str> {
        self.booking_pets.iter().map(|p| p.pet_id.as_str()).collect()
    }

    pub fn is_active(&self) -> bool {
        self.status == BookingStatus::Scheduled
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    #[default]
    Scheduled,
    Completed,
    Cancelled,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BookingPet {
    pub pet_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_instructions: Option<String>,
}

/// Payload for both create and update calls.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    pub client_id: String,
    pub service_id: String,
    pub service_rate_id: String,
    pub professional_id: String,
    pub start_date: String,
    pub end_date: String,
    pub start_time: String,
    pub end_time: String,
    pub booking_pets: Vec<BookingPet>,
    pub notes: String,
    pub extra_pet_fee: f64,
    pub weekend_fee: f64,
}

/// A concrete booking window. End is inclusive of `end_time` on `end_date`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateRange {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl DateRange {
    pub fn start(&self) -> NaiveDateTime {
        self.start_date.and_time(self.start_time)
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end_date.and_time(self.end_time)
    }

    // Touching windows (one ends exactly when the other starts) do not overlap.
    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start() < other.end() && other.start() < self.end()
    }

    pub fn start_date_str(&self) -> String {
        self.start_date.format("%Y-%m-%d").to_string()
    }

    pub fn end_date_str(&self) -> String {
        self.end_date.format("%Y-%m-%d").to_string()
    }

    pub fn start_time_str(&self) -> String {
        self.start_time.format("%H:%M").to_string()
    }

    pub fn end_time_str(&self) -> String {
        self.end_time.format("%H:%M").to_string()
    }

    pub fn to_human_readable(&self) -> String {
        if self.start_date == self.end_date {
            format!(
                "{} {}-{}",
                self.start_date.format("%a %b %-d"),
                self.start_time_str(),
                self.end_time_str()
            )
        } else {
            format!(
                "{} {} to {} {}",
                self.start_date.format("%a %b %-d"),
                self.start_time_str(),
                self.end_date.format("%a %b %-d"),
                self.end_time_str()
            )
        }
    }
}

pub fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 59, 0).unwrap_or(NaiveTime::MIN)
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}

fn parse_time(s: &str) -> Option<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .ok()
}
