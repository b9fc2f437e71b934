use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const MILLIS_PER_MINUTE: i64 = 60_000;
const URGENT_MINUTES: i64 = 60;
const APPROACHING_MINUTES: i64 = 120;

/// Coarse classification of remaining response time.
///
/// Variants are declared in the order time moves through them, so comparing
/// two levels tells which one is further along.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrgencyLevel {
    Normal,
    Approaching,
    Urgent,
    Expired,
}

impl UrgencyLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            UrgencyLevel::Normal => "normal",
            UrgencyLevel::Approaching => "approaching",
            UrgencyLevel::Urgent => "urgent",
            UrgencyLevel::Expired => "expired",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    De,
    En,
}

impl Locale {
    pub fn expired_label(self) -> &'static str {
        match self {
            Locale::De => "Abgelaufen",
            Locale::En => "Expired",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported locale {0:?}, expected de or en")]
pub struct LocaleParseError(pub String);

impl FromStr for Locale {
    type Err = LocaleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "de" | "de-de" => Ok(Locale::De),
            "en" | "en-us" | "en-gb" => Ok(Locale::En),
            _ => Err(LocaleParseError(s.to_string())),
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locale::De => f.write_str("de"),
            Locale::En => f.write_str("en"),
        }
    }
}

/// Whole minutes until `deadline`, rounded toward negative infinity.
pub fn minutes_remaining(deadline: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    deadline
        .signed_duration_since(now)
        .num_milliseconds()
        .div_euclid(MILLIS_PER_MINUTE)
}

pub fn is_passed(deadline: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    minutes_remaining(deadline, now) <= 0
}

/// Less than two hours left, but not yet passed.
pub fn is_urgent(deadline: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    let minutes = minutes_remaining(deadline, now);
    minutes > 0 && minutes < APPROACHING_MINUTES
}

pub fn urgency_level(deadline: DateTime<Utc>, now: DateTime<Utc>) -> UrgencyLevel {
    match minutes_remaining(deadline, now) {
        m if m <= 0 => UrgencyLevel::Expired,
        m if m < URGENT_MINUTES => UrgencyLevel::Urgent,
        m if m < APPROACHING_MINUTES => UrgencyLevel::Approaching,
        _ => UrgencyLevel::Normal,
    }
}

pub fn format_remaining(deadline: DateTime<Utc>, now: DateTime<Utc>) -> String {
    format_remaining_in(deadline, now, Locale::default())
}

pub fn format_remaining_in(deadline: DateTime<Utc>, now: DateTime<Utc>, locale: Locale) -> String {
    let minutes = minutes_remaining(deadline, now);
    if minutes <= 0 {
        return locale.expired_label().to_string();
    }

    match (minutes / 60, minutes % 60) {
        (0, mins) => format!("{mins}min"),
        (hours, 0) => format!("{hours}h"),
        (hours, mins) => format!("{hours}h {mins}min"),
    }
}

/// Everything the rendering layer needs to draw one deadline indicator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadlineView {
    pub deadline: DateTime<Utc>,
    pub text: String,
    pub urgency_level: UrgencyLevel,
    pub is_urgent: bool,
    pub is_passed: bool,
    pub minutes_remaining: i64,
}

impl DeadlineView {
    pub fn at(deadline: DateTime<Utc>, now: DateTime<Utc>, locale: Locale) -> Self {
        Self {
            deadline,
            text: format_remaining_in(deadline, now, locale),
            urgency_level: urgency_level(deadline, now),
            is_urgent: is_urgent(deadline, now),
            is_passed: is_passed(deadline, now),
            minutes_remaining: minutes_remaining(deadline, now),
        }
    }
}
