use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

const IMMINENT_SHOOT_HOURS: i64 = 24;
const SOON_SHOOT_HOURS: i64 = 48;

const IMMINENT_WINDOW_HOURS: i64 = 4;
const SOON_WINDOW_HOURS: i64 = 6;
const RELAXED_WINDOW_HOURS: i64 = 12;

/// How long a photographer gets to answer, tiered by how close the shoot is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseTier {
    /// Shoot within 24 hours (or already past).
    Imminent,
    /// Shoot between 24 and 48 hours out.
    Soon,
    /// Shoot more than 48 hours out, or not scheduled yet.
    Relaxed,
}

impl ResponseTier {
    pub fn window(self) -> TimeDelta {
        TimeDelta::hours(self.window_hours())
    }

    pub fn window_hours(self) -> i64 {
        match self {
            ResponseTier::Imminent => IMMINENT_WINDOW_HOURS,
            ResponseTier::Soon => SOON_WINDOW_HOURS,
            ResponseTier::Relaxed => RELAXED_WINDOW_HOURS,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResponseTier::Imminent => "imminent",
            ResponseTier::Soon => "soon",
            ResponseTier::Relaxed => "relaxed",
        }
    }
}

/// Picks the response tier from the whole hours between assignment and shoot.
///
/// Lower tiers include their upper bound: exactly 24h is `Imminent`, exactly
/// 48h is `Soon`. A shoot that lies before `assigned_at` counts as imminent.
pub fn response_tier(
    assigned_at: DateTime<Utc>,
    scheduled_date: Option<DateTime<Utc>>,
) -> ResponseTier {
    let Some(scheduled) = scheduled_date else {
        return ResponseTier::Relaxed;
    };

    let hours_until_shoot = scheduled.signed_duration_since(assigned_at).num_hours();

    if hours_until_shoot <= IMMINENT_SHOOT_HOURS {
        ResponseTier::Imminent
    } else if hours_until_shoot <= SOON_SHOOT_HOURS {
        ResponseTier::Soon
    } else {
        ResponseTier::Relaxed
    }
}

pub fn calculate_deadline(
    assigned_at: DateTime<Utc>,
    scheduled_date: Option<DateTime<Utc>>,
) -> DateTime<Utc> {
    let window = response_tier(assigned_at, scheduled_date).window();
    assigned_at
        .checked_add_signed(window)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeDelta, TimeZone, Utc};

    use super::{ResponseTier, calculate_deadline, response_tier};

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn shoot_within_a_day_gets_four_hours() {
        let deadline = calculate_deadline(at(2024, 1, 1, 0), Some(at(2024, 1, 1, 20)));
        assert_eq!(deadline, at(2024, 1, 1, 4));
    }

    #[test]
    fn shoot_within_two_days_gets_six_hours() {
        let deadline = calculate_deadline(at(2024, 1, 1, 0), Some(at(2024, 1, 2, 12)));
        assert_eq!(deadline, at(2024, 1, 1, 6));
    }

    #[test]
    fn unscheduled_shoot_gets_twelve_hours() {
        assert_eq!(calculate_deadline(at(2024, 1, 1, 0), None), at(2024, 1, 1, 12));
        assert_eq!(calculate_deadline(at(1999, 6, 30, 23), None), at(1999, 7, 1, 11));
    }

    #[test]
    fn distant_shoot_gets_twelve_hours() {
        let deadline = calculate_deadline(at(2024, 1, 1, 0), Some(at(2024, 2, 1, 0)));
        assert_eq!(deadline, at(2024, 1, 1, 12));
    }

    #[test]
    fn tier_boundaries_belong_to_the_lower_tier() {
        let assigned = at(2024, 3, 10, 8);

        let exactly_24 = assigned + TimeDelta::hours(24);
        let exactly_48 = assigned + TimeDelta::hours(48);
        let just_over_48 = assigned + TimeDelta::hours(49);

        assert_eq!(response_tier(assigned, Some(exactly_24)), ResponseTier::Imminent);
        assert_eq!(response_tier(assigned, Some(exactly_48)), ResponseTier::Soon);
        assert_eq!(response_tier(assigned, Some(just_over_48)), ResponseTier::Relaxed);
    }

    #[test]
    fn partial_hours_are_truncated_before_tiering() {
        let assigned = at(2024, 3, 10, 8);
        let almost_25 = assigned + TimeDelta::minutes(24 * 60 + 59);

        assert_eq!(response_tier(assigned, Some(almost_25)), ResponseTier::Imminent);
    }

    #[test]
    fn shoot_in_the_past_is_treated_as_imminent() {
        let assigned = at(2024, 1, 5, 0);
        let deadline = calculate_deadline(assigned, Some(at(2024, 1, 1, 0)));
        assert_eq!(deadline, assigned + TimeDelta::hours(4));

        assert_eq!(response_tier(assigned, Some(assigned)), ResponseTier::Imminent);
    }

    #[test]
    fn imminent_tier_is_independent_of_absolute_time() {
        for assigned in [at(1970, 1, 1, 0), at(2024, 2, 29, 23), at(2100, 12, 31, 5)] {
            for offset_hours in [-500, -1, 0, 1, 12, 24] {
                let scheduled = assigned + TimeDelta::hours(offset_hours);
                assert_eq!(
                    calculate_deadline(assigned, Some(scheduled)),
                    assigned + TimeDelta::hours(4),
                    "offset {offset_hours}h"
                );
            }
        }
    }

    #[test]
    fn calculation_is_idempotent() {
        let assigned = at(2024, 1, 1, 0);
        let scheduled = Some(at(2024, 1, 2, 12));

        assert_eq!(
            calculate_deadline(assigned, scheduled),
            calculate_deadline(assigned, scheduled)
        );
    }

    #[test]
    fn deadline_saturates_at_the_end_of_representable_time() {
        let deadline = calculate_deadline(DateTime::<Utc>::MAX_UTC, None);
        assert_eq!(deadline, DateTime::<Utc>::MAX_UTC);
    }
}
