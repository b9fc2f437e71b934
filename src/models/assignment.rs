use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::engine::deadline::{ResponseTier, calculate_deadline, response_tier};
use crate::timestamp::{TimestampError, parse_optional_timestamp, parse_timestamp};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentStatus {
    Pending,
    Accepted,
    Declined,
    Completed,
}

impl AssignmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AssignmentStatus::Pending => "pending",
            AssignmentStatus::Accepted => "accepted",
            AssignmentStatus::Declined => "declined",
            AssignmentStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown assignment status: {0}, expected pending/accepted/declined/completed")]
pub struct StatusParseError(pub String);

impl FromStr for AssignmentStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(AssignmentStatus::Pending),
            "accepted" => Ok(AssignmentStatus::Accepted),
            "declined" => Ok(AssignmentStatus::Declined),
            "completed" => Ok(AssignmentStatus::Completed),
            _ => Err(StatusParseError(s.to_string())),
        }
    }
}

/// An offer of a photography job to a single photographer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub photographer_id: Uuid,
    pub assigned_at: DateTime<Utc>,
    pub scheduled_date: Option<DateTime<Utc>>,
    pub status: AssignmentStatus,
}

impl Assignment {
    pub fn deadline(&self) -> DateTime<Utc> {
        calculate_deadline(self.assigned_at, self.scheduled_date)
    }

    pub fn response_tier(&self) -> ResponseTier {
        response_tier(self.assigned_at, self.scheduled_date)
    }

    pub fn is_pending(&self) -> bool {
        self.status == AssignmentStatus::Pending
    }
}

/// Raw assignment row as delivered by the assignment source, before any
/// timestamp has been parsed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentRecord {
    pub assigned_at: String,
    #[serde(default)]
    pub scheduled_date: Option<String>,
    pub status: String,
}

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("assignedAt: {0}")]
    AssignedAt(#[source] TimestampError),

    #[error("scheduledDate: {0}")]
    ScheduledDate(#[source] TimestampError),

    #[error(transparent)]
    Status(#[from] StatusParseError),
}

impl AssignmentRecord {
    pub fn into_assignment(
        self,
        id: Uuid,
        order_id: Uuid,
        photographer_id: Uuid,
    ) -> Result<Assignment, RecordError> {
        let assigned_at = parse_timestamp(&self.assigned_at).map_err(RecordError::AssignedAt)?;
        let scheduled_date = parse_optional_timestamp(self.scheduled_date.as_deref())
            .map_err(RecordError::ScheduledDate)?;
        let status = self.status.parse::<AssignmentStatus>()?;

        Ok(Assignment {
            id,
            order_id,
            photographer_id,
            assigned_at,
            scheduled_date,
            status,
        })
    }
}
