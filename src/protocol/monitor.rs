use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::utils::random_uuid;

/// An error used when parsing [`CheckInStatus`].
#[derive(Debug, Error)]
#[error("invalid check-in status")]
pub struct ParseCheckInStatusError;

/// Represents the status of the monitor check-in
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckInStatus {
    /// Check-in had no issues during execution.
    Ok,
    /// Check-in failed or otherwise had some issues.
    Error,
    /// Check-in is expected to complete.
    InProgress,
}

impl fmt::Display for CheckInStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CheckInStatus::Ok => "ok",
            CheckInStatus::Error => "error",
            CheckInStatus::InProgress => "in_progress",
        })
    }
}

impl FromStr for CheckInStatus {
    type Err = ParseCheckInStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "ok" => CheckInStatus::Ok,
            "error" => CheckInStatus::Error,
            "in_progress" => CheckInStatus::InProgress,
            _ => return Err(ParseCheckInStatusError),
        })
    }
}

/// Configuration object of the monitor schedule.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum MonitorSchedule {
    /// A UNIX crontab style schedule string.
    Crontab {
        /// The crontab syntax string defining the schedule.
        value: String,
    },
    /// A periodic check-in relative to the most recent one.
    Interval {
        /// The interval value.
        value: u64,
        /// The interval unit of the value.
        unit: MonitorIntervalUnit,
    },
}

/// The unit for the interval schedule type
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorIntervalUnit {
    /// Year Interval.
    Year,
    /// Month Interval.
    Month,
    /// Week Interval.
    Week,
    /// Day Interval.
    Day,
    /// Hour Interval.
    Hour,
    /// Minute Interval.
    Minute,
}

/// The monitor configuration payload for upserting monitors during check-in
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MonitorConfig {
    /// The monitor schedule configuration.
    pub schedule: MonitorSchedule,
    /// Minutes after the expected check-in time before it counts as missed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkin_margin: Option<u64>,
    /// Minutes a check-in may stay in progress before it counts as failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_runtime: Option<u64>,
    /// tz database style timezone string
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    /// The number of consecutive failed check-ins that triggers issue creation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_issue_threshold: Option<u64>,
    /// The number of consecutive successful check-ins that triggers issue resolution.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovery_threshold: Option<u64>,
}

impl MonitorConfig {
    /// A config with the given schedule and nothing else set.
    pub fn new(schedule: MonitorSchedule) -> Self {
        MonitorConfig {
            schedule,
            checkin_margin: None,
            max_runtime: None,
            timezone: None,
            failure_issue_threshold: None,
            recovery_threshold: None,
        }
    }
}

/// The monitor check-in payload.
#[derive(Clone, Debug, PartialEq)]
pub struct CheckIn {
    /// Unique identifier of this check-in.
    pub check_in_id: Uuid,
    /// Identifier of the monitor for this check-in.
    pub monitor_slug: String,
    /// Status of this check-in.
    pub status: CheckInStatus,
    /// Duration of this check-in since it has started in seconds.
    pub duration: Option<f64>,
    /// The release to associate the check-in with.
    pub release: Option<String>,
    /// The environment to associate the check-in with.
    pub environment: Option<String>,
    /// Monitor configuration to support upserts.
    pub monitor_config: Option<MonitorConfig>,
}

impl CheckIn {
    /// Starts a new check-in for a monitor.
    pub fn new(monitor_slug: impl Into<String>, status: CheckInStatus) -> Self {
        CheckIn {
            check_in_id: random_uuid(),
            monitor_slug: monitor_slug.into(),
            status,
            duration: None,
            release: None,
            environment: None,
            monitor_config: None,
        }
    }
}
