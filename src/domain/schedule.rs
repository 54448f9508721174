use chrono::{DateTime, Datelike, Months, Utc};
use serde::{Deserialize, Serialize};

use super::{AccountNumber, MinorUnits};

pub type ScheduleId = String;

/// How often a scheduled transfer repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScheduleKind {
    Once,
    Monthly,
}

impl ScheduleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleKind::Once => "ONCE",
            ScheduleKind::Monthly => "MONTHLY",
        }
    }

    /// Kinds are matched exactly; "monthly" is not a valid kind.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ONCE" => Some(ScheduleKind::Once),
            "MONTHLY" => Some(ScheduleKind::Monthly),
            _ => None,
        }
    }
}

impl std::fmt::Display for ScheduleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScheduleStatus {
    Scheduled,
    Executed,
    Cancelled,
}

impl ScheduleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleStatus::Scheduled => "SCHEDULED",
            ScheduleStatus::Executed => "EXECUTED",
            ScheduleStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "SCHEDULED" => Some(ScheduleStatus::Scheduled),
            "EXECUTED" => Some(ScheduleStatus::Executed),
            "CANCELLED" => Some(ScheduleStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A deferred transfer intent. Nothing in this crate executes it; a scheduler would call the
/// transfer engine on each occurrence and move the status on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub schedule_id: ScheduleId,
    pub from_account: AccountNumber,
    pub to_account: AccountNumber,
    pub to_account_name: String,
    pub to_bank: String,
    pub amount: MinorUnits,
    pub currency: String,
    pub note: String,
    #[serde(rename = "schedule")]
    pub kind: ScheduleKind,
    pub status: ScheduleStatus,
    #[serde(rename = "date")]
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Schedule {
    /// Due dates from the start date up to and including `horizon`, never past the end date.
    pub fn occurrences_until(&self, horizon: DateTime<Utc>) -> Vec<DateTime<Utc>> {
        if self.status != ScheduleStatus::Scheduled {
            return vec![];
        }

        let limit = match self.end_date {
            Some(end) if end < horizon => end,
            _ => horizon,
        };
        if self.start_date > limit {
            return vec![];
        }

        match self.kind {
            ScheduleKind::Once => vec![self.start_date],
            ScheduleKind::Monthly => {
                let mut dates = Vec::new();
                let mut months = 0u32;
                while let Some(next) = add_months_clamped(self.start_date, months) {
                    if next > limit {
                        break;
                    }
                    dates.push(next);
                    months += 1;
                }
                dates
            }
        }
    }

    /// True when at least one occurrence has come due by `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == ScheduleStatus::Scheduled && self.start_date <= now
    }
}

/// `start` moved forward by `months`, keeping the day of month when it exists and falling back
/// to the last day of the month (Jan 31 -> Feb 28/29) otherwise. Always counted from `start` so
/// a short month does not shift later occurrences.
fn add_months_clamped(start: DateTime<Utc>, months: u32) -> Option<DateTime<Utc>> {
    let day = start.day();
    let first = start.with_day(1)?.checked_add_months(Months::new(months))?;
    let mut candidate = day;
    loop {
        if let Some(date) = first.with_day(candidate) {
            return Some(date);
        }
        if candidate <= 28 {
            return None;
        }
        candidate -= 1;
    }
}
