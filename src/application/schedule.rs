use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::{
    Clock, IdGenerator, MinorUnits, Schedule, ScheduleId, ScheduleKind, ScheduleStatus,
    parse_timestamp, serialize_optional_timestamp, serialize_timestamp, truncate_to_seconds,
};
use crate::storage::{AccountStore, Database, ScheduleStore};

use super::AppError;
use super::transfer::{check_currency, validate_movement};

/// A deferred transfer as submitted by a client. Dates are kept as text until validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRequest {
    pub from_account: String,
    pub to_account: String,
    pub to_bank: String,
    pub amount: MinorUnits,
    pub currency: String,
    #[serde(default)]
    pub note: String,
    pub schedule: String,
    pub start_date: String,
    #[serde(default)]
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleResult {
    pub schedule_id: ScheduleId,
    pub status: ScheduleStatus,
    #[serde(serialize_with = "serialize_timestamp")]
    pub next_run_date: DateTime<Utc>,
    #[serde(serialize_with = "serialize_optional_timestamp")]
    pub end_date: Option<DateTime<Utc>>,
    pub schedule_type: ScheduleKind,
}

/// Records schedule intents. Nothing here moves money.
#[derive(Clone)]
pub struct ScheduleEngine {
    accounts: AccountStore,
    schedules: ScheduleStore,
    clock: Arc<dyn Clock>,
    ids: Arc<IdGenerator>,
}

impl ScheduleEngine {
    pub fn new(db: &Database, clock: Arc<dyn Clock>, ids: Arc<IdGenerator>) -> Self {
        Self {
            accounts: db.accounts(),
            schedules: db.schedules(),
            clock,
            ids,
        }
    }

    pub async fn create_schedule(
        &self,
        request: &ScheduleRequest,
    ) -> Result<ScheduleResult, AppError> {
        let kind = ScheduleKind::from_str(&request.schedule)
            .ok_or_else(|| AppError::validation("invalid schedule type"))?;
        let (start_date, end_date) = parse_schedule_dates(&request.start_date, request.end_date.as_deref())?;
        validate_movement(
            &request.from_account,
            &request.to_account,
            &request.to_bank,
            request.amount,
            &request.currency,
        )?;

        let from = self
            .accounts
            .get_account(&request.from_account)
            .await?
            .ok_or_else(|| AppError::AccountNotFound(request.from_account.clone()))?;
        let to = self
            .accounts
            .get_account(&request.to_account)
            .await?
            .ok_or_else(|| AppError::AccountNotFound(request.to_account.clone()))?;
        check_currency(&request.currency, [&from, &to])?;

        let schedule = Schedule {
            schedule_id: self.ids.next_schedule_id(),
            from_account: request.from_account.clone(),
            to_account: request.to_account.clone(),
            to_account_name: to.account_name,
            to_bank: request.to_bank.clone(),
            amount: request.amount,
            currency: request.currency.clone(),
            note: request.note.clone(),
            kind,
            status: ScheduleStatus::Scheduled,
            start_date,
            end_date,
            created_at: truncate_to_seconds(self.clock.now()),
        };
        self.schedules.insert(&schedule).await?;

        info!(
            schedule_id = %schedule.schedule_id,
            kind = %kind,
            from = %schedule.from_account,
            "schedule created"
        );
        Ok(ScheduleResult {
            schedule_id: schedule.schedule_id,
            status: schedule.status,
            next_run_date: schedule.start_date,
            end_date: schedule.end_date,
            schedule_type: kind,
        })
    }

    /// Pending schedules paid from `account_number`, earliest first.
    pub async fn list_due(&self, account_number: &str) -> Result<Vec<Schedule>, AppError> {
        Ok(self.schedules.list_scheduled_from(account_number).await?)
    }

    /// Seed the demo schedules, stamped with the engine's clock.
    pub async fn seed_demo_schedules(&self) -> Result<usize, AppError> {
        let created_at = truncate_to_seconds(self.clock.now());
        Ok(self.schedules.seed_demo_schedules(created_at).await?)
    }
}

/// An empty end date means open-ended.
fn parse_schedule_dates(
    start: &str,
    end: Option<&str>,
) -> Result<(DateTime<Utc>, Option<DateTime<Utc>>), AppError> {
    let start_date =
        parse_timestamp(start).map_err(|_| AppError::validation("invalid start date"))?;
    let end_date = match end.map(str::trim).filter(|e| !e.is_empty()) {
        Some(end) => {
            Some(parse_timestamp(end).map_err(|_| AppError::validation("invalid end date"))?)
        }
        None => None,
    };
    if end_date.is_some_and(|end| end < start_date) {
        return Err(AppError::validation("end date is before start date"));
    }
    Ok((start_date, end_date))
}
