use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use sqlx::query::Query;
use sqlx::sqlite::SqliteArguments;
use sqlx::{Row, Sqlite, SqlitePool};

use crate::domain::{
    Schedule, ScheduleKind, ScheduleStatus, format_timestamp, parse_timestamp,
};

const SCHEDULE_COLUMNS: &str = "schedule_id, from_account, to_account, to_account_name, to_bank, \
     amount, currency, note, status, schedule, schedule_date, end_date, created_at";

const INSERT_SCHEDULE: &str = r#"
    INSERT INTO schedules (schedule_id, from_account, to_account, to_account_name, to_bank, amount, currency, note, status, schedule, schedule_date, end_date, created_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

/// Owns the `schedules` table.
#[derive(Clone)]
pub struct ScheduleStore {
    pool: SqlitePool,
}

impl ScheduleStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Save a new schedule.
    pub async fn insert(&self, schedule: &Schedule) -> Result<()> {
        bind_schedule(sqlx::query(INSERT_SCHEDULE), schedule)
            .execute(&self.pool)
            .await
            .context("Failed to save schedule")?;
        Ok(())
    }

    /// Insert the demo schedules. Ones already present are left untouched.
    pub async fn seed_demo_schedules(&self, created_at: DateTime<Utc>) -> Result<usize> {
        let schedules = demo_schedules(created_at)?;
        let sql = format!("{INSERT_SCHEDULE} ON CONFLICT (schedule_id) DO NOTHING");
        let mut tx = self.pool.begin().await.context("Failed to start seeding")?;
        for schedule in &schedules {
            bind_schedule(sqlx::query(&sql), schedule)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("Failed to seed schedule {}", schedule.schedule_id))?;
        }
        tx.commit().await.context("Failed to commit seed schedules")?;
        Ok(schedules.len())
    }

    /// Pending schedules paid from `account_number`, earliest first.
    pub async fn list_scheduled_from(&self, account_number: &str) -> Result<Vec<Schedule>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {SCHEDULE_COLUMNS}
            FROM schedules
            WHERE from_account = ? AND status = ?
            ORDER BY schedule_date ASC, schedule_id ASC
            "#
        ))
        .bind(account_number)
        .bind(ScheduleStatus::Scheduled.as_str())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list schedules")?;

        rows.iter().map(Self::row_to_schedule).collect()
    }

    fn row_to_schedule(row: &sqlx::sqlite::SqliteRow) -> Result<Schedule> {
        let kind_str: String = row.get("schedule");
        let status_str: String = row.get("status");
        let start_str: String = row.get("schedule_date");
        let end_str: Option<String> = row.get("end_date");
        let created_str: String = row.get("created_at");

        Ok(Schedule {
            schedule_id: row.get("schedule_id"),
            from_account: row.get("from_account"),
            to_account: row.get("to_account"),
            to_account_name: row.get("to_account_name"),
            to_bank: row.get("to_bank"),
            amount: row.get("amount"),
            currency: row.get("currency"),
            note: row.get("note"),
            kind: ScheduleKind::from_str(&kind_str)
                .ok_or_else(|| anyhow!("Invalid schedule type: {}", kind_str))?,
            status: ScheduleStatus::from_str(&status_str)
                .ok_or_else(|| anyhow!("Invalid schedule status: {}", status_str))?,
            start_date: parse_timestamp(&start_str).context("Invalid schedule_date")?,
            end_date: end_str
                .as_deref()
                .map(parse_timestamp)
                .transpose()
                .context("Invalid end_date")?,
            created_at: parse_timestamp(&created_str).context("Invalid created_at")?,
        })
    }
}

fn bind_schedule<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    schedule: &'q Schedule,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    query
        .bind(&schedule.schedule_id)
        .bind(&schedule.from_account)
        .bind(&schedule.to_account)
        .bind(&schedule.to_account_name)
        .bind(&schedule.to_bank)
        .bind(schedule.amount)
        .bind(&schedule.currency)
        .bind(&schedule.note)
        .bind(schedule.status.as_str())
        .bind(schedule.kind.as_str())
        .bind(format_timestamp(schedule.start_date))
        .bind(schedule.end_date.map(format_timestamp))
        .bind(format_timestamp(schedule.created_at))
}

/// Pending one-off transfers out of the first demo account. Seed them after `demo_accounts`.
pub fn demo_schedules(created_at: DateTime<Utc>) -> Result<Vec<Schedule>> {
    let start = parse_timestamp("2025-09-01 12:00:00")?;
    let end = parse_timestamp("2030-09-01 12:00:00")?;
    let schedule = |id: &str, to: &str, name: &str, bank: &str, amount, note: &str| Schedule {
        schedule_id: id.to_string(),
        from_account: "111-111-111".to_string(),
        to_account: to.to_string(),
        to_account_name: name.to_string(),
        to_bank: bank.to_string(),
        amount,
        currency: "THB".to_string(),
        note: note.to_string(),
        kind: ScheduleKind::Once,
        status: ScheduleStatus::Scheduled,
        start_date: start,
        end_date: Some(end),
        created_at,
    };
    Ok(vec![
        schedule("SCH123456789", "222-222-222", "MaiThai", "KTB", 1899900, "Breakfast"),
        schedule("SCH987654321", "333-333-333", "LaumPlearn", "SCB", 2499850, "Lunch"),
        schedule("SCH123434267", "444-444-444", "Laumcing", "KBank", 2398825, "Dinner"),
    ])
}
