//! SQLite-backed store for schedule records.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

use super::record::{NewSchedule, ScheduleRecord, ScheduleStatus};
use crate::error::{PublishError, Result};
use crate::storage::Pool;

const COLUMNS: &str = "id, project_id, provider, name, html, css, scheduled_at, status, \
                       last_run_at, result_url, error_message, created_at, updated_at";

/// Schedule records persisted in SQLite.
///
/// Only [`ScheduleStore::create`] is called from outside the runner. The
/// lifecycle writes are conditional updates so a record can only move
/// forward through its states.
#[derive(Clone)]
pub struct ScheduleStore {
    pool: Pool,
}

/// Fixed-width RFC 3339 so stored timestamps compare correctly as text.
fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_ts(idx: usize, raw: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e)))
}

fn parse_opt_ts(idx: usize, raw: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    raw.map(|r| parse_ts(idx, r)).transpose()
}

fn from_row(row: &Row<'_>) -> rusqlite::Result<ScheduleRecord> {
    let conversion = |idx: usize, e: PublishError| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    };

    Ok(ScheduleRecord {
        id: row.get(0)?,
        project_id: row.get(1)?,
        provider: row.get::<_, String>(2)?.parse().map_err(|e| conversion(2, e))?,
        name: row.get(3)?,
        html: row.get(4)?,
        css: row.get(5)?,
        scheduled_at: parse_ts(6, row.get(6)?)?,
        status: row.get::<_, String>(7)?.parse().map_err(|e| conversion(7, e))?,
        last_run_at: parse_opt_ts(8, row.get(8)?)?,
        result_url: row.get(9)?,
        error_message: row.get(10)?,
        created_at: parse_ts(11, row.get(11)?)?,
        updated_at: parse_ts(12, row.get(12)?)?,
    })
}

impl ScheduleStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Insert a new record in `scheduled` state.
    pub async fn create(&self, new: NewSchedule) -> Result<ScheduleRecord> {
        // millisecond precision, as stored
        let now = Utc::now().trunc_subsecs(3);
        let record = ScheduleRecord {
            id: Uuid::new_v4().to_string(),
            project_id: new.project_id,
            provider: new.provider,
            name: new.name,
            html: new.html,
            css: new.css,
            scheduled_at: new.scheduled_at.trunc_subsecs(3),
            status: ScheduleStatus::Scheduled,
            last_run_at: None,
            result_url: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        };

        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO publish_schedules
                (id, project_id, provider, name, html, css, scheduled_at, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                record.id,
                record.project_id,
                record.provider.as_str(),
                record.name,
                record.html,
                record.css,
                ts(record.scheduled_at),
                record.status.as_str(),
                ts(record.created_at),
                ts(record.updated_at),
            ],
        )?;

        tracing::info!(
            schedule_id = %record.id,
            provider = %record.provider,
            name = %record.name,
            scheduled_at = %record.scheduled_at,
            "Schedule created"
        );
        Ok(record)
    }

    pub async fn get(&self, id: &str) -> Result<ScheduleRecord> {
        let conn = self.pool.get()?;
        conn.query_row(
            &format!("SELECT {} FROM publish_schedules WHERE id = ?1", COLUMNS),
            params![id],
            from_row,
        )
        .optional()?
        .ok_or_else(|| PublishError::NotFound(format!("schedule '{}' not found", id)))
    }

    /// All records for a project, newest `scheduled_at` first.
    pub async fn list_for_project(&self, project_id: &str) -> Result<Vec<ScheduleRecord>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM publish_schedules WHERE project_id = ?1
             ORDER BY scheduled_at DESC, created_at DESC",
            COLUMNS
        ))?;
        let rows = stmt.query_map(params![project_id], from_row)?;

        let mut list = Vec::new();
        for r in rows {
            list.push(r?);
        }
        Ok(list)
    }

    /// Up to `limit` records that are `scheduled` and due at `now`, oldest first.
    pub async fn due(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<ScheduleRecord>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM publish_schedules
             WHERE status = 'scheduled' AND scheduled_at <= ?1
             ORDER BY scheduled_at ASC
             LIMIT ?2",
            COLUMNS
        ))?;
        let rows = stmt.query_map(params![ts(now), limit as i64], from_row)?;

        let mut list = Vec::new();
        for r in rows {
            list.push(r?);
        }
        Ok(list)
    }

    /// Atomically move `scheduled -> running`. Returns `false` when the
    /// record was no longer `scheduled` (another runner claimed it).
    pub async fn claim(&self, id: &str, at: DateTime<Utc>) -> Result<bool> {
        let conn = self.pool.get()?;
        let changed = conn.execute(
            "UPDATE publish_schedules
             SET status = 'running', last_run_at = ?2, updated_at = ?2
             WHERE id = ?1 AND status = 'scheduled'",
            params![id, ts(at)],
        )?;
        Ok(changed == 1)
    }

    /// `running -> completed`.
    pub async fn complete(&self, id: &str, result_url: &str) -> Result<()> {
        self.finish(id, ScheduleStatus::Completed, Some(result_url), None)
    }

    /// `running -> failed`.
    pub async fn fail(&self, id: &str, error_message: &str) -> Result<()> {
        self.finish(id, ScheduleStatus::Failed, None, Some(error_message))
    }

    fn finish(
        &self,
        id: &str,
        status: ScheduleStatus,
        result_url: Option<&str>,
        error_message: Option<&str>,
    ) -> Result<()> {
        let conn = self.pool.get()?;
        let changed = conn.execute(
            "UPDATE publish_schedules
             SET status = ?2, result_url = ?3, error_message = ?4, updated_at = ?5
             WHERE id = ?1 AND status = 'running'",
            params![id, status.as_str(), result_url, error_message, ts(Utc::now())],
        )?;
        if changed == 0 {
            return Err(PublishError::Storage(format!(
                "schedule '{}' is not running; refusing to mark it {}",
                id, status
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publish::Provider;
    use chrono::{Duration, TimeZone};

    fn store() -> (tempfile::TempDir, ScheduleStore) {
        let dir = tempfile::tempdir().unwrap();
        let pool = crate::storage::open_pool(dir.path().join("t.db").to_str().unwrap()).unwrap();
        (dir, ScheduleStore::new(pool))
    }

    fn new_schedule(project: &str, name: &str, at: DateTime<Utc>) -> NewSchedule {
        NewSchedule {
            project_id: project.to_string(),
            provider: Provider::Vercel,
            name: name.to_string(),
            html: "<p>x</p>".to_string(),
            css: String::new(),
            scheduled_at: at,
        }
    }

    #[tokio::test]
    async fn test_create_starts_scheduled() {
        let (_dir, store) = store();
        let rec = store.create(new_schedule("p1", "a", Utc::now())).await.unwrap();

        assert_eq!(rec.status, ScheduleStatus::Scheduled);
        assert!(rec.result_url.is_none());
        assert!(rec.error_message.is_none());
        assert!(rec.last_run_at.is_none());

        let loaded = store.get(&rec.id).await.unwrap();
        assert_eq!(loaded.id, rec.id);
        assert_eq!(loaded.html, "<p>x</p>");
        assert_eq!(loaded.provider, Provider::Vercel);
    }

    #[tokio::test]
    async fn test_created_record_matches_stored_row() {
        let (_dir, store) = store();
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap() + Duration::nanoseconds(123_456_789);
        let rec = store.create(new_schedule("p1", "a", at)).await.unwrap();

        assert_eq!(rec.scheduled_at.timestamp_subsec_nanos(), 123_000_000);
        assert_eq!(store.get(&rec.id).await.unwrap(), rec);
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let (_dir, store) = store();
        assert!(matches!(store.get("nope").await, Err(PublishError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_is_newest_scheduled_first() {
        let (_dir, store) = store();
        let now = Utc::now();
        store.create(new_schedule("p1", "old", now - Duration::days(2))).await.unwrap();
        store.create(new_schedule("p1", "new", now + Duration::days(1))).await.unwrap();
        store.create(new_schedule("p1", "mid", now)).await.unwrap();
        store.create(new_schedule("p2", "other", now)).await.unwrap();

        let names: Vec<String> = store
            .list_for_project("p1")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["new", "mid", "old"]);
    }

    #[tokio::test]
    async fn test_due_excludes_future_and_limits() {
        let (_dir, store) = store();
        let now = Utc::now();
        for i in 0..3 {
            store
                .create(new_schedule("p", &format!("past-{}", i), now - Duration::minutes(10 - i)))
                .await
                .unwrap();
        }
        store.create(new_schedule("p", "future", now + Duration::hours(1))).await.unwrap();

        let due = store.due(now, 10).await.unwrap();
        assert_eq!(due.len(), 3);
        assert!(due.iter().all(|r| r.name != "future"));
        assert_eq!(due[0].name, "past-0");

        assert_eq!(store.due(now, 2).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_claim_is_at_most_once() {
        let (_dir, store) = store();
        let rec = store
            .create(new_schedule("p", "a", Utc::now() - Duration::minutes(1)))
            .await
            .unwrap();

        assert!(store.claim(&rec.id, Utc::now()).await.unwrap());
        assert!(!store.claim(&rec.id, Utc::now()).await.unwrap());

        let loaded = store.get(&rec.id).await.unwrap();
        assert_eq!(loaded.status, ScheduleStatus::Running);
        assert!(loaded.last_run_at.is_some());
        assert!(store.due(Utc::now(), 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_terminal_records_are_sinks() {
        let (_dir, store) = store();
        let rec = store
            .create(new_schedule("p", "a", Utc::now() - Duration::minutes(1)))
            .await
            .unwrap();

        // finishing before a claim is refused
        assert!(store.complete(&rec.id, "https://x").await.is_err());

        store.claim(&rec.id, Utc::now()).await.unwrap();
        store.fail(&rec.id, "boom").await.unwrap();
        assert!(store.complete(&rec.id, "https://x").await.is_err());
        assert!(!store.claim(&rec.id, Utc::now()).await.unwrap());

        let loaded = store.get(&rec.id).await.unwrap();
        assert_eq!(loaded.status, ScheduleStatus::Failed);
        assert_eq!(loaded.error_message.as_deref(), Some("boom"));
        assert!(loaded.result_url.is_none());
    }
}
