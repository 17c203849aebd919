//! The schedule record: one deferred deployment and its lifecycle.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PublishError, Result};
use crate::publish::Provider;

/// `Scheduled -> Running -> {Completed | Failed}`. Terminal states are sinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleStatus {
    Scheduled,
    Running,
    Completed,
    Failed,
}

impl ScheduleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleStatus::Scheduled => "scheduled",
            ScheduleStatus::Running => "running",
            ScheduleStatus::Completed => "completed",
            ScheduleStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ScheduleStatus::Completed | ScheduleStatus::Failed)
    }
}

impl std::fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ScheduleStatus {
    type Err = PublishError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "scheduled" => Ok(ScheduleStatus::Scheduled),
            "running" => Ok(ScheduleStatus::Running),
            "completed" => Ok(ScheduleStatus::Completed),
            "failed" => Ok(ScheduleStatus::Failed),
            other => Err(PublishError::Storage(format!(
                "unknown schedule status '{}'",
                other
            ))),
        }
    }
}

/// A persisted request to deploy a captured design snapshot at or after
/// `scheduled_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRecord {
    pub id: String,
    pub project_id: String,
    pub provider: Provider,
    pub name: String,
    pub html: String,
    pub css: String,
    pub scheduled_at: DateTime<Utc>,
    pub status: ScheduleStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScheduleRecord {
    /// Eligible for execution: still `scheduled` and due.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == ScheduleStatus::Scheduled && self.scheduled_at <= now
    }
}

/// Validated input for creating a record. `html`/`css` are a snapshot.
#[derive(Debug, Clone)]
pub struct NewSchedule {
    pub project_id: String,
    pub provider: Provider,
    pub name: String,
    pub html: String,
    pub css: String,
    pub scheduled_at: DateTime<Utc>,
}

/// Wire shape of a schedule-creation request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRequest {
    pub project_id: Option<String>,
    pub name: Option<String>,
    pub html: Option<String>,
    pub css: Option<String>,
    pub scheduled_at: Option<String>,
}

impl ScheduleRequest {
    pub fn into_new_schedule(self, provider: Provider) -> Result<NewSchedule> {
        let present = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        let (Some(project_id), Some(name), Some(scheduled_at)) = (
            present(self.project_id),
            present(self.name),
            present(self.scheduled_at),
        ) else {
            return Err(PublishError::Validation(
                "projectId, name, and scheduledAt are required".to_string(),
            ));
        };

        Ok(NewSchedule {
            project_id,
            provider,
            name,
            html: self.html.unwrap_or_default(),
            css: self.css.unwrap_or_default(),
            scheduled_at: parse_timestamp(&scheduled_at)?,
        })
    }
}

/// Parse an ISO-8601 timestamp. Offsets are honoured in extended (`+02:00`)
/// or basic (`+0200`) form; a timestamp without one is taken as UTC, and a
/// bare date as UTC midnight.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(naive.and_utc());
        }
    }
    if let Some(midnight) = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        return Ok(midnight.and_utc());
    }
    Err(PublishError::Validation(
        "scheduledAt must be an ISO-8601 timestamp".to_string(),
    ))
}
