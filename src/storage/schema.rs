//! Database schema and migrations.

use anyhow::Result;
use rusqlite::Connection;

/// Run all pending migrations.
pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS publish_schedules (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL,
            provider TEXT NOT NULL CHECK (provider IN ('vercel', 'netlify')),
            name TEXT NOT NULL,
            html TEXT NOT NULL DEFAULT '',
            css TEXT NOT NULL DEFAULT '',
            scheduled_at TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'scheduled'
                CHECK (status IN ('scheduled', 'running', 'completed', 'failed')),
            last_run_at TEXT,
            result_url TEXT,
            error_message TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_publish_schedules_project ON publish_schedules(project_id);
        CREATE INDEX IF NOT EXISTS idx_publish_schedules_scheduled_at ON publish_schedules(scheduled_at);
        CREATE INDEX IF NOT EXISTS idx_publish_schedules_status ON publish_schedules(status);
        CREATE INDEX IF NOT EXISTS idx_publish_schedules_project_time
            ON publish_schedules(project_id, scheduled_at);

        INSERT OR IGNORE INTO schema_version (version) VALUES (1);",
    )?;

    Ok(())
}
