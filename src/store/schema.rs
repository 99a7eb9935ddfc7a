//! SQLite schema for the job store, applied once per connection.

use rusqlite::{Connection, Result as SqliteResult};

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 1;

/// Creates the schema if it is not already present and enables the
/// write-ahead journal required by §4.1 for durable backing stores.
pub fn initialize_schema(conn: &Connection) -> SqliteResult<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    let current_version: i32 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |row| {
            row.get(0)
        })
        .unwrap_or(0);

    if current_version < 1 {
        apply_v1_schema(conn)?;
        conn.execute("INSERT INTO schema_version (version) VALUES (1)", [])?;
    }

    Ok(())
}

fn apply_v1_schema(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS jobs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            external_id TEXT,
            platform TEXT NOT NULL,
            url TEXT NOT NULL,
            url_hash TEXT NOT NULL UNIQUE,
            fuzzy_hash TEXT,
            title TEXT NOT NULL,
            company TEXT NOT NULL,
            location TEXT,
            salary_min INTEGER,
            salary_max INTEGER,
            salary_currency TEXT NOT NULL DEFAULT 'USD',
            remote_type TEXT,
            visa_sponsorship INTEGER,
            easy_apply INTEGER NOT NULL DEFAULT 0,
            jd_markdown TEXT,
            jd_raw TEXT,
            match_score REAL,
            match_reasoning TEXT,
            key_requirements TEXT,
            red_flags TEXT,
            status TEXT NOT NULL DEFAULT 'new',
            decision_type TEXT,
            source TEXT NOT NULL,
            source_priority INTEGER NOT NULL DEFAULT 3,
            is_processed INTEGER NOT NULL DEFAULT 0,
            scraped_at TEXT NOT NULL,
            filtered_at TEXT,
            decided_at TEXT,
            applied_at TEXT,
            UNIQUE (platform, external_id)
        );

        CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status);
        CREATE INDEX IF NOT EXISTS idx_jobs_fuzzy_hash ON jobs(fuzzy_hash);
        CREATE INDEX IF NOT EXISTS idx_jobs_company ON jobs(company);
        CREATE INDEX IF NOT EXISTS idx_jobs_is_processed ON jobs(is_processed);
        CREATE INDEX IF NOT EXISTS idx_jobs_scraped_at ON jobs(scraped_at);

        CREATE TABLE IF NOT EXISTS applications (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            job_id INTEGER NOT NULL UNIQUE REFERENCES jobs(id),
            resume_path TEXT,
            cover_letter_path TEXT,
            status TEXT NOT NULL DEFAULT 'pending',
            error_message TEXT,
            attempts INTEGER NOT NULL DEFAULT 0,
            submitted_at TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS resumes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            job_id INTEGER NOT NULL REFERENCES jobs(id),
            pdf_path TEXT NOT NULL,
            html_content TEXT,
            highlights TEXT,
            tailoring_notes TEXT,
            generated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_resumes_job_id ON resumes(job_id);

        CREATE TABLE IF NOT EXISTS runs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            started_at TEXT NOT NULL DEFAULT (datetime('now')),
            completed_at TEXT,
            jobs_scraped INTEGER NOT NULL DEFAULT 0,
            jobs_filtered INTEGER NOT NULL DEFAULT 0,
            jobs_matched INTEGER NOT NULL DEFAULT 0,
            jobs_auto_applied INTEGER NOT NULL DEFAULT 0,
            jobs_pending_decision INTEGER NOT NULL DEFAULT 0,
            jobs_failed INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'running'
        );

        CREATE TABLE IF NOT EXISTS blacklist (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            entry_type TEXT NOT NULL,
            value TEXT NOT NULL,
            reason TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE (entry_type, value)
        );

        CREATE TABLE IF NOT EXISTS log_entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            level TEXT NOT NULL,
            component TEXT NOT NULL,
            message TEXT NOT NULL,
            details TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_log_entries_created_at ON log_entries(created_at);
        ",
    )
}

pub fn is_initialized(conn: &Connection) -> bool {
    conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='schema_version'",
        [],
        |row| row.get::<_, i64>(0),
    )
    .map(|count| count > 0)
    .unwrap_or(false)
}
