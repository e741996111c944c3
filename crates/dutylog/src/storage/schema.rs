//! `SQLite` schema definitions for dutylog.
//!
//! This module contains the SQL statements for creating and managing
//! the database schema.

/// SQL statement to create the duties table.
pub const CREATE_DUTIES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS duties (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    badge_number TEXT NOT NULL,
    post TEXT NOT NULL,
    start_time TEXT NOT NULL,
    end_time TEXT,
    status TEXT NOT NULL CHECK (status IN ('active', 'completed'))
)
";

/// SQL statement to create an index on start time for newest-first listing.
pub const CREATE_START_TIME_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_duties_start_time ON duties(start_time DESC)
";

/// SQL statement to create an index for active-duty lookups by name.
pub const CREATE_NAME_STATUS_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_duties_name_status ON duties(name, status)
";

/// SQL statement to create the incidents table.
///
/// Incidents are owned by their duty; `position` keeps report order and the
/// primary key makes incident ids unique within a duty.
pub const CREATE_INCIDENTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS incidents (
    duty_id INTEGER NOT NULL REFERENCES duties(id) ON DELETE CASCADE,
    id TEXT NOT NULL,
    position INTEGER NOT NULL,
    description TEXT NOT NULL,
    time TEXT NOT NULL,
    location TEXT NOT NULL,
    action TEXT NOT NULL,
    PRIMARY KEY (duty_id, id)
)
";

/// SQL statement to create an index on incident order within a duty.
pub const CREATE_INCIDENT_POSITION_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_incidents_position ON incidents(duty_id, position)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// At most one active duty per officer name.
///
/// Added by migration 2 rather than the base schema so that existing
/// databases are checked before the constraint is put in place.
pub const CREATE_ACTIVE_NAME_UNIQUE_INDEX: &str = r"
CREATE UNIQUE INDEX IF NOT EXISTS idx_duties_one_active_per_name
ON duties(name) WHERE status = 'active'
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_DUTIES_TABLE,
    CREATE_START_TIME_INDEX,
    CREATE_NAME_STATUS_INDEX,
    CREATE_INCIDENTS_TABLE,
    CREATE_INCIDENT_POSITION_INDEX,
    CREATE_METADATA_TABLE,
];
