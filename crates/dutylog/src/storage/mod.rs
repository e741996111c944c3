//! Storage layer for dutylog.
//!
//! This module provides `SQLite`-based persistent storage for duty logs and
//! their incidents. Writes that target "the active duty for a name" report
//! an [`UpdateOutcome`] so callers can tell a missing duty apart from a
//! write that matched but changed nothing.

pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde::Serialize;
use tracing::{debug, info};

use crate::duty::{DutyLog, DutyStatus, Incident, NewDuty, Post};
use crate::error::{Error, Result};

const SELECT_DUTY_COLUMNS: &str =
    "SELECT id, name, badge_number, post, start_time, end_time, status FROM duties";

/// The result of a conditional write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateOutcome {
    /// Number of duties the write's filter matched.
    pub matched: usize,
    /// Number of rows the write actually changed.
    pub modified: usize,
}

impl UpdateOutcome {
    /// Nothing matched.
    #[must_use]
    pub fn unmatched() -> Self {
        Self::default()
    }

    /// One duty matched and `modified` rows changed.
    #[must_use]
    pub fn matched_one(modified: usize) -> Self {
        Self {
            matched: 1,
            modified,
        }
    }

    /// Whether the filter matched anything.
    #[must_use]
    pub fn is_matched(&self) -> bool {
        self.matched > 0
    }

    /// Whether the write changed anything.
    #[must_use]
    pub fn is_modified(&self) -> bool {
        self.modified > 0
    }
}

/// Criteria for narrowing a duty listing.
///
/// An empty filter matches every duty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DutyFilter {
    /// Only duties in this state.
    pub status: Option<DutyStatus>,
    /// Case-insensitive substring of the name, badge number or post.
    pub search: Option<String>,
    /// Only duties started on or after the start of this day (UTC).
    pub from: Option<NaiveDate>,
    /// Only duties started on or before the end of this day (UTC).
    pub to: Option<NaiveDate>,
}

impl DutyFilter {
    /// Filter for active duties only.
    #[must_use]
    pub fn active() -> Self {
        Self {
            status: Some(DutyStatus::Active),
            ..Self::default()
        }
    }

    /// Whether this filter matches everything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Whether `duty` contains the search term in its name, badge number or
    /// post. Always true when there is no term.
    ///
    /// Matching is a literal substring test with Unicode case folding, so
    /// `%` and `_` have no special meaning.
    #[must_use]
    pub fn matches_search(&self, duty: &DutyLog) -> bool {
        let Some(term) = self.search.as_deref().map(str::trim) else {
            return true;
        };
        if term.is_empty() {
            return true;
        }

        let term = term.to_lowercase();
        [duty.name.as_str(), duty.badge_number.as_str(), duty.post.as_str()]
            .into_iter()
            .any(|field| field.to_lowercase().contains(&term))
    }

    /// Build the `WHERE` clause and its parameters for the status and date
    /// criteria. The search term is applied by [`Self::matches_search`].
    fn to_sql(&self) -> (String, Vec<String>) {
        let mut clauses = Vec::new();
        let mut values = Vec::new();

        if let Some(status) = self.status {
            values.push(status.as_str().to_string());
            clauses.push(format!("status = ?{}", values.len()));
        }

        if let Some(from) = self.from {
            values.push(format_timestamp(from.and_time(chrono::NaiveTime::MIN).and_utc()));
            clauses.push(format!("start_time >= ?{}", values.len()));
        }

        if let Some(to) = self.to.and_then(|d| d.succ_opt()) {
            values.push(format_timestamp(to.and_time(chrono::NaiveTime::MIN).and_utc()));
            clauses.push(format!("start_time < ?{}", values.len()));
        }

        if clauses.is_empty() {
            (String::new(), values)
        } else {
            (format!(" WHERE {}", clauses.join(" AND ")), values)
        }
    }
}

/// Aggregate counts over all duties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DutySummary {
    /// Total number of duties ever started.
    pub total_duties: i64,
    /// Duties currently in progress.
    pub active_duties: i64,
    /// Duties that have ended.
    pub completed_duties: i64,
    /// Incidents across all duties.
    pub total_incidents: i64,
}

/// Persistence operations the duty service relies on.
///
/// Every write that targets an officer's active duty filters on
/// `status = 'active'`, so completed duties are never touched.
pub trait DutyStore {
    /// Find the active duty for `name`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be queried.
    fn find_active(&self, name: &str) -> Result<Option<DutyLog>>;

    /// Insert a new active duty and return its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails, including a constraint
    /// violation when `name` already has an active duty.
    fn insert_duty(&self, duty: &NewDuty) -> Result<i64>;

    /// Append an incident to the active duty for `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn push_incident(&self, name: &str, incident: &Incident) -> Result<UpdateOutcome>;

    /// Remove the incident with `incident_id` from the active duty for `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn pull_incident(&self, name: &str, incident_id: &str) -> Result<UpdateOutcome>;

    /// Mark duty `id` completed at `end_time` if it is still active.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn complete_duty(&self, id: i64, end_time: DateTime<Utc>) -> Result<UpdateOutcome>;

    /// List duties matching `filter`, newest start first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be queried.
    fn list_duties(&self, filter: &DutyFilter) -> Result<Vec<DutyLog>>;

    /// Aggregate counts over all duties.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be queried.
    fn summary(&self) -> Result<DutySummary>;
}

/// `SQLite` storage engine for duty logs.
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

impl Storage {
    /// Open or create a storage database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    /// Initializes the schema if this is a new database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        migrations::initialize_schema(&conn)?;

        info!("Database opened successfully at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory storage instance for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get a duty by its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get(&self, id: i64) -> Result<Option<DutyLog>> {
        let row = self
            .conn
            .query_row(
                &format!("{SELECT_DUTY_COLUMNS} WHERE id = ?1"),
                [id],
                DutyRow::read,
            )
            .optional()?;

        row.map(|row| self.with_incidents(row.into_duty()?))
            .transpose()
    }

    /// Count duties in storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM duties", [], |row| row.get(0))?;
        Ok(count)
    }

    fn active_duty_id(conn: &Connection, name: &str) -> Result<Option<i64>> {
        let id = conn
            .query_row(
                "SELECT id FROM duties WHERE name = ?1 AND status = 'active'",
                [name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    fn with_incidents(&self, mut duty: DutyLog) -> Result<DutyLog> {
        let mut stmt = self.conn.prepare_cached(
            r"
            SELECT id, description, time, location, action
            FROM incidents WHERE duty_id = ?1 ORDER BY position ASC
            ",
        )?;

        duty.incidents = stmt
            .query_map([duty.id], |row| {
                Ok(Incident {
                    id: row.get(0)?,
                    description: row.get(1)?,
                    time: row.get(2)?,
                    location: row.get(3)?,
                    action: row.get(4)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(duty)
    }
}

/// A `duties` row as stored, before its text columns are decoded.
struct DutyRow {
    id: i64,
    name: String,
    badge_number: String,
    post: String,
    start_time: String,
    end_time: Option<String>,
    status: String,
}

impl DutyRow {
    fn read(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            badge_number: row.get(2)?,
            post: row.get(3)?,
            start_time: row.get(4)?,
            end_time: row.get(5)?,
            status: row.get(6)?,
        })
    }

    /// Decode into a `DutyLog` without its incidents.
    fn into_duty(self) -> Result<DutyLog> {
        let id = self.id;
        let post = self
            .post
            .parse::<Post>()
            .map_err(|e| Error::corrupt_record(id, e.to_string()))?;
        let start_time = parse_timestamp(id, &self.start_time)?;
        let end_time = self
            .end_time
            .map(|value| parse_timestamp(id, &value))
            .transpose()?;
        let status = self
            .status
            .parse::<DutyStatus>()
            .map_err(|e| Error::corrupt_record(id, e))?;

        Ok(DutyLog {
            id,
            name: self.name,
            badge_number: self.badge_number,
            post,
            start_time,
            end_time,
            status,
            incidents: Vec::new(),
        })
    }
}

impl DutyStore for Storage {
    fn find_active(&self, name: &str) -> Result<Option<DutyLog>> {
        let row = self
            .conn
            .query_row(
                &format!("{SELECT_DUTY_COLUMNS} WHERE name = ?1 AND status = 'active'"),
                [name],
                DutyRow::read,
            )
            .optional()?;

        row.map(|row| self.with_incidents(row.into_duty()?))
            .transpose()
    }

    fn insert_duty(&self, duty: &NewDuty) -> Result<i64> {
        self.conn.execute(
            r"
            INSERT INTO duties (name, badge_number, post, start_time, end_time, status)
            VALUES (?1, ?2, ?3, ?4, NULL, 'active')
            ",
            params![
                duty.name,
                duty.badge_number,
                duty.post.as_str(),
                format_timestamp(duty.start_time),
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        debug!("Inserted duty with id {}", id);
        Ok(id)
    }

    fn push_incident(&self, name: &str, incident: &Incident) -> Result<UpdateOutcome> {
        let tx = self.conn.unchecked_transaction()?;

        let Some(duty_id) = Self::active_duty_id(&tx, name)? else {
            return Ok(UpdateOutcome::unmatched());
        };

        let modified = tx.execute(
            r"
            INSERT OR IGNORE INTO incidents (duty_id, id, position, description, time, location, action)
            VALUES (
                ?1, ?2,
                (SELECT COALESCE(MAX(position), -1) + 1 FROM incidents WHERE duty_id = ?1),
                ?3, ?4, ?5, ?6
            )
            ",
            params![
                duty_id,
                incident.id,
                incident.description,
                incident.time,
                incident.location,
                incident.action,
            ],
        )?;

        tx.commit()?;
        Ok(UpdateOutcome::matched_one(modified))
    }

    fn pull_incident(&self, name: &str, incident_id: &str) -> Result<UpdateOutcome> {
        let tx = self.conn.unchecked_transaction()?;

        let Some(duty_id) = Self::active_duty_id(&tx, name)? else {
            return Ok(UpdateOutcome::unmatched());
        };

        let modified = tx.execute(
            "DELETE FROM incidents WHERE duty_id = ?1 AND id = ?2",
            params![duty_id, incident_id],
        )?;

        tx.commit()?;
        Ok(UpdateOutcome::matched_one(modified))
    }

    fn complete_duty(&self, id: i64, end_time: DateTime<Utc>) -> Result<UpdateOutcome> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM duties WHERE id = ?1)",
            [id],
            |row| row.get(0),
        )?;

        if !exists {
            return Ok(UpdateOutcome::unmatched());
        }

        let modified = self.conn.execute(
            r"
            UPDATE duties SET end_time = ?2, status = 'completed'
            WHERE id = ?1 AND status = 'active'
            ",
            params![id, format_timestamp(end_time)],
        )?;

        Ok(UpdateOutcome::matched_one(modified))
    }

    fn list_duties(&self, filter: &DutyFilter) -> Result<Vec<DutyLog>> {
        let (where_clause, values) = filter.to_sql();
        let mut stmt = self.conn.prepare(&format!(
            "{SELECT_DUTY_COLUMNS}{where_clause} ORDER BY start_time DESC, id DESC"
        ))?;

        let rows = stmt
            .query_map(params_from_iter(values.iter()), DutyRow::read)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut duties = Vec::with_capacity(rows.len());
        for row in rows {
            let duty = row.into_duty()?;
            if filter.matches_search(&duty) {
                duties.push(self.with_incidents(duty)?);
            }
        }
        Ok(duties)
    }

    fn summary(&self) -> Result<DutySummary> {
        let (total_duties, active_duties, completed_duties): (i64, i64, i64) = self.conn.query_row(
            r"
            SELECT COUNT(*),
                   COALESCE(SUM(status = 'active'), 0),
                   COALESCE(SUM(status = 'completed'), 0)
            FROM duties
            ",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        let total_incidents: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM incidents", [], |row| row.get(0))?;

        Ok(DutySummary {
            total_duties,
            active_duties,
            completed_duties,
            total_incidents,
        })
    }
}

/// Timestamps are stored with a fixed precision so that text order is time order.
fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(id: i64, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::corrupt_record(id, format!("bad timestamp {value:?}: {e}")))
}
