use std::convert::TryFrom;

use chrono::Utc;
use rusqlite::{named_params, Connection, OptionalExtension, Row};

use crate::error::AppResult;

#[derive(Debug, Clone)]
pub struct RemoteRootRow {
    pub version: String,
    pub current_week: u32,
    pub updated_at: String,
}

impl TryFrom<&Row<'_>> for RemoteRootRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            version: row.get("version")?,
            current_week: row.get("current_week")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct RemoteWeekRow {
    pub week_number: u32,
    pub payload: String,
    pub updated_at: String,
}

impl TryFrom<&Row<'_>> for RemoteWeekRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            week_number: row.get("week_number")?,
            payload: row.get("payload")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Rows behind the remote endpoint: a root singleton plus one JSON payload per week.
pub struct RelationalRepository;

impl RelationalRepository {
    pub fn get_root(conn: &Connection) -> AppResult<Option<RemoteRootRow>> {
        let mut stmt = conn
            .prepare("SELECT version, current_week, updated_at FROM remote_root WHERE id = 1")?;

        let row = stmt
            .query_row([], |row| RemoteRootRow::try_from(row))
            .optional()?;

        Ok(row)
    }

    pub fn upsert_root(conn: &Connection, version: &str, current_week: u32) -> AppResult<()> {
        conn.execute(
            r#"
                INSERT INTO remote_root (id, version, current_week, updated_at)
                VALUES (1, :version, :current_week, :updated_at)
                ON CONFLICT(id) DO UPDATE SET
                    version = excluded.version,
                    current_week = excluded.current_week,
                    updated_at = excluded.updated_at
            "#,
            named_params! {
                ":version": version,
                ":current_week": current_week,
                ":updated_at": Utc::now().to_rfc3339(),
            },
        )?;
        Ok(())
    }

    pub fn delete_root(conn: &Connection) -> AppResult<()> {
        conn.execute("DELETE FROM remote_weeks", [])?;
        conn.execute("DELETE FROM remote_root", [])?;
        Ok(())
    }

    pub fn list_weeks(conn: &Connection) -> AppResult<Vec<RemoteWeekRow>> {
        let mut stmt = conn.prepare(
            "SELECT week_number, payload, updated_at FROM remote_weeks ORDER BY week_number ASC",
        )?;

        let rows = stmt
            .query_map([], |row| RemoteWeekRow::try_from(row))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    pub fn get_week(conn: &Connection, week_number: u32) -> AppResult<Option<RemoteWeekRow>> {
        let mut stmt = conn.prepare(
            "SELECT week_number, payload, updated_at FROM remote_weeks WHERE week_number = ?1",
        )?;

        let row = stmt
            .query_row([week_number], |row| RemoteWeekRow::try_from(row))
            .optional()?;

        Ok(row)
    }

    pub fn insert_week(conn: &Connection, week_number: u32, payload: &str) -> AppResult<()> {
        conn.execute(
            r#"
                INSERT INTO remote_weeks (week_number, payload, updated_at)
                VALUES (:week_number, :payload, :updated_at)
            "#,
            named_params! {
                ":week_number": week_number,
                ":payload": payload,
                ":updated_at": Utc::now().to_rfc3339(),
            },
        )?;
        Ok(())
    }

    pub fn upsert_week(conn: &Connection, week_number: u32, payload: &str) -> AppResult<()> {
        conn.execute(
            r#"
                INSERT INTO remote_weeks (week_number, payload, updated_at)
                VALUES (:week_number, :payload, :updated_at)
                ON CONFLICT(week_number) DO UPDATE SET
                    payload = excluded.payload,
                    updated_at = excluded.updated_at
            "#,
            named_params! {
                ":week_number": week_number,
                ":payload": payload,
                ":updated_at": Utc::now().to_rfc3339(),
            },
        )?;
        Ok(())
    }

    pub fn delete_week(conn: &Connection, week_number: u32) -> AppResult<usize> {
        let deleted = conn.execute(
            "DELETE FROM remote_weeks WHERE week_number = ?1",
            [week_number],
        )?;
        Ok(deleted)
    }

    pub fn delete_all_weeks(conn: &Connection) -> AppResult<usize> {
        let deleted = conn.execute("DELETE FROM remote_weeks", [])?;
        Ok(deleted)
    }
}
