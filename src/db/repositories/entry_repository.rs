use std::convert::TryFrom;

use rusqlite::{named_params, Connection, OptionalExtension, Row};

use crate::error::AppResult;

#[derive(Debug, Clone)]
pub struct EntryRow {
    pub key: String,
    pub value: String,
    pub updated_at: String,
}

impl TryFrom<&Row<'_>> for EntryRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            key: row.get("key")?,
            value: row.get("value")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Plain key/value rows. Each store keeps its entries in its own table.
#[derive(Debug, Clone, Copy)]
pub struct EntryRepository {
    table: &'static str,
}

impl EntryRepository {
    pub const fn key_value() -> Self {
        Self {
            table: "key_value_entries",
        }
    }

    pub const fn document_store() -> Self {
        Self {
            table: "doc_entries",
        }
    }

    pub const fn relational() -> Self {
        Self {
            table: "remote_entries",
        }
    }

    pub fn get(&self, conn: &Connection, key: &str) -> AppResult<Option<EntryRow>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT key, value, updated_at FROM {} WHERE key = ?1",
            self.table
        ))?;

        let row = stmt
            .query_row([key], |row| EntryRow::try_from(row))
            .optional()?;

        Ok(row)
    }

    pub fn list(&self, conn: &Connection) -> AppResult<Vec<EntryRow>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT key, value, updated_at FROM {} ORDER BY key ASC",
            self.table
        ))?;

        let rows = stmt
            .query_map([], |row| EntryRow::try_from(row))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    pub fn upsert(&self, conn: &Connection, key: &str, value: &str) -> AppResult<()> {
        conn.execute(
            &format!(
                r#"
                INSERT INTO {} (key, value)
                VALUES (:key, :value)
                ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    updated_at = CURRENT_TIMESTAMP
                "#,
                self.table
            ),
            named_params! {":key": key, ":value": value},
        )?;

        Ok(())
    }

    pub fn delete(&self, conn: &Connection, key: &str) -> AppResult<()> {
        conn.execute(&format!("DELETE FROM {} WHERE key = ?1", self.table), [key])?;
        Ok(())
    }

    pub fn delete_all(&self, conn: &Connection) -> AppResult<usize> {
        let deleted = conn.execute(&format!("DELETE FROM {}", self.table), [])?;
        Ok(deleted)
    }
}
