use std::convert::TryFrom;

use chrono::Utc;
use rusqlite::{named_params, Connection, OptionalExtension, Row};

use crate::error::AppResult;
use crate::models::roster::{AddedAt, Player, TeamMember, TeamStats, WeekRecord};

#[derive(Debug, Clone)]
pub struct DocRootRow {
    pub version: String,
    pub current_week: u32,
    pub updated_at: String,
}

impl TryFrom<&Row<'_>> for DocRootRow {
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
pub struct DocWeekRow {
    pub week_number: u32,
    pub players: String,
    pub captain: Option<String>,
    pub vice_captain: Option<String>,
    pub team_stats_total_value: f64,
    pub team_stats_player_count: u32,
    pub team_stats_updated_date: String,
    pub total_team_cost: f64,
    pub is_read_only: bool,
}

impl TryFrom<&Row<'_>> for DocWeekRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            week_number: row.get("week_number")?,
            players: row.get("players")?,
            captain: row.get("captain")?,
            vice_captain: row.get("vice_captain")?,
            team_stats_total_value: row.get("team_stats_total_value")?,
            team_stats_player_count: row.get("team_stats_player_count")?,
            team_stats_updated_date: row.get("team_stats_updated_date")?,
            total_team_cost: row.get("total_team_cost")?,
            is_read_only: row.get("is_read_only")?,
        })
    }
}

impl DocWeekRow {
    pub fn from_record(week_number: u32, record: &WeekRecord) -> AppResult<Self> {
        Ok(Self {
            week_number,
            players: serde_json::to_string(&record.players)?,
            captain: record.captain.clone(),
            vice_captain: record.vice_captain.clone(),
            team_stats_total_value: record.team_stats.total_value,
            team_stats_player_count: record.team_stats.player_count,
            team_stats_updated_date: record.team_stats.updated_date.clone(),
            total_team_cost: record.total_team_cost,
            is_read_only: record.is_read_only,
        })
    }

    pub fn into_record(self, members: Vec<TeamMemberRow>) -> AppResult<WeekRecord> {
        let players: Vec<Player> = serde_json::from_str(&self.players)?;
        let team_members = members
            .into_iter()
            .map(TeamMemberRow::into_member)
            .collect::<AppResult<Vec<_>>>()?;

        Ok(WeekRecord {
            players,
            captain: self.captain,
            vice_captain: self.vice_captain,
            team_members,
            team_stats: TeamStats {
                total_value: self.team_stats_total_value,
                player_count: self.team_stats_player_count,
                updated_date: self.team_stats_updated_date,
            },
            total_team_cost: self.total_team_cost,
            is_read_only: self.is_read_only,
        })
    }
}

#[derive(Debug, Clone)]
pub struct TeamMemberRow {
    pub week_number: u32,
    pub player_id: String,
    pub position: u32,
    pub added_at: String,
}

impl TryFrom<&Row<'_>> for TeamMemberRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            week_number: row.get("week_number")?,
            player_id: row.get("player_id")?,
            position: row.get("position")?,
            added_at: row.get("added_at")?,
        })
    }
}

impl TeamMemberRow {
    pub fn from_member(week_number: u32, position: usize, member: &TeamMember) -> AppResult<Self> {
        Ok(Self {
            week_number,
            player_id: member.player_id.clone(),
            position: u32::try_from(position).unwrap_or(u32::MAX),
            added_at: serde_json::to_string(&member.added_at)?,
        })
    }

    pub fn into_member(self) -> AppResult<TeamMember> {
        let added_at: AddedAt = serde_json::from_str(&self.added_at)?;
        Ok(TeamMember {
            player_id: self.player_id,
            added_at,
        })
    }
}

/// Row access for the `doc_root`, `doc_weeks` and `doc_team_members` stores.
pub struct DocumentRepository;

impl DocumentRepository {
    pub fn get_root(conn: &Connection) -> AppResult<Option<DocRootRow>> {
        let mut stmt =
            conn.prepare("SELECT version, current_week, updated_at FROM doc_root WHERE id = 1")?;

        let row = stmt
            .query_row([], |row| DocRootRow::try_from(row))
            .optional()?;

        Ok(row)
    }

    pub fn upsert_root(conn: &Connection, version: &str, current_week: u32) -> AppResult<()> {
        conn.execute(
            r#"
                INSERT INTO doc_root (id, version, current_week, updated_at)
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

    pub fn list_weeks(conn: &Connection) -> AppResult<Vec<DocWeekRow>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT week_number, players, captain, vice_captain, team_stats_total_value,
                   team_stats_player_count, team_stats_updated_date, total_team_cost, is_read_only
            FROM doc_weeks
            ORDER BY week_number ASC
            "#,
        )?;

        let rows = stmt
            .query_map([], |row| DocWeekRow::try_from(row))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    pub fn upsert_week(conn: &Connection, row: &DocWeekRow) -> AppResult<()> {
        conn.execute(
            r#"
                INSERT INTO doc_weeks (
                    week_number, players, captain, vice_captain, team_stats_total_value,
                    team_stats_player_count, team_stats_updated_date, total_team_cost, is_read_only
                ) VALUES (
                    :week_number, :players, :captain, :vice_captain, :total_value,
                    :player_count, :updated_date, :total_team_cost, :is_read_only
                )
                ON CONFLICT(week_number) DO UPDATE SET
                    players = excluded.players,
                    captain = excluded.captain,
                    vice_captain = excluded.vice_captain,
                    team_stats_total_value = excluded.team_stats_total_value,
                    team_stats_player_count = excluded.team_stats_player_count,
                    team_stats_updated_date = excluded.team_stats_updated_date,
                    total_team_cost = excluded.total_team_cost,
                    is_read_only = excluded.is_read_only
            "#,
            named_params! {
                ":week_number": row.week_number,
                ":players": row.players,
                ":captain": row.captain,
                ":vice_captain": row.vice_captain,
                ":total_value": row.team_stats_total_value,
                ":player_count": row.team_stats_player_count,
                ":updated_date": row.team_stats_updated_date,
                ":total_team_cost": row.total_team_cost,
                ":is_read_only": row.is_read_only,
            },
        )?;

        Ok(())
    }

    pub fn delete_weeks_not_in(conn: &Connection, keep: &[u32]) -> AppResult<usize> {
        let existing: Vec<u32> = {
            let mut stmt = conn.prepare("SELECT week_number FROM doc_weeks")?;
            let rows = stmt
                .query_map([], |row| row.get::<_, u32>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };

        let mut deleted = 0;
        for week_number in existing.into_iter().filter(|week| !keep.contains(week)) {
            conn.execute(
                "DELETE FROM doc_team_members WHERE week_number = ?1",
                [week_number],
            )?;
            deleted += conn.execute("DELETE FROM doc_weeks WHERE week_number = ?1", [week_number])?;
        }
        Ok(deleted)
    }

    pub fn members_for_week(conn: &Connection, week_number: u32) -> AppResult<Vec<TeamMemberRow>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT week_number, player_id, position, added_at
            FROM doc_team_members
            WHERE week_number = ?1
            ORDER BY position ASC
            "#,
        )?;

        let rows = stmt
            .query_map([week_number], |row| TeamMemberRow::try_from(row))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    pub fn replace_members(
        conn: &Connection,
        week_number: u32,
        members: &[TeamMemberRow],
    ) -> AppResult<()> {
        conn.execute(
            "DELETE FROM doc_team_members WHERE week_number = ?1",
            [week_number],
        )?;

        let mut stmt = conn.prepare(
            r#"
            INSERT INTO doc_team_members (week_number, player_id, position, added_at)
            VALUES (:week_number, :player_id, :position, :added_at)
            "#,
        )?;

        for member in members {
            stmt.execute(named_params! {
                ":week_number": member.week_number,
                ":player_id": member.player_id,
                ":position": member.position,
                ":added_at": member.added_at,
            })?;
        }

        Ok(())
    }

    pub fn delete_all(conn: &Connection) -> AppResult<()> {
        conn.execute("DELETE FROM doc_team_members", [])?;
        conn.execute("DELETE FROM doc_weeks", [])?;
        conn.execute("DELETE FROM doc_root", [])?;
        Ok(())
    }
}
