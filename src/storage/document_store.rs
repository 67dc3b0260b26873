use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use rusqlite::Connection;
use serde_json::Value as JsonValue;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::db::repositories::document_repository::{
    DocWeekRow, DocumentRepository, TeamMemberRow,
};
use crate::db::repositories::entry_repository::EntryRepository;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::roster::{RootDocument, WeekRecord};
use crate::models::settings::BackendKind;
use crate::storage::StorageAdapter;

/// Transactional document store: a `root` singleton, one `weeks` row per week
/// and one `teamMembers` row per `(week, player)`, backed by SQLite.
///
/// The database is opened lazily on a blocking thread; every operation awaits
/// that open (and its schema upgrade) before touching any table.
pub struct DocumentStoreAdapter {
    path: PathBuf,
    pool: OnceCell<DbPool>,
    closed: AtomicBool,
}

impl DocumentStoreAdapter {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            pool: OnceCell::new(),
            closed: AtomicBool::new(false),
        }
    }

    async fn pool(&self) -> AppResult<DbPool> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(AppError::adapter_init(
                BackendKind::DocumentStore.as_str(),
                "document store has been closed",
            ));
        }

        let path = self.path.clone();
        let pool = self
            .pool
            .get_or_try_init(|| async move {
                info!(target: "app::storage", db_path = %path.display(), "opening document store");
                tokio::task::spawn_blocking(move || DbPool::new(path))
                    .await
                    .map_err(|err| {
                        AppError::adapter_init(
                            BackendKind::DocumentStore.as_str(),
                            format!("open task failed: {err}"),
                        )
                    })?
            })
            .await?;
        Ok(pool.clone())
    }

    async fn run_blocking<T, F>(&self, task: F) -> AppResult<T>
    where
        T: Send + 'static,
        F: FnOnce(DbPool) -> AppResult<T> + Send + 'static,
    {
        let pool = self.pool().await?;
        tokio::task::spawn_blocking(move || task(pool))
            .await
            .map_err(|err| AppError::other(format!("document store task failed: {err}")))?
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl StorageAdapter for DocumentStoreAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::DocumentStore
    }

    async fn ready(&self) -> AppResult<()> {
        self.pool().await.map(|_| ())
    }

    async fn close(&self) -> AppResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        info!(target: "app::storage", db_path = %self.path.display(), "document store closed");
        Ok(())
    }

    async fn get_raw(&self, key: &str) -> AppResult<Option<String>> {
        let key = key.to_string();
        self.run_blocking(move |pool| {
            let row = pool
                .with_connection(|conn| EntryRepository::document_store().get(conn, &key))?;
            Ok(row.map(|row| row.value))
        })
        .await
    }

    async fn set_raw(&self, key: &str, value: String) -> AppResult<()> {
        let key = key.to_string();
        self.run_blocking(move |pool| {
            pool.with_connection(|conn| {
                EntryRepository::document_store().upsert(conn, &key, &value)
            })
        })
        .await
    }

    async fn remove(&self, key: &str) -> AppResult<()> {
        let key = key.to_string();
        self.run_blocking(move |pool| {
            pool.with_connection(|conn| EntryRepository::document_store().delete(conn, &key))
        })
        .await
    }

    async fn get_all_raw(&self) -> AppResult<BTreeMap<String, String>> {
        self.run_blocking(|pool| {
            let rows = pool.with_connection(|conn| EntryRepository::document_store().list(conn))?;
            Ok(rows.into_iter().map(|row| (row.key, row.value)).collect())
        })
        .await
    }

    async fn clear(&self) -> AppResult<()> {
        self.run_blocking(|pool| {
            transactional(&pool, |conn| {
                DocumentRepository::delete_all(conn)?;
                EntryRepository::document_store().delete_all(conn)?;
                Ok(())
            })
        })
        .await?;
        debug!(target: "app::storage", "document store cleared");
        Ok(())
    }

    async fn read_root_raw(&self) -> AppResult<Option<JsonValue>> {
        self.run_blocking(|pool| pool.with_connection(read_document))
            .await?
            .map(|document| serde_json::to_value(&document).map_err(AppError::from))
            .transpose()
    }

    async fn write_root(&self, document: &RootDocument) -> AppResult<()> {
        let document = document.clone();
        let week_count = document.weeks.len();
        self.run_blocking(move |pool| {
            transactional(&pool, |conn| write_document_rows(conn, &document))
        })
        .await?;
        debug!(target: "app::storage", week_count, "document store root committed");
        Ok(())
    }

    /// Replace one week's rows and the root pointer in a single transaction.
    async fn write_week(&self, document: &RootDocument, week_number: u32) -> AppResult<()> {
        if !document.weeks.contains_key(&week_number) {
            return self.write_root(document).await;
        }
        let document = document.clone();
        self.run_blocking(move |pool| {
            transactional(&pool, |conn| {
                if DocumentRepository::get_root(conn)?.is_none() {
                    return write_document_rows(conn, &document);
                }
                if let Some(record) = document.weeks.get(&week_number) {
                    write_week_rows(conn, week_number, record)?;
                }
                DocumentRepository::upsert_root(conn, &document.version, document.current_week)
            })
        })
        .await?;
        debug!(target: "app::storage", week_number, "document store week committed");
        Ok(())
    }
}

/// All-or-nothing commit. Failures are surfaced as transaction errors and
/// nothing from the attempt stays visible.
fn transactional<F>(pool: &DbPool, callback: F) -> AppResult<()>
where
    F: FnOnce(&Connection) -> AppResult<()>,
{
    pool.with_transaction(|tx| callback(tx))
        .map_err(|err| match err {
            AppError::Transaction { .. } => err,
            other => AppError::transaction(other.to_string()),
        })
}

fn write_document_rows(conn: &Connection, document: &RootDocument) -> AppResult<()> {
    for (week_number, record) in &document.weeks {
        write_week_rows(conn, *week_number, record)?;
    }
    DocumentRepository::delete_weeks_not_in(conn, &document.week_numbers())?;
    DocumentRepository::upsert_root(conn, &document.version, document.current_week)
}

fn write_week_rows(conn: &Connection, week_number: u32, record: &WeekRecord) -> AppResult<()> {
    let row = DocWeekRow::from_record(week_number, record)?;
    DocumentRepository::upsert_week(conn, &row)?;

    let members = record
        .team_members
        .iter()
        .enumerate()
        .map(|(position, member)| TeamMemberRow::from_member(week_number, position, member))
        .collect::<AppResult<Vec<_>>>()?;
    DocumentRepository::replace_members(conn, week_number, &members)
}

fn read_document(conn: &Connection) -> AppResult<Option<RootDocument>> {
    let Some(root) = DocumentRepository::get_root(conn)? else {
        return Ok(None);
    };

    let mut weeks = BTreeMap::new();
    for row in DocumentRepository::list_weeks(conn)? {
        let week_number = row.week_number;
        let members = DocumentRepository::members_for_week(conn, week_number)?;
        weeks.insert(week_number, row.into_record(members)?);
    }

    Ok(Some(RootDocument {
        version: root.version,
        current_week: root.current_week,
        weeks,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::roster::{AddedAt, TeamMember};
    use crate::services::normalizer::default_document;
    use tempfile::tempdir;

    #[tokio::test]
    async fn operations_wait_for_lazy_open() {
        let dir = tempdir().expect("temp dir");
        let adapter = DocumentStoreAdapter::new(dir.path().join("docs.sqlite"));

        assert!(!adapter.has_root_data().await.unwrap());
        adapter.ready().await.expect("ready");
        assert!(adapter.path().exists());
    }

    #[tokio::test]
    async fn week_write_replaces_team_member_records() {
        let dir = tempdir().expect("temp dir");
        let adapter = DocumentStoreAdapter::new(dir.path().join("docs.sqlite"));

        let mut document = default_document();
        if let Some(record) = document.weeks.get_mut(&1) {
            record.team_members = vec![
                TeamMember {
                    player_id: "a".into(),
                    added_at: AddedAt::Week(1),
                },
                TeamMember {
                    player_id: "b".into(),
                    added_at: AddedAt::Timestamp("2025-01-01T00:00:00Z".into()),
                },
            ];
        }
        adapter.write_week(&document, 1).await.unwrap();
        assert_eq!(member_ids(&adapter, 1).await, vec!["a", "b"]);

        if let Some(record) = document.weeks.get_mut(&1) {
            record.team_members.remove(0);
        }
        adapter.write_week(&document, 1).await.unwrap();
        assert_eq!(member_ids(&adapter, 1).await, vec!["b"]);
    }

    #[tokio::test]
    async fn week_write_leaves_other_week_rows_alone() {
        let dir = tempdir().expect("temp dir");
        let adapter = DocumentStoreAdapter::new(dir.path().join("docs.sqlite"));

        let mut document = default_document();
        let frozen = document.weeks[&1].clone();
        document.weeks.insert(2, frozen.clone());
        document.current_week = 2;
        adapter.write_root(&document).await.unwrap();

        let mut stale = document.clone();
        if let Some(record) = stale.weeks.get_mut(&1) {
            record.captain = Some("stale".into());
        }
        if let Some(record) = stale.weeks.get_mut(&2) {
            record.captain = Some("fresh".into());
        }
        adapter.write_week(&stale, 2).await.unwrap();

        let stored = adapter.get_root_data().await.unwrap();
        assert_eq!(stored.weeks[&1].captain, None);
        assert_eq!(stored.weeks[&2].captain.as_deref(), Some("fresh"));
        assert_eq!(stored.current_week, 2);
    }

    async fn member_ids(adapter: &DocumentStoreAdapter, week_number: u32) -> Vec<String> {
        let document = adapter.get_root_data().await.unwrap();
        document.weeks[&week_number]
            .team_members
            .iter()
            .map(|member| member.player_id.clone())
            .collect()
    }

    #[tokio::test]
    async fn closed_store_rejects_operations() {
        let dir = tempdir().expect("temp dir");
        let adapter = DocumentStoreAdapter::new(dir.path().join("docs.sqlite"));
        adapter.ready().await.unwrap();
        adapter.close().await.unwrap();

        let result = adapter.get_raw("anything").await;
        assert!(matches!(result, Err(AppError::AdapterInit { .. })));
    }
}
