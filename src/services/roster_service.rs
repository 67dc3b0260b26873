use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::error::AppResult;
use crate::models::roster::{
    Player, PlayerCreateInput, PlayerUpdateInput, RootDocument, WeekSummary, WeekView,
};
use crate::services::{roster_ops, week_snapshot};
use crate::storage::StorageAdapter;

/// Loads the document before every command and persists the result after
/// every mutation. The viewed week defaults to `currentWeek`.
pub struct RosterService {
    adapter: Arc<dyn StorageAdapter>,
    viewed_week: Mutex<Option<u32>>,
}

impl RosterService {
    pub fn new(adapter: Arc<dyn StorageAdapter>) -> Self {
        Self {
            adapter,
            viewed_week: Mutex::new(None),
        }
    }

    pub fn adapter(&self) -> &Arc<dyn StorageAdapter> {
        &self.adapter
    }

    pub async fn document(&self) -> AppResult<RootDocument> {
        self.adapter.get_root_data().await
    }

    pub async fn current_view(&self) -> AppResult<WeekView> {
        let viewed = self.viewed_week.lock().await;
        let document = self.document().await?;
        let week = target_week(&document, *viewed);
        roster_ops::go_to_week(&document, week)
    }

    pub async fn add_player(&self, input: PlayerCreateInput) -> AppResult<Player> {
        let viewed = self.viewed_week.lock().await;
        let document = self.document().await?;
        let week = target_week(&document, *viewed);

        let (next, player) = roster_ops::add_player(&document, week, input)?;
        self.persist_week(&next, week).await?;
        Ok(player)
    }

    pub async fn update_player(
        &self,
        player_id: &str,
        patch: PlayerUpdateInput,
    ) -> AppResult<Player> {
        let viewed = self.viewed_week.lock().await;
        let document = self.document().await?;
        let week = target_week(&document, *viewed);

        let (next, player) = roster_ops::update_player(&document, week, player_id, patch)?;
        self.persist_week(&next, week).await?;
        Ok(player)
    }

    pub async fn delete_player(&self, player_id: &str) -> AppResult<WeekView> {
        let viewed = self.viewed_week.lock().await;
        let document = self.document().await?;
        let week = target_week(&document, *viewed);

        let next = roster_ops::delete_player(&document, week, player_id)?;
        let persisted = self.persist_week(&next, week).await?;
        roster_ops::go_to_week(&persisted, week)
    }

    pub async fn toggle_have(&self, player_id: &str) -> AppResult<Player> {
        let viewed = self.viewed_week.lock().await;
        let document = self.document().await?;
        let week = target_week(&document, *viewed);

        let (next, player) = roster_ops::toggle_have(&document, week, player_id)?;
        self.persist_week(&next, week).await?;
        Ok(player)
    }

    pub async fn set_captain(&self, player_id: &str) -> AppResult<WeekView> {
        let viewed = self.viewed_week.lock().await;
        let document = self.document().await?;
        let week = target_week(&document, *viewed);

        let next = roster_ops::set_captain(&document, week, player_id)?;
        let persisted = self.persist_week(&next, week).await?;
        roster_ops::go_to_week(&persisted, week)
    }

    pub async fn set_vice_captain(&self, player_id: &str) -> AppResult<WeekView> {
        let viewed = self.viewed_week.lock().await;
        let document = self.document().await?;
        let week = target_week(&document, *viewed);

        let next = roster_ops::set_vice_captain(&document, week, player_id)?;
        let persisted = self.persist_week(&next, week).await?;
        roster_ops::go_to_week(&persisted, week)
    }

    /// Freeze the current week, open the next one and switch the view to it.
    pub async fn create_new_week(&self) -> AppResult<WeekView> {
        let mut viewed = self.viewed_week.lock().await;
        let document = self.document().await?;

        let next = week_snapshot::create_new_week(&document)?;
        let persisted = self.persist(&next).await?;
        *viewed = None;
        roster_ops::go_to_week(&persisted, persisted.current_week)
    }

    pub async fn go_to_week(&self, week_number: u32) -> AppResult<WeekView> {
        let mut viewed = self.viewed_week.lock().await;
        let document = self.document().await?;

        let view = roster_ops::go_to_week(&document, week_number)?;
        *viewed = if view.is_current { None } else { Some(week_number) };
        debug!(target: "app::roster", week_number, read_only = view.is_read_only, "viewing week");
        Ok(view)
    }

    pub async fn week_summary(&self, week_number: Option<u32>) -> AppResult<WeekSummary> {
        let viewed = self.viewed_week.lock().await;
        let document = self.document().await?;
        let week = week_number.unwrap_or_else(|| target_week(&document, *viewed));
        roster_ops::week_summary(&document, week)
    }

    async fn persist(&self, document: &RootDocument) -> AppResult<RootDocument> {
        self.adapter.set_root_data(document).await
    }

    async fn persist_week(&self, document: &RootDocument, week: u32) -> AppResult<RootDocument> {
        self.adapter.set_week_data(document, week).await
    }
}

fn target_week(document: &RootDocument, viewed: Option<u32>) -> u32 {
    viewed
        .filter(|week| document.weeks.contains_key(week))
        .unwrap_or(document.current_week)
}
