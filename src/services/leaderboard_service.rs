use std::{sync::Arc, time::SystemTime};

use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use crate::{
    battle::leaderboard::{self, LeaderboardBoard},
    dto::leaderboard::{LeaderboardQuery, LeaderboardResponse},
    error::ServiceError,
    state::SharedState,
};

/// Rebuild the leaderboard from the full ledger and cache it.
pub async fn recompute(state: &SharedState) -> Result<Arc<LeaderboardBoard>, ServiceError> {
    let store = state.require_battle_store().await?;
    let ledger = store.list_ledger().await?;
    let profiles = store
        .find_profiles(leaderboard::ledger_users(&ledger))
        .await?;

    let board = Arc::new(LeaderboardBoard {
        generated_at: SystemTime::now(),
        entries: leaderboard::aggregate(&ledger, &profiles),
    });
    debug!(
        ledger_entries = ledger.len(),
        users = board.entries.len(),
        "leaderboard recomputed"
    );
    state.store_leaderboard(board.clone()).await;
    Ok(board)
}

/// Serve the cached board, recomputing when none exists or a refresh is asked for.
pub async fn leaderboard(
    state: &SharedState,
    query: LeaderboardQuery,
) -> Result<LeaderboardResponse, ServiceError> {
    let settings = &state.config().leaderboard;
    let limit = query
        .limit
        .unwrap_or(settings.default_limit)
        .clamp(1, settings.max_limit.max(1));

    let cached = if query.refresh {
        None
    } else {
        state.cached_leaderboard().await
    };
    let board = match cached {
        Some(board) => board,
        None => recompute(state).await?,
    };
    Ok(LeaderboardResponse::from_board(&board, limit))
}

/// Recompute the leaderboard on a fixed interval for the lifetime of the process.
pub async fn run_refresher(state: SharedState) {
    let period = state.config().leaderboard.refresh_interval;
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(interval_secs = period.as_secs(), "leaderboard refresher started");

    loop {
        ticker.tick().await;
        if state.is_degraded() {
            debug!("skipping leaderboard refresh while storage is unavailable");
            continue;
        }
        if let Err(err) = recompute(&state).await {
            warn!(error = %err, "scheduled leaderboard refresh failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use uuid::Uuid;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            battle_store::{BattleStore, memory::InMemoryBattleStore},
            models::{AnswerLedgerEntryEntity, ProfileEntity},
        },
        state::AppState,
    };

    async fn seeded() -> (SharedState, InMemoryBattleStore, Uuid) {
        let state = AppState::new(AppConfig::default(), None);
        let store = InMemoryBattleStore::new();
        state.set_battle_store(Arc::new(store.clone())).await;
        let user = Uuid::new_v4();
        store
            .seed_profiles([ProfileEntity {
                id: user,
                username: Some("grace".into()),
                full_name: None,
            }])
            .await;
        store
            .append_ledger_entry(AnswerLedgerEntryEntity::practice(
                user,
                true,
                12,
                SystemTime::now(),
            ))
            .await
            .unwrap();
        (state, store, user)
    }

    #[tokio::test]
    async fn cached_board_is_served_until_refresh() {
        let (state, store, user) = seeded().await;

        let first = leaderboard(&state, LeaderboardQuery::default()).await.unwrap();
        assert_eq!(first.entries.len(), 1);
        assert_eq!(first.entries[0].user_id, user);
        assert_eq!(first.entries[0].username, "grace");
        assert_eq!(first.entries[0].rank, 1);

        store
            .append_ledger_entry(AnswerLedgerEntryEntity::practice(
                Uuid::new_v4(),
                false,
                30,
                SystemTime::now(),
            ))
            .await
            .unwrap();

        let cached = leaderboard(&state, LeaderboardQuery::default()).await.unwrap();
        assert_eq!(cached.total_users, 1);

        let refreshed = leaderboard(
            &state,
            LeaderboardQuery {
                limit: Some(1),
                refresh: true,
            },
        )
        .await
        .unwrap();
        assert_eq!(refreshed.total_users, 2);
        assert_eq!(refreshed.entries.len(), 1);
        assert_eq!(refreshed.entries[0].user_id, user);
    }

    #[tokio::test(start_paused = true)]
    async fn refresher_fills_the_cache() {
        let (state, _store, _) = seeded().await;
        let task = tokio::spawn(run_refresher(state.clone()));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(state.cached_leaderboard().await.is_some());
        task.abort();
    }
}
