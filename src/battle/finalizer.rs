//! Final results of a completed room.

use std::{sync::Arc, time::{Duration, SystemTime}};

use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    battle::{
        ranking::{self, Standing},
        scoring,
    },
    dao::{
        battle_store::BattleStore,
        models::BattleResultEntity,
        storage::{StorageError, StorageResult},
    },
    state::room::BattleRoom,
};

/// One result row per participant, in rank order.
pub fn compute_results(room: &BattleRoom, now: SystemTime) -> Vec<BattleResultEntity> {
    let total_questions = room.total_questions() as u32;
    ranking::rank(Standing::from_room(room))
        .into_iter()
        .filter_map(|(rank, standing)| {
            let participant = room.participant(standing.user_id)?;
            Some(BattleResultEntity {
                id: Uuid::new_v4(),
                battle_room_id: room.id,
                user_id: participant.user_id,
                username: participant.username.clone(),
                final_score: participant.score,
                rank,
                total_correct: standing.total_correct,
                total_questions,
                accuracy_percentage: scoring::percentage(standing.total_correct, total_questions),
                time_bonus: participant.time_bonus(),
                created_at: now,
            })
        })
        .collect()
}

/// Persist results, retrying storage failures. Rows already stored are kept as they are.
pub async fn finalize(
    store: Arc<dyn BattleStore>,
    results: Vec<BattleResultEntity>,
    attempts: u32,
    retry_delay: Duration,
) -> StorageResult<()> {
    let room_id = results.first().map(|result| result.battle_room_id);
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match store.save_results(results.clone()).await {
            Ok(()) => {
                info!(room_id = ?room_id, count = results.len(), "battle results saved");
                return Ok(());
            }
            Err(err) if attempt < attempts => {
                warn!(
                    room_id = ?room_id,
                    attempt,
                    error = %err,
                    "failed to save battle results; retrying"
                );
                attempt += 1;
                tokio::time::sleep(retry_delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Results of a finished room, written once and read back afterwards.
pub async fn load_or_finalize(
    store: Arc<dyn BattleStore>,
    room: &BattleRoom,
    attempts: u32,
    retry_delay: Duration,
) -> Result<Vec<BattleResultEntity>, StorageError> {
    let stored = store.list_results(room.id).await?;
    if stored.len() == room.current_players() {
        return Ok(sorted(stored));
    }

    let computed = compute_results(room, SystemTime::now());
    finalize(store.clone(), computed, attempts, retry_delay).await?;
    Ok(sorted(store.list_results(room.id).await?))
}

fn sorted(mut results: Vec<BattleResultEntity>) -> Vec<BattleResultEntity> {
    results.sort_by_key(|result| result.rank);
    results
}
