use std::time::SystemTime;

use tracing::debug;

use crate::{
    dao::models::AnswerLedgerEntryEntity,
    dto::{
        format_system_time,
        practice::{PracticeAnswerRequest, PracticeAnswerResponse},
    },
    error::ServiceError,
    state::SharedState,
};

/// Append a solo practice answer to the ledger.
pub async fn record_answer(
    state: &SharedState,
    request: PracticeAnswerRequest,
) -> Result<PracticeAnswerResponse, ServiceError> {
    let store = state.require_battle_store().await?;
    let entry = AnswerLedgerEntryEntity::practice(
        request.user_id,
        request.is_correct,
        request.time_taken,
        SystemTime::now(),
    );
    store.append_ledger_entry(entry.clone()).await?;
    debug!(user_id = %entry.user_id, is_correct = entry.is_correct, "practice answer recorded");

    Ok(PracticeAnswerResponse {
        id: entry.id,
        user_id: entry.user_id,
        is_correct: entry.is_correct,
        time_taken: entry.time_taken,
        created_at: format_system_time(entry.created_at),
    })
}
