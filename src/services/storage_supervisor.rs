use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{battle_store::BattleStore, storage::StorageError},
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

fn backoff(delay: Duration) -> Duration {
    (delay * 2).min(MAX_DELAY)
}

/// Connect to the battle store and keep the shared state in degraded mode while it is unreachable.
///
/// Rooms fail their mutations with `storage_unavailable` while degraded, so the
/// supervisor only has to flip the flag; nothing is replayed on recovery.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn BattleStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        let store = match connect().await {
            Ok(store) => store,
            Err(err) => {
                warn!(error = %err, retry_in_ms = delay.as_millis() as u64, "battle store connection attempt failed");
                sleep(delay).await;
                delay = backoff(delay);
                continue;
            }
        };

        state.set_battle_store(store.clone()).await;
        info!("battle store connected; leaving degraded mode");
        delay = INITIAL_DELAY;

        watch_health(&state, store.as_ref()).await;

        warn!("battle store lost; dropping it and reconnecting from scratch");
        state.clear_battle_store().await;
        sleep(delay).await;
        delay = backoff(delay);
    }
}

/// Poll the store until it fails and cannot be revived in place.
async fn watch_health(state: &SharedState, store: &dyn BattleStore) {
    loop {
        if store.health_check().await.is_ok() {
            if state.is_degraded() {
                info!("battle store healthy again; leaving degraded mode");
                state.update_degraded(false).await;
            }
            sleep(HEALTH_POLL_INTERVAL).await;
            continue;
        }

        if !reconnect_in_place(state, store).await {
            return;
        }
        state.update_degraded(false).await;
        sleep(HEALTH_POLL_INTERVAL).await;
    }
}

async fn reconnect_in_place(state: &SharedState, store: &dyn BattleStore) -> bool {
    let mut delay = INITIAL_DELAY;
    for attempt in 0..MAX_RECONNECT_ATTEMPTS {
        match store.try_reconnect().await {
            Ok(()) => {
                info!(attempt, "battle store reconnected after failed health check");
                return true;
            }
            Err(err) => {
                if attempt == 0 {
                    warn!(attempt, error = %err, "battle store reconnect failed; entering degraded mode");
                    state.update_degraded(true).await;
                } else {
                    warn!(attempt, error = %err, "battle store reconnect attempt failed");
                }
                sleep(delay).await;
                delay = backoff(delay);
            }
        }
    }

    warn!("exhausted battle store reconnect attempts; staying in degraded mode");
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig, dao::battle_store::memory::InMemoryBattleStore, state::AppState,
    };

    #[tokio::test(start_paused = true)]
    async fn installs_store_and_tracks_outages() {
        let state = AppState::new(AppConfig::default(), None);
        let memory = InMemoryBattleStore::new();
        let handle = {
            let memory = memory.clone();
            tokio::spawn(run(state.clone(), move || {
                let store: Arc<dyn BattleStore> = Arc::new(memory.clone());
                async move { Ok(store) }
            }))
        };

        let mut degraded = state.degraded_watcher();
        degraded.wait_for(|flag| !*flag).await.unwrap();
        assert!(!state.is_degraded());

        memory.set_offline(true);
        degraded.wait_for(|flag| *flag).await.unwrap();

        memory.set_offline(false);
        degraded.wait_for(|flag| !*flag).await.unwrap();
        assert!(state.battle_store().await.is_some());

        handle.abort();
    }
}
