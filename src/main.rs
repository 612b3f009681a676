//! Quiz battle binary entrypoint wiring REST, WebSocket, SSE and storage layers.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::{Context, bail};
use axum::Router;
use quiz_battle_back::{
    config::AppConfig,
    dao::{
        battle_store::{BattleStore, memory::InMemoryBattleStore},
        storage::StorageError,
    },
    routes,
    services::{leaderboard_service, question_generator::QuestionGenerator, storage_supervisor},
    state::AppState,
};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config =
        AppConfig::load().with_generator_endpoint(env::var("QUESTION_GENERATOR_URL").ok());
    let generator = build_generator(&config)?;
    let app_state = AppState::new(config, generator);

    let backend = env::var("STORAGE_BACKEND").unwrap_or_else(|_| "mongo".into());
    match backend.as_str() {
        "memory" => {
            info!("using in-memory battle store");
            let store = InMemoryBattleStore::new();
            tokio::spawn(storage_supervisor::run(app_state.clone(), move || {
                let store: Arc<dyn BattleStore> = Arc::new(store.clone());
                async move { Ok::<_, StorageError>(store) }
            }));
        }
        #[cfg(feature = "mongo-store")]
        "mongo" => {
            use quiz_battle_back::dao::battle_store::mongodb::{MongoBattleStore, MongoConfig};

            let uri =
                env::var("MONGO_URI").unwrap_or_else(|_| "mongodb://localhost:27017".into());
            let db_name = env::var("MONGO_DB").ok();
            tokio::spawn(storage_supervisor::run(app_state.clone(), move || {
                let uri = uri.clone();
                let db_name = db_name.clone();
                async move {
                    let config = MongoConfig::from_uri(&uri, db_name.as_deref()).await?;
                    let store: Arc<dyn BattleStore> =
                        Arc::new(MongoBattleStore::connect(config).await?);
                    Ok::<_, StorageError>(store)
                }
            }));
        }
        other => bail!("unsupported STORAGE_BACKEND `{other}`"),
    }

    tokio::spawn(leaderboard_service::run_refresher(app_state.clone()));

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

#[cfg(feature = "question-generator")]
fn build_generator(config: &AppConfig) -> anyhow::Result<Option<Arc<dyn QuestionGenerator>>> {
    use quiz_battle_back::services::question_generator::HttpQuestionGenerator;

    let Some(endpoint) = config.generator.endpoint.as_deref() else {
        info!("no question generator configured; generated rooms are disabled");
        return Ok(None);
    };
    let generator = HttpQuestionGenerator::new(endpoint, config.generator.request_timeout)
        .context("building question generator client")?;
    info!(endpoint, "question generator configured");
    Ok(Some(Arc::new(generator)))
}

#[cfg(not(feature = "question-generator"))]
fn build_generator(config: &AppConfig) -> anyhow::Result<Option<Arc<dyn QuestionGenerator>>> {
    if config.generator.endpoint.is_some() {
        tracing::warn!("question generator endpoint ignored: built without the `question-generator` feature");
    }
    Ok(None)
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: quiz_battle_back::state::SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
