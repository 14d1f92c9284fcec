use axum::{extract::State, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use posterquiz::{
    config::{ConfigPatch, GameConfig, ServerConfig},
    game::Game,
    media,
    protocol::ServerMessage,
    ws,
};

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {e}");
        }
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "posterquiz=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting poster quiz...");

    let server_config = ServerConfig::from_env();

    let game_config = GameConfig {
        filters: std::env::var("FILTERS").unwrap_or_default(),
        ..Default::default()
    };

    let records = media::load_records(server_config.media_data_path.as_deref()).await;

    let game = match Game::new(game_config, records) {
        Ok(game) => Arc::new(game),
        Err(e) => {
            tracing::error!(error = %e, "invalid initial configuration");
            std::process::exit(1);
        }
    };

    // The engine loop runs for the lifetime of the process.
    tokio::spawn(game.clone().run());

    let app = Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/phase", get(phase_signal))
        .route(
            "/configuration",
            get(get_configuration).post(post_configuration),
        )
        .fallback_service(ServeDir::new(&server_config.static_dir))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(game);

    let addr = SocketAddr::from(([0, 0, 0, 0], server_config.port));
    tracing::info!("Listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

/// Polling fallback for clients that are not on the WebSocket.
async fn phase_signal(State(game): State<Arc<Game>>) -> Json<ServerMessage> {
    Json(ServerMessage::Phase {
        signal: game.phase_signal().await,
    })
}

async fn get_configuration(State(game): State<Arc<Game>>) -> Json<GameConfig> {
    Json(game.configuration().await)
}

#[derive(Debug, Deserialize)]
struct ConfigureRequest {
    config: ConfigPatch,
    #[serde(default)]
    immediate: bool,
}

#[derive(Debug, Serialize)]
struct ConfigureResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

/// Stage a configuration change. Failures go back to the caller only; they
/// are never broadcast to players.
async fn post_configuration(
    State(game): State<Arc<Game>>,
    Json(request): Json<ConfigureRequest>,
) -> Json<ConfigureResponse> {
    match game.configure(request.config, request.immediate).await {
        Ok(()) => Json(ConfigureResponse {
            status: "success",
            message: None,
        }),
        Err(e) => {
            tracing::error!(error = %e, "configuration failed");
            Json(ConfigureResponse {
                status: "failed",
                message: Some(e.to_string()),
            })
        }
    }
}
