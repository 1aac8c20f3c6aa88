mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Query, State, WebSocketUpgrade},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use nook_api::middleware::verify_token;
use nook_api::state::{AppState, AppStateInner};
use nook_gateway::{Relay, handle_connection};

use crate::config::Config;

#[derive(Clone)]
struct ServerState {
    relay: Relay,
    jwt_secret: String,
}

#[derive(Debug, Deserialize)]
struct GatewayQuery {
    token: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nook=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    let db = Arc::new(nook_db::Database::open(&config.db_path)?);
    let relay = Relay::with_database(db, config.relay());

    let app_state: AppState = Arc::new(AppStateInner {
        relay: relay.clone(),
        jwt_secret: config.jwt_secret.clone(),
    });

    let ws_route = Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(ServerState {
            relay,
            jwt_secret: config.jwt_secret.clone(),
        });

    let app = Router::new()
        .merge(nook_api::router(app_state))
        .merge(ws_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Nook relay listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Admit the caller at the upgrade: browsers cannot set headers on a
/// websocket handshake, so the token travels in the query string.
async fn ws_upgrade(
    State(state): State<ServerState>,
    Query(query): Query<GatewayQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(claims) = verify_token(&state.jwt_secret, &query.token) else {
        warn!("Rejected gateway upgrade with invalid token");
        return StatusCode::UNAUTHORIZED.into_response();
    };

    ws.on_upgrade(move |socket| handle_connection(socket, state.relay, claims.sub, claims.username))
}
