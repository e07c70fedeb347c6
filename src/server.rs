use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use std::net::{SocketAddr, TcpListener};
use tokio::sync::watch;
use tracing::info;

use crate::models::dto::DashboardView;
use crate::reducer::SnapshotReducer;
use crate::state::DashboardState;

#[derive(Clone)]
struct AppState {
    updates: watch::Receiver<DashboardState>,
    reducer: SnapshotReducer,
}

pub fn router(updates: watch::Receiver<DashboardState>, reducer: SnapshotReducer) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/api/dashboard", get(dashboard))
        .with_state(AppState { updates, reducer })
}

async fn home() -> &'static str {
    "DNS tunnel dashboard running"
}

async fn dashboard(State(app): State<AppState>) -> Json<DashboardView> {
    let view = DashboardView::build(&app.updates.borrow(), &app.reducer);
    Json(view)
}

/// Serves the latest published view until the process exits.
pub async fn serve(
    addr: SocketAddr,
    updates: watch::Receiver<DashboardState>,
    reducer: SnapshotReducer,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr)?;
    serve_listener(listener, updates, reducer).await
}

pub async fn serve_listener(
    listener: TcpListener,
    updates: watch::Receiver<DashboardState>,
    reducer: SnapshotReducer,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!(action = "listen", component = "server", addr = %listener.local_addr()?, "Dashboard view served");
    axum::Server::from_tcp(listener)?
        .serve(router(updates, reducer).into_make_service())
        .await?;
    Ok(())
}
