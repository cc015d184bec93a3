use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::registry::SessionRegistry;
use crate::types::StreamItem;

/// Embedded dashboard server: `GET /rides` lists active ride ids, and
/// `GET /ws/{ride_id}` upgrades to a WebSocket that pushes every tracking
/// update for that ride as a JSON text frame. One example subscriber
/// transport; the registry API itself stays transport-agnostic.
pub async fn start_dashboard(registry: Arc<SessionRegistry>, port: u16) {
    let app = Router::new()
        .route("/rides", get(rides_handler))
        .route("/ws/:ride_id", get(ws_handler))
        .with_state(registry);

    let addr = format!("0.0.0.0:{}", port);
    log::info!("[dashboard] serving at http://{}", addr);

    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            log::warn!("[dashboard] failed to bind {}: {}", addr, e);
            return;
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        log::warn!("[dashboard] server error: {}", e);
    }
}

async fn rides_handler(State(registry): State<Arc<SessionRegistry>>) -> Json<Vec<String>> {
    Json(registry.active_rides().await)
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(ride_id): Path<String>,
    State(registry): State<Arc<SessionRegistry>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, registry, ride_id))
}

async fn handle_socket(mut socket: WebSocket, registry: Arc<SessionRegistry>, ride_id: String) {
    let mut updates = match registry.subscribe(&ride_id).await {
        Ok(updates) => updates,
        Err(e) => {
            let payload = serde_json::json!({ "error": e.to_string() }).to_string();
            let _ = socket.send(Message::Text(payload)).await;
            return;
        }
    };

    while let Some(item) = updates.recv().await {
        let payload = match item {
            StreamItem::Update(update) => match serde_json::to_string(&update) {
                Ok(json) => json,
                Err(_) => continue,
            },
            StreamItem::Gap { missed } => {
                serde_json::json!({ "ride_id": ride_id, "gap": missed }).to_string()
            }
        };
        if socket.send(Message::Text(payload)).await.is_err() {
            // Client disconnected
            return;
        }
    }

    // Session ended: close the socket cleanly
    let _ = socket.send(Message::Close(None)).await;
}
