//! HTTP + WebSocket transport.
//!
//! - `GET /ws` upgrades to a WebSocket carrying one JSON message per text frame.
//! - Every other path is served from the static client asset directory.

use std::path::Path;

use anyhow::Context;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use showdown_shared::{
    config::ServerConfig,
    net::{decode_client, encode},
};
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tracing::{debug, info, warn};

use crate::server::SessionHandle;

/// Builds the application router.
pub fn router(handle: SessionHandle, public_dir: impl AsRef<Path>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .fallback_service(ServeDir::new(public_dir.as_ref()))
        .with_state(handle)
}

/// Binds the configured address and serves until the listener fails.
pub async fn serve(cfg: &ServerConfig, handle: SessionHandle) -> anyhow::Result<()> {
    let listener = TcpListener::bind(cfg.listen_addr())
        .await
        .with_context(|| format!("bind {}", cfg.listen_addr()))?;
    serve_on(listener, handle, &cfg.public_dir).await
}

/// Serves on an already bound listener.
pub async fn serve_on(
    listener: TcpListener,
    handle: SessionHandle,
    public_dir: &str,
) -> anyhow::Result<()> {
    let local = listener.local_addr().context("local_addr")?;
    info!(%local, %public_dir, "Server running");

    axum::serve(listener, router(handle, public_dir))
        .await
        .context("serve")
}

async fn ws_handler(ws: WebSocketUpgrade, State(handle): State<SessionHandle>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, handle))
}

async fn handle_socket(socket: WebSocket, handle: SessionHandle) {
    let (conn, mut outbound) = match handle.connect().await {
        Ok(opened) => opened,
        Err(e) => {
            warn!(error = %e, "Could not register connection");
            return;
        }
    };
    let (mut sender, mut receiver) = socket.split();

    let writer = tokio::spawn(async move {
        while let Some(msg) = outbound.recv().await {
            let text = match encode(&msg) {
                Ok(text) => text,
                Err(e) => {
                    warn!(conn = %conn, error = %e, "Dropping unencodable message");
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(frame) = receiver.next().await {
        match frame {
            Ok(Message::Text(text)) => match decode_client(text.as_str()) {
                Ok(msg) => {
                    if handle.client(conn, msg).await.is_err() {
                        break;
                    }
                }
                Err(e) => debug!(conn = %conn, error = %e, "Dropping malformed frame"),
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(conn = %conn, error = %e, "Socket error");
                break;
            }
        }
    }

    let _ = handle.disconnect(conn).await;
    writer.abort();
}
