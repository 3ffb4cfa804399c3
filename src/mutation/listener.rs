use std::io;
use std::net::{AddrParseError, SocketAddr};
use std::thread::{self, JoinHandle};

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use bevy::log::{debug, error, info, warn};
use crossbeam_channel::Sender;
use thiserror::Error;

use super::{enqueue, parse_command, MutationError, SceneCommand};

#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("invalid listener address `{addr}`: {source}")]
    Address {
        addr: String,
        #[source]
        source: AddrParseError,
    },
    #[error("failed to start listener thread: {0}")]
    Thread(#[source] io::Error),
    #[error("failed to start listener runtime: {0}")]
    Runtime(#[source] io::Error),
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("listener stopped: {0}")]
    Serve(#[source] io::Error),
}

#[derive(Clone)]
struct ListenerState {
    sender: Sender<SceneCommand>,
}

/// Starts the side channel on its own OS thread with a single-threaded runtime.
/// Only the address is validated here; bind failures are logged from the thread.
pub fn spawn_listener(
    addr: &str,
    sender: Sender<SceneCommand>,
) -> Result<JoinHandle<()>, ListenerError> {
    let addr: SocketAddr = addr.parse().map_err(|source| ListenerError::Address {
        addr: addr.to_string(),
        source,
    })?;

    thread::Builder::new()
        .name("mutation-listener".to_string())
        .spawn(move || {
            if let Err(error) = serve(addr, sender) {
                error!("{}; continuing without live edits", error);
            }
        })
        .map_err(ListenerError::Thread)
}

fn serve(addr: SocketAddr, sender: Sender<SceneCommand>) -> Result<(), ListenerError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(ListenerError::Runtime)?;

    runtime.block_on(async move {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|source| ListenerError::Bind { addr, source })?;
        info!("Listening for scene edits on ws://{addr}/ and http://{addr}/command");
        axum::serve(listener, router(sender))
            .await
            .map_err(ListenerError::Serve)
    })
}

fn router(sender: Sender<SceneCommand>) -> Router {
    Router::new()
        .route("/", get(websocket_handler))
        .route("/command", post(command_handler))
        .with_state(ListenerState { sender })
}

fn accept(state: &ListenerState, text: &str) -> Result<(), MutationError> {
    let command = parse_command(text)?;
    debug!("Queued {:?}", command);
    enqueue(&state.sender, command)
}

async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<ListenerState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: ListenerState) {
    debug!("Mutation client connected");
    while let Some(message) = socket.recv().await {
        let text = match message {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => continue,
        };

        if let Err(error) = accept(&state, &text) {
            warn!("Rejected command {:?}: {}", text, error);
            if socket.send(Message::Text(error.to_string())).await.is_err() {
                break;
            }
        }
    }
    debug!("Mutation client disconnected");
}

async fn command_handler(State(state): State<ListenerState>, body: String) -> impl IntoResponse {
    match accept(&state, &body) {
        Ok(()) => (StatusCode::ACCEPTED, "queued".to_string()),
        Err(error @ MutationError::Malformed(_)) => (StatusCode::BAD_REQUEST, error.to_string()),
        Err(error) => (StatusCode::SERVICE_UNAVAILABLE, error.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutation::MutationQueue;

    #[test]
    fn invalid_address_is_rejected_up_front() {
        let queue = MutationQueue::new(4);
        assert!(matches!(
            spawn_listener("localhost:eighty", queue.sender()),
            Err(ListenerError::Address { .. })
        ));
    }

    #[test]
    fn accepted_text_lands_in_the_queue() {
        let queue = MutationQueue::new(4);
        let state = ListenerState {
            sender: queue.sender(),
        };
        accept(&state, r#"{"action":"add_moon","planet":"Mars"}"#).unwrap();
        assert!(matches!(
            accept(&state, "{}"),
            Err(MutationError::Malformed(_))
        ));
        assert_eq!(
            queue.drain(),
            [SceneCommand::AddMoon {
                planet: "Mars".into()
            }]
        );
    }

    #[test]
    fn http_route_maps_errors_to_status_codes() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let queue = MutationQueue::new(1);
        let state = ListenerState {
            sender: queue.sender(),
        };
        let status = |body: &str| {
            let response = runtime
                .block_on(command_handler(State(state.clone()), body.to_string()))
                .into_response();
            response.status()
        };

        let command = r#"{"action":"add_moon","planet":"Mars"}"#;
        assert_eq!(status(command), StatusCode::ACCEPTED);
        assert_eq!(status("not json"), StatusCode::BAD_REQUEST);
        assert_eq!(status(command), StatusCode::SERVICE_UNAVAILABLE);
    }
}
