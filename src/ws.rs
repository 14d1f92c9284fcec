//! WebSocket binding: one connection per player/screen.
//!
//! Each socket registers an unbounded channel with the client registry and
//! then pumps two directions in a `select!` loop: registry pushes out,
//! client messages in. Disconnect (or any send failure) unregisters the
//! subscriber; the engine never notices.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::game::Game;
use crate::protocol::{ClientMessage, ServerMessage};

pub async fn ws_handler(ws: WebSocketUpgrade, State(game): State<Arc<Game>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, game))
}

async fn handle_socket(socket: WebSocket, game: Arc<Game>) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    let client_id = game.add_client(tx).await;

    loop {
        tokio::select! {
            push = rx.recv() => {
                let Some(msg) = push else { break };
                match serde_json::to_string(&msg) {
                    Ok(json) => {
                        if sender.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => tracing::error!(error = %e, "could not serialize push"),
                }
            }

            inbound = receiver.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(msg) => handle_message(msg, &game, &client_id).await,
                            Err(e) => {
                                tracing::debug!(error = %e, "unparseable client message");
                                let error = ServerMessage::Error {
                                    code: "PARSE_ERROR".to_string(),
                                    msg: format!("Invalid message format: {e}"),
                                };
                                game.clients().send_to(&client_id, error).await;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::debug!(error = %e, "websocket error");
                        break;
                    }
                }
            }
        }
    }

    game.clients().unregister(&client_id).await;
}

async fn handle_message(msg: ClientMessage, game: &Arc<Game>, client_id: &str) {
    match msg {
        ClientMessage::SubmitAnswer { nickname, answer } => {
            game.submit_answer(&nickname, &answer).await;
        }
        ClientMessage::Completions => {
            let choices = game.completions().await;
            game.clients()
                .send_to(client_id, ServerMessage::Completions { choices })
                .await;
        }
    }
}
