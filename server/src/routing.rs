//! Per-connection message dispatch: decodes envelopes off one socket and
//! routes them by tag to the lobby manager or a running simulation.

use std::sync::Arc;

use axum::extract::ws::WebSocket;
use futures_util::StreamExt;
use protocol::{
    client_tags, server_tags, CreateLobbyPayload, Envelope, GameCommandPayload, GameStartingPayload,
    JoinLobbyPayload, LobbyLeftPayload, LobbyListPayload, LobbyState, SetNamePayload, SetReadyPayload,
    WelcomePayload,
};

use crate::lobby::LobbyManager;
use crate::session::{new_player_id, Player, ReadError, SessionReader};

/// Owns one accepted connection end to end: welcome, dispatch loop, then
/// disconnect cleanup. There is no separate handshake beyond the `welcome`
/// envelope sent immediately after the upgrade.
pub async fn handle_connection(socket: WebSocket, lobbies: Arc<LobbyManager>) {
    let (sink, stream) = socket.split();
    let player_id = new_player_id();
    let player = Arc::new(Player::new(player_id.clone(), "Player".to_string(), sink));
    let mut reader = SessionReader::new(stream);

    player.send_payload(server_tags::WELCOME, &WelcomePayload { player_id: player_id.clone() });

    loop {
        match reader.read_message().await {
            Ok(envelope) => dispatch(&player, &lobbies, envelope).await,
            Err(ReadError::ClosedNormally) => break,
            Err(ReadError::ClosedAbnormally(reason)) => {
                tracing::debug!(player_id = %player.id, reason, "connection closed abnormally");
                break;
            }
        }
    }

    disconnect(&player, &lobbies).await;
}

async fn dispatch(player: &Arc<Player>, lobbies: &LobbyManager, envelope: Envelope) {
    match envelope.kind.as_str() {
        client_tags::SET_NAME => {
            let Ok(payload) = envelope.decode::<SetNamePayload>() else {
                player.send_error("malformed set_name payload");
                return;
            };
            player.set_name(payload.name);
        }

        client_tags::LIST_LOBBIES => {
            let snapshot = lobbies.list_waiting().await;
            player.send_payload(server_tags::LOBBY_LIST, &LobbyListPayload { lobbies: snapshot });
        }

        client_tags::CREATE_LOBBY => {
            let Ok(payload) = envelope.decode::<CreateLobbyPayload>() else {
                player.send_error("malformed create_lobby payload");
                return;
            };
            match lobbies.create_lobby(player.clone(), payload.name, payload.max_players).await {
                Ok(lobby) => {
                    let info = lobby.read().await.info();
                    player.send_payload(server_tags::LOBBY_CREATED, &info);
                }
                Err(message) => player.send_error(message),
            }
        }

        client_tags::JOIN_LOBBY => {
            let Ok(payload) = envelope.decode::<JoinLobbyPayload>() else {
                player.send_error("malformed join_lobby payload");
                return;
            };
            match lobbies.join_lobby(player.clone(), &payload.lobby_id).await {
                Ok(outcome) => {
                    let info = outcome.lobby.read().await.info();
                    player.send_payload(server_tags::LOBBY_JOINED, &info);
                    outcome.lobby.read().await.broadcast_payload(server_tags::LOBBY_UPDATE, &info);
                }
                Err(message) => player.send_error(message),
            }
        }

        client_tags::LEAVE_LOBBY => {
            let Some(current) = lobbies.lobby_of(&player.id).await else {
                player.send_error("You are not in a lobby");
                return;
            };
            let lobby_id = current.read().await.id.clone();

            let survivor = lobbies.leave_lobby(&player.id).await;
            player.set_slot(None);
            player.send_payload(server_tags::LOBBY_LEFT, &LobbyLeftPayload { lobby_id });

            if let Some(lobby) = survivor {
                let info = lobby.read().await.info();
                lobby.read().await.broadcast_payload(server_tags::LOBBY_UPDATE, &info);
            }
        }

        client_tags::SET_READY => {
            let Ok(payload) = envelope.decode::<SetReadyPayload>() else {
                player.send_error("malformed set_ready payload");
                return;
            };
            player.set_ready(payload.ready);
            match lobbies.lobby_of(&player.id).await {
                Some(lobby) => {
                    let info = lobby.read().await.info();
                    lobby.read().await.broadcast_payload(server_tags::LOBBY_UPDATE, &info);
                }
                None => player.send_error("You are not in a lobby"),
            }
        }

        client_tags::START_GAME => {
            let Some(lobby) = lobbies.lobby_of(&player.id).await else {
                player.send_error("You are not in a lobby");
                return;
            };
            let is_host = lobby.read().await.host_id == player.id;
            if !is_host {
                player.send_error("Only the host can start the game");
                return;
            }
            match lobbies.start(&lobby).await {
                Ok(()) => {
                    let info = lobby.read().await.info();
                    let members: Vec<Arc<Player>> = lobby.read().await.members().cloned().collect();
                    for member in &members {
                        let your_slot = member.slot().unwrap_or(0);
                        member.send_payload(server_tags::GAME_STARTING, &GameStartingPayload { lobby: info.clone(), your_slot });
                    }
                }
                Err(message) => player.send_error(message),
            }
        }

        client_tags::GAME_COMMAND => {
            let Ok(payload) = envelope.decode::<GameCommandPayload>() else {
                player.send_error("malformed game_command payload");
                return;
            };
            let Some(lobby) = lobbies.lobby_of(&player.id).await else { return };
            let guard = lobby.read().await;
            if guard.state != LobbyState::Playing {
                return;
            }
            let Some(simulation) = guard.simulation() else { return };
            drop(guard);
            let Some(slot) = player.slot() else { return };
            simulation.enqueue_command(slot, payload.command);
        }

        other => {
            tracing::debug!(kind = other, "unrecognised message type");
            player.send_error(format!("unrecognised message type: {other}"));
        }
    }
}

/// Runs exactly once per connection, whichever way it ended.
async fn disconnect(player: &Arc<Player>, lobbies: &LobbyManager) {
    player.close();
    if let Some(lobby) = lobbies.leave_lobby(&player.id).await {
        let info = lobby.read().await.info();
        lobby.read().await.broadcast_payload(server_tags::LOBBY_UPDATE, &info);
    }
}
