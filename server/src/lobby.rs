//! Lobbies group players into matches and gate the waiting -> playing ->
//! finished lifecycle. The [`LobbyManager`] holds the authoritative
//! `LobbyId -> Lobby` and `PlayerId -> LobbyId` tables behind one lock,
//! with a full lifecycle on top of that flat map: host election, ready
//! gating and an owned simulation per match.

use std::collections::HashMap;
use std::sync::Arc;

use protocol::{LobbyId, LobbyInfo, LobbyState, MemberInfo, PlayerId};
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::session::Player;
use crate::simulation::{PlayerSetup, Simulation};

/// One member's mutable seat within a lobby.
struct Member {
    player: Arc<Player>,
}

/// A single match-in-waiting (or in-progress, or finished).
pub struct Lobby {
    pub id: LobbyId,
    pub name: String,
    pub host_id: PlayerId,
    pub max_players: u8,
    pub state: LobbyState,
    members: Vec<Member>,
    simulation: Option<Arc<Simulation>>,
    cancel: Option<CancellationToken>,
}

impl Lobby {
    fn new(id: LobbyId, name: String, host: Arc<Player>, max_players: u8) -> Self {
        let host_id = host.id.clone();
        Lobby {
            id,
            name,
            host_id,
            max_players,
            state: LobbyState::Waiting,
            members: vec![Member { player: host }],
            simulation: None,
            cancel: None,
        }
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn is_full(&self) -> bool {
        self.members.len() >= self.max_players as usize
    }

    pub fn members(&self) -> impl Iterator<Item = &Arc<Player>> {
        self.members.iter().map(|m| &m.player)
    }

    pub fn can_start(&self) -> bool {
        self.state == LobbyState::Waiting
            && self.members.len() >= 2
            && self.members.iter().all(|m| m.player.ready())
    }

    /// Broadcasts an envelope to every current member. Per-member failures
    /// (a writer task already gone) are isolated.
    pub fn broadcast(&self, envelope: &protocol::Envelope) {
        for member in &self.members {
            member.player.send(envelope.clone());
        }
    }

    pub fn broadcast_payload(&self, kind: &str, payload: &impl serde::Serialize) {
        match protocol::Envelope::new(kind, payload) {
            Ok(envelope) => self.broadcast(&envelope),
            Err(err) => tracing::error!(?err, kind, "failed to build broadcast envelope"),
        }
    }

    /// Snapshot used for `lobby_created`/`lobby_update`/listings.
    pub fn info(&self) -> LobbyInfo {
        LobbyInfo {
            lobby_id: self.id.clone(),
            name: self.name.clone(),
            host_id: self.host_id.clone(),
            max_players: self.max_players,
            state: self.state,
            members: self
                .members
                .iter()
                .map(|m| MemberInfo {
                    player_id: m.player.id.clone(),
                    name: m.player.name(),
                    ready: m.player.ready(),
                    slot: m.player.slot(),
                })
                .collect(),
        }
    }

    pub fn simulation(&self) -> Option<Arc<Simulation>> {
        self.simulation.clone()
    }
}

/// The narrow callback surface a `Simulation` uses to reach back into its
/// owning lobby — broadcast and end-of-match notification only, never a
/// full `Lobby` reference.
#[derive(Clone)]
pub enum MatchSink {
    Live(Arc<RwLock<Lobby>>),
    Detached,
}

impl MatchSink {
    fn new(lobby: Arc<RwLock<Lobby>>) -> Self {
        MatchSink::Live(lobby)
    }

    pub async fn broadcast_payload(&self, kind: &str, payload: &impl serde::Serialize) {
        if let MatchSink::Live(lobby) = self {
            lobby.read().await.broadcast_payload(kind, payload);
        }
    }

    /// Marks the owning lobby Finished; idempotent.
    pub async fn finish(&self) {
        if let MatchSink::Live(lobby) = self {
            let mut guard = lobby.write().await;
            guard.state = LobbyState::Finished;
            guard.cancel.take();
        }
    }

    /// A sink with nowhere to broadcast, for exercising `Simulation` without
    /// a real lobby/session stack underneath it.
    #[cfg(test)]
    pub fn detached_for_test() -> Self {
        MatchSink::Detached
    }
}

/// Authoritative registry of all lobbies.
pub struct LobbyManager {
    lobbies: Mutex<HashMap<LobbyId, Arc<RwLock<Lobby>>>>,
    index: Mutex<HashMap<PlayerId, LobbyId>>,
}

impl Default for LobbyManager {
    fn default() -> Self {
        LobbyManager {
            lobbies: Mutex::new(HashMap::new()),
            index: Mutex::new(HashMap::new()),
        }
    }
}

/// What the caller should do after a mutating lobby operation.
pub struct JoinOutcome {
    pub lobby: Arc<RwLock<Lobby>>,
}

impl LobbyManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// `CreateLobby`: fails if the host is already seated somewhere.
    pub async fn create_lobby(
        &self,
        host: Arc<Player>,
        name: String,
        max_players: u8,
    ) -> Result<Arc<RwLock<Lobby>>, &'static str> {
        let max_players = max_players.clamp(2, 4);
        let mut index = self.index.lock().await;
        if index.contains_key(&host.id) {
            return Err("You are already in a lobby");
        }
        let id = new_lobby_id();
        let lobby = Arc::new(RwLock::new(Lobby::new(id.clone(), name, host.clone(), max_players)));
        self.lobbies.lock().await.insert(id.clone(), lobby.clone());
        index.insert(host.id.clone(), id);
        Ok(lobby)
    }

    /// `JoinLobby`: fails if already seated, the lobby isn't Waiting, or it's full.
    pub async fn join_lobby(
        &self,
        player: Arc<Player>,
        lobby_id: &str,
    ) -> Result<JoinOutcome, &'static str> {
        let mut index = self.index.lock().await;
        if index.contains_key(&player.id) {
            return Err("You are already in a lobby");
        }
        let lobby = {
            let lobbies = self.lobbies.lock().await;
            lobbies.get(lobby_id).cloned().ok_or("No such lobby")?
        };
        {
            let mut guard = lobby.write().await;
            if guard.state != LobbyState::Waiting {
                return Err("Lobby is not accepting new players");
            }
            if guard.is_full() {
                return Err("Lobby is full");
            }
            guard.members.push(Member { player: player.clone() });
        }
        index.insert(player.id.clone(), lobby_id.to_string());
        Ok(JoinOutcome { lobby })
    }

    /// `LeaveLobby`: re-elects the host if needed, deletes the lobby if it
    /// empties out. Returns the lobby if it survives, so the caller can
    /// broadcast `lobby_update`.
    pub async fn leave_lobby(&self, player_id: &str) -> Option<Arc<RwLock<Lobby>>> {
        let mut index = self.index.lock().await;
        let lobby_id = index.remove(player_id)?;
        let lobby = {
            let lobbies = self.lobbies.lock().await;
            lobbies.get(&lobby_id).cloned()
        }?;

        let emptied = {
            let mut guard = lobby.write().await;
            guard.members.retain(|m| m.player.id != player_id);
            if guard.members.is_empty() {
                true
            } else {
                if guard.host_id == player_id {
                    guard.host_id = guard.members[0].player.id.clone();
                }
                false
            }
        };

        if emptied {
            self.stop_and_remove(&lobby_id).await;
            None
        } else {
            Some(lobby)
        }
    }

    async fn stop_and_remove(&self, lobby_id: &str) {
        if let Some(lobby) = self.lobbies.lock().await.remove(lobby_id) {
            let mut guard = lobby.write().await;
            guard.state = LobbyState::Finished;
            if let Some(token) = guard.cancel.take() {
                token.cancel();
            }
        }
    }

    pub async fn lobby_of(&self, player_id: &str) -> Option<Arc<RwLock<Lobby>>> {
        let lobby_id = self.index.lock().await.get(player_id).cloned()?;
        self.lobbies.lock().await.get(&lobby_id).cloned()
    }

    /// Fallback cleanup for lobbies whose members all disconnected without
    /// their socket's disconnect path running to completion (process crash,
    /// forceful termination).
    pub async fn sweep_dead_lobbies(&self) {
        let dead: Vec<LobbyId> = {
            let lobbies = self.lobbies.lock().await;
            let mut dead = Vec::new();
            for (id, lobby) in lobbies.iter() {
                let guard = lobby.read().await;
                if guard.state != LobbyState::Playing && guard.members.iter().all(|m| !m.player.is_alive()) {
                    dead.push(id.clone());
                }
            }
            dead
        };
        for id in dead {
            tracing::info!(lobby_id = %id, "sweeping dead lobby");
            for player_id in self.member_ids_of(&id).await {
                self.index.lock().await.remove(&player_id);
            }
            self.stop_and_remove(&id).await;
        }
    }

    async fn member_ids_of(&self, lobby_id: &str) -> Vec<PlayerId> {
        let Some(lobby) = self.lobbies.lock().await.get(lobby_id).cloned() else {
            return Vec::new();
        };
        lobby.read().await.members.iter().map(|m| m.player.id.clone()).collect()
    }

    /// `ListLobbies`: snapshot of all Waiting lobbies, for discovery.
    pub async fn list_waiting(&self) -> Vec<LobbyInfo> {
        let lobbies = self.lobbies.lock().await;
        let mut infos = Vec::new();
        for lobby in lobbies.values() {
            let guard = lobby.read().await;
            if guard.state == LobbyState::Waiting {
                infos.push(guard.info());
            }
        }
        infos
    }

    /// `Start()`: assigns slots from join order, constructs the `Simulation`
    /// and spawns its tick loop under a fresh cancellation token.
    pub async fn start(&self, lobby: &Arc<RwLock<Lobby>>) -> Result<(), &'static str> {
        let mut guard = lobby.write().await;
        if !guard.can_start() {
            return Err("Cannot start game: not all players ready or not enough players");
        }

        let mut setups = Vec::with_capacity(guard.members.len());
        for (slot, member) in guard.members.iter().enumerate() {
            member.player.set_slot(Some(slot as u8));
            setups.push(PlayerSetup {
                slot: slot as u8,
                player_id: member.player.id.clone(),
                name: member.player.name(),
            });
        }

        let members: Vec<Arc<Player>> = guard.members.iter().map(|m| m.player.clone()).collect();
        let sink = MatchSink::new(lobby.clone());
        let cancel = CancellationToken::new();
        let simulation = Arc::new(Simulation::new(setups, members, sink, cancel.clone()));

        guard.state = LobbyState::Playing;
        guard.simulation = Some(simulation.clone());
        guard.cancel = Some(cancel.clone());
        drop(guard);

        tokio::spawn(async move {
            simulation.run().await;
        });
        Ok(())
    }
}

fn new_lobby_id() -> LobbyId {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lobby_ids_are_eight_hex_chars() {
        let id = new_lobby_id();
        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn manager_starts_with_no_lobbies() {
        let manager = LobbyManager::new();
        assert!(tokio_test::block_on(manager.list_waiting()).is_empty());
    }
}
