//! Player entities and the process-wide session registry.
//!
//! The registry is the only shared mutable state in the server. Every read
//! or mutation of a player's fields happens while its owner holds the
//! registry lock; the registry itself never performs blocking I/O — outbound
//! traffic is queued onto each session's channel and written by that
//! connection's writer task.

use crate::chat::ChatHistory;
use crate::error::SessionError;
use log::{error, info};
use shared::{
    encode, unix_millis, Direction, Envelope, Platform, PlayerState, MAX_HEALTH, PLATFORMS,
    SPAWN_POINTS,
};
use std::collections::HashMap;
use std::time::Instant;
use tokio::sync::mpsc;

/// One connected, joined player. Lifetime is scoped to the connection's
/// lifetime; the outbound sender is the session's only handle to its socket.
#[derive(Debug)]
pub struct Player {
    pub id: u32,
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub vel_x: f32,
    pub vel_y: f32,
    pub direction: Direction,
    pub health: i32,
    pub last_attack: Option<Instant>,
    pub grounded: bool,
    pub jumping: bool,
    pub crouching: bool,
    pub double_jump: bool,
    pub outbound: mpsc::UnboundedSender<String>,
}

impl Player {
    pub fn new(id: u32, name: String, x: f32, y: f32, outbound: mpsc::UnboundedSender<String>) -> Self {
        Self {
            id,
            name,
            x,
            y,
            vel_x: 0.0,
            vel_y: 0.0,
            direction: Direction::None,
            health: MAX_HEALTH,
            last_attack: None,
            grounded: false,
            jumping: false,
            crouching: false,
            double_jump: true,
            outbound,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0
    }

    /// The public fields exposed in snapshots.
    pub fn state(&self) -> PlayerState {
        PlayerState {
            id: self.id,
            name: self.name.clone(),
            x: self.x,
            y: self.y,
            health: self.health,
            max_health: MAX_HEALTH,
            direction: self.direction,
            is_crouching: self.crouching,
        }
    }

    /// Queues one already-encoded line for this session. A closed channel
    /// means the connection is gone; callers treat that as a send failure.
    pub fn send_line(&self, line: String) -> bool {
        self.outbound.send(line).is_ok()
    }
}

/// Process-wide world state: player map, id counter, static platforms and
/// the chat log. Created at startup, destroyed at shutdown, no persistence.
pub struct Registry {
    pub players: HashMap<u32, Player>,
    pub chat: ChatHistory,
    pub platforms: Vec<Platform>,
    next_player_id: u32,
    max_players: usize,
}

impl Registry {
    pub fn new(max_players: usize) -> Self {
        Self {
            players: HashMap::new(),
            chat: ChatHistory::new(),
            platforms: PLATFORMS.to_vec(),
            next_player_id: 1,
            max_players,
        }
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= self.max_players
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Admits a new player: capacity check and insertion as one atomic step
    /// under the registry lock. Ids increase monotonically for the process
    /// lifetime and are never reused.
    pub fn register(
        &mut self,
        name: String,
        outbound: mpsc::UnboundedSender<String>,
    ) -> Result<u32, SessionError> {
        if self.is_full() {
            return Err(SessionError::Capacity {
                max: self.max_players,
            });
        }

        let id = self.next_player_id;
        self.next_player_id += 1;

        let (x, y) = SPAWN_POINTS[(id as usize - 1) % SPAWN_POINTS.len()];
        let player = Player::new(id, name, x, y, outbound);
        info!("player {} ({}) joined at ({}, {})", id, player.name, x, y);
        self.players.insert(id, player);

        Ok(id)
    }

    /// Removes a player if present. Idempotent: concurrent failure paths may
    /// race to remove the same session.
    pub fn unregister(&mut self, id: u32) -> Option<Player> {
        let removed = self.players.remove(&id);
        if let Some(player) = &removed {
            info!("player {} ({}) left", player.id, player.name);
        }
        removed
    }

    pub fn find(&self, id: u32) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn find_mut(&mut self, id: u32) -> Option<&mut Player> {
        self.players.get_mut(&id)
    }

    /// Builds one immutable world snapshot: all players' public fields, the
    /// most recent chat tail, and a timestamp.
    pub fn snapshot(&self) -> Envelope {
        let mut players: Vec<PlayerState> = self.players.values().map(Player::state).collect();
        players.sort_by_key(|p| p.id);

        Envelope::GameState {
            players,
            chat: self.chat.tail(shared::CHAT_BROADCAST_TAIL),
            timestamp: unix_millis(),
        }
    }

    /// Queues an envelope onto every session's outbound channel, optionally
    /// excluding one player. Failures are left for the owning connection's
    /// teardown path.
    pub fn broadcast(&self, envelope: &Envelope, exclude: Option<u32>) {
        let line = match encode(envelope) {
            Ok(line) => line,
            Err(e) => {
                error!("failed to encode broadcast: {}", e);
                return;
            }
        };

        for (id, player) in &self.players {
            if Some(*id) == exclude {
                continue;
            }
            player.send_line(line.clone());
        }
    }

    /// Snapshot of the current fan-out targets, taken under the lock so
    /// sends can happen outside it.
    pub fn sessions(&self) -> Vec<(u32, mpsc::UnboundedSender<String>)> {
        self.players
            .iter()
            .map(|(id, player)| (*id, player.outbound.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outbound() -> (
        mpsc::UnboundedSender<String>,
        mpsc::UnboundedReceiver<String>,
    ) {
        mpsc::unbounded_channel()
    }

    #[test]
    fn register_assigns_sequential_ids_and_spawns() {
        let mut registry = Registry::new(4);
        let (tx, _rx) = outbound();

        let ann = registry.register("Ann".to_string(), tx.clone()).unwrap();
        let bo = registry.register("Bo".to_string(), tx).unwrap();

        assert_eq!(ann, 1);
        assert_eq!(bo, 2);

        let ann = registry.find(1).unwrap();
        assert_eq!((ann.x, ann.y), SPAWN_POINTS[0]);
        assert_eq!(ann.health, MAX_HEALTH);
        assert!(!ann.grounded);
        assert_eq!(ann.vel_x, 0.0);

        let bo = registry.find(2).unwrap();
        assert_eq!((bo.x, bo.y), SPAWN_POINTS[1]);
    }

    #[test]
    fn register_rejects_when_full() {
        let mut registry = Registry::new(4);
        let (tx, _rx) = outbound();

        for i in 0..4 {
            registry.register(format!("p{}", i), tx.clone()).unwrap();
        }

        let fifth = registry.register("late".to_string(), tx);
        assert!(matches!(fifth, Err(SessionError::Capacity { max: 4 })));
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn ids_are_never_reused() {
        let mut registry = Registry::new(4);
        let (tx, _rx) = outbound();

        let first = registry.register("Ann".to_string(), tx.clone()).unwrap();
        registry.unregister(first);
        let second = registry.register("Bo".to_string(), tx).unwrap();

        assert!(second > first);
    }

    #[test]
    fn unregister_is_idempotent() {
        let mut registry = Registry::new(4);
        let (tx, _rx) = outbound();

        let id = registry.register("Ann".to_string(), tx).unwrap();
        assert!(registry.unregister(id).is_some());
        assert!(registry.unregister(id).is_none());
        assert!(registry.find(id).is_none());
    }

    #[test]
    fn snapshot_is_sorted_and_bounded() {
        let mut registry = Registry::new(4);
        let (tx, _rx) = outbound();

        registry.register("Ann".to_string(), tx.clone()).unwrap();
        registry.register("Bo".to_string(), tx).unwrap();
        for i in 0..50 {
            registry.chat.append(format!("msg {}", i), false);
        }

        match registry.snapshot() {
            Envelope::GameState { players, chat, .. } => {
                assert_eq!(players.len(), 2);
                assert_eq!(players[0].id, 1);
                assert_eq!(players[1].id, 2);
                assert_eq!(chat.len(), shared::CHAT_BROADCAST_TAIL);
            }
            other => panic!("wrong envelope kind: {:?}", other),
        }
    }

    #[test]
    fn broadcast_respects_exclude() {
        let mut registry = Registry::new(4);
        let (ann_tx, mut ann_rx) = outbound();
        let (bo_tx, mut bo_rx) = outbound();

        let ann = registry.register("Ann".to_string(), ann_tx).unwrap();
        registry.register("Bo".to_string(), bo_tx).unwrap();

        registry.broadcast(
            &Envelope::PlayerLeft { player_id: 99 },
            Some(ann),
        );

        assert!(ann_rx.try_recv().is_err());
        let line = bo_rx.try_recv().unwrap();
        assert!(line.contains("player_left"));
    }
}
