//! Wire protocol and gameplay configuration shared between the server and
//! any protocol client.
//!
//! Every message on the wire is one JSON object of the shape
//! `{"type": <kind>, "data": {...}}` followed by a single newline byte.
//! [`encode`] and [`decode`] are pure transformations; framing (buffering
//! partial reads, splitting on `\n`) is the transport's job.

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

// Network configuration
pub const SERVER_HOST: &str = "0.0.0.0";
pub const SERVER_PORT: u16 = 60001;
pub const MAX_PLAYERS: usize = 4;

// Arena configuration
pub const ARENA_WIDTH: f32 = 800.0;
pub const ARENA_HEIGHT: f32 = 600.0;
pub const TICK_RATE: u32 = 60;

// Player configuration. The y-axis grows downward, so an upward impulse is
// negative and gravity is positive.
pub const PLAYER_SIZE: f32 = 40.0;
pub const PLAYER_SPEED: f32 = 300.0;
pub const GRAVITY: f32 = 980.0;
pub const JUMP_VELOCITY: f32 = -400.0;
pub const MAX_FALL_SPEED: f32 = 600.0;
pub const FRICTION: f32 = 0.85;
pub const STOP_EPSILON: f32 = 1.0;

// Combat configuration
pub const MAX_HEALTH: i32 = 100;
pub const ATTACK_DAMAGE: i32 = 10;
pub const ATTACK_RANGE: f32 = 60.0;
pub const ATTACK_COOLDOWN: Duration = Duration::from_secs(1);

// Chat configuration: how much the server remembers vs how much one
// snapshot shows.
pub const CHAT_HISTORY_CAP: usize = 100;
pub const CHAT_BROADCAST_TAIL: usize = 10;

/// Fixed spawn rotation; a joining player lands on `(id - 1) % 4`.
pub const SPAWN_POINTS: [(f32, f32); 4] =
    [(100.0, 100.0), (700.0, 100.0), (100.0, 500.0), (700.0, 500.0)];

/// Static arena platforms, never mutated after startup.
pub const PLATFORMS: [Platform; 4] = [
    // base
    Platform { x: 80.0, y: 520.0, width: 640.0, height: 20.0 },
    // left ledge
    Platform { x: 120.0, y: 380.0, width: 180.0, height: 18.0 },
    // right ledge
    Platform { x: 500.0, y: 380.0, width: 180.0, height: 18.0 },
    // top
    Platform { x: 280.0, y: 120.0, width: 240.0, height: 16.0 },
];

/// Axis-aligned static platform rectangle in arena coordinates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Platform {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Platform {
    pub fn top(&self) -> f32 {
        self.y
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn left(&self) -> f32 {
        self.x
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }
}

/// Facing / movement direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
    None,
}

/// What a `player_input` message asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Move,
    Stop,
    Attack,
    None,
}

/// Public per-player fields included in every `game_state` snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerState {
    pub id: u32,
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub health: i32,
    pub max_health: i32,
    pub direction: Direction,
    pub is_crouching: bool,
}

/// One chat line as stored and broadcast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatEntry {
    pub text: String,
    pub is_system: bool,
    /// Unix milliseconds.
    pub timestamp: u64,
}

/// The wire unit: a discriminated union over message kind.
///
/// The serde representation matches the protocol exactly: the variant name
/// (snake_case) becomes the `type` field and the payload becomes `data`.
/// Unknown tags and missing payload fields fail at decode time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Envelope {
    // client -> server
    Connect {
        name: String,
    },
    PlayerInput {
        player_id: u32,
        action: Action,
        direction: Direction,
    },
    Attack {
        player_id: u32,
        direction: Direction,
    },
    ChatMessage {
        player_id: u32,
        text: String,
    },
    RequestState {
        player_id: u32,
    },

    // server -> client
    PlayerJoined {
        player_id: u32,
        name: String,
    },
    PlayerLeft {
        player_id: u32,
    },
    GameState {
        players: Vec<PlayerState>,
        chat: Vec<ChatEntry>,
        timestamp: u64,
    },
}

/// A single message failed to decode or encode. Recoverable: the line is
/// dropped and the connection keeps reading.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("empty line")]
    Empty,

    #[error("invalid message: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Serializes one envelope to its wire form, newline terminator included.
pub fn encode(envelope: &Envelope) -> Result<String, ProtocolError> {
    let mut line = serde_json::to_string(envelope)?;
    line.push('\n');
    Ok(line)
}

/// Parses one line (without its terminator) into a typed envelope.
pub fn decode(line: &str) -> Result<Envelope, ProtocolError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(ProtocolError::Empty);
    }
    Ok(serde_json::from_str(line)?)
}

/// Current unix time in milliseconds.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}
