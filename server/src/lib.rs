//! # Arena Brawl Server
//!
//! Authoritative server for a real-time multiplayer arena brawler. The
//! server is the single source of truth for positions, health and combat
//! outcomes: clients only produce inputs and consume snapshots.
//!
//! ## Architecture
//!
//! Three kinds of task run concurrently:
//!
//! - one acceptor ([`network::Server::run`]) admitting TCP connections;
//! - one reader task per connection, splitting newline-framed JSON envelopes
//!   off the socket and dispatching them;
//! - one broadcaster ([`tick::run`]) advancing physics at a fixed tick rate
//!   and fanning a world snapshot out to every session.
//!
//! The only shared mutable state is the [`registry::Registry`] (player map
//! plus chat history), guarded by a single `tokio::sync::Mutex`. Every
//! mutation — movement inputs, attacks, chat, the physics advance — happens
//! while holding it. Outbound traffic never does: snapshots and
//! notifications are queued onto per-connection channels under the lock and
//! written to the sockets by dedicated writer tasks, so one slow client
//! cannot stall the tick.
//!
//! ## Failure containment
//!
//! A connection is gone when its read returns end-of-stream or errors, or a
//! send to it fails; its session is then unregistered and a `player_left`
//! notification is broadcast. No error originating in one connection's
//! handling propagates to another connection or to the tick loop, and a
//! malformed line costs exactly one message, never the connection.
//!
//! ## Module organization
//!
//! - [`registry`] — player entities, id assignment, capacity, snapshots
//! - [`physics`] — movement input application and the per-tick physics step
//! - [`combat`] — cooldown gating, attack geometry, damage application
//! - [`chat`] — bounded chat history
//! - [`network`] — TCP listener, connection read loops, dispatch
//! - [`tick`] — the fixed-interval broadcast loop
//! - [`error`] — the per-session error taxonomy

pub mod chat;
pub mod combat;
pub mod error;
pub mod network;
pub mod physics;
pub mod registry;
pub mod tick;
