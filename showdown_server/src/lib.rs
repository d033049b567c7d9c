//! `showdown_server`
//!
//! Server-side systems:
//! - Session state machine (players, mode, theme, physics world)
//! - Single-writer session actor with a fixed-rate physics tick
//! - WebSocket transport and static asset hosting
//!
//! Networking model:
//! - One WebSocket per browser tab, JSON text frames both ways.
//! - Authority is one-way: intents in, validated broadcasts out.

pub mod server;
pub mod session;
pub mod transport;

pub use server::{GameServer, SessionHandle};
pub use session::Session;
