//! `showdown_client`
//!
//! Client-side presenter, independent of any renderer:
//! - Local mirror of the server roster, pushed into a `SceneBackend`
//! - Placement picking against the ground and materialized cubes
//! - Per-client round countdown
//! - Winner vote by display name

pub mod client;
pub mod countdown;
pub mod placement;
pub mod scene;
pub mod vote;

pub use client::{ClientError, GameClient, IntentSink, Phase};
