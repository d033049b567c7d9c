//! `showdown_shared`
//!
//! Shared libraries used by both client and server.
//!
//! Design goals:
//! - One place for every wire payload shape.
//! - Game rules (modes, themes, palette, name policy) defined once.
//! - Physics behind a trait so the session can run headless in tests.
//! - No `unsafe`.

pub mod config;
pub mod game;
pub mod math;
pub mod net;
pub mod physics;

pub mod prelude {
    //! Commonly used exports.

    pub use crate::config::*;
    pub use crate::game::*;
    pub use crate::math::*;
    pub use crate::net::*;
}
