//! Game rules shared by client and server.
//!
//! # Modes
//! - **Traditional**: blocks are simulated rigid bodies and always neutral gray.
//! - **Artist**: blocks stay where they are placed and take a palette color.
//!
//! The first player to join fixes the mode (and a theme drawn from that
//! mode's list) for everyone until the session is reset.

use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::math::Vec3;

/// 24-bit RGB color, e.g. `0x888888`.
pub type Color = u32;

/// Color used for every block in traditional mode.
pub const NEUTRAL_GRAY: Color = 0x888888;

/// Colors offered to artist-mode players.
pub const PALETTE: [Color; 8] = [
    0xff0000, 0x00ff00, 0x0000ff, 0xffff00, 0xff00ff, 0x00ffff, 0xffffff, 0x000000,
];

pub const TRADITIONAL_THEMES: [&str; 5] =
    ["Tallest Tower", "Bridge", "Castle Wall", "Pyramid", "Staircase"];

pub const ARTIST_THEMES: [&str; 5] = ["Tree", "House", "Animal", "Vehicle", "Pixel Art Face"];

/// Game variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Traditional,
    Artist,
}

impl Mode {
    /// Whether placed blocks become rigid bodies.
    pub fn has_physics(self) -> bool {
        matches!(self, Mode::Traditional)
    }

    /// Whether players pick block colors from the palette.
    pub fn has_palette(self) -> bool {
        matches!(self, Mode::Artist)
    }

    pub fn themes(self) -> &'static [&'static str] {
        match self {
            Mode::Traditional => &TRADITIONAL_THEMES,
            Mode::Artist => &ARTIST_THEMES,
        }
    }

    /// Draws a theme uniformly from this mode's list.
    pub fn pick_theme<R: Rng + ?Sized>(self, rng: &mut R) -> String {
        // Both lists are non-empty constants.
        self.themes()
            .choose(rng)
            .copied()
            .unwrap_or(self.themes()[0])
            .to_string()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Traditional => "traditional",
            Mode::Artist => "artist",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A placed cube. `x`/`z` sit on the integer grid, `y` comes from the
/// surface it was placed on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub color: Color,
}

impl Block {
    pub fn new(position: Vec3, color: Color) -> Self {
        Self {
            x: position.x,
            y: position.y,
            z: position.z,
            color,
        }
    }

    pub fn position(&self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }
}

/// Reasons a join request is refused. The `Display` text is what the
/// requester sees.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JoinError {
    #[error("Please enter a username!")]
    EmptyName,
    #[error("Inappropriate username!")]
    Inappropriate,
}

/// Default reject-list for display names.
pub const BLOCKED_NAME_SUBSTRINGS: [&str; 4] = ["fuck", "shit", "asshole", "bitch"];

/// Further default entries, ROT13-encoded so the slur is not spelled out in
/// source. Decoded with [`rot13`] when the default policy is built.
pub const BLOCKED_NAME_SUBSTRINGS_ROT13: [&str; 1] = ["avttre"];

/// Rotates ASCII letters by 13 places; everything else passes through.
pub fn rot13(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'a'..='z' => (((c as u8 - b'a') + 13) % 26 + b'a') as char,
            'A'..='Z' => (((c as u8 - b'A') + 13) % 26 + b'A') as char,
            _ => c,
        })
        .collect()
}

/// Case-insensitive substring reject-list for display names.
#[derive(Debug, Clone)]
pub struct NamePolicy {
    blocked: HashSet<String>,
}

impl NamePolicy {
    /// Policy with no blocked substrings.
    pub fn permissive() -> Self {
        Self {
            blocked: HashSet::new(),
        }
    }

    /// Adds a blocked substring.
    pub fn block(&mut self, word: &str) {
        self.blocked.insert(word.to_lowercase());
    }

    /// Checks whether the name contains a blocked substring.
    pub fn contains_blocked(&self, name: &str) -> bool {
        let lower = name.to_lowercase();
        self.blocked.iter().any(|w| lower.contains(w.as_str()))
    }

    /// Trims and validates a requested display name.
    pub fn validate(&self, name: &str) -> Result<String, JoinError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(JoinError::EmptyName);
        }
        if self.contains_blocked(name) {
            return Err(JoinError::Inappropriate);
        }
        Ok(name.to_string())
    }
}

impl Default for NamePolicy {
    fn default() -> Self {
        let mut policy = Self::permissive();
        for word in BLOCKED_NAME_SUBSTRINGS {
            policy.block(word);
        }
        for encoded in BLOCKED_NAME_SUBSTRINGS_ROT13 {
            policy.block(&rot13(encoded));
        }
        policy
    }
}
