//! Session state machine.
//!
//! A `Session` is the single source of truth for who is playing, what they
//! have built, and (in traditional mode) how the blocks move. It is purely
//! synchronous: every operation returns the deliveries it produced and the
//! caller decides how to put them on the wire.
//!
//! Invalid requests never fail loudly:
//! - A rejected join is answered to the requester only.
//! - Placements from unregistered connections and votes for unknown players
//!   are dropped.
//! - Leaving twice is a no-op.

use std::collections::{btree_map::Entry, BTreeMap};
use std::fmt;

use rand::{rngs::StdRng, SeedableRng};
use showdown_shared::{
    game::{Block, Mode, NamePolicy},
    math::Transform,
    net::{ConnId, InitPayload, PhysicsFrame, PlayerView, Roster, ServerMsg},
    physics::{BodyHandle, PhysicsBackend, BLOCK_MASS, PHYSICS_DT},
};
use tracing::{debug, info};

/// Where a message produced by the session should go.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    /// Every open connection, joined or not.
    Broadcast(ServerMsg),
    /// Only the given connection.
    Reply(ConnId, ServerMsg),
}

/// Messages produced by one session operation.
pub type Outcome = Vec<Delivery>;

/// A block paired with the body simulating it, if any.
#[derive(Debug, Clone, Copy)]
struct PlacedBlock {
    block: Block,
    body: Option<BodyHandle>,
}

#[derive(Debug, Clone)]
struct Player {
    username: String,
    blocks: Vec<PlacedBlock>,
}

impl Player {
    fn view(&self) -> PlayerView {
        PlayerView {
            username: self.username.clone(),
            blocks: self.blocks.iter().map(|p| p.block).collect(),
        }
    }

    fn bodies(&self) -> impl Iterator<Item = BodyHandle> + '_ {
        self.blocks.iter().filter_map(|p| p.body)
    }
}

/// Point-in-time summary for the operator console.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStatus {
    pub mode: Option<Mode>,
    pub theme: Option<String>,
    pub players: usize,
    pub blocks: usize,
    pub bodies: usize,
    pub ticks: u64,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = self.mode.map(Mode::as_str).unwrap_or("none");
        let theme = self.theme.as_deref().unwrap_or("none");
        write!(
            f,
            "mode={mode} theme={theme:?} players={} blocks={} bodies={} ticks={}",
            self.players, self.blocks, self.bodies, self.ticks
        )
    }
}

/// The one active game.
pub struct Session {
    players: BTreeMap<ConnId, Player>,
    mode: Option<Mode>,
    theme: Option<String>,
    physics: Box<dyn PhysicsBackend>,
    policy: NamePolicy,
    rng: StdRng,
    dt_sec: f32,
    ticks: u64,
}

impl Session {
    /// Creates an empty session over the given physics world.
    pub fn new(physics: Box<dyn PhysicsBackend>) -> Self {
        Self::with_rng(physics, StdRng::from_entropy())
    }

    /// Creates an empty session whose theme draws are reproducible.
    pub fn with_seed(physics: Box<dyn PhysicsBackend>, seed: u64) -> Self {
        Self::with_rng(physics, StdRng::seed_from_u64(seed))
    }

    fn with_rng(physics: Box<dyn PhysicsBackend>, rng: StdRng) -> Self {
        Self {
            players: BTreeMap::new(),
            mode: None,
            theme: None,
            physics,
            policy: NamePolicy::default(),
            rng,
            dt_sec: PHYSICS_DT,
            ticks: 0,
        }
    }

    /// Replaces the display-name policy.
    pub fn with_name_policy(mut self, policy: NamePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the timestep used by `physics_tick`.
    pub fn with_tick_hz(mut self, tick_hz: u32) -> Self {
        self.dt_sec = 1.0 / tick_hz.max(1) as f32;
        self
    }

    pub fn mode(&self) -> Option<Mode> {
        self.mode
    }

    pub fn theme(&self) -> Option<&str> {
        self.theme.as_deref()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn is_registered(&self, conn: ConnId) -> bool {
        self.players.contains_key(&conn)
    }

    pub fn block_count(&self, conn: ConnId) -> Option<usize> {
        self.players.get(&conn).map(|p| p.blocks.len())
    }

    pub fn body_count(&self, conn: ConnId) -> Option<usize> {
        self.players.get(&conn).map(|p| p.bodies().count())
    }

    /// Bodies currently alive in the physics world.
    pub fn world_body_count(&self) -> usize {
        self.physics.body_count()
    }

    pub fn roster(&self) -> Roster {
        self.players
            .iter()
            .map(|(id, p)| (*id, p.view()))
            .collect()
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            mode: self.mode,
            theme: self.theme.clone(),
            players: self.players.len(),
            blocks: self.players.values().map(|p| p.blocks.len()).sum(),
            bodies: self.physics.body_count(),
            ticks: self.ticks,
        }
    }

    fn init_payload(&self, error: Option<String>) -> InitPayload {
        InitPayload {
            players: self.roster(),
            mode: self.mode,
            theme: self.theme.clone(),
            error,
        }
    }

    /// Registers `conn` as a player.
    ///
    /// The first successful join fixes the mode and draws the theme. The
    /// resulting roster is broadcast to everyone; a rejected name is
    /// answered to `conn` only and leaves the session untouched.
    pub fn join(&mut self, conn: ConnId, requested_mode: Mode, requested_name: &str) -> Outcome {
        let username = match self.policy.validate(requested_name) {
            Ok(name) => name,
            Err(e) => {
                info!(conn = %conn, reason = %e, "Join rejected");
                let init = self.init_payload(Some(e.to_string()));
                return vec![Delivery::Reply(conn, ServerMsg::Init(init))];
            }
        };

        match self.players.entry(conn) {
            Entry::Occupied(mut existing) => existing.get_mut().username = username,
            Entry::Vacant(slot) => {
                slot.insert(Player {
                    username,
                    blocks: Vec::new(),
                });
            }
        }

        if self.mode.is_none() {
            let theme = requested_mode.pick_theme(&mut self.rng);
            info!(mode = %requested_mode, theme = %theme, "Game mode fixed");
            self.mode = Some(requested_mode);
            self.theme = Some(theme);
        }

        vec![Delivery::Broadcast(ServerMsg::Init(self.init_payload(None)))]
    }

    /// Records a block for `conn` and announces it.
    pub fn place_block(&mut self, conn: ConnId, block: Block) -> Outcome {
        let Some(player) = self.players.get_mut(&conn) else {
            debug!(conn = %conn, "Placement from unregistered connection dropped");
            return Vec::new();
        };

        let body = self
            .mode
            .filter(|m| m.has_physics())
            .map(|_| self.physics.add_cube(block.position(), BLOCK_MASS));
        player.blocks.push(PlacedBlock { block, body });

        vec![Delivery::Broadcast(ServerMsg::BlockAdded { id: conn, block })]
    }

    /// Removes `conn`'s player and bodies.
    pub fn leave(&mut self, conn: ConnId) -> Outcome {
        let Some(player) = self.players.remove(&conn) else {
            return Vec::new();
        };
        for body in player.bodies() {
            self.physics.remove_body(body);
        }
        info!(conn = %conn, username = %player.username, blocks = player.blocks.len(), "Player left");
        vec![Delivery::Broadcast(ServerMsg::PlayerLeft(conn))]
    }

    /// Announces `candidate` as the winner if they are still playing.
    pub fn vote_winner(&mut self, candidate: ConnId) -> Outcome {
        if !self.players.contains_key(&candidate) {
            debug!(candidate = %candidate, "Vote for unknown player dropped");
            return Vec::new();
        }
        vec![Delivery::Broadcast(ServerMsg::WinnerDeclared(candidate))]
    }

    /// Advances the simulation one step and broadcasts every block transform.
    ///
    /// Does nothing unless the fixed mode simulates physics.
    pub fn physics_tick(&mut self) -> Outcome {
        if !self.mode.is_some_and(Mode::has_physics) {
            return Vec::new();
        }

        self.physics.step(self.dt_sec);
        self.ticks += 1;

        let frame: PhysicsFrame = self
            .players
            .iter()
            .map(|(id, p)| {
                let transforms = p
                    .blocks
                    .iter()
                    .map(|placed| {
                        placed
                            .body
                            .and_then(|h| self.physics.transform(h))
                            .unwrap_or_else(|| Transform::at(placed.block.position()))
                    })
                    .collect();
                (*id, transforms)
            })
            .collect();

        vec![Delivery::Broadcast(ServerMsg::PhysicsUpdate(frame))]
    }

    /// Ends the game: drops every player and body and unfixes mode and theme.
    ///
    /// Each removed player is announced as having left so connected
    /// clients clear their mirrors.
    pub fn reset(&mut self) -> Outcome {
        for player in self.players.values() {
            for body in player.bodies() {
                self.physics.remove_body(body);
            }
        }
        let removed = std::mem::take(&mut self.players);
        self.mode = None;
        self.theme = None;
        self.ticks = 0;
        info!(players = removed.len(), "Session reset");

        removed
            .into_keys()
            .map(|id| Delivery::Broadcast(ServerMsg::PlayerLeft(id)))
            .collect()
    }
}
