//! Client implementation.
//!
//! The client maintains:
//! - A local mirror of the server's roster, materialized into a scene
//! - The round phase (menu, playing, voting, showcase) and countdown
//! - Intent capture: join, block placement, palette choice, winner vote
//!
//! Nothing in the mirror changes because of a local gesture. A placed block
//! shows up only once the server echoes it back in `blockAdded`.

use std::collections::BTreeMap;

use showdown_shared::{
    config::ClientConfig,
    game::{Block, Color, JoinError, Mode, NamePolicy, NEUTRAL_GRAY, PALETTE},
    math::{Ray, Transform, Vec3},
    net::{ClientMsg, ConnId, InitPayload, PhysicsFrame, ServerMsg},
};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::{
    countdown::RoundTimer,
    placement,
    scene::{SceneBackend, SceneKey},
    vote,
};

/// Local failures surfaced to the player as prompts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error(transparent)]
    Join(#[from] JoinError),
    #[error("Invalid username! Try again.")]
    UnknownName(String),
    #[error("own connection id not known yet")]
    NoSelfId,
    #[error("voting is not open")]
    NotVoting,
    #[error("palette has no color {0}")]
    PaletteIndex(usize),
    #[error("palette is only available in artist mode")]
    NoPalette,
    #[error("connection to server closed")]
    Disconnected,
}

/// Where intents go.
pub trait IntentSink {
    fn send(&mut self, msg: ClientMsg) -> Result<(), ClientError>;
}

impl IntentSink for mpsc::UnboundedSender<ClientMsg> {
    fn send(&mut self, msg: ClientMsg) -> Result<(), ClientError> {
        mpsc::UnboundedSender::send(self, msg).map_err(|_| ClientError::Disconnected)
    }
}

impl IntentSink for Vec<ClientMsg> {
    fn send(&mut self, msg: ClientMsg) -> Result<(), ClientError> {
        self.push(msg);
        Ok(())
    }
}

/// Client screen flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Mode selection and name entry.
    Menu,
    /// Round running; clicks place blocks.
    Playing,
    /// Countdown ran out; waiting for this player's vote.
    Voting,
    /// A winner was declared; gameplay frozen.
    Showcase,
}

/// A block present in the local scene.
#[derive(Debug, Clone, PartialEq)]
pub struct MirrorBlock {
    pub key: SceneKey,
    pub block: Block,
    /// Latest transform; starts at the placement position.
    pub transform: Transform,
}

/// Local record of a player.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MirrorPlayer {
    pub username: String,
    pub blocks: Vec<MirrorBlock>,
}

/// Camera placement requested from the scene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
}

/// High-level game client.
pub struct GameClient<S, I> {
    cfg: ClientConfig,
    scene: S,
    sink: I,

    self_id: Option<ConnId>,
    phase: Phase,
    /// Mode this player picked on the menu.
    requested_mode: Option<Mode>,
    username: Option<String>,
    /// Mode and theme declared by the server.
    mode: Option<Mode>,
    theme: Option<String>,

    players: BTreeMap<ConnId, MirrorPlayer>,
    selected_color: Color,
    timer: RoundTimer,
    camera: Camera,
    winner: Option<ConnId>,
    notice: Option<String>,
    next_key: u64,
}

impl<S: SceneBackend, I: IntentSink> GameClient<S, I> {
    pub fn new(cfg: ClientConfig, scene: S, sink: I) -> Self {
        let timer = RoundTimer::new(cfg.round_secs);
        let camera = Camera {
            eye: cfg.camera_home,
            target: Vec3::ZERO,
        };
        Self {
            cfg,
            scene,
            sink,
            self_id: None,
            phase: Phase::Menu,
            requested_mode: None,
            username: None,
            mode: None,
            theme: None,
            players: BTreeMap::new(),
            selected_color: NEUTRAL_GRAY,
            timer,
            camera,
            winner: None,
            notice: None,
            next_key: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn self_id(&self) -> Option<ConnId> {
        self.self_id
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Server-declared mode, else the one picked locally.
    pub fn active_mode(&self) -> Option<Mode> {
        self.mode.or(self.requested_mode)
    }

    pub fn theme(&self) -> Option<&str> {
        self.theme.as_deref()
    }

    pub fn player(&self, id: ConnId) -> Option<&MirrorPlayer> {
        self.players.get(&id)
    }

    pub fn players(&self) -> impl Iterator<Item = (ConnId, &MirrorPlayer)> {
        self.players.iter().map(|(id, p)| (*id, p))
    }

    pub fn selected_color(&self) -> Color {
        self.selected_color
    }

    pub fn timer(&self) -> &RoundTimer {
        &self.timer
    }

    pub fn camera(&self) -> Camera {
        self.camera
    }

    pub fn winner(&self) -> Option<ConnId> {
        self.winner
    }

    /// Display name of the declared winner, if known.
    pub fn winner_name(&self) -> Option<&str> {
        self.winner
            .and_then(|id| self.players.get(&id))
            .map(|p| p.username.as_str())
    }

    /// Takes the pending notice (e.g. a rejected join) for display.
    pub fn take_notice(&mut self) -> Option<String> {
        self.notice.take()
    }

    pub fn scene(&self) -> &S {
        &self.scene
    }

    pub fn sink(&self) -> &I {
        &self.sink
    }

    // ─── Intents ───

    /// Leaves the menu and asks the server to join.
    pub fn start_game(&mut self, mode: Mode, username: &str) -> Result<(), ClientError> {
        let username = NamePolicy::permissive().validate(username)?;
        self.sink.send(ClientMsg::Join {
            mode,
            username: username.clone(),
        })?;

        info!(%mode, %username, "Joining game");
        self.requested_mode = Some(mode);
        self.username = Some(username);
        self.selected_color = NEUTRAL_GRAY;
        self.phase = Phase::Playing;
        self.timer.start();
        Ok(())
    }

    /// Picks a palette color by index (artist mode only).
    pub fn select_color(&mut self, index: usize) -> Result<Color, ClientError> {
        if !self.active_mode().is_some_and(Mode::has_palette) {
            return Err(ClientError::NoPalette);
        }
        let color = *PALETTE.get(index).ok_or(ClientError::PaletteIndex(index))?;
        self.selected_color = color;
        Ok(color)
    }

    /// Handles a placement click along `ray`. Returns whether an intent was sent.
    pub fn click(&mut self, ray: &Ray) -> Result<bool, ClientError> {
        if self.phase != Phase::Playing {
            return Ok(false);
        }
        let Some(mode) = self.active_mode() else {
            return Ok(false);
        };

        let cubes = self
            .players
            .values()
            .flat_map(|p| p.blocks.iter().map(|b| &b.transform));
        let Some(hit) = placement::pick(ray, self.cfg.ground_size, cubes) else {
            return Ok(false);
        };

        let color = if mode.has_palette() {
            self.selected_color
        } else {
            NEUTRAL_GRAY
        };
        let block = placement::resolve(hit.point, color);
        debug!(x = block.x, y = block.y, z = block.z, "Requesting block");
        self.sink.send(ClientMsg::PlaceBlock(block))?;
        Ok(true)
    }

    /// Advances the local countdown. Returns `true` when the round just ended.
    pub fn frame(&mut self, dt_sec: f32) -> bool {
        if self.phase != Phase::Playing || !self.timer.advance(dt_sec) {
            return false;
        }
        info!(theme = ?self.theme, "Round over, voting open");
        self.phase = Phase::Voting;
        true
    }

    /// Resolves typed input and sends the vote. On error the caller re-prompts.
    pub fn vote(&mut self, input: &str) -> Result<ConnId, ClientError> {
        if self.phase != Phase::Voting {
            return Err(ClientError::NotVoting);
        }
        let candidate = vote::resolve(
            input,
            self.self_id,
            self.players.iter().map(|(id, p)| (*id, p.username.as_str())),
        )?;
        self.sink.send(ClientMsg::VoteWinner(candidate))?;
        Ok(candidate)
    }

    /// Back to the menu with an empty mirror.
    pub fn reset_to_menu(&mut self) {
        self.clear_mirror();
        self.phase = Phase::Menu;
        self.timer.reset();
        self.requested_mode = None;
        self.username = None;
        self.mode = None;
        self.theme = None;
        self.winner = None;
        self.selected_color = NEUTRAL_GRAY;
        self.focus(Camera {
            eye: self.cfg.camera_home,
            target: Vec3::ZERO,
        });
    }

    // ─── Server events ───

    /// Applies one server message to the mirror.
    pub fn handle(&mut self, msg: ServerMsg) {
        match msg {
            ServerMsg::Welcome(id) => self.on_welcome(id),
            ServerMsg::Init(init) => self.on_init(init),
            ServerMsg::BlockAdded { id, block } => self.on_block_added(id, block),
            ServerMsg::PhysicsUpdate(frame) => self.on_physics_update(&frame),
            ServerMsg::PlayerLeft(id) => self.on_player_left(id),
            ServerMsg::WinnerDeclared(id) => self.on_winner(id),
        }
    }

    pub fn on_welcome(&mut self, id: ConnId) {
        debug!(conn = %id, "Welcome");
        self.self_id = Some(id);
    }

    /// Replaces the mirror with the roster, or bounces back to the menu on error.
    pub fn on_init(&mut self, init: InitPayload) {
        if let Some(error) = init.error {
            info!(%error, "Join rejected");
            self.reset_to_menu();
            self.notice = Some(error);
            return;
        }

        self.clear_mirror();
        for (id, view) in init.players {
            let mut player = MirrorPlayer {
                username: view.username,
                blocks: Vec::with_capacity(view.blocks.len()),
            };
            for block in view.blocks {
                let mb = self.materialize(block);
                player.blocks.push(mb);
            }
            self.players.insert(id, player);
        }
        self.mode = init.mode;
        self.theme = init.theme;
    }

    pub fn on_block_added(&mut self, owner: ConnId, block: Block) {
        let mb = self.materialize(block);
        self.players.entry(owner).or_default().blocks.push(mb);
    }

    /// Moves materialized blocks to their simulated transforms.
    pub fn on_physics_update(&mut self, frame: &PhysicsFrame) {
        if !self.active_mode().is_some_and(Mode::has_physics) {
            return;
        }
        for (id, transforms) in frame {
            let Some(player) = self.players.get_mut(id) else {
                continue;
            };
            // Transforms past the materialized blocks are ignored.
            for (mb, t) in player.blocks.iter_mut().zip(transforms) {
                mb.transform = *t;
                self.scene.set_transform(mb.key, t);
            }
        }
    }

    /// Drops a player's record and blocks. Being removed ourselves (the
    /// session was reset) sends us back to the menu.
    pub fn on_player_left(&mut self, id: ConnId) {
        if let Some(player) = self.players.remove(&id) {
            for mb in player.blocks {
                self.scene.remove_block(mb.key);
            }
        }
        if self.self_id == Some(id) && self.phase != Phase::Menu {
            info!("Removed from session");
            self.reset_to_menu();
        }
    }

    /// Freezes the round and frames the winner's build.
    pub fn on_winner(&mut self, id: ConnId) {
        self.phase = Phase::Showcase;
        self.timer.stop();
        self.winner = Some(id);

        let centroid = self.players.get(&id).and_then(|p| {
            Vec3::centroid(p.blocks.iter().map(|b| b.transform.position))
        });
        info!(winner = %id, name = ?self.winner_name(), "Winner declared");
        if let Some(center) = centroid {
            self.focus(Camera {
                eye: center + self.cfg.showcase_offset,
                target: center,
            });
        }
    }

    fn materialize(&mut self, block: Block) -> MirrorBlock {
        let key = SceneKey(self.next_key);
        self.next_key += 1;
        self.scene.add_block(key, &block);
        MirrorBlock {
            key,
            block,
            transform: Transform::at(block.position()),
        }
    }

    fn clear_mirror(&mut self) {
        for player in std::mem::take(&mut self.players).into_values() {
            for mb in player.blocks {
                self.scene.remove_block(mb.key);
            }
        }
    }

    fn focus(&mut self, camera: Camera) {
        self.camera = camera;
        self.scene.focus_camera(camera.eye, camera.target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::NullScene;
    use showdown_shared::{
        math::Quat,
        net::{PlayerView, Roster},
    };

    type TestClient = GameClient<NullScene, Vec<ClientMsg>>;

    fn client() -> TestClient {
        GameClient::new(ClientConfig::default(), NullScene, Vec::new())
    }

    fn init(mode: Mode, players: &[(u32, &str, usize)]) -> InitPayload {
        let players: Roster = players
            .iter()
            .map(|&(id, name, n)| {
                let blocks = (0..n)
                    .map(|i| Block::new(Vec3::new(i as f32, 0.5, 0.0), NEUTRAL_GRAY))
                    .collect();
                (
                    ConnId(id),
                    PlayerView {
                        username: name.to_string(),
                        blocks,
                    },
                )
            })
            .collect();
        InitPayload {
            players,
            mode: Some(mode),
            theme: Some("Bridge".into()),
            error: None,
        }
    }

    fn down_at(x: f32, z: f32) -> Ray {
        Ray {
            origin: Vec3::new(x, 10.0, z),
            dir: Vec3::new(0.0, -1.0, 0.0),
        }
    }

    #[test]
    fn empty_name_is_refused_locally() {
        let mut c = client();
        assert_eq!(
            c.start_game(Mode::Artist, "  "),
            Err(ClientError::Join(JoinError::EmptyName))
        );
        assert_eq!(c.phase(), Phase::Menu);
        assert!(c.sink().is_empty());
    }

    #[test]
    fn init_error_returns_to_menu_and_discards_mirror() {
        let mut c = client();
        c.start_game(Mode::Traditional, "Ann").unwrap();
        c.on_init(init(Mode::Traditional, &[(2, "Bob", 2)]));
        assert!(c.player(ConnId(2)).is_some());

        let mut rejected = init(Mode::Traditional, &[(2, "Bob", 2)]);
        rejected.error = Some("Inappropriate username!".into());
        c.on_init(rejected);

        assert_eq!(c.phase(), Phase::Menu);
        assert_eq!(c.players().count(), 0);
        assert_eq!(c.take_notice().as_deref(), Some("Inappropriate username!"));
    }

    #[test]
    fn click_sends_intent_without_materializing() {
        let mut c = client();
        c.start_game(Mode::Traditional, "Ann").unwrap();
        c.on_welcome(ConnId(1));
        c.on_init(init(Mode::Traditional, &[(1, "Ann", 0)]));

        assert!(c.click(&down_at(2.2, 2.8)).unwrap());

        assert_eq!(c.player(ConnId(1)).unwrap().blocks.len(), 0);
        assert_eq!(
            c.sink().last(),
            Some(&ClientMsg::PlaceBlock(Block {
                x: 2.0,
                y: 0.5,
                z: 3.0,
                color: NEUTRAL_GRAY
            }))
        );
    }

    #[test]
    fn artist_click_uses_selected_color() {
        let mut c = client();
        c.start_game(Mode::Artist, "Ann").unwrap();
        c.on_init(init(Mode::Artist, &[(1, "Ann", 0)]));
        assert_eq!(c.select_color(2), Ok(0x0000ff));
        assert_eq!(c.select_color(8), Err(ClientError::PaletteIndex(8)));

        c.click(&down_at(0.0, 0.0)).unwrap();
        match c.sink().last() {
            Some(ClientMsg::PlaceBlock(b)) => assert_eq!(b.color, 0x0000ff),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn traditional_mode_has_no_palette() {
        let mut c = client();
        c.start_game(Mode::Traditional, "Ann").unwrap();
        assert_eq!(c.select_color(0), Err(ClientError::NoPalette));
    }

    #[test]
    fn clicks_outside_a_round_send_nothing() {
        let mut c = client();
        assert!(!c.click(&down_at(0.0, 0.0)).unwrap());
        assert!(c.sink().is_empty());
    }

    #[test]
    fn block_added_creates_unseen_owner() {
        let mut c = client();
        c.on_block_added(ConnId(7), Block::new(Vec3::new(1.0, 0.5, 1.0), 0xff0000));
        let p = c.player(ConnId(7)).unwrap();
        assert_eq!(p.username, "");
        assert_eq!(p.blocks.len(), 1);
    }

    #[test]
    fn physics_update_skips_extra_indices_and_unknown_players() {
        let mut c = client();
        c.start_game(Mode::Traditional, "Ann").unwrap();
        c.on_init(init(Mode::Traditional, &[(1, "Ann", 1)]));

        let moved = Transform {
            position: Vec3::new(0.0, 0.4, 0.1),
            quaternion: Quat {
                x: 0.0,
                y: 0.0,
                z: 0.0,
                w: 1.0,
            },
        };
        let mut frame = PhysicsFrame::new();
        frame.insert(ConnId(1), vec![moved, Transform::at(Vec3::new(9.0, 9.0, 9.0))]);
        frame.insert(ConnId(99), vec![moved]);
        c.on_physics_update(&frame);

        let p = c.player(ConnId(1)).unwrap();
        assert_eq!(p.blocks.len(), 1);
        assert_eq!(p.blocks[0].transform, moved);
        assert!(c.player(ConnId(99)).is_none());
    }

    #[test]
    fn physics_update_ignored_in_artist_mode() {
        let mut c = client();
        c.start_game(Mode::Artist, "Ann").unwrap();
        c.on_init(init(Mode::Artist, &[(1, "Ann", 1)]));

        let mut frame = PhysicsFrame::new();
        frame.insert(ConnId(1), vec![Transform::at(Vec3::new(5.0, 5.0, 5.0))]);
        c.on_physics_update(&frame);

        assert_eq!(
            c.player(ConnId(1)).unwrap().blocks[0].transform.position,
            Vec3::new(0.0, 0.5, 0.0)
        );
    }

    #[test]
    fn player_left_drops_record() {
        let mut c = client();
        c.on_init(init(Mode::Artist, &[(1, "Ann", 2), (2, "Bob", 1)]));
        c.on_player_left(ConnId(1));
        c.on_player_left(ConnId(1));
        assert!(c.player(ConnId(1)).is_none());
        assert!(c.player(ConnId(2)).is_some());
    }

    #[test]
    fn own_removal_returns_to_menu() {
        let mut c = client();
        c.on_welcome(ConnId(1));
        c.start_game(Mode::Artist, "Ann").unwrap();
        c.on_init(init(Mode::Artist, &[(1, "Ann", 1), (2, "Bob", 1)]));

        c.on_player_left(ConnId(2));
        assert_eq!(c.phase(), Phase::Playing);

        c.on_player_left(ConnId(1));
        assert_eq!(c.phase(), Phase::Menu);
        assert_eq!(c.players().count(), 0);
        assert!(!c.click(&down_at(0.0, 0.0)).unwrap());
    }

    #[test]
    fn round_end_opens_voting_and_vote_resolves_names() {
        let mut c = client();
        c.on_welcome(ConnId(1));
        c.start_game(Mode::Artist, "Ann").unwrap();
        c.on_init(init(Mode::Artist, &[(1, "Ann", 0), (2, "Bob", 0)]));

        assert_eq!(c.vote("Bob"), Err(ClientError::NotVoting));
        let mut ended = 0;
        for _ in 0..(121 * 60) {
            if c.frame(1.0 / 60.0) {
                ended += 1;
            }
        }
        assert_eq!(ended, 1);
        assert_eq!(c.phase(), Phase::Voting);

        assert_eq!(c.vote("Nobody"), Err(ClientError::UnknownName("Nobody".into())));
        assert_eq!(c.vote("Bob"), Ok(ConnId(2)));
        assert_eq!(c.vote("me"), Ok(ConnId(1)));
        assert_eq!(c.sink().last(), Some(&ClientMsg::VoteWinner(ConnId(1))));
    }

    #[test]
    fn winner_focuses_camera_on_centroid() {
        let mut c = client();
        c.on_init(init(Mode::Artist, &[(1, "Ann", 3), (2, "Bob", 0)]));

        c.on_winner(ConnId(1));
        assert_eq!(c.phase(), Phase::Showcase);
        assert_eq!(c.winner_name(), Some("Ann"));
        let cam = c.camera();
        assert_eq!(cam.target, Vec3::new(1.0, 0.5, 0.0));
        assert_eq!(cam.eye, Vec3::new(1.0, 10.5, 10.0));
    }

    #[test]
    fn winner_without_blocks_keeps_camera() {
        let mut c = client();
        c.on_init(init(Mode::Artist, &[(2, "Bob", 0)]));
        let before = c.camera();
        c.on_winner(ConnId(2));
        assert_eq!(c.phase(), Phase::Showcase);
        assert_eq!(c.camera(), before);
    }
}
