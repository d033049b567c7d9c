//! In-process harness for end-to-end tests.
//!
//! A `Harness` runs the session actor on the test runtime. Each `Peer`
//! is one connection: a `GameClient` over a `RecordingScene`, whose intents
//! are forwarded to the actor by a small task, and whose inbox is pumped by
//! the test.

use std::{collections::BTreeMap, time::Duration};

use anyhow::{bail, Context};
use showdown_client::{scene::SceneBackend, scene::SceneKey, GameClient};
use showdown_server::{GameServer, Session, SessionHandle};
use showdown_shared::{
    config::{ClientConfig, ServerConfig},
    game::Block,
    math::{Transform, Vec3},
    net::{ClientMsg, ConnId, ServerMsg},
    physics::{NullPhysics, PhysicsBackend, RapierPhysics},
};
use tokio::{sync::mpsc, task::JoinHandle};

/// How long a peer waits for an expected message.
pub const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Installs a test-writer subscriber once per process.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_test_writer()
        .try_init();
}

/// Scene that remembers what it was told to draw.
#[derive(Debug, Default)]
pub struct RecordingScene {
    pub blocks: BTreeMap<SceneKey, (Block, Transform)>,
    pub camera: Option<(Vec3, Vec3)>,
    pub removed: usize,
}

impl SceneBackend for RecordingScene {
    fn add_block(&mut self, key: SceneKey, block: &Block) {
        self.blocks.insert(key, (*block, Transform::at(block.position())));
    }

    fn set_transform(&mut self, key: SceneKey, transform: &Transform) {
        if let Some(entry) = self.blocks.get_mut(&key) {
            entry.1 = *transform;
        }
    }

    fn remove_block(&mut self, key: SceneKey) {
        if self.blocks.remove(&key).is_some() {
            self.removed += 1;
        }
    }

    fn focus_camera(&mut self, eye: Vec3, target: Vec3) {
        self.camera = Some((eye, target));
    }
}

pub type TestClient = GameClient<RecordingScene, mpsc::UnboundedSender<ClientMsg>>;

/// A running session actor.
pub struct Harness {
    pub handle: SessionHandle,
    actor: JoinHandle<anyhow::Result<()>>,
}

impl Harness {
    /// Starts an actor over rigid-body physics.
    pub fn start() -> Self {
        Self::with_physics(Box::new(RapierPhysics::default()))
    }

    /// Starts an actor whose bodies never move.
    pub fn start_static() -> Self {
        Self::with_physics(Box::new(NullPhysics::default()))
    }

    pub fn with_physics(physics: Box<dyn PhysicsBackend>) -> Self {
        init_tracing();
        let session = Session::with_seed(physics, 7);
        let (handle, actor) = GameServer::spawn(ServerConfig::default(), session);
        Self { handle, actor }
    }

    /// Opens a connection and waits for its welcome.
    pub async fn connect(&self, cfg: ClientConfig) -> anyhow::Result<Peer> {
        let (conn, inbox) = self.handle.connect().await?;

        let (intents, mut outgoing) = mpsc::unbounded_channel::<ClientMsg>();
        let handle = self.handle.clone();
        let forwarder = tokio::spawn(async move {
            while let Some(msg) = outgoing.recv().await {
                if handle.client(conn, msg).await.is_err() {
                    break;
                }
            }
        });

        let mut peer = Peer {
            conn,
            client: GameClient::new(cfg, RecordingScene::default(), intents),
            inbox,
            handle: self.handle.clone(),
            forwarder,
        };
        peer.recv_until(|m| matches!(m, ServerMsg::Welcome(_))).await?;
        Ok(peer)
    }

    /// Runs a console line on the actor.
    pub async fn console(&self, line: &str) -> anyhow::Result<Vec<String>> {
        self.handle.console(line).await
    }

    /// Asks the actor to stop and waits for it.
    pub async fn shutdown(self) -> anyhow::Result<()> {
        self.handle.console("quit").await?;
        self.actor.await.context("session actor panicked")?
    }
}

/// One connected client.
pub struct Peer {
    pub conn: ConnId,
    pub client: TestClient,
    inbox: mpsc::UnboundedReceiver<ServerMsg>,
    handle: SessionHandle,
    forwarder: JoinHandle<()>,
}

impl Peer {
    /// Applies inbound messages until one matches `pred`, which is applied too.
    pub async fn recv_until<F>(&mut self, pred: F) -> anyhow::Result<ServerMsg>
    where
        F: Fn(&ServerMsg) -> bool,
    {
        loop {
            let msg = tokio::time::timeout(RECV_TIMEOUT, self.inbox.recv())
                .await
                .context("timed out waiting for server message")?;
            let Some(msg) = msg else {
                bail!("connection closed");
            };
            let hit = pred(&msg);
            self.client.handle(msg.clone());
            if hit {
                return Ok(msg);
            }
        }
    }

    /// Applies whatever is already queued without waiting.
    pub fn drain(&mut self) -> usize {
        let mut n = 0;
        while let Ok(msg) = self.inbox.try_recv() {
            self.client.handle(msg);
            n += 1;
        }
        n
    }

    /// Closes the connection the way a dropped socket would.
    pub async fn disconnect(self) -> anyhow::Result<()> {
        self.forwarder.abort();
        self.handle.disconnect(self.conn).await
    }
}

/// Matches `init` without an error.
pub fn is_init(msg: &ServerMsg) -> bool {
    matches!(msg, ServerMsg::Init(init) if init.error.is_none())
}
