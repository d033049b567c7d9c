//! Session actor.
//!
//! One task owns the `Session` and the table of open connections. Socket
//! tasks talk to it through a cloneable `SessionHandle`; everything that
//! mutates the game runs here, one command or tick at a time, so no lock is
//! needed around session state.
//!
//! Loop:
//! - Commands (connect, disconnect, client intent, console line) are
//!   handled to completion in arrival order.
//! - A fixed-rate interval drives `Session::physics_tick`. Late ticks are
//!   skipped rather than bursted.
//! - Deliveries are pushed onto per-connection queues. Sends to closed
//!   connections are ignored.

use std::{collections::HashMap, ops::ControlFlow, time::Duration};

use anyhow::Context;
use showdown_shared::{
    config::ServerConfig,
    net::{ClientMsg, ConnId, ServerMsg},
};
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tracing::{debug, info};

use crate::session::{Delivery, Outcome, Session};

/// Depth of the command queue between socket tasks and the actor.
const COMMAND_QUEUE: usize = 1024;

/// Requests handled by the session actor.
#[derive(Debug)]
pub enum Command {
    /// A transport accepted a connection; `outbound` receives its messages.
    Connect {
        conn: ConnId,
        outbound: mpsc::UnboundedSender<ServerMsg>,
    },
    /// The transport saw the connection close.
    Disconnect { conn: ConnId },
    /// A decoded intent from a connection.
    Client { conn: ConnId, msg: ClientMsg },
    /// An operator console line; output lines are sent back on `reply`.
    Console {
        line: String,
        reply: oneshot::Sender<Vec<String>>,
    },
}

/// Cloneable sender side of the actor.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<Command>,
}

impl SessionHandle {
    /// Opens a new connection and returns its id and outbound queue.
    pub async fn connect(&self) -> anyhow::Result<(ConnId, mpsc::UnboundedReceiver<ServerMsg>)> {
        let conn = ConnId::new_unique();
        let (outbound, rx) = mpsc::unbounded_channel();
        self.send(Command::Connect { conn, outbound }).await?;
        Ok((conn, rx))
    }

    /// Forwards a client intent.
    pub async fn client(&self, conn: ConnId, msg: ClientMsg) -> anyhow::Result<()> {
        self.send(Command::Client { conn, msg }).await
    }

    pub async fn disconnect(&self, conn: ConnId) -> anyhow::Result<()> {
        self.send(Command::Disconnect { conn }).await
    }

    /// Executes a console line and waits for its output.
    pub async fn console(&self, line: &str) -> anyhow::Result<Vec<String>> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Console {
            line: line.to_string(),
            reply,
        })
        .await?;
        rx.await.context("session actor dropped console reply")
    }

    /// Blocking variant of [`console`](Self::console) for the stdin thread.
    pub fn console_blocking(&self, line: &str) -> anyhow::Result<Vec<String>> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .blocking_send(Command::Console {
                line: line.to_string(),
                reply,
            })
            .context("session actor stopped")?;
        rx.blocking_recv()
            .context("session actor dropped console reply")
    }

    async fn send(&self, cmd: Command) -> anyhow::Result<()> {
        self.tx.send(cmd).await.context("session actor stopped")
    }
}

/// The session actor.
pub struct GameServer {
    pub cfg: ServerConfig,
    session: Session,
    conns: HashMap<ConnId, mpsc::UnboundedSender<ServerMsg>>,
    rx: mpsc::Receiver<Command>,
}

impl GameServer {
    /// Creates the actor and its handle. Nothing runs until [`run`](Self::run).
    pub fn new(cfg: ServerConfig, session: Session) -> (Self, SessionHandle) {
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE);
        let session = session.with_tick_hz(cfg.tick_hz);
        (
            Self {
                cfg,
                session,
                conns: HashMap::new(),
                rx,
            },
            SessionHandle { tx },
        )
    }

    /// Creates the actor and runs it on a new task.
    pub fn spawn(
        cfg: ServerConfig,
        session: Session,
    ) -> (SessionHandle, JoinHandle<anyhow::Result<()>>) {
        let (server, handle) = Self::new(cfg, session);
        (handle, tokio::spawn(server.run()))
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Number of open connections, joined or not.
    pub fn connection_count(&self) -> usize {
        self.conns.len()
    }

    /// Runs until every handle is dropped or the console asks to quit.
    pub async fn run(mut self) -> anyhow::Result<()> {
        let period = Duration::from_secs_f32(1.0 / self.cfg.tick_hz.max(1) as f32);
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(tick_hz = self.cfg.tick_hz, "Session actor running");
        loop {
            tokio::select! {
                cmd = self.rx.recv() => {
                    let Some(cmd) = cmd else { break };
                    if self.handle(cmd).is_break() {
                        break;
                    }
                }
                _ = ticker.tick() => self.tick(),
            }
        }
        info!("Session actor stopped");
        Ok(())
    }

    /// Executes one physics tick and delivers the update.
    pub fn tick(&mut self) {
        let out = self.session.physics_tick();
        self.deliver(out);
    }

    /// Handles one command to completion.
    pub fn handle(&mut self, cmd: Command) -> ControlFlow<()> {
        match cmd {
            Command::Connect { conn, outbound } => {
                info!(conn = %conn, "Player connected");
                let _ = outbound.send(ServerMsg::Welcome(conn));
                self.conns.insert(conn, outbound);
            }
            Command::Disconnect { conn } => {
                if self.conns.remove(&conn).is_some() {
                    info!(conn = %conn, "Player disconnected");
                }
                let out = self.session.leave(conn);
                self.deliver(out);
            }
            Command::Client { conn, msg } => {
                let out = match msg {
                    ClientMsg::Join { mode, username } => self.session.join(conn, mode, &username),
                    ClientMsg::PlaceBlock(block) => self.session.place_block(conn, block),
                    ClientMsg::VoteWinner(candidate) => self.session.vote_winner(candidate),
                };
                self.deliver(out);
            }
            Command::Console { line, reply } => {
                let (output, flow) = self.exec_console(&line);
                let _ = reply.send(output);
                return flow;
            }
        }
        ControlFlow::Continue(())
    }

    /// Executes an operator console command.
    fn exec_console(&mut self, line: &str) -> (Vec<String>, ControlFlow<()>) {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some(&command) = tokens.first() else {
            return (Vec::new(), ControlFlow::Continue(()));
        };

        match command {
            "status" => {
                let mut out = vec![format!("Connections: {}", self.conns.len())];
                out.push(format!("Session: {}", self.session.status()));
                for (id, player) in self.session.roster() {
                    out.push(format!(
                        "  {id}: {} ({} blocks)",
                        player.username,
                        player.blocks.len()
                    ));
                }
                (out, ControlFlow::Continue(()))
            }
            "reset" => {
                let out = self.session.reset();
                self.deliver(out);
                (
                    vec!["Session reset; next join picks mode and theme".to_string()],
                    ControlFlow::Continue(()),
                )
            }
            "quit" | "exit" => {
                info!("Server shutting down");
                (vec!["Shutting down".to_string()], ControlFlow::Break(()))
            }
            other => (
                vec![format!("Unknown command '{other}'. Try: status, reset, quit")],
                ControlFlow::Continue(()),
            ),
        }
    }

    fn deliver(&self, out: Outcome) {
        for delivery in out {
            match delivery {
                Delivery::Broadcast(msg) => {
                    if !matches!(msg, ServerMsg::PhysicsUpdate(_)) {
                        debug!(event = msg.event_name(), conns = self.conns.len(), "Broadcast");
                    }
                    for tx in self.conns.values() {
                        let _ = tx.send(msg.clone());
                    }
                }
                Delivery::Reply(conn, msg) => {
                    debug!(conn = %conn, event = msg.event_name(), "Reply");
                    if let Some(tx) = self.conns.get(&conn) {
                        let _ = tx.send(msg);
                    }
                }
            }
        }
    }
}
