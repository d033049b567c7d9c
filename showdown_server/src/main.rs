//! Standalone server binary.
//!
//! Usage:
//!   PORT=3000 PUBLIC_DIR=public cargo run -p showdown_server
//!
//! Serves the client assets, accepts WebSocket connections at `/ws`, and runs
//! the session actor with its fixed-rate physics tick.
//!
//! Console commands:
//!   status  - Show session status
//!   reset   - End the current game (next join picks mode and theme)
//!   quit    - Shutdown server

use std::io::{BufRead, Write};

use anyhow::Context;
use showdown_server::{transport, GameServer, Session};
use showdown_shared::{config::ServerConfig, physics::RapierPhysics};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cfg = ServerConfig::from_env().context("load config")?;
    info!(addr = %cfg.listen_addr(), tick_hz = cfg.tick_hz, "Starting server");

    let session = Session::new(Box::new(RapierPhysics::default()));
    let (handle, actor) = GameServer::spawn(cfg.clone(), session);

    // Spawn stdin reader thread.
    let console = handle.clone();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut stdout = std::io::stdout();
        loop {
            print!("] ");
            let _ = stdout.flush();
            let mut line = String::new();
            match stdin.lock().read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match console.console_blocking(line) {
                Ok(output) => {
                    for out in output {
                        println!("{out}");
                    }
                }
                Err(_) => break,
            }
        }
    });

    tokio::select! {
        res = transport::serve(&cfg, handle) => res,
        res = actor => res.context("session actor panicked")?,
    }
}
