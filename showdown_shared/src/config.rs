//! Configuration system.
//!
//! Server settings load from JSON or from the process environment
//! (`PORT`, `PUBLIC_DIR`); client settings are plain defaults.

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::math::Vec3;

/// Port used when `PORT` is unset.
pub const DEFAULT_PORT: u16 = 3000;

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// Interface to listen on.
    #[serde(default = "default_bind_host")]
    pub bind_host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Physics tick rate.
    #[serde(default = "default_tick_hz")]
    pub tick_hz: u32,
    /// Directory of static client assets.
    #[serde(default = "default_public_dir")]
    pub public_dir: String,
}

fn default_bind_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_tick_hz() -> u32 {
    60
}

fn default_public_dir() -> String {
    "public".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_host: default_bind_host(),
            port: default_port(),
            tick_hz: default_tick_hz(),
            public_dir: default_public_dir(),
        }
    }
}

impl ServerConfig {
    /// Parses config from JSON.
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    /// Reads overrides from the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads overrides through `lookup`, falling back to defaults.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(port) = lookup("PORT") {
            cfg.port = port
                .trim()
                .parse()
                .with_context(|| format!("parse PORT={port:?}"))?;
        }
        if let Some(dir) = lookup("PUBLIC_DIR") {
            cfg.public_dir = dir;
        }
        Ok(cfg)
    }

    /// `host:port` string to bind.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_host, self.port)
    }
}

/// Client presentation settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    /// Round length in seconds.
    pub round_secs: f32,
    /// Camera position on the menu and at round start.
    pub camera_home: Vec3,
    /// Offset from the winner's centroid for the showcase camera.
    pub showcase_offset: Vec3,
    /// Side length of the square ground plane centered at the origin.
    pub ground_size: f32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            round_secs: 120.0,
            camera_home: Vec3::new(0.0, 10.0, 10.0),
            showcase_offset: Vec3::new(0.0, 10.0, 10.0),
            ground_size: 20.0,
        }
    }
}
