// src/settings.rs
//! Runtime settings.
//!
//! Layered, lowest precedence first: built-in defaults, an optional
//! `config/default.{toml,json,yaml}` file, then `ANCHOR__*` environment
//! variables (`ANCHOR__SERVER__PORT=8080`). `.env` is loaded by `main`
//! before the settings are read.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct VerificationSettings {
    /// snarkjs-format verification key
    pub key_path: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Settings {
    pub server: ServerSettings,
    pub verification: VerificationSettings,
}

impl Settings {
    /// Reads settings from the default file and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_builder(
            Config::builder()
                .add_source(File::with_name("config/default").required(false))
                .add_source(Environment::with_prefix("ANCHOR").separator("__")),
        )
    }

    fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, ConfigError> {
        builder
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .set_default("verification.key_path", "verification_key.json")?
            .build()?
            .try_deserialize()
    }

    /// Socket address the API server binds to.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self.server.host.parse().map_err(|_| {
            ConfigError::Message(format!("server.host `{}` is not an IP address", self.server.host))
        })?;
        Ok(SocketAddr::new(ip, self.server.port))
    }
}
