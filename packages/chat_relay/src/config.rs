use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use relay_core::HubConfig;
use serde::{Deserialize, Serialize};

// =============================================================================
// Unified config (figment-deserialized from defaults / relay.toml / env vars)
// =============================================================================
//
// Equivalent ways to configure:
//
//   relay.toml:      [server]
//                    port = 8080
//
//   env var:         RELAY_SERVER__PORT=8080   (double underscore = nesting)
//                    PORT=8080                 (hosting platforms set this)
//
//   (single underscore stays within field names: RELAY_HISTORY__MAX_MESSAGES)

/// Config file looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "relay.toml";

/// Top-level tunable configuration, deserialized by figment.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerFileConfig,
    #[serde(default)]
    pub history: HistoryFileConfig,
    #[serde(default)]
    pub connection: ConnectionFileConfig,
}

/// Listener settings (lives under `[server]`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerFileConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerFileConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Chat history retention (lives under `[history]`).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct HistoryFileConfig {
    /// Oldest lines are evicted past this many. Unset or 0 keeps everything.
    #[serde(default)]
    pub max_messages: Option<usize>,
}

/// Per-connection tunables (lives under `[connection]`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConnectionFileConfig {
    #[serde(default = "default_outbound_capacity")]
    pub outbound_capacity: usize,
    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,
}

impl Default for ConnectionFileConfig {
    fn default() -> Self {
        Self {
            outbound_capacity: default_outbound_capacity(),
            send_timeout_secs: default_send_timeout_secs(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    3000
}
fn default_outbound_capacity() -> usize {
    relay_core::hub::DEFAULT_OUTBOUND_CAPACITY
}
fn default_send_timeout_secs() -> u64 {
    10
}

/// Build a figment that layers: defaults → relay.toml → PORT → RELAY_* env vars.
///
/// Env vars use double-underscore for nesting into sections:
///   `RELAY_SERVER__HOST=127.0.0.1`  →  `server.host = "127.0.0.1"`
///   `RELAY_CONNECTION__SEND_TIMEOUT_SECS=5`  →  `connection.send_timeout_secs = 5`
pub fn load_config(config_file: &Path) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    Figment::from(Serialized::defaults(FileConfig::default()))
        .merge(Toml::file(config_file))
        .merge(Env::raw().only(&["PORT"]).map(|_| "server.port".into()))
        .merge(Env::prefixed("RELAY_").split("__"))
}

// =============================================================================
// Runtime config (derived from FileConfig, used throughout the server)
// =============================================================================

#[derive(Clone, Debug)]
pub struct RelayConfig {
    pub host: String,
    pub port: u16,
    pub hub: HubConfig,
    /// A socket write taking longer than this closes the connection.
    pub send_timeout: Duration,
}

impl RelayConfig {
    pub fn from_file(fc: &FileConfig) -> Self {
        Self {
            host: fc.server.host.clone(),
            port: fc.server.port,
            hub: HubConfig {
                history_capacity: fc.history.max_messages.and_then(NonZeroUsize::new),
                outbound_capacity: fc.connection.outbound_capacity,
            },
            send_timeout: Duration::from_secs(fc.connection.send_timeout_secs),
        }
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse::<SocketAddr>()
            .with_context(|| format!("Invalid listen address {}:{}", self.host, self.port))
    }
}
