//! Daemon configuration: a TOML file mapped onto the MAC constructor
//! parameters plus the host-side wiring (UDP radio bridge, application
//! ingress ports, management endpoint, tick period).

use std::path::Path;

use anyhow::Context;
use llsr_mac::MacConfig;
use llsr_mgmt::Endpoint;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub node: NodeSection,
    #[serde(default)]
    pub radio: RadioSection,
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub manager: ManagerSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeSection {
    pub addr: u8,
    #[serde(default = "default_base_timeout")]
    pub base_timeout: f64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u8,
    #[serde(default = "default_broadcast_interval")]
    pub broadcast_interval: f64,
    #[serde(default = "default_true")]
    pub exp_backoff: bool,
    #[serde(default = "default_backoff_randomness")]
    pub backoff_randomness: f64,
    #[serde(default = "default_node_expiry_delay")]
    pub node_expiry_delay: f64,
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,
    #[serde(default)]
    pub errors_to_file: bool,
    #[serde(default)]
    pub data_to_file: bool,
    #[serde(default)]
    pub debug_level: u8,
    #[serde(default = "default_secret_key")]
    pub secret_key: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RadioSection {
    /// Local UDP endpoint standing in for the radio.
    #[serde(default = "default_radio_listen")]
    pub listen: String,
    /// Every peer hears every frame, like the shared acoustic medium.
    #[serde(default)]
    pub peers: Vec<String>,
}

impl Default for RadioSection {
    fn default() -> Self {
        Self { listen: default_radio_listen(), peers: Vec::new() }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppSection {
    /// Application payloads sent without ARQ.
    #[serde(default = "default_app_listen")]
    pub listen: String,
    /// Application payloads sent with ARQ.
    #[serde(default = "default_app_listen_arq")]
    pub listen_arq: String,
    /// Control-tick period in seconds.
    #[serde(default = "default_tick_interval")]
    pub tick_interval: f64,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            listen: default_app_listen(),
            listen_arq: default_app_listen_arq(),
            tick_interval: default_tick_interval(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManagerSection {
    /// `unix:<path>` or `tcp:<addr:port>`; sink only. Defaults to the
    /// conventional local socket when the node is the sink.
    pub socket: Option<String>,
}

fn default_base_timeout() -> f64 {
    1.0
}
fn default_max_attempts() -> u8 {
    5
}
fn default_broadcast_interval() -> f64 {
    2.0
}
fn default_true() -> bool {
    true
}
fn default_backoff_randomness() -> f64 {
    0.05
}
fn default_node_expiry_delay() -> f64 {
    60.0
}
fn default_max_queue_size() -> usize {
    10
}
fn default_secret_key() -> String {
    "12345".to_string()
}
fn default_radio_listen() -> String {
    "127.0.0.1:47000".to_string()
}
fn default_app_listen() -> String {
    "127.0.0.1:47100".to_string()
}
fn default_app_listen_arq() -> String {
    "127.0.0.1:47101".to_string()
}
fn default_tick_interval() -> f64 {
    1.0
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Config =
            toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    pub fn mac_config(&self) -> MacConfig {
        let node = &self.node;
        MacConfig {
            addr: node.addr,
            base_timeout: node.base_timeout,
            max_attempts: node.max_attempts,
            broadcast_interval: node.broadcast_interval,
            exp_backoff: node.exp_backoff,
            backoff_randomness: node.backoff_randomness,
            node_expiry_delay: node.node_expiry_delay,
            max_queue_size: node.max_queue_size,
            errors_to_file: node.errors_to_file,
            data_to_file: node.data_to_file,
            debug_level: node.debug_level,
            secret_key: node.secret_key.clone(),
        }
    }

    /// Management endpoint for the sink; non-sink nodes get none.
    pub fn manager_endpoint(&self) -> anyhow::Result<Option<Endpoint>> {
        if self.node.addr != llsr_mac::SINK_ADDR {
            return Ok(None);
        }
        let Some(socket) = &self.manager.socket else {
            return Ok(Some(Endpoint::default()));
        };
        if let Some(path) = socket.strip_prefix("unix:") {
            return Ok(Some(Endpoint::Unix(path.into())));
        }
        if let Some(addr) = socket.strip_prefix("tcp:") {
            let addr = addr.parse().with_context(|| format!("bad tcp endpoint {addr}"))?;
            return Ok(Some(Endpoint::Tcp(addr)));
        }
        anyhow::bail!("manager socket must start with unix: or tcp:, got {socket}");
    }
}
