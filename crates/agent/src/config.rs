//! Agent configuration

use anyhow::{bail, Context, Result};
use colocation::hooks::HookServerConfig;
use colocation::{Labels, Selector};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

/// Environment variable prefix, e.g. `COLOCATION_API_PORT`
pub const ENV_PREFIX: &str = "COLOCATION";

/// Optional config file, read before the environment
pub const DEFAULT_AGENT_CONFIG_FILE: &str = "/etc/colocation/agent";

/// Feature gate for the runtime hook server
pub const FEATURE_RUNTIME_HOOKS: &str = "RuntimeHooks";

/// Agent configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Node name from Kubernetes downward API
    #[serde(default = "default_node_name")]
    pub node_name: String,

    /// Labels of the local node, `k=v,k2=v2`
    #[serde(default)]
    pub node_labels: String,

    /// API server port for health/metrics/strategy lookup
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Colocation config document to load and watch
    #[serde(default = "default_config_path")]
    pub config_path: PathBuf,

    /// Runtime hook transport: "tcp" or "unix"
    #[serde(default = "default_hook_network")]
    pub hook_network: String,

    /// Runtime hook listen address or socket path
    #[serde(default = "default_hook_addr")]
    pub hook_addr: String,

    /// Feature gates, `Name=true,Other=false`
    #[serde(default)]
    pub feature_gates: String,
}

fn default_node_name() -> String {
    std::env::var("NODE_NAME").unwrap_or_else(|_| "unknown".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_config_path() -> PathBuf {
    PathBuf::from("/etc/colocation/config.json")
}

fn default_hook_network() -> String {
    "unix".to_string()
}

fn default_hook_addr() -> String {
    "/var/run/colocation/hooks.sock".to_string()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            node_name: default_node_name(),
            node_labels: String::new(),
            api_port: default_api_port(),
            config_path: default_config_path(),
            hook_network: default_hook_network(),
            hook_addr: default_hook_addr(),
            feature_gates: String::new(),
        }
    }
}

impl AgentConfig {
    /// Load configuration from the optional config file and environment
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(DEFAULT_AGENT_CONFIG_FILE).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX))
            .build()
            .context("Failed to read agent configuration")?;

        config
            .try_deserialize()
            .context("Failed to parse agent configuration")
    }

    /// Parsed local node labels
    pub fn labels(&self) -> Result<Labels> {
        let labels = parse_pairs(&self.node_labels, |v| Ok(v.to_string()))
            .context("Invalid node_labels")?;
        Selector::from_labels(&labels).context("Invalid node_labels")?;
        Ok(labels)
    }

    /// Parsed feature gates with defaults applied
    pub fn feature_gates(&self) -> Result<HashMap<String, bool>> {
        let mut gates: HashMap<String, bool> = [(FEATURE_RUNTIME_HOOKS.to_string(), true)]
            .into_iter()
            .collect();

        let parsed = parse_pairs(&self.feature_gates, |v| {
            v.parse::<bool>()
                .with_context(|| format!("feature gate value {:?} is not a bool", v))
        })
        .context("Invalid feature_gates")?;

        for (name, enabled) in parsed {
            if !gates.contains_key(&name) {
                bail!("unknown feature gate {:?}", name);
            }
            gates.insert(name, enabled);
        }
        Ok(gates)
    }

    pub fn is_enabled(&self, gate: &str) -> Result<bool> {
        Ok(self.feature_gates()?.get(gate).copied().unwrap_or(false))
    }

    pub fn hook_server_config(&self) -> Result<HookServerConfig> {
        HookServerConfig::new(&self.hook_network, self.hook_addr.clone())
            .context("Invalid runtime hook configuration")
    }
}

fn parse_pairs<T, F>(s: &str, parse_value: F) -> Result<std::collections::BTreeMap<String, T>>
where
    F: Fn(&str) -> Result<T>,
{
    s.split(',')
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .map(|term| {
            let (k, v) = term
                .split_once('=')
                .with_context(|| format!("expected key=value, got {:?}", term))?;
            Ok((k.trim().to_string(), parse_value(v.trim())?))
        })
        .collect()
}
