//! Configuration loading, validation, and agent definitions for Foreman.
//!
//! Loads configuration from `$FOREMAN_CONFIG` or `~/.foreman/config.toml`
//! and validates every agent definition at load time, so the engine and the
//! dispatcher only ever see well-formed policy records.

use foreman_core::{Error, ModelRef, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// The hard ceiling on delegation depth, regardless of configuration.
pub const MAX_DEPTH_LIMIT: u32 = 5;

/// The root configuration structure.
///
/// Maps directly to `~/.foreman/config.toml`.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Defaults applied to agents that omit a setting
    #[serde(default)]
    pub defaults: Defaults,

    /// Provider-specific overrides (API key, base URL)
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderConfig>,

    /// Named agent definitions
    #[serde(default)]
    pub agents: BTreeMap<String, AgentDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Defaults {
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_model() -> String {
    "anthropic/claude-sonnet-4".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("defaults", &self.defaults)
            .field("providers", &self.providers)
            .field("agents", &self.agents)
            .finish()
    }
}

/// A named agent: prompt, model, and delegation/memory policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDef {
    /// Agent name; filled from the config table key on load
    #[serde(default, skip_serializing)]
    pub name: String,

    /// Model reference (`provider/model-name`); falls back to defaults
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// The system prompt
    pub prompt: String,

    /// Names of agents this agent may delegate to
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub agents: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(default)]
    pub delegation: DelegationPolicy,

    #[serde(default)]
    pub memory: MemoryPolicy,
}

impl AgentDef {
    /// The effective model reference for this agent.
    pub fn model_ref(&self, defaults: &Defaults) -> Result<ModelRef> {
        let reference = self.model.as_deref().unwrap_or(&defaults.model);
        ModelRef::parse(reference)
    }

    /// The effective sampling parameters.
    pub fn temperature(&self, defaults: &Defaults) -> f32 {
        self.temperature.unwrap_or(defaults.temperature)
    }

    pub fn max_tokens(&self, defaults: &Defaults) -> u32 {
        self.max_tokens.unwrap_or(defaults.max_tokens)
    }

    /// Whether this agent can delegate at all.
    pub fn can_delegate(&self) -> bool {
        !self.agents.is_empty()
    }
}

/// How an agent's delegations execute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelegationPolicy {
    /// Maximum recursion depth (0–5)
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    /// Parallel or sequential execution of one turn's requests
    #[serde(default)]
    pub mode: ExecutionMode,

    /// Hard cancellation bound per sub-call, in seconds
    #[serde(default = "default_sub_timeout")]
    pub timeout_secs: u64,
}

fn default_max_depth() -> u32 {
    3
}
fn default_sub_timeout() -> u64 {
    300
}

impl Default for DelegationPolicy {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            mode: ExecutionMode::default(),
            timeout_secs: default_sub_timeout(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    #[default]
    Parallel,
    Sequential,
}

/// Per-agent memory log policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryPolicy {
    #[serde(default)]
    pub enabled: bool,

    /// Custom log location; defaults to `~/.foreman/memory/<agent>.md`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// How many trailing entries to preload into the system prompt
    #[serde(default = "default_preload")]
    pub preload_last_n: usize,

    /// Soft warning threshold; 0 disables the warning
    #[serde(default)]
    pub max_entries: usize,

    /// Retention trim target; 0 means no target
    #[serde(default)]
    pub last_n: usize,
}

fn default_preload() -> usize {
    10
}

impl Default for MemoryPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            path: None,
            preload_last_n: default_preload(),
            max_entries: 0,
            last_n: 0,
        }
    }
}

impl Config {
    /// Load and validate configuration.
    ///
    /// Reads `$FOREMAN_CONFIG` if set, else `~/.foreman/config.toml`.
    pub fn load() -> Result<Self> {
        let path = match std::env::var_os("FOREMAN_CONFIG") {
            Some(p) => PathBuf::from(p),
            None => Self::config_dir().join("config.toml"),
        };
        Self::load_from(&path)
    }

    /// Load and validate configuration from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("Cannot read config file {}: {e}", path.display()),
        })?;

        let mut config: Config = toml::from_str(&raw).map_err(|e| Error::Config {
            message: format!("Malformed config file {}: {e}", path.display()),
        })?;

        for (name, agent) in config.agents.iter_mut() {
            agent.name = name.clone();
        }
        config.validate()?;

        debug!(
            path = %path.display(),
            agents = config.agents.len(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// The configuration directory: `~/.foreman`.
    pub fn config_dir() -> PathBuf {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(".foreman")
    }

    /// Validate every agent definition. Violations are Config-class errors.
    pub fn validate(&self) -> Result<()> {
        for (name, agent) in &self.agents {
            agent.model_ref(&self.defaults)?;

            if agent.delegation.max_depth > MAX_DEPTH_LIMIT {
                return Err(Error::Config {
                    message: format!(
                        "Agent '{name}': max_depth {} exceeds the limit of {MAX_DEPTH_LIMIT}",
                        agent.delegation.max_depth
                    ),
                });
            }

            for target in &agent.agents {
                if target == name {
                    return Err(Error::Config {
                        message: format!("Agent '{name}' cannot delegate to itself"),
                    });
                }
                if !self.agents.contains_key(target) {
                    return Err(Error::Config {
                        message: format!(
                            "Agent '{name}' delegates to undefined agent '{target}'"
                        ),
                    });
                }
            }
        }
        Ok(())
    }

    /// Look up an agent by name.
    pub fn agent(&self, name: &str) -> Result<&AgentDef> {
        self.agents.get(name).ok_or_else(|| Error::AgentNotFound {
            name: name.to_string(),
        })
    }

    /// All memory-enabled agents, in name order.
    pub fn memory_enabled_agents(&self) -> Vec<&AgentDef> {
        self.agents.values().filter(|a| a.memory.enabled).collect()
    }

    /// Resolve the memory log path for an agent.
    pub fn memory_path(&self, agent: &AgentDef) -> PathBuf {
        match &agent.memory.path {
            Some(custom) => custom.clone(),
            None => Self::config_dir()
                .join("memory")
                .join(format!("{}.md", agent.name)),
        }
    }

    /// Resolve the API key for a provider.
    ///
    /// Order: provider config entry, provider-specific env var, generic
    /// `FOREMAN_API_KEY`. Absence is an operational error surfaced before
    /// any network call.
    pub fn api_key(&self, provider: &str) -> Result<String> {
        if let Some(key) = self
            .providers
            .get(provider)
            .and_then(|p| p.api_key.clone())
        {
            return Ok(key);
        }

        let env_var = match provider {
            "anthropic" => "ANTHROPIC_API_KEY",
            "openai" => "OPENAI_API_KEY",
            "openrouter" => "OPENROUTER_API_KEY",
            _ => "FOREMAN_API_KEY",
        };
        if let Ok(key) = std::env::var(env_var) {
            if !key.is_empty() {
                return Ok(key);
            }
        }
        if let Ok(key) = std::env::var("FOREMAN_API_KEY") {
            if !key.is_empty() {
                return Ok(key);
            }
        }

        Err(Error::MissingApiKey {
            provider: provider.to_string(),
        })
    }

    /// The configured base URL override for a provider, if any.
    pub fn base_url(&self, provider: &str) -> Option<String> {
        self.providers.get(provider).and_then(|p| p.base_url.clone())
    }
}
