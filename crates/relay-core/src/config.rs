//! Settings loaded from environment variables
//!
//! Every value has a documented default; a variable that is set (and not blank)
//! overrides it. Malformed values are rejected with the variable's name.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

/// Path every agent serves its card on; doubles as the health-check path
pub const AGENT_CARD_PATH: &str = "/.well-known/agent.json";

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Extra time a caller waits beyond the callee's own task budget
const CLIENT_SLACK: Duration = Duration::from_secs(5);

/// Delegations one host turn is budgeted for
const HOST_TURN_DELEGATIONS: u32 = 3;

/// The three agent processes of the topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    Notion,
    ElevenLabs,
    Host,
}

impl AgentKind {
    /// Start order: workers before the orchestrator that calls them
    pub const ALL: [AgentKind; 3] = [AgentKind::Notion, AgentKind::ElevenLabs, AgentKind::Host];

    /// Short key used on the command line and in log file names
    pub fn key(&self) -> &'static str {
        match self {
            Self::Notion => "notion",
            Self::ElevenLabs => "elevenlabs",
            Self::Host => "host",
        }
    }

    /// Logical agent name used for delegation and in agent cards
    pub fn agent_name(&self) -> &'static str {
        match self {
            Self::Notion => "notion_agent",
            Self::ElevenLabs => "elevenlabs_agent",
            Self::Host => "host_agent",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Notion => "Notion Agent",
            Self::ElevenLabs => "ElevenLabs Agent",
            Self::Host => "Host Agent",
        }
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl FromStr for AgentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        AgentKind::ALL
            .into_iter()
            .find(|k| k.key() == needle || k.agent_name() == needle)
            .ok_or_else(|| {
                format!(
                    "unknown agent '{}' (available: {})",
                    s,
                    AgentKind::ALL.map(|k| k.key()).join(", ")
                )
            })
    }
}

/// Where an agent listens and how to reach it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentEndpoint {
    pub kind: AgentKind,
    pub name: String,
    pub host: String,
    pub port: u16,
    pub url: String,
    pub health_path: String,
}

impl AgentEndpoint {
    /// Full URL of the agent card
    pub fn card_url(&self) -> String {
        format!("{}{}", self.url.trim_end_matches('/'), self.health_path)
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got '{value}'")]
    InvalidValue {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Process-wide settings, fixed for the process lifetime
#[derive(Clone)]
pub struct Settings {
    pub google_api_key: String,
    pub notion_api_key: String,
    pub elevenlabs_api_key: String,
    pub elevenlabs_voice_id: String,
    pub model: String,
    pub agent_host: String,
    pub host_agent_port: u16,
    pub notion_agent_port: u16,
    pub elevenlabs_agent_port: u16,
    pub host_agent_url: String,
    pub notion_agent_url: String,
    pub elevenlabs_agent_url: String,
    pub a2a_timeout_secs: u64,
    pub mcp_timeout_secs: u64,
    pub mcp_retry_attempts: u32,
    pub log_level: String,
    pub log_to_file: bool,
    pub log_dir: PathBuf,
    pub ui_port: u16,
    pub ui_title: String,
    pub debug: bool,
    pub development_mode: bool,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn mask(s: &str) -> &str {
            if s.is_empty() { "(empty)" } else { "***" }
        }
        f.debug_struct("Settings")
            .field("google_api_key", &mask(&self.google_api_key))
            .field("notion_api_key", &mask(&self.notion_api_key))
            .field("elevenlabs_api_key", &mask(&self.elevenlabs_api_key))
            .field("elevenlabs_voice_id", &self.elevenlabs_voice_id)
            .field("model", &self.model)
            .field("agent_host", &self.agent_host)
            .field("host_agent_url", &self.host_agent_url)
            .field("notion_agent_url", &self.notion_agent_url)
            .field("elevenlabs_agent_url", &self.elevenlabs_agent_url)
            .field("a2a_timeout_secs", &self.a2a_timeout_secs)
            .field("mcp_timeout_secs", &self.mcp_timeout_secs)
            .field("mcp_retry_attempts", &self.mcp_retry_attempts)
            .field("log_level", &self.log_level)
            .field("log_to_file", &self.log_to_file)
            .field("log_dir", &self.log_dir)
            .field("ui_port", &self.ui_port)
            .field("ui_title", &self.ui_title)
            .field("debug", &self.debug)
            .field("development_mode", &self.development_mode)
            .finish()
    }
}

/// Non-sensitive view of the settings
#[derive(Debug, Clone, Serialize)]
pub struct ConfigSummary {
    pub google_api_key_set: bool,
    pub notion_api_key_set: bool,
    pub elevenlabs_api_key_set: bool,
    pub model: String,
    pub notion_agent_port: u16,
    pub elevenlabs_agent_port: u16,
    pub host_agent_port: u16,
    pub ui_port: u16,
    pub a2a_timeout_secs: u64,
    pub mcp_timeout_secs: u64,
    pub mcp_retry_attempts: u32,
    pub log_level: String,
    pub log_to_file: bool,
    pub debug: bool,
}

impl Settings {
    /// Load settings from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let agent_host = get("AGENT_HOST").unwrap_or_else(|| "localhost".to_string());
        let host_agent_port = parse_number(&get, "HOST_AGENT_PORT", 8001u16)?;
        let notion_agent_port = parse_number(&get, "NOTION_AGENT_PORT", 8002u16)?;
        let elevenlabs_agent_port = parse_number(&get, "ELEVENLABS_AGENT_PORT", 8003u16)?;

        let default_url = |port: u16| format!("http://{}:{}", agent_host, port);
        let host_agent_url = parse_url(&get, "HOST_AGENT_URL", default_url(host_agent_port))?;
        let notion_agent_url =
            parse_url(&get, "NOTION_AGENT_URL", default_url(notion_agent_port))?;
        let elevenlabs_agent_url = parse_url(
            &get,
            "ELEVENLABS_AGENT_URL",
            default_url(elevenlabs_agent_port),
        )?;

        Ok(Self {
            google_api_key: get("GOOGLE_API_KEY").unwrap_or_default(),
            notion_api_key: get("NOTION_API_KEY").unwrap_or_default(),
            elevenlabs_api_key: get("ELEVENLABS_API_KEY").unwrap_or_default(),
            elevenlabs_voice_id: get("ELEVENLABS_VOICE_ID")
                .unwrap_or_else(|| "default".to_string()),
            model: get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            agent_host,
            host_agent_port,
            notion_agent_port,
            elevenlabs_agent_port,
            host_agent_url,
            notion_agent_url,
            elevenlabs_agent_url,
            a2a_timeout_secs: parse_positive(&get, "A2A_TIMEOUT", 60)?,
            mcp_timeout_secs: parse_positive(&get, "MCP_TIMEOUT", 180)?,
            mcp_retry_attempts: parse_number(&get, "MCP_RETRY_ATTEMPTS", 3u32)?,
            log_level: get("LOG_LEVEL").unwrap_or_else(|| "INFO".to_string()),
            log_to_file: parse_bool(&get, "LOG_TO_FILE", true)?,
            log_dir: get("LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("logs")),
            ui_port: parse_number(&get, "UI_PORT", 8080u16)?,
            ui_title: get("UI_TITLE").unwrap_or_else(|| "ADK A2A Assistant".to_string()),
            debug: parse_bool(&get, "DEBUG", false)?,
            development_mode: parse_bool(&get, "DEVELOPMENT_MODE", false)?,
        })
    }

    /// Presence checks for the required API keys
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.google_api_key.is_empty() {
            errors.push("GOOGLE_API_KEY is required".to_string());
        }
        if self.notion_api_key.is_empty() {
            errors.push("NOTION_API_KEY is required".to_string());
        }
        if self.elevenlabs_api_key.is_empty() {
            errors.push("ELEVENLABS_API_KEY is required".to_string());
        }
        errors
    }

    pub fn summary(&self) -> ConfigSummary {
        ConfigSummary {
            google_api_key_set: !self.google_api_key.is_empty(),
            notion_api_key_set: !self.notion_api_key.is_empty(),
            elevenlabs_api_key_set: !self.elevenlabs_api_key.is_empty(),
            model: self.model.clone(),
            notion_agent_port: self.notion_agent_port,
            elevenlabs_agent_port: self.elevenlabs_agent_port,
            host_agent_port: self.host_agent_port,
            ui_port: self.ui_port,
            a2a_timeout_secs: self.a2a_timeout_secs,
            mcp_timeout_secs: self.mcp_timeout_secs,
            mcp_retry_attempts: self.mcp_retry_attempts,
            log_level: self.log_level.clone(),
            log_to_file: self.log_to_file,
            debug: self.debug,
        }
    }

    /// Endpoint descriptor for one agent
    pub fn endpoint(&self, kind: AgentKind) -> AgentEndpoint {
        let (port, url) = match kind {
            AgentKind::Host => (self.host_agent_port, &self.host_agent_url),
            AgentKind::Notion => (self.notion_agent_port, &self.notion_agent_url),
            AgentKind::ElevenLabs => (self.elevenlabs_agent_port, &self.elevenlabs_agent_url),
        };
        AgentEndpoint {
            kind,
            name: kind.agent_name().to_string(),
            host: self.agent_host.clone(),
            port,
            url: url.trim_end_matches('/').to_string(),
            health_path: AGENT_CARD_PATH.to_string(),
        }
    }

    /// Endpoint descriptors for every agent, in start order
    pub fn endpoints(&self) -> Vec<AgentEndpoint> {
        AgentKind::ALL.iter().map(|k| self.endpoint(*k)).collect()
    }

    /// `A2A_TIMEOUT`: the budget of one worker task
    pub fn a2a_timeout(&self) -> Duration {
        Duration::from_secs(self.a2a_timeout_secs)
    }

    /// `MCP_TIMEOUT`: the limit on one MCP request
    pub fn mcp_timeout(&self) -> Duration {
        Duration::from_secs(self.mcp_timeout_secs)
    }

    /// Server-side budget for one task of `kind`. A host turn may delegate
    /// several times, so it gets room for that many worker round trips.
    pub fn task_timeout(&self, kind: AgentKind) -> Duration {
        match kind {
            AgentKind::Host => (self.a2a_timeout() + CLIENT_SLACK) * HOST_TURN_DELEGATIONS,
            AgentKind::Notion | AgentKind::ElevenLabs => self.a2a_timeout(),
        }
    }

    /// How long a caller waits for a task of `kind`; always longer than the
    /// agent's own task budget so the agent reports its outcome first
    pub fn client_timeout(&self, kind: AgentKind) -> Duration {
        self.task_timeout(kind) + CLIENT_SLACK
    }

    /// Limit on one remote tool call inside a worker task. It expires before
    /// the task budget, leaving time to answer with the canned reply.
    pub fn tool_call_timeout(&self) -> Duration {
        self.a2a_timeout() * 3 / 4
    }
}

fn parse_number<T, F>(get: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match get(var) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue {
                var,
                expected: "a non-negative integer",
                value: raw,
            }),
        None => Ok(default),
    }
}

fn parse_positive<F>(get: &F, var: &'static str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match parse_number(get, var, default)? {
        0 => Err(ConfigError::InvalidValue {
            var,
            expected: "a positive integer",
            value: "0".to_string(),
        }),
        n => Ok(n),
    }
}

fn parse_bool<F>(get: &F, var: &'static str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match get(var) {
        Some(raw) => match raw.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue {
                var,
                expected: "true or false",
                value: raw,
            }),
        },
        None => Ok(default),
    }
}

fn parse_url<F>(get: &F, var: &'static str, default: String) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = get(var).unwrap_or(default);
    match Url::parse(raw.trim()) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {
            Ok(raw.trim().trim_end_matches('/').to_string())
        }
        _ => Err(ConfigError::InvalidValue {
            var,
            expected: "an http(s) URL",
            value: raw,
        }),
    }
}
