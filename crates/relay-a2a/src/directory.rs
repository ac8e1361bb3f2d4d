//! Known peer agents, by name

use anyhow::{Result, bail};
use relay_core::{AgentEndpoint, AgentKind, Settings};

/// Maps agent names (and short keys) to their endpoints
#[derive(Debug, Clone, Default)]
pub struct PeerDirectory {
    peers: Vec<AgentEndpoint>,
}

impl PeerDirectory {
    pub fn new(peers: Vec<AgentEndpoint>) -> Self {
        Self { peers }
    }

    /// Directory of the given agent kinds as configured in `settings`
    pub fn from_settings(settings: &Settings, kinds: &[AgentKind]) -> Self {
        Self::new(kinds.iter().map(|kind| settings.endpoint(*kind)).collect())
    }

    /// Look up a peer by agent name (`notion_agent`) or key (`notion`)
    pub fn resolve(&self, name: &str) -> Result<&AgentEndpoint> {
        let wanted = name.trim();
        match self.peers.iter().find(|p| {
            p.name.eq_ignore_ascii_case(wanted) || p.kind.key().eq_ignore_ascii_case(wanted)
        }) {
            Some(peer) => Ok(peer),
            None => bail!(
                "Unknown agent '{}'. Available agents: {}",
                name,
                self.names().join(", ")
            ),
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.peers.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn peers(&self) -> &[AgentEndpoint] {
        &self.peers
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
