//! `relay serve <agent>`: run one agent as an A2A service

use anyhow::{Result, bail};
use relay_a2a::A2aServer;
use relay_agents::AgentService;
use relay_core::{AgentKind, Settings};
use std::sync::Arc;
use tracing::{info, warn};

/// Apply `--host`/`--port` to the settings and return the address to bind
pub fn bind_address(
    settings: &mut Settings,
    kind: AgentKind,
    host: Option<String>,
    port: Option<u16>,
) -> String {
    if let Some(host) = host {
        settings.agent_host = host;
    }
    if let Some(port) = port {
        match kind {
            AgentKind::Notion => settings.notion_agent_port = port,
            AgentKind::ElevenLabs => settings.elevenlabs_agent_port = port,
            AgentKind::Host => settings.host_agent_port = port,
        }
    }
    let endpoint = settings.endpoint(kind);
    format!("{}:{}", endpoint.host, endpoint.port)
}

pub async fn run(
    mut settings: Settings,
    kind: AgentKind,
    host: Option<String>,
    port: Option<u16>,
    strict: bool,
) -> Result<()> {
    let issues = settings.validate();
    for issue in &issues {
        warn!("Configuration: {}", issue);
    }
    if strict && !issues.is_empty() {
        bail!("Refusing to start {}: {}", kind.agent_name(), issues.join("; "));
    }

    let addr = bind_address(&mut settings, kind, host, port);

    let service = Arc::new(AgentService::build(kind, &settings)?);
    let summary = service.summary();
    info!(
        agent = %summary.name,
        model = %summary.model,
        tools = summary.tools_count,
        skills = summary.skills.len(),
        "Starting {}",
        kind.display_name()
    );

    let server = Arc::new(A2aServer::new(
        service.card().clone(),
        service.clone(),
        settings.task_timeout(kind),
    ));
    let result = relay_a2a::server::serve(server, &addr).await;

    service.shutdown().await;
    info!("{} stopped", service.kind().display_name());
    result
}
