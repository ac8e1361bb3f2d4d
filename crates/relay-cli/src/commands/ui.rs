//! `relay ui`: run the browser chat front end

use anyhow::Result;
use relay_core::Settings;

pub async fn run(settings: Settings, host: Option<String>, port: Option<u16>) -> Result<()> {
    let host = host.unwrap_or_else(|| settings.agent_host.clone());
    let port = port.unwrap_or(settings.ui_port);
    let addr = format!("{}:{}", host, port);

    for issue in settings.validate() {
        tracing::warn!("Configuration: {}", issue);
    }
    println!("💬 {} on http://{}", settings.ui_title, addr);
    relay_gateway::serve(settings, &addr).await
}
