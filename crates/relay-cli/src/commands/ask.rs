//! `relay ask <agent> <message>`: one task, answer printed to stdout

use anyhow::{Result, bail};
use relay_a2a::client::is_connection_refused;
use relay_a2a::{A2aClient, TaskStatus};
use relay_core::{AgentKind, Settings};

pub async fn run(settings: &Settings, kind: AgentKind, message: &str) -> Result<()> {
    let endpoint = settings.endpoint(kind);
    let client = A2aClient::new(settings.client_timeout(kind))?;

    let task = match client
        .submit_task(&endpoint.url, message, serde_json::json!({}), true)
        .await
    {
        Ok(task) => task,
        Err(e) if is_connection_refused(&e) => bail!(
            "{} is not running at {}. Start it with `relay serve {}`.",
            kind.display_name(),
            endpoint.url,
            kind.key()
        ),
        Err(e) => return Err(e),
    };

    for call in &task.trace.tool_calls {
        println!("🔧 {} {}", call.name, call.args);
    }
    let text = task.result.unwrap_or_default();
    if task.status != TaskStatus::Completed {
        bail!("Task {} {}: {}", task.task_id, task.status, text);
    }
    println!("{}", text);
    Ok(())
}
