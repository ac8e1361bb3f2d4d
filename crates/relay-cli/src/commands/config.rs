//! `relay config`: show the effective configuration

use anyhow::Result;
use relay_core::Settings;

pub fn run(settings: &Settings, json: bool) -> Result<()> {
    let issues = settings.validate();

    if json {
        let output = serde_json::json!({
            "config": settings.summary(),
            "issues": issues,
            "agents": settings.endpoints().iter().map(|e| serde_json::json!({
                "name": e.name,
                "url": e.url,
                "port": e.port,
                "card_url": e.card_url(),
            })).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("⚙️  Relay Configuration\n");
    let summary = serde_json::to_value(settings.summary())?;
    if let Some(fields) = summary.as_object() {
        for (key, value) in fields {
            println!("  {:<24} {}", key, value);
        }
    }

    println!("\n  Agents:");
    for endpoint in settings.endpoints() {
        println!(
            "    {:<18} {} (listens on {}:{})",
            endpoint.name, endpoint.url, endpoint.host, endpoint.port
        );
    }

    println!();
    if issues.is_empty() {
        println!("  ✅ Configuration complete");
    } else {
        for issue in &issues {
            println!("  ⚠️  {}", issue);
        }
    }
    Ok(())
}
