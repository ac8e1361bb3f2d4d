//! `relay start`: launch agent processes and supervise them until Ctrl+C

use anyhow::{Context, Result, bail};
use relay_a2a::A2aClient;
use relay_core::{AgentEndpoint, AgentKind, Settings};
use std::path::Path;
use std::process::Stdio;
use std::str::FromStr;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{info, warn};

use crate::logging::open_log_file;

/// Grace period for a child to exit after Ctrl+C before it is killed
const STOP_GRACE: Duration = Duration::from_secs(5);

/// How often the supervisor checks on its children
const MONITOR_INTERVAL: Duration = Duration::from_secs(2);

struct AgentProcess {
    kind: AgentKind,
    endpoint: AgentEndpoint,
    child: Child,
}

/// Parse `all` or a comma-separated agent list, returned in start order
pub fn parse_agent_list(spec: &str) -> Result<Vec<AgentKind>> {
    if spec.trim().eq_ignore_ascii_case("all") {
        return Ok(AgentKind::ALL.to_vec());
    }
    let mut selected = Vec::new();
    for part in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let kind = AgentKind::from_str(part).map_err(anyhow::Error::msg)?;
        if !selected.contains(&kind) {
            selected.push(kind);
        }
    }
    if selected.is_empty() {
        bail!("No agents selected (available: notion, elevenlabs, host, all)");
    }
    // Workers come up before the host that delegates to them
    selected.sort_by_key(|k| AgentKind::ALL.iter().position(|a| a == k));
    Ok(selected)
}

fn spawn_agent(exe: &Path, kind: AgentKind, log_dir: &Path) -> Result<Child> {
    let stdout = open_log_file(log_dir, &format!("{}_stdout.log", kind.agent_name()))?;
    let stderr = open_log_file(log_dir, &format!("{}_stderr.log", kind.agent_name()))?;
    Command::new(exe)
        .arg("serve")
        .arg(kind.key())
        .env("LOG_TO_FILE", "false")
        .stdin(Stdio::null())
        .stdout(stdout)
        .stderr(stderr)
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("Failed to start {}", kind.display_name()))
}

pub async fn run(settings: &Settings, agents: &str, timeout: u64, no_wait: bool) -> Result<()> {
    let kinds = parse_agent_list(agents)?;
    let exe = std::env::current_exe().context("Cannot locate the relay executable")?;
    let probe = A2aClient::new(Duration::from_secs(2))?;
    let log_dir = settings.log_dir.display().to_string();

    println!("🚀 Starting {} agent(s)\n", kinds.len());
    let mut processes: Vec<AgentProcess> = Vec::new();
    for kind in kinds {
        let endpoint = settings.endpoint(kind);
        if probe.fetch_agent_card(&endpoint.url).await.is_ok() {
            println!("  ⏭️  {} already running at {}", kind.display_name(), endpoint.url);
            continue;
        }

        let child = match spawn_agent(&exe, kind, &settings.log_dir) {
            Ok(child) => child,
            Err(e) => {
                stop_all(&mut processes).await;
                return Err(e);
            }
        };
        info!(agent = kind.agent_name(), pid = child.id(), "Spawned agent process");

        if no_wait {
            println!("  🟡 {} launched ({})", kind.display_name(), endpoint.url);
        } else {
            match probe
                .wait_until_ready(&endpoint.url, Duration::from_secs(timeout))
                .await
            {
                Ok(_) => println!("  ✅ {} ready at {}", kind.display_name(), endpoint.url),
                Err(e) => println!(
                    "  ❌ {}: {:#} (see {}/{}_stderr.log)",
                    kind.display_name(),
                    e,
                    log_dir,
                    kind.agent_name()
                ),
            }
        }
        processes.push(AgentProcess {
            kind,
            endpoint,
            child,
        });
    }

    if processes.is_empty() {
        println!("\n  Nothing to start.");
        return Ok(());
    }

    println!("\n  Logs in {}. Press Ctrl+C to stop.", log_dir);
    let mut ticker = tokio::time::interval(MONITOR_INTERVAL);
    let outcome = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break Ok(()),
            _ = ticker.tick() => {
                reap_exited(&mut processes);
                if processes.is_empty() {
                    break Err(anyhow::anyhow!("All agents exited; see logs in {}", log_dir));
                }
            }
        }
    };

    println!("\n  🛑 Stopping agents...");
    stop_all(&mut processes).await;
    outcome
}

/// Drop children that have exited, reporting each one
fn reap_exited(processes: &mut Vec<AgentProcess>) {
    processes.retain_mut(|p| match p.child.try_wait() {
        Ok(Some(status)) => {
            warn!(agent = p.kind.agent_name(), %status, "Agent process exited");
            println!(
                "  💀 {} exited ({}), was serving {}",
                p.kind.display_name(),
                status,
                p.endpoint.url
            );
            false
        }
        Ok(None) => true,
        Err(e) => {
            warn!("Cannot poll {}: {}", p.kind.agent_name(), e);
            true
        }
    });
}

async fn stop_all(processes: &mut Vec<AgentProcess>) {
    for p in processes.iter_mut() {
        request_stop(&mut p.child);
    }
    // Host first, then the workers it was calling
    for p in processes.iter_mut().rev() {
        if tokio::time::timeout(STOP_GRACE, p.child.wait()).await.is_err() {
            warn!("{} ignored the stop request, killing it", p.kind.agent_name());
            let _ = p.child.kill().await;
        }
        println!("  ⏹️  {} stopped", p.kind.display_name());
    }
    processes.clear();
}

/// Ask a child to shut down the way Ctrl+C would, so it can stop its tool servers
fn request_stop(child: &mut Child) {
    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            // SAFETY: `pid` is a child this process spawned and has not reaped yet
            unsafe {
                libc::kill(pid as libc::pid_t, libc::SIGINT);
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = child.start_kill();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_agents_in_start_order() {
        assert_eq!(
            parse_agent_list("all").unwrap(),
            vec![AgentKind::Notion, AgentKind::ElevenLabs, AgentKind::Host]
        );
        assert_eq!(parse_agent_list(" ALL ").unwrap().len(), 3);
    }

    #[test]
    fn test_list_is_sorted_and_deduplicated() {
        assert_eq!(
            parse_agent_list("host, notion,host").unwrap(),
            vec![AgentKind::Notion, AgentKind::Host]
        );
    }

    #[test]
    fn test_unknown_agent_is_rejected() {
        let err = parse_agent_list("notion,weather").unwrap_err().to_string();
        assert!(err.contains("unknown agent 'weather'"));
    }

    #[test]
    fn test_empty_list_is_rejected() {
        assert!(parse_agent_list(" , ").is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stop_all_signals_children() {
        let settings = Settings::from_lookup(|_| None).unwrap();
        let mut processes = vec![AgentProcess {
            kind: AgentKind::ElevenLabs,
            endpoint: settings.endpoint(AgentKind::ElevenLabs),
            child: Command::new("sleep").arg("30").spawn().unwrap(),
        }];
        let started = std::time::Instant::now();
        stop_all(&mut processes).await;
        assert!(processes.is_empty());
        // Interrupted right away instead of waiting out the grace period
        assert!(started.elapsed() < STOP_GRACE);
    }

    #[tokio::test]
    async fn test_reap_exited_drops_finished_children() {
        let settings = Settings::from_lookup(|_| None).unwrap();
        let child = Command::new("true").spawn().unwrap();
        let mut processes = vec![AgentProcess {
            kind: AgentKind::Notion,
            endpoint: settings.endpoint(AgentKind::Notion),
            child,
        }];
        for _ in 0..50 {
            reap_exited(&mut processes);
            if processes.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(processes.is_empty());
    }
}
