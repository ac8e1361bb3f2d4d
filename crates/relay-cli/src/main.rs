//! Relay CLI: run the agents and the chat UI
//!
//! Commands:
//! - `serve`  run one agent service
//! - `ui`     run the browser chat UI
//! - `start`  launch agent processes and supervise them
//! - `doctor` check the local setup
//! - `config` show the effective configuration
//! - `ask`    send one task to an agent

use anyhow::Result;
use clap::{Parser, Subcommand};
use relay_core::{AgentKind, Settings};
use tracing::warn;

mod commands;
mod logging;

#[derive(Parser)]
#[command(
    name = "relay",
    about = "Relay: a host agent delegating to Notion and ElevenLabs agents over A2A",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one agent service
    Serve {
        /// notion, elevenlabs or host
        agent: AgentKind,

        /// Interface to bind (default: AGENT_HOST)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind (default: the agent's configured port)
        #[arg(long)]
        port: Option<u16>,

        /// Refuse to start when configuration is incomplete
        #[arg(long)]
        strict: bool,
    },

    /// Run the browser chat UI
    Ui {
        /// Interface to bind (default: AGENT_HOST)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind (default: UI_PORT)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Start agent processes and keep them running until Ctrl+C
    Start {
        /// "all" or a comma-separated list, e.g. notion,host
        #[arg(long, default_value = "all")]
        agents: String,

        /// Seconds to wait for each agent to answer
        #[arg(long, default_value_t = 30)]
        timeout: u64,

        /// Do not wait for agents to become ready
        #[arg(long)]
        no_wait: bool,
    },

    /// Check API keys, tools, log directory and agent ports
    Doctor,

    /// Show the configuration summary and any issues
    Config {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Send one task to an agent and print the answer
    Ask {
        /// notion, elevenlabs or host
        agent: AgentKind,

        /// Task text
        #[arg(required = true, num_args = 1..)]
        message: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::from_env();

    let level = settings
        .as_ref()
        .map(|s| s.log_level.clone())
        .unwrap_or_else(|_| "info".to_string());

    // Agent services also log to {LOG_DIR}/{agent}.log
    let mut file_error = None;
    let log_file = match (&cli.command, &settings) {
        (Commands::Serve { agent, .. }, Ok(s)) if s.log_to_file => {
            match logging::open_log_file(&s.log_dir, &format!("{}.log", agent.agent_name())) {
                Ok(file) => Some(file),
                Err(e) => {
                    file_error = Some(e);
                    None
                }
            }
        }
        _ => None,
    };
    logging::init(&level, cli.verbose, log_file);
    if let Some(e) = file_error {
        warn!("File logging disabled: {:#}", e);
    }

    let settings = settings?;

    match cli.command {
        Commands::Serve {
            agent,
            host,
            port,
            strict,
        } => commands::serve::run(settings, agent, host, port, strict).await,
        Commands::Ui { host, port } => commands::ui::run(settings, host, port).await,
        Commands::Start {
            agents,
            timeout,
            no_wait,
        } => commands::start::run(&settings, &agents, timeout, no_wait).await,
        Commands::Doctor => commands::doctor::run(&settings).await,
        Commands::Config { json } => commands::config::run(&settings, json),
        Commands::Ask { agent, message } => {
            commands::ask::run(&settings, agent, &message.join(" ")).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serve() {
        let cli = Cli::try_parse_from(["relay", "serve", "notion", "--port", "9000", "--strict"])
            .unwrap();
        match cli.command {
            Commands::Serve {
                agent, port, strict, ..
            } => {
                assert_eq!(agent, AgentKind::Notion);
                assert_eq!(port, Some(9000));
                assert!(strict);
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn test_parse_agent_name_form() {
        let cli = Cli::try_parse_from(["relay", "ask", "elevenlabs_agent", "say", "hi"]).unwrap();
        match cli.command {
            Commands::Ask { agent, message } => {
                assert_eq!(agent, AgentKind::ElevenLabs);
                assert_eq!(message.join(" "), "say hi");
            }
            _ => panic!("expected ask"),
        }
    }

    #[test]
    fn test_unknown_agent_rejected() {
        let err = Cli::try_parse_from(["relay", "serve", "weather"])
            .err()
            .unwrap()
            .to_string();
        assert!(err.contains("unknown agent 'weather'"));
        assert!(err.contains("notion, elevenlabs, host"));
    }

    #[test]
    fn test_start_defaults() {
        let cli = Cli::try_parse_from(["relay", "-v", "start"]).unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Start {
                agents,
                timeout,
                no_wait,
            } => {
                assert_eq!(agents, "all");
                assert_eq!(timeout, 30);
                assert!(!no_wait);
            }
            _ => panic!("expected start"),
        }
    }

    #[test]
    fn test_ask_requires_message() {
        assert!(Cli::try_parse_from(["relay", "ask", "host"]).is_err());
    }
}
