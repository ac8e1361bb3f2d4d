//! Doctor: setup self-check
//!
//! Verifies API keys, the MCP launchers (`npx`, `uvx`), the log directory,
//! and that each agent port is either free or serving the right agent.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::{Host, Url};

use crate::config::{AgentEndpoint, Settings};

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Result of a single check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub fix_hint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
    Skip,
}

impl std::fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckStatus::Pass => write!(f, "PASS"),
            CheckStatus::Warn => write!(f, "WARN"),
            CheckStatus::Fail => write!(f, "FAIL"),
            CheckStatus::Skip => write!(f, "SKIP"),
        }
    }
}

impl CheckResult {
    fn new(name: impl Into<String>, status: CheckStatus, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status,
            message: message.into(),
            fix_hint: None,
        }
    }

    fn hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }
}

/// Full doctor report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorReport {
    pub checks: Vec<CheckResult>,
    pub pass_count: usize,
    pub warn_count: usize,
    pub fail_count: usize,
    pub skip_count: usize,
}

impl DoctorReport {
    pub fn from_checks(checks: Vec<CheckResult>) -> Self {
        let count = |s: CheckStatus| checks.iter().filter(|c| c.status == s).count();
        Self {
            pass_count: count(CheckStatus::Pass),
            warn_count: count(CheckStatus::Warn),
            fail_count: count(CheckStatus::Fail),
            skip_count: count(CheckStatus::Skip),
            checks,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.fail_count == 0
    }

    pub fn summary(&self) -> String {
        format!(
            "{} passed, {} warnings, {} failed, {} skipped",
            self.pass_count, self.warn_count, self.fail_count, self.skip_count
        )
    }
}

/// Run every check against the given settings
pub async fn run_doctor(settings: &Settings) -> DoctorReport {
    info!("Running doctor checks...");
    let mut checks = vec![
        check_api_key("GOOGLE_API_KEY", &settings.google_api_key, true),
        check_api_key("NOTION_API_KEY", &settings.notion_api_key, false),
        check_api_key("ELEVENLABS_API_KEY", &settings.elevenlabs_api_key, false),
        check_command("npx", &["--version"], "npx (Notion MCP server)"),
        check_command("uvx", &["--version"], "uvx (ElevenLabs MCP server)"),
        check_log_dir(&settings.log_dir),
    ];

    for endpoint in settings.endpoints() {
        checks.push(check_agent(&endpoint).await);
    }

    let report = DoctorReport::from_checks(checks);
    if report.is_healthy() {
        info!("Doctor: no failures ({})", report.summary());
    } else {
        warn!("Doctor: issues found ({})", report.summary());
    }
    report
}

fn check_api_key(var: &str, value: &str, required: bool) -> CheckResult {
    let name = format!("api_key_{}", var.to_lowercase());
    if value.is_empty() {
        let status = if required {
            CheckStatus::Fail
        } else {
            CheckStatus::Warn
        };
        let message = if required {
            format!("{} is not set", var)
        } else {
            format!("{} is not set (canned replies will be used)", var)
        };
        return CheckResult::new(name, status, message)
            .hint(format!("export {}=\"your-api-key\"", var));
    }

    let masked = if value.chars().count() > 8 {
        let head: String = value.chars().take(4).collect();
        let tail: String = value
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("{}...{}", head, tail)
    } else {
        "****".to_string()
    };
    CheckResult::new(name, CheckStatus::Pass, format!("{} is set ({})", var, masked))
}

fn check_command(cmd: &str, args: &[&str], display_name: &str) -> CheckResult {
    match std::process::Command::new(cmd)
        .args(args)
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
    {
        Ok(status) if status.success() => CheckResult::new(
            format!("command_{}", cmd),
            CheckStatus::Pass,
            format!("{} is available", display_name),
        ),
        _ => CheckResult::new(
            format!("command_{}", cmd),
            CheckStatus::Warn,
            format!("{} is not available", display_name),
        )
        .hint(format!("Install {}", cmd)),
    }
}

fn check_log_dir(dir: &Path) -> CheckResult {
    if let Err(e) = std::fs::create_dir_all(dir) {
        return CheckResult::new(
            "log_dir",
            CheckStatus::Fail,
            format!("Cannot create log directory {}: {}", dir.display(), e),
        )
        .hint("Set LOG_DIR to a writable directory");
    }

    let probe = dir.join(".relay_doctor_test");
    match std::fs::write(&probe, "test") {
        Ok(_) => {
            let _ = std::fs::remove_file(&probe);
            CheckResult::new(
                "log_dir",
                CheckStatus::Pass,
                format!("Log directory writable: {}", dir.display()),
            )
        }
        Err(e) => CheckResult::new(
            "log_dir",
            CheckStatus::Fail,
            format!("Log directory not writable: {}", e),
        )
        .hint("Set LOG_DIR to a writable directory"),
    }
}

/// An agent passes when its card answers with the right name. When nothing
/// answers, the check is skipped if the port is free and fails if it is taken.
async fn check_agent(endpoint: &AgentEndpoint) -> CheckResult {
    let name = format!("agent_{}", endpoint.name);

    match fetch_card_name(&endpoint.card_url()).await {
        Some(card_name) if card_name == endpoint.name => CheckResult::new(
            name,
            CheckStatus::Pass,
            format!("{} is running at {}", endpoint.name, endpoint.url),
        ),
        Some(card_name) => CheckResult::new(
            name,
            CheckStatus::Fail,
            format!(
                "{} serves '{}' instead of {}",
                endpoint.url, card_name, endpoint.name
            ),
        )
        .hint("Check the *_AGENT_PORT variables for collisions"),
        None => match local_url_port(&endpoint.url) {
            Some(port) if port_is_free(port) => CheckResult::new(
                name,
                CheckStatus::Skip,
                format!("{} is not running (port {} is free)", endpoint.name, port),
            )
            .hint(format!("relay serve {}", endpoint.kind.key())),
            Some(port) => CheckResult::new(
                name,
                CheckStatus::Fail,
                format!("Port {} is in use by another process", port),
            )
            .hint("Stop the other process or change the agent port"),
            None => CheckResult::new(
                name,
                CheckStatus::Skip,
                format!("{} is not reachable at {}", endpoint.name, endpoint.url),
            )
            .hint("Start the agent on its remote host or fix the *_AGENT_URL variable"),
        },
    }
}

async fn fetch_card_name(card_url: &str) -> Option<String> {
    let client = reqwest::Client::builder()
        .timeout(PROBE_TIMEOUT)
        .build()
        .ok()?;
    let response = client.get(card_url).send().await.ok()?;
    if !response.status().is_success() {
        debug!("Card probe {} returned {}", card_url, response.status());
        return Some(String::new());
    }
    let card: serde_json::Value = response.json().await.ok()?;
    Some(
        card.get("name")
            .and_then(|n| n.as_str())
            .unwrap_or_default()
            .to_string(),
    )
}

/// Port of `url` when it points at this machine; `None` for remote hosts
fn local_url_port(url: &str) -> Option<u16> {
    let url = Url::parse(url).ok()?;
    let local = match url.host()? {
        Host::Domain(domain) => domain.eq_ignore_ascii_case("localhost"),
        Host::Ipv4(ip) => ip.is_loopback() || ip.is_unspecified(),
        Host::Ipv6(ip) => ip.is_loopback() || ip.is_unspecified(),
    };
    if local { url.port_or_known_default() } else { None }
}

fn port_is_free(port: u16) -> bool {
    std::net::TcpListener::bind(("127.0.0.1", port)).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgentKind;

    fn endpoint_on(port: u16) -> AgentEndpoint {
        AgentEndpoint {
            kind: AgentKind::Notion,
            name: "notion_agent".to_string(),
            host: "127.0.0.1".to_string(),
            port,
            url: format!("http://127.0.0.1:{}", port),
            health_path: crate::config::AGENT_CARD_PATH.to_string(),
        }
    }

    fn free_port() -> u16 {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    #[test]
    fn test_check_status_display() {
        assert_eq!(CheckStatus::Pass.to_string(), "PASS");
        assert_eq!(CheckStatus::Fail.to_string(), "FAIL");
        assert_eq!(CheckStatus::Warn.to_string(), "WARN");
        assert_eq!(CheckStatus::Skip.to_string(), "SKIP");
    }

    #[test]
    fn test_google_key_required() {
        let result = check_api_key("GOOGLE_API_KEY", "", true);
        assert_eq!(result.status, CheckStatus::Fail);
        assert!(result.fix_hint.unwrap().contains("GOOGLE_API_KEY"));
    }

    #[test]
    fn test_optional_key_warns() {
        let result = check_api_key("NOTION_API_KEY", "", false);
        assert_eq!(result.status, CheckStatus::Warn);
    }

    #[test]
    fn test_key_is_masked() {
        let result = check_api_key("GOOGLE_API_KEY", "AIzaSyABCDEFGH1234", true);
        assert_eq!(result.status, CheckStatus::Pass);
        assert!(result.message.contains("AIza...1234"));
        assert!(!result.message.contains("ABCDEFGH"));

        let short = check_api_key("GOOGLE_API_KEY", "abc", true);
        assert!(short.message.contains("****"));
    }

    #[test]
    fn test_check_command_nonexistent() {
        let result = check_command("nonexistent_command_xyz", &[], "Nonexistent");
        assert_eq!(result.status, CheckStatus::Warn);
    }

    #[test]
    fn test_log_dir_created() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("nested").join("logs");
        let result = check_log_dir(&dir);
        assert_eq!(result.status, CheckStatus::Pass);
        assert!(dir.exists());
        assert!(!dir.join(".relay_doctor_test").exists());
    }

    #[test]
    fn test_log_dir_blocked_by_file() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("not-a-dir");
        std::fs::write(&file, "x").unwrap();
        let result = check_log_dir(&file.join("logs"));
        assert_eq!(result.status, CheckStatus::Fail);
    }

    #[tokio::test]
    async fn test_agent_not_running_is_skipped() {
        let result = check_agent(&endpoint_on(free_port())).await;
        assert_eq!(result.status, CheckStatus::Skip);
        assert!(result.fix_hint.unwrap().contains("relay serve notion"));
    }

    #[tokio::test]
    async fn test_port_taken_by_other_process_fails() {
        // Accepts connections but never answers HTTP
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let result = check_agent(&endpoint_on(port)).await;
        assert_eq!(result.status, CheckStatus::Fail);
        drop(listener);
    }

    #[tokio::test]
    async fn test_port_check_follows_the_url() {
        // The bind port is taken, but the URL points at a free port
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let mut endpoint = endpoint_on(listener.local_addr().unwrap().port());
        endpoint.url = format!("http://localhost:{}", free_port());
        let result = check_agent(&endpoint).await;
        assert_eq!(result.status, CheckStatus::Skip);
        drop(listener);
    }

    #[test]
    fn test_local_url_port() {
        assert_eq!(local_url_port("http://localhost:8002"), Some(8002));
        assert_eq!(local_url_port("http://127.0.0.1:9000"), Some(9000));
        assert_eq!(local_url_port("http://[::1]:9001"), Some(9001));
        assert_eq!(local_url_port("http://0.0.0.0"), Some(80));
        assert_eq!(local_url_port("http://notion.internal:7000"), None);
        assert_eq!(local_url_port("https://10.1.2.3:8443"), None);
        assert_eq!(local_url_port("not a url"), None);
    }

    #[test]
    fn test_report_counts() {
        let report = DoctorReport::from_checks(vec![
            CheckResult::new("a", CheckStatus::Pass, "ok"),
            CheckResult::new("b", CheckStatus::Warn, "meh"),
            CheckResult::new("c", CheckStatus::Skip, "n/a"),
        ]);
        assert_eq!(report.pass_count, 1);
        assert_eq!(report.warn_count, 1);
        assert_eq!(report.skip_count, 1);
        assert!(report.is_healthy());
        assert_eq!(report.summary(), "1 passed, 1 warnings, 0 failed, 1 skipped");

        let report =
            DoctorReport::from_checks(vec![CheckResult::new("d", CheckStatus::Fail, "bad")]);
        assert!(!report.is_healthy());
    }

    #[tokio::test]
    async fn test_run_doctor_covers_every_agent() {
        let tmp = tempfile::tempdir().unwrap();
        let mut settings = Settings::from_lookup(|_| None).unwrap();
        settings.log_dir = tmp.path().join("logs");
        settings.host_agent_port = free_port();
        settings.notion_agent_port = free_port();
        settings.elevenlabs_agent_port = free_port();
        settings.host_agent_url = format!("http://127.0.0.1:{}", settings.host_agent_port);
        settings.notion_agent_url = format!("http://127.0.0.1:{}", settings.notion_agent_port);
        settings.elevenlabs_agent_url =
            format!("http://127.0.0.1:{}", settings.elevenlabs_agent_port);

        let report = run_doctor(&settings).await;
        assert_eq!(
            report
                .checks
                .iter()
                .filter(|c| c.name.starts_with("agent_"))
                .count(),
            3
        );
        // No Google key in default settings
        assert!(!report.is_healthy());
    }
}
