//! MCP client: spawns an MCP server process and talks JSON-RPC over its stdio

use anyhow::{Context, Result, anyhow};
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::protocol::{
    JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, McpTool, PROTOCOL_VERSION,
    ToolCallResult,
};

/// How to launch an MCP server
#[derive(Clone)]
pub struct McpClientConfig {
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub request_timeout: Duration,
}

impl std::fmt::Debug for McpClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // env carries API keys
        let env_keys: Vec<&str> = self.env.iter().map(|(k, _)| k.as_str()).collect();
        f.debug_struct("McpClientConfig")
            .field("name", &self.name)
            .field("command", &self.command)
            .field("args", &self.args)
            .field("env", &env_keys)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Connected MCP server
pub struct McpClient {
    config: McpClientConfig,
    child: Mutex<Option<Child>>,
    stdin: Mutex<Option<ChildStdin>>,
    reader: Mutex<Option<BufReader<ChildStdout>>>,
    next_id: Mutex<u64>,
    closed: AtomicBool,
}

impl McpClient {
    /// Spawn the server and complete the initialize handshake
    pub async fn connect(config: McpClientConfig) -> Result<Arc<Self>> {
        info!(
            "Connecting to MCP server: {} ({})",
            config.name, config.command
        );

        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);

        for (key, value) in &config.env {
            cmd.env(key, value);
        }

        let mut child = cmd
            .spawn()
            .with_context(|| format!("Failed to spawn MCP server: {}", config.command))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("Failed to capture MCP server stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("Failed to capture MCP server stdout"))?;

        if let Some(stderr) = child.stderr.take() {
            let server_name = config.name.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    if !line.trim().is_empty() {
                        debug!("MCP server '{}' stderr: {}", server_name, line);
                    }
                }
            });
        }

        let client = Arc::new(Self {
            config,
            child: Mutex::new(Some(child)),
            stdin: Mutex::new(Some(stdin)),
            reader: Mutex::new(Some(BufReader::new(stdout))),
            next_id: Mutex::new(1),
            closed: AtomicBool::new(false),
        });

        if let Err(e) = client.initialize().await {
            client.shutdown().await;
            return Err(e);
        }

        Ok(client)
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Whether the transport has failed and the client should be replaced
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn initialize(&self) -> Result<()> {
        let result = self
            .send_request(
                "initialize",
                serde_json::json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {
                        "name": "relay",
                        "version": env!("CARGO_PKG_VERSION")
                    }
                }),
            )
            .await
            .with_context(|| format!("MCP server '{}' failed to initialize", self.config.name))?;

        debug!("MCP initialize response: {}", result);

        self.send_notification("notifications/initialized", serde_json::json!({}))
            .await?;

        info!("MCP client connected to {}", self.config.name);
        Ok(())
    }

    /// Tools the server offers
    pub async fn list_tools(&self) -> Result<Vec<McpTool>> {
        let result = self
            .send_request("tools/list", serde_json::json!({}))
            .await?;

        let tools: Vec<McpTool> = serde_json::from_value(
            result
                .get("tools")
                .cloned()
                .unwrap_or_else(|| serde_json::json!([])),
        )
        .context("Invalid tools/list result")?;

        info!(
            "Discovered {} tools from MCP server {}",
            tools.len(),
            self.config.name
        );
        Ok(tools)
    }

    /// Call a tool and return its text content; a result flagged `isError` fails
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<String> {
        let result = self
            .send_request(
                "tools/call",
                serde_json::json!({
                    "name": name,
                    "arguments": arguments,
                }),
            )
            .await?;

        let parsed: ToolCallResult =
            serde_json::from_value(result).context("Invalid tools/call result")?;

        let text = parsed.text();
        if parsed.is_error {
            return Err(anyhow!("MCP tool '{}' returned an error: {}", name, text));
        }
        Ok(text)
    }

    async fn send_request(&self, method: &str, params: Value) -> Result<Value> {
        let id = {
            let mut next = self.next_id.lock().await;
            let id = *next;
            *next += 1;
            id
        };

        let line = serde_json::to_string(&JsonRpcRequest::new(id, method, params))? + "\n";
        self.write_line(&line).await?;

        let timeout = self.config.request_timeout;
        let response = match tokio::time::timeout(timeout, self.read_response(id)).await {
            Ok(result) => result?,
            Err(_) => {
                self.closed.store(true, Ordering::SeqCst);
                return Err(anyhow!(
                    "MCP request '{}' to {} timed out after {}s",
                    method,
                    self.config.name,
                    timeout.as_secs_f64()
                ));
            }
        };

        if let Some(error) = response.error {
            return Err(anyhow!("MCP error {}: {}", error.code, error.message));
        }

        Ok(response.result.unwrap_or(Value::Null))
    }

    async fn write_line(&self, line: &str) -> Result<()> {
        let mut stdin_guard = self.stdin.lock().await;
        let stdin = stdin_guard
            .as_mut()
            .ok_or_else(|| anyhow!("MCP server stdin not available"))?;

        let written = async {
            stdin.write_all(line.as_bytes()).await?;
            stdin.flush().await
        }
        .await;

        if let Err(e) = written {
            self.closed.store(true, Ordering::SeqCst);
            return Err(anyhow!("Failed to write to MCP server {}: {}", self.config.name, e));
        }
        Ok(())
    }

    /// Read until the response with the given id; notifications are skipped
    async fn read_response(&self, expected_id: u64) -> Result<JsonRpcMessage> {
        let mut reader_guard = self.reader.lock().await;
        let reader = reader_guard
            .as_mut()
            .ok_or_else(|| anyhow!("MCP server stdout not available"))?;

        loop {
            let mut line = String::new();
            let bytes = match reader.read_line(&mut line).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    self.closed.store(true, Ordering::SeqCst);
                    return Err(e.into());
                }
            };
            if bytes == 0 {
                self.closed.store(true, Ordering::SeqCst);
                return Err(anyhow!("MCP server {} closed connection", self.config.name));
            }

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let msg: JsonRpcMessage = match serde_json::from_str(line) {
                Ok(msg) => msg,
                Err(_) => {
                    // Servers occasionally print banners on stdout
                    warn!(
                        "Ignoring non-JSON line from MCP server {}: {}",
                        self.config.name,
                        truncate(line, 100)
                    );
                    continue;
                }
            };

            if msg.answers(expected_id) {
                return Ok(msg);
            }

            debug!("MCP notification: {}", truncate(line, 200));
        }
    }

    async fn send_notification(&self, method: &str, params: Value) -> Result<()> {
        let line = serde_json::to_string(&JsonRpcNotification::new(method, params))? + "\n";
        self.write_line(&line).await
    }

    /// Stop the server process
    pub async fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.stdin.lock().await.take();

        let mut child_guard = self.child.lock().await;
        if let Some(mut child) = child_guard.take() {
            let _ = child.kill().await;
            info!("MCP server {} stopped", self.config.name);
        }
    }
}

impl Drop for McpClient {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.child.try_lock()
            && let Some(ref mut child) = *guard
        {
            let _ = child.start_kill();
        }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A tiny MCP server in POSIX sh: answers initialize, tools/list and
    /// tools/call; a call to the tool named "fail" reports isError.
    pub(crate) const FAKE_SERVER: &str = r#"
while IFS= read -r line; do
  id=$(printf '%s' "$line" | sed -n 's/.*"id":\([0-9][0-9]*\).*/\1/p')
  case "$line" in
    *'"method":"initialize"'*)
      echo 'starting fake server'
      printf '{"jsonrpc":"2.0","id":%s,"result":{"protocolVersion":"2024-11-05","capabilities":{},"serverInfo":{"name":"fake","version":"0"}}}\n' "$id" ;;
    *'"method":"tools/list"'*)
      printf '{"jsonrpc":"2.0","method":"notifications/message","params":{"level":"info"}}\n'
      printf '{"jsonrpc":"2.0","id":%s,"result":{"tools":[{"name":"echo","description":"Echo","inputSchema":{"type":"object"}},{"name":"fail","inputSchema":{"type":"object"}}]}}\n' "$id" ;;
    *'"method":"tools/call"'*)
      case "$line" in
        *'"name":"fail"'*)
          printf '{"jsonrpc":"2.0","id":%s,"result":{"content":[{"type":"text","text":"invalid token"}],"isError":true}}\n' "$id" ;;
        *'"name":"missing"'*)
          printf '{"jsonrpc":"2.0","id":%s,"error":{"code":-32602,"message":"Unknown tool"}}\n' "$id" ;;
        *)
          printf '{"jsonrpc":"2.0","id":%s,"result":{"content":[{"type":"text","text":"line one"},{"type":"text","text":"line two"}]}}\n' "$id" ;;
      esac ;;
  esac
done
"#;

    pub(crate) fn fake_config(timeout: Duration) -> McpClientConfig {
        McpClientConfig {
            name: "fake".to_string(),
            command: "sh".to_string(),
            args: vec!["-c".to_string(), FAKE_SERVER.to_string()],
            env: vec![],
            request_timeout: timeout,
        }
    }

    #[tokio::test]
    async fn test_list_and_call_tools() {
        let client = McpClient::connect(fake_config(Duration::from_secs(5)))
            .await
            .unwrap();

        let tools = client.list_tools().await.unwrap();
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0].name, "echo");
        assert!(tools[1].description.is_empty());

        let text = client
            .call_tool("echo", serde_json::json!({"query": "x"}))
            .await
            .unwrap();
        assert_eq!(text, "line one\nline two");
        assert!(!client.is_closed());

        client.shutdown().await;
        assert!(client.is_closed());
    }

    #[tokio::test]
    async fn test_is_error_result_fails() {
        let client = McpClient::connect(fake_config(Duration::from_secs(5)))
            .await
            .unwrap();
        let err = client
            .call_tool("fail", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid token"));
        // A tool-level error leaves the transport usable
        assert!(!client.is_closed());
        client.shutdown().await;
    }

    #[tokio::test]
    async fn test_json_rpc_error_fails() {
        let client = McpClient::connect(fake_config(Duration::from_secs(5)))
            .await
            .unwrap();
        let err = client
            .call_tool("missing", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Unknown tool"));
        client.shutdown().await;
    }

    #[tokio::test]
    async fn test_connect_nonexistent_command() {
        let config = McpClientConfig {
            name: "bad".to_string(),
            command: "/nonexistent/binary/path".to_string(),
            args: vec![],
            env: vec![],
            request_timeout: Duration::from_secs(1),
        };
        let err = McpClient::connect(config).await.err().unwrap();
        assert!(err.to_string().contains("Failed to spawn"));
    }

    #[tokio::test]
    async fn test_initialize_timeout() {
        let config = McpClientConfig {
            name: "silent".to_string(),
            command: "sh".to_string(),
            args: vec!["-c".to_string(), "cat > /dev/null".to_string()],
            env: vec![],
            request_timeout: Duration::from_millis(200),
        };
        let err = McpClient::connect(config).await.err().unwrap();
        assert!(format!("{:#}", err).contains("timed out"));
    }

    #[tokio::test]
    async fn test_server_exit_closes_client() {
        let config = McpClientConfig {
            name: "exits".to_string(),
            command: "sh".to_string(),
            args: vec!["-c".to_string(), "exit 0".to_string()],
            env: vec![],
            request_timeout: Duration::from_secs(2),
        };
        assert!(McpClient::connect(config).await.is_err());
    }

    #[test]
    fn test_config_debug_hides_env_values() {
        let config = McpClientConfig {
            name: "notion".to_string(),
            command: "npx".to_string(),
            args: vec!["-y".to_string()],
            env: vec![("OPENAPI_MCP_HEADERS".to_string(), "Bearer secret".to_string())],
            request_timeout: Duration::from_secs(1),
        };
        let debug = format!("{:?}", config);
        assert!(debug.contains("OPENAPI_MCP_HEADERS"));
        assert!(!debug.contains("Bearer secret"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 3), "hel");
        assert_eq!(truncate("hi", 3), "hi");
        assert_eq!(truncate("ééé", 2), "éé");
    }
}
