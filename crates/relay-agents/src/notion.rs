//! Notion worker: workspace search and database queries over the Notion MCP server

use anyhow::Result;
use async_trait::async_trait;
use relay_a2a::AgentSkill;
use relay_core::fallback;
use relay_core::tools::{ToolHandler, ToolRegistry, json_schema, required_str};
use relay_core::{Fallback, LlmAgent, Settings};
use relay_mcp::McpClientConfig;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::backend::ToolServer;

pub const INSTRUCTION: &str = include_str!("../prompts/notion.md");
pub const DESCRIPTION: &str = "Specialized agent for retrieving information from Notion workspace";
pub const DEFAULT_PROMPT: &str = "Search for recent pages";

const NOTION_VERSION: &str = "2022-06-28";
const REMOTE_SEARCH: &str = "API-post-search";
const REMOTE_DATABASE_QUERY: &str = "API-post-database-query";

/// How to launch the Notion MCP server; `None` without an API key
pub fn server_config(settings: &Settings) -> Option<McpClientConfig> {
    if settings.notion_api_key.is_empty() {
        return None;
    }
    let headers = serde_json::json!({
        "Authorization": format!("Bearer {}", settings.notion_api_key),
        "Notion-Version": NOTION_VERSION,
    });
    Some(McpClientConfig {
        name: "notion".to_string(),
        command: "npx".to_string(),
        args: vec!["-y".to_string(), "@notionhq/notion-mcp-server".to_string()],
        env: vec![("OPENAPI_MCP_HEADERS".to_string(), headers.to_string())],
        request_timeout: settings.mcp_timeout(),
    })
}

pub fn skills() -> Vec<AgentSkill> {
    vec![
        AgentSkill::new(
            "notion_search",
            "Search Notion Workspace",
            "Search for pages, blocks, and content in Notion workspace",
            &["notion", "search", "workspace", "pages"],
            &[
                "Search for 'project documentation'",
                "Find pages about 'meeting notes'",
                "Look for content related to 'Q3 planning'",
            ],
        ),
        AgentSkill::new(
            "notion_database",
            "Query Notion Databases",
            "Query and analyze Notion databases for structured information",
            &["notion", "database", "query", "data"],
            &[
                "Count entries in 'Sermon Notes' database",
                "Get recent entries from project database",
                "Analyze task completion rates",
            ],
        ),
    ]
}

/// `notion_search(query)`
pub struct NotionSearchTool {
    server: Option<Arc<dyn ToolServer>>,
}

impl NotionSearchTool {
    pub fn new(server: Option<Arc<dyn ToolServer>>) -> Self {
        Self { server }
    }
}

#[async_trait]
impl ToolHandler for NotionSearchTool {
    fn name(&self) -> &str {
        "notion_search"
    }

    fn description(&self) -> &str {
        "Search the Notion workspace for pages and content matching a query."
    }

    fn input_schema(&self) -> Value {
        json_schema(
            serde_json::json!({
                "query": {
                    "type": "string",
                    "description": "Search terms"
                }
            }),
            vec!["query"],
        )
    }

    async fn execute(&self, input: Value) -> Result<String> {
        let query = required_str(&input, "query")?;
        let Some(server) = &self.server else {
            debug!("NOTION_API_KEY not set, answering search with canned results");
            return Ok(fallback::notion_search(query));
        };

        match server
            .call_tool(REMOTE_SEARCH, serde_json::json!({ "query": query }))
            .await
        {
            Ok(text) => Ok(text),
            Err(e) => {
                warn!("Notion search failed: {:#}", e);
                Ok(fallback::notion_search(query))
            }
        }
    }
}

/// `notion_database(database)`
pub struct NotionDatabaseTool {
    server: Option<Arc<dyn ToolServer>>,
}

impl NotionDatabaseTool {
    pub fn new(server: Option<Arc<dyn ToolServer>>) -> Self {
        Self { server }
    }
}

#[async_trait]
impl ToolHandler for NotionDatabaseTool {
    fn name(&self) -> &str {
        "notion_database"
    }

    fn description(&self) -> &str {
        "Query a Notion database by name or id and return its entries."
    }

    fn input_schema(&self) -> Value {
        json_schema(
            serde_json::json!({
                "database": {
                    "type": "string",
                    "description": "Database name or id"
                }
            }),
            vec!["database"],
        )
    }

    async fn execute(&self, input: Value) -> Result<String> {
        let database = required_str(&input, "database")?;
        let Some(server) = &self.server else {
            return Ok(fallback::notion_database(database));
        };

        match server
            .call_tool(
                REMOTE_DATABASE_QUERY,
                serde_json::json!({ "database_id": database }),
            )
            .await
        {
            Ok(text) => Ok(text),
            Err(e) => {
                warn!("Notion database query failed: {:#}", e);
                Ok(fallback::notion_database(database))
            }
        }
    }
}

/// The Notion worker agent
pub fn agent(settings: &Settings, server: Option<Arc<dyn ToolServer>>) -> LlmAgent {
    let mut tools = ToolRegistry::new();
    tools.register(Arc::new(NotionSearchTool::new(server.clone())));
    tools.register(Arc::new(NotionDatabaseTool::new(server)));

    LlmAgent::new("notion_agent", DESCRIPTION, INSTRUCTION)
        .with_tools(tools)
        .with_provider(crate::provider(settings))
        .with_fallback(Fallback::DirectTool {
            tool: "notion_search".to_string(),
            argument: "query".to_string(),
        })
}
