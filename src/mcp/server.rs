/// MCP JSON-RPC protocol handler
///
/// Reads line-delimited JSON-RPC 2.0 requests, dispatches tool calls through
/// the registry and writes one response line per request. Notifications get
/// no response. Logs go to stderr, never to the protocol stream.

use crate::error::{GeminiError, Result};
use crate::intelligence::IntelligenceSystem;
use crate::tools::{ToolRegistry, ToolResult};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, error, info, warn};

pub const PROTOCOL_VERSION: &str = "2024-11-05";
pub const SERVER_NAME: &str = "gemini-mcp";

const PARSE_ERROR: i64 = -32700;
const INVALID_REQUEST: i64 = -32600;
const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;

#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Serialize)]
struct JsonRpcResponse {
    jsonrpc: String,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Serialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

impl JsonRpcResponse {
    fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id,
            result: Some(result),
            error: None,
        }
    }

    fn error(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
        }
    }
}

pub struct McpServer {
    registry: ToolRegistry,
    intelligence: Arc<IntelligenceSystem>,
}

impl McpServer {
    pub fn new(registry: ToolRegistry, intelligence: Arc<IntelligenceSystem>) -> Self {
        Self {
            registry,
            intelligence,
        }
    }

    /// Serve until the reader hits EOF
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();

        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(response) = self.handle_line(line).await {
                write_response(&mut writer, &response).await?;
            }
        }

        info!("Input closed, shutting down");
        Ok(())
    }

    async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        let request: JsonRpcRequest = match serde_json::from_str(line) {
            Ok(req) => req,
            Err(e) => {
                warn!(error = %e, "Unparseable request");
                return Some(JsonRpcResponse::error(
                    Value::Null,
                    PARSE_ERROR,
                    format!("Invalid JSON: {}", e),
                ));
            }
        };

        if request.jsonrpc != "2.0" {
            return request
                .id
                .map(|id| JsonRpcResponse::error(id, INVALID_REQUEST, "Invalid JSON-RPC version"));
        }

        // Notifications never get a response, even unknown ones
        let Some(id) = request.id.clone() else {
            debug!(method = %request.method, "Notification received");
            return None;
        };

        Some(self.handle_request(id, &request).await)
    }

    async fn handle_request(&self, id: Value, request: &JsonRpcRequest) -> JsonRpcResponse {
        match request.method.as_str() {
            "initialize" => self.handle_initialize(id),
            "tools/list" => JsonRpcResponse::success(
                id,
                json!({ "tools": self.registry.list_metadata() }),
            ),
            "tools/call" => self.handle_tools_call(id, &request.params).await,
            "ping" => JsonRpcResponse::success(id, json!({})),
            other => JsonRpcResponse::error(id, METHOD_NOT_FOUND, format!("Unknown method: {}", other)),
        }
    }

    fn handle_initialize(&self, id: Value) -> JsonRpcResponse {
        info!(
            intelligence = self.intelligence.is_initialized(),
            tools = self.registry.len(),
            "Client initialized session"
        );

        JsonRpcResponse::success(
            id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {
                    "tools": {}
                },
                "serverInfo": {
                    "name": SERVER_NAME,
                    "version": env!("CARGO_PKG_VERSION")
                }
            }),
        )
    }

    async fn handle_tools_call(&self, id: Value, params: &Value) -> JsonRpcResponse {
        let tool_name = params.get("name").and_then(Value::as_str).unwrap_or("");
        if tool_name.is_empty() {
            return JsonRpcResponse::error(id, INVALID_PARAMS, "Missing tool name in params");
        }

        let args = match params.get("arguments") {
            None | Some(Value::Null) => json!({}),
            Some(args) => args.clone(),
        };

        let result = match self.registry.call(tool_name, &args).await {
            Ok(result) => result,
            Err(GeminiError::UnknownTool(name)) => {
                return JsonRpcResponse::error(id, INVALID_PARAMS, format!("Unknown tool: {}", name));
            }
            Err(e) => {
                error!(tool = tool_name, error = %e, "Tool call failed");
                ToolResult::error(e.user_message())
            }
        };

        match serde_json::to_value(&result) {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(e) => JsonRpcResponse::error(id, -32603, format!("Failed to encode result: {}", e)),
        }
    }
}

async fn write_response<W: AsyncWrite + Unpin>(writer: &mut W, response: &JsonRpcResponse) -> Result<()> {
    let mut line = serde_json::to_string(response)?;
    line.push('\n');
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Serve on the process's stdin and stdout
pub async fn run_stdio(server: &McpServer) -> Result<()> {
    let reader = BufReader::new(tokio::io::stdin());
    server.serve(reader, tokio::io::stdout()).await
}
