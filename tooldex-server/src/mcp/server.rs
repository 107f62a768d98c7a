//! MCP Server implementation
//!
//! Implements the MCP server over stdio. Every request runs on its own task
//! so a long-polling fetch never holds up other calls; responses funnel
//! through a single writer task and may arrive out of request order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use tooldex_protocol::{CaptureMode, PRIMARY_ALIAS};

use crate::hub::PaneHub;

use super::error::McpError;
use super::handlers::ToolContext;
use super::protocol::{
    InitializeResult, JsonRpcError, JsonRpcRequest, JsonRpcResponse, ToolResult, ToolsListResult,
};
use super::tools::{get_tool_definitions, is_known_tool};

const DEFAULT_READ_LINES: usize = 200;
const DEFAULT_REPLAY_LINES: usize = 50;

/// MCP Server
pub struct McpServer {
    hub: Arc<PaneHub>,
    initialized: AtomicBool,
}

impl McpServer {
    pub fn new(hub: Arc<PaneHub>) -> Self {
        Self {
            hub,
            initialized: AtomicBool::new(false),
        }
    }

    /// Run the MCP server on stdin/stdout until stdin closes
    pub async fn run(self: Arc<Self>) -> Result<(), McpError> {
        let stdin = BufReader::new(tokio::io::stdin());
        let stdout = tokio::io::stdout();
        self.serve(stdin, stdout).await
    }

    /// Serve newline-delimited JSON-RPC from `reader`, answering on `writer`
    ///
    /// Returns once the reader is exhausted and every in-flight request has
    /// been answered.
    pub async fn serve<R, W>(self: Arc<Self>, reader: R, writer: W) -> Result<(), McpError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<JsonRpcResponse>();

        let writer_task = tokio::spawn(async move {
            let mut writer = writer;
            while let Some(response) = rx.recv().await {
                let json = serde_json::to_string(&response)?;
                debug!("Sending: {}", json);
                writer.write_all(json.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
            Ok::<(), McpError>(())
        });

        info!("MCP server starting");

        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            debug!("Received: {}", line);

            let request: JsonRpcRequest = match serde_json::from_str(line) {
                Ok(req) => req,
                Err(e) => {
                    queue_response(
                        &tx,
                        JsonRpcResponse::error(
                            serde_json::Value::Null,
                            JsonRpcError::new(JsonRpcError::PARSE_ERROR, e.to_string()),
                        ),
                    );
                    continue;
                }
            };

            if request.jsonrpc != "2.0" {
                queue_response(
                    &tx,
                    JsonRpcResponse::error(
                        request.id,
                        JsonRpcError::with_data(
                            JsonRpcError::INVALID_REQUEST,
                            "Invalid JSON-RPC version",
                            serde_json::json!({"expected": "2.0", "got": request.jsonrpc}),
                        ),
                    ),
                );
                continue;
            }

            let server = Arc::clone(&self);
            let tx = tx.clone();
            tokio::spawn(async move {
                if let Some(response) = server.handle_request(request).await {
                    queue_response(&tx, response);
                }
            });
        }

        // Writer drains once the last in-flight task drops its sender
        drop(tx);
        writer_task
            .await
            .map_err(|e| McpError::Internal(e.to_string()))??;

        info!("MCP server shutting down");
        Ok(())
    }

    /// Handle a JSON-RPC request; notifications get no response
    async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if request.is_notification() {
            debug!(method = %request.method, "notification");
            return None;
        }

        let result = match request.method.as_str() {
            "initialize" => self.handle_initialize(&request.params),
            "initialized" => Ok(serde_json::json!({})),
            "ping" => Ok(serde_json::json!({})),
            "tools/list" => self.handle_tools_list(),
            "tools/call" => self.handle_tools_call(&request.params).await,
            _ => Err(McpError::MethodNotFound(request.method.clone())),
        };

        Some(match result {
            Ok(value) => JsonRpcResponse::success(request.id, value),
            Err(e) => JsonRpcResponse::error(request.id, e.into()),
        })
    }

    fn handle_initialize(&self, _params: &serde_json::Value) -> Result<serde_json::Value, McpError> {
        self.initialized.store(true, Ordering::SeqCst);
        info!("MCP server initialized");

        let result = InitializeResult::default();
        serde_json::to_value(result).map_err(|e| McpError::Internal(e.to_string()))
    }

    fn handle_tools_list(&self) -> Result<serde_json::Value, McpError> {
        let result = ToolsListResult {
            tools: get_tool_definitions(),
        };
        serde_json::to_value(result).map_err(|e| McpError::Internal(e.to_string()))
    }

    async fn handle_tools_call(&self, params: &serde_json::Value) -> Result<serde_json::Value, McpError> {
        let name = params["name"]
            .as_str()
            .ok_or_else(|| McpError::InvalidParams("Missing 'name' parameter".into()))?;

        let arguments = &params["arguments"];

        debug!("Tool call: {} with args: {}", name, arguments);

        let result = self.dispatch_tool(name, arguments).await?;

        serde_json::to_value(result).map_err(|e| McpError::Internal(e.to_string()))
    }

    /// Dispatch tool call to appropriate handler
    ///
    /// Returns `Err(McpError)` for protocol-level errors (unknown tool, invalid params).
    /// Returns `Ok(ToolResult::error(...))` for tool execution errors (pane not found, etc.).
    async fn dispatch_tool(&self, name: &str, arguments: &serde_json::Value) -> Result<ToolResult, McpError> {
        if !is_known_tool(name) {
            return Err(McpError::UnknownTool(name.into()));
        }

        let params = parse_params(name, arguments)?;
        let ctx = ToolContext::new(&self.hub);

        let result = match params {
            ToolParams::AttachPane { name, target, primary } => {
                ctx.attach_pane(&name, &target, primary).await
            }
            ToolParams::DetachPane { name } => ctx.detach_pane(&name),
            ToolParams::ListPanes => ctx.list_panes(),
            ToolParams::ReadPane { pane, lines, mode } => ctx.read_pane(&pane, lines, mode).await,
            ToolParams::SendInput { pane, text, submit } => {
                ctx.send_input(&pane, &text, submit).await
            }
            ToolParams::Subscribe {
                pane,
                mode,
                initial_lines,
            } => ctx.subscribe(&pane, mode, initial_lines).await,
            ToolParams::FetchUpdates {
                token,
                timeout,
                max_lines,
            } => ctx.fetch_updates(&token, timeout, max_lines).await,
            ToolParams::Unsubscribe { token } => ctx.unsubscribe(&token),
            ToolParams::Replay { token, lines } => ctx.replay(&token, lines),
            ToolParams::Stats => ctx.stats(),
            ToolParams::SweepIdle { max_age } => ctx.sweep_idle(max_age),
        };

        Ok(match result {
            Ok(text) => ToolResult::text(text),
            Err(e) => ToolResult::error(e.to_string()),
        })
    }
}

/// Hand a response to the writer task, logging it if the writer is gone
fn queue_response(tx: &mpsc::UnboundedSender<JsonRpcResponse>, response: JsonRpcResponse) {
    if let Err(mpsc::error::SendError(dropped)) = tx.send(response) {
        warn!(id = %dropped.id, "response dropped, writer has stopped");
    }
}

/// Parsed and validated tool parameters
#[derive(Debug, PartialEq)]
enum ToolParams {
    AttachPane { name: String, target: String, primary: bool },
    DetachPane { name: String },
    ListPanes,
    ReadPane { pane: String, lines: usize, mode: CaptureMode },
    SendInput { pane: String, text: String, submit: bool },
    Subscribe { pane: String, mode: CaptureMode, initial_lines: usize },
    FetchUpdates {
        token: String,
        timeout: Option<Duration>,
        max_lines: Option<usize>,
    },
    Unsubscribe { token: String },
    Replay { token: String, lines: usize },
    Stats,
    SweepIdle { max_age: Option<Duration> },
}

fn parse_params(name: &str, args: &serde_json::Value) -> Result<ToolParams, McpError> {
    let pane = || {
        args["pane"]
            .as_str()
            .unwrap_or(PRIMARY_ALIAS)
            .to_string()
    };
    let mode = || CaptureMode::from_markup_flag(args["markup"].as_bool().unwrap_or(false));

    Ok(match name {
        "tooldex_attach_pane" => ToolParams::AttachPane {
            name: required_str(args, "name")?,
            target: required_str(args, "target")?,
            primary: args["primary"].as_bool().unwrap_or(false),
        },
        "tooldex_detach_pane" => ToolParams::DetachPane {
            name: required_str(args, "name")?,
        },
        "tooldex_list_panes" => ToolParams::ListPanes,
        "tooldex_read_pane" => ToolParams::ReadPane {
            pane: pane(),
            lines: optional_count(args, "lines")?.unwrap_or(DEFAULT_READ_LINES),
            mode: mode(),
        },
        "tooldex_send_input" => ToolParams::SendInput {
            pane: pane(),
            text: required_str(args, "text")?,
            submit: args["submit"].as_bool().unwrap_or(true),
        },
        "tooldex_subscribe" => ToolParams::Subscribe {
            pane: pane(),
            mode: mode(),
            initial_lines: optional_count(args, "initial_lines")?.unwrap_or(0),
        },
        "tooldex_fetch_updates" => ToolParams::FetchUpdates {
            token: required_str(args, "token")?,
            timeout: optional_seconds(args, "timeout_seconds")?,
            max_lines: optional_count(args, "max_lines")?,
        },
        "tooldex_unsubscribe" => ToolParams::Unsubscribe {
            token: required_str(args, "token")?,
        },
        "tooldex_replay" => ToolParams::Replay {
            token: required_str(args, "token")?,
            lines: optional_count(args, "lines")?.unwrap_or(DEFAULT_REPLAY_LINES),
        },
        "tooldex_stats" => ToolParams::Stats,
        "tooldex_sweep_idle" => ToolParams::SweepIdle {
            max_age: optional_seconds(args, "max_age_seconds")?,
        },
        other => return Err(McpError::UnknownTool(other.into())),
    })
}

fn required_str(args: &serde_json::Value, field: &str) -> Result<String, McpError> {
    args[field]
        .as_str()
        .map(String::from)
        .ok_or_else(|| McpError::InvalidParams(format!("Missing '{}' parameter", field)))
}

/// Non-negative integer, absent or null meaning "use the default"
fn optional_count(args: &serde_json::Value, field: &str) -> Result<Option<usize>, McpError> {
    match &args[field] {
        serde_json::Value::Null => Ok(None),
        value => value
            .as_u64()
            .map(|n| Some(n as usize))
            .ok_or_else(|| McpError::InvalidParams(format!("'{}' must be a non-negative integer", field))),
    }
}

/// Non-negative number of seconds
fn optional_seconds(args: &serde_json::Value, field: &str) -> Result<Option<Duration>, McpError> {
    match &args[field] {
        serde_json::Value::Null => Ok(None),
        value => value
            .as_f64()
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
            .map(|secs| Some(Duration::from_secs_f64(secs)))
            .ok_or_else(|| McpError::InvalidParams(format!("'{}' must be a non-negative number", field))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::gateway::fake::FakeGateway;
    use tokio::io::AsyncReadExt;

    fn server() -> (Arc<FakeGateway>, Arc<McpServer>) {
        let gateway = Arc::new(FakeGateway::new().with_pane("work:0.0", "%1"));
        let hub = Arc::new(PaneHub::new(gateway.clone(), &AppConfig::default()));
        (gateway, Arc::new(McpServer::new(hub)))
    }

    fn call(id: u64, tool: &str, arguments: serde_json::Value) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: "2.0".into(),
            id: serde_json::json!(id),
            method: "tools/call".into(),
            params: serde_json::json!({ "name": tool, "arguments": arguments }),
        }
    }

    /// Text payload of a successful tool result, parsed as JSON
    fn tool_payload(response: &JsonRpcResponse) -> serde_json::Value {
        let result = response.result.as_ref().unwrap();
        assert!(result.get("isError").is_none(), "tool failed: {}", result);
        let text = result["content"][0]["text"].as_str().unwrap();
        serde_json::from_str(text).unwrap()
    }

    #[tokio::test]
    async fn test_handle_initialize() {
        let (_gw, server) = server();
        let result = server.handle_initialize(&serde_json::json!({})).unwrap();

        assert!(server.initialized.load(Ordering::SeqCst));
        assert!(result["protocolVersion"].is_string());
        assert!(result["capabilities"]["tools"].is_object());
    }

    #[tokio::test]
    async fn test_handle_tools_list() {
        let (_gw, server) = server();
        let result = server.handle_tools_list().unwrap();

        let tools = result["tools"].as_array().unwrap();
        assert!(tools.iter().any(|t| t["name"] == "tooldex_fetch_updates"));
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let (_gw, server) = server();
        let request = JsonRpcRequest {
            jsonrpc: "2.0".into(),
            id: serde_json::json!(1),
            method: "unknown/method".into(),
            params: serde_json::json!({}),
        };

        let response = server.handle_request(request).await.unwrap();
        assert_eq!(response.error.unwrap().code, JsonRpcError::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_notification_has_no_response() {
        let (_gw, server) = server();
        let request = JsonRpcRequest {
            jsonrpc: "2.0".into(),
            id: serde_json::Value::Null,
            method: "notifications/initialized".into(),
            params: serde_json::Value::Null,
        };
        assert!(server.handle_request(request).await.is_none());
    }

    #[tokio::test]
    async fn test_dispatch_unknown_tool() {
        let (_gw, server) = server();
        let result = server.dispatch_tool("unknown_tool", &serde_json::json!({})).await;
        assert!(matches!(result, Err(McpError::UnknownTool(_))));
    }

    #[tokio::test]
    async fn test_missing_required_param_is_protocol_error() {
        let (_gw, server) = server();
        let result = server
            .dispatch_tool("tooldex_fetch_updates", &serde_json::json!({}))
            .await;
        assert!(matches!(result, Err(McpError::InvalidParams(_))));
    }

    #[tokio::test]
    async fn test_tool_execution_error_returns_tool_result_error() {
        let (_gw, server) = server();
        let result = server
            .dispatch_tool("tooldex_fetch_updates", &serde_json::json!({"token": "nope"}))
            .await
            .unwrap();
        assert_eq!(result.is_error, Some(true));
    }

    #[tokio::test]
    async fn test_queue_response_after_writer_stops() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        // Logged and discarded rather than panicking
        queue_response(&tx, JsonRpcResponse::success(serde_json::json!(7), serde_json::json!({})));

        let (tx, mut rx) = mpsc::unbounded_channel();
        queue_response(&tx, JsonRpcResponse::success(serde_json::json!(8), serde_json::json!({})));
        assert_eq!(rx.recv().await.unwrap().id, serde_json::json!(8));
    }

    #[test]
    fn test_parse_params_defaults() {
        let params = parse_params("tooldex_read_pane", &serde_json::json!({})).unwrap();
        assert_eq!(
            params,
            ToolParams::ReadPane {
                pane: PRIMARY_ALIAS.into(),
                lines: DEFAULT_READ_LINES,
                mode: CaptureMode::Plain,
            }
        );

        let params = parse_params("tooldex_send_input", &serde_json::json!({"text": "ls"})).unwrap();
        assert!(matches!(params, ToolParams::SendInput { submit: true, .. }));
    }

    #[test]
    fn test_parse_fetch_params() {
        let params = parse_params(
            "tooldex_fetch_updates",
            &serde_json::json!({"token": "t", "timeout_seconds": 2.5, "max_lines": 20}),
        )
        .unwrap();
        assert_eq!(
            params,
            ToolParams::FetchUpdates {
                token: "t".into(),
                timeout: Some(Duration::from_millis(2500)),
                max_lines: Some(20),
            }
        );
    }

    #[test]
    fn test_parse_rejects_negative_numbers() {
        let result = parse_params(
            "tooldex_fetch_updates",
            &serde_json::json!({"token": "t", "timeout_seconds": -1}),
        );
        assert!(matches!(result, Err(McpError::InvalidParams(_))));

        let result = parse_params("tooldex_replay", &serde_json::json!({"token": "t", "lines": -3}));
        assert!(matches!(result, Err(McpError::InvalidParams(_))));
    }

    #[tokio::test]
    async fn test_subscribe_fetch_unsubscribe_cycle() {
        let (gw, server) = server();

        let response = server
            .handle_request(call(1, "tooldex_attach_pane", serde_json::json!({"name": "build", "target": "work:0.0"})))
            .await
            .unwrap();
        assert_eq!(tool_payload(&response)["name"], "build");

        gw.push_counts([20, 22]);
        let response = server
            .handle_request(call(2, "tooldex_subscribe", serde_json::json!({"pane": "build"})))
            .await
            .unwrap();
        let token = tool_payload(&response)["token"].as_str().unwrap().to_string();

        gw.push_lines(&["ok 1", "ok 2"]);
        let response = server
            .handle_request(call(
                3,
                "tooldex_fetch_updates",
                serde_json::json!({"token": token, "timeout_seconds": 0.5, "max_lines": 10}),
            ))
            .await
            .unwrap();
        let update = tool_payload(&response);
        assert_eq!(update["new_lines"], serde_json::json!(["ok 1", "ok 2"]));
        assert_eq!(update["lines_recorded"], 22);
        assert_eq!(update["timed_out"], false);

        let response = server
            .handle_request(call(4, "tooldex_unsubscribe", serde_json::json!({"token": token})))
            .await
            .unwrap();
        assert_eq!(tool_payload(&response)["removed"], true);
    }

    #[tokio::test]
    async fn test_serve_over_stream() {
        let (_gw, server) = server();
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#,
            "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n",
            "not json\n",
            "\n",
            r#"{"jsonrpc":"1.0","id":2,"method":"ping"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"tooldex_list_panes","arguments":{}}}"#,
            "\n",
        );

        let (client, server_side) = tokio::io::duplex(64 * 1024);
        server.serve(input.as_bytes(), server_side).await.unwrap();

        let mut output = String::new();
        let mut client = client;
        client.read_to_string(&mut output).await.unwrap();

        let responses: Vec<serde_json::Value> = output
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(responses.len(), 4);

        let by_id = |id: serde_json::Value| responses.iter().find(|r| r["id"] == id).unwrap();
        assert!(by_id(serde_json::json!(1))["result"]["serverInfo"]["name"] == "tooldex");
        assert_eq!(by_id(serde_json::Value::Null)["error"]["code"], JsonRpcError::PARSE_ERROR);
        assert_eq!(by_id(serde_json::json!(2))["error"]["code"], JsonRpcError::INVALID_REQUEST);
        assert_eq!(
            by_id(serde_json::json!(3))["result"]["content"][0]["text"],
            "[]"
        );
    }
}
