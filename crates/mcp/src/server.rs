//! Stdio MCP server: newline-delimited JSON-RPC in, one response line out per
//! request.
//!
//! Requests are read on the caller's task. `tools/call` runs on its own task
//! so a slow mailbox fetch does not hold up `tools/list` or `ping`; every
//! response goes through a single writer task, so lines never interleave.
//! On EOF the server waits for in-flight calls, flushes, and returns.

use {
    serde_json::{Value, json},
    tokio::{
        io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader},
        sync::mpsc,
        task::{JoinHandle, JoinSet},
    },
    tracing::{debug, info, trace, warn},
};

use davgate_tools::ToolRegistry;

use crate::{
    error::{Context, Result},
    types::{
        InitializeResult, JsonRpcError, JsonRpcRequest, JsonRpcResponse, PROTOCOL_VERSION,
        ServerCapabilities, ServerInfo, ToolsCallParams, ToolsCallResult, ToolsCapability,
    },
};

/// Responses queued for the writer before readers wait.
const OUTBOUND_CAPACITY: usize = 64;

pub struct McpServer {
    registry: ToolRegistry,
    info: ServerInfo,
}

impl McpServer {
    #[must_use]
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            registry,
            info: ServerInfo::default(),
        }
    }

    /// Serve on the process's stdin and stdout until stdin closes.
    pub async fn serve_stdio(&self) -> Result<()> {
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Serve requests from `reader`, writing responses to `writer`, until
    /// `reader` reaches EOF.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        info!(
            server = %self.info.name,
            version = %self.info.version,
            tools = self.registry.len(),
            "MCP server listening on stdio"
        );

        let (tx, rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let writer_task = spawn_writer(writer, rx);
        let mut calls = JoinSet::new();

        let mut lines = BufReader::new(reader).lines();
        let read_result = loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            trace!(raw = %line, "client -> server");
            if let Some(response) = self.dispatch(line, &tx, &mut calls)
                && tx.send(response).await.is_err()
            {
                warn!("response writer stopped, closing server");
                break Ok(());
            }
            reap_finished(&mut calls);
        };

        let in_flight = calls.len();
        if in_flight > 0 {
            debug!(in_flight, "waiting for in-flight tool calls");
        }
        while let Some(joined) = calls.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "tool call task failed");
            }
        }
        drop(tx);
        if let Err(e) = writer_task.await {
            warn!(error = %e, "response writer task failed");
        }
        info!("MCP server stopped");
        read_result.context("failed to read request")
    }

    /// Handle one line. Returns the immediate response, if any; `tools/call`
    /// answers later through `tx`.
    fn dispatch(
        &self,
        line: &str,
        tx: &mpsc::Sender<JsonRpcResponse>,
        calls: &mut JoinSet<()>,
    ) -> Option<JsonRpcResponse> {
        let raw: Value = match serde_json::from_str(line) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "unparseable request line");
                return Some(JsonRpcResponse::failure(
                    Value::Null,
                    JsonRpcError::parse_error(e),
                ));
            },
        };
        let request: JsonRpcRequest = match serde_json::from_value(raw.clone()) {
            Ok(request) => request,
            Err(e) => {
                let id = raw.get("id").cloned().unwrap_or(Value::Null);
                return Some(JsonRpcResponse::failure(id, JsonRpcError::invalid_request(e)));
            },
        };

        let Some(id) = request.id.clone() else {
            debug!(method = %request.method, "notification received");
            return None;
        };
        debug!(method = %request.method, id = %id, "request received");

        let outcome = match request.method.as_str() {
            "initialize" => Ok(self.initialize()),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({ "tools": self.registry.list_schemas() })),
            "tools/call" => match call_params(request.params) {
                Ok(params) => {
                    self.spawn_call(id, params, tx.clone(), calls);
                    return None;
                },
                Err(e) => Err(e),
            },
            other => Err(JsonRpcError::method_not_found(other)),
        };
        Some(match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(error) => JsonRpcResponse::failure(id, error),
        })
    }

    fn initialize(&self) -> Value {
        let result = InitializeResult {
            protocol_version: PROTOCOL_VERSION.into(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability::default()),
            },
            server_info: self.info.clone(),
        };
        serde_json::to_value(result).unwrap_or_else(|_| json!({}))
    }

    fn spawn_call(
        &self,
        id: Value,
        params: ToolsCallParams,
        tx: mpsc::Sender<JsonRpcResponse>,
        calls: &mut JoinSet<()>,
    ) {
        let registry = self.registry.clone();
        calls.spawn(async move {
            let result = match registry.call(&params.name, params.arguments).await {
                Some(output) => ToolsCallResult::text(output.text, output.is_error),
                None => {
                    warn!(tool = %params.name, "unknown tool requested");
                    ToolsCallResult::text(format!("Unknown tool: {}", params.name), true)
                },
            };
            let response = match serde_json::to_value(result) {
                Ok(result) => JsonRpcResponse::success(id, result),
                Err(e) => JsonRpcResponse::failure(id, JsonRpcError::internal(e)),
            };
            if tx.send(response).await.is_err() {
                warn!(tool = %params.name, "response dropped, writer closed");
            }
        });
    }
}

/// Drop completed call tasks so the set only holds calls still running.
fn reap_finished(calls: &mut JoinSet<()>) {
    while let Some(joined) = calls.try_join_next() {
        if let Err(e) = joined {
            warn!(error = %e, "tool call task failed");
        }
    }
}

fn call_params(params: Option<Value>) -> std::result::Result<ToolsCallParams, JsonRpcError> {
    let params = params.ok_or_else(|| JsonRpcError::invalid_params("missing params"))?;
    serde_json::from_value(params).map_err(JsonRpcError::invalid_params)
}

fn spawn_writer<W>(mut writer: W, mut rx: mpsc::Receiver<JsonRpcResponse>) -> JoinHandle<()>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(response) = rx.recv().await {
            let mut payload = match serde_json::to_string(&response) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(error = %e, "failed to serialize response");
                    continue;
                },
            };
            payload.push('\n');
            trace!(raw = %payload.trim_end(), "server -> client");
            let written = async {
                writer.write_all(payload.as_bytes()).await?;
                writer.flush().await
            };
            if let Err(e) = written.await {
                warn!(error = %e, "failed to write response, stopping writer");
                return;
            }
        }
        if let Err(e) = writer.shutdown().await {
            debug!(error = %e, "failed to close response stream");
        }
    })
}
