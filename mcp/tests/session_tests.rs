//! End-to-end session tests
//!
//! Each test drives a real server over an in-memory duplex stream, speaking
//! newline-delimited JSON-RPC the way a client would on stdio.

use edithost_mcp::protocol::Transport;
use edithost_mcp::{
    builtin_registry, Framing, McpError, McpServer, ServerConfig, ServerContext, WorkspaceBackend,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{
    AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines, ReadHalf, WriteHalf,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Client end of a running server
struct Client {
    lines: Lines<BufReader<ReadHalf<DuplexStream>>>,
    writer: WriteHalf<DuplexStream>,
    server: JoinHandle<edithost_mcp::Result<()>>,
    context: Arc<ServerContext>,
    _workspace: TempDir,
}

impl Client {
    async fn send(&mut self, message: Value) {
        self.send_raw(&message.to_string()).await;
    }

    async fn send_raw(&mut self, line: &str) {
        self.writer.write_all(line.as_bytes()).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();
        self.writer.flush().await.unwrap();
    }

    async fn recv(&mut self) -> Value {
        let line = tokio::time::timeout(Duration::from_secs(5), self.lines.next_line())
            .await
            .expect("timed out waiting for a response")
            .unwrap()
            .expect("server closed the stream");
        serde_json::from_str(&line).unwrap()
    }

    async fn request(&mut self, id: i64, method: &str, params: Value) -> Value {
        self.send(json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params}))
            .await;
        let response = self.recv().await;
        assert_eq!(response["id"], id);
        response
    }

    async fn call(&mut self, id: i64, tool: &str, arguments: Value) -> Value {
        self.request(id, "tools/call", json!({"name": tool, "arguments": arguments}))
            .await
    }

    async fn handshake(&mut self) -> Value {
        let response = self
            .request(
                0,
                "initialize",
                json!({
                    "protocolVersion": "2025-03-26",
                    "clientInfo": {"name": "session-tests", "version": "1.0.0"},
                    "capabilities": {}
                }),
            )
            .await;
        self.send(json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
            .await;
        response
    }

    /// Close our end and wait for the server to finish
    async fn finish(mut self) -> edithost_mcp::Result<()> {
        self.writer.shutdown().await.unwrap();
        let result = tokio::time::timeout(Duration::from_secs(5), self.server)
            .await
            .expect("server did not stop")
            .unwrap();
        self.context.shutdown();
        result
    }

    /// Wait for the server to end the session by itself
    async fn closed_by_server(mut self) -> edithost_mcp::Result<()> {
        let result = tokio::time::timeout(Duration::from_secs(5), &mut self.server)
            .await
            .expect("server did not stop")
            .unwrap();
        self.context.shutdown();
        result
    }
}

fn start(config: ServerConfig) -> Client {
    let workspace = TempDir::new().unwrap();
    std::fs::create_dir_all(workspace.path().join("app")).unwrap();
    std::fs::write(workspace.path().join("app/notes.txt"), "first draft").unwrap();

    let context = Arc::new(
        ServerContext::new(
            builtin_registry().unwrap(),
            Arc::new(WorkspaceBackend::new(workspace.path())),
        )
        .unwrap(),
    );

    let (client, server) = tokio::io::duplex(64 * 1024);
    let (server_read, server_write) = tokio::io::split(server);
    let transport = Transport::new(
        BufReader::new(server_read),
        server_write,
        Framing::Lines,
        CancellationToken::new(),
    );

    let server = McpServer::new(context.clone(), config);
    let handle = tokio::spawn(async move { server.serve(transport).await });

    let (client_read, client_write) = tokio::io::split(client);
    Client {
        lines: BufReader::new(client_read).lines(),
        writer: client_write,
        server: handle,
        context,
        _workspace: workspace,
    }
}

fn text_of(response: &Value) -> &str {
    response["result"]["content"][0]["text"].as_str().unwrap()
}

mod handshake {
    use super::*;

    #[tokio::test]
    async fn test_handshake_then_list_tools_in_order() {
        let mut client = start(ServerConfig::default());

        let init = client.handshake().await;
        assert_eq!(init["result"]["protocolVersion"], "2025-03-26");
        assert_eq!(init["result"]["serverInfo"]["name"], "edithost");
        assert_eq!(init["result"]["capabilities"]["tools"]["listChanged"], false);

        let listed = client.request(1, "tools/list", json!({})).await;
        let names: Vec<&str> = listed["result"]["tools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(&names[..4], &["Echo", "GetCurrentTime", "CountWords", "Calculate"]);
        assert_eq!(names.len(), 12);

        let calculate = &listed["result"]["tools"][3];
        let properties: Vec<&String> = calculate["inputSchema"]["properties"]
            .as_object()
            .unwrap()
            .keys()
            .collect();
        assert_eq!(properties, vec!["operation", "a", "b"]);

        client.finish().await.unwrap();
    }

    #[tokio::test]
    async fn test_ping_after_handshake() {
        let mut client = start(ServerConfig::default());
        client.handshake().await;

        let pong = client.request(1, "ping", json!({})).await;
        assert_eq!(pong["result"], json!({}));

        client.finish().await.unwrap();
    }

    #[tokio::test]
    async fn test_message_before_handshake_closes_connection() {
        let mut client = start(ServerConfig::default());

        let response = client.request(1, "tools/list", json!({})).await;
        assert_eq!(response["error"]["code"], -32002);

        let result = client.closed_by_server().await;
        assert!(matches!(result, Err(McpError::ProtocolViolation(_))));
    }

    #[tokio::test]
    async fn test_second_handshake_closes_connection() {
        let mut client = start(ServerConfig::default());
        client.handshake().await;

        let response = client
            .request(
                1,
                "initialize",
                json!({
                    "protocolVersion": "2024-11-05",
                    "clientInfo": {"name": "again", "version": "1.0.0"}
                }),
            )
            .await;
        assert_eq!(response["error"]["code"], -32002);

        let result = client.closed_by_server().await;
        assert!(matches!(result, Err(McpError::ProtocolViolation(_))));
    }

    #[tokio::test]
    async fn test_handshake_timeout() {
        let config = ServerConfig {
            handshake_timeout_secs: 1,
            ..ServerConfig::default()
        };
        let mut client = start(config);

        let response = client.recv().await;
        assert_eq!(response["id"], Value::Null);
        assert_eq!(response["error"]["code"], -32003);

        let result = client.closed_by_server().await;
        assert!(matches!(result, Err(McpError::Timeout(1))));
    }

    #[tokio::test]
    async fn test_undecodable_message_is_fatal() {
        let mut client = start(ServerConfig::default());
        client.handshake().await;

        client.send_raw("{not json").await;
        let response = client.recv().await;
        assert_eq!(response["id"], Value::Null);
        assert_eq!(response["error"]["code"], -32700);

        let result = client.closed_by_server().await;
        assert!(matches!(result, Err(McpError::Framing(_))));
    }

    #[tokio::test]
    async fn test_oversized_message_is_fatal() {
        let config = ServerConfig {
            max_message_bytes: 256,
            ..ServerConfig::default()
        };
        let mut client = start(config);
        client.handshake().await;

        let echo = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tools/call",
            "params": {"name": "Echo", "arguments": {"message": "x".repeat(1024)}}
        });
        client.send(echo).await;

        let response = client.recv().await;
        assert_eq!(response["id"], Value::Null);
        assert_eq!(response["error"]["code"], -32700);

        let result = client.closed_by_server().await;
        assert!(matches!(result, Err(McpError::Framing(_))));
    }

    #[tokio::test]
    async fn test_wrong_jsonrpc_version_is_rejected() {
        let mut client = start(ServerConfig::default());
        client.handshake().await;

        client
            .send(json!({"jsonrpc": "1.0", "id": 1, "method": "tools/list"}))
            .await;
        let response = client.recv().await;
        assert_eq!(response["id"], 1);
        assert_eq!(response["error"]["code"], -32600);

        // Not fatal: the session keeps serving
        let pong = client.request(2, "ping", json!({})).await;
        assert_eq!(pong["result"], json!({}));

        client.finish().await.unwrap();
    }

    #[tokio::test]
    async fn test_clean_disconnect() {
        let mut client = start(ServerConfig::default());
        client.handshake().await;
        client.finish().await.unwrap();
    }
}

mod tool_calls {
    use super::*;

    #[tokio::test]
    async fn test_calculate_scenarios() {
        let mut client = start(ServerConfig::default());
        client.handshake().await;

        let sum = client
            .call(1, "Calculate", json!({"operation": "add", "a": 2, "b": 3}))
            .await;
        assert_eq!(text_of(&sum), "Result of 2 add 3 = 5");
        assert_eq!(sum["result"]["isError"], false);

        let coerced = client
            .call(2, "Calculate", json!({"operation": "multiply", "a": "1.5", "b": 4}))
            .await;
        assert_eq!(text_of(&coerced), "Result of 1.5 multiply 4 = 6");

        let by_zero = client
            .call(3, "Calculate", json!({"operation": "divide", "a": 1, "b": 0}))
            .await;
        assert_eq!(text_of(&by_zero), "Error: Cannot divide by zero");
        assert_eq!(by_zero["result"]["isError"], false);

        let missing = client
            .call(4, "Calculate", json!({"operation": "add", "a": 1}))
            .await;
        assert_eq!(missing["error"]["code"], -32602);

        let mistyped = client
            .call(5, "Calculate", json!({"operation": "add", "a": "two", "b": 1}))
            .await;
        assert_eq!(mistyped["error"]["code"], -32602);

        client.finish().await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let mut client = start(ServerConfig::default());
        client.handshake().await;

        let response = client.call(1, "Nope", json!({})).await;
        assert_eq!(response["error"]["code"], -32001);
        assert_eq!(response["error"]["data"]["tool"], "Nope");

        // The session carries on
        let echo = client.call(2, "Echo", json!({"message": "still here"})).await;
        assert_eq!(text_of(&echo), "Echo: still here");

        client.finish().await.unwrap();
    }

    #[tokio::test]
    async fn test_count_words() {
        let mut client = start(ServerConfig::default());
        client.handshake().await;

        let response = client.call(1, "CountWords", json!({"text": "a b  c"})).await;
        assert_eq!(text_of(&response), "Word count: 3, Text: a b  c");

        client.finish().await.unwrap();
    }

    #[tokio::test]
    async fn test_editor_and_file_tools() {
        let mut client = start(ServerConfig::default());
        client.handshake().await;

        let none = client.call(1, "GetActiveDocumentText", json!({})).await;
        assert_eq!(text_of(&none), "No active document.");

        let opened = client
            .call(2, "OpenDocument", json!({"path": "app/notes.txt"}))
            .await;
        assert_eq!(text_of(&opened), "Document opened successfully");

        let active = client.call(3, "GetActiveDocumentText", json!({})).await;
        assert_eq!(text_of(&active), "first draft");

        let docs = client.call(4, "GetOpenDocuments", json!({})).await;
        let docs: Vec<String> = serde_json::from_str(text_of(&docs)).unwrap();
        assert_eq!(docs.len(), 1);
        assert!(docs[0].starts_with("notes.txt ("));

        let written = client
            .call(5, "WriteFileContent", json!({"path": "out.txt", "content": "saved"}))
            .await;
        assert_eq!(text_of(&written), "File written successfully");

        let read = client.call(6, "GetFileContent", json!({"path": "out.txt"})).await;
        assert_eq!(text_of(&read), "saved");

        let missing = client
            .call(7, "GetFileContent", json!({"path": "gone.txt"}))
            .await;
        assert_eq!(text_of(&missing), "File not found: gone.txt");

        client.finish().await.unwrap();
    }

    #[tokio::test]
    async fn test_notifications_get_no_reply() {
        let mut client = start(ServerConfig::default());
        client.handshake().await;

        client
            .send(json!({"jsonrpc": "2.0", "method": "notifications/cancelled", "params": {}}))
            .await;
        let echo = client.call(1, "Echo", json!({"message": "next"})).await;
        assert_eq!(text_of(&echo), "Echo: next");

        client.finish().await.unwrap();
    }
}
