use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use teleclaude_core::config::SocketsConfig;
use teleclaude_core::HumanRole;
use tokio::net::UnixListener;
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use tracing::{error, info, warn};

use crate::role_gate::is_permitted;
use crate::types::{ToolRequest, ToolResponse};

/// Implemented by the daemon: resolves a tool-socket caller's session into
/// its `human_role`, and actually executes a permitted operation against
/// local session/adapter/mesh state.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn resolve_role(&self, caller_session_id: Option<&str>) -> HumanRole;
    async fn execute(&self, request: ToolRequest) -> ToolResponse;
}

/// Binds the Unix-domain tool socket and serves one `Framed` connection per
/// accepted client, each frame a length-prefixed JSON `ToolRequest`/
/// `ToolResponse` pair (spec §4.6).
pub async fn serve(sockets: &SocketsConfig, handler: Arc<dyn ToolHandler>) -> std::io::Result<()> {
    let path = &sockets.tool_socket_path;
    let _ = std::fs::remove_file(path);
    let listener = UnixListener::bind(path)?;
    info!(path = %path, "tool server listening");

    loop {
        let (stream, _addr) = listener.accept().await?;
        let handler = handler.clone();
        tokio::spawn(async move {
            if let Err(err) = serve_connection(stream, handler).await {
                warn!(error = %err, "tool server connection ended with error");
            }
        });
    }
}

async fn serve_connection(stream: tokio::net::UnixStream, handler: Arc<dyn ToolHandler>) -> std::io::Result<()> {
    let mut framed = Framed::new(stream, LengthDelimitedCodec::new());

    while let Some(frame) = framed.next().await {
        let frame = frame?;
        let response = match serde_json::from_slice::<ToolRequest>(&frame) {
            Ok(request) => handle_request(&handler, request).await,
            Err(err) => {
                error!(error = %err, "malformed tool request frame");
                ToolResponse::error("unknown", format!("malformed request: {err}"))
            }
        };

        let body = serde_json::to_vec(&response).unwrap_or_else(|_| b"{}".to_vec());
        framed.send(body.into()).await?;
    }
    Ok(())
}

async fn handle_request(handler: &Arc<dyn ToolHandler>, request: ToolRequest) -> ToolResponse {
    let role = handler.resolve_role(request.caller_session_id.as_deref()).await;
    if !is_permitted(role, request.operation) {
        return ToolResponse::error(
            request.id,
            format!("operation '{}' is not permitted for role '{role}'", request.operation.as_str()),
        );
    }
    handler.execute(request).await
}
