//! Cross-Machine Mesh command glue (spec §4.5): routes an inbound
//! `CommandEnvelope` through the exact same operation dispatch the Tool
//! Server uses locally, so a remote agent's `start_session` or
//! `send_message` call behaves identically to a same-machine one.

use std::sync::Arc;

use async_trait::async_trait;
use teleclaude_mesh::{CommandEnvelope, CommandHandler, CommandResponse};

use crate::tool_handler::{handle_envelope, DaemonToolHandler};

pub struct DaemonCommandHandler {
    tool_handler: Arc<DaemonToolHandler>,
}

impl DaemonCommandHandler {
    pub fn new(tool_handler: Arc<DaemonToolHandler>) -> Self {
        Self { tool_handler }
    }
}

#[async_trait]
impl CommandHandler for DaemonCommandHandler {
    async fn handle(&self, envelope: CommandEnvelope) -> CommandResponse {
        handle_envelope(&self.tool_handler, envelope).await
    }
}
