use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::types::InboundMetadata;

/// The common handler set every normalized inbound event is routed to
/// (spec §4.3: "routes every inbound user event... to a common handler
/// set"). Implemented once by the daemon's Command Handlers (spec §2) and
/// shared by every adapter, rather than each adapter re-implementing its
/// own dispatch.
#[async_trait]
pub trait InboundHandlers: Send + Sync {
    async fn handle_command(&self, name: &str, args: &[String], metadata: &InboundMetadata) -> Result<Value>;
    async fn handle_message(&self, text: &str, metadata: &InboundMetadata) -> Result<Value>;
    async fn handle_voice(&self, blob: &[u8], metadata: &InboundMetadata) -> Result<Value>;
    async fn handle_file(&self, blob: &[u8], filename: &str, metadata: &InboundMetadata) -> Result<Value>;
}
