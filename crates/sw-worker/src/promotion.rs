//! Promotion of a waiting worker on request.

use std::sync::Arc;

use async_trait::async_trait;
use sw_core::{ControlMessage, MessageEvent};
use sw_security::OriginAllowlist;

use crate::event::{Handler, WaitUntil};
use crate::scope::WorkerScope;

/// Honors `skipWaiting` messages from allowlisted origins.
///
/// Everything else is dropped without a reply.
pub struct PromotionHandler {
    allowlist: OriginAllowlist,
    scope: Arc<dyn WorkerScope>,
}

impl PromotionHandler {
    pub fn new(allowlist: OriginAllowlist, scope: Arc<dyn WorkerScope>) -> Self {
        Self { allowlist, scope }
    }
}

#[async_trait]
impl Handler<MessageEvent> for PromotionHandler {
    async fn handle(&self, event: &MessageEvent, _lifetime: &WaitUntil) {
        if let Err(e) = self.allowlist.check(&event.origin) {
            tracing::debug!(error = %e, "ignoring message");
            return;
        }

        match event.control_message() {
            Some(ControlMessage::SkipWaiting) => {
                tracing::info!(origin = %event.origin, "skipWaiting requested");
                self.scope.skip_waiting().await;
            }
            None => tracing::debug!(origin = %event.origin, "ignoring unrecognised message"),
        }
    }
}
