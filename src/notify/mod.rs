//! Lifecycle event fan-out
//!
//! The engine emits one event per committed mutation; rejections emit
//! nothing. Dispatch is fire-and-forget with its own error isolation: a sink
//! failure is logged and never unwinds or fails the mutation that produced
//! the event. How many subscribers exist behind the sink (host event bus,
//! webhooks) is not the engine's concern.

use crate::store::ListKind;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

/// Mutation direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ListAction {
    Add,
    Remove,
}

/// Which table family the event concerns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventScope {
    Account,
    Address,
    Domain,
    /// The MOTD shadow table
    Motd,
}

/// One committed list mutation
#[derive(Debug, Clone, Serialize)]
pub struct ListEvent {
    pub list: ListKindTag,
    pub scope: EventScope,
    pub action: ListAction,
    /// Stable key: account id, address literal, or domain literal
    pub key: String,
    /// Display name, account entries only
    pub display_name: Option<String>,
    /// The actor who issued the mutation
    pub actor: String,
    /// Unix milliseconds at commit
    pub at_millis: i64,
    /// Deny-list adds only
    pub reason: Option<String>,
}

/// Serializable mirror of [`ListKind`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ListKindTag {
    Allow,
    Deny,
}

impl From<ListKind> for ListKindTag {
    fn from(kind: ListKind) -> Self {
        match kind {
            ListKind::Allow => ListKindTag::Allow,
            ListKind::Deny => ListKindTag::Deny,
        }
    }
}

/// Receiver for lifecycle events
// async_trait required for dyn-compatibility with Arc<dyn NotificationSink>
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Handle one committed mutation
    async fn publish(&self, event: ListEvent) -> anyhow::Result<()>;
}

/// Default sink: structured log line per event
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

#[async_trait]
impl NotificationSink for TracingSink {
    async fn publish(&self, event: ListEvent) -> anyhow::Result<()> {
        info!(
            list = ?event.list,
            scope = ?event.scope,
            action = ?event.action,
            key = %event.key,
            actor = %event.actor,
            "List mutation committed"
        );
        Ok(())
    }
}

/// Dispatch an event without awaiting or failing the caller
///
/// The sink runs on its own task; errors and panics stay there.
pub fn dispatch(sink: &Arc<dyn NotificationSink>, event: ListEvent) {
    let sink = Arc::clone(sink);
    tokio::spawn(async move {
        let key = event.key.clone();
        if let Err(e) = sink.publish(event).await {
            error!(key = %key, error = %e, "Notification sink failed");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes() {
        let event = ListEvent {
            list: ListKindTag::Deny,
            scope: EventScope::Address,
            action: ListAction::Add,
            key: "192.168.1.5".to_string(),
            display_name: None,
            actor: "console".to_string(),
            at_millis: 1,
            reason: Some("grief".to_string()),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["list"], "deny");
        assert_eq!(json["scope"], "address");
        assert_eq!(json["action"], "add");
        assert_eq!(json["key"], "192.168.1.5");
    }
}
