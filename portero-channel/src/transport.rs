// portero-channel/src/transport.rs
// ============================================================================
// Module: Portero Chat Transport
// Description: Messaging transport seam for the approval channel.
// Purpose: Define send/receive over chat and a transportless fallback.
// Dependencies: portero-core, async-trait, serde_json
// ============================================================================

//! ## Overview
//! The chat-bot library is an external collaborator; this module defines the
//! seam it plugs into. A transport delivers outgoing messages (optionally
//! carrying action buttons), yields incoming updates, and answers a liveness
//! probe. [`LogChatTransport`] is the shipped fallback: it logs outgoing
//! messages as JSON lines on stderr and never produces updates, so the
//! gateway runs without a bot token.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use portero_core::ChatId;
use serde::Deserialize;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors surfaced by chat transports.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Outgoing message delivery failed.
    #[error("chat send failed: {0}")]
    Send(String),
    /// Incoming update retrieval failed.
    #[error("chat receive failed: {0}")]
    Receive(String),
    /// Liveness probe failed.
    #[error("chat probe failed: {0}")]
    Probe(String),
}

// ============================================================================
// SECTION: Approval Choices
// ============================================================================

/// Discrete choices presented on an approval request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApprovalChoice {
    /// Approve this task only.
    Approve,
    /// Deny this task only.
    Deny,
    /// Approve and grant the tool for the short window.
    ApproveGrantShort,
    /// Approve and grant the tool for the long window.
    ApproveGrantLong,
    /// Approve and persist an allow rule for the exact tool.
    ApproveAlwaysAllowTool,
    /// Deny and persist a deny rule for the exact tool.
    DenyAlwaysDenyTool,
}

impl ApprovalChoice {
    /// Every choice, in presentation order.
    pub const ALL: [Self; 6] = [
        Self::Approve,
        Self::Deny,
        Self::ApproveGrantShort,
        Self::ApproveGrantLong,
        Self::ApproveAlwaysAllowTool,
        Self::DenyAlwaysDenyTool,
    ];

    /// Returns the canonical wire label for the choice.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Deny => "deny",
            Self::ApproveGrantShort => "approve-grant-short",
            Self::ApproveGrantLong => "approve-grant-long",
            Self::ApproveAlwaysAllowTool => "approve-always-allow-tool",
            Self::DenyAlwaysDenyTool => "deny-always-deny-tool",
        }
    }

    /// Parses a wire label back into a choice.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|choice| choice.as_str() == label)
    }

    /// Returns the human-readable button label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Approve => "Approve",
            Self::Deny => "Deny",
            Self::ApproveGrantShort => "Approve + short grant",
            Self::ApproveGrantLong => "Approve + long grant",
            Self::ApproveAlwaysAllowTool => "Always allow this tool",
            Self::DenyAlwaysDenyTool => "Always deny this tool",
        }
    }

    /// Returns true when the choice approves the task.
    #[must_use]
    pub const fn approves(self) -> bool {
        matches!(
            self,
            Self::Approve
                | Self::ApproveGrantShort
                | Self::ApproveGrantLong
                | Self::ApproveAlwaysAllowTool
        )
    }
}

// ============================================================================
// SECTION: Messages
// ============================================================================

/// Action button attached to an outgoing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageButton {
    /// Human-readable button label.
    pub label: String,
    /// Opaque callback payload returned on press.
    pub data: String,
}

/// Outgoing chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingMessage {
    /// Destination chat principal.
    pub chat: ChatId,
    /// Message body.
    pub text: String,
    /// Optional action buttons.
    pub buttons: Vec<MessageButton>,
}

/// Incoming chat update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatUpdate {
    /// Plain text message from a principal.
    Message {
        /// Sending principal.
        chat: ChatId,
        /// Message text.
        text: String,
    },
    /// Button press carrying its callback payload.
    Callback {
        /// Pressing principal.
        chat: ChatId,
        /// Callback payload from the pressed button.
        data: String,
    },
}

impl ChatUpdate {
    /// Returns the principal the update came from.
    #[must_use]
    pub const fn principal(&self) -> &ChatId {
        match self {
            Self::Message {
                chat, ..
            }
            | Self::Callback {
                chat, ..
            } => chat,
        }
    }
}

// ============================================================================
// SECTION: Transport Trait
// ============================================================================

/// Asynchronous messaging transport for the approval channel.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Delivers a message and returns an opaque message handle.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Send`] when delivery fails.
    async fn send(&self, message: OutgoingMessage) -> Result<String, TransportError>;

    /// Returns the next batch of incoming updates; may be empty.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Receive`] when retrieval fails.
    async fn receive(&self) -> Result<Vec<ChatUpdate>, TransportError>;

    /// Answers a liveness probe.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Probe`] when the transport is unreachable.
    async fn probe(&self) -> Result<(), TransportError>;
}

// ============================================================================
// SECTION: Log Transport
// ============================================================================

/// Transportless fallback that logs outgoing messages to stderr.
#[derive(Default)]
pub struct LogChatTransport {
    /// Counter backing synthetic message handles.
    counter: AtomicU64,
}

impl LogChatTransport {
    /// Creates a new log transport.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChatTransport for LogChatTransport {
    async fn send(&self, message: OutgoingMessage) -> Result<String, TransportError> {
        let sequence = self.counter.fetch_add(1, Ordering::Relaxed);
        let payload = json!({
            "event": "chat_message",
            "chat": message.chat,
            "text": message.text,
            "buttons": message.buttons,
        });
        let _ = writeln!(std::io::stderr(), "{payload}");
        Ok(format!("log-{sequence}"))
    }

    async fn receive(&self) -> Result<Vec<ChatUpdate>, TransportError> {
        Ok(Vec::new())
    }

    async fn probe(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions."
    )]

    use portero_core::ChatId;

    use super::ApprovalChoice;
    use super::ChatTransport;
    use super::LogChatTransport;
    use super::OutgoingMessage;

    #[test]
    fn choices_round_trip_their_labels() {
        for choice in ApprovalChoice::ALL {
            assert_eq!(ApprovalChoice::parse(choice.as_str()), Some(choice));
        }
        assert_eq!(ApprovalChoice::parse("unknown"), None);
    }

    #[test]
    fn approving_choices_are_classified() {
        assert!(ApprovalChoice::Approve.approves());
        assert!(ApprovalChoice::ApproveGrantShort.approves());
        assert!(!ApprovalChoice::Deny.approves());
        assert!(!ApprovalChoice::DenyAlwaysDenyTool.approves());
    }

    #[tokio::test]
    async fn log_transport_hands_out_distinct_handles() {
        let transport = LogChatTransport::new();
        let message = OutgoingMessage {
            chat: ChatId::new("admin"),
            text: "hello".to_string(),
            buttons: Vec::new(),
        };
        let first = transport.send(message.clone()).await.expect("send");
        let second = transport.send(message).await.expect("send");
        assert_ne!(first, second);
        assert!(transport.receive().await.expect("receive").is_empty());
    }
}
