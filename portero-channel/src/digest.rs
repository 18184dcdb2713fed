// portero-channel/src/digest.rs
// ============================================================================
// Module: Portero Activity Digest
// Description: Batched activity notices flushed to the admin chat.
// Purpose: Surface gateway activity without flooding the channel.
// Dependencies: portero-core, tokio
// ============================================================================

//! ## Overview
//! Execution notices from the pipeline and the executor are queued and
//! flushed as one message per batch window, capped per flush. Notices group
//! by `(status, tool, reason)`; arrival order is preserved within a flush and
//! across flushes. Digest lines for auto-allowed tools attach quick-action
//! buttons that downgrade the tool to require-approval or deny.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

use crate::pairing::PairingGuard;
use crate::transport::ChatTransport;
use crate::transport::MessageButton;
use crate::transport::OutgoingMessage;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default batch window between digest flushes.
pub const DEFAULT_BATCH_WINDOW: Duration = Duration::from_secs(3);
/// Maximum notices included in a single flush.
const MAX_NOTICES_PER_FLUSH: usize = 25;
/// Queued-notice capacity before publishers start dropping.
const QUEUE_CAPACITY: usize = 1024;

// ============================================================================
// SECTION: Notices
// ============================================================================

/// Outcome class of an activity notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NoticeStatus {
    /// Synchronous dispatch permitted by policy or grant.
    Allowed,
    /// Call rejected by a deny policy.
    Blocked,
    /// Approved task finished successfully.
    Completed,
    /// Task denied by the admin.
    Denied,
    /// Dispatch or task execution failed.
    Error,
}

impl NoticeStatus {
    /// Returns the canonical label for the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Allowed => "allowed",
            Self::Blocked => "blocked",
            Self::Completed => "completed",
            Self::Denied => "denied",
            Self::Error => "error",
        }
    }
}

/// One activity notice queued for the next digest flush.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityNotice {
    /// Outcome class.
    pub status: NoticeStatus,
    /// Fully namespaced tool name.
    pub tool: String,
    /// Short reason attached to errors and blocks.
    pub reason: Option<String>,
}

impl ActivityNotice {
    /// Builds a notice without a reason.
    #[must_use]
    pub fn new(status: NoticeStatus, tool: impl Into<String>) -> Self {
        Self {
            status,
            tool: tool.into(),
            reason: None,
        }
    }

    /// Builds a notice carrying a reason.
    #[must_use]
    pub fn with_reason(
        status: NoticeStatus,
        tool: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            status,
            tool: tool.into(),
            reason: Some(reason.into()),
        }
    }
}

// ============================================================================
// SECTION: Digest Handle
// ============================================================================

/// Publisher handle for activity notices.
#[derive(Clone)]
pub struct ActivityDigest {
    /// Queue feeding the flush loop.
    sender: mpsc::Sender<ActivityNotice>,
}

impl ActivityDigest {
    /// Spawns the flush loop and returns the publisher handle.
    #[must_use]
    pub fn spawn(
        transport: Arc<dyn ChatTransport>,
        pairing: PairingGuard,
        window: Duration,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(QUEUE_CAPACITY);
        tokio::spawn(flush_loop(receiver, transport, pairing, window));
        Self {
            sender,
        }
    }

    /// Returns a handle whose notices are discarded; used when the channel
    /// is not running.
    #[must_use]
    pub fn disabled() -> Self {
        let (sender, _receiver) = mpsc::channel(1);
        Self {
            sender,
        }
    }

    /// Queues a notice; drops it when the queue is full or closed.
    pub fn publish(&self, notice: ActivityNotice) {
        let _ = self.sender.try_send(notice);
    }
}

// ============================================================================
// SECTION: Flush Loop
// ============================================================================

/// Drains queued notices every window and sends one digest message.
async fn flush_loop(
    mut receiver: mpsc::Receiver<ActivityNotice>,
    transport: Arc<dyn ChatTransport>,
    pairing: PairingGuard,
    window: Duration,
) {
    let mut interval = tokio::time::interval(window);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        interval.tick().await;
        let mut notices = Vec::new();
        let mut closed = false;
        while notices.len() < MAX_NOTICES_PER_FLUSH {
            match receiver.try_recv() {
                Ok(notice) => notices.push(notice),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    closed = true;
                    break;
                }
            }
        }
        if notices.is_empty() {
            if closed {
                return;
            }
            continue;
        }
        let admin = match pairing.admin() {
            Ok(Some(admin)) => admin,
            Ok(None) => continue,
            Err(err) => {
                let _ = writeln!(std::io::stderr(), "portero: digest admin lookup failed: {err}");
                continue;
            }
        };
        let (text, buttons) = format_digest(&notices);
        if let Err(err) = transport
            .send(OutgoingMessage {
                chat: admin,
                text,
                buttons,
            })
            .await
        {
            let _ = writeln!(std::io::stderr(), "portero: digest send failed: {err}");
        }
    }
}

/// Groups notices and renders the digest body plus quick-action buttons.
fn format_digest(notices: &[ActivityNotice]) -> (String, Vec<MessageButton>) {
    struct Group<'a> {
        status: NoticeStatus,
        tool: &'a str,
        reason: Option<&'a str>,
        count: usize,
    }

    let mut groups: Vec<Group<'_>> = Vec::new();
    for notice in notices {
        let reason = notice.reason.as_deref();
        if let Some(group) = groups.iter_mut().find(|group| {
            group.status == notice.status && group.tool == notice.tool && group.reason == reason
        }) {
            group.count += 1;
        } else {
            groups.push(Group {
                status: notice.status,
                tool: &notice.tool,
                reason,
                count: 1,
            });
        }
    }

    let mut text = String::from("Activity\n");
    let mut buttons = Vec::new();
    for group in &groups {
        text.push_str(&format!("{} {}", group.status.as_str(), group.tool));
        if let Some(reason) = group.reason {
            text.push_str(&format!(": {reason}"));
        }
        if group.count > 1 {
            text.push_str(&format!(" x{}", group.count));
        }
        text.push('\n');
        if group.status == NoticeStatus::Allowed
            && !buttons.iter().any(|button: &MessageButton| {
                button.data.ends_with(&format!(":{}", group.tool))
            })
        {
            buttons.push(MessageButton {
                label: format!("Require approval for {}", group.tool),
                data: format!("policy:require-approval:{}", group.tool),
            });
            buttons.push(MessageButton {
                label: format!("Deny {}", group.tool),
                data: format!("policy:deny:{}", group.tool),
            });
        }
    }
    (text, buttons)
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

    use std::sync::Arc;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use portero_core::ChatId;
    use portero_core::StoreError;
    use portero_core::interfaces::AdminStore;

    use super::ActivityDigest;
    use super::ActivityNotice;
    use super::NoticeStatus;
    use super::format_digest;
    use crate::pairing::PairingGuard;
    use crate::transport::ChatTransport;
    use crate::transport::ChatUpdate;
    use crate::transport::OutgoingMessage;
    use crate::transport::TransportError;

    struct PairedAdmin;

    impl AdminStore for PairedAdmin {
        fn admin(&self) -> Result<Option<ChatId>, StoreError> {
            Ok(Some(ChatId::new("admin")))
        }

        fn set_admin(&self, _chat: ChatId) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct CapturingTransport {
        sent: Mutex<Vec<OutgoingMessage>>,
    }

    #[async_trait]
    impl ChatTransport for CapturingTransport {
        async fn send(&self, message: OutgoingMessage) -> Result<String, TransportError> {
            self.sent.lock().expect("sent lock").push(message);
            Ok("handle".to_string())
        }

        async fn receive(&self) -> Result<Vec<ChatUpdate>, TransportError> {
            Ok(Vec::new())
        }

        async fn probe(&self) -> Result<(), TransportError> {
            Ok(())
        }
    }

    #[test]
    fn grouping_preserves_arrival_order_and_counts() {
        let notices = vec![
            ActivityNotice::new(NoticeStatus::Allowed, "a/read"),
            ActivityNotice::with_reason(NoticeStatus::Error, "b/write", "backend down"),
            ActivityNotice::new(NoticeStatus::Allowed, "a/read"),
        ];
        let (text, buttons) = format_digest(&notices);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Activity");
        assert_eq!(lines[1], "allowed a/read x2");
        assert_eq!(lines[2], "error b/write: backend down");
        assert_eq!(buttons.len(), 2);
        assert_eq!(buttons[0].data, "policy:require-approval:a/read");
        assert_eq!(buttons[1].data, "policy:deny:a/read");
    }

    #[test]
    fn only_allowed_groups_get_quick_actions() {
        let notices = vec![
            ActivityNotice::new(NoticeStatus::Blocked, "a/del"),
            ActivityNotice::new(NoticeStatus::Completed, "b/send"),
        ];
        let (_text, buttons) = format_digest(&notices);
        assert!(buttons.is_empty());
    }

    #[tokio::test]
    async fn flush_sends_one_batched_message() {
        let transport = Arc::new(CapturingTransport::default());
        let pairing = PairingGuard::new(Arc::new(PairedAdmin), None);
        let digest =
            ActivityDigest::spawn(transport.clone(), pairing, Duration::from_millis(20));
        digest.publish(ActivityNotice::new(NoticeStatus::Allowed, "a/read"));
        digest.publish(ActivityNotice::new(NoticeStatus::Allowed, "a/read"));
        digest.publish(ActivityNotice::new(NoticeStatus::Blocked, "a/del"));

        tokio::time::sleep(Duration::from_millis(120)).await;
        let sent = transport.sent.lock().expect("sent lock");
        assert_eq!(sent.len(), 1);
        assert!(sent[0].text.contains("allowed a/read x2"));
        assert!(sent[0].text.contains("blocked a/del"));
    }

    #[tokio::test]
    async fn flush_caps_notices_per_message() {
        let transport = Arc::new(CapturingTransport::default());
        let pairing = PairingGuard::new(Arc::new(PairedAdmin), None);
        let digest =
            ActivityDigest::spawn(transport.clone(), pairing, Duration::from_millis(20));
        for index in 0..30 {
            digest.publish(ActivityNotice::new(NoticeStatus::Completed, format!("t/{index}")));
        }

        tokio::time::sleep(Duration::from_millis(150)).await;
        let sent = transport.sent.lock().expect("sent lock");
        assert!(sent.len() >= 2, "expected at least two flushes, got {}", sent.len());
        let first_lines = sent[0].text.lines().count();
        assert_eq!(first_lines, 26, "25 notices plus header");
    }
}
