// portero-channel/src/lib.rs
// ============================================================================
// Module: Portero Approval Channel
// Description: Out-of-band approval UI over an asynchronous chat transport.
// Purpose: Pair the admin, collect decisions, and surface gateway activity.
// Dependencies: portero-core, portero-store, tokio
// ============================================================================

//! ## Overview
//! The approval channel connects the task manager to a human operator over a
//! chat-style messaging transport. It renders approval requests, ingests
//! decisions and their side effects, batches activity notices into digests,
//! and serves administrative commands. The transport itself is a trait; the
//! bot library is out of scope and pluggable.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod channel;
pub mod digest;
pub mod pairing;
pub mod render;
pub mod transport;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use channel::ApprovalChannel;
pub use channel::ApprovalChannelConfig;
pub use channel::ChannelError;
pub use channel::StatusSnapshot;
pub use channel::StatusSource;
pub use digest::ActivityDigest;
pub use digest::ActivityNotice;
pub use digest::NoticeStatus;
pub use pairing::PairingGuard;
pub use pairing::PairingOutcome;
pub use render::render_approval_request;
pub use transport::ApprovalChoice;
pub use transport::ChatTransport;
pub use transport::ChatUpdate;
pub use transport::LogChatTransport;
pub use transport::MessageButton;
pub use transport::OutgoingMessage;
pub use transport::TransportError;
