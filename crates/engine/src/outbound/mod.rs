// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Outbound boundaries: chat messages to phones and alerts to admins.
//!
//! The engine depends on these traits only; the chat transport and the admin
//! channel are external collaborators reached over webhooks (or the log, when
//! nothing is configured).

pub mod messages;
pub mod webhook;

pub use webhook::{WebhookAdminNotifier, WebhookMessenger};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Plain-text message delivery to a phone identifier. Fire-and-forget:
/// failures are reported but callers never retry or abort a broadcast over
/// them.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send(&self, phone: &str, text: &str) -> anyhow::Result<()>;
}

/// Alert categories on the admin channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertKind {
    /// A booking exhausted its matching window with no driver assigned.
    BookingTimeout,
    /// No eligible drivers at broadcast time.
    LowAvailability,
    /// Unexpected engine failure needing a human.
    SystemError,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BookingTimeout => "BOOKING_TIMEOUT",
            Self::LowAvailability => "LOW_AVAILABILITY",
            Self::SystemError => "SYSTEM_ERROR",
        }
    }
}

/// Best-effort structured alerts to the configured administrator channel.
#[async_trait]
pub trait AdminNotifier: Send + Sync {
    async fn alert(&self, kind: AlertKind, payload: serde_json::Value) -> anyhow::Result<()>;
}

/// Messenger used when no chat bridge is configured.
pub struct LogMessenger;

#[async_trait]
impl Messenger for LogMessenger {
    async fn send(&self, phone: &str, text: &str) -> anyhow::Result<()> {
        tracing::info!(phone, text, "outbound message (no messenger configured)");
        Ok(())
    }
}

/// Notifier used when no admin webhook is configured.
pub struct LogAdminNotifier;

#[async_trait]
impl AdminNotifier for LogAdminNotifier {
    async fn alert(&self, kind: AlertKind, payload: serde_json::Value) -> anyhow::Result<()> {
        tracing::warn!(kind = kind.as_str(), %payload, "admin alert (no webhook configured)");
        Ok(())
    }
}
