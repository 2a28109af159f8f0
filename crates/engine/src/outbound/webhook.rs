// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Webhook-backed implementations of the outbound boundaries.

use async_trait::async_trait;
use reqwest::Client;

use crate::outbound::{AdminNotifier, AlertKind, Messenger};

fn webhook_client() -> Client {
    Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()
        .unwrap_or_default()
}

/// Posts `{ phone, text }` to the chat bridge.
pub struct WebhookMessenger {
    url: String,
    client: Client,
}

impl WebhookMessenger {
    pub fn new(url: String) -> Self {
        Self { url, client: webhook_client() }
    }
}

#[async_trait]
impl Messenger for WebhookMessenger {
    async fn send(&self, phone: &str, text: &str) -> anyhow::Result<()> {
        let body = serde_json::json!({ "phone": phone, "text": text });
        self.client
            .post(&self.url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// Posts `{ kind, payload }` to the admin channel.
pub struct WebhookAdminNotifier {
    url: String,
    client: Client,
}

impl WebhookAdminNotifier {
    pub fn new(url: String) -> Self {
        Self { url, client: webhook_client() }
    }
}

#[async_trait]
impl AdminNotifier for WebhookAdminNotifier {
    async fn alert(&self, kind: AlertKind, payload: serde_json::Value) -> anyhow::Result<()> {
        let body = serde_json::json!({ "kind": kind.as_str(), "payload": payload });
        self.client
            .post(&self.url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
