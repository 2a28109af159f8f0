// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::selector::PriorityMode;

/// Configuration for the matching engine daemon.
#[derive(Debug, Clone, clap::Parser)]
#[command(name = "haild", about = "Ride-hailing driver-matching engine")]
pub struct EngineConfig {
    /// Host to bind on.
    #[arg(long, default_value = "127.0.0.1", env = "HAIL_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 9750, env = "HAIL_PORT")]
    pub port: u16,

    /// Bearer token for API auth. If unset, auth is disabled.
    #[arg(long, env = "HAIL_AUTH_TOKEN")]
    pub auth_token: Option<String>,

    /// Seconds a driver has to answer an offer before it times out.
    #[arg(long, default_value_t = 30, env = "HAIL_DRIVER_TIMEOUT_SECS")]
    pub per_driver_timeout_secs: u64,

    /// Seconds a booking stays in matching before escalating to an admin.
    #[arg(long, default_value_t = 300, env = "HAIL_BOOKING_TIMEOUT_SECS")]
    pub per_booking_timeout_secs: u64,

    /// Drop drivers farther than this many km from pickup. Unset = no cap.
    #[arg(long, env = "HAIL_MAX_DISTANCE_KM")]
    pub max_distance_km: Option<f64>,

    /// Driver ordering for broadcasts.
    #[arg(long, value_enum, default_value_t = PriorityMode::RecentActivity, env = "HAIL_PRIORITY_MODE")]
    pub priority_mode: PriorityMode,

    /// Webhook URL the chat bridge accepts outbound messages on.
    /// If unset, outbound messages are logged only.
    #[arg(long, env = "HAIL_MESSENGER_URL")]
    pub messenger_url: Option<String>,

    /// Webhook URL for admin alerts. If unset, alerts are logged only.
    #[arg(long, env = "HAIL_ADMIN_WEBHOOK_URL")]
    pub admin_webhook_url: Option<String>,

    /// Path to the zone table JSON file. If unset, zone filtering is off.
    #[arg(long, env = "HAIL_ZONE_FILE")]
    pub zone_file: Option<std::path::PathBuf>,
}

impl EngineConfig {
    pub fn per_driver_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.per_driver_timeout_secs)
    }

    pub fn per_booking_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.per_booking_timeout_secs)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 9750,
            auth_token: None,
            per_driver_timeout_secs: 30,
            per_booking_timeout_secs: 300,
            max_distance_km: None,
            priority_mode: PriorityMode::RecentActivity,
            messenger_url: None,
            admin_webhook_url: None,
            zone_file: None,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
