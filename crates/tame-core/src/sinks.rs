//! Concrete [`crate::notify::NotificationSink`] implementations (spec §6).
//! Every sink here is fire-and-forget: failures are logged and swallowed,
//! never propagated, matching the trait's contract.

use std::sync::mpsc::Sender;
use std::time::Duration;

use reqwest::Client;

use crate::notify::{NotificationEvent, NotificationSink};

/// Forwards events to an in-process channel, typically drained by the TUI's
/// toast-rendering widget.
pub struct ToastSink(pub Sender<NotificationEvent>);

impl NotificationSink for ToastSink {
    fn notify(&self, event: &NotificationEvent) {
        if self.0.send(event.clone()).is_err() {
            tracing::debug!("toast sink receiver dropped");
        }
    }
}

/// Forwards events to an in-process channel drained by the sidebar's
/// per-session flash indicator.
pub struct SidebarFlashSink(pub Sender<NotificationEvent>);

impl NotificationSink for SidebarFlashSink {
    fn notify(&self, event: &NotificationEvent) {
        if self.0.send(event.clone()).is_err() {
            tracing::debug!("sidebar flash sink receiver dropped");
        }
    }
}

/// Shells out to `notify-send` for a native desktop notification.
#[derive(Clone, Copy, Debug, Default)]
pub struct DesktopSink;

impl NotificationSink for DesktopSink {
    fn notify(&self, event: &NotificationEvent) {
        let title = format!("tame: {}", event.session_name);
        let status = std::process::Command::new("notify-send")
            .arg(&title)
            .arg(&event.message)
            .status();
        if let Err(err) = status {
            tracing::debug!(%err, "notify-send unavailable");
        }
    }
}

/// Placeholder for an audible alert. No audio backend is wired up yet; this
/// just records that the event would have played a sound.
#[derive(Clone, Copy, Debug, Default)]
pub struct AudioSink;

impl NotificationSink for AudioSink {
    fn notify(&self, event: &NotificationEvent) {
        tracing::debug!(session = %event.session_id, "audio alert (not implemented)");
    }
}

/// Posts a Slack incoming-webhook message. Dispatch happens on `handle`
/// (spawned fire-and-forget), since the sink trait itself is synchronous.
pub struct SlackSink {
    client: Client,
    webhook_url: String,
    handle: tokio::runtime::Handle,
}

impl SlackSink {
    /// Build a sink posting to `webhook_url` using `handle` to spawn the
    /// actual HTTP request.
    #[must_use]
    pub fn new(webhook_url: String, handle: tokio::runtime::Handle) -> Self {
        Self { client: Client::new(), webhook_url, handle }
    }
}

impl NotificationSink for SlackSink {
    fn notify(&self, event: &NotificationEvent) {
        let client = self.client.clone();
        let url = self.webhook_url.clone();
        let payload = serde_json::json!({
            "attachments": [{
                "color": severity_color(event.priority),
                "title": event.session_name,
                "text": event.message,
            }],
        });
        self.handle.spawn(async move {
            if let Err(err) = client.post(&url).json(&payload).send().await {
                tracing::warn!(%err, "slack notification failed");
            }
        });
    }
}

/// Posts to an arbitrary webhook URL with configurable headers and a fixed
/// five-second timeout.
pub struct WebhookSink {
    client: Client,
    url: String,
    headers: reqwest::header::HeaderMap,
    handle: tokio::runtime::Handle,
}

impl WebhookSink {
    /// Build a sink posting to `url` with `headers` attached to every
    /// request, dispatched via `handle`.
    #[must_use]
    pub fn new(url: String, headers: reqwest::header::HeaderMap, handle: tokio::runtime::Handle) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(5))
                .build()
                .unwrap_or_else(|_| Client::new()),
            url,
            headers,
            handle,
        }
    }
}

impl NotificationSink for WebhookSink {
    fn notify(&self, event: &NotificationEvent) {
        let client = self.client.clone();
        let url = self.url.clone();
        let headers = self.headers.clone();
        let payload = serde_json::json!({
            "session_id": event.session_id.to_string(),
            "session_name": event.session_name,
            "event_type": event.event_type,
            "message": event.message,
            "matched_text": event.matched_text,
        });
        self.handle.spawn(async move {
            if let Err(err) = client.post(&url).headers(headers).json(&payload).send().await {
                tracing::warn!(%err, "webhook notification failed");
            }
        });
    }
}

fn severity_color(priority: crate::notify::Priority) -> &'static str {
    match priority {
        crate::notify::Priority::Critical => "#d32f2f",
        crate::notify::Priority::High => "#f57c00",
        crate::notify::Priority::Medium => "#1976d2",
        crate::notify::Priority::Low => "#757575",
    }
}
