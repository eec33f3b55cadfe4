use crate::event::AppEvent;
use std::sync::mpsc;
use std::time::Duration;
use tokio::runtime::Handle;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiStatus {
    Unknown,
    Online,
    Offline,
}

impl ApiStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Unknown => "Checking",
            Self::Online => "Online",
            Self::Offline => "Offline",
        }
    }
}

/// Online only for a 200 answer; anything else, including a transport
/// failure, counts as offline.
pub async fn probe(client: &reqwest::Client, url: &str) -> ApiStatus {
    match client.get(url).timeout(PROBE_TIMEOUT).send().await {
        Ok(response) if response.status() == reqwest::StatusCode::OK => ApiStatus::Online,
        Ok(response) => {
            tracing::warn!(%url, status = %response.status(), "health check answered non-200");
            ApiStatus::Offline
        }
        Err(err) => {
            tracing::warn!(%url, error = %err, "health check failed");
            ApiStatus::Offline
        }
    }
}

pub fn spawn_health_check(runtime_handle: &Handle, url: String, tx: mpsc::Sender<AppEvent>) {
    runtime_handle.spawn(async move {
        let client = reqwest::Client::new();
        let status = probe(&client, &url).await;
        tracing::info!(%url, status = status.label(), "health check finished");
        let _ = tx.send(AppEvent::HealthChecked(status));
    });
}
