//! Best-effort lifecycle notifications for an external monitor.
//!
//! Delivery problems are logged and dropped: a monitor being down must never
//! turn into a failed backup.

use crate::backup::result_error::result::Result;
use reqwest::blocking::Client;
use std::fmt::{Display, Formatter};
use tracing::{debug, warn};

#[derive(Clone, Debug, PartialEq)]
pub enum HeartbeatEvent {
    Start,
    Finish {
        time_taken_secs: f64,
        uploaded_url: String,
    },
    Fail {
        error: String,
    },
}

impl HeartbeatEvent {
    /// Form fields sent with the event. `Start` has no body.
    pub fn payload(&self) -> Vec<(&'static str, String)> {
        match self {
            HeartbeatEvent::Start => vec![],
            HeartbeatEvent::Finish {
                time_taken_secs,
                uploaded_url,
            } => vec![
                ("time_taken", format!("{:.4}", time_taken_secs)),
                ("uploaded_url", uploaded_url.clone()),
            ],
            HeartbeatEvent::Fail { error } => vec![("error", error.clone())],
        }
    }
}

impl Display for HeartbeatEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            HeartbeatEvent::Start => write!(f, "start"),
            HeartbeatEvent::Finish { .. } => write!(f, "finish"),
            HeartbeatEvent::Fail { .. } => write!(f, "fail"),
        }
    }
}

pub trait HeartbeatNotifier {
    /// Sends `event` to `url`. An absent or empty URL is a no-op. Never fails.
    fn notify(&self, url: Option<&str>, event: &HeartbeatEvent);
}

/// POSTs events as `application/x-www-form-urlencoded`.
#[derive(Clone, Debug, Default)]
pub struct HttpHeartbeat {
    client: Client,
}

impl HttpHeartbeat {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn post(&self, url: &str, event: &HeartbeatEvent) -> Result<()> {
        let payload = event.payload();
        let request = self.client.post(url);
        let request = if payload.is_empty() {
            request
        } else {
            request.form(&payload)
        };

        let status = request.send()?.status();
        debug!("  heartbeat response: {status}");
        Ok(())
    }
}

impl HeartbeatNotifier for HttpHeartbeat {
    fn notify(&self, url: Option<&str>, event: &HeartbeatEvent) {
        let Some(url) = url.filter(|u| !u.trim().is_empty()) else {
            return;
        };

        debug!("sending {event} heartbeat: {url}");
        if let Err(e) = self.post(url, event) {
            warn!("Ignoring failed {event} heartbeat to {url}: {e}");
        }
    }
}
