//! `web:watch`: polls a URL and fires when its content changes.
//!
//! Module config: `{ "url": "...", "poll_interval_minutes": 15 }`.
//! Task config: `{ "contains": "text" }` restricts a task to changes whose
//! excerpt mentions the text (case-insensitive).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{PollOutcome, TriggerEvent, TriggerSpec};
use crate::domain::ports::{ModuleTrigger, TriggerHandler, TriggerModule};

pub const MODULE_ID: &str = "web";
pub const POLL_INTERVAL_KEY: &str = "poll_interval_minutes";
const EXCERPT_CHARS: usize = 500;

pub struct WebModule {
    client: Client,
}

impl Default for WebModule {
    fn default() -> Self {
        Self::new()
    }
}

impl WebModule {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

impl TriggerModule for WebModule {
    fn id(&self) -> &str {
        MODULE_ID
    }

    fn triggers(&self) -> Vec<ModuleTrigger> {
        let spec = TriggerSpec::new("Web page changed")
            .with_description("Fires when the configured URL returns different content")
            .pollable()
            .filterable()
            .with_poll_interval_key(POLL_INTERVAL_KEY);
        vec![ModuleTrigger::new(
            "watch",
            spec,
            Arc::new(WebWatchHandler {
                client: self.client.clone(),
            }),
        )]
    }
}

struct WebWatchHandler {
    client: Client,
}

#[async_trait]
impl TriggerHandler for WebWatchHandler {
    async fn poll(&self, config: &Value, state: &Value) -> DomainResult<PollOutcome> {
        let url = config
            .get("url")
            .and_then(Value::as_str)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| {
                DomainError::ValidationFailed("web module has no 'url' configured".to_string())
            })?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DomainError::ExecutionFailed(format!("fetching {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DomainError::ExecutionFailed(format!("{url} returned {status}")));
        }

        let header_value = |name: header::HeaderName| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let etag = header_value(header::ETAG);
        let last_modified = header_value(header::LAST_MODIFIED);

        let body = response
            .text()
            .await
            .map_err(|e| DomainError::ExecutionFailed(format!("reading {url} failed: {e}")))?;

        let fingerprint = fingerprint(etag.as_deref(), last_modified.as_deref(), &body);
        let new_state = json!({ "fingerprint": fingerprint });

        match state.get("fingerprint").and_then(Value::as_str) {
            None => {
                tracing::debug!(url, "recorded baseline fingerprint");
                Ok(PollOutcome::quiet(new_state))
            }
            Some(previous) if previous == fingerprint => Ok(PollOutcome::quiet(new_state)),
            Some(_) => {
                let excerpt: String = body.chars().take(EXCERPT_CHARS).collect();
                let event = TriggerEvent::new(
                    format!("Content changed at {url}"),
                    json!({
                        "url": url,
                        "status": status.as_u16(),
                        "fingerprint": fingerprint,
                        "excerpt": excerpt,
                    }),
                );
                Ok(PollOutcome::fired(new_state, event))
            }
        }
    }

    fn filter(&self, event: &TriggerEvent, task_config: &Value) -> bool {
        let Some(needle) = task_config
            .get("contains")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
        else {
            return true;
        };
        event
            .data
            .get("excerpt")
            .and_then(Value::as_str)
            .is_some_and(|excerpt| excerpt.to_lowercase().contains(&needle.to_lowercase()))
    }
}

/// `ETag`, else `Last-Modified`, else a SHA-256 of the body.
fn fingerprint(etag: Option<&str>, last_modified: Option<&str>, body: &str) -> String {
    match (etag, last_modified) {
        (Some(etag), _) => format!("etag:{etag}"),
        (None, Some(modified)) => format!("modified:{modified}"),
        (None, None) => format!("sha256:{:x}", Sha256::digest(body.as_bytes())),
    }
}
