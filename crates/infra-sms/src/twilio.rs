// Twilio REST transport
//
// POST {base}/2010-04-01/Accounts/{sid}/Messages.json, form-encoded
// To/From/Body, HTTP basic auth (account SID, auth token).

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};
use walkin_core::application::message::mask_address;
use walkin_core::error::{AppError, Result};
use walkin_core::port::{NotificationTransport, SendReceipt, TransportError};

pub const TWILIO_API_BASE: &str = "https://api.twilio.com";

#[derive(Debug, Clone)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    /// Sender number, E.164
    pub from_number: String,
    pub base_url: String,
    pub timeout: Duration,
}

/// Created message (only the fields we read)
#[derive(Debug, Deserialize)]
struct MessageResource {
    sid: Option<String>,
}

/// Error body Twilio returns on 4xx/5xx
#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: Option<i64>,
    message: Option<String>,
}

pub struct TwilioTransport {
    client: Client,
    messages_url: String,
    config: TwilioConfig,
}

impl TwilioTransport {
    pub fn new(config: TwilioConfig) -> Result<Self> {
        if config.account_sid.is_empty() || config.auth_token.is_empty() {
            return Err(AppError::Config(
                "Twilio account SID and auth token are required".to_string(),
            ));
        }
        if config.from_number.is_empty() {
            return Err(AppError::Config(
                "Twilio sender number is required".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        let messages_url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            config.base_url.trim_end_matches('/'),
            config.account_sid
        );

        Ok(Self {
            client,
            messages_url,
            config,
        })
    }

    fn map_failure(status: StatusCode, body: &str) -> TransportError {
        let detail = serde_json::from_str::<ErrorBody>(body)
            .ok()
            .map(|e| match (e.code, e.message) {
                (Some(code), Some(msg)) => format!("{} (code {})", msg, code),
                (None, Some(msg)) => msg,
                _ => body.to_string(),
            })
            .unwrap_or_else(|| body.to_string());

        // 429 and 5xx are transient
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            TransportError::Unavailable(format!("{}: {}", status, detail))
        } else {
            TransportError::Rejected {
                status: status.as_u16(),
                message: detail,
            }
        }
    }
}

#[async_trait]
impl NotificationTransport for TwilioTransport {
    async fn send(&self, address: &str, message: &str) -> std::result::Result<SendReceipt, TransportError> {
        let response = self
            .client
            .post(&self.messages_url)
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&[
                ("To", address),
                ("From", self.config.from_number.as_str()),
                ("Body", message),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Unavailable(format!(
                        "request timed out after {:?}",
                        self.config.timeout
                    ))
                } else {
                    TransportError::Unavailable(e.to_string())
                }
            })?;

        let status = response.status();

        if status.is_success() {
            // 2xx: accepted, even if the body is unreadable
            let sid = match response.json::<MessageResource>().await {
                Ok(resource) => resource.sid,
                Err(e) => {
                    warn!(to = %mask_address(address), error = %e, "Unreadable Twilio response body");
                    None
                }
            };
            let delivery_id = sid.unwrap_or_else(|| "unknown".to_string());
            debug!(to = %mask_address(address), sid = %delivery_id, "Twilio accepted message");
            return Ok(SendReceipt { delivery_id });
        }

        if status.is_client_error() || status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::map_failure(status, &body));
        }

        Err(TransportError::InvalidResponse(format!(
            "unexpected status {}",
            status
        )))
    }
}
