use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::info;

use tably_core::config::GatewayConfig;
use tably_core::ApplicationError;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("no gateway api key is configured")]
    MissingApiKey,
    #[error("gateway request failed: {0}")]
    Transport(String),
    #[error("gateway returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

impl From<GatewayError> for ApplicationError {
    fn from(error: GatewayError) -> Self {
        ApplicationError::Gateway(error.to_string())
    }
}

/// Starts outbound calls through the voice gateway. One POST per call, no
/// retry; the caller translates failures into its own error surface.
pub struct CallInitiator {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
    from_number: String,
}

impl CallInitiator {
    pub fn new(config: &GatewayConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            api_key: config.api_key.clone(),
            from_number: config.from_number.clone(),
        }
    }

    /// Asks the gateway to dial `to_number` and stream call frames to
    /// `relay_url`. Returns the gateway's response body; a non-JSON success
    /// body is passed through as a string.
    pub async fn initiate(
        &self,
        to_number: &str,
        relay_url: &str,
        metadata: Value,
    ) -> Result<Value, GatewayError> {
        let api_key = self.api_key.as_ref().ok_or(GatewayError::MissingApiKey)?;

        let url = format!("{}/v2/create-phone-call", self.base_url);
        let body = json!({
            "from_number": self.from_number,
            "to_number": to_number,
            "relay_websocket_url": relay_url,
            "metadata": metadata,
        });

        info!(to_number, "initiating outbound call");
        let response = self
            .http
            .post(&url)
            .bearer_auth(api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|err| GatewayError::Transport(format!("request to {url} failed: {err}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| GatewayError::Transport(format!("reading gateway body failed: {err}")))?;

        if !status.is_success() {
            return Err(GatewayError::Status { status: status.as_u16(), body: text });
        }

        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }
}
