use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::errors::DeliveryError;
use super::{ChatTransport, MessageFormat};

/// Telegram Bot API client (`sendMessage` only)
#[derive(Clone)]
pub struct TelegramTransport {
    http: Client,
    api_url: String,
    token: String,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'static str>,
    disable_web_page_preview: bool,
}

#[derive(Debug, Deserialize)]
struct TelegramResponse {
    ok: bool,
    #[serde(default)]
    error_code: Option<u16>,
    #[serde(default)]
    description: Option<String>,
}

impl TelegramTransport {
    pub fn new(
        api_url: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_url, self.token, method)
    }
}

#[async_trait::async_trait]
impl ChatTransport for TelegramTransport {
    async fn send_message(
        &self,
        recipient: &str,
        text: &str,
        format: MessageFormat,
    ) -> Result<(), DeliveryError> {
        let request = SendMessageRequest {
            chat_id: recipient,
            text,
            parse_mode: format.parse_mode(),
            disable_web_page_preview: true,
        };

        let res = self
            .http
            .post(self.method_url("sendMessage"))
            .json(&request)
            .send()
            .await?;

        let status = res.status();
        // Telegram answers with a JSON envelope on errors too
        let body = res.json::<TelegramResponse>().await.map_err(|e| {
            DeliveryError::Transport(format!(
                "Unreadable Telegram response ({}): {}",
                status,
                e.without_url()
            ))
        })?;

        if status.is_success() && body.ok {
            return Ok(());
        }

        Err(DeliveryError::Rejected {
            status: body.error_code.unwrap_or(status.as_u16()),
            description: body
                .description
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown").to_string()),
        })
    }
}
