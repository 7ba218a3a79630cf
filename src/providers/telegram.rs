use super::util::{USER_AGENT, with_retry};
use crate::core::config::TelegramConfig;
use crate::core::notify::{Message, Notifier};
use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, error, info, instrument};

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Delivers messages through the Telegram Bot API.
pub struct TelegramNotifier {
    client: reqwest::Client,
    config: TelegramConfig,
}

impl TelegramNotifier {
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build Telegram HTTP client")?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    fn endpoint(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.token,
            method
        )
    }

    async fn check(response: reqwest::Response) -> Result<()> {
        let status = response.status();
        let body: ApiResponse = response
            .json()
            .await
            .with_context(|| format!("Unexpected Telegram response (HTTP {status})"))?;
        if !status.is_success() || !body.ok {
            bail!(
                "Telegram rejected the request (HTTP {status}): {}",
                body.description.unwrap_or_default()
            );
        }
        Ok(())
    }

    async fn send_text(&self, chat_id: i64, text: &str) -> Result<()> {
        let response = self
            .client
            .post(self.endpoint("sendMessage"))
            .json(&json!({
                "chat_id": chat_id,
                "text": text,
                "parse_mode": "HTML",
            }))
            .send()
            .await?;
        Self::check(response).await
    }

    async fn send_photo(
        &self,
        chat_id: i64,
        file_name: &str,
        bytes: &[u8],
        caption: Option<&str>,
    ) -> Result<()> {
        let mut form = Form::new().text("chat_id", chat_id.to_string()).part(
            "photo",
            Part::bytes(bytes.to_vec()).file_name(file_name.to_string()),
        );
        if let Some(caption) = caption {
            form = form.text("caption", caption.to_string());
        }

        let response = self
            .client
            .post(self.endpoint("sendPhoto"))
            .multipart(form)
            .send()
            .await?;
        Self::check(response).await
    }

    async fn deliver_to(&self, chat_id: i64, message: &Message, photo: Option<&[u8]>) -> Result<()> {
        let delay = Duration::from_millis(self.config.retry_delay_ms);
        match message {
            Message::Html(text) => {
                with_retry(|| self.send_text(chat_id, text), self.config.attempts, delay).await
            }
            Message::Photo { path, caption } => {
                let bytes = photo.ok_or_else(|| anyhow!("photo not loaded"))?;
                let file_name = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("report.png");
                with_retry(
                    || self.send_photo(chat_id, file_name, bytes, caption.as_deref()),
                    self.config.attempts,
                    delay,
                )
                .await
            }
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    #[instrument(name = "TelegramDeliver", skip_all)]
    async fn deliver(&self, message: &Message) -> usize {
        if self.config.token.is_empty() {
            error!("Telegram bot token is not configured");
            return 0;
        }
        if self.config.recipients.is_empty() {
            error!("No Telegram recipients configured");
            return 0;
        }

        let photo = match message {
            Message::Photo { path, .. } => match tokio::fs::read(path).await {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    error!(path = %path.display(), error = %e, "Failed to read photo");
                    return 0;
                }
            },
            Message::Html(_) => None,
        };

        let mut delivered = 0;
        for &chat_id in &self.config.recipients {
            match self.deliver_to(chat_id, message, photo.as_deref()).await {
                Ok(()) => {
                    debug!(chat_id, "Delivered");
                    delivered += 1;
                }
                Err(e) => error!(
                    chat_id,
                    attempts = self.config.attempts,
                    error = %e,
                    "Giving up on recipient"
                ),
            }
        }

        info!(
            "Delivered to {} of {} recipients",
            delivered,
            self.config.recipients.len()
        );
        delivered
    }
}
