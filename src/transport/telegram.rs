//! Telegram Bot API adapter

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;
use tokio_util::io::ReaderStream;

use super::{OutgoingFile, ProgressSink, Transport};
use crate::config::TransportConfig;
use crate::error::TransportError;
use crate::types::{ChatRef, MessageRef};

/// Description the Bot API returns when an edit would not change anything
const NOT_MODIFIED: &str = "message is not modified";

/// Backoff used when the platform answers 429 without a `retry_after` hint
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

/// [`Transport`] backed by the Telegram Bot API
pub struct TelegramTransport {
    client: reqwest::Client,
    /// `{api_base}/bot{token}`
    endpoint: String,
    request_timeout: Duration,
    upload_timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    error_code: Option<i64>,
    description: Option<String>,
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

impl TelegramTransport {
    /// Build an adapter for the bot described by `config`
    pub fn new(config: &TransportConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| TransportError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/bot{}",
                config.api_base.trim_end_matches('/'),
                config.bot_token
            ),
            request_timeout: config.request_timeout,
            upload_timeout: config.upload_timeout,
        })
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{}", self.endpoint, method)
    }

    async fn call_json<T: DeserializeOwned>(
        &self,
        method: &str,
        payload: Value,
    ) -> Result<T, TransportError> {
        let response = self
            .client
            .post(self.url(method))
            .timeout(self.request_timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;
        decode(method, response).await
    }
}

/// Turn a Bot API response into a result, mapping `retry_after` to a rate-limit signal
async fn decode<T: DeserializeOwned>(
    method: &str,
    response: reqwest::Response,
) -> Result<T, TransportError> {
    let status = response.status();
    let body: ApiResponse<T> = match response.json().await {
        Ok(body) => body,
        Err(e) if status.is_server_error() => {
            return Err(TransportError::Rejected {
                code: i64::from(status.as_u16()),
                description: format!("{method}: {e}"),
            });
        }
        Err(e) => {
            return Err(TransportError::InvalidResponse(format!(
                "{method} returned HTTP {status}: {e}"
            )));
        }
    };

    if body.ok {
        return body
            .result
            .ok_or_else(|| TransportError::InvalidResponse(format!("{method} returned no result")));
    }

    let code = body
        .error_code
        .unwrap_or_else(|| i64::from(status.as_u16()));
    let retry_after = body.parameters.and_then(|p| p.retry_after);

    if let Some(secs) = retry_after {
        return Err(TransportError::RateLimited(Duration::from_secs(secs)));
    }
    if code == 429 {
        return Err(TransportError::RateLimited(DEFAULT_RETRY_AFTER));
    }

    Err(TransportError::Rejected {
        code,
        description: body
            .description
            .unwrap_or_else(|| format!("{method} failed")),
    })
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send_message(&self, chat: ChatRef, text: &str) -> Result<MessageRef, TransportError> {
        let sent: SentMessage = self
            .call_json(
                "sendMessage",
                json!({ "chat_id": chat.0, "text": text, "disable_web_page_preview": true }),
            )
            .await?;
        Ok(MessageRef {
            chat,
            message_id: sent.message_id,
        })
    }

    async fn edit_message(&self, message: &MessageRef, text: &str) -> Result<(), TransportError> {
        let result = self
            .call_json::<Value>(
                "editMessageText",
                json!({
                    "chat_id": message.chat.0,
                    "message_id": message.message_id,
                    "text": text,
                    "disable_web_page_preview": true,
                }),
            )
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(TransportError::Rejected { description, .. })
                if description.contains(NOT_MODIFIED) =>
            {
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn delete_message(&self, message: &MessageRef) -> Result<(), TransportError> {
        self.call_json::<bool>(
            "deleteMessage",
            json!({ "chat_id": message.chat.0, "message_id": message.message_id }),
        )
        .await
        .map(|_| ())
    }

    async fn send_file(
        &self,
        chat: ChatRef,
        file: &OutgoingFile,
        progress: ProgressSink,
    ) -> Result<MessageRef, TransportError> {
        let handle = tokio::fs::File::open(&file.path)
            .await
            .map_err(|e| TransportError::Io {
                path: file.path.clone(),
                reason: e.to_string(),
            })?;

        progress.report(0);
        let mut sent = 0u64;
        let stream = ReaderStream::new(handle).map(move |chunk| {
            if let Ok(bytes) = &chunk {
                sent += bytes.len() as u64;
                progress.report(sent);
            }
            chunk
        });

        let part = Part::stream_with_length(reqwest::Body::wrap_stream(stream), file.size_bytes)
            .file_name(file.file_name.clone());
        let mut form = Form::new()
            .text("chat_id", chat.0.to_string())
            .part(file.kind.form_field(), part);
        if let Some(caption) = &file.caption {
            form = form.text("caption", caption.clone());
        }
        if file.kind == super::MediaKind::Video {
            form = form.text("supports_streaming", "true");
        }

        let method = file.kind.api_method();
        tracing::debug!(
            method,
            file = %file.file_name,
            size_bytes = file.size_bytes,
            "Uploading file"
        );

        let response = self
            .client
            .post(self.url(method))
            .timeout(self.upload_timeout)
            .multipart(form)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let sent: SentMessage = decode(method, response).await?;
        Ok(MessageRef {
            chat,
            message_id: sent.message_id,
        })
    }

    fn name(&self) -> &'static str {
        "telegram"
    }
}
