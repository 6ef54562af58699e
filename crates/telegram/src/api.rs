use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use taskrelay_core::config::TelegramConfig;

use crate::events::{CallbackQueryEvent, MessageEvent, TelegramEvent, UpdateEnvelope};
use crate::keyboards::OutgoingMessage;
use crate::polling::{TransportError, UpdateTransport};

/// Headroom over the long-poll timeout before the HTTP client gives up.
const POLL_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
    pub error_code: Option<i64>,
}

impl<T> ApiResponse<T> {
    fn into_result(self, method: &str) -> Result<T, String> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            (true, None) => Err(format!("{method} returned no result")),
            (false, _) => Err(format!(
                "{method} rejected ({}): {}",
                self.error_code.unwrap_or_default(),
                self.description.as_deref().unwrap_or("no description")
            )),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub from: Option<User>,
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct User {
    pub id: i64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    pub message: Option<Message>,
    pub data: Option<String>,
}

impl From<Update> for UpdateEnvelope {
    fn from(update: Update) -> Self {
        let event = match (update.message, update.callback_query) {
            (Some(message), _) => match message.text {
                Some(text) => TelegramEvent::Message(MessageEvent {
                    chat_id: message.chat.id,
                    user_id: message.from.map(|user| user.id),
                    text,
                }),
                None => TelegramEvent::Unsupported { kind: "message.non_text".to_owned() },
            },
            (None, Some(query)) => TelegramEvent::CallbackQuery(CallbackQueryEvent {
                // Private chats share the user's id when the origin message is gone.
                chat_id: query.message.map_or(query.from.id, |message| message.chat.id),
                user_id: query.from.id,
                callback_id: query.id,
                data: query.data.unwrap_or_default(),
            }),
            (None, None) => TelegramEvent::Unsupported { kind: "other".to_owned() },
        };

        Self { update_id: update.update_id, event }
    }
}

#[derive(Serialize)]
struct GetUpdatesRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<i64>,
    timeout: u64,
    allowed_updates: &'a [&'a str],
}

#[derive(Serialize)]
struct AnswerCallbackRequest<'a> {
    callback_query_id: &'a str,
}

/// Long-polling client for the Bot API. The token is part of every method
/// URL, so URLs are never logged and errors are stripped of them.
#[derive(Clone, Debug)]
pub struct BotApiTransport {
    http: Client,
    api_base_url: String,
    bot_token: SecretString,
    poll_timeout_secs: u64,
}

impl BotApiTransport {
    pub fn from_config(config: &TelegramConfig) -> Result<Self, TransportError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.poll_timeout_secs) + POLL_GRACE)
            .build()
            .map_err(|error| TransportError::Receive(error.without_url().to_string()))?;

        Ok(Self {
            http,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            bot_token: config.bot_token.clone(),
            poll_timeout_secs: config.poll_timeout_secs,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_base_url, self.bot_token.expose_secret())
    }

    async fn call<B, T>(&self, method: &str, body: &B) -> Result<T, String>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .http
            .post(self.method_url(method))
            .json(body)
            .send()
            .await
            .map_err(|error| error.without_url().to_string())?;

        let status = response.status();
        let parsed: ApiResponse<T> = response.json().await.map_err(|error| {
            format!("{method} returned undecodable body (status {status}): {}", error.without_url())
        })?;
        parsed.into_result(method)
    }
}

#[async_trait]
impl UpdateTransport for BotApiTransport {
    async fn fetch_updates(
        &self,
        offset: Option<i64>,
    ) -> Result<Option<Vec<UpdateEnvelope>>, TransportError> {
        let request = GetUpdatesRequest {
            offset,
            timeout: self.poll_timeout_secs,
            allowed_updates: &["message", "callback_query"],
        };
        let updates: Vec<Update> =
            self.call("getUpdates", &request).await.map_err(TransportError::Receive)?;

        debug!(
            event_name = "ingress.telegram.batch_fetched",
            count = updates.len(),
            "fetched updates"
        );
        Ok(Some(updates.into_iter().map(UpdateEnvelope::from).collect()))
    }

    async fn send_message(&self, message: &OutgoingMessage) -> Result<(), TransportError> {
        self.call::<_, serde_json::Value>("sendMessage", message)
            .await
            .map(|_| ())
            .map_err(TransportError::Send)
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<(), TransportError> {
        let request = AnswerCallbackRequest { callback_query_id: callback_id };
        self.call::<_, bool>("answerCallbackQuery", &request)
            .await
            .map(|_| ())
            .map_err(TransportError::Acknowledge)
    }
}
