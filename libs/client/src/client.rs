use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use maxbot_core::{
    Button, CarouselItem, CarouselMessage, ChatInfo, KeyboardMessage, Message, MessageResponse,
    ScenarioResponse, TextMessage, TransferOptions, UpdatesEnvelope, WebhookEvent,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::polling::{self, PollingConfig, PollingSession, UpdatesSource};
use crate::retry::RetryPolicy;
use crate::transport::{ApiRequest, Transport};

/// Extra time granted to a long-poll request beyond the server-side wait.
const POLL_GRACE: Duration = Duration::from_secs(5);

/// Resource-level API client.
///
/// Every method goes through the shared [`RetryPolicy`]. Cloning is cheap and
/// clones share the connection pool and the shutdown token.
#[derive(Clone)]
pub struct MaxbotClient {
    transport: Transport,
    retry: RetryPolicy,
    request_timeout: Duration,
    shutdown: CancellationToken,
}

impl MaxbotClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let transport = Transport::new(&config)?;
        Ok(Self::from_parts(transport, &config))
    }

    pub fn with_http_client(
        client: reqwest::Client,
        config: ClientConfig,
    ) -> Result<Self, ClientError> {
        let transport = Transport::with_client(client, &config)?;
        Ok(Self::from_parts(transport, &config))
    }

    fn from_parts(transport: Transport, config: &ClientConfig) -> Self {
        Self {
            transport,
            retry: RetryPolicy::new(config.retry().clone()),
            request_timeout: config.request_timeout(),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Cancels pending and future retried calls made through this client
    /// and its clones.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    async fn send<T>(&self, request: ApiRequest) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
    {
        let transport = &self.transport;
        self.retry
            .run(&self.shutdown, move || transport.call::<T>(request.clone()))
            .await
    }

    async fn send_discard(&self, request: ApiRequest) -> Result<(), ClientError> {
        let transport = &self.transport;
        self.retry
            .run(&self.shutdown, move || transport.call_discard(request.clone()))
            .await
    }

    fn chat_path(&self, chat_id: &str, tail: &str) -> Result<String, ClientError> {
        let chat = encode_segment(chat_id).ok_or(ClientError::InvalidChatId)?;
        if tail.is_empty() {
            Ok(self.transport.api_path(&format!("chats/{chat}")))
        } else {
            Ok(self.transport.api_path(&format!("chats/{chat}/{tail}")))
        }
    }

    /// One-shot fetch of pending updates starting at `offset`.
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<WebhookEvent>, ClientError> {
        let request = ApiRequest::get(self.transport.api_path("updates"))
            .query("offset", offset)
            .endpoint("updates.get");
        self.send(request).await
    }

    /// Sends any serializable message shape to a chat.
    pub async fn send_message<M>(
        &self,
        chat_id: &str,
        message: &M,
    ) -> Result<MessageResponse, ClientError>
    where
        M: Serialize + ?Sized,
    {
        let path = self.chat_path(chat_id, "messages")?;
        let body = serde_json::to_value(message).map_err(ClientError::Encode)?;
        if body.is_null() {
            return Err(ClientError::EmptyMessage);
        }
        let request = ApiRequest::post(path)
            .json(&body)?
            .endpoint("messages.send");
        let response: MessageResponse = self.send(request).await?;
        info!(chat_id, message_id = %response.id, "message sent");
        Ok(response)
    }

    pub async fn send_text(
        &self,
        chat_id: &str,
        text: impl Into<String>,
    ) -> Result<MessageResponse, ClientError> {
        let message = TextMessage { text: text.into() };
        self.send_message(chat_id, &message).await
    }

    pub async fn send_keyboard(
        &self,
        chat_id: &str,
        text: impl Into<String>,
        buttons: Vec<Vec<Button>>,
    ) -> Result<MessageResponse, ClientError> {
        let message = KeyboardMessage {
            text: text.into(),
            buttons,
        };
        self.send_message(chat_id, &message).await
    }

    pub async fn send_carousel(
        &self,
        chat_id: &str,
        items: Vec<CarouselItem>,
    ) -> Result<MessageResponse, ClientError> {
        let message = CarouselMessage { carousel: items };
        self.send_message(chat_id, &message).await
    }

    pub async fn get_chat(&self, chat_id: &str) -> Result<ChatInfo, ClientError> {
        let request = ApiRequest::get(self.chat_path(chat_id, "")?).endpoint("chats.get");
        self.send(request).await
    }

    pub async fn get_messages(
        &self,
        chat_id: &str,
        limit: u32,
    ) -> Result<Vec<Message>, ClientError> {
        let request = ApiRequest::get(self.chat_path(chat_id, "messages")?)
            .query("limit", limit)
            .endpoint("messages.list");
        self.send(request).await
    }

    pub async fn set_chat_variables(
        &self,
        chat_id: &str,
        variables: &Map<String, Value>,
    ) -> Result<(), ClientError> {
        let request = ApiRequest::put(self.chat_path(chat_id, "variables")?)
            .json(variables)?
            .endpoint("chats.variables");
        self.send_discard(request).await
    }

    pub async fn transfer_to_agent(
        &self,
        chat_id: &str,
        options: &TransferOptions,
    ) -> Result<(), ClientError> {
        let request = ApiRequest::post(self.chat_path(chat_id, "transfer")?)
            .json(options)?
            .endpoint("chats.transfer");
        self.send_discard(request).await?;
        info!(chat_id, "chat transferred to agent");
        Ok(())
    }

    pub async fn start_scenario(
        &self,
        chat_id: &str,
        scenario_id: &str,
        params: &Map<String, Value>,
    ) -> Result<ScenarioResponse, ClientError> {
        let path = self.scenario_path(chat_id, scenario_id, "start")?;
        let request = ApiRequest::post(path)
            .json(params)?
            .endpoint("scenarios.start");
        self.send(request).await
    }

    pub async fn stop_scenario(&self, chat_id: &str, scenario_id: &str) -> Result<(), ClientError> {
        let path = self.scenario_path(chat_id, scenario_id, "stop")?;
        let request = ApiRequest::post(path).endpoint("scenarios.stop");
        self.send_discard(request).await
    }

    fn scenario_path(
        &self,
        chat_id: &str,
        scenario_id: &str,
        action: &str,
    ) -> Result<String, ClientError> {
        let scenario = encode_segment(scenario_id)
            .ok_or_else(|| ClientError::Build(format!("invalid scenario id {scenario_id:?}")))?;
        self.chat_path(chat_id, &format!("scenarios/{scenario}/{action}"))
    }

    /// Starts a long-poll session that uses this client as its source.
    pub fn start_polling(&self, config: PollingConfig, cancel: CancellationToken) -> PollingSession {
        polling::start_polling(Arc::new(self.clone()), config, cancel)
    }

    fn poll_request_timeout(&self, wait: Duration) -> Duration {
        self.request_timeout.max(wait.saturating_add(POLL_GRACE))
    }
}

#[async_trait]
impl UpdatesSource for MaxbotClient {
    async fn fetch_updates(
        &self,
        offset: i64,
        timeout: Duration,
    ) -> Result<UpdatesEnvelope, ClientError> {
        debug!(offset, wait_secs = timeout.as_secs(), "long poll");
        let request = ApiRequest::get(self.transport.api_path("getUpdates"))
            .query("offset", offset)
            .query("timeout", timeout.as_secs())
            .timeout(self.poll_request_timeout(timeout))
            .endpoint("updates.poll");
        self.transport.call(request).await
    }
}

/// Validates a path identifier and percent-encodes it.
fn encode_segment(id: &str) -> Option<String> {
    if id.trim().is_empty() || id.contains('/') {
        return None;
    }
    Some(urlencoding::encode(id).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> MaxbotClient {
        MaxbotClient::new(ClientConfig::new("key").with_base_url("http://127.0.0.1:1")).unwrap()
    }

    #[test]
    fn chat_ids_are_validated_and_encoded() {
        let c = client();
        assert_eq!(
            c.chat_path("chat 1", "messages").unwrap(),
            "/api/v1/chats/chat%201/messages"
        );
        assert_eq!(c.chat_path("c-1", "").unwrap(), "/api/v1/chats/c-1");
        assert!(matches!(
            c.chat_path("", "messages"),
            Err(ClientError::InvalidChatId)
        ));
        assert!(matches!(
            c.chat_path("a/b", "messages"),
            Err(ClientError::InvalidChatId)
        ));
    }

    #[test]
    fn scenario_ids_are_validated() {
        let c = client();
        assert_eq!(
            c.scenario_path("c-1", "welcome", "start").unwrap(),
            "/api/v1/chats/c-1/scenarios/welcome/start"
        );
        assert!(matches!(
            c.scenario_path("c-1", "../x", "stop"),
            Err(ClientError::Build(_))
        ));
    }

    #[test]
    fn long_poll_timeout_outlives_server_wait() {
        let c = client();
        assert_eq!(
            c.poll_request_timeout(Duration::from_secs(25)),
            Duration::from_secs(30)
        );
        assert_eq!(
            c.poll_request_timeout(Duration::from_secs(60)),
            Duration::from_secs(65)
        );
        assert_eq!(c.poll_request_timeout(Duration::MAX), Duration::MAX);
    }

    #[tokio::test]
    async fn invalid_chat_id_fails_before_any_request() {
        let err = client().send_text("", "hi").await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidChatId));
    }

    #[tokio::test]
    async fn null_message_is_rejected() {
        let err = client().send_message("c-1", &Value::Null).await.unwrap_err();
        assert!(matches!(err, ClientError::EmptyMessage));
    }

    #[tokio::test]
    async fn shutdown_cancels_calls() {
        let c = client();
        let other = c.clone();
        c.shutdown();
        assert!(other.is_shut_down());
        let err = other.get_chat("c-1").await.unwrap_err();
        assert!(matches!(err, ClientError::Cancelled));
    }
}
