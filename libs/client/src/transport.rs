//! Authenticated HTTP round-trips against the platform REST API.
//!
//! Every outbound call funnels through [`Transport::execute`]: it attaches the
//! bearer credential, sends the pre-encoded JSON body and classifies non-2xx
//! responses. No retries happen here.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use maxbot_core::ApiError;
use metrics::{counter, histogram};
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use reqwest::{Client, Method, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::config::ClientConfig;
use crate::error::ClientError;

/// Error bodies are read up to this many bytes.
pub const MAX_ERROR_BODY: usize = 1 << 20;

/// One REST call: method, path below the base URL, query and optional JSON body.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<Vec<u8>>,
    timeout: Option<Duration>,
    endpoint: &'static str,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            timeout: None,
            endpoint: "api",
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Encodes `body` as the JSON payload of the request.
    pub fn json<B>(mut self, body: &B) -> Result<Self, ClientError>
    where
        B: Serialize + ?Sized,
    {
        let encoded = serde_json::to_vec(body).map_err(ClientError::Encode)?;
        self.body = Some(encoded);
        Ok(self)
    }

    /// Overrides the client-wide timeout for this call only.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Metrics label for the call site, e.g. `chats.get`.
    pub fn endpoint(mut self, endpoint: &'static str) -> Self {
        self.endpoint = endpoint;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }
}

#[derive(Clone)]
pub struct Transport {
    client: Client,
    base_url: Url,
    api_key: Arc<str>,
    api_version: Arc<str>,
}

impl Transport {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(config.user_agent())
            .build()
            .map_err(|err| ClientError::Build(err.to_string()))?;
        Self::with_client(client, config)
    }

    /// Uses a caller-supplied `reqwest::Client`; timeouts and user agent then
    /// come from that client.
    pub fn with_client(client: Client, config: &ClientConfig) -> Result<Self, ClientError> {
        let mut base_url = Url::parse(config.base_url())
            .map_err(|err| ClientError::Build(format!("invalid base url: {err}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::Build(format!(
                "base url {} cannot carry a path",
                config.base_url()
            )));
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        HeaderValue::from_str(&format!("Bearer {}", config.api_key()))
            .map_err(|_| ClientError::Build("api key is not a valid header value".into()))?;
        Ok(Self {
            client,
            base_url,
            api_key: Arc::from(config.api_key()),
            api_version: Arc::from(config.api_version()),
        })
    }

    /// Builds `/api/{version}/{tail}`.
    pub fn api_path(&self, tail: &str) -> String {
        format!("/api/{}/{}", self.api_version, tail.trim_start_matches('/'))
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint_url(&self, request: &ApiRequest) -> Result<Url, ClientError> {
        let mut url = self
            .base_url
            .join(request.path.trim_start_matches('/'))
            .map_err(|err| ClientError::Build(format!("invalid path {}: {err}", request.path)))?;
        if !request.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &request.query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// Performs one round-trip and returns the raw success body.
    pub async fn execute(&self, request: ApiRequest) -> Result<Bytes, ClientError> {
        let url = self.endpoint_url(&request)?;
        let endpoint = request.endpoint;
        debug!(
            method = %request.method,
            path = %request.path,
            has_body = request.body.is_some(),
            "sending request"
        );

        let mut builder = self
            .client
            .request(request.method, url)
            .bearer_auth(&*self.api_key)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let started = Instant::now();
        counter!("maxbot_requests_total", "endpoint" => endpoint).increment(1);
        let response = builder.send().await.map_err(|err| {
            counter!(
                "maxbot_errors_total",
                "kind" => "network",
                "endpoint" => endpoint
            )
            .increment(1);
            if err.is_builder() {
                ClientError::Build(err.to_string())
            } else {
                ClientError::Network(err)
            }
        })?;

        let status = response.status();
        histogram!(
            "maxbot_request_seconds",
            "endpoint" => endpoint,
            "status" => status.as_str().to_string()
        )
        .record(started.elapsed().as_secs_f64());

        if status.as_u16() >= 400 {
            let err = read_error(response).await;
            counter!(
                "maxbot_errors_total",
                "kind" => err.class().as_str(),
                "endpoint" => endpoint
            )
            .increment(1);
            debug!(%status, error = %err, "request rejected");
            return Err(err);
        }

        response.bytes().await.map_err(ClientError::Network)
    }

    /// Executes and decodes the success body into `T`.
    pub async fn call<T>(&self, request: ApiRequest) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
    {
        let endpoint = request.endpoint;
        let body = self.execute(request).await?;
        serde_json::from_slice(&body).map_err(|err| {
            counter!(
                "maxbot_errors_total",
                "kind" => "decode",
                "endpoint" => endpoint
            )
            .increment(1);
            ClientError::Decode(err)
        })
    }

    /// Executes and drops whatever the server answered.
    pub async fn call_discard(&self, request: ApiRequest) -> Result<(), ClientError> {
        self.execute(request).await.map(|_| ())
    }
}

async fn read_error(mut response: Response) -> ClientError {
    let status = response.status();
    let mut body: Vec<u8> = Vec::new();
    loop {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                let remaining = MAX_ERROR_BODY - body.len();
                body.extend_from_slice(&chunk[..chunk.len().min(remaining)]);
                if body.len() >= MAX_ERROR_BODY {
                    break;
                }
            }
            Ok(None) => break,
            Err(err) => {
                return ClientError::Http {
                    status,
                    body: format!("failed to read body: {err}"),
                };
            }
        }
    }

    match serde_json::from_slice::<ApiError>(&body) {
        Ok(doc) if !doc.message.is_empty() => ClientError::Api {
            status,
            code: doc.code,
            message: doc.message,
        },
        _ => ClientError::http(status, &body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(base: &str) -> Transport {
        Transport::new(&ClientConfig::new("key").with_base_url(base)).expect("transport")
    }

    #[test]
    fn joins_paths_below_base_prefix() {
        let t = transport("http://localhost:8080/gateway");
        let req = ApiRequest::get(t.api_path("chats/c-1")).query("limit", 5);
        let url = t.endpoint_url(&req).unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8080/gateway/api/v1/chats/c-1?limit=5"
        );
    }

    #[test]
    fn rejects_unparseable_base_url() {
        let err = Transport::new(&ClientConfig::new("key").with_base_url("not a url"))
            .err()
            .expect("error");
        assert!(matches!(err, ClientError::Build(_)));
    }

    #[test]
    fn rejects_api_key_with_newline() {
        let err = Transport::new(&ClientConfig::new("bad\nkey").with_base_url("http://h"))
            .err()
            .expect("error");
        assert!(matches!(err, ClientError::Build(_)));
    }

    #[test]
    fn json_body_is_encoded_once() {
        let req = ApiRequest::post("/x")
            .json(&serde_json::json!({"text": "hi"}))
            .unwrap();
        assert!(req.has_body());
        assert_eq!(req.body.as_deref(), Some(br#"{"text":"hi"}"#.as_slice()));
    }

    #[test]
    fn request_without_body_sends_none() {
        let req = ApiRequest::get("/x");
        assert!(!req.has_body());
        assert_eq!(*req.method(), Method::GET);
    }
}
