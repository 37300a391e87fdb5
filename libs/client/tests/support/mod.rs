//! Local stand-in for the platform API.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::body::{Body, Bytes, to_bytes};
use axum::extract::Request;
use axum::http::{Method, StatusCode, header};
use axum::response::Response;
use maxbot_client::{ClientConfig, RetrySettings};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub uri: String,
    pub authorization: Option<String>,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl Recorded {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("recorded body is json")
    }
}

pub struct Reply {
    status: StatusCode,
    body: String,
    delay: Duration,
}

impl Reply {
    pub fn json(status: StatusCode, body: Value) -> Self {
        Self::text(status, body.to_string())
    }

    pub fn text(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

type Responder = dyn Fn(&Recorded, usize) -> Reply + Send + Sync;

pub struct MockApi {
    pub base_url: String,
    requests: Arc<Mutex<Vec<Recorded>>>,
    server: JoinHandle<()>,
}

impl MockApi {
    /// `None` when the sandbox refuses to bind a local port.
    pub async fn start<F>(respond: F) -> Option<Self>
    where
        F: Fn(&Recorded, usize) -> Reply + Send + Sync + 'static,
    {
        let listener = match TcpListener::bind("127.0.0.1:0").await {
            Ok(listener) => listener,
            Err(err) => {
                eprintln!("skipping: cannot bind local mock api: {err}");
                return None;
            }
        };
        let addr = listener.local_addr().expect("local addr");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let respond: Arc<Responder> = Arc::new(respond);

        let recorded = requests.clone();
        let app = Router::new().fallback(move |req: Request| {
            let recorded = recorded.clone();
            let respond = respond.clone();
            async move { handle(req, recorded, respond).await }
        });
        let server = tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, app).await {
                eprintln!("mock api server error: {err}");
            }
        });

        Some(Self {
            base_url: format!("http://{addr}"),
            requests,
            server,
        })
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn config(&self) -> ClientConfig {
        ClientConfig::new("test-key")
            .with_base_url(&self.base_url)
            .with_request_timeout(Duration::from_secs(5))
            .with_retry(RetrySettings {
                max_attempts: 3,
                delay: Duration::from_millis(10),
                rate_limit_delay: Duration::from_millis(20),
            })
    }
}

impl Drop for MockApi {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn handle(
    req: Request,
    recorded: Arc<Mutex<Vec<Recorded>>>,
    respond: Arc<Responder>,
) -> Response {
    let (parts, body) = req.into_parts();
    let body = to_bytes(body, usize::MAX).await.unwrap_or_default();
    let header_text = |name: header::HeaderName| {
        parts
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let request = Recorded {
        method: parts.method.clone(),
        uri: parts.uri.to_string(),
        authorization: header_text(header::AUTHORIZATION),
        content_type: header_text(header::CONTENT_TYPE),
        body,
    };

    let index = {
        let mut seen = recorded.lock().unwrap();
        seen.push(request.clone());
        seen.len() - 1
    };
    let reply = respond(&request, index);
    if !reply.delay.is_zero() {
        tokio::time::sleep(reply.delay).await;
    }
    Response::builder()
        .status(reply.status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(reply.body))
        .unwrap()
}
