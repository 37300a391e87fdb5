//! Webhook endpoint for Maxbot deliveries.

pub mod config;
pub mod http;
pub mod sink;

pub use config::IngressConfig;
pub use http::{AppState, build_router};
pub use sink::{ChannelSink, EventSink, SharedEventSink, SinkError};
