//! Client for the Maxbot chat-bot platform REST API.
//!
//! [`MaxbotClient`] wraps an authenticated [`Transport`] with a fixed-delay
//! [`RetryPolicy`]; [`polling`] turns `getUpdates` into a bounded stream of
//! delivery records.

pub mod client;
pub mod config;
pub mod error;
pub mod polling;
pub mod retry;
pub mod transport;

pub use client::MaxbotClient;
pub use config::{ClientConfig, ConfigError};
pub use error::ClientError;
pub use polling::{
    PollState, PollingConfig, PollingSession, PollingUpdate, SharedUpdatesSource, UpdateCursor,
    UpdatesSource, start_polling,
};
pub use retry::{RetryPolicy, RetrySettings};
pub use transport::{ApiRequest, Transport};
