//! Long-poll runner for Maxbot bots.

pub mod config;

pub use config::PollerConfig;

use maxbot_core::WebhookEvent;

/// Chat and text to send back when echo mode is on. Only plain text messages
/// qualify.
pub fn echo_reply(event: &WebhookEvent) -> Option<(&str, &str)> {
    if event.kind != "message" || event.chat.id.is_empty() {
        return None;
    }
    let text = event.message.as_ref()?.text.trim();
    if text.is_empty() {
        return None;
    }
    Some((event.chat.id.as_str(), text))
}
