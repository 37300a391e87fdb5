//! Inbound side of the platform integration: signature checks and decoding
//! of webhook deliveries into [`maxbot_core::WebhookEvent`].

pub mod signature;
pub mod webhook;

pub use signature::{SIGNATURE_HEADER, compute_signature, verify_signature};
pub use webhook::{WebhookError, WebhookVerifier};
