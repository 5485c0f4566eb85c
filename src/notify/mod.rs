//! Change detection and notification delivery.
//!
//! # Modules
//!
//! - `reconciler` - [`reconcile`] computes [`Transition`]s between two snapshots,
//!   [`Reconciler`] delivers them through a [`Notifier`]
//! - `message` - Telegram HTML message formatting
//! - `telegram` - [`TelegramNotifier`], the Telegram Bot API transport
//!
//! Delivery is best effort: every failure is logged and none of them stops
//! the remaining deliveries or the cache update.

mod message;
mod reconciler;
mod telegram;

use mockall::automock;
use thiserror::Error;

pub use crate::notify::message::{format_system_alert, format_transition};
pub use crate::notify::reconciler::{Reconciler, Transition, reconcile};
pub use crate::notify::telegram::TelegramNotifier;

/// Errors raised while delivering a notification.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The request could not be sent or the reply could not be read.
    #[error("notification transport failed: {0}")]
    Transport(String),
    /// The messaging service refused the message.
    #[error("notification rejected: {0}")]
    Rejected(String),
    /// No answer within the per-notification deadline.
    #[error("notification timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// A channel able to deliver formatted messages.
#[automock]
pub trait Notifier {
    /// Sends `message` to the configured destination.
    async fn send(&self, message: &str) -> Result<(), NotifyError>;
}
