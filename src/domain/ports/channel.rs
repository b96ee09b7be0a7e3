use thiserror::Error;

use crate::domain::entities::alert::Alert;
use crate::domain::value_objects::Channel;

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("failed to send notification: {0}")]
    SendFailed(String),
    #[error("notification channel unavailable: {0}")]
    ChannelUnavailable(String),
    #[error("invalid recipient address: {0}")]
    InvalidAddress(String),
}

/// One rendered notification headed to a single recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

/// A concrete transport for one notification channel.
pub trait NotificationChannel: Send + Sync {
    /// Which channel this transport serves.
    fn channel(&self) -> Channel;

    /// Deliver one notification. The alert is passed alongside the
    /// rendered delivery so transports can attach structured fields.
    ///
    /// # Errors
    ///
    /// Returns `NotificationError` if the delivery fails or the
    /// transport is unavailable.
    fn send(&self, delivery: &Delivery, alert: &Alert) -> Result<(), NotificationError>;
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn notification_error_display() {
        let err = NotificationError::SendFailed("smtp timeout".to_string());
        assert_eq!(err.to_string(), "failed to send notification: smtp timeout");

        let err = NotificationError::InvalidAddress("not-a-number".to_string());
        assert_eq!(err.to_string(), "invalid recipient address: not-a-number");
    }
}
