use std::time::Duration;

use serde_json::json;
use tracing::debug;

use crate::domain::entities::alert::Alert;
use crate::domain::ports::channel::{Delivery, NotificationChannel, NotificationError};
use crate::domain::value_objects::Channel;

/// Delivers email and SMS traffic by posting JSON to an internal relay
/// endpoint, and serves the generic webhook channel directly.
///
/// The relay owns provider credentials; this side only ships the
/// rendered message. Uses a blocking HTTP client since all sends run on
/// blocking worker tasks.
pub struct HttpGatewayChannel {
    channel: Channel,
    url: String,
    client: reqwest::blocking::Client,
}

impl HttpGatewayChannel {
    /// Creates a gateway transport for one channel.
    ///
    /// # Errors
    ///
    /// Returns `NotificationError::ChannelUnavailable` if the HTTP
    /// client cannot be initialized.
    pub fn new(channel: Channel, url: &str) -> Result<Self, NotificationError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| {
                NotificationError::ChannelUnavailable(format!("http client init failed: {e}"))
            })?;
        Ok(Self {
            channel,
            url: url.to_owned(),
            client,
        })
    }

    fn payload(&self, delivery: &Delivery, alert: &Alert) -> serde_json::Value {
        match self.channel {
            Channel::Email => json!({
                "to": delivery.recipient,
                "subject": delivery.subject,
                "body": delivery.body,
                "alert_id": alert.id,
                "severity": alert.severity.as_str(),
            }),
            Channel::Sms => json!({
                "to": delivery.recipient,
                "text": delivery.body,
                "alert_id": alert.id,
            }),
            Channel::System | Channel::Webhook => json!({
                "source": "printwatch",
                "alert_id": alert.id,
                "device_id": alert.device_id,
                "severity": alert.severity.as_str(),
                "title": delivery.subject,
                "message": delivery.body,
                "created_at": alert.created_at.to_rfc3339(),
            }),
        }
    }
}

impl NotificationChannel for HttpGatewayChannel {
    fn channel(&self) -> Channel {
        self.channel
    }

    fn send(&self, delivery: &Delivery, alert: &Alert) -> Result<(), NotificationError> {
        if delivery.recipient.is_empty() {
            return Err(NotificationError::InvalidAddress("empty recipient".into()));
        }

        let payload = self.payload(delivery, alert);
        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .map_err(|e| NotificationError::SendFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(NotificationError::SendFailed(format!(
                "gateway returned HTTP {}",
                response.status()
            )));
        }
        debug!(channel = %self.channel.as_str(), recipient = %delivery.recipient, "delivered");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use crate::domain::entities::alert::{AlertContext, AlertStatus};
    use crate::domain::value_objects::Severity;
    use chrono::Utc;

    fn make_alert() -> Alert {
        Alert {
            id: 4,
            rule_id: 1,
            device_id: 2,
            title: "Low toner - print-floor2".into(),
            message: "toner at 12%".into(),
            severity: Severity::Medium,
            status: AlertStatus::New,
            context: AlertContext::default(),
            created_at: Utc::now(),
            acknowledged_at: None,
            acknowledged_by: None,
            resolved_at: None,
            resolved_by: None,
            resolution_notes: None,
        }
    }

    #[test]
    fn email_payload_has_subject_and_body() {
        let channel =
            HttpGatewayChannel::new(Channel::Email, "http://relay.local/email").expect("channel");
        let delivery = Delivery {
            recipient: "ops@example.com".into(),
            subject: "Low toner".into(),
            body: "toner at 12%".into(),
        };
        let payload = channel.payload(&delivery, &make_alert());
        assert_eq!(payload["to"], "ops@example.com");
        assert_eq!(payload["subject"], "Low toner");
        assert_eq!(payload["severity"], "medium");
    }

    #[test]
    fn sms_payload_is_text_only() {
        let channel =
            HttpGatewayChannel::new(Channel::Sms, "http://relay.local/sms").expect("channel");
        let delivery = Delivery {
            recipient: "+15550100".into(),
            subject: "Low toner".into(),
            body: "Low toner".into(),
        };
        let payload = channel.payload(&delivery, &make_alert());
        assert_eq!(payload["text"], "Low toner");
        assert!(payload.get("subject").is_none());
    }

    #[test]
    fn empty_recipient_is_rejected_before_io() {
        let channel =
            HttpGatewayChannel::new(Channel::Email, "http://relay.local/email").expect("channel");
        let delivery = Delivery {
            recipient: String::new(),
            subject: "x".into(),
            body: "y".into(),
        };
        assert!(matches!(
            channel.send(&delivery, &make_alert()),
            Err(NotificationError::InvalidAddress(_))
        ));
    }
}
