use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::domain::entities::alert::Alert;
use crate::domain::entities::attempt::{AttemptStatus, NotificationAttempt};
use crate::domain::entities::rule::AlertRule;
use crate::domain::ports::channel::{Delivery, NotificationChannel};
use crate::domain::ports::directory::UserDirectory;
use crate::domain::ports::store::{AlertStore, AttemptStore, StoreError};
use crate::domain::value_objects::Channel;

/// Recipient recorded on broadcast attempts, which target a configured
/// endpoint rather than a user.
const BROADCAST_RECIPIENT: &str = "broadcast";

/// Counts from one retry sweep.
#[derive(Debug, Default, Clone, Copy)]
pub struct SweepResult {
    pub attempted: usize,
    pub sent: usize,
    pub retried: usize,
    pub exhausted: usize,
}

/// Fans alerts out into per-recipient delivery attempts and drives the
/// bounded retry sweep over everything still pending.
#[derive(Clone)]
pub struct DispatchService {
    alerts: Arc<dyn AlertStore>,
    attempts: Arc<dyn AttemptStore>,
    directory: Arc<dyn UserDirectory>,
    channels: HashMap<Channel, Arc<dyn NotificationChannel>>,
    max_attempts: u32,
}

impl DispatchService {
    #[must_use]
    pub fn new(
        alerts: Arc<dyn AlertStore>,
        attempts: Arc<dyn AttemptStore>,
        directory: Arc<dyn UserDirectory>,
        transports: Vec<Arc<dyn NotificationChannel>>,
        max_attempts: u32,
    ) -> Self {
        let channels = transports.into_iter().map(|t| (t.channel(), t)).collect();
        Self {
            alerts,
            attempts,
            directory,
            channels,
            max_attempts,
        }
    }

    /// Expand one alert into pending attempts: one per (recipient, enabled
    /// channel) pair, gated on the recipient actually having an address
    /// for the channel. The system channel is always deliverable. When a
    /// webhook transport is registered, a single broadcast attempt is
    /// scheduled in addition, independent of the recipient set.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if recipients cannot be resolved or an
    /// attempt cannot be persisted.
    pub fn fan_out(
        &self,
        alert: &Alert,
        rule: &AlertRule,
        now: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        let recipients = if rule.subscriber_ids.is_empty() {
            self.directory.staff_contacts()?
        } else {
            self.directory.contacts(&rule.subscriber_ids)?
        };

        let mut scheduled = 0;
        for user in &recipients {
            if rule.send_email {
                if let Some(email) = user.email() {
                    self.attempts.add_attempt(&NotificationAttempt::pending(
                        alert.id,
                        Channel::Email,
                        email,
                        now,
                    ))?;
                    scheduled += 1;
                } else {
                    tracing::debug!("{} has no email address, attempt skipped", user.username);
                }
            }
            if rule.send_sms {
                if let Some(phone) = user.phone() {
                    self.attempts.add_attempt(&NotificationAttempt::pending(
                        alert.id,
                        Channel::Sms,
                        phone,
                        now,
                    ))?;
                    scheduled += 1;
                } else {
                    tracing::debug!("{} has no phone number, attempt skipped", user.username);
                }
            }
            if rule.send_system {
                self.attempts.add_attempt(&NotificationAttempt::pending(
                    alert.id,
                    Channel::System,
                    &user.username,
                    now,
                ))?;
                scheduled += 1;
            }
        }

        if self.channels.contains_key(&Channel::Webhook) {
            self.attempts.add_attempt(&NotificationAttempt::pending(
                alert.id,
                Channel::Webhook,
                BROADCAST_RECIPIENT,
                now,
            ))?;
            scheduled += 1;
        }

        tracing::info!(
            "alert {} fanned out to {scheduled} attempt(s) across {} recipient(s)",
            alert.id,
            recipients.len()
        );
        Ok(scheduled)
    }

    /// Re-attempt every pending delivery still under the attempt cap. A
    /// success marks the attempt sent with the failure counter untouched;
    /// a failure increments it and turns the attempt terminally failed
    /// only once the cap is reached. No backoff: the retry cadence is the
    /// sweep cadence.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the pending set cannot be read. Per-attempt
    /// store failures are logged and skipped.
    pub fn sweep(&self, now: DateTime<Utc>) -> Result<SweepResult, StoreError> {
        let pending = self.attempts.pending_attempts(self.max_attempts)?;
        let mut result = SweepResult::default();

        for mut attempt in pending {
            result.attempted += 1;
            let outcome = match self.alerts.get_alert(attempt.alert_id) {
                Ok(alert) => self.send(&attempt, &alert),
                Err(e) => Err(format!("alert lookup failed: {e}")),
            };

            match outcome {
                Ok(()) => {
                    attempt.status = AttemptStatus::Sent;
                    attempt.sent_at = Some(now);
                    attempt.last_error = None;
                    result.sent += 1;
                }
                Err(reason) => {
                    attempt.attempts += 1;
                    attempt.last_error = Some(reason.clone());
                    if attempt.attempts >= self.max_attempts {
                        attempt.status = AttemptStatus::Failed;
                        result.exhausted += 1;
                        tracing::warn!(
                            "attempt {} exhausted after {} tries: {reason}",
                            attempt.id,
                            attempt.attempts
                        );
                    } else {
                        result.retried += 1;
                        tracing::debug!("attempt {} failed, will retry: {reason}", attempt.id);
                    }
                }
            }

            if let Err(e) = self.attempts.update_attempt(&attempt) {
                tracing::warn!("failed to persist attempt {}: {e}", attempt.id);
            }
        }

        if result.attempted > 0 {
            tracing::info!(
                "sweep: {} attempt(s), {} sent, {} retried, {} exhausted",
                result.attempted,
                result.sent,
                result.retried,
                result.exhausted
            );
        }
        Ok(result)
    }

    fn send(&self, attempt: &NotificationAttempt, alert: &Alert) -> Result<(), String> {
        let Some(transport) = self.channels.get(&attempt.channel) else {
            return Err(format!("no transport configured for {}", attempt.channel));
        };
        let delivery = render(attempt, alert);
        transport.send(&delivery, alert).map_err(|e| e.to_string())
    }
}

/// SMS carries the title only; every other channel gets the full message.
fn render(attempt: &NotificationAttempt, alert: &Alert) -> Delivery {
    let body = match attempt.channel {
        Channel::Sms => alert.title.clone(),
        Channel::Email | Channel::System | Channel::Webhook => alert.message.clone(),
    };
    Delivery {
        recipient: attempt.recipient.clone(),
        subject: alert.title.clone(),
        body,
    }
}
