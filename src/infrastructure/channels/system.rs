use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::domain::entities::alert::Alert;
use crate::domain::ports::channel::{Delivery, NotificationChannel, NotificationError};
use crate::domain::value_objects::Channel;

const DEFAULT_FEED_PATH: &str = "~/.local/share/printwatch/notifications.jsonl";

/// In-app notification channel backed by a JSON-lines feed file.
///
/// The operator UI tails this feed; each line is one notification. The
/// mutex keeps concurrent dispatch workers from interleaving lines.
pub struct SystemFeedChannel {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl SystemFeedChannel {
    #[must_use]
    pub fn new(path: &str) -> Self {
        let expanded = shellexpand::tilde(path);
        Self {
            path: PathBuf::from(expanded.as_ref()),
            write_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl Default for SystemFeedChannel {
    fn default() -> Self {
        Self::new(DEFAULT_FEED_PATH)
    }
}

impl NotificationChannel for SystemFeedChannel {
    fn channel(&self) -> Channel {
        Channel::System
    }

    fn send(&self, delivery: &Delivery, alert: &Alert) -> Result<(), NotificationError> {
        let entry = serde_json::json!({
            "recipient": delivery.recipient,
            "title": delivery.subject,
            "message": delivery.body,
            "alert_id": alert.id,
            "device_id": alert.device_id,
            "severity": alert.severity.as_str(),
            "created_at": alert.created_at.to_rfc3339(),
        });
        let json = serde_json::to_string(&entry)
            .map_err(|e| NotificationError::SendFailed(format!("serialization failed: {e}")))?;

        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| NotificationError::SendFailed("feed lock poisoned".into()))?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                NotificationError::SendFailed(format!("cannot create feed directory: {e}"))
            })?;
        }

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| NotificationError::SendFailed(format!("cannot open feed file: {e}")))?;

        writeln!(file, "{json}")
            .map_err(|e| NotificationError::SendFailed(format!("cannot append to feed: {e}")))
    }
}
